//! エラー型の定義

use thiserror::Error;

/// ライブラリ共通のエラー型
#[derive(Error, Debug)]
pub enum Error {
    /// 無効なリクエストボディ
    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),

    /// 無効なヘッダー（CRLF・制御文字など）
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// 無効なクッキー名/値
    #[error("Invalid cookie: {0}")]
    InvalidCookie(String),

    /// 実行環境から必須の値を取得できない
    #[error("Missing environment: {0}")]
    MissingEnvironment(String),

    /// 受理可能なContent-Typeが存在しない
    #[error("Not acceptable: {0}")]
    NotAcceptable(String),

    /// リクエストボディが上限を超過
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// ヘッダー送信後の変更
    #[error("Headers already sent: {0}")]
    HeadersAlreadySent(String),

    /// レスポンスのシリアライズエラー
    #[error("Failed to serialize response: {0}")]
    ResponseSerializationError(String),

    /// 入出力エラー
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 内部サーバーエラー
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl Error {
    /// エラーからHTTPステータスコードを取得
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidRequestBody(_) => 400,
            Error::InvalidHeader(_) => 400,
            Error::InvalidCookie(_) => 400,
            Error::MissingEnvironment(_) => 500,
            Error::NotAcceptable(_) => 406,
            Error::PayloadTooLarge(_) => 413,
            Error::HeadersAlreadySent(_) => 500,
            Error::ResponseSerializationError(_) => 500,
            Error::Io(_) => 500,
            Error::InternalServerError(_) => 500,
        }
    }
}
