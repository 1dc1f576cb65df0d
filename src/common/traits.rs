//! コアトレイト定義（HttpRequest、HttpResponse、Handler）
//!
//! 必須メソッドは実行環境ごとの実装が提供し、既定メソッドがその上に
//! コンテントネゴシエーションやフォーム解析などの便利機能を組み立てる。

use std::borrow::Cow;
use std::collections::HashMap;
use async_trait::async_trait;
use log::warn;
use serde::de::DeserializeOwned;
use crate::error::Error;
use super::cookie::{parse_cookie_header, Cookie};
use super::http::{default_reason_phrase, Method, Request, Response};
use super::negotiation::{self, AcceptList};
use super::utils::parse_query_string;

/// 既定のHTTPバージョン文字列
pub const DEFAULT_HTTP_VERSION: &str = "HTTP/1.1";

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// HTTPリクエストの抽象
pub trait HttpRequest {
    /// リクエストで使われたHTTPメソッド（送られたままの表記）
    fn raw_method(&self) -> &str;

    /// 生のリクエストURI（パスとクエリ文字列、デコードしない）
    fn uri(&self) -> &str;

    /// プロトコル/バージョン文字列（例: `HTTP/1.1`）
    fn protocol(&self) -> &str;

    /// スキーム（`http` または `https`）
    fn scheme(&self) -> &str;

    /// ヘッダーの値（名前の大文字小文字は区別しない）
    fn header(&self, name: &str) -> Option<&str>;

    /// 全ヘッダー（元のヘッダー名と値）
    fn headers(&self) -> &[(String, String)];

    /// リクエストボディ
    fn body(&self) -> &[u8];

    /// 接続元のIPアドレス
    fn origin_ip_address(&self) -> Option<&str>;

    /// 接続元のポート番号
    fn origin_port(&self) -> Option<u16>;

    /// 大文字に正規化したHTTPメソッド
    fn method(&self) -> String {
        self.raw_method().to_ascii_uppercase()
    }

    /// 既知のメソッドであれば [`Method`] に変換
    fn method_kind(&self) -> Option<Method> {
        Method::from_str(self.raw_method())
    }

    /// `Host` ヘッダー
    fn host(&self) -> Option<&str> {
        self.header("Host")
    }

    /// スキーム・ホスト・パス・クエリからなる完全なURL（デコードしない）
    fn full_url(&self) -> String {
        format!(
            "{}://{}{}",
            self.scheme(),
            self.host().unwrap_or_default(),
            origin_form(self.uri())
        )
    }

    /// URIのパス部分（デコードしない）
    fn path(&self) -> &str {
        let target = origin_form(self.uri());
        let end = target.find(|c| c == '?' || c == '#').unwrap_or(target.len());
        &target[..end]
    }

    /// URIのクエリ文字列（デコードしない）。`?` が無ければ `None`
    fn query_string(&self) -> Option<&str> {
        let target = origin_form(self.uri());
        let (_, rest) = target.split_once('?')?;
        Some(rest.split('#').next().unwrap_or(rest))
    }

    /// ヘッダーの値、無ければ既定値
    fn header_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.header(name).unwrap_or(default)
    }

    /// `Content-Type` ヘッダー
    fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// フォームエンコードされたパラメータをすべて取得（キー・値ともにデコード済み）
    ///
    /// GET・DELETE・HEAD・OPTIONS・TRACE ではクエリ文字列から、それ以外はボディから読む。
    /// ボディは `Content-Type` が無いか `application/x-www-form-urlencoded` の場合のみ解析する。
    fn form_params(&self) -> HashMap<String, String> {
        let reads_query = self
            .method_kind()
            .map_or(false, |m| m.reads_form_from_query());

        let source: Cow<'_, str> = if reads_query {
            Cow::Borrowed(self.query_string().unwrap_or_default())
        } else {
            match self.content_type() {
                Some(ct) if !is_form_urlencoded(ct) => {
                    warn!("Form body ignored for Content-Type '{}'", ct);
                    return HashMap::new();
                }
                _ => String::from_utf8_lossy(self.body()),
            }
        };

        parse_query_string(&source)
    }

    /// フォームパラメータを1つ取得
    fn form(&self, name: &str) -> Option<String> {
        self.form_params().remove(name)
    }

    /// `Accept` ヘッダーを品質値の降順に並んだリストとして取得
    fn acceptable_content_types(&self) -> AcceptList {
        negotiation::acceptable_content_types(self.header("Accept"))
    }

    /// 指定したContent-Typeを正の品質値で受理するか
    fn accepts(&self, content_type: &str) -> bool {
        self.acceptable_content_types().accepts(content_type)
    }

    /// 候補のうち最も受理されるContent-Typeのインデックス。無ければ `None`
    fn negotiate_content_type<S: AsRef<str>>(&self, candidates: &[S]) -> Option<usize>
    where
        Self: Sized,
    {
        self.acceptable_content_types().negotiate(candidates)
    }

    /// `Referer` ヘッダー
    fn referrer(&self) -> Option<&str> {
        self.header("Referer")
    }

    /// [`HttpRequest::referrer`] の別名
    fn referer(&self) -> Option<&str> {
        self.referrer()
    }

    /// `Cookie` ヘッダーのクッキー（値はデコード済み）
    fn cookies(&self) -> HashMap<String, String> {
        self.header("Cookie")
            .map(parse_cookie_header)
            .unwrap_or_default()
    }

    /// クッキーを1つ取得
    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies().remove(name)
    }

    /// ボディを文字列として取得（不正なUTF-8は置換）
    fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.body())
    }

    /// ボディをJSONとしてパース
    fn json<T: DeserializeOwned>(&self) -> Result<T, Error>
    where
        Self: Sized,
    {
        if self.body().is_empty() {
            return Err(Error::InvalidRequestBody("No request body".to_string()));
        }
        serde_json::from_slice(self.body()).map_err(|e| Error::InvalidRequestBody(e.to_string()))
    }
}

/// 絶対形式のURI（`http://host/path`）からパス以降を取り出す
fn origin_form(uri: &str) -> &str {
    let is_delimiter = |c: char| c == '/' || c == '?' || c == '#';
    match uri.split_once("://") {
        Some((scheme, rest)) if !scheme.is_empty() && !scheme.contains(is_delimiter) => {
            rest.find(is_delimiter).map_or("", |i| &rest[i..])
        }
        _ => uri,
    }
}

fn is_form_urlencoded(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .eq_ignore_ascii_case(FORM_URLENCODED)
}

/// HTTPレスポンスの抽象
pub trait HttpResponse {
    /// ステータス行を設定
    fn set_status(&mut self, version: &str, code: u16, reason: &str) -> Result<(), Error>;

    /// 現在のステータスコード
    fn status_code(&self) -> u16;

    /// ヘッダーを追加（同名の既存ヘッダーは上書きしない）
    fn add_header(&mut self, name: &str, value: &str) -> Result<(), Error>;

    /// ヘッダーを設定（同名の既存ヘッダーを置き換える）
    fn set_header(&mut self, name: &str, value: &str) -> Result<(), Error>;

    /// ヘッダーが送出済みか。送出後はヘッダーを変更できない
    fn headers_sent(&self) -> bool;

    /// ステータスコードを設定。理由句を省略すると標準のものを使う
    fn set_status_code(&mut self, code: u16, reason: Option<&str>) -> Result<(), Error> {
        let reason = reason.unwrap_or_else(|| default_reason_phrase(code));
        self.set_status(DEFAULT_HTTP_VERSION, code, reason)
    }

    /// `Content-Type` を設定
    fn set_content_type(&mut self, content_type: &str) -> Result<(), Error> {
        self.set_header("Content-Type", content_type)
    }

    /// クッキーを追加
    fn add_cookie(&mut self, cookie: &Cookie) -> Result<(), Error> {
        self.add_header("Set-Cookie", &cookie.to_header_value())
    }

    /// クライアントにクッキーの削除を指示
    fn delete_cookie(
        &mut self,
        name: &str,
        path: Option<&str>,
        domain: Option<&str>,
    ) -> Result<(), Error> {
        let mut cookie = Cookie::removal(name)?;
        cookie.path = path.map(str::to_string);
        cookie.domain = domain.map(str::to_string);
        self.add_cookie(&cookie)
    }

    /// リダイレクトを設定（ステータスと `Location`）
    ///
    /// 処理は継続するため、呼び出し側でボディを書かずに終了すること。
    fn redirect(&mut self, url: &str, code: u16, reason: Option<&str>) -> Result<(), Error> {
        if !(300..400).contains(&code) {
            warn!("redirect() called with non-3xx status {}", code);
        }
        self.set_status_code(code, reason)?;
        self.set_header("Location", url)
    }
}

/// 1リクエストを処理するハンドラー
#[async_trait]
pub trait Handler: Send + Sync {
    /// リクエストを処理し、レスポンスを組み立てる
    async fn handle(&self, req: &Request, res: &mut Response) -> Result<(), Error>;
}
