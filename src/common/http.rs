//! HTTP関連の基本型（メソッド、ステータス、リクエスト、レスポンス）

use std::fmt;
use std::fs;
use std::io;
use std::mem;
use std::path::Path;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;
use crate::error::Error;
use super::traits::{HttpRequest, HttpResponse, DEFAULT_HTTP_VERSION};
use super::utils::{is_header_value_valid, validate_header};

/// HTTPステータスコード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    // 2xx Success
    Ok = 200,
    Created = 201,
    NoContent = 204,

    // 3xx Redirection
    MovedPermanently = 301,
    Found = 302,
    SeeOther = 303,
    NotModified = 304,
    TemporaryRedirect = 307,
    PermanentRedirect = 308,

    // 4xx Client Error
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    NotAcceptable = 406,
    Conflict = 409,
    PayloadTooLarge = 413,
    UnprocessableEntity = 422,
    TooManyRequests = 429,

    // 5xx Server Error
    InternalServerError = 500,
    NotImplemented = 501,
    BadGateway = 502,
    ServiceUnavailable = 503,
}

impl StatusCode {
    /// u16の値を取得
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// 理由句を取得
    pub fn reason_phrase(&self) -> &'static str {
        default_reason_phrase(self.as_u16())
    }

    /// 成功ステータスかどうか判定
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }

    /// リダイレクトかどうか判定
    pub fn is_redirection(&self) -> bool {
        (300..400).contains(&self.as_u16())
    }

    /// クライアントエラーかどうか判定
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.as_u16())
    }

    /// サーバーエラーかどうか判定
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.as_u16())
    }
}

impl From<StatusCode> for u16 {
    fn from(status: StatusCode) -> u16 {
        status.as_u16()
    }
}

/// ステータスコードに対応する標準の理由句（未知のコードは空文字列）
pub fn default_reason_phrase(code: u16) -> &'static str {
    ::http::StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

/// HTTPメソッド
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
    TRACE,
    CONNECT,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::GET => write!(f, "GET"),
            Method::POST => write!(f, "POST"),
            Method::PUT => write!(f, "PUT"),
            Method::DELETE => write!(f, "DELETE"),
            Method::PATCH => write!(f, "PATCH"),
            Method::HEAD => write!(f, "HEAD"),
            Method::OPTIONS => write!(f, "OPTIONS"),
            Method::TRACE => write!(f, "TRACE"),
            Method::CONNECT => write!(f, "CONNECT"),
        }
    }
}

impl Method {
    /// 文字列からMethodに変換（大文字小文字は区別しない）
    pub fn from_str(method: &str) -> Option<Self> {
        match method.to_uppercase().as_str() {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "PATCH" => Some(Method::PATCH),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            "TRACE" => Some(Method::TRACE),
            "CONNECT" => Some(Method::CONNECT),
            _ => None,
        }
    }

    /// フォームパラメータをクエリ文字列から読むメソッドか
    pub fn reads_form_from_query(&self) -> bool {
        matches!(
            self,
            Method::GET | Method::DELETE | Method::HEAD | Method::OPTIONS | Method::TRACE
        )
    }
}

/// ヘッダー名を大文字小文字を区別せずに検索
pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// HTTPリクエスト
///
/// 実行環境から一度だけ読み取った不変のリクエスト情報。
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    uri: String,
    protocol: String,
    scheme: String,
    /// 元のヘッダー名と値（到着順）
    headers: Vec<(String, String)>,
    body: Bytes,
    origin_ip_address: Option<String>,
    origin_port: Option<u16>,
    timestamp: DateTime<Utc>,
}

impl Request {
    /// 新しいリクエストを作成
    ///
    /// `uri` はパスとクエリ文字列からなる生の値（デコードしない）。
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            protocol: DEFAULT_HTTP_VERSION.to_string(),
            scheme: "http".to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
            origin_ip_address: None,
            origin_port: None,
            timestamp: Utc::now(),
        }
    }

    /// プロトコル文字列を設定
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// スキームを設定
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// ヘッダーを設定（同名のヘッダーは置き換える）
    ///
    /// 無効な名前・値のヘッダーは警告を出して無視する。
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if let Err(e) = validate_header(&name, &value) {
            warn!("Request::with_header dropped header: {}", e);
            return self;
        }
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value));
        self
    }

    /// ボディを設定
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// 接続元のアドレスとポートを設定
    pub fn with_origin(mut self, ip_address: impl Into<String>, port: Option<u16>) -> Self {
        self.origin_ip_address = Some(ip_address.into());
        self.origin_port = port;
        self
    }

    /// リクエスト開始時刻を設定
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// リクエスト開始時刻
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// ボディを共有バッファとして取得
    pub fn body_bytes(&self) -> Bytes {
        self.body.clone()
    }
}

impl HttpRequest for Request {
    fn raw_method(&self) -> &str {
        &self.method
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    fn origin_ip_address(&self) -> Option<&str> {
        self.origin_ip_address.as_deref()
    }

    fn origin_port(&self) -> Option<u16> {
        self.origin_port
    }
}

/// HTTPレスポンス
///
/// ステータス・ヘッダー・ボディを蓄積し、プラットフォームへ出力するまで保持する。
/// ボディは出力バッファとして `std::io::Write` で追記できる。
/// ヘッダーが送出された後はステータスとヘッダーを変更できない。
#[derive(Debug, Clone)]
pub struct Response {
    version: String,
    status: u16,
    reason: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    headers_sent: bool,
}

impl Response {
    /// 新しいレスポンスを作成
    pub fn new(status: u16) -> Self {
        Self {
            version: DEFAULT_HTTP_VERSION.to_string(),
            status,
            reason: default_reason_phrase(status).to_string(),
            headers: Vec::new(),
            body: Vec::new(),
            headers_sent: false,
        }
    }

    /// StatusCodeから新しいレスポンスを作成
    pub fn with_status(status: StatusCode) -> Self {
        Self::new(status.as_u16())
    }

    /// 200 OKレスポンスを作成
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// 201 Createdレスポンスを作成
    pub fn created() -> Self {
        Self::new(201)
    }

    /// 204 No Contentレスポンスを作成
    pub fn no_content() -> Self {
        Self::new(204)
    }

    /// 400 Bad Requestレスポンスを作成
    pub fn bad_request() -> Self {
        Self::new(400)
    }

    /// 404 Not Foundレスポンスを作成
    pub fn not_found() -> Self {
        Self::new(404)
    }

    /// 406 Not Acceptableレスポンスを作成
    pub fn not_acceptable() -> Self {
        Self::new(406)
    }

    /// 500 Internal Server Errorレスポンスを作成
    pub fn internal_server_error() -> Self {
        Self::new(500)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// ステータス行（例: `HTTP/1.1 404 Not Found`）
    pub fn status_line(&self) -> String {
        if self.reason.is_empty() {
            format!("{} {}", self.version, self.status)
        } else {
            format!("{} {} {}", self.version, self.status, self.reason)
        }
    }

    /// 最初に設定された同名ヘッダーの値
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// 同名ヘッダーの値をすべて取得（Set-Cookieなど）
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// 全ヘッダー（設定順）
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// 同名ヘッダーをすべて削除
    pub fn remove_header(&mut self, name: &str) -> Result<(), Error> {
        self.ensure_headers_unsent(name)?;
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        Ok(())
    }

    /// ヘッダーを設定（同名は置き換え）。無効な値は警告を出して無視する
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if let Err(e) = self.set_header(&name, &value) {
            warn!("Response::with_header ignored header '{}': {}", name, e);
        }
        self
    }

    /// ボディを置き換える
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// JSONをボディとして設定
    pub fn json<T: Serialize>(self, value: &T) -> Result<Self, Error> {
        self.json_with(value, false)
    }

    /// 整形したJSONをボディとして設定
    pub fn json_pretty<T: Serialize>(self, value: &T) -> Result<Self, Error> {
        self.json_with(value, true)
    }

    fn json_with<T: Serialize>(mut self, value: &T, pretty: bool) -> Result<Self, Error> {
        let json = if pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        }
        .map_err(|e| Error::ResponseSerializationError(e.to_string()))?;

        self.set_header("Content-Type", "application/json")?;
        self.body = json;
        Ok(self)
    }

    /// テキストボディを設定
    pub fn text(self, text: impl Into<String>) -> Self {
        self.with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(text.into().into_bytes())
    }

    /// HTMLボディを設定
    pub fn html(self, html: impl Into<String>) -> Self {
        self.with_header("Content-Type", "text/html; charset=utf-8")
            .with_body(html.into().into_bytes())
    }

    /// ファイルの内容をボディとして設定
    pub fn file(mut self, path: impl AsRef<Path>, content_type: &str) -> Result<Self, Error> {
        let data = fs::read(path.as_ref())?;
        self.set_header("Content-Type", content_type)?;
        self.body = data;
        Ok(self)
    }

    /// 標準的なセキュリティヘッダーを一括追加
    pub fn security_headers(self) -> Self {
        self.with_header("X-Content-Type-Options", "nosniff")
            .with_header("X-Frame-Options", "DENY")
            .with_header("Referrer-Policy", "strict-origin-when-cross-origin")
            .with_header("Content-Security-Policy", "default-src 'self'")
    }

    /// 出力バッファ（未送出のボディ）
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// 出力バッファを破棄
    pub fn clear_body(&mut self) {
        self.body.clear();
    }

    /// 出力バッファを取り出して空にする
    pub(crate) fn take_body(&mut self) -> Vec<u8> {
        mem::take(&mut self.body)
    }

    pub(crate) fn mark_headers_sent(&mut self) {
        self.headers_sent = true;
    }

    fn ensure_headers_unsent(&self, what: &str) -> Result<(), Error> {
        if self.headers_sent {
            return Err(Error::HeadersAlreadySent(format!(
                "cannot modify '{}' after headers were sent",
                what
            )));
        }
        Ok(())
    }

    /// Error型から固定メッセージのレスポンスを生成
    pub fn from_error(error: &Error) -> Self {
        let status = error.status_code();
        let message = match status {
            500..=599 => "Internal Server Error",
            _ => match default_reason_phrase(status) {
                "" => "Error",
                phrase => phrase,
            },
        };
        Response::new(status)
            .with_header("Content-Type", "text/plain")
            .with_body(message.as_bytes().to_vec())
    }
}

impl io::Write for Response {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl HttpResponse for Response {
    fn set_status(&mut self, version: &str, code: u16, reason: &str) -> Result<(), Error> {
        self.ensure_headers_unsent("status")?;
        if ::http::StatusCode::from_u16(code).is_err() {
            return Err(Error::InvalidHeader(format!("invalid status code: {}", code)));
        }
        if version.is_empty() || !is_header_value_valid(version) || !is_header_value_valid(reason) {
            return Err(Error::InvalidHeader(format!(
                "invalid status line: {:?} {} {:?}",
                version, code, reason
            )));
        }
        self.version = version.to_string();
        self.status = code;
        self.reason = reason.to_string();
        Ok(())
    }

    fn status_code(&self) -> u16 {
        self.status
    }

    fn add_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        self.ensure_headers_unsent(name)?;
        validate_header(name, value)?;
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        self.ensure_headers_unsent(name)?;
        validate_header(name, value)?;
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn headers_sent(&self) -> bool {
        self.headers_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_method_from_str() {
        assert_eq!(Method::from_str("GET"), Some(Method::GET));
        assert_eq!(Method::from_str("get"), Some(Method::GET));
        assert_eq!(Method::from_str("Trace"), Some(Method::TRACE));
        assert_eq!(Method::from_str("PROPFIND"), None);
        assert!(Method::DELETE.reads_form_from_query());
        assert!(!Method::PATCH.reads_form_from_query());
    }

    #[test]
    fn test_status_code() {
        assert_eq!(StatusCode::NotAcceptable.as_u16(), 406);
        assert_eq!(StatusCode::NotAcceptable.reason_phrase(), "Not Acceptable");
        assert_eq!(StatusCode::Found.reason_phrase(), "Found");
        assert!(StatusCode::SeeOther.is_redirection());
        assert!(StatusCode::PayloadTooLarge.is_client_error());
        assert!(StatusCode::BadGateway.is_server_error());
        assert!(StatusCode::Created.is_success());
        assert_eq!(default_reason_phrase(799), "");
        let status_u16: u16 = StatusCode::Ok.into();
        assert_eq!(status_u16, 200);
    }

    #[test]
    fn test_request_header_lookup_is_case_insensitive() {
        let req = Request::new("GET", "/")
            .with_header("Accept", "text/html")
            .with_header("accept", "application/json")
            .with_header("X-Bad", "bad\r\ninjected: 1");

        assert_eq!(req.header("ACCEPT"), Some("application/json"));
        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.header("x-bad"), None);
    }

    #[test]
    fn test_response_status_line() {
        let mut res = Response::new(404);
        assert_eq!(res.status_line(), "HTTP/1.1 404 Not Found");

        res.set_status("HTTP/1.0", 299, "").unwrap();
        assert_eq!(res.status_line(), "HTTP/1.0 299");

        assert!(res.set_status("HTTP/1.1", 42, "Nope").is_err());
        assert!(res.set_status("HTTP/1.1", 200, "OK\r\nX: y").is_err());
    }

    #[test]
    fn test_response_headers_append_and_replace() {
        let mut res = Response::ok();
        res.add_header("Set-Cookie", "a=1").unwrap();
        res.add_header("Set-Cookie", "b=2").unwrap();
        res.set_header("X-One", "1").unwrap();
        res.set_header("x-one", "2").unwrap();

        assert_eq!(res.header_values("set-cookie"), vec!["a=1", "b=2"]);
        assert_eq!(res.header_values("X-One"), vec!["2"]);

        res.remove_header("SET-COOKIE").unwrap();
        assert!(res.header("Set-Cookie").is_none());
        assert!(res.add_header("Bad Name", "v").is_err());
    }

    #[test]
    fn test_response_output_buffer() {
        let mut res = Response::ok();
        write!(res, "Hello, ").unwrap();
        res.write_all(b"world").unwrap();
        assert_eq!(res.body(), b"Hello, world");

        res.clear_body();
        assert!(res.body().is_empty());
    }

    #[test]
    fn test_headers_locked_after_sent() {
        let mut res = Response::ok();
        res.mark_headers_sent();

        assert!(matches!(res.add_header("X-Late", "1"), Err(Error::HeadersAlreadySent(_))));
        assert!(matches!(res.set_status("HTTP/1.1", 500, "x"), Err(Error::HeadersAlreadySent(_))));
        // ボディは書き込める
        res.write_all(b"streamed").unwrap();
        assert_eq!(res.take_body(), b"streamed".to_vec());
        assert!(res.body().is_empty());
    }

    #[test]
    fn test_response_from_error() {
        let res = Response::from_error(&Error::NotAcceptable("text/csv".into()));
        assert_eq!(res.status(), 406);
        assert_eq!(res.body(), b"Not Acceptable");

        let res = Response::from_error(&Error::PayloadTooLarge("big".into()));
        assert_eq!(res.status(), 413);
        assert_eq!(res.body(), b"Payload Too Large");

        let res = Response::from_error(&Error::HeadersAlreadySent("x".into()));
        assert_eq!(res.status(), 500);
        assert_eq!(res.body(), b"Internal Server Error");
    }
}
