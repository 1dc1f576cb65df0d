//! CGI環境変数と標準入力からリクエストを構築する

use std::collections::HashMap;
use std::env;
use std::io::{self, Read};
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use log::{debug, warn};

use crate::common::utils::get_max_body_size;
use crate::common::{HttpRequest, Request, DEFAULT_HTTP_VERSION};
use crate::error::Error;
use super::validation::is_acceptable_request_header;

/// プロセスの環境変数をUTF-8として読めるものだけ取得する
pub fn cgi_env_vars() -> Vec<(String, String)> {
    env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// 現在のプロセス環境と標準入力からリクエストを構築する
pub fn request_from_env() -> Result<Request, Error> {
    let stdin = io::stdin();
    request_from_vars(cgi_env_vars(), stdin.lock(), get_max_body_size())
}

/// CGI変数とボディのリーダーからリクエストを構築する
///
/// `REQUEST_METHOD` が無い場合は [`Error::MissingEnvironment`]、
/// ボディが `max_body_size` を超える場合は [`Error::PayloadTooLarge`] を返す。
pub fn request_from_vars<I, R>(vars: I, body: R, max_body_size: usize) -> Result<Request, Error>
where
    I: IntoIterator<Item = (String, String)>,
    R: Read,
{
    let vars: HashMap<String, String> = vars.into_iter().collect();
    let var = |key: &str| lookup(&vars, key);

    let method = var("REQUEST_METHOD").ok_or_else(|| {
        Error::MissingEnvironment("REQUEST_METHOD environment variable not set".to_string())
    })?;

    let uri = request_uri(&vars);
    let protocol = var("SERVER_PROTOCOL").unwrap_or(DEFAULT_HTTP_VERSION);
    let scheme = match var("REQUEST_SCHEME") {
        Some(s) => s.to_ascii_lowercase(),
        None if var("HTTPS").map_or(false, |v| v.eq_ignore_ascii_case("on") || v == "1") => {
            "https".to_string()
        }
        None => "http".to_string(),
    };

    let mut request = Request::new(method, uri)
        .with_protocol(protocol)
        .with_scheme(scheme);

    for (name, value) in cgi_headers(&vars) {
        request = request.with_header(name, value);
    }

    if let Some(addr) = var("REMOTE_ADDR") {
        let port = var("REMOTE_PORT").and_then(|p| p.parse::<u16>().ok());
        request = request.with_origin(addr, port);
    }

    if let Some(ts) = var("REQUEST_TIME")
        .and_then(|t| t.parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    {
        request = request.with_timestamp(ts);
    }

    let body = read_request_body(var("CONTENT_LENGTH"), body, max_body_size)?;
    debug!(
        "CGI request: {} {} ({} body bytes)",
        request.method(),
        request.uri(),
        body.len()
    );
    Ok(request.with_body(body))
}

/// 空でないCGI変数の値
fn lookup<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// `REQUEST_URI` が無いサーバー向けに `SCRIPT_NAME` と `PATH_INFO` から組み立てる
fn request_uri(vars: &HashMap<String, String>) -> String {
    let var = |key: &str| lookup(vars, key);
    if let Some(uri) = var("REQUEST_URI") {
        return uri.to_string();
    }

    let mut uri = format!(
        "{}{}",
        var("SCRIPT_NAME").unwrap_or_default(),
        var("PATH_INFO").unwrap_or_default()
    );
    if uri.is_empty() {
        uri.push('/');
    }
    if let Some(qs) = var("QUERY_STRING") {
        uri.push('?');
        uri.push_str(qs);
    }
    uri
}

/// CGI変数からHTTPヘッダーを取り出す（名前順）
///
/// `HTTP_X_AUTH_TOKEN` は `X-Auth-Token` に、`CONTENT_TYPE` は `Content-Type` になる。
pub fn cgi_headers(vars: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = vars
        .iter()
        .filter_map(|(key, value)| {
            let raw_name = match key.strip_prefix("HTTP_") {
                Some(rest) => rest,
                None if key == "CONTENT_TYPE" || key == "CONTENT_LENGTH" => key.as_str(),
                None => return None,
            };
            let name = title_case_header(raw_name);
            if !is_acceptable_request_header(&name, value) {
                warn!("Skipping invalid CGI header variable: {}", key);
                return None;
            }
            Some((name, value.clone()))
        })
        .collect();

    headers.sort_by(|a, b| a.0.cmp(&b.0));
    headers
}

fn title_case_header(raw: &str) -> String {
    raw.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => {
                    c.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}

/// `CONTENT_LENGTH` バイトのボディを読み込む
///
/// 値が無い・数値でない・0の場合は空のボディを返す。
pub fn read_request_body<R: Read>(
    content_length: Option<&str>,
    mut reader: R,
    max_body_size: usize,
) -> Result<Bytes, Error> {
    let Some(content_length) = content_length.and_then(|s| s.trim().parse::<usize>().ok()) else {
        return Ok(Bytes::new());
    };
    if content_length == 0 {
        return Ok(Bytes::new());
    }

    if content_length > max_body_size {
        return Err(Error::PayloadTooLarge(format!(
            "Request body size {} bytes exceeds maximum allowed size {} bytes",
            content_length, max_body_size
        )));
    }

    let mut buffer = vec![0u8; content_length];
    reader.read_exact(&mut buffer).map_err(|e| {
        Error::InvalidRequestBody(format!("Failed to read request body: {}", e))
    })?;
    Ok(Bytes::from(buffer))
}
