//! 共通ユーティリティ関数群（URLエンコード/デコード、フォーム解析、環境設定 等）

use std::collections::HashMap;
use std::env;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use crate::error::Error;

/// リクエストボディ上限の環境変数名
pub const MAX_BODY_SIZE_ENV: &str = "JITSU_MAX_BODY_SIZE";

/// エラーログ出力先の環境変数名
pub const ERROR_LOG_ENV: &str = "JITSU_ERROR_LOG";

/// 非予約文字（英数字と `-` `_` `.` `~`）以外をエンコードする集合
const COMPONENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// URLエンコーディングのデコード関数（`+` はスペースとして扱う）
///
/// 不正な `%` シーケンスはそのまま残し、不正なUTF-8は置換文字にする。
pub fn percent_decode(input: &str) -> String {
    let spaced = input.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// 非予約文字以外をパーセントエンコードする
pub fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT_ENCODE_SET).to_string()
}

/// `application/x-www-form-urlencoded` 形式の文字列をパースする
///
/// 同じキーが複数ある場合は後の値で上書きする。
pub fn parse_query_string(query_string: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    if query_string.is_empty() {
        return params;
    }

    for pair in query_string.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key.is_empty() {
            continue;
        }
        params.insert(percent_decode(key), percent_decode(value));
    }

    params
}

/// リクエストボディの最大サイズ（バイト）を取得する
/// 優先順位: 環境変数 `JITSU_MAX_BODY_SIZE` -> デフォルト 5MB
pub fn get_max_body_size() -> usize {
    const DEFAULT_MAX_SIZE: usize = 5 * 1024 * 1024; // 5MB
    env::var(MAX_BODY_SIZE_ENV)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_SIZE)
}

/// エラーログファイルのパスを取得する
/// 優先順位: 環境変数 `JITSU_ERROR_LOG` -> `jitsu_error.log`
pub fn get_error_log_path() -> String {
    env::var(ERROR_LOG_ENV)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "jitsu_error.log".to_string())
}

/// ヘッダー値に使用可能な文字かを判定（CRLF・制御文字を拒否）
pub fn is_header_value_valid(value: &str) -> bool {
    // HTABは許容し、それ以外の制御文字(0x00-0x1F, 0x7F)を拒否する
    value.chars().all(|c| {
        let code = c as u32;
        c == '\t' || (code >= 0x20 && code != 0x7F)
    })
}

/// ヘッダー名がトークンとして妥当か
pub fn is_header_name_valid(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    // token = 1*tchar, tchar = "!#$%&'*+-.^_`|~" or DIGIT or ALPHA
    const TCHAR_SYMBOLS: &str = "!#$%&'*+-.^_`|~";
    name.chars().all(|c| c.is_ascii_alphanumeric() || TCHAR_SYMBOLS.contains(c))
}

/// Cookie名が安全なトークンか（RFC6265準拠の簡易版）
pub fn is_cookie_name_valid(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    const FORBIDDEN: &[char] = &[
        '(', ')', '<', '>', '@', ',', ';', ':', '\\', '"', '/', '[', ']', '?', '{', '}', '=', ' ',
        '\t', '\r', '\n',
    ];
    name.chars().all(|c| c.is_ascii() && !c.is_ascii_control() && !FORBIDDEN.contains(&c))
}

/// Cookie値が安全か（RFC6265 cookie-octetの簡易版）
/// 許容: 0x21, 0x23-0x2B, 0x2D-0x3A, 0x3C-0x5B, 0x5D-0x7E
pub fn is_cookie_value_valid(value: &str) -> bool {
    value.chars().all(|c| {
        let b = c as u32;
        matches!(b,
            0x21 |
            0x23..=0x2B |
            0x2D..=0x3A |
            0x3C..=0x5B |
            0x5D..=0x7E
        )
    })
}

/// 無効なヘッダー名/値ならErrorを返す
pub fn validate_header(name: &str, value: &str) -> Result<(), Error> {
    if !is_header_name_valid(name) {
        return Err(Error::InvalidHeader(format!("invalid header name: {:?}", name)));
    }
    if !is_header_value_valid(value) {
        return Err(Error::InvalidHeader(format!(
            "header value for '{}' contains control/CRLF characters",
            name
        )));
    }
    Ok(())
}

/// 無効なCookie名/値ならErrorを返す
pub fn validate_cookie_name_value(name: &str, value: &str) -> Result<(), Error> {
    if !is_cookie_name_valid(name) {
        return Err(Error::InvalidCookie("cookie name contains invalid characters".into()));
    }
    if !is_cookie_value_valid(value) {
        return Err(Error::InvalidCookie("cookie value contains invalid characters".into()));
    }
    Ok(())
}
