//! CGIレスポンスの出力機能
//!
//! 最初のフラッシュで `Status:` 行とヘッダーを書き出し、以降は出力バッファの
//! 中身だけを追記する。

use std::io::{self, Write};
use log::error;

use crate::common::{default_reason_phrase, HttpResponse, Response};
use crate::error::Error;
use super::validation::{is_valid_header_name, is_valid_header_value, is_valid_reason_phrase};
use super::error_logging::log_error_to_file;

/// フレームワーク側で付与するため、ユーザー指定を無視するヘッダー
const RESERVED_HEADERS: [&str; 2] = ["Status", "Content-Length"];

/// これまでに書き込まれたボディを送出する（初回はヘッダーも送出）
///
/// 以後、レスポンスのステータスとヘッダーは変更できない。
pub fn flush_response_to<W: Write>(response: &mut Response, out: &mut W) -> Result<(), Error> {
    if !response.headers_sent() {
        write_head(response, out, false)?;
    }
    let body = response.take_body();
    out.write_all(&body)?;
    out.flush()?;
    Ok(())
}

/// レスポンスを完了させる
///
/// ヘッダーが未送出であれば `Content-Length` 付きで全体を書き出す。
pub fn finish_response_to<W: Write>(mut response: Response, out: &mut W) -> Result<(), Error> {
    if !response.headers_sent() {
        write_head(&mut response, out, true)?;
    }
    let body = response.take_body();
    out.write_all(&body)?;
    out.flush()?;
    Ok(())
}

/// レスポンスを標準出力へ書き出して完了させる
pub fn finish_response(response: Response) -> Result<(), Error> {
    let mut out = io::stdout().lock();
    finish_response_to(response, &mut out)
}

/// `Status:` 行とヘッダーを書き出す
///
/// 不正なヘッダーが含まれていた場合は、レスポンス全体を400に差し替える。
fn write_head<W: Write>(
    response: &mut Response,
    out: &mut W,
    with_length: bool,
) -> Result<(), Error> {
    if let Some((name, value)) = first_invalid_header(response) {
        error!("Invalid header detected - name: {:?}, value: {:?}", name, value);
        log_error_to_file(&format!(
            "CRLF injection attempt detected in header: {:?}: {:?}",
            name, value
        ));
        *response = Response::bad_request()
            .with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(b"Bad Request: Invalid header".to_vec());
    }

    let code = response.status();
    let reason = if is_valid_reason_phrase(response.reason()) {
        response.reason()
    } else {
        default_reason_phrase(code)
    };
    let status_line = if reason.is_empty() {
        format!("Status: {}\r\n", code)
    } else {
        format!("Status: {} {}\r\n", code, reason)
    };
    out.write_all(status_line.as_bytes())
        .map_err(|e| Error::InternalServerError(format!("Failed to write status line: {}", e)))?;

    for (name, value) in response.headers() {
        if is_reserved(name) {
            continue;
        }
        out.write_all(format!("{}: {}\r\n", name, value).as_bytes())
            .map_err(|e| Error::InternalServerError(format!("Failed to write header: {}", e)))?;
    }

    if with_length {
        out.write_all(format!("Content-Length: {}\r\n", response.body().len()).as_bytes())
            .map_err(|e| {
                Error::InternalServerError(format!("Failed to write Content-Length: {}", e))
            })?;
    }

    // ヘッダーとボディの区切り
    out.write_all(b"\r\n")?;
    response.mark_headers_sent();
    Ok(())
}

fn is_reserved(name: &str) -> bool {
    RESERVED_HEADERS.iter().any(|r| name.eq_ignore_ascii_case(r))
}

fn first_invalid_header(response: &Response) -> Option<(String, String)> {
    response
        .headers()
        .iter()
        .filter(|(name, _)| !is_reserved(name))
        .find(|(name, value)| !is_valid_header_name(name) || !is_valid_header_value(value))
        .cloned()
}
