//! エラーログファイルへの記録と、ログに残す値のマスク処理

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use chrono::Local;
use log::warn;

use crate::common::utils::get_error_log_path;
use crate::common::{HttpRequest, Request};

const MAX_LOGGED_VALUE_LEN: usize = 200;
const REDACTED: &str = "***redacted***";

/// エラー内容を設定されたログファイルに追記する
pub fn log_error_to_file(message: &str) {
    log_error_to_path(get_error_log_path(), message);
}

/// エラー内容を指定したファイルに追記する
pub fn log_error_to_path(path: impl AsRef<Path>, message: &str) {
    let path = path.as_ref();
    let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC");
    let local_time = Local::now().format("%Y-%m-%d %H:%M:%S%.3f %Z");

    let mut file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!("Cannot open error log {}: {}", path.display(), e);
            return;
        }
    };

    let entry = format!(
        "{rule}\nJITSU CGI ERROR\nTimestamp (UTC): {timestamp}\nTimestamp (Local): {local_time}\n\
         Process ID: {pid}\n{thin}\n{message}\n{rule}\n\n",
        rule = "=".repeat(80),
        thin = "-".repeat(80),
        pid = std::process::id(),
    );
    if let Err(e) = file.write_all(entry.as_bytes()) {
        warn!("Cannot write error log {}: {}", path.display(), e);
    }
}

/// panic時に記録するリクエストの詳細（機密値はマスク）を構築
pub fn gather_panic_context(request: &Request) -> String {
    let mut lines = vec![
        "Request panic context:".to_string(),
        format!("  Method: {}", request.method()),
        format!("  Path: {}", redact_value_for_log("path", request.path())),
    ];

    if let Some(qs) = request.query_string() {
        lines.push(format!("  Query: {}", redact_query_string(qs)));
    }
    lines.push(format!("  Protocol: {}", request.protocol()));
    if let Some(addr) = request.origin_ip_address() {
        match request.origin_port() {
            Some(port) => lines.push(format!("  Remote: {}:{}", addr, port)),
            None => lines.push(format!("  Remote: {}", addr)),
        }
    }
    lines.push(format!("  Body: {} bytes", request.body().len()));
    lines.push(format!("  Received: {}", request.timestamp().to_rfc3339()));

    lines.push("  Headers:".to_string());
    if request.headers().is_empty() {
        lines.push("    (none)".to_string());
    }
    for (name, value) in request.headers() {
        lines.push(format!("    {}: {}", name, redact_value_for_log(name, value)));
    }

    lines.join("\n")
}

/// キー名から機密と判断される値をマスクし、長すぎる値は切り詰める
pub fn redact_value_for_log(key: &str, value: &str) -> String {
    let key_l = key.to_ascii_lowercase();
    if key_l == "query_string" {
        return redact_query_string(value);
    }
    if is_sensitive_key_like(&key_l) {
        return REDACTED.to_string();
    }
    match value.char_indices().nth(MAX_LOGGED_VALUE_LEN) {
        Some((cut, _)) => format!("{}...[truncated]", &value[..cut]),
        None => value.to_string(),
    }
}

pub fn is_sensitive_key_like(lower_key: &str) -> bool {
    const PATTERNS: [&str; 16] = [
        "authorization",
        "cookie",
        "token",
        "secret",
        "password",
        "pass",
        "api-key",
        "api_key",
        "apikey",
        "jwt",
        "auth",
        "session",
        "csrf",
        "signature",
        "private",
        "credential",
    ];
    PATTERNS.iter().any(|p| lower_key.contains(p))
}

pub fn redact_query_string(qs: &str) -> String {
    qs.split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (k, v) = part.split_once('=').unwrap_or((part, ""));
            if is_sensitive_key_like(&k.to_ascii_lowercase()) {
                format!("{}={}", k, REDACTED)
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}
