#![cfg(feature = "cgi")]

//! CGI機能の統合テスト
//!
//! CGIバイナリを環境変数と標準入力付きで起動し、標準出力を検証する。

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

fn error_log_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("jitsu_it_{}_{}.log", name, std::process::id()))
}

fn run_cgi(name: &str, env_vars: &[(&str, &str)], stdin_data: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_jitsu-cgi"))
        .env_clear()
        .env("JITSU_ERROR_LOG", error_log_path(name))
        .env("RUST_LOG", "warn")
        .envs(env_vars.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn CGI process");

    {
        let mut stdin = child.stdin.take().expect("Failed to open stdin");
        stdin.write_all(stdin_data).expect("Failed to write to stdin");
    }

    child.wait_with_output().expect("Failed to wait for CGI process")
}

fn split_response(output: &Output) -> (String, String) {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let (head, body) = stdout
        .split_once("\r\n\r\n")
        .expect("response has no header/body separator");
    (head.to_string(), body.to_string())
}

#[test]
fn test_negotiates_json_by_default() {
    let output = run_cgi(
        "json",
        &[
            ("REQUEST_METHOD", "GET"),
            ("REQUEST_URI", "/"),
            ("HTTP_ACCEPT", "text/html;q=0.8, application/json"),
        ],
        b"",
    );
    assert!(output.status.success());

    let (head, body) = split_response(&output);
    assert!(head.starts_with("Status: 200 OK"));
    assert!(head.contains("Content-Type: application/json"));
    assert!(head.contains("Vary: Accept"));
    assert!(head.contains("Set-Cookie: visits=1; Path=/; HttpOnly; SameSite=Lax"));
    assert!(head.contains(&format!("Content-Length: {}", body.len())));

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["message"], "Hello from Jitsu CGI");
    assert_eq!(json["visits"], 1);
}

#[test]
fn test_negotiates_html_with_wildcard() {
    let output = run_cgi(
        "html",
        &[
            ("REQUEST_METHOD", "GET"),
            ("PATH_INFO", "/"),
            ("HTTP_ACCEPT", "text/*, */*;q=0.1"),
            ("HTTP_COOKIE", "visits=4"),
        ],
        b"",
    );

    let (head, body) = split_response(&output);
    assert!(head.contains("Content-Type: text/html; charset=utf-8"));
    assert!(head.contains("Set-Cookie: visits=5;"));
    assert!(body.contains("visits: 5"));
}

#[test]
fn test_not_acceptable() {
    let output = run_cgi(
        "notacceptable",
        &[
            ("REQUEST_METHOD", "GET"),
            ("REQUEST_URI", "/"),
            ("HTTP_ACCEPT", "image/png, application/xml;q=0.9"),
        ],
        b"",
    );

    let (head, body) = split_response(&output);
    assert!(head.starts_with("Status: 406 Not Acceptable"));
    assert_eq!(body, "Not Acceptable");
}

#[test]
fn test_echo_post_form() {
    let body = b"title=Hello%2C+world&lang=ja";
    let length = body.len().to_string();
    let output = run_cgi(
        "echo",
        &[
            ("REQUEST_METHOD", "POST"),
            ("REQUEST_URI", "/echo?ignored=1"),
            ("CONTENT_TYPE", "application/x-www-form-urlencoded"),
            ("CONTENT_LENGTH", &length),
            ("HTTP_COOKIE", "sid=abc; name=J%C3%B6rg"),
        ],
        body,
    );

    let (head, body) = split_response(&output);
    assert!(head.starts_with("Status: 200 OK"));

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["method"], "POST");
    assert_eq!(json["path"], "/echo");
    assert_eq!(json["query"], "ignored=1");
    assert_eq!(json["form"]["title"], "Hello, world");
    assert!(json["form"].get("ignored").is_none());
    assert_eq!(json["cookies"]["name"], "Jörg");
    assert_eq!(json["accept"], serde_json::json!([]));
}

#[test]
fn test_redirect_and_logout() {
    let output = run_cgi(
        "redirect",
        &[("REQUEST_METHOD", "GET"), ("REQUEST_URI", "/redirect")],
        b"",
    );
    let (head, _) = split_response(&output);
    assert!(head.starts_with("Status: 302 Found"));
    assert!(head.contains("Location: /"));

    let output = run_cgi(
        "logout",
        &[("REQUEST_METHOD", "GET"), ("REQUEST_URI", "/logout")],
        b"",
    );
    let (head, _) = split_response(&output);
    assert!(head.starts_with("Status: 204 No Content"));
    assert!(head.contains("Set-Cookie: visits=; Path=/; Expires=Thu, 01 Jan 1970 00:00:01 GMT; Max-Age=0"));
}

#[test]
fn test_unknown_path() {
    let output = run_cgi(
        "notfound",
        &[("REQUEST_METHOD", "GET"), ("REQUEST_URI", "/missing")],
        b"",
    );
    let (head, body) = split_response(&output);
    assert!(head.starts_with("Status: 404 Not Found"));
    assert_eq!(body, "Not Found");
}

#[test]
fn test_payload_too_large() {
    let output = run_cgi(
        "toolarge",
        &[
            ("REQUEST_METHOD", "POST"),
            ("REQUEST_URI", "/echo"),
            ("CONTENT_LENGTH", "64"),
            ("JITSU_MAX_BODY_SIZE", "16"),
        ],
        &[b'x'; 64],
    );
    let (head, body) = split_response(&output);
    assert!(head.starts_with("Status: 413 Payload Too Large"));
    assert_eq!(body, "Payload Too Large");
}

#[test]
fn test_panic_is_logged_and_returns_500() {
    let log_path = error_log_path("panic");
    let _ = std::fs::remove_file(&log_path);

    let output = run_cgi(
        "panic",
        &[
            ("REQUEST_METHOD", "GET"),
            ("REQUEST_URI", "/panic?api_key=hunter2"),
            ("HTTP_AUTHORIZATION", "Bearer secret"),
        ],
        b"",
    );

    let (head, body) = split_response(&output);
    assert!(head.starts_with("Status: 500 Internal Server Error"));
    assert_eq!(body, "Internal Server Error");

    let logged = std::fs::read_to_string(&log_path).unwrap();
    assert!(logged.contains("panic occurred in handler at GET /panic"));
    assert!(logged.contains("Authorization: ***redacted***"));
    assert!(!logged.contains("hunter2"));
    assert!(!logged.contains("Bearer secret"));
    let _ = std::fs::remove_file(&log_path);
}

#[test]
fn test_missing_request_method_fails() {
    let output = run_cgi("nomethod", &[("REQUEST_URI", "/")], b"");
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
