// src/common のリクエスト/レスポンス型を公開APIから検証する統合テスト
use std::collections::HashMap;
use std::io::Write;

use jitsu_http::common::{
    Cookie, HttpRequest, HttpResponse, Method, Request, Response, SameSite, StatusCode,
};
use jitsu_http::error::Error;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct TestData {
    name: String,
    value: i32,
}

#[test]
fn test_request_accessors() {
    let req = Request::new("PATCH", "/api/items/1?fields=name")
        .with_scheme("https")
        .with_header("Host", "api.example.com")
        .with_header("Content-Type", "application/json")
        .with_header("Referer", "https://app.example.com/")
        .with_body(br#"{"name":"widget","value":3}"#.to_vec());

    assert_eq!(req.method_kind(), Some(Method::PATCH));
    assert_eq!(req.path(), "/api/items/1");
    assert_eq!(req.query_string(), Some("fields=name"));
    assert_eq!(req.full_url(), "https://api.example.com/api/items/1?fields=name");
    assert_eq!(req.referer(), Some("https://app.example.com/"));

    let data: TestData = req.json().unwrap();
    assert_eq!(data, TestData { name: "widget".to_string(), value: 3 });
    // JSONボディはフォームとして解釈しない
    assert!(req.form_params().is_empty());
}

#[test]
fn test_request_invalid_json() {
    let req = Request::new("POST", "/").with_body("{not json".as_bytes().to_vec());
    let result: Result<TestData, Error> = req.json();
    assert!(matches!(result, Err(Error::InvalidRequestBody(_))));
    assert_eq!(req.body_text(), "{not json");
}

#[test]
fn test_form_params_source_depends_on_method() {
    let get = Request::new("GET", "/search?q=rust+lang&page=2")
        .with_body("q=ignored".as_bytes().to_vec());
    let expected: HashMap<String, String> = [("q", "rust lang"), ("page", "2")]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(get.form_params(), expected);

    let post = Request::new("POST", "/search?q=ignored")
        .with_body("q=from+body".as_bytes().to_vec());
    assert_eq!(post.form("q"), Some("from body".to_string()));
}

#[test]
fn test_response_json_and_status() {
    let data = TestData { name: "test".to_string(), value: 42 };
    let res = Response::with_status(StatusCode::Created).json(&data).unwrap();

    assert_eq!(res.status(), 201);
    assert_eq!(res.header("content-type"), Some("application/json"));
    let parsed: TestData = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(parsed, data);
}

#[test]
fn test_response_text_html_and_security_headers() {
    let res = Response::ok().html("<p>hi</p>").security_headers();
    assert_eq!(res.header("Content-Type"), Some("text/html; charset=utf-8"));
    assert_eq!(res.header("X-Frame-Options"), Some("DENY"));
    assert_eq!(res.header("X-Content-Type-Options"), Some("nosniff"));

    let res = Response::not_found().text("gone");
    assert_eq!(res.status_line(), "HTTP/1.1 404 Not Found");
    assert_eq!(res.body(), b"gone");
}

#[test]
fn test_response_file() {
    let path = std::env::temp_dir().join(format!("jitsu_file_{}.txt", std::process::id()));
    std::fs::write(&path, "file body").unwrap();

    let res = Response::ok().file(&path, "text/plain").unwrap();
    assert_eq!(res.body(), b"file body");
    assert_eq!(res.header("Content-Type"), Some("text/plain"));
    std::fs::remove_file(&path).unwrap();

    let missing = Response::ok().file(&path, "text/plain");
    assert!(matches!(missing, Err(Error::Io(_))));
}

#[test]
fn test_response_as_output_buffer() {
    let mut res = Response::ok();
    res.set_content_type("text/csv").unwrap();
    writeln!(res, "id,name").unwrap();
    writeln!(res, "1,widget").unwrap();
    assert_eq!(res.body(), b"id,name\n1,widget\n");

    res.clear_body();
    res.set_status_code(204, None).unwrap();
    assert!(res.body().is_empty());
    assert_eq!(res.status_code(), 204);
}

#[test]
fn test_response_cookies_and_redirect() {
    let mut res = Response::ok();
    let cookie = Cookie::new("session", "abc123")
        .unwrap()
        .with_path("/")
        .secure(true)
        .http_only(true)
        .with_same_site(SameSite::Strict);
    res.add_cookie(&cookie).unwrap();
    res.add_cookie(&Cookie::encoded("note", "a b").unwrap()).unwrap();
    res.redirect("https://example.com/next", 307, None).unwrap();

    assert_eq!(
        res.header_values("Set-Cookie"),
        vec!["session=abc123; Path=/; Secure; HttpOnly; SameSite=Strict", "note=a%20b"]
    );
    assert_eq!(res.status_line(), "HTTP/1.1 307 Temporary Redirect");
    assert_eq!(res.header("Location"), Some("https://example.com/next"));
}

#[test]
fn test_header_injection_is_rejected() {
    let mut res = Response::ok();
    assert!(matches!(
        res.add_header("X-Test", "ok\r\nSet-Cookie: pwned=1"),
        Err(Error::InvalidHeader(_))
    ));
    assert!(matches!(res.set_content_type("text/html\n"), Err(Error::InvalidHeader(_))));
    assert!(res.headers().is_empty());

    let res = Response::ok().with_header("X-Bad", "line\nbreak");
    assert!(res.header("X-Bad").is_none());
}
