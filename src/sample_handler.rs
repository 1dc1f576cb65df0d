//! サンプルハンドラの実装
//!
//! CGIバイナリの動作確認用。`Accept` ヘッダーに応じて表現を切り替える。

use std::collections::BTreeMap;
use std::io::Write;
use async_trait::async_trait;
use log::info;
use serde::Serialize;

use jitsu_http::common::{Cookie, Handler, HttpRequest, HttpResponse, Request, Response, SameSite};
use jitsu_http::error::Error;

/// トップページが提供する表現（優先順）
const OFFERED_TYPES: [&str; 3] = ["application/json", "text/html", "text/plain"];

#[derive(Serialize)]
struct Greeting<'a> {
    message: &'a str,
    version: &'a str,
    visits: u32,
}

#[derive(Serialize)]
struct Echo {
    method: String,
    path: String,
    query: Option<String>,
    form: BTreeMap<String, String>,
    cookies: BTreeMap<String, String>,
    accept: Vec<(String, f64)>,
}

/// ルーティングを持つサンプルハンドラ
pub struct SampleHandler;

impl SampleHandler {
    pub fn new() -> Self {
        Self
    }

    /// `/` : JSON・HTML・テキストのいずれかで挨拶を返す
    fn greet(&self, req: &Request, res: &mut Response) -> Result<(), Error> {
        let idx = req.negotiate_content_type(&OFFERED_TYPES).ok_or_else(|| {
            Error::NotAcceptable(req.header_or("Accept", "").to_string())
        })?;

        let visits = req
            .cookie("visits")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0)
            + 1;
        let greeting = Greeting {
            message: "Hello from Jitsu CGI",
            version: env!("CARGO_PKG_VERSION"),
            visits,
        };

        res.set_header("Vary", "Accept")?;
        res.add_cookie(
            &Cookie::new("visits", visits.to_string())?
                .with_path("/")
                .http_only(true)
                .with_same_site(SameSite::Lax),
        )?;

        match OFFERED_TYPES[idx] {
            "application/json" => {
                res.set_content_type("application/json")?;
                let body = serde_json::to_vec(&greeting)
                    .map_err(|e| Error::ResponseSerializationError(e.to_string()))?;
                res.write_all(&body)?;
            }
            "text/html" => {
                res.set_content_type("text/html; charset=utf-8")?;
                write!(
                    res,
                    "<!DOCTYPE html><html><body><h1>{}</h1><p>visits: {}</p></body></html>",
                    greeting.message, greeting.visits
                )?;
            }
            _ => {
                res.set_content_type("text/plain; charset=utf-8")?;
                write!(res, "{} (visits: {})", greeting.message, greeting.visits)?;
            }
        }
        Ok(())
    }

    /// `/echo` : 受け取ったフォーム・クッキー・Acceptを返す
    fn echo(&self, req: &Request, res: &mut Response) -> Result<(), Error> {
        let echo = Echo {
            method: req.method(),
            path: req.path().to_string(),
            query: req.query_string().map(str::to_string),
            form: req.form_params().into_iter().collect(),
            cookies: req.cookies().into_iter().collect(),
            accept: req
                .acceptable_content_types()
                .iter()
                .map(|e| (e.pattern().to_string(), e.quality()))
                .collect(),
        };
        *res = Response::ok().json_pretty(&echo)?;
        Ok(())
    }
}

impl Default for SampleHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for SampleHandler {
    async fn handle(&self, req: &Request, res: &mut Response) -> Result<(), Error> {
        info!("Handling {} {}", req.method(), req.path());
        match req.path() {
            "/" => self.greet(req, res),
            "/echo" => self.echo(req, res),
            "/redirect" => res.redirect("/", 302, None),
            "/logout" => {
                res.set_status_code(204, None)?;
                res.delete_cookie("visits", Some("/"), None)
            }
            "/panic" => panic!("Test panic from handler"),
            _ => {
                *res = Response::not_found().text("Not Found");
                Ok(())
            }
        }
    }
}
