//! CGIメイン実行ロジック

use std::io::{self, Read};
use std::mem;
use std::sync::Arc;
use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use tokio::task;

use crate::common::utils::get_max_body_size;
use crate::common::{Handler, HttpRequest, HttpResponse, Request, Response};
use crate::error::Error;
use super::error_logging::{gather_panic_context, log_error_to_file};
use super::request::{cgi_env_vars, request_from_vars};
use super::response::finish_response;

/// 環境変数と標準入力からリクエストを読み取り、ハンドラーで処理して標準出力へ書き出す
pub async fn run_cgi<H>(handler: H) -> Result<(), Error>
where
    H: Handler + 'static,
{
    let stdin = io::stdin();
    let response = handle_cgi_request(
        Arc::new(handler),
        cgi_env_vars(),
        stdin.lock(),
        get_max_body_size(),
    )
    .await?;

    let status = response.status();
    finish_response(response)?;
    info!("CGI request processed with status {}", status);
    Ok(())
}

/// CGI変数とボディからリクエストを構築して処理し、送出前のレスポンスを返す
///
/// ボディの読み込みに失敗した場合はハンドラーを呼ばずに413/400を返す。
/// `REQUEST_METHOD` が無いなどCGIとして起動されていない場合は `Err`。
pub async fn handle_cgi_request<H, I, R>(
    handler: Arc<H>,
    vars: I,
    body: R,
    max_body_size: usize,
) -> Result<Response, Error>
where
    H: Handler + 'static,
    I: IntoIterator<Item = (String, String)>,
    R: Read,
{
    match request_from_vars(vars, body, max_body_size) {
        Ok(request) => Ok(serve(handler, request).await),
        Err(err @ (Error::PayloadTooLarge(_) | Error::InvalidRequestBody(_))) => {
            warn!("Rejected CGI request body: {}", err);
            Ok(Response::from_error(&err))
        }
        Err(err) => Err(err),
    }
}

/// リクエストをハンドラーで処理する
///
/// ハンドラーは別タスクで実行し、`Err` は対応するエラーレスポンスに、
/// panicは500に変換する。panic時はマスク済みのリクエスト情報をエラーログに残す。
/// ヘッダー送出後の失敗ではステータスを差し替えず、送出済みのレスポンスを返す。
pub async fn serve<H>(handler: Arc<H>, request: Request) -> Response
where
    H: Handler + 'static,
{
    let request = Arc::new(request);
    let label = format!("{} {}", request.method(), request.path());
    debug!("Processing request: {}", label);

    // panic後も送出状況を確認できるよう、レスポンスはタスクの外で保持する
    let shared = Arc::new(Mutex::new(Response::ok()));
    let task_request = Arc::clone(&request);
    let task_response = Arc::clone(&shared);
    let task_result = task::spawn(async move {
        let mut response = task_response.lock().await;
        handler.handle(&task_request, &mut *response).await
    })
    .await;

    let mut response = mem::replace(&mut *shared.lock().await, Response::ok());

    match task_result {
        Ok(Ok(())) => response,
        Ok(Err(err)) => {
            error!("Handler returned error at {}: {}", label, err);
            log_error_to_file(&format!("Handler returned error at {}: {:?}", label, err));
            if response.headers_sent() {
                // 送出済みのステータスは変更できないため残りのボディだけ出す
                return response;
            }
            Response::from_error(&err)
        }
        Err(join_err) => {
            let panic_info = if join_err.is_panic() {
                "panic occurred in handler".to_string()
            } else {
                format!("task cancelled: {}", join_err)
            };
            error!("{} at {}", panic_info, label);
            log_error_to_file(&format!(
                "{} at {}\n{}",
                panic_info,
                label,
                gather_panic_context(&request)
            ));
            if response.headers_sent() {
                // 途中まで送出したレスポンスはそのまま閉じる
                response.clear_body();
                return response;
            }
            Response::from_error(&Error::InternalServerError(panic_info))
        }
    }
}
