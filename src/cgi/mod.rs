//! CGI環境での実行をサポートするモジュール
//!
//! 環境変数と標準入力からリクエストを構築し、
//! 標準出力に `Status:` 行付きのCGIレスポンスとして出力する。

pub mod validation;
pub mod error_logging;
pub mod request;
pub mod response;
pub mod core;

pub use self::core::{handle_cgi_request, run_cgi, serve};
pub use request::{request_from_env, request_from_vars};
pub use response::{finish_response, finish_response_to, flush_response_to};
