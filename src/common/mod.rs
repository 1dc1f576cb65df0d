//! 共通の抽象化レイヤーとトレイト定義
//!
//! 実行環境に依存しないリクエスト/レスポンスの型と、
//! `Accept` ヘッダーによるコンテントネゴシエーションを提供する。

pub mod cookie;
pub mod http;
pub mod negotiation;
pub mod traits;
pub mod utils;

pub use cookie::{parse_cookie_header, Cookie, SameSite};
pub use http::{default_reason_phrase, Method, Request, Response, StatusCode};
pub use negotiation::{acceptable_content_types, accepts, negotiate, AcceptEntry, AcceptList};
pub use traits::{Handler, HttpRequest, HttpResponse, DEFAULT_HTTP_VERSION};
