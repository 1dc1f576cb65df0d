//! Jitsu: CGI向けのHTTPリクエスト/レスポンス抽象化ライブラリ
//!
//! 実行環境に依存しないリクエスト・レスポンスのトレイトと、
//! `Accept` ヘッダーによるコンテントネゴシエーションを提供する。
//!
//! ```
//! use jitsu_http::common::negotiation;
//!
//! let accept = Some("text/html;q=0.9, application/json");
//! let offered = ["text/html", "application/json"];
//! assert_eq!(negotiation::negotiate(accept, &offered), Some(1));
//! assert!(negotiation::accepts(accept, "text/html"));
//! ```

pub mod common;
pub mod error;

#[cfg(feature = "cgi")]
pub mod cgi;

pub use common::*;
pub use error::*;
