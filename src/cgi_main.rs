//! CGI環境でのエントリポイント
//!
//! CGI環境で実行される際のメインプログラム

use env_logger::Env;
use log::{error, info};
use jitsu_http::cgi;

// サンプルハンドラの実装
mod sample_handler;

#[tokio::main]
async fn main() {
    // CGIでは標準出力がHTTPレスポンスとなるため、ログは標準エラー出力に出力する
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    info!("Starting Jitsu CGI application");

    if let Err(err) = cgi::run_cgi(sample_handler::SampleHandler::new()).await {
        error!("Error running CGI application: {:?}", err);
        std::process::exit(1);
    }
}
