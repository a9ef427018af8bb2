use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use client::{api::HttpDirectoryApi, app::App};

#[derive(Debug, Parser)]
#[command(name = "staffdir", version, about = "Terminal client for the staff directory")]
struct Cli {
    /// Base URL of the directory service.
    #[arg(long, env = "STAFFDIR_API_URL", default_value = "http://127.0.0.1:3000")]
    api_url: String,

    /// Seconds to wait for any request before treating it as failed.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let api = HttpDirectoryApi::new(cli.api_url, Duration::from_secs(cli.timeout_secs))?;
    let mut app = App::new(Arc::new(api));
    app.run().await
}
