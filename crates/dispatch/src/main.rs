// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use im_dispatch::config::DispatchConfig;

#[derive(Parser)]
struct Cli {
    #[command(flatten)]
    config: DispatchConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();

    if let Err(e) = im_dispatch::run(cli.config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
