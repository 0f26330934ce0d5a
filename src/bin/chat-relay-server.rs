// ABOUTME: Chat relay server binary entry point
// ABOUTME: Loads configuration, initializes logging, and serves the relay until shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::print_stderr)]

use anyhow::Result;
use clap::Parser;

use chat_relay::config::ServerConfig;
use chat_relay::server::AppState;
use chat_relay::{logging, server};

/// Streaming chat completion relay
#[derive(Parser)]
#[command(name = "chat-relay-server", version, about)]
struct Args {
    /// HTTP listen port (overrides HTTP_PORT)
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let config = ServerConfig::from_env()?;
    let port = args.http_port.unwrap_or(config.http_port);

    let state = AppState::from_config(&config).await?;
    server::run(state, port).await
}
