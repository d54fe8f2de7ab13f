// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

use std::io::Write as _;
use std::sync::Arc;

use clap::Parser;
use futures_util::StreamExt;
use helpline::config::{self, ConfigSource as _};
use helpline::session::{
    ChatSession, SessionError, SessionHandle, SessionSettings, Turn,
    TurnOutcome,
};
use helpline::transport::{HttpChatTransport, ReqwestHttpSender};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "helpline", about = "Streaming support chat in the terminal")]
struct Cli {
    /// Path to the helpline.yaml config file
    #[arg(long, default_value = "helpline.yaml", env = "HELPLINE_CONFIG")]
    config: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let source = config::FileSource::new(cli.config);
    let config = match config::load_config(&source) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(source = %source.describe(), "failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        version = %config.version,
        endpoint = %config.endpoint.url,
        model = %config.endpoint.model,
        config_hash = %config.config_hash,
        "config loaded"
    );

    let transport = ReqwestHttpSender::from_endpoint(&config.endpoint).and_then(|http| {
        HttpChatTransport::new(
            &config.endpoint,
            config.assistant.system_prompt.clone(),
            Arc::new(http),
        )
    });
    let transport = match transport {
        Ok(t) => Arc::new(t),
        Err(e) => {
            tracing::error!("failed to set up transport: {e}");
            std::process::exit(1);
        }
    };

    let session = ChatSession::new(SessionSettings::from_config(&config), transport);
    let handle = SessionHandle::spawn(session);

    if let Some(greeting) = handle.snapshot().transcript.first() {
        println!("{}\n", greeting.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("failed to read stdin: {e}");
                break;
            }
        };
        if line.trim() == "/quit" {
            break;
        }

        match handle.start_turn(line).await {
            Ok(turn) => print_turn(&handle, turn).await,
            Err(SessionError::EmptyInput) => continue,
            Err(e) => {
                tracing::error!("could not start turn: {e}");
                break;
            }
        }
    }
}

/// Print the reply as it streams. Ctrl-C cancels the turn, not the program.
async fn print_turn(handle: &SessionHandle, mut turn: Turn) {
    let mut reply_index = None;
    let mut printed = String::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancelled = false;

    loop {
        let snapshot = tokio::select! {
            _ = &mut ctrl_c, if !cancelled => {
                cancelled = true;
                if let Err(e) = handle.cancel().await {
                    tracing::warn!("cancel failed: {e}");
                }
                continue;
            }
            next = turn.snapshots.next() => match next {
                Some(snapshot) => snapshot,
                None => break,
            },
        };

        // The first snapshot ends with the user message; the reply goes
        // right after it.
        let index = *reply_index.get_or_insert(snapshot.transcript.len());
        if let Some(text) = snapshot.reply_at(index) {
            match text.strip_prefix(printed.as_str()) {
                Some(rest) => print!("{rest}"),
                None => print!("\n{text}"),
            }
            printed = text.to_string();
            let _ = std::io::stdout().flush();
        }
    }

    match turn.outcome().await {
        Ok(outcome) => {
            if outcome == TurnOutcome::Cancelled {
                print!(" [cancelled]");
            }
            println!("\n");
            tracing::debug!(outcome = outcome.as_str(), "turn printed");
        }
        Err(e) => tracing::error!("turn lost: {e}"),
    }
}
