use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{ClientEvent, GameClient};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{debug, info, warn};

mod commands;
mod config;
mod render;

use commands::{parse_command, Command, HELP};
use config::{load_settings, normalize_engine_url};
use render::render_view;

#[derive(Parser, Debug)]
#[command(about = "Terminal client for a Santorini rules engine")]
struct Args {
    /// Base URL of the rules engine, e.g. http://127.0.0.1:8080
    #[arg(long)]
    engine_url: Option<String>,
    /// Settings file; defaults to ./santorini.toml when present
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(v) = args.engine_url {
        settings.engine_url = v;
    }
    if let Some(v) = args.log_filter {
        settings.log_filter = v;
    }
    settings.engine_url = normalize_engine_url(&settings.engine_url)?;

    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .with_writer(std::io::stderr)
        .init();

    let client = GameClient::connect(&settings.engine_url)
        .with_context(|| format!("failed to set up engine client for {}", settings.engine_url))?;
    info!(engine_url = %settings.engine_url, "client ready");
    spawn_event_log(&client);

    println!("{}", render_view(&client.view().await));
    println!("type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        if !run_command(&client, command).await {
            break;
        }
    }
    Ok(())
}

/// Returns false when the player asks to leave.
async fn run_command(client: &GameClient, command: Command) -> bool {
    let result = match command {
        Command::Quit => return false,
        Command::Help => {
            println!("{HELP}");
            return true;
        }
        Command::Show => Ok(()),
        Command::NewGame => client.start_new_game().await,
        Command::God { player, card } => client.choose_god_card(&player, card).await,
        Command::Confirm => client.confirm_god_cards().await,
        Command::Click(at) => client.click(at).await.map(|outcome| {
            debug!(?outcome, x = at.x, y = at.y, "click handled");
        }),
        Command::Undo => client.deselect_worker().await,
    };
    if let Err(error) = result {
        debug!(%error, "command failed");
    }
    println!("{}", render_view(&client.view().await));
    true
}

fn spawn_event_log(client: &Arc<GameClient>) {
    let mut events = client.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ClientEvent::Error(message)) => warn!(%message, "client error"),
                Ok(ClientEvent::StateChanged(view)) => {
                    debug!(phase = ?view.turn.phase, player = ?view.turn.current_player, "state changed")
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
