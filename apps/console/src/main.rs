use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use console_core::{CommandOutcome, ConsoleEngine, DispatchError, EngineConfig, EngineEvent};
use shared::protocol::LogEntry;
use tokio::sync::broadcast;

mod config;
mod render;

#[derive(Parser, Debug)]
#[command(
    name = "visca-console",
    about = "Operator console for a VISCA serial/IP bridge"
)]
struct Cli {
    /// Bridge API base URL; overrides console.toml and environment.
    #[arg(long)]
    api_base: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and print one status snapshot.
    Status,
    /// Poll continuously, printing status updates and new log entries.
    Watch,
    /// List the preset commands the bridge exposes.
    Presets,
    /// Send raw hex text to the camera.
    Send { hex: String },
    /// Resolve a preset key and send its command.
    Preset { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let mut settings = config::load_settings();
    if let Some(api_base) = cli.api_base {
        settings.api_base = api_base;
    }
    let api_base = settings.api_base.clone();
    let engine = ConsoleEngine::new(EngineConfig {
        api_base: settings.api_base,
        ..EngineConfig::default()
    });

    match cli.command {
        Command::Status => {
            if !engine.refresh_now().await {
                bail!("could not reach the bridge at {api_base}");
            }
            render::print_stats(&engine.stats().await);
        }
        Command::Watch => watch(engine).await?,
        Command::Presets => {
            if !engine.refresh_presets().await {
                bail!("could not fetch presets from {api_base}");
            }
            let presets = engine.presets().await;
            if presets.is_empty() {
                println!("bridge exposes no presets");
            } else {
                let mut keys: Vec<_> = presets.keys().cloned().collect();
                keys.sort();
                for key in &keys {
                    println!("{key:<20} {}", presets[key]);
                }
            }
        }
        Command::Send { hex } => {
            let result = engine.send_manual(&hex).await;
            report_outcome(&engine, result).await?;
        }
        Command::Preset { key } => {
            if !engine.refresh_presets().await {
                bail!("could not fetch presets from {api_base}");
            }
            let result = engine.send_preset(&key).await;
            report_outcome(&engine, result).await?;
        }
    }

    Ok(())
}

async fn report_outcome(
    engine: &Arc<ConsoleEngine>,
    result: std::result::Result<(), DispatchError>,
) -> Result<()> {
    result?;
    let outcome = engine.outcome().await;
    engine.shutdown().await;
    match outcome {
        Some(CommandOutcome::Success { response, len }) => {
            match (response, len) {
                (Some(resp), _) => println!("ok, response: {resp}"),
                (None, Some(len)) => println!("ok, {len} response bytes"),
                (None, None) => println!("ok"),
            }
            Ok(())
        }
        Some(CommandOutcome::Failure { reason }) => bail!("command failed: {reason}"),
        None => {
            println!("ok");
            Ok(())
        }
    }
}

async fn watch(engine: Arc<ConsoleEngine>) -> Result<()> {
    let mut events = engine.subscribe_events();
    engine.start().await;
    println!("watching bridge (ctrl-c to stop)");

    let mut last_log_seen: Option<(i64, String)> = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(EngineEvent::StatsUpdated) => {
                    let stats = engine.stats().await;
                    render::print_status_line(&stats);
                    // Entries arrive newest-first; emit the ones not yet seen,
                    // oldest first.
                    let chronological: Vec<&LogEntry> = stats.log.iter().rev().collect();
                    for entry in &chronological[first_unseen(&chronological, last_log_seen.as_ref())..] {
                        render::print_log_entry(entry);
                    }
                    if let Some(newest) = chronological.last() {
                        last_log_seen = Some((newest.timestamp, newest.message.clone()));
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    engine.shutdown().await;
    Ok(())
}

/// Index into the chronological log of the first entry that has not been
/// printed yet. Timestamps have one-second resolution, so the last printed
/// entry is matched by `(timestamp, message)` rather than timestamp alone.
fn first_unseen(chronological: &[&LogEntry], last_seen: Option<&(i64, String)>) -> usize {
    let Some((ts, msg)) = last_seen else {
        return 0;
    };
    if let Some(pos) = chronological
        .iter()
        .rposition(|e| e.timestamp == *ts && e.message == *msg)
    {
        pos + 1
    } else {
        // The last printed entry rotated out of the bridge's bounded log.
        chronological
            .iter()
            .position(|e| e.timestamp > *ts)
            .unwrap_or(chronological.len())
    }
}
