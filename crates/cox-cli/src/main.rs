//! Coxswain diagnostic CLI
//!
//! Inspects persisted session trees and replays parser-event transcripts
//! against a conductor, printing every write it would put on the wire.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cox_conductor::{from_json, Conductor, ConductorArgs, SharedConductor};
use cox_core::traits::ConductorDelegate;
use cox_protocol::event::ParserEvent;

#[derive(Parser)]
#[command(name = "coxswain")]
#[command(author, version, about = "Remote session conductor diagnostics")]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the conductor tree stored in a session file
    Inspect {
        /// Path to a serialized session (JSON)
        session: PathBuf,
    },

    /// Feed a recorded parser-event transcript to a fresh conductor and
    /// print everything it writes
    Replay {
        /// Path to a transcript (JSON array of events)
        transcript: PathBuf,

        /// ssh arguments for the replayed conductor
        #[arg(long, default_value = "user@replay")]
        sshargs: String,

        /// Skip the launch sequence; deliver events to an idle conductor
        #[arg(long)]
        no_start: bool,
    },
}

/// Delegate that prints conductor output instead of owning a transport
struct PrintingDelegate;

impl ConductorDelegate for PrintingDelegate {
    fn conductor_write(&self, data: &str) {
        println!("write {:?}", data);
    }

    fn conductor_abort(&self, reason: &str) {
        println!("abort {:?}", reason);
    }

    fn conductor_quit(&self) {
        println!("quit");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Inspect { session } => inspect(&session),
        Commands::Replay {
            transcript,
            sshargs,
            no_start,
        } => replay(&transcript, &sshargs, !no_start),
    }
}

fn inspect(path: &PathBuf) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read session file {:?}", path))?;
    let conductor =
        from_json(&json).with_context(|| format!("Failed to decode session file {:?}", path))?;

    let mut current: Option<SharedConductor> = Some(conductor);
    while let Some(node) = current {
        let guard = node.lock().unwrap();
        println!("{}", guard.description());
        current = guard.parent();
    }
    Ok(())
}

fn replay(path: &PathBuf, sshargs: &str, start: bool) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript {:?}", path))?;
    let events: Vec<ParserEvent> =
        serde_json::from_str(&json).with_context(|| format!("Failed to parse transcript {:?}", path))?;

    let conductor = Conductor::shared(ConductorArgs::new(sshargs, ""), None);
    conductor
        .lock()
        .unwrap()
        .set_delegate(Some(Arc::new(PrintingDelegate)));
    if start {
        conductor.lock().unwrap().start();
    }

    for event in events {
        tracing::debug!("delivering {:?}", event);
        let mut guard = conductor.lock().unwrap();
        match event {
            ParserEvent::Line { text, depth } => guard.handle_line(&text, depth),
            ParserEvent::CommandBegin { id, depth } => guard.handle_command_begin(&id, depth),
            ParserEvent::CommandEnd {
                id,
                kind,
                status,
                depth,
            } => guard.handle_command_end(&id, kind, status, depth),
            ParserEvent::SideChannelOutput {
                text,
                pid,
                channel,
                depth,
            } => guard.handle_side_channel_output(&text, pid, channel, depth),
            ParserEvent::Terminate { pid, code, depth } => guard.handle_terminate(pid, code, depth),
            ParserEvent::Unhook { depth } => guard.handle_unhook(depth),
            ParserEvent::RecoveryLine { text } => {
                if let Some(recovery) = guard.handle_recovery_line(&text) {
                    println!(
                        "recovered pid={} dcs_id={} client_unique_id={}",
                        recovery.pid, recovery.dcs_id, recovery.client_unique_id
                    );
                }
            }
        }
    }

    println!("final state: {}", conductor.lock().unwrap().state_description());
    Ok(())
}
