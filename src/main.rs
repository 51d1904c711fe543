//! fsmrt - timed finite-state-machine interpreter with a UDP monitoring
//! channel.
//!
//! Loads a declarative FSM document, runs it as a Moore-style automaton
//! with delayed transitions, and exposes live state over UDP so an external
//! editor/monitor can observe snapshots and inject inputs.

use clap::Parser;
use fsmrt_core::{FsmDocument, ScriptHost};
use fsmrt_runtime::{build_automaton, Config, Driver, UdpChannel};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fsmrt")]
#[command(about = "Timed FSM interpreter with a UDP monitoring channel")]
#[command(version)]
struct Cli {
    /// FSM document to run
    document: PathBuf,

    /// Local bind address for the control channel
    bind: Option<SocketAddr>,

    /// Peer address snapshots are sent to
    peer: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(peer) = cli.peer {
        config.peer_addr = peer;
    }

    let (doc, warning) = match FsmDocument::load(&cli.document) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!(path = %cli.document.display(), "cannot load document: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(warning) = &warning {
        tracing::warn!("{warning}");
    }

    let mut host = ScriptHost::new();
    let automaton = match build_automaton(&doc, &mut host) {
        Ok(automaton) => automaton,
        Err(e) => {
            tracing::error!("cannot build automaton: {e}");
            return ExitCode::FAILURE;
        }
    };

    let channel = match UdpChannel::bind(config.bind_addr, config.peer_addr) {
        Ok(channel) => Arc::new(channel),
        Err(e) => {
            tracing::error!(bind = %config.bind_addr, "cannot open channel: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        name = %doc.name,
        bind = %config.bind_addr,
        peer = %config.peer_addr,
        "starting automaton"
    );

    let driver = Driver::start(automaton, channel);
    driver.run_control_loop().await;
    driver.shutdown();

    tracing::info!("stopped");
    ExitCode::SUCCESS
}
