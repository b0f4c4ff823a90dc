//! tb-trader binary
//!
//! Entry point for the streaming trade bot. Loads configuration,
//! initializes tracing, and runs the [`TradingEngine`] until the event
//! stream ends or the process is interrupted.

use std::path::PathBuf;

use clap::Parser;

use tb_core::config::AppConfig;
use tb_trading::engine::TradingEngine;

/// Streaming trade bot driven by a Q-network decision oracle.
#[derive(Parser, Debug)]
#[command(name = "tb-trader", about = "Streaming trade bot driven by a Q-network")]
struct Args {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit JSON logs regardless of `logging.json`.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config)?;

    tb_core::logging::init_tracing(args.json_logs || config.logging.json)?;

    let engine = TradingEngine::new(config);
    engine.run().await?;
    Ok(())
}
