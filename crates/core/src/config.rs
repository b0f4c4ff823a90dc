//! Layered configuration for the trade bot.
//!
//! Configuration is loaded in layers with increasing priority:
//! 1. Compiled-in defaults (local broker bridge, 100 000 starting balance)
//! 2. TOML configuration file (if provided)
//! 3. Environment variable overrides (prefix `TRADEBOT_`, nested with `__`)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

// ── Default value functions ────────────────────────────────────────────

/// Default poll wait: 100 ms.
fn default_poll_timeout_ms() -> u64 {
    100
}

/// Default maximum events drained per poll.
fn default_max_batch() -> usize {
    500
}

/// Default transport → pipeline channel capacity.
fn default_channel_capacity() -> usize {
    4_096
}

/// Default initial reconnect backoff: 1 000 ms.
fn default_initial_backoff_ms() -> u64 {
    1_000
}

/// Default maximum reconnect backoff: 30 000 ms.
fn default_max_backoff_ms() -> u64 {
    30_000
}

// ── Configuration structs ──────────────────────────────────────────────

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Inbound trade stream.
    pub stream: StreamConfig,
    /// Decision oracle artifact.
    pub oracle: OracleConfig,
    /// Trading account parameters.
    pub account: AccountConfig,
    /// Persisted trade log.
    pub trade_log: TradeLogConfig,
    /// Log output format.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Inbound stream configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Where raw events come from.
    pub transport: Transport,
    /// Broker bridge address (`host:port`), used by the `tcp` transport.
    pub broker: String,
    /// Topic carrying the joined trade records.
    pub topic: String,
    /// Recorded JSON-lines file, required by the `file` transport.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Bounded wait for each poll, in milliseconds.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Maximum number of events handed to the pipeline per poll.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    /// Capacity of the channel between the transport and the pipeline.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Reconnect parameters for the `tcp` transport.
    pub reconnect: ReconnectConfig,
}

/// Event transport selector.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Newline-delimited JSON on standard input.
    Stdin,
    /// Replay a recorded newline-delimited JSON file.
    File,
    /// Live newline-delimited JSON from the broker bridge.
    Tcp,
}

/// Reconnect parameters with exponential backoff.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    /// Initial backoff delay in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Consecutive failed attempts before giving up (0 = retry forever).
    #[serde(default)]
    pub max_retries: u32,
}

/// Decision oracle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// Q-network weights in safetensors format.
    pub model_path: PathBuf,
}

/// Trading account configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Starting cash balance in quote currency.
    pub initial_balance: f64,
}

/// Trade log configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeLogConfig {
    /// Plain-text log, opened in append mode.
    pub path: PathBuf,
}

/// Structured log output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// JSON lines with nanosecond timestamps instead of pretty output.
    #[serde(default)]
    pub json: bool,
}

impl StreamConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration using layered sources.
    ///
    /// 1. Compiled-in defaults.
    /// 2. TOML file at `config_path` (if `Some`).
    /// 3. Environment variable overrides with prefix `TRADEBOT_` and `__` as
    ///    the nesting separator (e.g., `TRADEBOT_ACCOUNT__INITIAL_BALANCE=5000`).
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder()
            // ── Layer 1: compiled-in defaults ───────────────────────
            .set_default("stream.transport", "stdin")?
            .set_default("stream.broker", "localhost:9092")?
            .set_default("stream.topic", "BTC_USD_JOINED")?
            .set_default("stream.poll_timeout_ms", 100i64)?
            .set_default("stream.max_batch", 500i64)?
            .set_default("stream.channel_capacity", 4096i64)?
            .set_default("stream.reconnect.initial_backoff_ms", 1000i64)?
            .set_default("stream.reconnect.max_backoff_ms", 30000i64)?
            .set_default("stream.reconnect.max_retries", 0i64)?
            .set_default("oracle.model_path", "model.safetensors")?
            .set_default("account.initial_balance", 100_000.0)?
            .set_default("trade_log.path", "trade_logs.txt")?
            .set_default("logging.json", false)?;

        // ── Layer 2: TOML file ─────────────────────────────────────
        if let Some(path) = config_path {
            let path_str = path
                .to_str()
                .context("config path is not valid UTF-8")?;
            builder = builder.add_source(File::with_name(path_str).required(true));
        }

        // ── Layer 3: env var overrides (TRADEBOT_ prefix) ─────────
        // The prefix separator must stay `_`; the `config` crate otherwise
        // reuses the `__` nesting separator for the prefix as well.
        builder = builder.add_source(
            Environment::with_prefix("TRADEBOT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: AppConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate configuration invariants.
    fn validate(&self) -> Result<()> {
        let balance = self.account.initial_balance;
        if !balance.is_finite() || balance < 0.0 {
            bail!("account.initial_balance must be a finite, non-negative amount (got {balance})");
        }
        if self.stream.transport == Transport::File && self.stream.path.is_none() {
            bail!("stream.path is required when stream.transport = \"file\"");
        }
        if self.stream.poll_timeout_ms == 0 {
            bail!("stream.poll_timeout_ms must be positive");
        }
        if self.stream.max_batch == 0 {
            bail!("stream.max_batch must be positive");
        }
        if self.stream.channel_capacity == 0 {
            bail!("stream.channel_capacity must be positive");
        }
        Ok(())
    }
}
