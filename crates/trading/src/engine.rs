//! Trading engine: wires the feed, the pipeline thread and shutdown.
//!
//! [`TradingEngine`] loads the decision oracle, opens the trade log, spawns
//! the transport feed as a tokio task and the pipeline on a dedicated OS
//! thread, then waits for the stream to end or for SIGINT.

use anyhow::{anyhow, Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use tb_core::config::AppConfig;
use tb_core::types::{Price, RawEvent};
use tb_ledger::{TradeLog, TradingAccount};
use tb_ml::{DecisionOracle, QNetworkOracle};

use crate::event_loop::{self, LoopStats, Pipeline};
use crate::feeds;
use crate::source::ChannelSource;

/// Final state handed back when the engine stops.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub account: TradingAccount,
    pub stats: LoopStats,
}

pub struct TradingEngine {
    config: AppConfig,
    cancel: CancellationToken,
}

impl TradingEngine {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the engine when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Load the configured Q-network and run until shutdown.
    ///
    /// Fatal errors are logged before they are returned.
    pub async fn run(self) -> Result<RunSummary> {
        let oracle = match QNetworkOracle::load(&self.config.oracle.model_path) {
            Ok(oracle) => oracle,
            Err(e) => {
                let e = e.context("failed to load decision oracle");
                tracing::error!(
                    path = %self.config.oracle.model_path.display(),
                    error = ?e,
                    "failed to load decision oracle"
                );
                return Err(e);
            }
        };
        self.run_with_oracle(oracle).await
    }

    /// Run with an already-constructed oracle.
    ///
    /// Returns when the event source closes, the cancel token fires, or the
    /// process receives SIGINT. A feed that failed (missing replay file,
    /// retries exhausted) is reported as an error after the pipeline stops.
    pub async fn run_with_oracle<O>(self, oracle: O) -> Result<RunSummary>
    where
        O: DecisionOracle + 'static,
    {
        let result = self.drive(oracle).await;
        if let Err(e) = &result {
            tracing::error!(error = ?e, "trading agent failed");
        }
        result
    }

    async fn drive<O>(self, oracle: O) -> Result<RunSummary>
    where
        O: DecisionOracle + 'static,
    {
        let config = self.config;
        let cancel = self.cancel;

        let initial_balance = Price::from_f64(config.account.initial_balance).with_context(|| {
            format!(
                "account.initial_balance {} is not representable",
                config.account.initial_balance
            )
        })?;
        let trade_log = TradeLog::open(&config.trade_log.path)?;
        let account = TradingAccount::new(initial_balance);

        tracing::info!(
            oracle = oracle.name(),
            transport = ?config.stream.transport,
            broker = %config.stream.broker,
            topic = %config.stream.topic,
            trade_log = %config.trade_log.path.display(),
            "starting trading agent"
        );
        tracing::info!(
            balance = %account.balance(),
            position = account.position_units(),
            "initial account state"
        );

        // ── Channel ──────────────────────────────────────────────
        let (event_tx, event_rx) =
            crossbeam::channel::bounded::<RawEvent>(config.stream.channel_capacity);

        // ── 1. Transport feed (tokio task) ───────────────────────
        let feed = tokio::spawn(feeds::run_feed(
            config.stream.clone(),
            event_tx,
            cancel.clone(),
        ));

        // ── 2. Pipeline (dedicated OS thread) ────────────────────
        let mut source = ChannelSource::new(event_rx, config.stream.max_batch);
        let mut pipeline = Pipeline::new(oracle, account, trade_log);
        let poll_timeout = config.stream.poll_timeout();
        let pipeline_cancel = cancel.clone();
        let pipeline_handle = std::thread::Builder::new()
            .name("pipeline".into())
            .spawn(move || {
                event_loop::pipeline_loop(&mut source, &mut pipeline, poll_timeout, &pipeline_cancel);
                // Source closed or cancelled: either way the engine is done.
                pipeline_cancel.cancel();
                pipeline.finish()
            })
            .context("failed to spawn pipeline thread")?;

        // ── Shutdown signal ──────────────────────────────────────
        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("received SIGINT, shutting down");
            }
            _ = cancel.cancelled() => {
                tracing::info!("event stream finished");
            }
        }

        cancel.cancel();

        let (account, stats) = pipeline_handle
            .join()
            .map_err(|_| anyhow!("pipeline thread panicked"))?;

        tracing::info!(
            balance = %account.balance(),
            position = account.position_units(),
            entry_price = %account.entry_price(),
            processed = stats.processed,
            dropped = stats.dropped,
            failed = stats.failed,
            executed = stats.executed,
            "trading agent stopped"
        );

        feed.await.context("feed task panicked")??;

        Ok(RunSummary { account, stats })
    }
}
