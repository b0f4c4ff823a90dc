//! Event loop: the decision pipeline thread.
//!
//! The pipeline runs on a dedicated OS thread (not a tokio task) and owns
//! the account, the oracle and the trade log writer. Events are handled
//! strictly one at a time: extract, decide, execute, append.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use tb_core::types::{Action, RawEvent};
use tb_ledger::{execute, LogEntry, TradeLog, TradingAccount};
use tb_ml::{DecisionOracle, Observation};

use crate::source::{EventSource, Poll};

/// Counters kept by the pipeline over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Events that reached the execution policy.
    pub processed: u64,
    /// Events rejected by the feature extractor.
    pub dropped: u64,
    /// Events whose inference failed.
    pub failed: u64,
    /// Decisions that changed the account.
    pub executed: u64,
    pub holds: u64,
    pub buys: u64,
    pub sells: u64,
    pub unknown: u64,
    /// Trade log appends that failed.
    pub log_failures: u64,
}

impl LoopStats {
    fn record(&mut self, entry: &LogEntry) {
        self.processed += 1;
        if entry.outcome.is_executed() {
            self.executed += 1;
        }
        match entry.action {
            Action::Hold => self.holds += 1,
            Action::Buy => self.buys += 1,
            Action::Sell => self.sells += 1,
            Action::Unknown(_) => self.unknown += 1,
        }
    }
}

/// Everything the pipeline owns.
pub struct Pipeline<O> {
    oracle: O,
    account: TradingAccount,
    trade_log: TradeLog,
    stats: LoopStats,
}

impl<O: DecisionOracle> Pipeline<O> {
    pub fn new(oracle: O, account: TradingAccount, trade_log: TradeLog) -> Self {
        Self {
            oracle,
            account,
            trade_log,
            stats: LoopStats::default(),
        }
    }

    pub fn account(&self) -> &TradingAccount {
        &self.account
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Consume the pipeline, keeping the final account and counters.
    pub fn finish(self) -> (TradingAccount, LoopStats) {
        (self.account, self.stats)
    }

    /// Run one raw event through the pipeline.
    ///
    /// Returns the log entry when the event reached the execution policy,
    /// `None` when it was dropped.
    pub fn process(&mut self, event: &RawEvent) -> Option<LogEntry> {
        let observation = match Observation::from_event(event) {
            Ok(observation) => observation,
            Err(e) => {
                self.stats.dropped += 1;
                tracing::warn!(
                    time = %event.time_label(),
                    error = %e,
                    "dropping malformed event"
                );
                return None;
            }
        };

        let code = match self.oracle.decide(&observation.features) {
            Ok(code) => code,
            Err(e) => {
                self.stats.failed += 1;
                tracing::error!(
                    oracle = self.oracle.name(),
                    time = %observation.tick.time,
                    error = %e,
                    "inference failed, dropping event"
                );
                return None;
            }
        };

        let entry = execute(&mut self.account, Action::from_code(code), &observation.tick);
        self.stats.record(&entry);

        // The transition has already been applied; a failed append only
        // loses the record.
        if let Err(e) = self.trade_log.append(&entry) {
            self.stats.log_failures += 1;
            tracing::error!(
                path = %self.trade_log.path().display(),
                error = ?e,
                "failed to append trade log entry"
            );
        }

        tracing::info!(
            time = %entry.time,
            action = %entry.action,
            code,
            price = %entry.price,
            volume = %entry.volume,
            balance = %entry.balance,
            position = entry.position,
            pnl = entry.pnl.map(tracing::field::display),
            outcome = %entry.outcome,
            "trade decision"
        );

        Some(entry)
    }
}

/// Pipeline loop. Runs on a dedicated OS thread.
///
/// Polls `source` with a bounded wait and processes each batch in arrival
/// order. Returns when the source closes or `cancel` fires; a cancel takes
/// effect between events.
pub fn pipeline_loop<S, O>(
    source: &mut S,
    pipeline: &mut Pipeline<O>,
    poll_timeout: Duration,
    cancel: &CancellationToken,
) where
    S: EventSource,
    O: DecisionOracle,
{
    tracing::info!("pipeline thread started");

    'outer: loop {
        if cancel.is_cancelled() {
            break;
        }

        let batch = match source.poll(poll_timeout) {
            Poll::Batch(batch) => batch,
            Poll::Closed => {
                tracing::info!("event source closed");
                break;
            }
        };

        for event in &batch {
            if cancel.is_cancelled() {
                break 'outer;
            }
            pipeline.process(event);
        }
    }

    tracing::info!(stats = ?pipeline.stats(), "pipeline thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use anyhow::bail;
    use tb_core::types::{fields, Price};
    use tb_ml::FeatureVector;

    use crate::source::ChannelSource;

    /// Replays a fixed list of action codes, then holds.
    struct Scripted(VecDeque<i64>);

    impl DecisionOracle for Scripted {
        fn decide(&mut self, _features: &FeatureVector) -> anyhow::Result<i64> {
            Ok(self.0.pop_front().unwrap_or(Action::HOLD_CODE))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct Broken;

    impl DecisionOracle for Broken {
        fn decide(&mut self, _features: &FeatureVector) -> anyhow::Result<i64> {
            bail!("model exploded")
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn trade(price: i64) -> RawEvent {
        RawEvent::default()
            .with(fields::TIME, format!("t{price}"))
            .with(fields::PRICE, price)
            .with(fields::SIDE, "BUY")
            .with(fields::VOLUME_100S, 5)
            .with(fields::AVG_PRICE_100S, price - 1)
    }

    fn units(n: i64) -> Price {
        Price::from_units(n).unwrap()
    }

    fn pipeline<O: DecisionOracle>(
        oracle: O,
        balance: i64,
        dir: &tempfile::TempDir,
    ) -> Pipeline<O> {
        let log = TradeLog::open(dir.path().join("trades.txt")).unwrap();
        Pipeline::new(oracle, TradingAccount::new(units(balance)), log)
    }

    #[test]
    fn test_round_trip_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(Scripted(VecDeque::from([1, 0, 2])), 100_000, &dir);

        p.process(&trade(100)).unwrap();
        p.process(&trade(105)).unwrap();
        let sell = p.process(&trade(110)).unwrap();

        assert_eq!(sell.pnl, Some(units(110)));
        assert_eq!(p.account().balance(), units(100_010));

        let lines = std::fs::read_to_string(dir.path().join("trades.txt")).unwrap();
        let lines: Vec<_> = lines.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Time: t100, Action: BUY,"));
        assert!(lines[1].contains("Action: HOLD"));
        assert!(lines[2].ends_with("PnL: $110.00"));
    }

    #[test]
    fn test_malformed_event_is_dropped_without_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(Scripted(VecDeque::from([1])), 1_000, &dir);

        let bad = RawEvent::default().with(fields::PRICE, 100);
        assert!(p.process(&bad).is_none());

        assert_eq!(p.stats().dropped, 1);
        assert_eq!(p.stats().processed, 0);
        // The scripted BUY was not consumed by the dropped event.
        let entry = p.process(&trade(100)).unwrap();
        assert_eq!(entry.action, Action::Buy);
    }

    #[test]
    fn test_inference_failure_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(Broken, 1_000, &dir);
        assert!(p.process(&trade(100)).is_none());
        assert_eq!(p.stats().failed, 1);
        assert_eq!(p.account().balance(), units(1_000));

        let log = TradeLog::open(dir.path().join("trades.txt")).unwrap();
        assert_eq!(log.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_stats_count_actions() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(Scripted(VecDeque::from([1, 1, 7, 2, 2, 0])), 1_000, &dir);
        for price in 100..106 {
            p.process(&trade(price));
        }
        let (account, stats) = p.finish();
        assert_eq!(
            stats,
            LoopStats {
                processed: 6,
                executed: 2,
                holds: 1,
                buys: 2,
                sells: 2,
                unknown: 1,
                ..LoopStats::default()
            }
        );
        assert_eq!(account.position_units(), 0);
    }

    #[test]
    fn test_loop_runs_until_source_closes() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(Scripted(VecDeque::from([1, 2])), 1_000, &dir);

        let (tx, rx) = crossbeam::channel::bounded(8);
        tx.send(trade(100)).unwrap();
        tx.send(RawEvent::default()).unwrap();
        tx.send(trade(120)).unwrap();
        drop(tx);

        let mut source = ChannelSource::new(rx, 2);
        pipeline_loop(
            &mut source,
            &mut p,
            Duration::from_millis(10),
            &CancellationToken::new(),
        );

        assert_eq!(p.stats().processed, 2);
        assert_eq!(p.stats().dropped, 1);
        assert_eq!(p.account().balance(), units(1_020));
    }

    #[test]
    fn test_loop_honours_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(Scripted(VecDeque::new()), 1_000, &dir);

        let (tx, rx) = crossbeam::channel::bounded(8);
        tx.send(trade(100)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut source = ChannelSource::new(rx, 8);
        pipeline_loop(&mut source, &mut p, Duration::from_millis(10), &cancel);

        assert_eq!(p.stats().processed, 0);
        drop(tx);
    }
}
