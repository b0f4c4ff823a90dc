//! Transport feeds: newline-delimited JSON into the pipeline channel.
//!
//! Each line is one trade record. Blank lines are skipped, undecodable
//! lines are dropped with a warning. A feed closes its channel when it
//! ends, which the pipeline sees as [`crate::source::Poll::Closed`].

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossbeam::channel::Sender;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use tb_core::config::{ReconnectConfig, StreamConfig, Transport};
use tb_core::types::RawEvent;

/// Why a line pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEnd {
    /// The underlying reader hit end of input.
    Eof,
    Cancelled,
    /// The pipeline dropped its receiver.
    ReceiverGone,
}

/// Run the feed selected by `config` until it ends or `cancel` fires.
pub async fn run_feed(
    config: StreamConfig,
    tx: Sender<RawEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    match config.transport {
        Transport::Stdin => spawn_stdin_feed(config.topic, tx),
        Transport::File => {
            let path = config
                .path
                .context("stream.path is required for the file transport")?;
            run_file_feed(path, &config.topic, tx, cancel).await
        }
        Transport::Tcp => {
            run_tcp_feed(&config.broker, &config.topic, &config.reconnect, tx, cancel).await
        }
    }
}

/// Read stdin on its own OS thread.
///
/// Blocking stdin reads cannot be interrupted, so the thread is detached and
/// ends with the process or at EOF.
fn spawn_stdin_feed(topic: String, tx: Sender<RawEvent>) -> Result<()> {
    std::thread::Builder::new()
        .name("stdin-feed".into())
        .spawn(move || {
            tracing::info!(%topic, "reading events from stdin");
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!(%topic, error = %e, "stdin read failed");
                        break;
                    }
                };
                if let Some(event) = decode_line(&line, &topic) {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            }
            tracing::info!(%topic, "stdin feed finished");
        })
        .context("failed to spawn stdin feed thread")?;
    Ok(())
}

/// Replay a recorded JSON-lines file.
pub async fn run_file_feed(
    path: PathBuf,
    topic: &str,
    tx: Sender<RawEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let file = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("failed to open replay file {}", path.display()))?;
    tracing::info!(path = %path.display(), topic, "replaying events from file");

    let end = pump_lines(BufReader::new(file), &tx, topic, &cancel)
        .await
        .with_context(|| format!("failed to read replay file {}", path.display()))?;
    tracing::info!(?end, topic, "file feed finished");
    Ok(())
}

/// Follow the live tail of the broker bridge at `broker`.
///
/// Reconnects with exponential backoff whenever the connection fails or the
/// bridge closes it. Returns `Err` once `max_retries` consecutive attempts
/// have failed (never, when `max_retries` is 0).
pub async fn run_tcp_feed(
    broker: &str,
    topic: &str,
    reconnect: &ReconnectConfig,
    tx: Sender<RawEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let initial = Duration::from_millis(reconnect.initial_backoff_ms);
    let max = Duration::from_millis(reconnect.max_backoff_ms);
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            if reconnect.max_retries > 0 && attempt > reconnect.max_retries {
                bail!(
                    "exceeded max retries ({}) connecting to {broker}",
                    reconnect.max_retries
                );
            }
            let backoff = calculate_backoff(&initial, &max, attempt - 1);
            tracing::info!(
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                broker,
                topic,
                "reconnecting to broker bridge"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        let connected = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = TcpStream::connect(broker) => result,
        };
        let stream = match connected {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(broker, topic, error = %e, "broker bridge connection failed");
                attempt = attempt.saturating_add(1);
                continue;
            }
        };
        tracing::info!(broker, topic, "connected to broker bridge");

        match pump_lines(BufReader::new(stream), &tx, topic, &cancel).await {
            Ok(FeedEnd::Cancelled) | Ok(FeedEnd::ReceiverGone) => return Ok(()),
            Ok(FeedEnd::Eof) => tracing::warn!(broker, topic, "broker bridge closed the connection"),
            Err(e) => tracing::error!(broker, topic, error = %e, "broker bridge read error"),
        }
        // A session was established, so the next retry starts from the
        // initial backoff.
        attempt = 1;
    }
}

/// Forward decoded lines from `reader` into `tx`.
pub async fn pump_lines<R>(
    reader: R,
    tx: &Sender<RawEvent>,
    topic: &str,
    cancel: &CancellationToken,
) -> std::io::Result<FeedEnd>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return Ok(FeedEnd::Cancelled),
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            return Ok(FeedEnd::Eof);
        };
        if let Some(event) = decode_line(&line, topic) {
            if tx.send(event).is_err() {
                return Ok(FeedEnd::ReceiverGone);
            }
        }
    }
}

fn decode_line(line: &str, topic: &str) -> Option<RawEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match RawEvent::from_json(line) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(topic, error = %e, "dropping undecodable record");
            None
        }
    }
}

/// Exponential backoff with jitter.
///
/// `backoff = initial * 2^attempt`, capped at `max`, plus a random jitter in
/// `[0, 0.5 * backoff]`.
pub(crate) fn calculate_backoff(initial: &Duration, max: &Duration, attempt: u32) -> Duration {
    let base = initial
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(*max);

    let jitter_frac = rand::random::<f64>() * 0.5;
    let jitter = Duration::from_secs_f64(base.as_secs_f64() * jitter_frac);

    base + jitter
}
