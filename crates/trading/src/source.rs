//! Pull-based event sources.
//!
//! The pipeline thread only sees [`EventSource`]: poll with a bounded wait,
//! get back a (possibly empty) batch, or learn that the stream is over.
//! Transport I/O lives in [`crate::feeds`] and hands records over through
//! a bounded crossbeam channel.

use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};

use tb_core::types::RawEvent;

/// Result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum Poll {
    /// Events in arrival order. Empty when the wait timed out.
    Batch(Vec<RawEvent>),
    /// No more events will arrive.
    Closed,
}

/// A stream of raw events, drained in batches.
pub trait EventSource: Send {
    /// Wait at most `timeout` for events.
    fn poll(&mut self, timeout: Duration) -> Poll;
}

/// Source backed by the receiving end of a feed channel.
///
/// The source reports [`Poll::Closed`] once every sender is gone and the
/// buffered events have been drained.
pub struct ChannelSource {
    rx: Receiver<RawEvent>,
    max_batch: usize,
}

impl ChannelSource {
    pub fn new(rx: Receiver<RawEvent>, max_batch: usize) -> Self {
        Self {
            rx,
            max_batch: max_batch.max(1),
        }
    }
}

impl EventSource for ChannelSource {
    fn poll(&mut self, timeout: Duration) -> Poll {
        let first = match self.rx.recv_timeout(timeout) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => return Poll::Batch(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => return Poll::Closed,
        };

        let mut batch = Vec::with_capacity(self.rx.len().min(self.max_batch) + 1);
        batch.push(first);
        while batch.len() < self.max_batch {
            match self.rx.try_recv() {
                Ok(event) => batch.push(event),
                Err(_) => break,
            }
        }
        Poll::Batch(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tb_core::types::fields;

    fn event(n: i64) -> RawEvent {
        RawEvent::default().with(fields::PRICE, n)
    }

    #[test]
    fn test_empty_poll_times_out() {
        let (_tx, rx) = crossbeam::channel::bounded(4);
        let mut source = ChannelSource::new(rx, 10);
        assert_eq!(source.poll(Duration::from_millis(5)), Poll::Batch(Vec::new()));
    }

    #[test]
    fn test_batches_respect_max_and_order() {
        let (tx, rx) = crossbeam::channel::bounded(16);
        for n in 0..5 {
            tx.send(event(n)).unwrap();
        }
        let mut source = ChannelSource::new(rx, 3);

        let Poll::Batch(first) = source.poll(Duration::from_millis(10)) else {
            panic!("expected a batch");
        };
        assert_eq!(first, vec![event(0), event(1), event(2)]);

        let Poll::Batch(second) = source.poll(Duration::from_millis(10)) else {
            panic!("expected a batch");
        };
        assert_eq!(second, vec![event(3), event(4)]);
    }

    #[test]
    fn test_closed_after_buffer_drains() {
        let (tx, rx) = crossbeam::channel::bounded(4);
        tx.send(event(1)).unwrap();
        drop(tx);

        let mut source = ChannelSource::new(rx, 10);
        assert_eq!(source.poll(Duration::from_millis(10)), Poll::Batch(vec![event(1)]));
        assert_eq!(source.poll(Duration::from_millis(10)), Poll::Closed);
    }

    #[test]
    fn test_zero_max_batch_still_delivers() {
        let (tx, rx) = crossbeam::channel::bounded(4);
        tx.send(event(1)).unwrap();
        let mut source = ChannelSource::new(rx, 0);
        assert_eq!(source.poll(Duration::from_millis(10)), Poll::Batch(vec![event(1)]));
    }
}
