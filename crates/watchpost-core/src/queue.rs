//! Bounded log aggregation queue
//!
//! Many producers (one drain task per reporter) feed one consumer (the
//! relay). A full queue blocks producers until the consumer frees a slot, so
//! nothing is dropped and a slow collector throttles every reporter alike.
//! Each producer's own lines stay in order; lines from different producers
//! interleave arbitrarily.
//!
//! Closing is separate from dropping: the session closes the queue when a
//! run ends, which fails every pending and future send even while producer
//! handles are still alive.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::{Notify, mpsc};

use crate::model::LogLine;

/// The queue no longer accepts lines
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("log queue closed")]
pub struct QueueClosed;

#[derive(Debug, Default)]
struct Shared {
    closed: AtomicBool,
    notify: Notify,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Create a queue holding at most `capacity` in-flight lines
///
/// # Panics
/// Panics if `capacity` is zero.
#[must_use]
pub fn log_queue(capacity: usize) -> (LogQueueSender, LogQueueReceiver, LogQueueCloser) {
    let (tx, rx) = mpsc::channel(capacity);
    let shared = Arc::new(Shared::default());

    (
        LogQueueSender {
            tx,
            shared: shared.clone(),
        },
        LogQueueReceiver {
            rx,
            shared: shared.clone(),
        },
        LogQueueCloser { shared },
    )
}

/// Producer handle, cloned once per reporter
#[derive(Debug, Clone)]
pub struct LogQueueSender {
    tx: mpsc::Sender<LogLine>,
    shared: Arc<Shared>,
}

impl LogQueueSender {
    /// Enqueue a line, waiting while the queue is full
    ///
    /// # Errors
    /// Returns `QueueClosed` if the queue is closed before or while waiting.
    pub async fn send(&self, line: LogLine) -> Result<(), QueueClosed> {
        let notified = self.shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.shared.is_closed() {
            return Err(QueueClosed);
        }

        tokio::select! {
            biased;
            () = &mut notified => Err(QueueClosed),
            res = self.tx.send(line) => res.map_err(|_| QueueClosed),
        }
    }

    /// Resolves once the queue is closed or the consumer is gone
    pub async fn closed(&self) {
        let notified = self.shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.shared.is_closed() {
            return;
        }

        tokio::select! {
            () = &mut notified => {}
            () = self.tx.closed() => {}
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed() || self.tx.is_closed()
    }
}

/// Consumer handle, owned by the relay
#[derive(Debug)]
pub struct LogQueueReceiver {
    rx: mpsc::Receiver<LogLine>,
    shared: Arc<Shared>,
}

impl LogQueueReceiver {
    /// Next line, or `None` once the queue is closed and drained
    ///
    /// Lines already buffered when the queue closes are still delivered.
    pub async fn recv(&mut self) -> Option<LogLine> {
        if !self.shared.is_closed() {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.shared.is_closed() {
                tokio::select! {
                    biased;
                    line = self.rx.recv() => return line,
                    () = &mut notified => {}
                }
            }
        }

        self.rx.close();
        self.rx.recv().await
    }
}

/// Stops the queue accepting lines
#[derive(Debug, Clone)]
pub struct LogQueueCloser {
    shared: Arc<Shared>,
}

impl LogQueueCloser {
    /// Close the queue; idempotent
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use chrono::Utc;

    use super::*;

    fn line(reporter: &str, n: usize) -> LogLine {
        LogLine {
            host_id: "local".to_string(),
            host_name: "box".to_string(),
            reporter_id: reporter.to_string(),
            line: format!("{reporter}-{n}"),
            tags: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_single_producer_is_fifo() {
        let (tx, mut rx, _closer) = log_queue(10);

        for n in 0..5 {
            tx.send(line("a", n)).await.unwrap();
        }
        drop(tx);

        let mut got = Vec::new();
        while let Some(l) = rx.recv().await {
            got.push(l.line);
        }
        assert_eq!(got, vec!["a-0", "a-1", "a-2", "a-3", "a-4"]);
    }

    #[tokio::test]
    async fn test_eleventh_send_blocks_until_drained() {
        let (tx, mut rx, _closer) = log_queue(10);
        let accepted = Arc::new(AtomicUsize::new(0));

        for reporter in ["a", "b"] {
            let tx = tx.clone();
            let accepted = accepted.clone();
            tokio::spawn(async move {
                for n in 0..10 {
                    if tx.send(line(reporter, n)).await.is_err() {
                        return;
                    }
                    accepted.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
        drop(tx);

        settle().await;
        assert_eq!(accepted.load(Ordering::SeqCst), 10);

        rx.recv().await.unwrap();
        settle().await;
        assert_eq!(accepted.load(Ordering::SeqCst), 11);

        let mut drained = 1;
        while rx.recv().await.is_some() {
            drained += 1;
        }
        assert_eq!(drained, 20);
    }

    #[tokio::test]
    async fn test_close_rejects_new_lines() {
        let (tx, _rx, closer) = log_queue(10);

        tx.send(line("a", 0)).await.unwrap();
        closer.close();

        assert!(tx.is_closed());
        assert_eq!(tx.send(line("a", 1)).await, Err(QueueClosed));
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_sender() {
        let (tx, _rx, closer) = log_queue(1);
        tx.send(line("a", 0)).await.unwrap();

        let blocked = tokio::spawn({
            let tx = tx.clone();
            async move { tx.send(line("a", 1)).await }
        });
        settle().await;
        assert!(!blocked.is_finished());

        closer.close();
        assert_eq!(blocked.await.unwrap(), Err(QueueClosed));
    }

    #[tokio::test]
    async fn test_receiver_drains_then_ends_after_close() {
        let (tx, mut rx, closer) = log_queue(10);
        tx.send(line("a", 0)).await.unwrap();
        tx.send(line("a", 1)).await.unwrap();

        closer.close();

        assert_eq!(rx.recv().await.map(|l| l.line), Some("a-0".to_string()));
        assert_eq!(rx.recv().await.map(|l| l.line), Some("a-1".to_string()));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_resolves_on_close() {
        let (tx, _rx, closer) = log_queue(10);

        let waiter = tokio::spawn(async move { tx.closed().await });
        settle().await;
        assert!(!waiter.is_finished());

        closer.close();
        waiter.await.unwrap();
    }
}
