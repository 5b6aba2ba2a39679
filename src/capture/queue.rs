//! Strictly ordered, rate-limited command dispatch
//!
//! One drain loop at a time pulls commands off the pending list and sends
//! them over the connection, sleeping a fixed delay between dispatches so the
//! server's tick processing keeps up. Every submitted command gets its own
//! completion handle; a failed dispatch settles only that handle and the
//! drain keeps going.
//!
//! There is no cancellation, retry, or per-command timeout: a hung transport
//! stalls the queue until the connection dies.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{CaptureError, Result, TransportError};

/// Write half of the server connection as the dispatcher sees it
pub trait Transport: Send + Sync + 'static {
    /// Send one textual command
    fn send_command(
        &self,
        command: &str,
    ) -> impl Future<Output = std::result::Result<(), TransportError>> + Send;

    /// Write pre-encoded packet bytes, bypassing the command channel
    fn send_raw(
        &self,
        bytes: &[u8],
    ) -> impl Future<Output = std::result::Result<(), TransportError>> + Send;
}

struct PendingCommand {
    command: String,
    done: oneshot::Sender<std::result::Result<(), TransportError>>,
}

struct Inner {
    pending: VecDeque<PendingCommand>,
    draining: bool,
}

/// Completion handle for a submitted command
pub struct CommandHandle {
    done: oneshot::Receiver<std::result::Result<(), TransportError>>,
}

impl CommandHandle {
    /// Wait until the command has been dispatched, or failed
    pub async fn dispatched(self) -> Result<()> {
        match self.done.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(CaptureError::Transport(err)),
            Err(_) => Err(CaptureError::QueueClosed),
        }
    }
}

/// Serialized command dispatcher: at most one command in flight, strict
/// submission order, a fixed minimum gap between dispatch starts.
pub struct CommandQueue<T: Transport> {
    transport: Arc<T>,
    delay: Duration,
    inner: Arc<Mutex<Inner>>,
    submitted: AtomicUsize,
}

impl<T: Transport> CommandQueue<T> {
    pub fn new(transport: Arc<T>, delay: Duration) -> Self {
        Self {
            transport,
            delay,
            inner: Arc::new(Mutex::new(Inner {
                pending: VecDeque::new(),
                draining: false,
            })),
            submitted: AtomicUsize::new(0),
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Commands submitted over the queue's lifetime
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Enqueue a command. The handle resolves once the command has been sent;
    /// if no drain loop is active, this submission starts one.
    pub fn submit(&self, command: impl Into<String>) -> CommandHandle {
        let (done, handle) = oneshot::channel();
        self.submitted.fetch_add(1, Ordering::Relaxed);

        let start_drain = {
            let mut inner = self.inner.lock();
            inner.pending.push_back(PendingCommand {
                command: command.into(),
                done,
            });
            if inner.draining {
                false
            } else {
                inner.draining = true;
                true
            }
        };

        if start_drain {
            tokio::spawn(drain(
                self.transport.clone(),
                self.inner.clone(),
                self.delay,
            ));
        }

        CommandHandle { done: handle }
    }
}

async fn drain<T: Transport>(transport: Arc<T>, inner: Arc<Mutex<Inner>>, delay: Duration) {
    loop {
        let next = {
            let mut inner = inner.lock();
            match inner.pending.pop_front() {
                Some(pending) => pending,
                None => {
                    inner.draining = false;
                    return;
                }
            }
        };

        tracing::debug!(command = %next.command, "dispatching command");
        let result = transport.send_command(&next.command).await;
        if let Err(ref err) = result {
            tracing::warn!(command = %next.command, error = %err, "command dispatch failed");
        }
        // Receiver may have been dropped; dispatch happened either way
        let _ = next.done.send(result);

        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;

    use super::*;

    /// Test transport that records everything sent through it
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub sent: Mutex<Vec<(Instant, String)>>,
        pub raw: Mutex<Vec<Vec<u8>>>,
        fail_matching: Option<&'static str>,
        busy: AtomicBool,
        pub overlapped: AtomicBool,
    }

    impl RecordingTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail any command containing `marker`
        pub fn failing_on(marker: &'static str) -> Self {
            Self {
                fail_matching: Some(marker),
                ..Self::default()
            }
        }

        pub fn commands(&self) -> Vec<String> {
            self.sent.lock().iter().map(|(_, c)| c.clone()).collect()
        }

        pub fn dispatch_starts(&self) -> Vec<Instant> {
            self.sent.lock().iter().map(|(at, _)| *at).collect()
        }
    }

    impl Transport for RecordingTransport {
        async fn send_command(&self, command: &str) -> std::result::Result<(), TransportError> {
            if self.busy.swap(true, Ordering::SeqCst) {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            self.sent.lock().push((Instant::now(), command.to_string()));
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.busy.store(false, Ordering::SeqCst);

            if let Some(marker) = self.fail_matching
                && command.contains(marker)
            {
                return Err(TransportError::Closed);
            }
            Ok(())
        }

        async fn send_raw(&self, bytes: &[u8]) -> std::result::Result<(), TransportError> {
            self.raw.lock().push(bytes.to_vec());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingTransport;
    use super::*;

    const TEST_DELAY: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn dispatches_in_submission_order_with_spacing() {
        let transport = Arc::new(RecordingTransport::new());
        let queue = CommandQueue::new(transport.clone(), TEST_DELAY);

        let first = queue.submit("say one");
        let second = queue.submit("say two");
        let third = queue.submit("say three");

        first.dispatched().await.unwrap();
        second.dispatched().await.unwrap();
        third.dispatched().await.unwrap();

        assert_eq!(transport.commands(), ["say one", "say two", "say three"]);

        let starts = transport.dispatch_starts();
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= TEST_DELAY);
        }
        assert!(!transport.overlapped.load(Ordering::SeqCst));
        assert_eq!(queue.submitted(), 3);
    }

    #[tokio::test]
    async fn failure_settles_only_its_own_handle() {
        let transport = Arc::new(RecordingTransport::failing_on("boom"));
        let queue = CommandQueue::new(transport.clone(), Duration::from_millis(1));

        let ok = queue.submit("say ok");
        let bad = queue.submit("say boom");
        let after = queue.submit("say after");

        ok.dispatched().await.unwrap();
        let err = bad.dispatched().await.unwrap_err();
        assert!(matches!(err, CaptureError::Transport(_)));
        after.dispatched().await.unwrap();

        assert_eq!(transport.commands(), ["say ok", "say boom", "say after"]);
    }

    #[tokio::test]
    async fn late_submissions_join_the_active_drain() {
        let transport = Arc::new(RecordingTransport::new());
        let queue = CommandQueue::new(transport.clone(), Duration::from_millis(10));

        let first = queue.submit("say first");
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = queue.submit("say second");

        first.dispatched().await.unwrap();
        second.dispatched().await.unwrap();
        assert_eq!(transport.commands(), ["say first", "say second"]);
        assert!(!transport.overlapped.load(Ordering::SeqCst));

        // either joins the tail of that drain or starts a fresh one
        let third = queue.submit("say third");
        third.dispatched().await.unwrap();
        assert_eq!(transport.commands().len(), 3);
    }
}
