//! # Single-slot rendezvous channel.
//!
//! A [`channel`] connects one [`Receiver`] with one logical writer (the
//! [`Sender`] may be cloned so several tasks can write). It never buffers more
//! than one value: [`Sender::send`] returns only after the reader took the value.
//!
//! ## Architecture
//! ```text
//! send(v) ──► [writers: Semaphore(1), FIFO] ──► slot = Some(v, ack, turn) ──► wake reader
//!    ▲                                                                          │
//!    └──────────────────────── ack ◄── poll_recv() takes slot, releases turn ◄──┘
//! ```
//!
//! ## Rules
//! - **One value in flight**: the writer turn (semaphore permit) travels with the value
//!   in the slot and is released by the reader. A writer cancelled while waiting for its
//!   ack never lets the next writer overwrite the slot.
//! - **FIFO writers**: concurrent senders are served in arrival order.
//! - **Terminal once**: `complete`/`fail` set the terminal state at most once; later calls
//!   are no-ops. Queued writers are released with [`StreamError::Closed`].
//! - **Drain before end**: a value already in the slot is still delivered before the
//!   reader observes completion or failure.
//! - **Reader gone**: dropping (or closing) the receiver fails pending and future sends
//!   with [`StreamError::Cancelled`].

use std::future::poll_fn;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};

use crate::error::StreamError;

/// Creates a rendezvous channel.
///
/// # Example
/// ```
/// use streamvisor::rendezvous;
///
/// # tokio_test::block_on(async {
/// let (tx, mut rx) = rendezvous::channel::<u32>();
///
/// let writer = tokio::spawn(async move {
///     tx.send(7).await?;
///     tx.complete();
///     Ok::<_, streamvisor::StreamError>(())
/// });
///
/// assert_eq!(rx.recv().await.unwrap(), Some(7));
/// assert_eq!(rx.recv().await.unwrap(), None);
/// writer.await.unwrap().unwrap();
/// # });
/// ```
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            slot: None,
            terminal: Terminal::Open,
            reader: None,
            reader_alive: true,
        }),
        writers: Arc::new(Semaphore::new(1)),
    });
    (
        Sender {
            shared: Arc::clone(&shared),
        },
        Receiver { shared },
    )
}

/// Terminal state of a channel.
#[derive(Debug, Clone)]
enum Terminal {
    Open,
    Completed,
    Failed(StreamError),
}

/// A value waiting for the reader, together with the writer's turn.
struct Pending<T> {
    value: T,
    ack: oneshot::Sender<()>,
    turn: OwnedSemaphorePermit,
}

struct State<T> {
    slot: Option<Pending<T>>,
    terminal: Terminal,
    /// Waker of a blocked read.
    reader: Option<Waker>,
    reader_alive: bool,
}

impl<T> State<T> {
    /// Returns why a new value cannot be accepted, if it cannot.
    fn rejection(&self) -> Option<StreamError> {
        if !self.reader_alive {
            Some(StreamError::Cancelled)
        } else if !matches!(self.terminal, Terminal::Open) {
            Some(StreamError::Closed)
        } else {
            None
        }
    }
}

struct Shared<T> {
    state: Mutex<State<T>>,
    writers: Arc<Semaphore>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the channel into `terminal` if it is still open.
    fn terminate(&self, terminal: Terminal) -> bool {
        let reader = {
            let mut state = self.lock();
            if !matches!(state.terminal, Terminal::Open) {
                return false;
            }
            state.terminal = terminal;
            state.reader.take()
        };
        self.writers.close();
        if let Some(waker) = reader {
            waker.wake();
        }
        true
    }
}

/// Writing half of a rendezvous channel.
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Sender<T> {
    /// Hands `value` to the reader and waits until it was taken.
    ///
    /// ### Errors
    /// - [`StreamError::Closed`] if the channel completed or failed (never blocks then)
    /// - [`StreamError::Cancelled`] if the reader is gone, before or while waiting
    ///
    /// ### Cancel safety
    /// Dropping the returned future after the value was installed does not retract it:
    /// the reader still receives it, and no other writer can proceed until it does.
    pub async fn send(&self, value: T) -> Result<(), StreamError> {
        if let Some(err) = self.shared.lock().rejection() {
            return Err(err);
        }

        let turn = match Arc::clone(&self.shared.writers).acquire_owned().await {
            Ok(turn) => turn,
            Err(_closed) => {
                return Err(self
                    .shared
                    .lock()
                    .rejection()
                    .unwrap_or(StreamError::Closed))
            }
        };

        let (ack, acked) = oneshot::channel();
        let reader = {
            let mut state = self.shared.lock();
            if let Some(err) = state.rejection() {
                return Err(err);
            }
            state.slot = Some(Pending { value, ack, turn });
            state.reader.take()
        };
        if let Some(waker) = reader {
            waker.wake();
        }

        acked.await.map_err(|_| StreamError::Cancelled)
    }

    /// Marks the channel completed. Returns `false` if it was already terminated.
    pub fn complete(&self) -> bool {
        self.shared.terminate(Terminal::Completed)
    }

    /// Marks the channel failed with `err`. Returns `false` if it was already terminated.
    pub fn fail(&self, err: StreamError) -> bool {
        self.shared.terminate(Terminal::Failed(err))
    }

    /// Returns `true` once the reader was dropped or closed.
    pub fn is_closed(&self) -> bool {
        !self.shared.lock().reader_alive
    }

    /// Returns `true` once the channel completed or failed.
    pub fn is_terminated(&self) -> bool {
        !matches!(self.shared.lock().terminal, Terminal::Open)
    }
}

/// Reading half of a rendezvous channel.
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Receiver<T> {
    /// Waits for the next value.
    ///
    /// Returns `Ok(Some(v))` for a value, `Ok(None)` once the channel completed, and the
    /// stored error (on every call) once it failed.
    pub async fn recv(&mut self) -> Result<Option<T>, StreamError> {
        poll_fn(|cx| self.poll_recv(cx)).await
    }

    /// Polls for the next value. See [`recv`](Self::recv).
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<T>, StreamError>> {
        let mut state = self.shared.lock();

        let pending = state.slot.take();
        if let Some(Pending { value, ack, turn }) = pending {
            drop(state);
            drop(turn);
            let _ = ack.send(());
            return Poll::Ready(Ok(Some(value)));
        }

        let outcome = match &state.terminal {
            Terminal::Open => None,
            Terminal::Completed => Some(Ok(None)),
            Terminal::Failed(err) => Some(Err(err.clone())),
        };
        match outcome {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                state.reader = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }

    /// Stops receiving. Pending and future sends fail with [`StreamError::Cancelled`].
    ///
    /// The receiver observes completion afterwards.
    pub fn close(&mut self) {
        let pending = {
            let mut state = self.shared.lock();
            state.reader_alive = false;
            state.reader = None;
            if matches!(state.terminal, Terminal::Open) {
                state.terminal = Terminal::Completed;
            }
            state.slot.take()
        };
        self.shared.writers.close();
        drop(pending);
    }

    /// Returns `true` once the channel completed or failed.
    pub fn is_terminated(&self) -> bool {
        !matches!(self.shared.lock().terminal, Terminal::Open)
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::yield_now;

    async fn settle() {
        for _ in 0..8 {
            yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_send_waits_for_reader() {
        let (tx, mut rx) = channel::<u32>();
        let writer = tokio::spawn(async move { tx.send(1).await });

        settle().await;
        assert!(!writer.is_finished(), "send must not return before the read");

        assert_eq!(rx.recv().await.unwrap(), Some(1));
        writer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_writers_are_served_fifo() {
        let (tx, mut rx) = channel::<u32>();

        let mut writers = Vec::new();
        for v in 1..=3 {
            let tx = tx.clone();
            writers.push(tokio::spawn(async move { tx.send(v).await }));
            settle().await;
        }

        for expected in 1..=3 {
            assert_eq!(rx.recv().await.unwrap(), Some(expected));
        }
        for w in writers {
            w.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_complete_wakes_waiting_reader() {
        let (tx, mut rx) = channel::<u32>();
        let reader = tokio::spawn(async move { rx.recv().await });

        settle().await;
        assert!(tx.complete());
        assert!(!tx.complete(), "second complete is a no-op");

        assert_eq!(reader.await.unwrap().unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_after_terminal_is_rejected_immediately() {
        let (tx, _rx) = channel::<u32>();
        tx.complete();
        assert!(matches!(tx.send(1).await, Err(StreamError::Closed)));
        assert!(!tx.fail(StreamError::msg("late")));
        assert!(tx.is_terminated());
    }

    #[tokio::test]
    async fn test_failure_is_reported_on_every_read() {
        let (tx, mut rx) = channel::<u32>();
        tx.fail(StreamError::msg("boom"));

        for _ in 0..2 {
            let err = rx.recv().await.unwrap_err();
            assert_eq!(err.to_string(), "upstream failure: boom");
        }
    }

    #[tokio::test]
    async fn test_value_in_slot_is_drained_before_completion() {
        let (tx, mut rx) = channel::<u32>();
        let writer = {
            let tx = tx.clone();
            tokio::spawn(async move { tx.send(5).await })
        };
        settle().await;
        tx.complete();

        assert_eq!(rx.recv().await.unwrap(), Some(5));
        assert_eq!(rx.recv().await.unwrap(), None);
        writer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_queued_writer_is_released_on_complete() {
        let (tx, mut rx) = channel::<u32>();
        let first = {
            let tx = tx.clone();
            tokio::spawn(async move { tx.send(1).await })
        };
        settle().await;
        let second = {
            let tx = tx.clone();
            tokio::spawn(async move { tx.send(2).await })
        };
        settle().await;

        tx.complete();
        assert!(matches!(second.await.unwrap(), Err(StreamError::Closed)));

        assert_eq!(rx.recv().await.unwrap(), Some(1));
        first.await.unwrap().unwrap();
        assert_eq!(rx.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dropped_reader_cancels_writers() {
        let (tx, rx) = channel::<u32>();
        let writer = {
            let tx = tx.clone();
            tokio::spawn(async move { tx.send(1).await })
        };
        settle().await;

        drop(rx);
        assert!(matches!(writer.await.unwrap(), Err(StreamError::Cancelled)));
        assert!(tx.is_closed());
        assert!(matches!(tx.send(2).await, Err(StreamError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancelled_writer_keeps_its_slot() {
        let (tx, mut rx) = channel::<u32>();
        let first = {
            let tx = tx.clone();
            tokio::spawn(async move { tx.send(1).await })
        };
        settle().await;
        first.abort();
        let _ = first.await;

        let second = {
            let tx = tx.clone();
            tokio::spawn(async move { tx.send(2).await })
        };
        settle().await;
        assert!(!second.is_finished());

        assert_eq!(rx.recv().await.unwrap(), Some(1));
        assert_eq!(rx.recv().await.unwrap(), Some(2));
        second.await.unwrap().unwrap();
    }

    #[test]
    fn test_send_sync_bounds() {
        static_assertions::assert_impl_all!(Sender<u32>: Send, Sync, Clone);
        static_assertions::assert_impl_all!(Receiver<u32>: Send, Sync);
    }
}
