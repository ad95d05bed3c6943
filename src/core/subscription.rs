//! # Subscription: consumer-side cursor over a stream.
//!
//! A [`Subscription`] owns the reading half of a rendezvous channel. The
//! [`Subject`](crate::Subject) that feeds it only keeps the writing half, so
//! dropping the subscription is enough to unsubscribe.
//!
//! Subscriptions returned by operators also carry their driving task:
//! - the driver is spawned on the **first poll** (operators are lazy)
//! - the driver's [`CancellationToken`](tokio_util::sync::CancellationToken) is
//!   held as a drop guard, so dropping or cancelling the subscription cancels
//!   the driver at its next suspension point
//!
//! ## Iteration
//! ```text
//! Ok(Some(v)) → Some(Ok(v))
//! Ok(None)    → None                  (completed; fused afterwards)
//! Err(e)      → Some(Err(e)), then None
//! ```

use std::fmt;
use std::future::poll_fn;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures::future::BoxFuture;
use futures::stream::{FusedStream, Stream};
use tokio_util::sync::DropGuard;

use crate::core::rendezvous::Receiver;
use crate::error::StreamError;

/// Independent read cursor over a stream of `T`.
///
/// Implements [`Stream`] with `Item = Result<T, StreamError>`, so the usual
/// `futures` combinators (`next`, `try_collect`, ...) work on it.
///
/// # Example
/// ```
/// use futures::TryStreamExt;
/// use streamvisor::ops;
///
/// # tokio_test::block_on(async {
/// let squares = ops::map(ops::from_iterator(vec![1, 2, 3]), |v| v * v);
/// let out: Vec<i32> = squares.try_collect().await.unwrap();
/// assert_eq!(out, vec![1, 4, 9]);
/// # });
/// ```
pub struct Subscription<T> {
    rx: Receiver<T>,
    driver: Option<BoxFuture<'static, ()>>,
    guard: Option<DropGuard>,
    finished: bool,
}

impl<T> Subscription<T> {
    pub(crate) fn new(rx: Receiver<T>) -> Self {
        Self {
            rx,
            driver: None,
            guard: None,
            finished: false,
        }
    }

    /// Attaches a driver that starts on first poll and is cancelled when `guard` drops.
    pub(crate) fn with_driver(mut self, driver: BoxFuture<'static, ()>, guard: DropGuard) -> Self {
        self.driver = Some(driver);
        self.guard = Some(guard);
        self
    }

    /// Waits for the next value.
    ///
    /// Returns `Ok(None)` once the stream completed and the upstream error once it
    /// failed; after either, every further call returns `Ok(None)`.
    pub async fn recv(&mut self) -> Result<Option<T>, StreamError> {
        poll_fn(|cx| self.poll_recv(cx)).await
    }

    /// Unsubscribes: the feeding subject stops delivering to this cursor and the
    /// driver (if any) is cancelled. Later reads return `Ok(None)`.
    pub fn cancel(&mut self) {
        self.finished = true;
        self.driver = None;
        self.guard = None;
        self.rx.close();
    }

    /// Returns `true` once the stream ended, failed or was cancelled for this cursor.
    pub fn is_terminated(&self) -> bool {
        self.finished
    }

    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<T>, StreamError>> {
        if self.finished {
            return Poll::Ready(Ok(None));
        }
        if let Some(driver) = self.driver.take() {
            tokio::spawn(driver);
        }

        match ready!(self.rx.poll_recv(cx)) {
            Ok(Some(value)) => Poll::Ready(Ok(Some(value))),
            Ok(None) | Err(StreamError::Cancelled) => {
                self.finished = true;
                Poll::Ready(Ok(None))
            }
            Err(err) => {
                self.finished = true;
                Poll::Ready(Err(err))
            }
        }
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match ready!(this.poll_recv(cx)) {
            Ok(Some(value)) => Poll::Ready(Some(Ok(value))),
            Ok(None) => Poll::Ready(None),
            Err(err) => Poll::Ready(Some(Err(err))),
        }
    }
}

impl<T> FusedStream for Subscription<T> {
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("finished", &self.finished)
            .field("driver_pending", &self.driver.is_some())
            .field("cancellable", &self.guard.is_some())
            .finish()
    }
}
