//! # Subject: fan-out hub with synchronous multicast.
//!
//! A [`Subject`] is the producer side of a stream. Every [`subscribe`](Subject::subscribe)
//! call creates an independent [`Subscription`]; every [`push`](Subject::push)
//! hands the value to all live subscriptions and waits until each of them took it.
//!
//! ## Architecture
//! ```text
//!                   ┌──────────── lifecycle (watch) ────────────┐
//!                   │  Pending → Ready → Completed | Failed(e)  │
//!                   └───────────────────────────────────────────┘
//! push(v)
//!   ├─► lock delivery               (FIFO across concurrent pushers)
//!   ├─► wait until Ready            (readiness gate: first subscribe)
//!   ├─► prune closed writers
//!   └─► join_all(writer_i.send(v))  (returns once every live reader took v)
//!           ├──► [rendezvous 1] ──► Subscription 1
//!           ├──► [rendezvous 2] ──► Subscription 2
//!           └──► [rendezvous N] ──► Subscription N
//! ```
//!
//! ## Rules
//! - **Backpressure**: the slowest live subscription throttles the producer.
//! - **Readiness gate**: pushes wait for the first subscription instead of dropping values.
//! - **Abandoned subscriptions**: skipped silently; never an error for the producer.
//! - **Terminal once**: after `complete`/`fail`, pushes fail with [`StreamError::Closed`]
//!   without blocking, and late subscribers observe the terminal state immediately.
//! - **Same order everywhere**: concurrent pushes are delivered one at a time, so all
//!   subscriptions observe the same sequence.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use tokio::sync::watch;

use crate::core::rendezvous::{self, Sender};
use crate::core::subscription::Subscription;
use crate::error::StreamError;

/// Lifecycle of a subject.
#[derive(Debug, Clone)]
enum Lifecycle {
    /// Nobody subscribed yet; pushes wait.
    Pending,
    /// At least one subscription was attached.
    Ready,
    Completed,
    Failed(StreamError),
}

impl Lifecycle {
    fn is_terminal(&self) -> bool {
        matches!(self, Lifecycle::Completed | Lifecycle::Failed(_))
    }
}

struct Shared<T> {
    subscribers: Mutex<Vec<Sender<T>>>,
    lifecycle: watch::Sender<Lifecycle>,
    /// Serializes deliveries; tokio's mutex is fair, so pushers go in FIFO order.
    delivery: tokio::sync::Mutex<()>,
}

impl<T> Shared<T> {
    fn subscribers(&self) -> MutexGuard<'_, Vec<Sender<T>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer handle of a multicast stream.
///
/// Cheap to clone; all clones drive the same stream.
///
/// # Example
/// ```
/// use futures::TryStreamExt;
/// use streamvisor::Subject;
///
/// # tokio_test::block_on(async {
/// let subject = Subject::new();
/// let first = subject.subscribe();
/// let second = subject.subscribe();
///
/// let producer = {
///     let subject = subject.clone();
///     tokio::spawn(async move {
///         for v in [1, 2, 3] {
///             subject.push(v).await?;
///         }
///         subject.complete();
///         Ok::<_, streamvisor::StreamError>(())
///     })
/// };
///
/// let (a, b) = tokio::join!(
///     first.try_collect::<Vec<i32>>(),
///     second.try_collect::<Vec<i32>>(),
/// );
/// assert_eq!(a.unwrap(), vec![1, 2, 3]);
/// assert_eq!(b.unwrap(), vec![1, 2, 3]);
/// producer.await.unwrap().unwrap();
/// # });
/// ```
pub struct Subject<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers = self.shared.subscribers().len();
        let lifecycle = self.shared.lifecycle.borrow().clone();
        f.debug_struct("Subject")
            .field("lifecycle", &lifecycle)
            .field("subscribers", &subscribers)
            .finish()
    }
}

impl<T> Subject<T> {
    /// Creates an open subject with no subscriptions.
    pub fn new() -> Self {
        let (lifecycle, _) = watch::channel(Lifecycle::Pending);
        Self {
            shared: Arc::new(Shared {
                subscribers: Mutex::new(Vec::new()),
                lifecycle,
                delivery: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Attaches a new subscription and opens the readiness gate.
    ///
    /// The subscription sees values pushed from now on (no replay). Subscribing to a
    /// terminated subject yields a subscription that ends (or fails) immediately.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = rendezvous::channel();
        {
            let mut subscribers = self.shared.subscribers();
            let state = self.shared.lifecycle.borrow().clone();
            match state {
                Lifecycle::Completed => {
                    tx.complete();
                }
                Lifecycle::Failed(err) => {
                    tx.fail(err);
                }
                Lifecycle::Pending | Lifecycle::Ready => {
                    subscribers.retain(|s| !s.is_closed());
                    subscribers.push(tx);
                    self.shared.lifecycle.send_if_modified(|state| {
                        if matches!(state, Lifecycle::Pending) {
                            *state = Lifecycle::Ready;
                            true
                        } else {
                            false
                        }
                    });
                }
            }
        }
        Subscription::new(rx)
    }

    /// Delivers `value` to every live subscription.
    ///
    /// ### Flow
    /// 1. Waits for its turn behind concurrent pushers (FIFO)
    /// 2. Waits for the first subscription if none was ever attached
    /// 3. Waits until every live subscription took the value
    ///
    /// A push with no live subscriptions left (all abandoned) drops the value and succeeds.
    ///
    /// ### Errors
    /// [`StreamError::Closed`] if the subject completed or failed.
    pub async fn push(&self, value: T) -> Result<(), StreamError>
    where
        T: Clone,
    {
        // Queue for the turn first so pushes gated on the first subscriber keep FIFO order.
        let _turn = self.shared.delivery.lock().await;
        self.ready().await?;

        let targets = self.live_targets()?;
        if targets.is_empty() {
            tracing::trace!("no live subscriptions; value dropped");
            return Ok(());
        }

        let results = join_all(targets.iter().map(|tx| tx.send(value.clone()))).await;

        let mut outcome = Ok(());
        for res in results {
            match res {
                Ok(()) | Err(StreamError::Cancelled) => {}
                Err(err) => outcome = Err(err),
            }
        }
        outcome
    }

    /// Completes the stream for all current and future subscriptions.
    ///
    /// Returns `false` (and does nothing) if the subject was already terminated.
    pub fn complete(&self) -> bool {
        self.terminate(Lifecycle::Completed)
    }

    /// Fails the stream with `err` for all current and future subscriptions.
    ///
    /// Returns `false` (and does nothing) if the subject was already terminated.
    pub fn fail(&self, err: StreamError) -> bool {
        self.terminate(Lifecycle::Failed(err))
    }

    /// Returns `true` once the subject completed or failed.
    pub fn is_done(&self) -> bool {
        self.shared.lifecycle.borrow().is_terminal()
    }

    /// Returns the number of subscriptions that are still being read.
    pub fn subscriber_count(&self) -> usize {
        self.shared
            .subscribers()
            .iter()
            .filter(|s| !s.is_closed())
            .count()
    }

    /// Waits until the subject reaches its terminal state.
    ///
    /// Resolves `Ok(())` on completion and with the error on failure.
    pub async fn closed(&self) -> Result<(), StreamError> {
        let mut rx = self.shared.lifecycle.subscribe();
        let outcome = match rx.wait_for(Lifecycle::is_terminal).await {
            Ok(state) => match &*state {
                Lifecycle::Failed(err) => Err(err.clone()),
                _ => Ok(()),
            },
            Err(_) => Ok(()),
        };
        outcome
    }

    /// Readiness gate: resolves once a subscription was attached.
    async fn ready(&self) -> Result<(), StreamError> {
        let mut rx = self.shared.lifecycle.subscribe();
        let open = match rx
            .wait_for(|state| !matches!(state, Lifecycle::Pending))
            .await
        {
            Ok(state) => matches!(*state, Lifecycle::Ready),
            Err(_) => false,
        };
        if open {
            Ok(())
        } else {
            Err(StreamError::Closed)
        }
    }

    /// Resolves the live writers, pruning the ones whose reader is gone.
    fn live_targets(&self) -> Result<Vec<Sender<T>>, StreamError> {
        let mut subscribers = self.shared.subscribers();
        if self.shared.lifecycle.borrow().is_terminal() {
            return Err(StreamError::Closed);
        }

        let before = subscribers.len();
        subscribers.retain(|s| !s.is_closed());
        let pruned = before - subscribers.len();
        if pruned > 0 {
            tracing::trace!(pruned, "pruned abandoned subscriptions");
        }
        Ok(subscribers.clone())
    }

    fn terminate(&self, terminal: Lifecycle) -> bool {
        let subscribers = {
            let mut subscribers = self.shared.subscribers();
            let next = terminal.clone();
            let changed = self.shared.lifecycle.send_if_modified(move |state| {
                if state.is_terminal() {
                    false
                } else {
                    *state = next;
                    true
                }
            });
            if !changed {
                return false;
            }
            std::mem::take(&mut *subscribers)
        };

        for tx in subscribers {
            match &terminal {
                Lifecycle::Failed(err) => tx.fail(err.clone()),
                _ => tx.complete(),
            };
        }
        true
    }
}
