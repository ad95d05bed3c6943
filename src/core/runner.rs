//! # Run the driving task of an operator.
//!
//! Every operator owns a fresh [`Subject`] and a driver future that pulls from the
//! source and pushes into that subject. [`spawn_operator`] wires both together and
//! returns the subject's [`Subscription`]; [`run_driver`] executes the driver and maps
//! its outcome onto the subject's terminal state.
//!
//! ## Outcome mapping
//!
//! ```text
//! Ok(())              → subject.complete()
//! Err(Cancelled)      → subject.complete()   (consumer gone; not a failure)
//! token cancelled     → subject.complete()   (subscription dropped/cancelled)
//! Err(Closed|Upstream)→ subject.fail(err)
//! panic               → subject.fail(Upstream("panicked: ..."))
//! ```
//!
//! ## Rules
//! - The driver starts on the first poll of the returned subscription.
//! - Dropping the subscription cancels the driver at its next suspension point; the
//!   driver then drops its own source, which cancels the upstream driver in turn.
//! - Panics are isolated with `catch_unwind` and never take the runtime down.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::core::subject::Subject;
use crate::core::subscription::Subscription;
use crate::error::{from_panic, StreamError};

/// Builds an operator: a fresh subject driven by `body`, exposed as a lazy subscription.
///
/// `name` is used as the `operator` field in log records.
pub(crate) fn spawn_operator<U, F, Fut>(name: &'static str, body: F) -> Subscription<U>
where
    U: Send + 'static,
    F: FnOnce(Subject<U>) -> Fut,
    Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
{
    let subject = Subject::new();
    let subscription = subject.subscribe();
    let token = CancellationToken::new();

    let work = body(subject.clone());
    let driver = run_driver(name, subject, work, token.clone());

    subscription.with_driver(Box::pin(driver), token.drop_guard())
}

/// Executes one driver until it finishes, fails, panics or is cancelled.
///
/// Always leaves `subject` terminated.
pub(crate) async fn run_driver<U, Fut>(
    name: &'static str,
    subject: Subject<U>,
    work: Fut,
    token: CancellationToken,
) where
    Fut: Future<Output = Result<(), StreamError>>,
{
    tracing::debug!(operator = name, "driver started");

    let res = tokio::select! {
        biased;
        _ = token.cancelled() => Err(StreamError::Cancelled),
        res = AssertUnwindSafe(work).catch_unwind() => match res {
            Ok(res) => res,
            Err(panic) => {
                let err = from_panic(panic);
                tracing::error!(operator = name, error = %err, "driver panicked");
                Err(err)
            }
        },
    };

    match res {
        Ok(()) => {
            tracing::debug!(operator = name, "driver completed");
            subject.complete();
        }
        Err(err) if err.is_cancellation() => {
            tracing::debug!(operator = name, "driver cancelled");
            subject.complete();
        }
        Err(err) => {
            tracing::warn!(operator = name, label = err.as_label(), error = %err, "stream failed");
            subject.fail(err);
        }
    }
}
