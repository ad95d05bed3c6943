//! Operators that start a stream.

use std::future::Future;
use std::pin::pin;

use futures::stream::{Stream, StreamExt};

use crate::core::runner::spawn_operator;
use crate::core::{Subject, Subscription};
use crate::error::StreamError;

/// Emits each element of `items` in order, then completes.
pub fn from_iterator<I>(items: I) -> Subscription<I::Item>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Clone + Send + 'static,
{
    let items = items.into_iter();
    spawn_operator("from_iterator", move |out| async move {
        for item in items {
            out.push(item).await?;
        }
        Ok(())
    })
}

/// Emits each item of an asynchronous `stream`, then completes.
///
/// The stream is polled only as fast as the subscription is read.
pub fn from_stream<S>(stream: S) -> Subscription<S::Item>
where
    S: Stream + Send + 'static,
    S::Item: Clone + Send + 'static,
{
    spawn_operator("from_stream", move |out| async move {
        let mut stream = pin!(stream);
        while let Some(item) = stream.next().await {
            out.push(item).await?;
        }
        Ok(())
    })
}

/// Runs `producer` as the driver of a fresh subject.
///
/// The producer pushes values into the subject it receives. Returning `Ok(())`
/// completes the stream; returning an error (or panicking) fails it.
///
/// # Example
/// ```
/// use futures::TryStreamExt;
/// use streamvisor::{ops, StreamError};
///
/// # tokio_test::block_on(async {
/// let countdown = ops::generate(|out| async move {
///     for n in (1..=3).rev() {
///         out.push(n).await?;
///     }
///     Err(StreamError::msg("liftoff"))
/// });
///
/// let mut seen = Vec::new();
/// let res = ops::subscribe(countdown, |n| {
///     seen.push(n);
///     async { Ok(()) }
/// })
/// .await;
/// assert_eq!(seen, vec![3, 2, 1]);
/// assert_eq!(res.unwrap_err().to_string(), "upstream failure: liftoff");
/// # });
/// ```
pub fn generate<T, F, Fut>(producer: F) -> Subscription<T>
where
    T: Send + 'static,
    F: FnOnce(Subject<T>) -> Fut,
    Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
{
    spawn_operator("generate", producer)
}
