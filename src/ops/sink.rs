//! Terminal sinks: drive a stream to its end.

use std::future::Future;

use futures::StreamExt;

use crate::config::Config;
use crate::core::Subscription;
use crate::error::StreamError;
use crate::tasks::TaskGroup;

/// Runs `callback` for each value, one at a time, until the stream ends.
///
/// Returns `Ok(())` when the stream completed and the first error otherwise: a stream
/// failure, or an error returned by `callback`. Returning early drops `src`, which
/// cancels every driver upstream.
pub async fn subscribe<T, F, Fut>(src: Subscription<T>, callback: F) -> Result<(), StreamError>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<(), StreamError>>,
{
    let mut src = src;
    let mut callback = callback;
    while let Some(item) = src.next().await {
        callback(item?).await?;
    }
    Ok(())
}

/// Runs `callback` for each value in its own task, with unbounded concurrency.
///
/// Resolves once the stream ended and every callback finished. The first failure
/// aborts the callbacks still running.
pub async fn subscribe_concurrent<T, F, Fut>(
    src: Subscription<T>,
    callback: F,
) -> Result<(), StreamError>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
{
    subscribe_concurrent_with(src, callback, &Config::default()).await
}

/// Like [`subscribe_concurrent`], with at most [`Config::max_concurrent`] callbacks
/// running at once. While the limit is reached the stream is not read.
pub async fn subscribe_concurrent_with<T, F, Fut>(
    src: Subscription<T>,
    callback: F,
    cfg: &Config,
) -> Result<(), StreamError>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
{
    let mut src = src;
    let mut callback = callback;
    let mut callbacks = TaskGroup::from_config(cfg);

    loop {
        tokio::select! {
            Some(res) = callbacks.join_next(), if !callbacks.is_empty() => res?,
            item = src.next() => match item {
                Some(item) => callbacks.start(callback(item?)).await?,
                None => break,
            },
        }
    }
    callbacks.try_join().await
}
