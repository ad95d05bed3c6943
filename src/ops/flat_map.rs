//! Nested streams merged into one.
//!
//! ```text
//! src ──► f(v1) ──► branch 1 ─┐
//!     ──► f(v2) ──► branch 2 ─┼──► out   (interleaved, no cross-branch order)
//!     ──► f(v3) ──► branch 3 ─┘
//! ```
//!
//! Branches run in a [`TaskGroup`]; the output completes after the source completed
//! and every branch finished. The first failure (source, `f`, or a branch) fails the
//! output and aborts the remaining branches.

use std::pin::pin;

use futures::stream::{Stream, StreamExt};

use crate::config::Config;
use crate::core::runner::spawn_operator;
use crate::core::{Subject, Subscription};
use crate::error::StreamError;
use crate::tasks::TaskGroup;

/// Maps every value to a nested stream and merges all of them into the output.
///
/// Nested streams run with unbounded concurrency; use [`flat_map_with`] to cap it.
///
/// # Example
/// ```
/// use futures::TryStreamExt;
/// use streamvisor::ops;
///
/// # tokio_test::block_on(async {
/// let out = ops::flat_map(ops::from_iterator(vec![1, 2]), |v| ops::from_iterator(vec![v, v]));
/// let mut out: Vec<i32> = out.try_collect().await.unwrap();
/// out.sort();
/// assert_eq!(out, vec![1, 1, 2, 2]);
/// # });
/// ```
pub fn flat_map<T, U, S, F>(src: Subscription<T>, f: F) -> Subscription<U>
where
    T: Send + 'static,
    U: Clone + Send + 'static,
    S: Stream<Item = Result<U, StreamError>> + Send + 'static,
    F: FnMut(T) -> S + Send + 'static,
{
    flat_map_with(src, f, &Config::default())
}

/// Like [`flat_map`], with at most [`Config::max_concurrent`] nested streams running
/// at once. While the limit is reached the source is not read.
pub fn flat_map_with<T, U, S, F>(src: Subscription<T>, f: F, cfg: &Config) -> Subscription<U>
where
    T: Send + 'static,
    U: Clone + Send + 'static,
    S: Stream<Item = Result<U, StreamError>> + Send + 'static,
    F: FnMut(T) -> S + Send + 'static,
{
    let cfg = cfg.clone();
    spawn_operator("flat_map", move |out| async move {
        let mut src = src;
        let mut f = f;
        let mut branches = TaskGroup::from_config(&cfg);

        loop {
            tokio::select! {
                Some(res) = branches.join_next(), if !branches.is_empty() => res?,
                item = src.next() => match item {
                    Some(item) => {
                        let inner = f(item?);
                        branches.start(forward(inner, out.clone())).await?;
                    }
                    None => break,
                },
            }
        }

        tracing::trace!(running = branches.len(), "flat_map source completed");
        branches.try_join().await
    })
}

async fn forward<U, S>(inner: S, out: Subject<U>) -> Result<(), StreamError>
where
    U: Clone,
    S: Stream<Item = Result<U, StreamError>>,
{
    let mut inner = pin!(inner);
    while let Some(item) = inner.next().await {
        out.push(item?).await?;
    }
    Ok(())
}
