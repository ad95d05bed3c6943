//! Per-value operators: transforms, filters and stream shaping.

use std::future::Future;

use futures::StreamExt;

use crate::core::runner::spawn_operator;
use crate::core::Subscription;
use crate::error::StreamError;

/// Emits `f(v)` for every value `v` of `src`, in order.
///
/// A panic in `f` fails the output stream.
pub fn map<T, U, F>(src: Subscription<T>, f: F) -> Subscription<U>
where
    T: Send + 'static,
    U: Clone + Send + 'static,
    F: FnMut(T) -> U + Send + 'static,
{
    spawn_operator("map", move |out| async move {
        let mut src = src;
        let mut f = f;
        while let Some(item) = src.next().await {
            out.push(f(item?)).await?;
        }
        Ok(())
    })
}

/// Emits the result of the asynchronous transform `f` for every value, in order.
///
/// The next source value is read only after `f` resolved and its result was taken
/// by the consumer. An `Err` from `f` fails the output stream.
pub fn map_async<T, U, F, Fut>(src: Subscription<T>, f: F) -> Subscription<U>
where
    T: Send + 'static,
    U: Clone + Send + 'static,
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<U, StreamError>> + Send + 'static,
{
    spawn_operator("map_async", move |out| async move {
        let mut src = src;
        let mut f = f;
        while let Some(item) = src.next().await {
            let value = f(item?).await?;
            out.push(value).await?;
        }
        Ok(())
    })
}

/// Emits the values of `src` for which `predicate` returns `true`.
pub fn filter<T, P>(src: Subscription<T>, predicate: P) -> Subscription<T>
where
    T: Clone + Send + 'static,
    P: FnMut(&T) -> bool + Send + 'static,
{
    spawn_operator("filter", move |out| async move {
        let mut src = src;
        let mut predicate = predicate;
        while let Some(item) = src.next().await {
            let value = item?;
            if predicate(&value) {
                out.push(value).await?;
            }
        }
        Ok(())
    })
}

/// Like [`filter`], with an asynchronous predicate.
///
/// The future returned by `predicate` must not borrow the value; clone what it needs.
pub fn filter_async<T, P, Fut>(src: Subscription<T>, predicate: P) -> Subscription<T>
where
    T: Clone + Send + 'static,
    P: FnMut(&T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<bool, StreamError>> + Send + 'static,
{
    spawn_operator("filter_async", move |out| async move {
        let mut src = src;
        let mut predicate = predicate;
        while let Some(item) = src.next().await {
            let value = item?;
            if predicate(&value).await? {
                out.push(value).await?;
            }
        }
        Ok(())
    })
}

/// Suppresses consecutive duplicates.
///
/// The first value is always emitted; afterwards a value is emitted only when it
/// differs from the last emitted one. `[1, 1, 2, 2, 2, 3, 1]` becomes `[1, 2, 3, 1]`.
pub fn distinct_until_changed<T>(src: Subscription<T>) -> Subscription<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    spawn_operator("distinct_until_changed", move |out| async move {
        let mut src = src;
        let mut last: Option<T> = None;
        while let Some(item) = src.next().await {
            let value = item?;
            if last.as_ref() == Some(&value) {
                continue;
            }
            last = Some(value.clone());
            out.push(value).await?;
        }
        Ok(())
    })
}

/// Emits at most the first `n` values, then completes and cancels `src`.
///
/// `take(src, 0)` completes without reading anything.
pub fn take<T>(src: Subscription<T>, n: usize) -> Subscription<T>
where
    T: Clone + Send + 'static,
{
    spawn_operator("take", move |out| async move {
        let mut src = src;
        let mut left = n;
        while left > 0 {
            let Some(item) = src.next().await else {
                break;
            };
            out.push(item?).await?;
            left -= 1;
        }
        // Dropping the source cancels its driver before the output completes.
        drop(src);
        Ok(())
    })
}

/// Emits `first`, then every value of `src`.
pub fn starts_with<T>(src: Subscription<T>, first: T) -> Subscription<T>
where
    T: Clone + Send + 'static,
{
    spawn_operator("starts_with", move |out| async move {
        let mut src = src;
        out.push(first).await?;
        while let Some(item) = src.next().await {
            out.push(item?).await?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Subject;
    use crate::ops::{from_iterator, generate};
    use futures::TryStreamExt;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn collect<T>(sub: Subscription<T>) -> Result<Vec<T>, StreamError> {
        sub.try_collect().await
    }

    #[tokio::test]
    async fn test_map_applies_in_order() {
        let out = collect(map(from_iterator(vec![1, 2, 3]), |v| v * 10)).await.unwrap();
        assert_eq!(out, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_map_panic_fails_stream() {
        let mut sub = map(from_iterator(vec![1, 2, 3]), |v: i32| {
            if v == 2 {
                panic!("bad value");
            }
            v
        });
        assert_eq!(sub.recv().await.unwrap(), Some(1));
        let err = sub.recv().await.unwrap_err();
        assert_eq!(err.as_label(), "stream_upstream");
        assert!(err.to_string().contains("bad value"));
        assert_eq!(sub.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_map_async_error_fails_stream() {
        let mut sub = map_async(from_iterator(vec![1, 2]), |v: i32| async move {
            if v == 2 {
                Err(StreamError::msg("lookup failed"))
            } else {
                Ok(v.to_string())
            }
        });
        assert_eq!(sub.recv().await.unwrap(), Some("1".to_string()));
        let err = sub.recv().await.unwrap_err();
        assert_eq!(err.to_string(), "upstream failure: lookup failed");
    }

    #[tokio::test]
    async fn test_filter_keeps_matching() {
        let out = collect(filter(from_iterator(1..=10), |v| v % 3 == 0)).await.unwrap();
        assert_eq!(out, vec![3, 6, 9]);
    }

    #[tokio::test]
    async fn test_filter_async_keeps_matching() {
        let out = collect(filter_async(from_iterator(vec!["a", "bb", "ccc"]), |s| {
            let keep = s.len() != 2;
            async move { Ok(keep) }
        }))
        .await
        .unwrap();
        assert_eq!(out, vec!["a", "ccc"]);
    }

    #[tokio::test]
    async fn test_distinct_until_changed() {
        let out = collect(distinct_until_changed(from_iterator(vec![1, 1, 2, 2, 2, 3, 1])))
            .await
            .unwrap();
        assert_eq!(out, vec![1, 2, 3, 1]);
    }

    #[tokio::test]
    async fn test_take_bounds() {
        let src = || from_iterator(vec![1, 2, 3]);
        assert!(collect(take(src(), 0)).await.unwrap().is_empty());
        assert_eq!(collect(take(src(), 2)).await.unwrap(), vec![1, 2]);
        assert_eq!(collect(take(src(), 3)).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(collect(take(src(), 10)).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_take_cancels_infinite_source() {
        let produced = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        struct Flag(Arc<AtomicBool>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let counter = Arc::clone(&produced);
        let flag = Flag(Arc::clone(&finished));
        let naturals = generate(move |out| async move {
            let _flag = flag;
            for n in 0u64.. {
                counter.fetch_add(1, Ordering::SeqCst);
                out.push(n).await?;
            }
            Ok(())
        });

        let out = collect(take(naturals, 3)).await.unwrap();
        assert_eq!(out, vec![0, 1, 2]);

        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        assert!(finished.load(Ordering::SeqCst), "source driver must be cancelled");
        assert!(produced.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_starts_with_seed_first() {
        let out = collect(starts_with(from_iterator(vec![2, 3]), 1)).await.unwrap();
        assert_eq!(out, vec![1, 2, 3]);

        let out = collect(starts_with(from_iterator(Vec::<i32>::new()), 0)).await.unwrap();
        assert_eq!(out, vec![0]);
    }

    #[tokio::test]
    async fn test_upstream_failure_passes_through_chain() {
        let subject = Subject::<i32>::new();
        let mut chain = map(filter(subject.subscribe(), |v| *v > 0), |v| v + 1);

        let producer = tokio::spawn({
            let subject = subject.clone();
            async move {
                subject.push(1).await?;
                subject.fail(StreamError::msg("sensor offline"));
                Ok::<_, StreamError>(())
            }
        });

        assert_eq!(chain.recv().await.unwrap(), Some(2));
        let err = chain.recv().await.unwrap_err();
        assert_eq!(err.to_string(), "upstream failure: sensor offline");
        producer.await.unwrap().unwrap();
    }
}
