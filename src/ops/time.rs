//! Time-based operators.
//!
//! Both operators measure time with [`tokio::time`], so tests can run them on a
//! paused clock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::runner::spawn_operator;
use crate::core::Subscription;
use crate::error::StreamError;
use crate::tasks::TaskGroup;

/// Re-emits every value `period` after it arrived, preserving order.
///
/// The source is read eagerly; values wait in an unbounded queue until their
/// deadline. A source failure is forwarded right after the values that preceded it,
/// without extra delay. A zero period forwards values unchanged.
pub fn delay<T>(src: Subscription<T>, period: Duration) -> Subscription<T>
where
    T: Clone + Send + 'static,
{
    if period.is_zero() {
        return spawn_operator("delay", move |out| async move {
            let mut src = src;
            while let Some(item) = src.next().await {
                out.push(item?).await?;
            }
            Ok(())
        });
    }

    spawn_operator("delay", move |out| async move {
        let (tx, mut rx) = mpsc::unbounded_channel::<Result<(Instant, T), StreamError>>();

        let intake = async move {
            let mut src = src;
            while let Some(item) = src.next().await {
                let deadline = Instant::now() + period;
                let failed = item.is_err();
                if tx.send(item.map(|value| (deadline, value))).is_err() || failed {
                    break;
                }
            }
            Ok::<(), StreamError>(())
        };

        let emit = async {
            while let Some(item) = rx.recv().await {
                let (deadline, value) = item?;
                sleep_until(deadline).await;
                out.push(value).await?;
            }
            Ok::<(), StreamError>(())
        };

        tokio::try_join!(intake, emit).map(|_| ())
    })
}

struct Latest<T> {
    seq: u64,
    value: Option<T>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Emits a value only after `period` passed without a newer one arriving.
///
/// Every arrival bumps a sequence number and arms a timer; a timer emits only if its
/// sequence number is still the latest. When the source completes, a pending value is
/// emitted immediately and the stream ends without waiting for idle timers. A source
/// failure discards the pending value.
pub fn debounce<T>(src: Subscription<T>, period: Duration) -> Subscription<T>
where
    T: Clone + Send + 'static,
{
    spawn_operator("debounce", move |out| async move {
        let mut src = src;
        let latest = Arc::new(Mutex::new(Latest { seq: 0, value: None }));
        let idle = CancellationToken::new();
        let mut timers = TaskGroup::new();

        while let Some(item) = src.next().await {
            let value = item?;
            let seq = {
                let mut latest = lock(&latest);
                latest.seq += 1;
                latest.value = Some(value);
                latest.seq
            };
            timers.reap()?;

            let latest = Arc::clone(&latest);
            let out = out.clone();
            let idle = idle.clone();
            timers
                .start(async move {
                    tokio::select! {
                        biased;
                        _ = idle.cancelled() => return Ok(()),
                        _ = sleep(period) => {}
                    }
                    let value = {
                        let mut latest = lock(&latest);
                        if latest.seq != seq {
                            return Ok(());
                        }
                        latest.value.take()
                    };
                    match value {
                        Some(value) => out.push(value).await,
                        None => Ok(()),
                    }
                })
                .await?;
        }

        let pending = {
            let mut latest = lock(&latest);
            latest.seq += 1;
            latest.value.take()
        };
        // Sleeping timers are stale now; only one that already took a value is joined.
        idle.cancel();
        if let Some(value) = pending {
            tracing::trace!("debounce flushing pending value on completion");
            out.push(value).await?;
        }
        timers.try_join().await
    })
}
