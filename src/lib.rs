//! # streamvisor
//!
//! **Streamvisor** is a small push-based reactive stream library for Rust on tokio.
//!
//! Producers push values into a [`Subject`]; consumers read them through
//! [`Subscription`]s; operators in [`ops`] turn one subscription into another.
//! Every hop is a rendezvous: a push returns only after the consumer took the value,
//! so a slow consumer throttles the whole chain and nothing is buffered implicitly.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐
//!     │   Subject    │  push(v) ─ waits until every live subscription took v
//!     └──────┬───────┘
//!            │ one rendezvous channel per subscription
//!     ┌──────┴────────────────┬───────────────────────┐
//!     ▼                       ▼                       ▼
//! ┌──────────────┐     ┌──────────────┐        ┌──────────────┐
//! │ Subscription │     │ Subscription │        │ Subscription │
//! └──────┬───────┘     └──────┬───────┘        └──────┬───────┘
//!        ▼                    ▼                       ▼
//! ┌──────────────┐     ┌──────────────┐         ops::subscribe
//! │  ops::map    │     │ ops::flat_map│──┐       (terminal sink)
//! │ driver task  │     │ driver task  │  │ TaskGroup
//! └──────┬───────┘     └──────┬───────┘  ├─► branch 1
//!        ▼                    ▼          └─► branch N
//!   Subscription         Subscription
//! ```
//!
//! ### Operator lifecycle
//! ```text
//! ops::op(src) ──► fresh Subject + driver future ──► returns Subscription (lazy)
//!
//! first poll of the Subscription
//!   └─► spawn driver
//!         loop {
//!           ├─► src.next()          (Err(e) ─► fail output with e)
//!           ├─► transform / filter / schedule
//!           └─► out.push(value)     (waits for the consumer)
//!         }
//!         ├─ Ok        ─► out.complete()
//!         ├─ Err(e)    ─► out.fail(e)
//!         └─ panic     ─► out.fail(Upstream("panicked: ..."))
//!
//! drop(Subscription) ─► driver cancelled ─► drops src ─► upstream driver cancelled
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types                                 |
//! |-------------------|-----------------------------------------------------------------|-------------------------------------------|
//! | **Channels**      | Capacity-one handoff where send waits for the reader.           | [`rendezvous::channel`]                   |
//! | **Fan-out**       | Multicast with backpressure and a readiness gate.               | [`Subject`], [`Subscription`]             |
//! | **Operators**     | Sources, transforms, nested streams, timing, sinks.             | [`ops`]                                   |
//! | **Task scopes**   | Spawn-and-join barrier with optional concurrency limit.         | [`TaskGroup`]                             |
//! | **Errors**        | One typed error travelling with the stream.                     | [`StreamError`]                           |
//! | **Configuration** | Concurrency settings for fan-out operators.                     | [`Config`]                                |
//!
//! ## Logging
//! Drivers emit [`tracing`] events (`operator` field): `debug` on start/stop, `warn` when a
//! stream fails, `error` when a driver panics. Install any `tracing` subscriber to see them.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use streamvisor::{ops, StreamError, Subject};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), StreamError> {
//!     let readings = Subject::<u32>::new();
//!     let alerts = ops::map(
//!         ops::filter(readings.subscribe(), |t| *t > 80),
//!         |t| format!("too hot: {t}"),
//!     );
//!
//!     let producer = tokio::spawn({
//!         let readings = readings.clone();
//!         async move {
//!             for t in [70, 85, 60, 90] {
//!                 readings.push(t).await?;
//!                 tokio::time::sleep(Duration::from_millis(1)).await;
//!             }
//!             readings.complete();
//!             Ok::<_, StreamError>(())
//!         }
//!     });
//!
//!     let mut seen = Vec::new();
//!     ops::subscribe(alerts, |msg| {
//!         seen.push(msg);
//!         async { Ok(()) }
//!     })
//!     .await?;
//!
//!     producer.await.expect("producer task")?;
//!     assert_eq!(seen, vec!["too hot: 85", "too hot: 90"]);
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod tasks;

pub mod ops;

// ---- Public re-exports ----

pub use config::Config;
pub use core::rendezvous;
pub use core::{Subject, Subscription};
pub use error::{BoxError, StreamError};
pub use tasks::TaskGroup;
