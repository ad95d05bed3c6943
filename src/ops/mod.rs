//! # Stream operators.
//!
//! Every operator takes a source [`Subscription`](crate::Subscription), starts a
//! driver that pulls from it and pushes into a fresh [`Subject`](crate::Subject), and
//! returns that subject's subscription. Operators are lazy: the driver starts on the
//! first poll of the returned subscription. Dropping the returned subscription
//! cancels the driver, which drops its source and so cancels the whole chain upstream.
//!
//! | Operator                          | Emits                                                     |
//! |-----------------------------------|-----------------------------------------------------------|
//! | [`from_iterator`]                 | each element of a finite sequence, then completes         |
//! | [`from_stream`]                   | each item of a `futures::Stream`                           |
//! | [`generate`]                      | whatever the closure pushes into its subject               |
//! | [`map`] / [`map_async`]           | `f(v)` for every `v`, in order                             |
//! | [`filter`] / [`filter_async`]     | `v` where the predicate holds                              |
//! | [`flat_map`] / [`flat_map_with`]  | items of every nested stream, interleaved                  |
//! | [`delay`]                         | every `v`, shifted later by a fixed period                 |
//! | [`debounce`]                      | `v` once the period elapsed without a newer value          |
//! | [`distinct_until_changed`]        | `v` when it differs from the last emitted value            |
//! | [`take`]                          | the first `n` values, then completes                       |
//! | [`starts_with`]                   | a seed value, then every `v`                               |
//!
//! Terminal sinks: [`subscribe`] (sequential) and [`subscribe_concurrent`] /
//! [`subscribe_concurrent_with`] (callbacks run in a [`TaskGroup`](crate::TaskGroup)).
//!
//! ## Errors
//! A failing source, transform, predicate or nested stream fails the output stream with
//! the same [`StreamError`](crate::StreamError). Panics inside drivers are reported as
//! upstream failures. Nothing is retried.
//!
//! ## Example
//! ```
//! use futures::TryStreamExt;
//! use streamvisor::ops;
//!
//! # tokio_test::block_on(async {
//! let words = ops::from_iterator(vec!["a", "a", "b", "c", "c"]);
//! let upper = ops::map(ops::distinct_until_changed(words), |w| w.to_uppercase());
//! let out: Vec<String> = ops::starts_with(upper, "<".to_string()).try_collect().await.unwrap();
//! assert_eq!(out, vec!["<", "A", "B", "C"]);
//! # });
//! ```

mod flat_map;
mod sink;
mod source;
mod time;
mod transform;

pub use flat_map::{flat_map, flat_map_with};
pub use sink::{subscribe, subscribe_concurrent, subscribe_concurrent_with};
pub use source::{from_iterator, from_stream, generate};
pub use time::{debounce, delay};
pub use transform::{
    distinct_until_changed, filter, filter_async, map, map_async, starts_with, take,
};
