//! # Cooperative task tracking.
//!
//! This module provides [`TaskGroup`], the join barrier used by operators that start
//! per-item work (`flat_map`, `debounce`, concurrent `subscribe`) and must not signal
//! completion before that work is done.

mod group;

pub use group::TaskGroup;
