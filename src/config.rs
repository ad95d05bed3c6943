//! # Operator configuration.
//!
//! Provides [`Config`], the settings shared by operators that run several
//! per-item tasks at once.
//!
//! Config is used in three places:
//! 1. **Nested streams**: `ops::flat_map_with(src, f, &config)`
//! 2. **Concurrent sinks**: `ops::subscribe_concurrent_with(src, f, &config)`
//! 3. **Task groups**: `TaskGroup::from_config(&config)`
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no semaphore created)

/// Settings for operators that fan work out into a [`TaskGroup`](crate::TaskGroup).
///
/// ## Field semantics
/// - `max_concurrent`: per-operator task concurrency limit (`0` = unlimited)
///
/// ## Notes
/// Fields are public. Prefer the helper accessors over sprinkling sentinel
/// checks (`0`) across the codebase.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of per-item tasks an operator runs at the same time.
    ///
    /// - `0` = unlimited (no semaphore)
    /// - `n > 0` = at most `n` tasks run simultaneously; starting another one
    ///   waits until a running task finishes
    pub max_concurrent: usize,
}

impl Config {
    /// Returns a config with the given concurrency limit (`0` = unlimited).
    pub fn with_max_concurrent(max_concurrent: usize) -> Self {
        Self { max_concurrent }
    }

    /// Returns the concurrency limit as an `Option`.
    ///
    /// - `None` → unlimited
    /// - `Some(n)` → at most `n` concurrent tasks
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }
}
