//! Stream core: the rendezvous handshake and the fan-out built on it.
//!
//! Internal modules:
//! - [`rendezvous`]: single-slot channel between one reader and its writers;
//! - [`subscription`]: consumer cursor, lazily starts and cancels its driver;
//! - [`subject`]: multicast hub with readiness gate and terminal state;
//! - [`runner`]: runs operator drivers with cancellation and panic isolation.

pub mod rendezvous;
pub(crate) mod runner;
mod subject;
mod subscription;

pub use subject::Subject;
pub use subscription::Subscription;
