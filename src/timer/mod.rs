//! Backend-agnostic periodic timers.
//!
//! A [`Timer`] owns an ordered callback registry and delegates arming to a
//! [`TimerBackend`](backend::TimerBackend), one implementation per host event-loop technology.

/// Native timer backends and capability reporting.
pub mod backend;
/// The normalized periodic timer.
pub mod periodic;
/// Ordered, identity-comparable callback registrations.
pub mod registry;
