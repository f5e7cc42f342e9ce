//! Host side of an animation: event loop, native timer adapters, surface notifications.

/// Timer backends driven by [`event_loop::EventLoop`].
pub mod backends;
/// Cooperative single-threaded event loop.
pub mod event_loop;
/// Figure handle tying a surface to its notifications and timers.
pub mod figure;
/// Surface lifecycle notifications.
pub mod signals;
