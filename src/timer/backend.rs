use crate::foundation::error::{CadenzaError, CadenzaResult};
use crate::host::backends::{AfterBackend, RepeatingBackend};
use crate::host::event_loop::EventLoop;
use crate::timer::periodic::TickHandle;

/// What a native timer facility can do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerCaps {
    /// The backend can start and stop firing. Mandatory.
    pub start_stop: bool,
    /// The backend can change cadence of a running timer without a restart.
    pub live_interval: bool,
}

/// One host event-loop timer technology behind the normalized [`crate::Timer`] contract.
///
/// Backends only arm and disarm native timers; callback dispatch, single-shot handling and
/// auto-stop live in `Timer` so every backend behaves the same.
pub trait TimerBackend {
    fn capabilities(&self) -> TimerCaps;

    /// Begin firing `tick` every `interval_ms`. Called again to restart.
    fn timer_start(&mut self, tick: TickHandle, interval_ms: u32);

    /// Stop firing. Must be idempotent.
    fn timer_stop(&mut self);

    /// Live cadence update; only called when `live_interval` is advertised.
    fn timer_set_interval(&mut self, _interval_ms: u32) {}

    fn timer_set_single_shot(&mut self, _single_shot: bool) {}

    /// Called after a tick that left the timer running and repeating.
    ///
    /// Backends whose native facility is one-shot re-arm here.
    fn timer_fired(&mut self, _tick: &TickHandle, _interval_ms: u32) {}
}

/// Timer technology to install when the surface brings no native timer of its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerBackendKind {
    /// The host calls `Timer::fire` itself.
    #[default]
    Manual,
    /// One-shot `after(ms)` callbacks re-armed after every tick.
    After,
    /// A repeating source; cadence changes need stop + restart.
    Repeating,
}

/// Backend whose ticks are delivered by whoever owns the timer, via `Timer::fire`.
#[derive(Debug, Default)]
pub struct ManualBackend {
    armed: bool,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

impl TimerBackend for ManualBackend {
    fn capabilities(&self) -> TimerCaps {
        TimerCaps {
            start_stop: true,
            live_interval: true,
        }
    }

    fn timer_start(&mut self, _tick: TickHandle, _interval_ms: u32) {
        self.armed = true;
    }

    fn timer_stop(&mut self) {
        self.armed = false;
    }
}

/// Create a backend of `kind`.
///
/// Event-loop backed kinds need a `host`; asking for one without it is a configuration error.
pub fn create_backend(
    kind: TimerBackendKind,
    host: Option<&EventLoop>,
) -> CadenzaResult<Box<dyn TimerBackend>> {
    match (kind, host) {
        (TimerBackendKind::Manual, _) => Ok(Box::new(ManualBackend::new())),
        (TimerBackendKind::After, Some(h)) => Ok(Box::new(AfterBackend::new(h.clone()))),
        (TimerBackendKind::Repeating, Some(h)) => Ok(Box::new(RepeatingBackend::new(h.clone()))),
        (kind, None) => Err(CadenzaError::config(format!(
            "timer backend {kind:?} needs a host event loop"
        ))),
    }
}
