use crate::foundation::error::{CadenzaError, CadenzaResult};
use crate::timer::backend::{ManualBackend, TimerBackend, TimerCaps};
use crate::timer::registry::{CallArgs, Callback, CallbackRegistry, Flow};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Initial configuration of a [`Timer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TimerOpts {
    /// Milliseconds between ticks, at least 1.
    pub interval_ms: u32,
    /// Fire once, then stop.
    pub single_shot: bool,
}

impl Default for TimerOpts {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            single_shot: false,
        }
    }
}

struct TimerInner {
    backend: Box<dyn TimerBackend>,
    caps: TimerCaps,
    interval_ms: u32,
    single_shot: bool,
    active: bool,
    registry: CallbackRegistry,
}

impl TimerInner {
    fn halt(&mut self) {
        self.backend.timer_stop();
        if self.active {
            tracing::debug!(interval_ms = self.interval_ms, "timer stopped");
        }
        self.active = false;
    }
}

impl Drop for TimerInner {
    fn drop(&mut self) {
        self.backend.timer_stop();
    }
}

/// Periodic timer: fires its registered callbacks every `interval_ms`, in registration order.
///
/// `Timer` is a cheap shared handle. Cloning it does not create a new timer, which is how two
/// animations share one cadence.
#[derive(Clone)]
pub struct Timer {
    inner: Rc<RefCell<TimerInner>>,
}

/// Weak handle a backend uses to deliver ticks.
///
/// Ticks delivered after the timer was dropped are ignored.
#[derive(Clone, Debug)]
pub struct TickHandle {
    inner: Weak<RefCell<TimerInner>>,
}

impl TickHandle {
    /// Deliver one tick. Returns whether the timer is still running afterwards.
    pub fn fire(&self) -> CadenzaResult<bool> {
        match self.inner.upgrade() {
            Some(inner) => Timer { inner }.fire(),
            None => Ok(false),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl Timer {
    /// Wrap a native backend.
    ///
    /// Fails when the backend cannot start and stop, or `opts.interval_ms` is zero.
    pub fn new(backend: Box<dyn TimerBackend>, opts: TimerOpts) -> CadenzaResult<Self> {
        let caps = backend.capabilities();
        if !caps.start_stop {
            return Err(CadenzaError::config(
                "timer backend does not implement start/stop",
            ));
        }
        validate_interval(opts.interval_ms)?;
        Ok(Self {
            inner: Rc::new(RefCell::new(TimerInner {
                backend,
                caps,
                interval_ms: opts.interval_ms,
                single_shot: opts.single_shot,
                active: false,
                registry: CallbackRegistry::new(),
            })),
        })
    }

    /// A timer whose ticks are delivered by calling [`Timer::fire`].
    pub fn manual(interval_ms: u32) -> CadenzaResult<Self> {
        Self::new(
            Box::new(ManualBackend::new()),
            TimerOpts {
                interval_ms,
                single_shot: false,
            },
        )
    }

    pub fn tick_handle(&self) -> TickHandle {
        TickHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Start (or restart) firing, optionally setting a new interval first.
    pub fn start(&self, interval_ms: Option<u32>) -> CadenzaResult<()> {
        if let Some(ms) = interval_ms {
            self.set_interval(ms)?;
        }
        let tick = self.tick_handle();
        let mut inner = self.inner.borrow_mut();
        let ms = inner.interval_ms;
        inner.backend.timer_start(tick, ms);
        inner.active = true;
        tracing::debug!(interval_ms = ms, callbacks = inner.registry.len(), "timer started");
        Ok(())
    }

    /// Stop firing. Safe to call any number of times, started or not.
    pub fn stop(&self) {
        self.inner.borrow_mut().halt();
    }

    pub fn is_active(&self) -> bool {
        self.inner.borrow().active
    }

    pub fn interval_ms(&self) -> u32 {
        self.inner.borrow().interval_ms
    }

    /// Change cadence. A running timer picks the change up immediately: live when the backend
    /// supports it, otherwise through a restart.
    pub fn set_interval(&self, interval_ms: u32) -> CadenzaResult<()> {
        validate_interval(interval_ms)?;
        let tick = self.tick_handle();
        let mut inner = self.inner.borrow_mut();
        inner.interval_ms = interval_ms;
        if inner.active {
            if inner.caps.live_interval {
                inner.backend.timer_set_interval(interval_ms);
            } else {
                inner.backend.timer_stop();
                inner.backend.timer_start(tick, interval_ms);
            }
        }
        Ok(())
    }

    pub fn single_shot(&self) -> bool {
        self.inner.borrow().single_shot
    }

    pub fn set_single_shot(&self, single_shot: bool) {
        let mut inner = self.inner.borrow_mut();
        inner.single_shot = single_shot;
        inner.backend.timer_set_single_shot(single_shot);
    }

    pub fn add_callback(&self, func: Callback, args: CallArgs) {
        tracing::trace!(callback = func.name(), "timer callback added");
        self.inner.borrow_mut().registry.add(func, args);
    }

    /// Remove a registration; see [`CallbackRegistry::remove`] for the matching rule.
    pub fn remove_callback(&self, func: &Callback, args: Option<&CallArgs>) -> CadenzaResult<()> {
        self.inner.borrow_mut().registry.remove(func, args)
    }

    /// Remove the first registration of `func` if there is one.
    pub fn discard_callback(&self, func: &Callback) -> bool {
        self.inner.borrow_mut().registry.remove(func, None).is_ok()
    }

    /// Atomically swap the registration of `old` for `new`.
    pub fn replace_callback(&self, old: &Callback, new: Callback) -> CadenzaResult<()> {
        tracing::trace!(old = old.name(), new = new.name(), "timer callback swapped");
        self.inner
            .borrow_mut()
            .registry
            .replace(old, new, CallArgs::none())
    }

    pub fn has_callback(&self, func: &Callback) -> bool {
        self.inner.borrow().registry.contains(func, None)
    }

    pub fn callback_count(&self) -> usize {
        self.inner.borrow().registry.len()
    }

    pub fn callback_names(&self) -> Vec<String> {
        self.inner.borrow().registry.names()
    }

    /// `true` when both handles refer to the same timer.
    pub fn same_timer(&self, other: &Timer) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run one tick.
    ///
    /// Every callback registered when the tick began runs in order, unless an earlier callback
    /// removed it. A callback returning [`Flow::Stop`] is deregistered on the spot. When the
    /// registry ends up empty, or the timer is single-shot, the timer stops.
    ///
    /// A callback error aborts the tick and is returned unchanged. Returns whether the timer is
    /// still running.
    pub fn fire(&self) -> CadenzaResult<bool> {
        let snapshot = {
            let inner = self.inner.borrow();
            if !inner.active {
                tracing::trace!("tick on inactive timer ignored");
                return Ok(false);
            }
            inner.registry.snapshot()
        };

        for entry in snapshot {
            if !self.inner.borrow().registry.contains_serial(entry.serial) {
                continue;
            }
            if entry.func.invoke(&entry.args)? == Flow::Stop {
                tracing::debug!(callback = entry.func.name(), "timer callback deregistered");
                self.inner.borrow_mut().registry.remove_serial(entry.serial);
            }
        }

        let tick = self.tick_handle();
        let mut inner = self.inner.borrow_mut();
        if inner.registry.is_empty() || inner.single_shot {
            inner.halt();
            return Ok(false);
        }
        if inner.active {
            let ms = inner.interval_ms;
            inner.backend.timer_fired(&tick, ms);
        }
        Ok(inner.active)
    }
}

fn validate_interval(interval_ms: u32) -> CadenzaResult<()> {
    if interval_ms == 0 {
        return Err(CadenzaError::validation("timer interval must be >= 1 ms"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/timer/periodic.rs"]
mod tests;
