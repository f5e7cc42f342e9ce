use crate::host::event_loop::{EventLoop, SourceId};
use crate::timer::backend::{TimerBackend, TimerCaps};
use crate::timer::periodic::TickHandle;

/// Timer over one-shot `after(ms)` timeouts.
///
/// The native facility fires once, so the backend re-arms after every tick that leaves the
/// timer running. A cadence change lands on the next arm; `Timer` restarts it to apply it now.
pub struct AfterBackend {
    host: EventLoop,
    pending: Option<SourceId>,
}

impl AfterBackend {
    pub fn new(host: EventLoop) -> Self {
        Self {
            host,
            pending: None,
        }
    }
}

impl TimerBackend for AfterBackend {
    fn capabilities(&self) -> TimerCaps {
        TimerCaps {
            start_stop: true,
            live_interval: false,
        }
    }

    fn timer_start(&mut self, tick: TickHandle, interval_ms: u32) {
        self.timer_stop();
        self.pending = Some(self.host.schedule_once(interval_ms, tick));
    }

    fn timer_stop(&mut self) {
        if let Some(id) = self.pending.take() {
            self.host.cancel(id);
        }
    }

    fn timer_fired(&mut self, tick: &TickHandle, interval_ms: u32) {
        // A callback may already have restarted us during the tick.
        if self.pending.is_some_and(|id| self.host.is_scheduled(id)) {
            return;
        }
        self.pending = Some(self.host.schedule_once(interval_ms, tick.clone()));
    }
}

/// Timer over a repeating event-loop source. Changing cadence means removing the source and
/// adding a new one.
pub struct RepeatingBackend {
    host: EventLoop,
    source: Option<SourceId>,
}

impl RepeatingBackend {
    pub fn new(host: EventLoop) -> Self {
        Self { host, source: None }
    }
}

impl TimerBackend for RepeatingBackend {
    fn capabilities(&self) -> TimerCaps {
        TimerCaps {
            start_stop: true,
            live_interval: false,
        }
    }

    fn timer_start(&mut self, tick: TickHandle, interval_ms: u32) {
        self.timer_stop();
        self.source = Some(self.host.schedule_repeating(interval_ms, tick));
    }

    fn timer_stop(&mut self) {
        if let Some(id) = self.source.take() {
            self.host.cancel(id);
        }
    }
}
