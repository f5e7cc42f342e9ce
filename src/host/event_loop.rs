use crate::foundation::error::CadenzaResult;
use crate::timer::periodic::TickHandle;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Handle to a scheduled timeout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(u64);

/// Work the loop runs whenever it has nothing due, such as coalesced redraws.
pub trait IdleTask {
    /// Returns `true` when it did something.
    fn run_idle(&self) -> CadenzaResult<bool>;
}

/// Counters for one `run_for` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Timer ticks dispatched.
    pub ticks: u64,
    /// Idle tasks that did work (full redraws).
    pub redraws: u64,
}

enum Clock {
    Virtual { now_ms: u64 },
    Wall { origin: Instant },
}

struct Source {
    due_ms: u64,
    period_ms: Option<u32>,
    tick: TickHandle,
}

struct LoopState {
    clock: Clock,
    next_id: u64,
    sources: HashMap<SourceId, Source>,
    idle: Vec<Rc<dyn IdleTask>>,
}

/// Single-threaded cooperative event loop.
///
/// Timeouts fire in due order (ties in scheduling order); between two timeouts every idle task
/// runs once. With a virtual clock, time jumps straight to the next due timeout, which makes
/// playback deterministic in tests. With a wall clock the loop sleeps.
#[derive(Clone)]
pub struct EventLoop {
    state: Rc<RefCell<LoopState>>,
}

impl EventLoop {
    pub fn virtual_time() -> Self {
        Self::with_clock(Clock::Virtual { now_ms: 0 })
    }

    pub fn wall_clock() -> Self {
        Self::with_clock(Clock::Wall {
            origin: Instant::now(),
        })
    }

    fn with_clock(clock: Clock) -> Self {
        Self {
            state: Rc::new(RefCell::new(LoopState {
                clock,
                next_id: 0,
                sources: HashMap::new(),
                idle: Vec::new(),
            })),
        }
    }

    pub fn now_ms(&self) -> u64 {
        match &self.state.borrow().clock {
            Clock::Virtual { now_ms } => *now_ms,
            Clock::Wall { origin } => origin.elapsed().as_millis() as u64,
        }
    }

    pub fn schedule_once(&self, delay_ms: u32, tick: TickHandle) -> SourceId {
        self.insert(delay_ms, None, tick)
    }

    pub fn schedule_repeating(&self, period_ms: u32, tick: TickHandle) -> SourceId {
        self.insert(period_ms, Some(period_ms), tick)
    }

    fn insert(&self, delay_ms: u32, period_ms: Option<u32>, tick: TickHandle) -> SourceId {
        let due_ms = self.now_ms() + u64::from(delay_ms);
        let mut st = self.state.borrow_mut();
        let id = SourceId(st.next_id);
        st.next_id += 1;
        st.sources.insert(
            id,
            Source {
                due_ms,
                period_ms,
                tick,
            },
        );
        id
    }

    pub fn cancel(&self, id: SourceId) -> bool {
        self.state.borrow_mut().sources.remove(&id).is_some()
    }

    pub fn is_scheduled(&self, id: SourceId) -> bool {
        self.state.borrow().sources.contains_key(&id)
    }

    pub fn pending_sources(&self) -> usize {
        self.state.borrow().sources.len()
    }

    pub fn add_idle(&self, task: Rc<dyn IdleTask>) {
        self.state.borrow_mut().idle.push(task);
    }

    /// Run every idle task once. Returns how many did work.
    pub fn run_idle(&self) -> CadenzaResult<u64> {
        let tasks = self.state.borrow().idle.clone();
        let mut n = 0;
        for task in tasks {
            if task.run_idle()? {
                n += 1;
            }
        }
        Ok(n)
    }

    /// Dispatch timeouts due within the next `duration_ms`.
    ///
    /// Returns early once nothing is scheduled. Errors from tick callbacks or idle tasks stop
    /// the loop and are returned.
    pub fn run_for(&self, duration_ms: u64) -> CadenzaResult<RunStats> {
        let deadline = self.now_ms() + duration_ms;
        let mut stats = RunStats::default();
        loop {
            stats.redraws += self.run_idle()?;

            let Some((id, due_ms)) = self.next_due() else {
                break;
            };
            if due_ms > deadline {
                self.advance_to(deadline);
                break;
            }
            self.advance_to(due_ms);

            let tick = {
                let mut st = self.state.borrow_mut();
                match st.sources.get_mut(&id) {
                    Some(src) => match src.period_ms {
                        Some(p) => {
                            src.due_ms += u64::from(p);
                            src.tick.clone()
                        }
                        None => {
                            let tick = src.tick.clone();
                            st.sources.remove(&id);
                            tick
                        }
                    },
                    None => continue,
                }
            };
            if !tick.is_alive() {
                tracing::trace!(?id, "dropping timeout of a dead timer");
                self.cancel(id);
                continue;
            }
            stats.ticks += 1;
            tick.fire()?;
        }
        Ok(stats)
    }

    fn next_due(&self) -> Option<(SourceId, u64)> {
        self.state
            .borrow()
            .sources
            .iter()
            .map(|(id, s)| (*id, s.due_ms))
            .min_by_key(|(id, due)| (*due, *id))
    }

    fn advance_to(&self, t_ms: u64) {
        let sleep_ms = {
            let mut st = self.state.borrow_mut();
            match &mut st.clock {
                Clock::Virtual { now_ms } => {
                    *now_ms = (*now_ms).max(t_ms);
                    0
                }
                Clock::Wall { origin } => t_ms.saturating_sub(origin.elapsed().as_millis() as u64),
            }
        };
        if sleep_ms > 0 {
            std::thread::sleep(Duration::from_millis(sleep_ms));
        }
    }
}
