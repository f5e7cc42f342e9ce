use crate::foundation::error::CadenzaResult;
use crate::host::event_loop::{EventLoop, IdleTask};
use crate::host::signals::{ConnectionId, Signals, SurfaceEvent, SurfaceEventKind};
use crate::surface::Surface;
use crate::timer::backend::{TimerBackendKind, create_backend};
use crate::timer::periodic::{Timer, TimerOpts};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

/// Host-side handle to a surface: owns its lifecycle notifications and hands out timers.
///
/// Cloning shares the surface.
pub struct Figure<S> {
    surface: Rc<RefCell<S>>,
    signals: Rc<Signals>,
    host: Option<EventLoop>,
    timer_backend: TimerBackendKind,
}

impl<S> Clone for Figure<S> {
    fn clone(&self) -> Self {
        Self {
            surface: self.surface.clone(),
            signals: self.signals.clone(),
            host: self.host.clone(),
            timer_backend: self.timer_backend,
        }
    }
}

impl<S: Surface> Figure<S> {
    /// A figure driven by hand: timers are manual, redraws happen on [`Figure::draw`].
    pub fn new(surface: S) -> Self {
        Self {
            surface: Rc::new(RefCell::new(surface)),
            signals: Rc::new(Signals::new()),
            host: None,
            timer_backend: TimerBackendKind::Manual,
        }
    }

    /// A figure living on `host`: idle redraws are flushed by the loop and timers without a
    /// native implementation use `timer_backend`.
    pub fn attached(surface: S, host: &EventLoop, timer_backend: TimerBackendKind) -> Self {
        let fig = Self {
            surface: Rc::new(RefCell::new(surface)),
            signals: Rc::new(Signals::new()),
            host: Some(host.clone()),
            timer_backend,
        };
        host.add_idle(Rc::new(IdleRedraw {
            surface: Rc::downgrade(&fig.surface),
            signals: Rc::downgrade(&fig.signals),
        }));
        fig
    }

    pub fn surface(&self) -> Ref<'_, S> {
        self.surface.borrow()
    }

    pub fn surface_mut(&self) -> RefMut<'_, S> {
        self.surface.borrow_mut()
    }

    pub fn host(&self) -> Option<&EventLoop> {
        self.host.as_ref()
    }

    pub fn connect(
        &self,
        kind: SurfaceEventKind,
        handler: impl Fn(&SurfaceEvent) -> CadenzaResult<()> + 'static,
    ) -> ConnectionId {
        self.signals.connect(kind, handler)
    }

    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.signals.disconnect(id)
    }

    pub fn handler_count(&self, kind: SurfaceEventKind) -> usize {
        self.signals.handler_count(kind)
    }

    /// Create a timer for animations on this figure.
    ///
    /// Prefers the surface's native timer; otherwise installs the configured adapter.
    pub fn new_timer(&self, interval_ms: u32) -> CadenzaResult<Timer> {
        let native = self.surface.borrow_mut().native_timer();
        let backend = match native {
            Some(backend) => {
                tracing::debug!("using surface-native timer");
                backend
            }
            None => {
                tracing::debug!(kind = ?self.timer_backend, "no native timer; installing adapter");
                create_backend(self.timer_backend, self.host.as_ref())?
            }
        };
        Timer::new(
            backend,
            TimerOpts {
                interval_ms,
                single_shot: false,
            },
        )
    }

    /// Repaint everything now and notify `Draw` subscribers.
    pub fn draw(&self) -> CadenzaResult<()> {
        draw_and_notify(&self.surface, &self.signals)
    }

    /// Schedule the first paint, as a window does when it is shown.
    pub fn show(&self) {
        self.surface.borrow_mut().request_idle_redraw();
    }

    /// Perform a pending idle redraw, if any.
    pub fn flush_idle(&self) -> CadenzaResult<bool> {
        if !self.surface.borrow().redraw_pending() {
            return Ok(false);
        }
        self.draw()?;
        Ok(true)
    }

    pub fn resize(&self, width: u32, height: u32) -> CadenzaResult<()> {
        self.surface.borrow_mut().resize(width, height)?;
        self.signals.emit(SurfaceEvent::Resize { width, height })?;
        Ok(())
    }

    pub fn close(&self) -> CadenzaResult<()> {
        self.signals.emit(SurfaceEvent::Close)?;
        Ok(())
    }
}

fn draw_and_notify<S: Surface>(surface: &RefCell<S>, signals: &Signals) -> CadenzaResult<()> {
    surface.borrow_mut().redraw()?;
    signals.emit(SurfaceEvent::Draw)?;
    Ok(())
}

struct IdleRedraw<S> {
    surface: Weak<RefCell<S>>,
    signals: Weak<Signals>,
}

impl<S: Surface> IdleTask for IdleRedraw<S> {
    fn run_idle(&self) -> CadenzaResult<bool> {
        let (Some(surface), Some(signals)) = (self.surface.upgrade(), self.signals.upgrade())
        else {
            return Ok(false);
        };
        if !surface.borrow().redraw_pending() {
            return Ok(false);
        }
        draw_and_notify(&surface, &signals)?;
        Ok(true)
    }
}
