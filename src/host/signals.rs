use crate::foundation::error::CadenzaResult;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceEventKind {
    Draw,
    Resize,
    Close,
}

/// Lifecycle notification raised by a host surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// A full redraw just completed.
    Draw,
    /// The surface changed size; pixel contents are no longer trustworthy.
    Resize { width: u32, height: u32 },
    /// The surface is closing.
    Close,
}

impl SurfaceEvent {
    pub fn kind(&self) -> SurfaceEventKind {
        match self {
            Self::Draw => SurfaceEventKind::Draw,
            Self::Resize { .. } => SurfaceEventKind::Resize,
            Self::Close => SurfaceEventKind::Close,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

type Handler = Rc<dyn Fn(&SurfaceEvent) -> CadenzaResult<()>>;

#[derive(Default)]
struct SignalsInner {
    next_id: u64,
    handlers: Vec<(ConnectionId, SurfaceEventKind, Handler)>,
}

/// Subscription hub for surface lifecycle notifications.
///
/// Handlers may connect and disconnect (themselves included) while an event is being
/// delivered: delivery walks a snapshot and skips handlers disconnected meanwhile.
#[derive(Default)]
pub struct Signals {
    inner: RefCell<SignalsInner>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(
        &self,
        kind: SurfaceEventKind,
        handler: impl Fn(&SurfaceEvent) -> CadenzaResult<()> + 'static,
    ) -> ConnectionId {
        let mut inner = self.inner.borrow_mut();
        let id = ConnectionId(inner.next_id);
        inner.next_id += 1;
        inner.handlers.push((id, kind, Rc::new(handler)));
        id
    }

    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.handlers.len();
        inner.handlers.retain(|(cid, _, _)| *cid != id);
        inner.handlers.len() != before
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.inner
            .borrow()
            .handlers
            .iter()
            .any(|(cid, _, _)| *cid == id)
    }

    pub fn handler_count(&self, kind: SurfaceEventKind) -> usize {
        self.inner
            .borrow()
            .handlers
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }

    /// Deliver `event` to its subscribers in connection order. Returns how many ran.
    pub fn emit(&self, event: SurfaceEvent) -> CadenzaResult<usize> {
        let kind = event.kind();
        let targets: Vec<(ConnectionId, Handler)> = self
            .inner
            .borrow()
            .handlers
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(id, _, h)| (*id, h.clone()))
            .collect();

        let mut delivered = 0;
        for (id, handler) in targets {
            if !self.is_connected(id) {
                continue;
            }
            handler(&event)?;
            delivered += 1;
        }
        Ok(delivered)
    }
}
