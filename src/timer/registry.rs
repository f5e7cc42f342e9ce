use crate::foundation::error::{CadenzaError, CadenzaResult};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// What a timer callback wants to happen to its own registration after it ran.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Keep the registration; call again on the next tick.
    Continue,
    /// Deregister immediately, within the current tick.
    Stop,
}

/// Bound arguments of one registration.
///
/// Two registrations of the same function are told apart by these values, so they must be
/// comparable; JSON values give positional and keyword arguments that are.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl CallArgs {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn positional(args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            args: args.into_iter().collect(),
            kwargs: Map::new(),
        }
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

type CallbackFn = dyn FnMut(&CallArgs) -> CadenzaResult<Flow>;

/// A shared, identity-comparable timer callback.
///
/// Clones share identity: a clone can be used to remove the registration made with the
/// original.
#[derive(Clone)]
pub struct Callback {
    name: Rc<str>,
    func: Rc<RefCell<CallbackFn>>,
}

impl Callback {
    pub fn new(
        name: impl Into<Rc<str>>,
        f: impl FnMut(&CallArgs) -> CadenzaResult<Flow> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(RefCell::new(f)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Function identity, ignoring the display name.
    pub fn same_fn(&self, other: &Callback) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }

    pub(crate) fn invoke(&self, args: &CallArgs) -> CadenzaResult<Flow> {
        let mut f = self.func.try_borrow_mut().map_err(|_| {
            CadenzaError::config(format!(
                "timer callback `{}` re-entered while already running",
                self.name
            ))
        })?;
        f(args)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").field("name", &self.name).finish()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Entry {
    pub(crate) serial: u64,
    pub(crate) func: Callback,
    pub(crate) args: CallArgs,
}

/// Ordered set of `(callback, args)` registrations.
///
/// Every registration carries a serial number so a tick can iterate a snapshot while
/// callbacks add, remove or swap registrations underneath it.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    entries: Vec<Entry>,
    next_serial: u64,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add(&mut self, func: Callback, args: CallArgs) -> u64 {
        let serial = self.bump();
        self.entries.push(Entry { serial, func, args });
        serial
    }

    /// Remove a registration.
    ///
    /// With `args`, the `(func, args)` pair must match exactly. Without, the first
    /// registration of `func` is removed whatever its arguments.
    pub fn remove(&mut self, func: &Callback, args: Option<&CallArgs>) -> CadenzaResult<()> {
        let pos = self.position(func, args).ok_or_else(|| {
            CadenzaError::callback_not_found(match args {
                Some(a) => format!("`{}` with args {:?}", func.name(), a),
                None => format!("`{}`", func.name()),
            })
        })?;
        self.entries.remove(pos);
        Ok(())
    }

    pub fn contains(&self, func: &Callback, args: Option<&CallArgs>) -> bool {
        self.position(func, args).is_some()
    }

    /// Swap the first registration of `old` for `new` in place, keeping its position.
    ///
    /// The swapped-in entry gets a fresh serial, so the current tick never invokes it and a
    /// `Flow::Stop` from the outgoing callback cannot remove it.
    pub fn replace(&mut self, old: &Callback, new: Callback, args: CallArgs) -> CadenzaResult<()> {
        let pos = self
            .position(old, None)
            .ok_or_else(|| CadenzaError::callback_not_found(format!("`{}`", old.name())))?;
        let serial = self.bump();
        self.entries[pos] = Entry {
            serial,
            func: new,
            args,
        };
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn snapshot(&self) -> Vec<Entry> {
        self.entries.clone()
    }

    pub(crate) fn contains_serial(&self, serial: u64) -> bool {
        self.entries.iter().any(|e| e.serial == serial)
    }

    pub(crate) fn remove_serial(&mut self, serial: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.serial != serial);
        self.entries.len() != before
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.func.name().to_owned())
            .collect()
    }

    fn position(&self, func: &Callback, args: Option<&CallArgs>) -> Option<usize> {
        self.entries.iter().position(|e| {
            e.func.same_fn(func) && args.is_none_or(|a| &e.args == a)
        })
    }

    fn bump(&mut self) -> u64 {
        let s = self.next_serial;
        self.next_serial += 1;
        s
    }
}
