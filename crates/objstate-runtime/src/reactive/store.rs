#![forbid(unsafe_code)]

//! Observable key-value store with snapshot-consistent notification.
//!
//! # Design
//!
//! [`Store`] owns a [`State`] and a listener registry in shared,
//! reference-counted storage (`Rc`). Cloning a `Store` yields another handle
//! to the same store, so listeners can capture a handle and call back in.
//!
//! Every mutation runs the same cycle:
//!
//! 1. compute the next state (merge for `set_state`, replace for
//!    `reset_state`);
//! 2. swap it in, keeping the previous state, and bump the version;
//! 3. commit the pending listener list as this mutation's snapshot;
//! 4. call each snapshot entry in subscription order with
//!    `(next, previous, label)`.
//!
//! No `RefCell` borrow is held while user code (a listener or an updater)
//! runs, so listeners may read, mutate, subscribe and unsubscribe freely. A
//! nested mutation runs its whole cycle before the outer notification
//! resumes.
//!
//! # Invariants
//!
//! 1. The listeners called for mutation N are exactly the pending list at the
//!    moment mutation N committed, regardless of subscribe/unsubscribe calls
//!    made while N notifies.
//! 2. Listeners are called in subscription order.
//! 3. The version increments by exactly 1 per committed mutation.
//! 4. State handed out (`state()`, listener arguments) never aliases the
//!    store's own storage.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Listener returns `Err` | fallible listener | Iteration stops; state stays committed; `StoreError::Listener` |
//! | Listener panics | any listener | Panic unwinds to the caller; state stays committed; store stays usable |
//! | Runaway re-entry | listener mutates on every notification | Unbounded by default; with `StoreConfig::with_max_nesting_depth`, `StoreError::NestingTooDeep` once that depth is reached |
//! | Mutation inside `with` | closure calls a mutating method | Panics (`RefCell` borrow rules) |
//!
//! Listeners that capture a strong `Store` handle form an `Rc` cycle with the
//! store; capture [`Store::downgrade`] instead when the store must be freed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use objstate_core::{Patch, State, clone_state, merge, state_from_value};
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::registry::{ListenerFn, ListenerId, ListenerRegistry};
use super::subscription::Unsubscribe;
use crate::config::StoreConfig;
use crate::error::{ListenerError, Result, StoreError};

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Argument of [`Store::set_state`] and [`Store::reset_state`]: either a
/// ready patch or a function of the current state.
pub enum Update<'a> {
    /// A ready patch.
    Value(Patch),
    /// Computes the patch from a copy of the current state.
    Updater(Box<dyn FnOnce(&State) -> Patch + 'a>),
}

impl<'a> Update<'a> {
    /// Build an updater from a closure returning anything patch-like
    /// (`Patch` or `State`).
    pub fn with<F, P>(f: F) -> Self
    where
        F: FnOnce(&State) -> P + 'a,
        P: Into<Patch>,
    {
        Self::Updater(Box::new(move |state: &State| -> Patch { f(state).into() }))
    }

    fn resolve(self, current: impl FnOnce() -> State) -> Patch {
        match self {
            Self::Value(patch) => patch,
            Self::Updater(f) => f(&current()),
        }
    }
}

impl From<Patch> for Update<'_> {
    fn from(patch: Patch) -> Self {
        Self::Value(patch)
    }
}

impl From<State> for Update<'_> {
    fn from(state: State) -> Self {
        Self::Value(Patch::from(state))
    }
}

impl fmt::Debug for Update<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(patch) => f.debug_tuple("Value").field(patch).finish(),
            Self::Updater(_) => f.debug_tuple("Updater").finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MutationKind {
    Set,
    Reset,
}

impl MutationKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Reset => "reset",
        }
    }
}

// ---------------------------------------------------------------------------
// Shared interior
// ---------------------------------------------------------------------------

pub(crate) struct Shared {
    state: RefCell<State>,
    registry: RefCell<ListenerRegistry>,
    version: Cell<u64>,
    /// Mutations currently active (outermost plus nested).
    depth: Cell<usize>,
    /// Listener loops currently running.
    notifying: Cell<usize>,
    config: StoreConfig,
}

impl Shared {
    fn name(&self) -> &str {
        self.config.name.as_deref().unwrap_or("store")
    }

    pub(crate) fn remove_listener(&self, id: ListenerId) -> bool {
        let (removed, pending) = {
            let mut registry = self.registry.borrow_mut();
            let removed = registry.remove(id);
            (removed, registry.pending_len())
        };
        trace!(
            store = self.name(),
            listener = id.get(),
            removed = removed.is_some(),
            pending,
            "unsubscribe"
        );
        // `removed` drops here, outside the registry borrow.
        removed.is_some()
    }
}

/// Holds one count on a nesting counter; releases it even if a listener
/// panics.
struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// An observable key-value state container.
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use objstate_runtime::{Patch, Store};
/// use serde_json::json;
///
/// let store = Store::from_value(json!({ "count": 1, "tags": ["a"] })).unwrap();
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let log = Rc::clone(&seen);
/// let handle = store.subscribe(move |next, previous, label| {
///     log.borrow_mut().push((previous["count"].clone(), next["count"].clone(), label.map(str::to_owned)));
/// });
///
/// store.set_state_labeled(Patch::new().set("count", 2), "increment").unwrap();
/// assert_eq!(store.state()["tags"], json!(["a"]));
/// assert_eq!(seen.borrow()[0], (json!(1), json!(2), Some("increment".to_owned())));
///
/// handle.unsubscribe();
/// store.reset_state(Patch::new().set("count", 0)).unwrap();
/// assert_eq!(seen.borrow().len(), 1);
/// assert!(store.state().get("tags").is_none());
/// ```
#[derive(Clone)]
pub struct Store {
    shared: Rc<Shared>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(State::new())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.shared.registry.borrow();
        f.debug_struct("Store")
            .field("name", &self.shared.config.name)
            .field("state", &*self.shared.state.borrow())
            .field("version", &self.shared.version.get())
            .field("subscriber_count", &registry.pending_len())
            .field("committed_count", &registry.committed_len())
            .finish()
    }
}

impl Store {
    /// Create a store holding `initial`, with default configuration.
    ///
    /// The version starts at 0 and no listeners are registered.
    #[must_use]
    pub fn new(initial: State) -> Self {
        Self::with_config(initial, StoreConfig::default())
    }

    /// Create a store with an explicit configuration.
    #[must_use]
    pub fn with_config(initial: State, config: StoreConfig) -> Self {
        Self {
            shared: Rc::new(Shared {
                state: RefCell::new(initial),
                registry: RefCell::new(ListenerRegistry::new()),
                version: Cell::new(0),
                depth: Cell::new(0),
                notifying: Cell::new(0),
                config,
            }),
        }
    }

    /// Create a store from untyped JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if `value` is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        Self::from_value_with_config(value, StoreConfig::default())
    }

    /// [`from_value`](Self::from_value) with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if `value` is not an object.
    pub fn from_value_with_config(value: Value, config: StoreConfig) -> Result<Self> {
        Ok(Self::with_config(state_from_value(value)?, config))
    }

    /// Deep copy of the current state.
    #[must_use]
    pub fn state(&self) -> State {
        clone_state(&self.shared.state.borrow())
    }

    /// Access the current state by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if `f` mutates this store.
    pub fn with<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        f(&self.shared.state.borrow())
    }

    /// Number of committed mutations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.shared.version.get()
    }

    /// Number of registrations that the next mutation will notify.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.registry.borrow().pending_len()
    }

    /// Whether a mutation is currently notifying listeners. Updater
    /// closures run before notification and observe `false` unless an outer
    /// mutation is notifying.
    #[must_use]
    pub fn is_notifying(&self) -> bool {
        self.shared.notifying.get() > 0
    }

    /// The store's configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// Non-owning handle, for listeners that call back into the store.
    #[must_use]
    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            shared: Rc::downgrade(&self.shared),
        }
    }

    /// Deep-merge `update` into the state and notify listeners.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Listener`] if a fallible listener fails (the new state
    ///   stays committed).
    /// - [`StoreError::NestingTooDeep`] if the nesting limit is reached
    ///   (nothing changes).
    pub fn set_state<'a>(&self, update: impl Into<Update<'a>>) -> Result<()> {
        self.mutate(MutationKind::Set, update.into(), None)
    }

    /// [`set_state`](Self::set_state) with a label passed through to
    /// listeners.
    ///
    /// # Errors
    ///
    /// Same as [`set_state`](Self::set_state).
    pub fn set_state_labeled<'a>(&self, update: impl Into<Update<'a>>, label: &str) -> Result<()> {
        self.mutate(MutationKind::Set, update.into(), Some(label))
    }

    /// Replace the state with `update` (absent keys dropped) and notify
    /// listeners. Nothing from the previous state survives unless the
    /// replacement contains it.
    ///
    /// # Errors
    ///
    /// Same as [`set_state`](Self::set_state).
    pub fn reset_state<'a>(&self, update: impl Into<Update<'a>>) -> Result<()> {
        self.mutate(MutationKind::Reset, update.into(), None)
    }

    /// [`reset_state`](Self::reset_state) with a label passed through to
    /// listeners.
    ///
    /// # Errors
    ///
    /// Same as [`set_state`](Self::set_state).
    pub fn reset_state_labeled<'a>(&self, update: impl Into<Update<'a>>, label: &str) -> Result<()> {
        self.mutate(MutationKind::Reset, update.into(), Some(label))
    }

    /// Register a listener, called as `(next, previous, label)` on every
    /// mutation starting with the next one to commit.
    ///
    /// Subscribing the same callback twice creates two independent
    /// registrations.
    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&State, &State, Option<&str>) + 'static,
    {
        self.insert_listener(Rc::new(
            move |next: &State, previous: &State, label: Option<&str>| -> std::result::Result<(), ListenerError> {
                listener(next, previous, label);
                Ok(())
            },
        ))
    }

    /// Register a fallible listener. An `Err` stops the notification and is
    /// returned from the mutation as [`StoreError::Listener`].
    pub fn try_subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&State, &State, Option<&str>) -> std::result::Result<(), ListenerError> + 'static,
    {
        self.insert_listener(Rc::new(listener))
    }

    fn insert_listener(&self, callback: ListenerFn) -> Unsubscribe {
        let (id, pending) = {
            let mut registry = self.shared.registry.borrow_mut();
            let id = registry.insert(callback);
            (id, registry.pending_len())
        };
        trace!(store = self.shared.name(), listener = id.get(), pending, "subscribe");
        Unsubscribe::new(Rc::downgrade(&self.shared), id)
    }

    fn mutate(&self, kind: MutationKind, update: Update<'_>, label: Option<&str>) -> Result<()> {
        let shared = &*self.shared;
        let limit = shared.config.nesting_limit();
        if shared.depth.get() >= limit {
            let depth = shared.depth.get().saturating_add(1);
            warn!(
                store = shared.name(),
                kind = kind.as_str(),
                depth,
                limit,
                "mutation rejected: nesting limit reached"
            );
            return Err(StoreError::NestingTooDeep { depth, limit });
        }
        let _active = DepthGuard::enter(&shared.depth);

        // The updater sees a copy, so it may call back into the store.
        let patch = update.resolve(|| self.state());
        let next = match kind {
            MutationKind::Set => merge(&shared.state.borrow(), &patch),
            MutationKind::Reset => patch.into_state(),
        };
        let previous = shared.state.replace(clone_state(&next));
        let version = shared.version.get() + 1;
        shared.version.set(version);

        let (listeners, released) = shared.registry.borrow_mut().commit();
        drop(released);

        debug!(
            store = shared.name(),
            kind = kind.as_str(),
            version,
            listeners = listeners.len(),
            label = ?label,
            depth = shared.depth.get(),
            "state committed"
        );

        let _notifying = DepthGuard::enter(&shared.notifying);
        for (index, entry) in listeners.iter().enumerate() {
            trace!(store = shared.name(), version, index, listener = entry.id.get(), "notify");
            if let Err(source) = (entry.callback)(&next, &previous, label) {
                warn!(
                    store = shared.name(),
                    version,
                    index,
                    listener = entry.id.get(),
                    skipped = listeners.len() - index - 1,
                    error = %source,
                    "listener failed; remaining listeners skipped"
                );
                return Err(StoreError::Listener {
                    index,
                    version,
                    label: label.map(str::to_owned),
                    source,
                });
            }
        }
        Ok(())
    }
}

/// Non-owning handle to a [`Store`].
#[derive(Clone)]
pub struct WeakStore {
    shared: Weak<Shared>,
}

impl WeakStore {
    /// Upgrade to a full handle if the store is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Store> {
        self.shared.upgrade().map(|shared| Store { shared })
    }
}

impl fmt::Debug for WeakStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStore")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
