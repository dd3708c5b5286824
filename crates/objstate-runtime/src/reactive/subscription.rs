#![forbid(unsafe_code)]

//! Unsubscribe handles and RAII subscription guards.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::registry::ListenerId;
use super::store::Shared;

/// One-shot capability that removes exactly one listener registration.
///
/// Cloning shares the one-shot flag: after any clone has unsubscribed, every
/// clone reports `is_subscribed() == false` and further calls are no-ops.
///
/// The handle holds the store weakly. It never keeps a store alive, and
/// unsubscribing after the store has been dropped does nothing.
///
/// Dropping the handle does **not** unsubscribe; use
/// [`into_guard`](Self::into_guard) for that.
#[derive(Clone)]
pub struct Unsubscribe {
    shared: Weak<Shared>,
    id: ListenerId,
    subscribed: Rc<Cell<bool>>,
}

impl Unsubscribe {
    pub(crate) fn new(shared: Weak<Shared>, id: ListenerId) -> Self {
        Self {
            shared,
            id,
            subscribed: Rc::new(Cell::new(true)),
        }
    }

    /// Remove this handle's registration from the pending listener list.
    ///
    /// Takes effect at the next mutation; a notification already in progress
    /// still calls the listener if it is due. Returns `true` only for the call
    /// that actually removed the entry.
    pub fn unsubscribe(&self) -> bool {
        if !self.subscribed.replace(false) {
            return false;
        }
        match self.shared.upgrade() {
            Some(shared) => shared.remove_listener(self.id),
            None => false,
        }
    }

    /// Whether this registration is still active.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.get() && self.shared.strong_count() > 0
    }

    /// Id of the registration this handle controls.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Convert into a guard that unsubscribes when dropped.
    #[must_use]
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard { handle: Some(self) }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("id", &self.id)
            .field("subscribed", &self.subscribed.get())
            .finish()
    }
}

/// RAII guard for a listener registration.
///
/// Dropping the guard unsubscribes, with the same deferred semantics as
/// [`Unsubscribe::unsubscribe`].
#[must_use = "dropping the guard unsubscribes immediately"]
pub struct SubscriptionGuard {
    handle: Option<Unsubscribe>,
}

impl SubscriptionGuard {
    /// The underlying handle.
    pub fn handle(&self) -> Option<&Unsubscribe> {
        self.handle.as_ref()
    }

    /// Disarm the guard, returning the handle without unsubscribing.
    #[must_use]
    pub fn release(mut self) -> Option<Unsubscribe> {
        self.handle.take()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.unsubscribe();
        }
    }
}

impl fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("handle", &self.handle)
            .finish()
    }
}
