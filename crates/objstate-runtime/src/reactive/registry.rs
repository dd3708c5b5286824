#![forbid(unsafe_code)]

//! Listener registry with commit-on-next-mutation semantics.
//!
//! # Design
//!
//! The registry keeps two views of the listener list:
//!
//! - **pending**: edited in place by subscribe/unsubscribe;
//! - **committed**: the list handed to the most recent notification.
//!
//! Both are `Rc<Vec<Entry>>`. [`commit`](ListenerRegistry::commit) makes
//! them share one allocation; the next edit goes through `Rc::make_mut`, which
//! copies the pending list first because the notifier (and `committed`) still
//! hold the old one. A notification therefore iterates a list no edit can
//! reach, and edits made during it surface at the next commit.
//!
//! ```text
//! commit()          pending ──┐
//!                              ├──► [A, B, C]   ◄── notifier iterates this
//!                  committed ─┘
//!
//! unsubscribe(B)    pending ──────► [A, C]      (copied by make_mut)
//!                  committed ─────► [A, B, C]   ◄── still iterated
//! ```
//!
//! # Invariants
//!
//! 1. Entry ids are unique for the registry's lifetime and never reused.
//! 2. A snapshot returned by `commit` is never modified afterwards.
//! 3. Removal is by id, so two entries wrapping the same callback are
//!    independent.

use std::fmt;
use std::rc::Rc;

use objstate_core::State;

use crate::error::ListenerError;

/// Stored form of every listener, fallible or not.
pub(crate) type ListenerFn = Rc<dyn Fn(&State, &State, Option<&str>) -> Result<(), ListenerError>>;

/// Identifier of one registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Raw numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

#[derive(Clone)]
pub(crate) struct Entry {
    pub(crate) id: ListenerId,
    pub(crate) callback: ListenerFn,
}

/// A frozen listener list, as handed to one notification.
pub(crate) type Snapshot = Rc<Vec<Entry>>;

pub(crate) struct ListenerRegistry {
    committed: Snapshot,
    pending: Snapshot,
    next_id: u64,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("committed", &self.committed.len())
            .field("pending", &self.pending.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        let empty = Rc::new(Vec::new());
        Self {
            committed: Rc::clone(&empty),
            pending: empty,
            next_id: 0,
        }
    }

    /// Append a listener to the pending list.
    pub(crate) fn insert(&mut self, callback: ListenerFn) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        Rc::make_mut(&mut self.pending).push(Entry { id, callback });
        id
    }

    /// Remove the entry with `id` from the pending list.
    ///
    /// The removed entry is handed back so the caller can drop it after
    /// releasing any borrow of the registry: its callback may own a guard
    /// that unsubscribes on drop.
    pub(crate) fn remove(&mut self, id: ListenerId) -> Option<Entry> {
        let index = self.pending.iter().position(|entry| entry.id == id)?;
        Some(Rc::make_mut(&mut self.pending).remove(index))
    }

    /// Promote pending to committed and return the snapshot to notify.
    ///
    /// The second element is the previously committed list; drop it outside
    /// any registry borrow for the same reason as [`remove`](Self::remove).
    pub(crate) fn commit(&mut self) -> (Snapshot, Snapshot) {
        let previous = std::mem::replace(&mut self.committed, Rc::clone(&self.pending));
        (Rc::clone(&self.committed), previous)
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn committed_len(&self) -> usize {
        self.committed.len()
    }

    #[cfg(test)]
    fn pending_ids(&self) -> Vec<ListenerId> {
        self.pending.iter().map(|entry| entry.id).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
