#![forbid(unsafe_code)]

//! Observable state container.
//!
//! - [`Store`]: shared key-value state with merge/replace mutations and
//!   snapshot-consistent listener notification.
//! - [`Unsubscribe`]: one-shot handle removing exactly one registration.
//! - [`SubscriptionGuard`]: RAII guard that unsubscribes on drop.
//!
//! # Architecture
//!
//! `Store` uses `Rc<..>` with `RefCell`/`Cell` interior for single-threaded
//! shared ownership. Listener lists are copy-on-write `Rc<Vec<..>>`: each
//! mutation notifies a frozen snapshot while subscribe/unsubscribe edit a
//! separate pending list.
//!
//! # Invariants
//!
//! 1. Subscribe/unsubscribe during a notification take effect at the next
//!    mutation, never the current one.
//! 2. Listeners are notified in subscription order.
//! 3. A mutation triggered from a listener completes (including its own
//!    notifications) before the outer notification continues.
//! 4. Unsubscribing is idempotent and removes only its own registration.

mod registry;
pub mod store;
pub mod subscription;

pub use registry::ListenerId;
pub use store::{Store, Update, WeakStore};
pub use subscription::{SubscriptionGuard, Unsubscribe};
