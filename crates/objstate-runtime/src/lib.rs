#![forbid(unsafe_code)]

//! Runtime: the observable state container.
//!
//! # Role in objstate
//! `objstate-runtime` owns mutable state. Its [`Store`] holds a
//! [`State`] snapshot, applies partial updates through the merge engine in
//! `objstate-core`, and notifies listeners with snapshot isolation: the set
//! of listeners a mutation notifies is fixed when that mutation commits.
//!
//! # Primary responsibilities
//! - **Store**: `state`, `set_state`, `reset_state`, `subscribe`.
//! - **Listener registry**: commit-on-next-mutation subscribe/unsubscribe.
//! - **Configuration**: [`StoreConfig`] (log name, nesting limit).
//! - **Errors**: [`StoreError`] for listener failures, runaway re-entry and
//!   bad untyped input.
//!
//! # Logging
//! Mutations emit `tracing` events (`debug` per commit, `trace` per
//! notification and (un)subscribe, `warn` on failures). Install any
//! `tracing` subscriber to see them.

pub mod config;
pub mod error;
pub mod reactive;

pub use config::StoreConfig;
pub use error::{ListenerError, Result, StoreError};
pub use objstate_core::{Patch, PatchValue, State, clone, clone_state, merge, merge_state, state_from_value};
pub use reactive::{ListenerId, Store, SubscriptionGuard, Unsubscribe, Update, WeakStore};
