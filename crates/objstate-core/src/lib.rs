#![forbid(unsafe_code)]

//! Core: state model and deep-merge engine.
//!
//! # Role in objstate
//! `objstate-core` is the pure layer. It owns the [`State`] type, the
//! [`Patch`] modifier that can mark keys as absent, and the copy-on-write
//! [`merge`] used to apply partial updates. Nothing here has side effects or
//! shared ownership.
//!
//! # How it fits in the system
//! The runtime (`objstate-runtime`) owns a `State` inside a `Store` and
//! computes every new state through [`merge`] (for `set_state`) or
//! [`Patch::into_state`] (for `reset_state`).
//!
//! # Example
//!
//! ```
//! use objstate_core::{Patch, merge, state_from_value};
//! use serde_json::json;
//!
//! let target = state_from_value(json!({ "a": { "b": "c" }, "list": [1, 2] })).unwrap();
//! let patch = Patch::new()
//!     .set("list", json!([3]))
//!     .nested("a", Patch::new().set("d", "e"));
//!
//! let merged = merge(&target, &patch);
//! assert_eq!(merged["a"], json!({ "b": "c", "d": "e" }));
//! assert_eq!(merged["list"], json!([3]));
//! ```

pub mod error;
pub mod merge;
pub mod patch;

pub use error::{Error, Result};
pub use merge::{clone, clone_state, merge, merge_state};
pub use patch::{Patch, PatchValue, State, state_from_value};
