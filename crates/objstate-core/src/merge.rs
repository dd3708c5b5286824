//! Deep, copy-on-write merge.
//!
//! # Algorithm
//!
//! `merge(target, modifier)` starts from a deep copy of `target` and walks
//! the modifier's keys:
//!
//! | Modifier value | Target value | Result                          |
//! |----------------|--------------|---------------------------------|
//! | absent         | anything     | target value kept (no deletion) |
//! | mapping        | mapping      | recursive merge                 |
//! | mapping        | other / none | deep copy of modifier mapping   |
//! | anything else  | anything     | deep copy of modifier value     |
//!
//! Arrays are never merged element-wise; they always replace the target
//! whole. Keys only in the target are preserved; keys only in the modifier
//! are added.
//!
//! # Invariants
//!
//! 1. Neither argument is mutated (both are taken by shared reference).
//! 2. Every non-mapping leaf of the modifier is present, at the same path, in
//!    the result.
//! 3. Recursion only descends into strictly smaller substructures of the
//!    modifier, so it terminates.

use serde_json::Value;

use crate::patch::{Patch, PatchValue, State};

/// Structurally independent deep copy of a value.
#[must_use]
pub fn clone(value: &Value) -> Value {
    value.clone()
}

/// Structurally independent deep copy of a state.
#[must_use]
pub fn clone_state(state: &State) -> State {
    state.clone()
}

/// Merge `modifier` into a copy of `target`.
///
/// See the [module docs](self) for the per-key rules.
#[must_use]
pub fn merge(target: &State, modifier: &Patch) -> State {
    let mut result = clone_state(target);
    apply_patch(&mut result, modifier);
    result
}

/// Merge a plain state into a copy of `target`.
///
/// Equivalent to `merge(target, &Patch::from(modifier.clone()))` without the
/// intermediate patch.
#[must_use]
pub fn merge_state(target: &State, modifier: &State) -> State {
    let mut result = clone_state(target);
    apply_state(&mut result, modifier);
    result
}

fn apply_patch(result: &mut State, modifier: &Patch) {
    for (key, change) in modifier.iter() {
        match change {
            PatchValue::Absent => {}
            PatchValue::Nested(patch) => match result.get_mut(key) {
                Some(Value::Object(existing)) => apply_patch(existing, patch),
                _ => {
                    result.insert(key.to_owned(), Value::Object(patch.to_state()));
                }
            },
            PatchValue::Set(Value::Object(changes)) => match result.get_mut(key) {
                Some(Value::Object(existing)) => apply_state(existing, changes),
                _ => {
                    result.insert(key.to_owned(), Value::Object(clone_state(changes)));
                }
            },
            PatchValue::Set(value) => {
                result.insert(key.to_owned(), clone(value));
            }
        }
    }
}

fn apply_state(result: &mut State, modifier: &State) {
    for (key, change) in modifier {
        match (result.get_mut(key), change) {
            (Some(Value::Object(existing)), Value::Object(changes)) => {
                apply_state(existing, changes);
            }
            _ => {
                result.insert(key.clone(), clone(change));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
