//! State and patch types.
//!
//! # Design
//!
//! [`State`] is a plain `serde_json` mapping, so every value a store holds is
//! JSON data: no cycles, no functions, nothing that cannot be deep-copied.
//!
//! JSON has no "undefined", but partial updates need one: a key that is
//! explicitly present in a modifier yet carries no value must leave the
//! target untouched. [`PatchValue::Absent`] is that marker. A [`Patch`] is a
//! key-ordered mapping of `PatchValue`s and may nest, so absent markers can
//! appear at any depth.
//!
//! # Invariants
//!
//! 1. `Patch::from(state).into_state() == state` for every state.
//! 2. `into_state()` drops absent keys at every depth and never fails.
//! 3. Converting untyped JSON into a `State` or `Patch` succeeds only for
//!    JSON objects.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A key-value state snapshot.
pub type State = Map<String, Value>;

/// Human-readable JSON kind, used in error messages.
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Convert an untyped JSON value into a [`State`].
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `value` is not a JSON object.
pub fn state_from_value(value: Value) -> Result<State> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidArgument {
            expected: "object",
            found: kind_of(&other),
        }),
    }
}

/// One entry of a [`Patch`].
#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    /// Explicitly absent. Merging it leaves the target's value untouched.
    Absent,
    /// A concrete value. Mappings deep-merge into mappings; everything else
    /// (arrays included) replaces the target value whole.
    Set(Value),
    /// A nested patch, merged into the target mapping at this key.
    Nested(Patch),
}

impl PatchValue {
    /// Whether this entry is the absent marker.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Materialize this entry as a plain value. Absent yields `None`.
    #[must_use]
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Self::Absent => None,
            Self::Set(value) => Some(value.clone()),
            Self::Nested(patch) => Some(Value::Object(patch.to_state())),
        }
    }

    /// Owned form of [`to_value`](Self::to_value).
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Absent => None,
            Self::Set(value) => Some(value),
            Self::Nested(patch) => Some(Value::Object(patch.into_state())),
        }
    }
}

impl From<Value> for PatchValue {
    fn from(value: Value) -> Self {
        Self::Set(value)
    }
}

impl From<Patch> for PatchValue {
    fn from(patch: Patch) -> Self {
        Self::Nested(patch)
    }
}

/// A partial update applied with [`merge`](crate::merge()).
///
/// Built either from an existing [`State`] (every key set) or with the
/// builder methods:
///
/// ```
/// use objstate_core::Patch;
/// use serde_json::json;
///
/// let patch = Patch::new()
///     .set("theme", "dark")
///     .absent("user")
///     .nested("layout", Patch::new().set("columns", json!([1, 2])));
/// assert_eq!(patch.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: BTreeMap<String, PatchValue>,
}

impl Patch {
    /// Create an empty patch. Merging it is an identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), PatchValue::Set(value.into()));
        self
    }

    /// Mark `key` as explicitly absent.
    #[must_use]
    pub fn absent(mut self, key: impl Into<String>) -> Self {
        self.fields.insert(key.into(), PatchValue::Absent);
        self
    }

    /// Merge a nested patch into the mapping at `key`.
    #[must_use]
    pub fn nested(mut self, key: impl Into<String>, patch: Patch) -> Self {
        self.fields.insert(key.into(), PatchValue::Nested(patch));
        self
    }

    /// Insert an entry, returning the one it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PatchValue>) -> Option<PatchValue> {
        self.fields.insert(key.into(), value.into())
    }

    /// Look up the entry for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PatchValue> {
        self.fields.get(key)
    }

    /// Number of entries, absent markers included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the patch has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PatchValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Materialize as a state, dropping absent keys at every depth.
    #[must_use]
    pub fn to_state(&self) -> State {
        self.fields
            .iter()
            .filter_map(|(key, value)| value.to_value().map(|v| (key.clone(), v)))
            .collect()
    }

    /// Owned form of [`to_state`](Self::to_state).
    #[must_use]
    pub fn into_state(self) -> State {
        self.fields
            .into_iter()
            .filter_map(|(key, value)| value.into_value().map(|v| (key, v)))
            .collect()
    }
}

impl From<State> for Patch {
    fn from(state: State) -> Self {
        Self {
            fields: state
                .into_iter()
                .map(|(key, value)| (key, PatchValue::Set(value)))
                .collect(),
        }
    }
}

impl TryFrom<Value> for Patch {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        state_from_value(value).map(Self::from)
    }
}

impl<K: Into<String>> FromIterator<(K, PatchValue)> for Patch {
    fn from_iter<I: IntoIterator<Item = (K, PatchValue)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        }
    }
}
