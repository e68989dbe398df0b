//! Actions and the envelopes that carry them through the pipeline
//!
//! A plain [`Action`] is the only thing reducers ever see: a `type`
//! discriminant plus an open set of payload fields. Everything else that can
//! be handed to `dispatch` is wrapped in an [`Envelope`], and each middleware
//! stage matches on the variant it owns and forwards the rest.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DispatchError;
use crate::promise::{PendingAction, PromiseAction};
use crate::thunk::Thunk;

/// Prefix shared by all action types the store reserves for itself
pub const RESERVED_PREFIX: &str = "@@state-dispatch/";

/// Type of the action dispatched once when a store is created
pub const INIT_ACTION: &str = "@@state-dispatch/INIT";

const PROBE_ACTION_PREFIX: &str = "@@state-dispatch/PROBE_UNKNOWN_ACTION.";

/// A plain tagged action: `{ "type": ..., ...payload }`
///
/// # Example
/// ```
/// use state_dispatch_core::Action;
/// use serde_json::json;
///
/// let action = Action::new("ADD_ITEM").with("item", json!({ "id": 1234 }));
/// assert_eq!(action.kind(), "ADD_ITEM");
/// assert_eq!(action.get("item"), Some(&json!({ "id": 1234 })));
/// assert_eq!(
///     action.to_value(),
///     json!({ "type": "ADD_ITEM", "item": { "id": 1234 } })
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl Action {
    /// Create an action with no payload
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Map::new(),
        }
    }

    /// Create an action from a type and a payload map
    ///
    /// A `type` entry in the payload is dropped; `kind` always wins.
    pub fn from_parts(kind: impl Into<String>, mut payload: Map<String, Value>) -> Self {
        payload.remove("type");
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// The init action dispatched when a store is created
    pub fn init() -> Self {
        Self::new(INIT_ACTION)
    }

    /// A fresh action whose type no reducer can know about
    pub fn probe() -> Self {
        Self::new(format!("{PROBE_ACTION_PREFIX}{}", uuid::Uuid::new_v4().simple()))
    }

    /// Builder-style payload insertion
    ///
    /// Follows [`insert`](Self::insert): `.with("type", "B")` renames the
    /// action, and a `type` that is not a string panics in debug builds.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a payload field
    ///
    /// Inserting `type` with a string value replaces the discriminant.
    ///
    /// # Panics
    ///
    /// In debug builds, if `type` is given a value that is not a string.
    /// Release builds ignore such a value and keep the current type.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if key == "type" {
            debug_assert!(
                value.is_string(),
                "action \"type\" must be a string, got {value}"
            );
            if let Value::String(kind) = value {
                self.kind = kind;
            }
            return;
        }
        self.payload.insert(key, value);
    }

    /// The action's `type`
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Whether the type belongs to the store's reserved namespace
    pub fn is_reserved(&self) -> bool {
        self.kind.starts_with(RESERVED_PREFIX)
    }

    /// Get a payload field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Get a string payload field
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// All payload fields (without `type`)
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Split into type and payload
    pub fn into_parts(self) -> (String, Map<String, Value>) {
        (self.kind, self.payload)
    }

    /// Render as a JSON object with `type` inline
    pub fn to_value(&self) -> Value {
        let mut object = self.payload.clone();
        object.insert("type".to_string(), Value::String(self.kind.clone()));
        Value::Object(object)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.payload.is_empty() {
            f.write_str(&self.kind)
        } else {
            write!(f, "{} {}", self.kind, Value::Object(self.payload.clone()))
        }
    }
}

impl TryFrom<Value> for Action {
    type Error = DispatchError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let mut object = match value {
            Value::Object(object) => object,
            other => {
                return Err(DispatchError::InvalidAction(format!(
                    "expected an object with a \"type\" field, got {}",
                    json_kind(&other)
                )))
            }
        };
        match object.remove("type") {
            Some(Value::String(kind)) => Ok(Self {
                kind,
                payload: object,
            }),
            Some(other) => Err(DispatchError::InvalidAction(format!(
                "\"type\" must be a string, got {}",
                json_kind(&other)
            ))),
            None => Err(DispatchError::InvalidAction(
                "actions may not have an undefined \"type\" field".to_string(),
            )),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Anything that can be handed to `dispatch`
///
/// Only [`Envelope::Plain`] and well-formed [`Envelope::Object`] values are
/// understood by the store itself; thunks and promise actions must be
/// consumed by the matching middleware before they reach the reducer.
pub enum Envelope<S> {
    /// A typed plain action
    Plain(Action),
    /// An untyped JSON value, validated by the raw dispatch
    Object(Value),
    /// A function of the store, run by the thunk stage
    Thunk(Thunk<S>),
    /// A REQUEST/SUCCESS/FAILURE descriptor, expanded by the promise stage
    Promise(PromiseAction),
}

impl<S> Envelope<S> {
    /// Short label for logging: the action type, or the envelope kind
    pub fn label(&self) -> String {
        match self {
            Envelope::Plain(action) => action.kind().to_string(),
            Envelope::Object(value) => value
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| "<untyped>".to_string()),
            Envelope::Thunk(_) => "<thunk>".to_string(),
            Envelope::Promise(promise) => match promise.types().first() {
                Some(request) => format!("<promise {request}>"),
                None => "<promise>".to_string(),
            },
        }
    }
}

impl<S> fmt::Debug for Envelope<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Plain(action) => f.debug_tuple("Plain").field(action).finish(),
            Envelope::Object(value) => f.debug_tuple("Object").field(value).finish(),
            Envelope::Thunk(thunk) => f.debug_tuple("Thunk").field(thunk).finish(),
            Envelope::Promise(promise) => f.debug_tuple("Promise").field(promise).finish(),
        }
    }
}

impl<S> From<Action> for Envelope<S> {
    fn from(action: Action) -> Self {
        Envelope::Plain(action)
    }
}

impl<S> From<Value> for Envelope<S> {
    fn from(value: Value) -> Self {
        Envelope::Object(value)
    }
}

impl<S> From<Thunk<S>> for Envelope<S> {
    fn from(thunk: Thunk<S>) -> Self {
        Envelope::Thunk(thunk)
    }
}

impl<S> From<PromiseAction> for Envelope<S> {
    fn from(promise: PromiseAction) -> Self {
        Envelope::Promise(promise)
    }
}

/// What a call to `dispatch` produced
#[derive(Debug)]
pub enum Dispatched {
    /// The plain action that was reduced
    Action(Action),
    /// A value returned by a thunk
    Value(Value),
    /// Handle to a promise action still in flight
    Pending(PendingAction),
    /// A middleware stage swallowed the input
    Discarded,
}

impl Dispatched {
    /// The reduced action, if this dispatch reached the reducer
    pub fn action(&self) -> Option<&Action> {
        match self {
            Dispatched::Action(action) => Some(action),
            _ => None,
        }
    }

    /// Take the pending handle of a promise action
    pub fn into_pending(self) -> Option<PendingAction> {
        match self {
            Dispatched::Pending(pending) => Some(pending),
            _ => None,
        }
    }

    /// Whether a stage swallowed the input
    pub fn is_discarded(&self) -> bool {
        matches!(self, Dispatched::Discarded)
    }
}
