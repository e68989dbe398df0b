//! Reducers and slice composition
//!
//! A reducer is a pure function `(Option<&S>, &Action) -> Option<S>`. `None`
//! on the way in means the slice has not been initialized yet and the reducer
//! must substitute its default; `None` on the way out means "no state", which
//! the store refuses to keep.
//!
//! [`combine_reducers`] turns a map of slice reducers into one reducer over a
//! JSON object whose keys are the slice names.
//!
//! # Example
//!
//! ```
//! use state_dispatch_core::{combine_reducers, Action, ReducerMap, ReducerResult, Store};
//! use serde_json::{json, Value};
//!
//! fn items(state: Option<&Value>, action: &Action) -> ReducerResult<Value> {
//!     let mut items = state.cloned().unwrap_or_else(|| json!([]));
//!     if action.kind() == "ADD_ITEM" {
//!         if let (Some(list), Some(item)) = (items.as_array_mut(), action.get("item")) {
//!             list.push(item.clone());
//!         }
//!     }
//!     Ok(Some(items))
//! }
//!
//! let reducer = combine_reducers(ReducerMap::new().slice("items", items));
//! let store = Store::new(reducer).unwrap();
//! store.dispatch(Action::new("ADD_ITEM").with("item", 1)).unwrap();
//! assert_eq!(*store.get_state(), json!({ "items": [1] }));
//! ```

use serde_json::{Map, Value};

use crate::action::{Action, INIT_ACTION};
use crate::error::{ReducerError, StoreError};

/// What a reducer returns: the next state, or `None` for "no state"
pub type ReducerResult<S> = Result<Option<S>, ReducerError>;

/// A pure state transition
///
/// Reducers must return their input unchanged for action types they do not
/// handle, must never mutate their input, and must substitute a default when
/// given `None`.
///
/// Any `Fn(Option<&S>, &Action) -> ReducerResult<S>` is a reducer.
pub trait Reducer<S>: Send + Sync {
    /// Compute the next state
    fn reduce(&self, state: Option<&S>, action: &Action) -> ReducerResult<S>;

    /// Validate the reducer once, before the store accepts any dispatch
    fn assert_shape(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl<S, F> Reducer<S> for F
where
    F: Fn(Option<&S>, &Action) -> ReducerResult<S> + Send + Sync,
{
    fn reduce(&self, state: Option<&S>, action: &Action) -> ReducerResult<S> {
        self(state, action)
    }
}

/// Slice name to reducer, in insertion order
///
/// Keys are fixed once the map is combined; each key owns exactly one
/// slice of the composed state. Slices must not read each other.
#[derive(Default)]
pub struct ReducerMap {
    slices: Vec<(String, Box<dyn Reducer<Value>>)>,
}

impl ReducerMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slice backed by a reducer function
    pub fn slice<F>(self, key: impl Into<String>, reducer: F) -> Self
    where
        F: Fn(Option<&Value>, &Action) -> ReducerResult<Value> + Send + Sync + 'static,
    {
        self.insert(key, reducer)
    }

    /// Add a slice backed by any reducer, e.g. a nested [`CombinedReducer`]
    ///
    /// Re-using a key replaces the earlier reducer.
    pub fn insert<R>(mut self, key: impl Into<String>, reducer: R) -> Self
    where
        R: Reducer<Value> + 'static,
    {
        let key = key.into();
        let reducer: Box<dyn Reducer<Value>> = Box::new(reducer);
        match self.slices.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = reducer,
            None => self.slices.push((key, reducer)),
        }
        self
    }

    /// Slice names, in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slices.iter().map(|(key, _)| key.as_str())
    }

    /// Number of slices
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Whether the map has no slices
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

/// Combine slice reducers into one reducer over a JSON object
///
/// Every slice is checked here, once: it must return a state for the init
/// action and for an action type it has never seen. A slice that fails
/// makes every later `reduce` return [`ReducerError::Shape`], so the error
/// still reaches [`Store::create`](crate::Store::create) when the combined
/// reducer is wrapped in a closure.
pub fn combine_reducers(map: ReducerMap) -> CombinedReducer {
    let shape = check_shape(&map.slices);
    if let Err(err) = &shape {
        tracing::warn!(error = %err, "combined reducer failed its shape check");
    }
    CombinedReducer {
        slices: map.slices,
        shape,
    }
}

fn check_shape(slices: &[(String, Box<dyn Reducer<Value>>)]) -> Result<(), StoreError> {
    for (key, reducer) in slices {
        reducer.assert_shape()?;

        if reducer.reduce(None, &Action::init())?.is_none() {
            return Err(StoreError::UndefinedInitialSlice { key: key.clone() });
        }

        let unknown = Action::probe();
        if reducer.reduce(None, &unknown)?.is_none() {
            return Err(StoreError::UndefinedProbeSlice { key: key.clone() });
        }
    }
    Ok(())
}

/// Reducer produced by [`combine_reducers`]
pub struct CombinedReducer {
    slices: Vec<(String, Box<dyn Reducer<Value>>)>,
    shape: Result<(), StoreError>,
}

impl std::fmt::Debug for CombinedReducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedReducer")
            .field("slices", &self.slices.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .field("shape", &self.shape)
            .finish()
    }
}

impl CombinedReducer {
    fn warn_unexpected_keys(&self, state: &Map<String, Value>) {
        let unexpected: Vec<&str> = state
            .keys()
            .filter(|key| !self.slices.iter().any(|(k, _)| k == *key))
            .map(String::as_str)
            .collect();
        if !unexpected.is_empty() {
            tracing::warn!(
                keys = ?unexpected,
                "initial state has keys with no matching reducer; they will be ignored"
            );
        }
    }
}

impl Reducer<Value> for CombinedReducer {
    fn reduce(&self, state: Option<&Value>, action: &Action) -> ReducerResult<Value> {
        if let Err(err) = &self.shape {
            return Err(ReducerError::Shape(Box::new(err.clone())));
        }

        let current = state.and_then(Value::as_object);
        if action.kind() == INIT_ACTION {
            if let Some(current) = current {
                self.warn_unexpected_keys(current);
            }
        }

        // Build the whole object before handing it back: a failing slice
        // must not leave a half-updated state behind.
        let mut next = Map::new();
        for (key, reducer) in &self.slices {
            let previous = current.and_then(|object| object.get(key));
            match reducer.reduce(previous, action)? {
                Some(slice) => {
                    next.insert(key.clone(), slice);
                }
                None => return Err(ReducerError::UndefinedSlice { key: key.clone() }),
            }
        }
        Ok(Some(Value::Object(next)))
    }

    fn assert_shape(&self) -> Result<(), StoreError> {
        self.shape.clone()
    }
}
