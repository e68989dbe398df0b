//! Core types for state-dispatch
//!
//! This crate provides a predictable state container following the Redux
//! pattern: one store owns the state, pure reducers compute every next state,
//! and an ordered middleware pipeline decides what reaches them.
//!
//! # Core Concepts
//!
//! - **Action**: a `type` plus payload fields; the only input reducers see
//! - **Reducer**: pure `(Option<&S>, &Action) -> Option<S>` transition
//! - **combine_reducers**: one reducer per named slice of a JSON object
//! - **Store**: holds state, dispatches, notifies subscribers
//! - **Middleware**: stages wrapped around the raw dispatch
//! - **Thunk / PromiseAction**: deferred inputs expanded by their stages
//!
//! # Basic Example
//!
//! ```
//! use state_dispatch_core::prelude::*;
//! use serde_json::{json, Value};
//!
//! fn speaker(state: Option<&Value>, action: &Action) -> ReducerResult<Value> {
//!     let mut state = state.cloned().unwrap_or_else(|| json!({}));
//!     if action.kind() == "SAY" {
//!         state["message"] = action.get("message").cloned().unwrap_or(Value::Null);
//!     }
//!     Ok(Some(state))
//! }
//!
//! let store = Store::builder(combine_reducers(ReducerMap::new().slice("speaker", speaker)))
//!     .middleware(ThunkMiddleware)
//!     .build()
//!     .unwrap();
//!
//! store.dispatch(Action::new("SAY").with("message", "Hi")).unwrap();
//! assert_eq!(store.get_state()["speaker"]["message"], "Hi");
//! ```
//!
//! # Async Actions
//!
//! Async work enters the store in one of two ways:
//!
//! 1. **Thunks** decide themselves when to dispatch:
//!
//! ```ignore
//! store.dispatch(Thunk::effect(|store| {
//!     let store = store.clone();
//!     tokio::spawn(async move {
//!         tokio::time::sleep(Duration::from_secs(2)).await;
//!         let _ = store.dispatch(Action::new("SAY").with("message", "Hi"));
//!     });
//! }))?;
//! ```
//!
//! 2. **Promise actions** are expanded into REQUEST, then SUCCESS or FAILURE:
//!
//! ```ignore
//! let pending = store
//!     .dispatch(PromiseAction::new(
//!         ["GET_TIME_REQUEST", "GET_TIME_SUCCESS", "GET_TIME_FAILURE"],
//!         || async { fetch_time().await.map_err(|e| json!(e.to_string())) },
//!     ))?
//!     .into_pending();
//! ```
//!
//! Async failures never come back as errors from `dispatch`; they become
//! FAILURE actions the reducers can interpret.

pub mod action;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod promise;
pub mod reducer;
mod selector;
pub mod store;
pub mod testing;
pub mod thunk;

// Core exports
pub use action::{Action, Dispatched, Envelope, INIT_ACTION, RESERVED_PREFIX};
pub use error::{DispatchError, ReducerError, StoreError};
pub use reducer::{combine_reducers, CombinedReducer, Reducer, ReducerMap, ReducerResult};
pub use store::{create_store, Store, StoreBuilder, Subscription, WeakStore};

// Middleware exports
pub use middleware::{
    apply_middleware, from_fn, DiscardMiddleware, LoggingMiddleware, Middleware,
    MiddlewareEnhancer, Next,
};
pub use promise::{PendingAction, PromiseAction, PromiseMiddleware, Settlement};
pub use thunk::{Thunk, ThunkMiddleware};

// Logging exports
pub use logger::{
    ActionLog, ActionLogConfig, ActionLogEntry, ActionLoggerConfig, ActionLoggerMiddleware,
    SharedActionLog,
};

// Testing exports
pub use testing::{RecorderMiddleware, TestHarness};

#[cfg(feature = "testing-time")]
pub use testing::{advance_time, pause_time, resume_time};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{Action, Dispatched, Envelope};
    pub use crate::error::{DispatchError, ReducerError, StoreError};
    pub use crate::middleware::{
        apply_middleware, from_fn, DiscardMiddleware, LoggingMiddleware, Middleware,
        MiddlewareEnhancer, Next,
    };
    pub use crate::promise::{PendingAction, PromiseAction, PromiseMiddleware, Settlement};
    pub use crate::reducer::{
        combine_reducers, CombinedReducer, Reducer, ReducerMap, ReducerResult,
    };
    pub use crate::store::{create_store, Store, StoreBuilder, Subscription, WeakStore};
    pub use crate::thunk::{Thunk, ThunkMiddleware};
}
