//! state-dispatch: a predictable state container
//!
//! Like Redux, but typed. Reducers are pure functions of state and action,
//! every state change goes through a dispatched action, and middleware
//! decides what reaches the reducers.
//!
//! # Example
//! ```
//! use state_dispatch::prelude::*;
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
//!     .middleware(LoggingMiddleware::new())
//!     .middleware(ThunkMiddleware)
//!     .middleware(PromiseMiddleware)
//!     .build()
//!     .unwrap();
//!
//! let _subscription = store.subscribe(|| {});
//! store.dispatch(Action::new("SAY").with("message", "Hi")).unwrap();
//! assert_eq!(store.get_state()["speaker"]["message"], "Hi");
//! ```

// Re-export everything from core
pub use state_dispatch_core::*;

/// Prelude for convenient imports
pub mod prelude {
    // Actions
    pub use state_dispatch_core::{Action, Dispatched, Envelope};

    // Reducers
    pub use state_dispatch_core::{combine_reducers, CombinedReducer, Reducer, ReducerMap, ReducerResult};

    // Store
    pub use state_dispatch_core::{create_store, Store, StoreBuilder, Subscription, WeakStore};

    // Middleware
    pub use state_dispatch_core::{
        apply_middleware, DiscardMiddleware, LoggingMiddleware, Middleware, MiddlewareEnhancer,
        Next, PendingAction, PromiseAction, PromiseMiddleware, Settlement, Thunk, ThunkMiddleware,
    };

    // Logging
    pub use state_dispatch_core::{ActionLoggerConfig, ActionLoggerMiddleware};

    // Errors
    pub use state_dispatch_core::{DispatchError, ReducerError, StoreError};
}
