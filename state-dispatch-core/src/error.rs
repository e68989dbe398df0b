//! Error types for stores, reducers and dispatch

use thiserror::Error;

/// Failure raised by a reducer while computing the next state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReducerError {
    /// A slice reducer returned no value for a real action
    #[error("reducer for slice \"{key}\" returned no state")]
    UndefinedSlice { key: String },

    /// The top-level reducer returned no value for a real action
    #[error("reducer returned no state")]
    UndefinedState,

    /// Reducer-specific failure
    #[error("reducer failed: {0}")]
    Failed(String),

    /// A combined reducer was built from a slice that fails the shape check
    #[error("{0}")]
    Shape(Box<StoreError>),
}

impl ReducerError {
    /// Build a [`ReducerError::Failed`] from anything displayable
    pub fn msg(message: impl std::fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }
}

/// Failure raised while constructing a store.
///
/// A store that fails construction is never handed out, so none of these
/// can be observed after the first dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A slice reducer returned no value when initialized
    #[error("slice \"{key}\" returned no state during initialization; return a default instead")]
    UndefinedInitialSlice { key: String },

    /// A slice reducer returned no value for an unknown action type
    #[error("slice \"{key}\" returned no state for an unknown action; return the current state instead")]
    UndefinedProbeSlice { key: String },

    /// The top-level reducer returned no value for the init action
    #[error("reducer returned no state for the init action")]
    UndefinedInitialState,

    /// A reducer failed while seeding the initial state
    #[error("reducer failed during initialization: {0}")]
    Init(ReducerError),
}

impl From<ReducerError> for StoreError {
    fn from(err: ReducerError) -> Self {
        match err {
            ReducerError::Shape(shape) => *shape,
            other => Self::Init(other),
        }
    }
}

/// Failure raised synchronously by `dispatch`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Input reached the raw dispatch in a shape reducers cannot handle
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// `dispatch` was called from inside a reducer
    #[error("reducers may not dispatch actions")]
    ReducerDispatch,

    /// The reducer failed; state was left unchanged
    #[error(transparent)]
    Reducer(#[from] ReducerError),

    /// A promise action did not carry exactly three action types
    #[error("promise action needs [REQUEST, SUCCESS, FAILURE] types, found {found}")]
    InvalidPromiseTypes { found: usize },

    /// A promise action was dispatched outside of a tokio runtime
    #[error("promise actions require a running tokio runtime")]
    NoRuntime,

    /// The task driving a pending promise action panicked or was aborted
    #[error("pending action was interrupted: {0}")]
    Interrupted(String),

    /// A thunk reported its own failure
    #[error("thunk failed: {0}")]
    Thunk(String),
}

impl DispatchError {
    /// Build a [`DispatchError::Thunk`] from anything displayable
    pub fn thunk(message: impl std::fmt::Display) -> Self {
        Self::Thunk(message.to_string())
    }
}
