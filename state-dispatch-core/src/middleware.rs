//! Middleware pipeline around the store's raw dispatch
//!
//! Stages compose right to left: with stages `[a, b, c]` the public
//! `dispatch` calls `a`, which may call `b` through its [`Next`], and so on,
//! until `c`'s `next` reaches the raw dispatch. A stage may transform the
//! input, forward it, dispatch something else through the store (re-entering
//! the whole chain), or swallow it.
//!
//! # Example
//!
//! ```
//! use state_dispatch_core::{
//!     apply_middleware, middleware::from_fn, Action, Envelope, Next, ReducerResult, Store,
//! };
//!
//! fn counter(state: Option<&i64>, action: &Action) -> ReducerResult<i64> {
//!     let count = state.copied().unwrap_or(0);
//!     Ok(Some(if action.kind() == "INCREMENT" { count + 1 } else { count }))
//! }
//!
//! // Doubles every INCREMENT
//! let twice = from_fn(|_store: &Store<i64>, envelope, next: Next<i64>| match envelope {
//!     Envelope::Plain(action) if action.kind() == "INCREMENT" => {
//!         next.run(action.clone().into())?;
//!         next.run(action.into())
//!     }
//!     other => next.run(other),
//! });
//!
//! let store = apply_middleware![twice].create_store(counter, None).unwrap();
//! store.dispatch(Action::new("INCREMENT")).unwrap();
//! assert_eq!(*store.get_state(), 2);
//! ```

use std::sync::Arc;

use crate::action::{Dispatched, Envelope};
use crate::error::{DispatchError, StoreError};
use crate::reducer::Reducer;
use crate::store::Store;

/// A dispatch-transforming stage
///
/// `store` gives access to `dispatch` (the full, enhanced chain) and
/// `get_state`; `next` continues with the remaining stages.
pub trait Middleware<S>: Send + Sync {
    /// Handle one dispatched input
    fn handle(
        &self,
        store: &Store<S>,
        envelope: Envelope<S>,
        next: Next<S>,
    ) -> Result<Dispatched, DispatchError>;
}

impl<S, F> Middleware<S> for F
where
    F: Fn(&Store<S>, Envelope<S>, Next<S>) -> Result<Dispatched, DispatchError> + Send + Sync,
{
    fn handle(
        &self,
        store: &Store<S>,
        envelope: Envelope<S>,
        next: Next<S>,
    ) -> Result<Dispatched, DispatchError> {
        self(store, envelope, next)
    }
}

/// Pin a closure to the middleware signature so its arguments infer
pub fn from_fn<S, F>(f: F) -> F
where
    F: Fn(&Store<S>, Envelope<S>, Next<S>) -> Result<Dispatched, DispatchError> + Send + Sync,
{
    f
}

/// The rest of the chain after the current stage
///
/// Owned and cloneable, so async stages can keep it and continue the chain
/// after the original `dispatch` call has returned.
pub struct Next<S> {
    store: Store<S>,
    index: usize,
}

impl<S> Clone for Next<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            index: self.index,
        }
    }
}

impl<S> std::fmt::Debug for Next<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("index", &self.index).finish()
    }
}

impl<S> Next<S>
where
    S: Send + Sync + 'static,
{
    pub(crate) fn new(store: Store<S>, index: usize) -> Self {
        Self { store, index }
    }

    /// Pass the input to the next stage, or to the raw dispatch
    pub fn run(&self, envelope: Envelope<S>) -> Result<Dispatched, DispatchError> {
        match self.store.stage(self.index) {
            Some(stage) => stage.handle(
                &self.store,
                envelope,
                Next::new(self.store.clone(), self.index + 1),
            ),
            None => self.store.raw_dispatch(envelope),
        }
    }
}

/// Store enhancer produced by [`apply_middleware`]
///
/// Acts as the enhanced store constructor: every store it creates has its
/// dispatch wrapped by the stages, first stage outermost.
pub struct MiddlewareEnhancer<S> {
    stages: Vec<Arc<dyn Middleware<S>>>,
}

impl<S> Default for MiddlewareEnhancer<S> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<S> Clone for MiddlewareEnhancer<S> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
        }
    }
}

impl<S> std::fmt::Debug for MiddlewareEnhancer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareEnhancer")
            .field("stages_count", &self.stages.len())
            .finish()
    }
}

impl<S> MiddlewareEnhancer<S>
where
    S: Send + Sync + 'static,
{
    /// Create an enhancer with no stages
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage (it runs after the ones already added)
    pub fn with<M>(mut self, stage: M) -> Self
    where
        M: Middleware<S> + 'static,
    {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether there are no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Create a store whose dispatch runs through the stages
    pub fn create_store<R>(&self, reducer: R, initial_state: Option<S>) -> Result<Store<S>, StoreError>
    where
        R: Reducer<S> + 'static,
    {
        Store::create(Box::new(reducer), initial_state, self.stages.clone())
    }
}

/// Build a store enhancer from shared stages
pub fn apply_middleware<S>(stages: Vec<Arc<dyn Middleware<S>>>) -> MiddlewareEnhancer<S> {
    MiddlewareEnhancer { stages }
}

/// Build a [`MiddlewareEnhancer`] from a list of stages
///
/// ```ignore
/// let store = apply_middleware![ThunkMiddleware, PromiseMiddleware]
///     .create_store(reducer, None)?;
/// ```
#[macro_export]
macro_rules! apply_middleware {
    ($($stage:expr),* $(,)?) => {
        $crate::middleware::MiddlewareEnhancer::new()$(.with($stage))*
    };
}

/// Middleware that logs every input via `tracing`
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    /// Whether to also log the outcome
    pub log_outcome: bool,
}

impl LoggingMiddleware {
    /// Log inputs only
    pub fn new() -> Self {
        Self { log_outcome: false }
    }

    /// Log inputs and outcomes
    pub fn verbose() -> Self {
        Self { log_outcome: true }
    }
}

impl<S> Middleware<S> for LoggingMiddleware
where
    S: Send + Sync + 'static,
{
    fn handle(
        &self,
        _store: &Store<S>,
        envelope: Envelope<S>,
        next: Next<S>,
    ) -> Result<Dispatched, DispatchError> {
        let label = envelope.label();
        tracing::debug!(action = %label, "action received");

        let result = next.run(envelope);
        if self.log_outcome {
            match &result {
                Ok(dispatched) => tracing::debug!(
                    action = %label,
                    outcome = dispatched_kind(dispatched),
                    "action processed"
                ),
                Err(err) => tracing::debug!(action = %label, error = %err, "action failed"),
            }
        }
        result
    }
}

fn dispatched_kind(dispatched: &Dispatched) -> &'static str {
    match dispatched {
        Dispatched::Action(_) => "reduced",
        Dispatched::Value(_) => "value",
        Dispatched::Pending(_) => "pending",
        Dispatched::Discarded => "discarded",
    }
}

/// Middleware that swallows everything it receives
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardMiddleware;

impl<S> Middleware<S> for DiscardMiddleware
where
    S: Send + Sync + 'static,
{
    fn handle(
        &self,
        _store: &Store<S>,
        envelope: Envelope<S>,
        _next: Next<S>,
    ) -> Result<Dispatched, DispatchError> {
        tracing::debug!(action = %envelope.label(), "action discarded");
        Ok(Dispatched::Discarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::reducer::ReducerResult;
    use std::sync::Mutex;

    fn counter(state: Option<&i64>, action: &Action) -> ReducerResult<i64> {
        let count = state.copied().unwrap_or(0);
        Ok(Some(match action.kind() {
            "INCREMENT" => count + 1,
            "RESET" => 0,
            _ => count,
        }))
    }

    /// Records the order stages see actions in
    struct Tracer {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware<i64> for Tracer {
        fn handle(
            &self,
            _store: &Store<i64>,
            envelope: Envelope<i64>,
            next: Next<i64>,
        ) -> Result<Dispatched, DispatchError> {
            self.log.lock().unwrap().push(format!("{} in", self.name));
            let result = next.run(envelope);
            self.log.lock().unwrap().push(format!("{} out", self.name));
            result
        }
    }

    #[test]
    fn test_first_stage_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let store = apply_middleware![
            Tracer { name: "a", log: log.clone() },
            Tracer { name: "b", log: log.clone() },
        ]
        .create_store(counter, None)
        .unwrap();

        store.dispatch(Action::new("INCREMENT")).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a in", "b in", "b out", "a out"]);
        assert_eq!(*store.get_state(), 1);
    }

    #[test]
    fn test_empty_enhancer_is_raw_dispatch() {
        let enhancer = MiddlewareEnhancer::<i64>::new();
        assert!(enhancer.is_empty());

        let store = enhancer.create_store(counter, None).unwrap();
        assert_eq!(store.stage_count(), 0);
        let result = store.dispatch(Action::new("INCREMENT")).unwrap();
        assert_eq!(result.action().map(Action::kind), Some("INCREMENT"));
    }

    #[test]
    fn test_apply_middleware_with_shared_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stage: Arc<dyn Middleware<i64>> = Arc::new(Tracer { name: "shared", log: log.clone() });
        let store = apply_middleware(vec![stage.clone(), stage])
            .create_store(counter, None)
            .unwrap();

        store.dispatch(Action::new("INCREMENT")).unwrap();
        assert_eq!(log.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_discard_stops_the_chain() {
        let store = Store::builder(counter)
            .middleware(LoggingMiddleware::verbose())
            .middleware(DiscardMiddleware)
            .build()
            .unwrap();

        let result = store.dispatch(Action::new("INCREMENT")).unwrap();
        assert!(result.is_discarded());
        assert_eq!(*store.get_state(), 0);
    }

    #[test]
    fn test_stage_can_transform_action() {
        let rename = from_fn(|_store: &Store<i64>, envelope, next: Next<i64>| match envelope {
            Envelope::Plain(action) if action.kind() == "BUMP" => {
                next.run(Action::new("INCREMENT").into())
            }
            other => next.run(other),
        });
        let store = Store::builder(counter).middleware(rename).build().unwrap();

        store.dispatch(Action::new("BUMP")).unwrap();
        assert_eq!(*store.get_state(), 1);
    }

    #[test]
    fn test_stage_dispatch_reenters_whole_chain() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let outer_seen = seen.clone();
        let outer = from_fn(move |_store: &Store<i64>, envelope: Envelope<i64>, next: Next<i64>| {
            outer_seen.lock().unwrap().push(envelope.label());
            next.run(envelope)
        });
        // Every INCREMENT is followed by a RESET sent through the full chain
        let resetter = from_fn(|store: &Store<i64>, envelope: Envelope<i64>, next: Next<i64>| {
            let is_increment = matches!(&envelope, Envelope::Plain(a) if a.kind() == "INCREMENT");
            let result = next.run(envelope)?;
            if is_increment {
                store.dispatch(Action::new("RESET"))?;
            }
            Ok(result)
        });

        let store = Store::builder(counter)
            .middleware(outer)
            .middleware(resetter)
            .build()
            .unwrap();
        store.dispatch(Action::new("INCREMENT")).unwrap();

        assert_eq!(*store.get_state(), 0);
        assert_eq!(*seen.lock().unwrap(), vec!["INCREMENT", "RESET"]);
    }

    #[test]
    fn test_raw_dispatch_rejects_untyped_input_behind_stages() {
        let store = Store::builder(counter)
            .middleware(LoggingMiddleware::new())
            .build()
            .unwrap();
        let err = store
            .dispatch(serde_json::json!({ "payload": 1 }))
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidAction(_)));
    }
}
