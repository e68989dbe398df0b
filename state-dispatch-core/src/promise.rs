//! Promise actions: REQUEST / SUCCESS / FAILURE expansion
//!
//! A [`PromiseAction`] carries three action types and a function that starts
//! some async work. [`PromiseMiddleware`] turns it into plain actions:
//!
//! 1. `{ ..rest, type: REQUEST }` is dispatched through `next` right away;
//! 2. the work is started and `dispatch` returns a [`PendingAction`];
//! 3. when the work settles, either `{ ..rest, result, type: SUCCESS }` or
//!    `{ ..rest, error, type: FAILURE }` is dispatched through `next`.
//!
//! Exactly one of SUCCESS and FAILURE fires, once. There is no cancellation:
//! work that never settles leaves whatever REQUEST set in place.
//!
//! # Example
//!
//! ```ignore
//! let get_time = PromiseAction::new(
//!     ["GET_TIME_REQUEST", "GET_TIME_SUCCESS", "GET_TIME_FAILURE"],
//!     || async {
//!         tokio::time::sleep(Duration::from_millis(500)).await;
//!         Ok(json!({ "time": "12:00:00.000" }))
//!     },
//! );
//!
//! let pending = store.dispatch(get_time)?.into_pending().unwrap();
//! assert_eq!(store.get_state()["time"]["frozen"], true);
//! pending.await?;
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::action::{Action, Dispatched, Envelope};
use crate::error::DispatchError;
use crate::middleware::{Middleware, Next};
use crate::store::Store;

/// Boxed future produced by a promise action's work
pub type PromiseFuture = Pin<Box<dyn Future<Output = Result<Value, Value>> + Send>>;

type PromiseFn = Box<dyn FnOnce() -> PromiseFuture + Send>;

/// An action describing async work and the three types reporting on it
pub struct PromiseAction {
    types: Vec<String>,
    promise: PromiseFn,
    rest: Map<String, Value>,
}

impl PromiseAction {
    /// Create a promise action
    ///
    /// `types` must be `[REQUEST, SUCCESS, FAILURE]`; any other length is
    /// rejected by the promise middleware at dispatch time.
    pub fn new<T, F, Fut>(types: T, promise: F) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
            promise: Box::new(move || Box::pin(promise()) as PromiseFuture),
            rest: Map::new(),
        }
    }

    /// Add a field copied into every derived action
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.rest.insert(key.into(), value.into());
        self
    }

    /// The action types, in REQUEST, SUCCESS, FAILURE order
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// Fields copied into every derived action
    pub fn rest(&self) -> &Map<String, Value> {
        &self.rest
    }
}

impl fmt::Debug for PromiseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseAction")
            .field("types", &self.types)
            .field("rest", &self.rest)
            .finish_non_exhaustive()
    }
}

/// How the work behind a promise action ended
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// The work produced a result; SUCCESS was dispatched
    Resolved(Value),
    /// The work failed; FAILURE was dispatched
    Rejected(Value),
}

/// Handle to a promise action in flight
///
/// Awaiting it is optional: the work runs on the tokio runtime either way.
/// It yields the [`Settlement`] once SUCCESS or FAILURE has been dispatched,
/// or the error raised while dispatching it.
#[derive(Debug)]
pub struct PendingAction {
    handle: JoinHandle<Result<Settlement, DispatchError>>,
}

impl PendingAction {
    /// Whether the work has settled and its action has been dispatched
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for PendingAction {
    type Output = Result<Settlement, DispatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(err)) => Poll::Ready(Err(DispatchError::Interrupted(err.to_string()))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Wait for the work, then dispatch SUCCESS or FAILURE through `next`
async fn settle<S>(
    work: PromiseFuture,
    next: Next<S>,
    success: String,
    failure: String,
    rest: Map<String, Value>,
) -> Result<Settlement, DispatchError>
where
    S: Send + Sync + 'static,
{
    match work.await {
        Ok(result) => {
            tracing::debug!(action = %success, "promise resolved");
            let action = Action::from_parts(success, rest).with("result", result.clone());
            next.run(action.into())?;
            Ok(Settlement::Resolved(result))
        }
        Err(error) => {
            tracing::debug!(action = %failure, "promise rejected");
            let action = Action::from_parts(failure, rest).with("error", error.clone());
            next.run(action.into())?;
            Ok(Settlement::Rejected(error))
        }
    }
}

/// Expands [`Envelope::Promise`] inputs and forwards everything else
#[derive(Debug, Clone, Copy, Default)]
pub struct PromiseMiddleware;

impl<S> Middleware<S> for PromiseMiddleware
where
    S: Send + Sync + 'static,
{
    fn handle(
        &self,
        _store: &Store<S>,
        envelope: Envelope<S>,
        next: Next<S>,
    ) -> Result<Dispatched, DispatchError> {
        let PromiseAction {
            types,
            promise,
            rest,
        } = match envelope {
            Envelope::Promise(action) => action,
            other => return next.run(other),
        };

        let [request, success, failure]: [String; 3] = types
            .try_into()
            .map_err(|types: Vec<String>| DispatchError::InvalidPromiseTypes { found: types.len() })?;
        let runtime = Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;

        tracing::debug!(action = %request, "promise requested");
        next.run(Action::from_parts(request, rest.clone()).into())?;

        let work = promise();
        let handle = runtime.spawn(settle(work, next, success, failure, rest));

        Ok(Dispatched::Pending(PendingAction { handle }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::{combine_reducers, ReducerMap, ReducerResult};
    use crate::thunk::ThunkMiddleware;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const GET_TIME: [&str; 3] = ["GET_TIME_REQUEST", "GET_TIME_SUCCESS", "GET_TIME_FAILURE"];

    fn time(state: Option<&Value>, action: &Action) -> ReducerResult<Value> {
        let mut state = state.cloned().unwrap_or_else(|| json!({}));
        match action.kind() {
            "GET_TIME_REQUEST" => state["frozen"] = json!(true),
            "GET_TIME_SUCCESS" => {
                state["time"] = action
                    .get("result")
                    .and_then(|result| result.get("time"))
                    .cloned()
                    .unwrap_or(Value::Null);
                state["frozen"] = json!(false);
            }
            "GET_TIME_FAILURE" => state["frozen"] = json!(false),
            _ => {}
        }
        Ok(Some(state))
    }

    fn store_with_log() -> (Store<Value>, Arc<Mutex<Vec<Action>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let recorder = crate::middleware::from_fn(
            move |_store: &Store<Value>, envelope: Envelope<Value>, next: Next<Value>| {
                let result = next.run(envelope)?;
                if let Some(action) = result.action() {
                    log.lock().unwrap().push(action.clone());
                }
                Ok(result)
            },
        );
        let store = Store::builder(combine_reducers(ReducerMap::new().slice("time", time)))
            .middleware(PromiseMiddleware)
            .middleware(recorder)
            .build()
            .unwrap();
        (store, seen)
    }

    fn kinds(actions: &Arc<Mutex<Vec<Action>>>) -> Vec<String> {
        actions
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.kind().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_success_expands_to_request_then_success() {
        let (store, seen) = store_with_log();

        let pending = store
            .dispatch(
                PromiseAction::new(GET_TIME, || async { Ok(json!({ "time": "12:00:00.000" })) })
                    .with("delay", 0),
            )
            .unwrap()
            .into_pending()
            .unwrap();

        assert_eq!(kinds(&seen), vec!["GET_TIME_REQUEST"]);
        assert_eq!(store.get_state()["time"]["frozen"], true);

        let settlement = pending.await.unwrap();
        assert_eq!(settlement, Settlement::Resolved(json!({ "time": "12:00:00.000" })));
        assert_eq!(kinds(&seen), vec!["GET_TIME_REQUEST", "GET_TIME_SUCCESS"]);

        let actions = seen.lock().unwrap();
        assert_eq!(actions[0].get("delay"), Some(&json!(0)));
        assert!(actions[0].get("promise").is_none());
        assert!(actions[0].get("types").is_none());
        assert_eq!(actions[1].get("result"), Some(&json!({ "time": "12:00:00.000" })));
        assert_eq!(actions[1].get("delay"), Some(&json!(0)));
        assert_eq!(
            store.get_state()["time"],
            json!({ "time": "12:00:00.000", "frozen": false })
        );
    }

    #[tokio::test]
    async fn test_failure_expands_to_request_then_failure() {
        let (store, seen) = store_with_log();
        let error = json!({ "message": "clock unavailable" });

        let failure = error.clone();
        let pending = store
            .dispatch(PromiseAction::new(GET_TIME, move || async move { Err(failure) }))
            .unwrap()
            .into_pending()
            .unwrap();

        assert_eq!(pending.await.unwrap(), Settlement::Rejected(error.clone()));
        assert_eq!(kinds(&seen), vec!["GET_TIME_REQUEST", "GET_TIME_FAILURE"]);
        assert_eq!(seen.lock().unwrap()[1].get("error"), Some(&error));
        assert_eq!(store.get_state()["time"]["frozen"], false);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_is_synchronous_and_settlement_is_deferred() {
        let (store, seen) = store_with_log();

        let pending = store
            .dispatch(PromiseAction::new(GET_TIME, || async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(json!({ "time": "12:00:00.000" }))
            }))
            .unwrap()
            .into_pending()
            .unwrap();

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(kinds(&seen), vec!["GET_TIME_REQUEST"]);
        assert!(!pending.is_finished());

        pending.await.unwrap();
        assert_eq!(kinds(&seen), vec!["GET_TIME_REQUEST", "GET_TIME_SUCCESS"]);
    }

    #[tokio::test]
    async fn test_plain_actions_forwarded() {
        let (store, seen) = store_with_log();
        let result = store.dispatch(Action::new("GET_TIME_REQUEST")).unwrap();
        assert!(result.action().is_some());
        assert_eq!(kinds(&seen), vec!["GET_TIME_REQUEST"]);
    }

    #[tokio::test]
    async fn test_wrong_type_count_is_a_configuration_error() {
        let (store, seen) = store_with_log();

        let err = store
            .dispatch(PromiseAction::new(["ONLY_REQUEST", "ONLY_SUCCESS"], || async {
                Ok(Value::Null)
            }))
            .unwrap_err();
        assert_eq!(err, DispatchError::InvalidPromiseTypes { found: 2 });

        let err = store
            .dispatch(PromiseAction::new(Vec::<String>::new(), || async { Ok(Value::Null) }))
            .unwrap_err();
        assert_eq!(err, DispatchError::InvalidPromiseTypes { found: 0 });
        assert!(kinds(&seen).is_empty());
    }

    #[test]
    fn test_with_collects_rest_fields() {
        let promise = PromiseAction::new(GET_TIME, || async { Ok(Value::Null) })
            .with("source", "clock")
            .with("attempt", 2)
            .with("source", "wall clock");

        assert_eq!(promise.types(), GET_TIME);
        assert_eq!(promise.rest().len(), 2);
        assert_eq!(promise.rest().get("source"), Some(&json!("wall clock")));
        assert_eq!(promise.rest().get("attempt"), Some(&json!(2)));
    }

    #[test]
    fn test_promise_needs_runtime() {
        let (store, seen) = store_with_log();
        let err = store
            .dispatch(PromiseAction::new(GET_TIME, || async { Ok(Value::Null) }))
            .unwrap_err();
        assert_eq!(err, DispatchError::NoRuntime);
        assert!(kinds(&seen).is_empty());
    }

    #[tokio::test]
    async fn test_promise_without_middleware_is_invalid() {
        let store = Store::builder(combine_reducers(ReducerMap::new().slice("time", time)))
            .middleware(ThunkMiddleware)
            .build()
            .unwrap();
        let err = store
            .dispatch(PromiseAction::new(GET_TIME, || async { Ok(Value::Null) }))
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidAction(_)));
    }

    #[tokio::test]
    async fn test_success_dispatch_error_surfaces_on_handle() {
        let failing = |state: Option<&Value>, action: &Action| -> ReducerResult<Value> {
            if action.kind() == "GET_TIME_SUCCESS" {
                return Err(crate::error::ReducerError::msg("bad time"));
            }
            Ok(Some(state.cloned().unwrap_or(Value::Null)))
        };
        let store = Store::builder(failing)
            .middleware(PromiseMiddleware)
            .build()
            .unwrap();

        let pending = store
            .dispatch(PromiseAction::new(GET_TIME, || async { Ok(json!("now")) }))
            .unwrap()
            .into_pending()
            .unwrap();
        assert!(matches!(pending.await, Err(DispatchError::Reducer(_))));
    }
}
