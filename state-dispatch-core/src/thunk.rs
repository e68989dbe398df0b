//! Thunk actions: functions of the store, run instead of reduced
//!
//! With [`ThunkMiddleware`] installed, dispatching a [`Thunk`] calls it with
//! the store handle and hands its result straight back to the caller. The
//! thunk decides when (and whether) to dispatch real actions, e.g. after a
//! timer fires.
//!
//! # Example
//!
//! ```ignore
//! fn say_later(message: &str) -> Thunk<Value> {
//!     let message = message.to_string();
//!     Thunk::effect(move |store| {
//!         let store = store.clone();
//!         tokio::spawn(async move {
//!             tokio::time::sleep(Duration::from_secs(2)).await;
//!             let _ = store.dispatch(Action::new("SAY").with("message", message));
//!         });
//!     })
//! }
//!
//! store.dispatch(say_later("Hi"))?;
//! ```

use std::fmt;

use serde_json::Value;

use crate::action::{Dispatched, Envelope};
use crate::error::DispatchError;
use crate::middleware::{Middleware, Next};
use crate::store::Store;

type ThunkBody<S> = Box<dyn FnOnce(&Store<S>) -> Result<Dispatched, DispatchError> + Send>;

/// A deferred action: a function of the store
pub struct Thunk<S> {
    body: ThunkBody<S>,
}

impl<S> Thunk<S> {
    /// Wrap a function whose result becomes the result of `dispatch`
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&Store<S>) -> Result<Dispatched, DispatchError> + Send + 'static,
    {
        Self { body: Box::new(f) }
    }

    /// Wrap a function run only for its side effects
    ///
    /// `dispatch` returns `Dispatched::Value(Value::Null)` for these.
    pub fn effect<F>(f: F) -> Self
    where
        F: FnOnce(&Store<S>) + Send + 'static,
    {
        Self::new(move |store| {
            f(store);
            Ok(Dispatched::Value(Value::Null))
        })
    }

    pub(crate) fn call(self, store: &Store<S>) -> Result<Dispatched, DispatchError> {
        (self.body)(store)
    }
}

impl<S> fmt::Debug for Thunk<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Thunk(..)")
    }
}

/// Runs [`Envelope::Thunk`] inputs and forwards everything else
#[derive(Debug, Clone, Copy, Default)]
pub struct ThunkMiddleware;

impl<S> Middleware<S> for ThunkMiddleware
where
    S: Send + Sync + 'static,
{
    fn handle(
        &self,
        store: &Store<S>,
        envelope: Envelope<S>,
        next: Next<S>,
    ) -> Result<Dispatched, DispatchError> {
        match envelope {
            Envelope::Thunk(thunk) => {
                tracing::trace!("running thunk");
                thunk.call(store)
            }
            other => next.run(other),
        }
    }
}
