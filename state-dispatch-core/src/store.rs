//! Centralized state store with reducer pattern
//!
//! The store holds the only copy of the application state, is the only thing
//! allowed to replace it, and the only thing that notifies subscribers.
//! [`Store`] is a cheap handle; clone it to hand the store to thunks, async
//! continuations or a rendering layer.
//!
//! # Example
//! ```
//! use state_dispatch_core::{Action, ReducerResult, Store};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! fn counter(state: Option<&i64>, action: &Action) -> ReducerResult<i64> {
//!     let count = state.copied().unwrap_or(0);
//!     Ok(Some(match action.kind() {
//!         "INCREMENT" => count + 1,
//!         _ => count,
//!     }))
//! }
//!
//! let store = Store::new(counter).unwrap();
//! let renders = Arc::new(AtomicUsize::new(0));
//! let seen = renders.clone();
//! let subscription = store.subscribe(move || {
//!     seen.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! store.dispatch(Action::new("INCREMENT")).unwrap();
//! assert_eq!(*store.get_state(), 1);
//! assert_eq!(renders.load(Ordering::SeqCst), 1);
//!
//! subscription.unsubscribe();
//! store.dispatch(Action::new("INCREMENT")).unwrap();
//! assert_eq!(renders.load(Ordering::SeqCst), 1);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};

use crate::action::{Action, Dispatched, Envelope};
use crate::error::{DispatchError, ReducerError, StoreError};
use crate::middleware::{Middleware, Next};
use crate::reducer::Reducer;

type Callback = Arc<dyn Fn() + Send + Sync>;

struct Listener {
    id: u64,
    callback: Callback,
}

type Listeners = Mutex<Vec<Listener>>;

struct Inner<S> {
    state: RwLock<Arc<S>>,
    reducer: Box<dyn Reducer<S>>,
    stages: Vec<Arc<dyn Middleware<S>>>,
    listeners: Arc<Listeners>,
    next_listener_id: AtomicU64,
    /// Serializes reductions; never held while subscribers run
    dispatch_lock: Mutex<()>,
    /// Thread currently inside the reducer, if any
    reducing: Mutex<Option<ThreadId>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the reducing marker even if the reducer panics
struct ReducingGuard<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
}

impl<'a> ReducingGuard<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *lock(slot) = Some(thread::current().id());
        Self { slot }
    }
}

impl Drop for ReducingGuard<'_> {
    fn drop(&mut self) {
        *lock(self.slot) = None;
    }
}

/// Centralized state container with Redux-like dispatch
///
/// # Type Parameters
/// * `S` - The application state type
pub struct Store<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> std::fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("stages", &self.inner.stages.len())
            .field("subscribers", &lock(&self.inner.listeners).len())
            .finish()
    }
}

/// Create a store without middleware
///
/// Runs the reducer's shape check, then seeds the state by reducing the
/// init action over `initial_state` (or over nothing).
pub fn create_store<S, R>(reducer: R, initial_state: Option<S>) -> Result<Store<S>, StoreError>
where
    S: Send + Sync + 'static,
    R: Reducer<S> + 'static,
{
    Store::create(Box::new(reducer), initial_state, Vec::new())
}

impl<S> Store<S>
where
    S: Send + Sync + 'static,
{
    /// Create a store whose state is seeded by the reducer's defaults
    pub fn new<R>(reducer: R) -> Result<Self, StoreError>
    where
        R: Reducer<S> + 'static,
    {
        create_store(reducer, None)
    }

    /// Create a store starting from a preloaded state
    pub fn with_state<R>(reducer: R, state: S) -> Result<Self, StoreError>
    where
        R: Reducer<S> + 'static,
    {
        create_store(reducer, Some(state))
    }

    /// Start building a store with middleware
    pub fn builder<R>(reducer: R) -> StoreBuilder<S>
    where
        R: Reducer<S> + 'static,
    {
        StoreBuilder::new(reducer)
    }

    pub(crate) fn create(
        reducer: Box<dyn Reducer<S>>,
        initial_state: Option<S>,
        stages: Vec<Arc<dyn Middleware<S>>>,
    ) -> Result<Self, StoreError> {
        reducer.assert_shape()?;

        let seeded = reducer
            .reduce(initial_state.as_ref(), &Action::init())?
            .ok_or(StoreError::UndefinedInitialState)?;

        tracing::debug!(
            stages = stages.len(),
            preloaded = initial_state.is_some(),
            "store created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                state: RwLock::new(Arc::new(seeded)),
                reducer,
                stages,
                listeners: Arc::new(Mutex::new(Vec::new())),
                next_listener_id: AtomicU64::new(0),
                dispatch_lock: Mutex::new(()),
                reducing: Mutex::new(None),
            }),
        })
    }

    /// Dispatch anything that converts into an [`Envelope`]
    ///
    /// The input runs through every middleware stage, outermost first. Plain
    /// actions that reach the store are reduced, subscribers are notified and
    /// the action is handed back as [`Dispatched::Action`].
    pub fn dispatch(&self, input: impl Into<Envelope<S>>) -> Result<Dispatched, DispatchError> {
        Next::new(self.clone(), 0).run(input.into())
    }

    /// Current state
    ///
    /// The handle stays valid after later dispatches; it simply keeps
    /// pointing at the state that was current when it was taken.
    pub fn get_state(&self) -> Arc<S> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Register a callback run after every successful reduction
    ///
    /// Dropping the returned [`Subscription`] does not unsubscribe; call
    /// [`Subscription::unsubscribe`].
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners).push(Listener {
            id,
            callback: Arc::new(callback),
        });
        Subscription {
            id,
            listeners: Arc::downgrade(&self.inner.listeners),
            active: AtomicBool::new(true),
        }
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    /// Number of middleware stages wrapped around the raw dispatch
    pub fn stage_count(&self) -> usize {
        self.inner.stages.len()
    }

    /// A handle that does not keep the store alive
    pub fn downgrade(&self) -> WeakStore<S> {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn stage(&self, index: usize) -> Option<&Arc<dyn Middleware<S>>> {
        self.inner.stages.get(index)
    }

    /// Innermost dispatch: validate, reduce, swap, notify
    pub(crate) fn raw_dispatch(&self, envelope: Envelope<S>) -> Result<Dispatched, DispatchError> {
        let action = match envelope {
            Envelope::Plain(action) => action,
            Envelope::Object(value) => Action::try_from(value)?,
            Envelope::Thunk(_) => {
                return Err(DispatchError::InvalidAction(
                    "thunk reached the store; install the thunk middleware".to_string(),
                ))
            }
            Envelope::Promise(promise) => {
                return Err(DispatchError::InvalidAction(format!(
                    "promise action {:?} reached the store; install the promise middleware",
                    promise.types()
                )))
            }
        };

        self.reduce(&action)?;
        self.notify();
        Ok(Dispatched::Action(action))
    }

    fn reduce(&self, action: &Action) -> Result<(), DispatchError> {
        if *lock(&self.inner.reducing) == Some(thread::current().id()) {
            return Err(DispatchError::ReducerDispatch);
        }

        let _serial = lock(&self.inner.dispatch_lock);
        let current = self.get_state();
        let next = {
            let _reducing = ReducingGuard::enter(&self.inner.reducing);
            self.inner.reducer.reduce(Some(&*current), action)
        };

        let next = match next {
            Ok(Some(next)) => next,
            Ok(None) => {
                tracing::warn!(action = %action.kind(), "reducer returned no state");
                return Err(ReducerError::UndefinedState.into());
            }
            Err(err) => {
                tracing::warn!(action = %action.kind(), error = %err, "reducer failed; state unchanged");
                return Err(err.into());
            }
        };

        *self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        tracing::trace!(action = %action.kind(), "state replaced");
        Ok(())
    }

    fn notify(&self) {
        let snapshot: Vec<(u64, Callback)> = lock(&self.inner.listeners)
            .iter()
            .map(|listener| (listener.id, listener.callback.clone()))
            .collect();

        for (id, callback) in snapshot {
            // Removed earlier in this round
            let registered = lock(&self.inner.listeners)
                .iter()
                .any(|listener| listener.id == id);
            if registered {
                callback();
            }
        }
    }
}

/// Non-owning store handle
pub struct WeakStore<S> {
    inner: Weak<Inner<S>>,
}

impl<S> Clone for WeakStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> WeakStore<S> {
    /// Get the store back if it is still alive
    pub fn upgrade(&self) -> Option<Store<S>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

/// Capability to remove one subscriber
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
    active: AtomicBool,
}

impl Subscription {
    /// Remove the subscriber; calling this again does nothing
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).retain(|listener| listener.id != self.id);
        }
    }

    /// Whether [`unsubscribe`](Self::unsubscribe) has not been called yet
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Builder for a store with middleware and an optional preloaded state
pub struct StoreBuilder<S> {
    reducer: Box<dyn Reducer<S>>,
    state: Option<S>,
    stages: Vec<Arc<dyn Middleware<S>>>,
}

impl<S> StoreBuilder<S>
where
    S: Send + Sync + 'static,
{
    /// Start a builder from the top-level reducer
    pub fn new<R>(reducer: R) -> Self
    where
        R: Reducer<S> + 'static,
    {
        Self {
            reducer: Box::new(reducer),
            state: None,
            stages: Vec::new(),
        }
    }

    /// Preload the state reducers start from
    pub fn state(mut self, state: S) -> Self {
        self.state = Some(state);
        self
    }

    /// Append a middleware stage; earlier stages see input first
    pub fn middleware<M>(mut self, stage: M) -> Self
    where
        M: Middleware<S> + 'static,
    {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Append an already shared stage
    pub fn shared_middleware(mut self, stage: Arc<dyn Middleware<S>>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Build the store
    pub fn build(self) -> Result<Store<S>, StoreError> {
        Store::create(self.reducer, self.state, self.stages)
    }
}
