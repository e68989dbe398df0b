//! Test utilities for state-dispatch stores
//!
//! - [`TestHarness`]: a store with a recorder stage installed innermost, so
//!   tests can see exactly which plain actions reached the reducer
//! - Assertion macros for verifying dispatched action types
//!
//! # Example
//!
//! ```ignore
//! use state_dispatch::testing::TestHarness;
//! use state_dispatch::{assert_dispatched, Action, Store, ThunkMiddleware};
//!
//! let mut harness = TestHarness::new(Store::builder(reducer).middleware(ThunkMiddleware))?;
//!
//! harness.dispatch(say_now("Hi"))?;
//!
//! let actions = harness.drain_dispatched();
//! assert_dispatched!(actions, "SAY");
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::action::{Action, Dispatched, Envelope};
use crate::error::{DispatchError, StoreError};
use crate::middleware::{Middleware, Next};
use crate::store::{Store, StoreBuilder};

/// Stage that reports every action the store reduced
///
/// Actions are reported when their dispatch returns, so an action dispatched
/// from a subscriber is reported before the one that triggered it.
#[derive(Debug, Clone)]
pub struct RecorderMiddleware {
    tx: mpsc::UnboundedSender<Action>,
}

impl RecorderMiddleware {
    /// Create a recorder and the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Action>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl<S> Middleware<S> for RecorderMiddleware
where
    S: Send + Sync + 'static,
{
    fn handle(
        &self,
        _store: &Store<S>,
        envelope: Envelope<S>,
        next: Next<S>,
    ) -> Result<Dispatched, DispatchError> {
        let result = next.run(envelope)?;
        if let Dispatched::Action(action) = &result {
            let _ = self.tx.send(action.clone());
        }
        Ok(result)
    }
}

/// Store wrapper that records reduced actions.
///
/// The recorder is appended after every stage of the builder, so thunks and
/// promise actions are recorded only as the plain actions they expand to.
///
/// # Type Parameters
///
/// - `S`: The state type
pub struct TestHarness<S> {
    store: Store<S>,
    rx: mpsc::UnboundedReceiver<Action>,
}

impl<S> TestHarness<S>
where
    S: Send + Sync + 'static,
{
    /// Build the store with a recorder installed innermost
    pub fn new(builder: StoreBuilder<S>) -> Result<Self, StoreError> {
        let (recorder, rx) = RecorderMiddleware::channel();
        let store = builder.middleware(recorder).build()?;
        Ok(Self { store, rx })
    }

    /// The store under test
    pub fn store(&self) -> &Store<S> {
        &self.store
    }

    /// Current state
    pub fn state(&self) -> Arc<S> {
        self.store.get_state()
    }

    /// Dispatch through the full chain
    pub fn dispatch(&self, input: impl Into<Envelope<S>>) -> Result<Dispatched, DispatchError> {
        self.store.dispatch(input)
    }

    /// Drain all actions reduced so far.
    pub fn drain_dispatched(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        while let Ok(action) = self.rx.try_recv() {
            actions.push(action);
        }
        actions
    }

    /// Drain and return only the action types
    pub fn drain_kinds(&mut self) -> Vec<String> {
        self.drain_dispatched()
            .into_iter()
            .map(|action| action.kind().to_string())
            .collect()
    }

    /// Wait for the next reduced action, e.g. one dispatched by a timer
    ///
    /// Returns None if nothing arrives within `timeout`.
    pub async fn next_dispatched(&mut self, timeout: Duration) -> Option<Action> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }
}

/// Pause the tokio clock of the current runtime
#[cfg(any(test, feature = "testing-time"))]
pub fn pause_time() {
    tokio::time::pause();
}

/// Resume the tokio clock of the current runtime
#[cfg(any(test, feature = "testing-time"))]
pub fn resume_time() {
    tokio::time::resume();
}

/// Advance the paused clock, then let the tasks it woke run
///
/// Freshly spawned tasks get to start their timers first, so a thunk's
/// `sleep` counts from the current instant rather than the advanced one.
///
/// Timer deadlines are rounded up to the next millisecond tick, so the clock
/// moves one tick past `duration`. A sleep of exactly `duration` has fired
/// by the time this returns.
#[cfg(any(test, feature = "testing-time"))]
pub async fn advance_time(duration: Duration) {
    tokio::task::yield_now().await;
    tokio::time::advance(duration + TIMER_TICK).await;
    tokio::task::yield_now().await;
}

#[cfg(any(test, feature = "testing-time"))]
const TIMER_TICK: Duration = Duration::from_millis(1);

/// Assert that an action of the given type was dispatched.
///
/// # Example
///
/// ```ignore
/// let actions = harness.drain_dispatched();
/// assert_dispatched!(actions, "GET_TIME_REQUEST");
/// ```
#[macro_export]
macro_rules! assert_dispatched {
    ($actions:expr, $kind:expr) => {
        assert!(
            $actions.iter().any(|a| a.kind() == $kind),
            "Expected action `{}` to be dispatched, but got: {:?}",
            $kind,
            $actions.iter().map(|a| a.kind()).collect::<Vec<_>>()
        );
    };
}

/// Assert that no action of the given type was dispatched.
///
/// # Example
///
/// ```ignore
/// let actions = harness.drain_dispatched();
/// assert_not_dispatched!(actions, "GET_TIME_SUCCESS");
/// ```
#[macro_export]
macro_rules! assert_not_dispatched {
    ($actions:expr, $kind:expr) => {
        assert!(
            !$actions.iter().any(|a| a.kind() == $kind),
            "Expected action `{}` NOT to be dispatched, but it was: {:?}",
            $kind,
            $actions.iter().map(|a| a.kind()).collect::<Vec<_>>()
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::ReducerResult;
    use crate::thunk::{Thunk, ThunkMiddleware};

    fn counter(state: Option<&i64>, action: &Action) -> ReducerResult<i64> {
        let count = state.copied().unwrap_or(0);
        Ok(Some(if action.kind() == "INCREMENT" { count + 1 } else { count }))
    }

    #[test]
    fn test_harness_records_reduced_actions() {
        let mut harness = TestHarness::new(Store::builder(counter)).unwrap();
        harness.dispatch(Action::new("INCREMENT")).unwrap();
        harness.dispatch(Action::new("NOOP")).unwrap();

        let actions = harness.drain_dispatched();
        assert_dispatched!(actions, "INCREMENT");
        assert_dispatched!(actions, "NOOP");
        assert_not_dispatched!(actions, "DECREMENT");
        assert_eq!(*harness.state(), 1);
        assert!(harness.drain_dispatched().is_empty());
    }

    #[test]
    fn test_harness_records_expansions_not_thunks() {
        let mut harness =
            TestHarness::new(Store::builder(counter).middleware(ThunkMiddleware)).unwrap();

        harness
            .dispatch(Thunk::new(|store: &Store<i64>| {
                store.dispatch(Action::new("INCREMENT"))?;
                store.dispatch(Action::new("INCREMENT"))
            }))
            .unwrap();

        assert_eq!(harness.drain_kinds(), vec!["INCREMENT", "INCREMENT"]);
    }

    #[test]
    fn test_failed_dispatch_is_not_recorded() {
        let mut harness = TestHarness::new(Store::builder(counter)).unwrap();
        assert!(harness.dispatch(serde_json::json!({ "no": "type" })).is_err());
        assert!(harness.drain_dispatched().is_empty());
    }

    fn increment_after(delay: Duration) -> Thunk<i64> {
        Thunk::effect(move |store: &Store<i64>| {
            let store = store.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = store.dispatch(Action::new("INCREMENT"));
            });
        })
    }

    #[tokio::test]
    async fn test_advance_time_fires_delayed_thunk() {
        let mut harness =
            TestHarness::new(Store::builder(counter).middleware(ThunkMiddleware)).unwrap();
        pause_time();

        harness.dispatch(increment_after(Duration::from_secs(2))).unwrap();

        advance_time(Duration::from_millis(1500)).await;
        assert_eq!(*harness.state(), 0);
        assert!(harness.drain_kinds().is_empty());

        advance_time(Duration::from_millis(500)).await;
        assert_eq!(harness.drain_kinds(), vec!["INCREMENT"]);
        resume_time();
    }

    #[tokio::test(start_paused = true)]
    async fn test_advance_by_exact_delay_fires_thunk() {
        let mut harness =
            TestHarness::new(Store::builder(counter).middleware(ThunkMiddleware)).unwrap();
        assert_eq!(harness.store().stage_count(), 2);

        harness.dispatch(increment_after(Duration::from_secs(2))).unwrap();
        advance_time(Duration::from_secs(2)).await;

        assert_eq!(harness.drain_kinds(), vec!["INCREMENT"]);
        assert_eq!(*harness.state(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_dispatched_times_out() {
        let mut harness = TestHarness::new(Store::builder(counter)).unwrap();
        assert!(harness
            .next_dispatched(Duration::from_millis(10))
            .await
            .is_none());
    }
}
