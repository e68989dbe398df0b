//! Selector subscriptions
//!
//! A view layer usually cares about a projection of the state, not every
//! dispatch. [`Store::watch`] runs a selector after each notification and
//! only calls back when the selected value changed. It is built entirely on
//! `subscribe` and `get_state`.

use std::sync::{Mutex, PoisonError};

use crate::store::{Store, Subscription};

impl<S> Store<S>
where
    S: Send + Sync + 'static,
{
    /// Call `on_change` whenever `selector(state)` changes
    ///
    /// The selector runs once immediately to record the starting value;
    /// `on_change` is not called for it.
    ///
    /// # Example
    /// ```
    /// use state_dispatch_core::{Action, ReducerResult, Store};
    /// use std::sync::{Arc, Mutex};
    ///
    /// fn counter(state: Option<&i64>, action: &Action) -> ReducerResult<i64> {
    ///     let count = state.copied().unwrap_or(0);
    ///     Ok(Some(if action.kind() == "INCREMENT" { count + 1 } else { count }))
    /// }
    ///
    /// let store = Store::new(counter).unwrap();
    /// let parity = Arc::new(Mutex::new(Vec::new()));
    /// let seen = parity.clone();
    /// store.watch(|count| count % 2 == 0, move |even| seen.lock().unwrap().push(*even));
    ///
    /// store.dispatch(Action::new("INCREMENT")).unwrap();
    /// store.dispatch(Action::new("NOTHING")).unwrap();
    /// store.dispatch(Action::new("INCREMENT")).unwrap();
    /// assert_eq!(*parity.lock().unwrap(), vec![false, true]);
    /// ```
    pub fn watch<T, F, C>(&self, selector: F, on_change: C) -> Subscription
    where
        T: PartialEq + Clone + Send + 'static,
        F: Fn(&S) -> T + Send + Sync + 'static,
        C: Fn(&T) + Send + Sync + 'static,
    {
        let last = Mutex::new(selector(&self.get_state()));
        let store = self.downgrade();

        self.subscribe(move || {
            let Some(store) = store.upgrade() else {
                return;
            };
            let selected = selector(&store.get_state());
            let changed = {
                let mut last = last.lock().unwrap_or_else(PoisonError::into_inner);
                if *last == selected {
                    false
                } else {
                    *last = selected.clone();
                    true
                }
            };
            // Lock released: the callback may dispatch and re-enter this watcher
            if changed {
                on_change(&selected);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::action::Action;
    use crate::reducer::{combine_reducers, ReducerMap, ReducerResult};
    use crate::store::Store;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn connect(state: Option<&Value>, action: &Action) -> ReducerResult<Value> {
        let mut state = state.cloned().unwrap_or_else(|| json!({}));
        if action.kind() == "CONNECT" {
            state["logged"] = json!(true);
        }
        Ok(Some(state))
    }

    fn profile(state: Option<&Value>, action: &Action) -> ReducerResult<Value> {
        let mut state = state.cloned().unwrap_or_else(|| json!({}));
        if action.kind() == "PROFILE" {
            state["description"] = json!("test desc");
        }
        Ok(Some(state))
    }

    fn store() -> Store<Value> {
        Store::new(combine_reducers(
            ReducerMap::new()
                .slice("connect", connect)
                .slice("profile", profile),
        ))
        .unwrap()
    }

    #[test]
    fn test_watch_ignores_unrelated_changes() {
        let store = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        store.watch(
            |state: &Value| state["connect"].clone(),
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
        );

        store.dispatch(Action::new("PROFILE")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        store.dispatch(Action::new("CONNECT")).unwrap();
        store.dispatch(Action::new("CONNECT")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_watch_callback_may_dispatch() {
        let store = store();
        let handle = store.downgrade();
        store.watch(
            |state: &Value| state["connect"]["logged"] == true,
            move |logged| {
                if *logged {
                    if let Some(store) = handle.upgrade() {
                        store.dispatch(Action::new("PROFILE")).unwrap();
                    }
                }
            },
        );

        store.dispatch(Action::new("CONNECT")).unwrap();
        assert_eq!(store.get_state()["profile"]["description"], "test desc");
    }

    #[test]
    fn test_unsubscribed_watch_stops() {
        let store = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let subscription = store.watch(
            |state: &Value| state["profile"].clone(),
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
        );
        subscription.unsubscribe();

        store.dispatch(Action::new("PROFILE")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.subscriber_count(), 0);
    }
}
