//! Reducers for the clock demo

use serde_json::{json, Value};
use state_dispatch::prelude::*;

pub const SAY: &str = "SAY";
pub const GET_TIME_REQUEST: &str = "GET_TIME_REQUEST";
pub const GET_TIME_SUCCESS: &str = "GET_TIME_SUCCESS";
pub const GET_TIME_FAILURE: &str = "GET_TIME_FAILURE";

/// Last message said
fn speaker(state: Option<&Value>, action: &Action) -> ReducerResult<Value> {
    let mut state = state.cloned().unwrap_or_else(|| json!({ "message": null }));
    if action.kind() == SAY {
        state["message"] = action.get("message").cloned().unwrap_or(Value::Null);
    }
    Ok(Some(state))
}

/// Clock reading; `frozen` while a request is in flight
fn time(state: Option<&Value>, action: &Action) -> ReducerResult<Value> {
    let mut state = state
        .cloned()
        .unwrap_or_else(|| json!({ "frozen": false, "time": null, "error": null }));
    match action.kind() {
        GET_TIME_REQUEST => state["frozen"] = json!(true),
        GET_TIME_SUCCESS => {
            state["frozen"] = json!(false);
            state["error"] = Value::Null;
            state["time"] = action
                .get("result")
                .and_then(|result| result.get("time"))
                .cloned()
                .unwrap_or(Value::Null);
        }
        GET_TIME_FAILURE => {
            state["frozen"] = json!(false);
            state["error"] = action.get("error").cloned().unwrap_or(Value::Null);
        }
        _ => {}
    }
    Ok(Some(state))
}

pub fn reducer() -> CombinedReducer {
    combine_reducers(
        ReducerMap::new()
            .slice("speaker", speaker)
            .slice("time", time),
    )
}
