//! Clock - state-dispatch example
//!
//! Walks one store through both kinds of async action:
//! 1. A thunk that says something after a delay
//! 2. A promise action that reads the clock: REQUEST, then SUCCESS or FAILURE
//!
//! Every state change is printed by a subscriber, the way a rendering layer
//! would redraw.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p clock-demo
//!
//! # Make the clock read fail, and log every action
//! cargo run -p clock-demo -- --fail --verbose
//! ```

mod reducer;

use std::error::Error;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use serde_json::{json, Value};
use state_dispatch::prelude::*;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::reducer::{reducer, GET_TIME_FAILURE, GET_TIME_REQUEST, GET_TIME_SUCCESS, SAY};

/// Clock - thunk and promise actions with state-dispatch
#[derive(Parser, Debug)]
#[command(name = "clock")]
#[command(about = "Dispatch a delayed message and a clock read through middleware")]
struct Args {
    /// Message the delayed thunk says
    #[arg(long, short, default_value = "Hi")]
    message: String,

    /// Delay before the message is said, in milliseconds
    #[arg(long, short, default_value = "2000")]
    delay_ms: u64,

    /// Make the clock read fail
    #[arg(long)]
    fail: bool,

    /// Log every action
    #[arg(long, short)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "info,state_dispatch_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

/// Says `message` once `delay` has passed
fn say_later(message: String, delay: Duration) -> Thunk<Value> {
    Thunk::effect(move |store: &Store<Value>| {
        let store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = store.dispatch(Action::new(SAY).with("message", message)) {
                tracing::error!(error = %err, "delayed message failed");
            }
        });
    })
}

/// Reads the wall clock as UTC `HH:MM:SS.mmm`
async fn read_clock(fail: bool) -> Result<Value, Value> {
    tokio::time::sleep(Duration::from_millis(500)).await;
    if fail {
        return Err(json!({ "message": "clock unavailable" }));
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| json!({ "message": err.to_string() }))?;
    let seconds = now.as_secs() % 86_400;
    Ok(json!({
        "time": format!(
            "{:02}:{:02}:{:02}.{:03}",
            seconds / 3600,
            seconds % 3600 / 60,
            seconds % 60,
            now.subsec_millis()
        )
    }))
}

fn get_time(fail: bool) -> PromiseAction {
    PromiseAction::new(
        [GET_TIME_REQUEST, GET_TIME_SUCCESS, GET_TIME_FAILURE],
        move || read_clock(fail),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let logger = ActionLoggerMiddleware::with_default_log().active(args.verbose);
    let log = logger.log();

    let store = Store::builder(reducer())
        .middleware(logger)
        .middleware(ThunkMiddleware)
        .middleware(PromiseMiddleware)
        .build()?;

    // Redraw on every change
    let render = store.downgrade();
    let subscription = store.subscribe(move || {
        if let Some(store) = render.upgrade() {
            println!("{}", store.get_state());
        }
    });

    // Wake main once the message shows up
    let (said_tx, mut said_rx) = mpsc::unbounded_channel();
    let said = store.watch(
        |state: &Value| state["speaker"]["message"].clone(),
        move |message| {
            if !message.is_null() {
                let _ = said_tx.send(message.clone());
            }
        },
    );

    store.dispatch(say_later(args.message, Duration::from_millis(args.delay_ms)))?;

    let pending = store
        .dispatch(get_time(args.fail))?
        .into_pending()
        .ok_or("clock read was not expanded by the promise stage")?;
    match pending.await? {
        Settlement::Resolved(result) => tracing::info!(%result, "clock read"),
        Settlement::Rejected(error) => tracing::warn!(%error, "clock read failed"),
    }

    if let Some(message) = said_rx.recv().await {
        tracing::info!(%message, "message said");
    }

    said.unsubscribe();
    subscription.unsubscribe();

    if let Some(log) = log.filter(|_| args.verbose) {
        let log = log.lock().map_err(|_| "action log poisoned")?;
        for entry in log.recent(10) {
            println!("{:>8} #{} {}", entry.elapsed_display(), entry.sequence, entry.summary);
        }
    }

    Ok(())
}
