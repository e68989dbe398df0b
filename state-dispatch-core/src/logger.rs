//! Action logging with pattern-based filtering and in-memory storage
//!
//! Provides configurable action logging using glob patterns to include/exclude
//! specific action types. Supports both tracing output and an in-memory
//! ring buffer that hosts and tests can read while the stage is installed.
//!
//! # Example
//!
//! ```ignore
//! use state_dispatch_core::logger::{ActionLogConfig, ActionLoggerConfig, ActionLoggerMiddleware};
//!
//! // Log everything except ticks (tracing only)
//! let config = ActionLoggerConfig::new(None, Some("TICK"));
//! let middleware = ActionLoggerMiddleware::new(config);
//!
//! // Log with in-memory storage
//! let middleware = ActionLoggerMiddleware::with_log(ActionLogConfig::default());
//! let log = middleware.log().unwrap();
//! let store = Store::builder(reducer).middleware(middleware).build()?;
//!
//! for entry in log.lock().unwrap().recent(10) {
//!     println!("{}: {}", entry.elapsed_display(), entry.summary);
//! }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::action::{Dispatched, Envelope};
use crate::error::DispatchError;
use crate::middleware::{Middleware, Next};
use crate::store::Store;

/// Configuration for action logging with glob pattern filtering.
///
/// Patterns support:
/// - `*` matches any sequence of characters
/// - `?` matches any single character
/// - Literal text matches exactly
///
/// # Examples
///
/// - `GET_TIME_*` matches GET_TIME_REQUEST, GET_TIME_SUCCESS, etc.
/// - `*_FAILURE` matches every failure action
/// - `SAY` matches only SAY
#[derive(Debug, Clone)]
pub struct ActionLoggerConfig {
    /// If non-empty, only log actions matching these patterns
    pub include_patterns: Vec<String>,
    /// Exclude actions matching these patterns (applied after include)
    pub exclude_patterns: Vec<String>,
}

fn default_excludes() -> Vec<String> {
    vec![format!("{}*", crate::action::RESERVED_PREFIX)]
}

impl Default for ActionLoggerConfig {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: default_excludes(),
        }
    }
}

impl ActionLoggerConfig {
    /// Create a new config from comma-separated pattern strings
    ///
    /// # Arguments
    /// - `include`: comma-separated glob patterns (or None for all)
    /// - `exclude`: comma-separated glob patterns (or None for default excludes)
    ///
    /// # Example
    /// ```
    /// use state_dispatch_core::logger::ActionLoggerConfig;
    ///
    /// let config = ActionLoggerConfig::new(Some("GET_TIME_*,SAY"), Some("*_FAILURE"));
    /// assert!(config.should_log("GET_TIME_REQUEST"));
    /// assert!(config.should_log("SAY"));
    /// assert!(!config.should_log("GET_TIME_FAILURE"));
    /// assert!(!config.should_log("ADD_ITEM"));
    /// ```
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        let include_patterns = include.map(split_patterns).unwrap_or_default();
        let exclude_patterns = exclude
            .map(split_patterns)
            .unwrap_or_else(default_excludes);

        Self {
            include_patterns,
            exclude_patterns,
        }
    }

    /// Create a config with specific pattern vectors
    pub fn with_patterns(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include_patterns: include,
            exclude_patterns: exclude,
        }
    }

    /// Check if an action type should be logged based on include/exclude patterns
    pub fn should_log(&self, kind: &str) -> bool {
        if !self.include_patterns.is_empty()
            && !self.include_patterns.iter().any(|p| glob_match(p, kind))
        {
            return false;
        }

        !self.exclude_patterns.iter().any(|p| glob_match(p, kind))
    }
}

fn split_patterns(patterns: &str) -> Vec<String> {
    patterns
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// In-Memory Action Log
// ============================================================================

/// An entry in the action log
#[derive(Debug, Clone)]
pub struct ActionLogEntry {
    /// Action type, or the envelope label for thunks and promise actions
    pub kind: String,
    /// Summary representation of the whole input
    pub summary: String,
    /// Timestamp when the action was logged
    pub timestamp: Instant,
    /// Sequence number for ordering
    pub sequence: u64,
    /// Whether dispatch succeeded (set after the rest of the chain ran)
    pub succeeded: Option<bool>,
}

impl ActionLogEntry {
    /// Create a new log entry
    pub fn new(kind: String, summary: String, sequence: u64) -> Self {
        Self {
            kind,
            summary,
            timestamp: Instant::now(),
            sequence,
            succeeded: None,
        }
    }

    /// Time since this action was logged
    pub fn elapsed(&self) -> std::time::Duration {
        self.timestamp.elapsed()
    }

    /// Format the elapsed time for display (e.g., "2.3s", "150ms")
    pub fn elapsed_display(&self) -> String {
        let elapsed = self.elapsed();
        if elapsed.as_secs() >= 1 {
            format!("{:.1}s", elapsed.as_secs_f64())
        } else {
            format!("{}ms", elapsed.as_millis())
        }
    }
}

/// Configuration for the action log ring buffer
#[derive(Debug, Clone)]
pub struct ActionLogConfig {
    /// Maximum number of entries to keep
    pub capacity: usize,
    /// Filter config
    pub filter: ActionLoggerConfig,
}

impl Default for ActionLogConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            filter: ActionLoggerConfig::default(),
        }
    }
}

impl ActionLogConfig {
    /// Create with custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Create with custom capacity and filter
    pub fn new(capacity: usize, filter: ActionLoggerConfig) -> Self {
        Self { capacity, filter }
    }
}

/// In-memory ring buffer for storing recent actions
///
/// Older entries are automatically discarded when capacity is reached.
#[derive(Debug, Clone)]
pub struct ActionLog {
    entries: VecDeque<ActionLogEntry>,
    config: ActionLogConfig,
    next_sequence: u64,
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new(ActionLogConfig::default())
    }
}

impl ActionLog {
    /// Create a new action log with configuration
    pub fn new(config: ActionLogConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.capacity),
            config,
            next_sequence: 0,
        }
    }

    /// Record an entry if it passes the filter
    ///
    /// Returns the entry's sequence number, or None if filtered out.
    pub fn record(&mut self, kind: &str, summary: String) -> Option<u64> {
        if self.config.capacity == 0 || !self.config.filter.should_log(kind) {
            return None;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if self.entries.len() >= self.config.capacity {
            self.entries.pop_front();
        }
        self.entries
            .push_back(ActionLogEntry::new(kind.to_string(), summary, sequence));
        Some(sequence)
    }

    /// Mark whether the entry with `sequence` was dispatched successfully
    ///
    /// Does nothing if the entry has already been evicted.
    pub fn set_outcome(&mut self, sequence: u64, succeeded: bool) {
        if let Some(entry) = self.entries.iter_mut().rev().find(|e| e.sequence == sequence) {
            entry.succeeded = Some(succeeded);
        }
    }

    /// Get all entries (oldest first)
    pub fn entries(&self) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter()
    }

    /// Get recent entries (newest first)
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter().rev().take(count)
    }

    /// Logged action types, oldest first
    pub fn kinds(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.kind.clone()).collect()
    }

    /// Number of entries currently stored
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Get the config
    pub fn config(&self) -> &ActionLogConfig {
        &self.config
    }
}

/// Shared handle to an [`ActionLog`]
pub type SharedActionLog = Arc<Mutex<ActionLog>>;

fn lock_log(log: &SharedActionLog) -> MutexGuard<'_, ActionLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Middleware
// ============================================================================

/// Middleware that logs inputs with configurable pattern filtering.
///
/// Supports two modes:
/// - **Tracing only** (default): logs via `tracing::debug!()`
/// - **With storage**: also stores in an [`ActionLog`] ring buffer
///
/// Install it first to see thunks and promise actions before they are
/// interpreted, or last to see only the plain actions reaching the store.
#[derive(Debug, Clone)]
pub struct ActionLoggerMiddleware {
    config: ActionLoggerConfig,
    log: Option<SharedActionLog>,
    /// When false, the stage only forwards
    active: bool,
}

impl ActionLoggerMiddleware {
    /// Create a new action logger middleware with tracing only (no in-memory storage)
    pub fn new(config: ActionLoggerConfig) -> Self {
        Self {
            config,
            log: None,
            active: true,
        }
    }

    /// Create middleware with in-memory storage
    pub fn with_log(config: ActionLogConfig) -> Self {
        Self {
            config: config.filter.clone(),
            log: Some(Arc::new(Mutex::new(ActionLog::new(config)))),
            active: true,
        }
    }

    /// Create with default config and in-memory storage
    pub fn with_default_log() -> Self {
        Self::with_log(ActionLogConfig::default())
    }

    /// Create with no filtering (logs all actions), tracing only
    pub fn log_all() -> Self {
        Self::new(ActionLoggerConfig::with_patterns(vec![], vec![]))
    }

    /// Set whether the middleware is active.
    ///
    /// ```ignore
    /// let middleware = ActionLoggerMiddleware::with_default_log().active(args.verbose);
    /// ```
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Check if the middleware is active.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Shared handle to the action log (if storage is enabled)
    pub fn log(&self) -> Option<SharedActionLog> {
        self.log.clone()
    }

    /// Get a reference to the config
    pub fn config(&self) -> &ActionLoggerConfig {
        &self.config
    }
}

impl<S> Middleware<S> for ActionLoggerMiddleware
where
    S: Send + Sync + 'static,
{
    fn handle(
        &self,
        _store: &Store<S>,
        envelope: Envelope<S>,
        next: Next<S>,
    ) -> Result<Dispatched, DispatchError> {
        if !self.active {
            return next.run(envelope);
        }

        let kind = envelope.label();
        if self.config.should_log(&kind) {
            tracing::debug!(action = %kind, "action");
        }

        // The lock is released before the chain continues; nested
        // dispatches record their own entries.
        let sequence = self
            .log
            .as_ref()
            .and_then(|log| lock_log(log).record(&kind, summarize(&envelope)));

        let result = next.run(envelope);

        if let (Some(log), Some(sequence)) = (&self.log, sequence) {
            lock_log(log).set_outcome(sequence, result.is_ok());
        }
        result
    }
}

fn summarize<S>(envelope: &Envelope<S>) -> String {
    match envelope {
        Envelope::Plain(action) => action.to_string(),
        Envelope::Object(value) => value.to_string(),
        Envelope::Thunk(_) => "<thunk>".to_string(),
        Envelope::Promise(promise) => format!("<promise {:?}>", promise.types()),
    }
}

/// Simple glob pattern matching supporting `*` and `?`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    glob_match_impl(&pattern, &text)
}

fn glob_match_impl(pattern: &[char], text: &[char]) -> bool {
    let mut pi = 0;
    let mut ti = 0;
    let mut star_pi = None;
    let mut star_ti = 0;

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star_pi = Some(pi);
            star_ti = ti;
            pi += 1;
        } else if let Some(spi) = star_pi {
            pi = spi + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }

    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }

    pi == pattern.len()
}
