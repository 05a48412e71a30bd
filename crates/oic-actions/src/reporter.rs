//! Progress reporting for a build
//!
//! Actions never print directly. They hand [`Event`]s to the
//! [`Reporter`] carried by the build context, which decides where the
//! messages go: the tracing subscriber in the CLI, a vector in tests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// Importance of a reported event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Only shown in verbose mode (commands, file lists)
    Debug,
    Info,
    /// Start of a pipeline step
    Action,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Action => "action",
            Level::Warn => "warn",
            Level::Error => "error",
        };
        f.write_str(s)
    }
}

/// A message emitted during the build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub level: Level,
    pub message: String,
}

impl Event {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(Level::Debug, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    pub fn action(message: impl Into<String>) -> Self {
        Self::new(Level::Action, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(Level::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }
}

/// Sink for build events
pub trait Reporter: Send + Sync {
    fn report(&self, event: Event);
}

/// Discards every event
#[derive(Debug, Default, Clone)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&self, _event: Event) {}
}

/// Keeps every event for later inspection
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<Event>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Messages reported at `level`, in order
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.level == level)
            .map(|e| e.message)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Reporter for CollectingReporter {
    fn report(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Forwards events to `tracing`
///
/// Action lines are prefixed with `⯈` and, when `color` is set,
/// highlighted so the pipeline steps stand out in the log.
#[derive(Debug, Default, Clone)]
pub struct TracingReporter {
    color: bool,
}

impl TracingReporter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }
}

impl Reporter for TracingReporter {
    fn report(&self, event: Event) {
        match event.level {
            Level::Debug => tracing::debug!("{}", self.paint("90", &event.message)),
            Level::Info => tracing::info!("{}", event.message),
            Level::Action => {
                tracing::info!("{}", self.paint("1;34", &format!("⯈ {}", event.message)))
            }
            Level::Warn => tracing::warn!("{}", self.paint("33", &event.message)),
            Level::Error => tracing::error!("{}", self.paint("1;31", &event.message)),
        }
    }
}
