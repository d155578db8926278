//! Host log capture and the snapshot reader behind `console-read`.
//!
//! The host owns a bounded [`ConsoleRing`] and pushes entries into it from
//! whatever thread logs. Readers take immutable [`ConsoleSnapshot`] values;
//! summary counts always describe the whole ring, while the returned entries
//! honour the requested limit and level filter.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Default ring capacity.
pub const DEFAULT_CAPACITY: usize = 2000;
/// Entries returned when the caller gives no limit.
pub const DEFAULT_LIMIT: usize = 100;
/// Largest limit honoured by a snapshot.
pub const MAX_LIMIT: usize = 1000;

/// Severity of a console entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Informational output.
    Log,
    /// Warning output.
    Warning,
    /// Errors, exceptions and assertions.
    Error,
}

/// Level filter accepted by `console-read`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelFilter {
    /// Keep every entry.
    #[default]
    All,
    /// Only [`LogLevel::Log`].
    Log,
    /// Only [`LogLevel::Warning`].
    Warning,
    /// Only [`LogLevel::Error`].
    Error,
}

impl LevelFilter {
    const fn admits(self, level: LogLevel) -> bool {
        matches!(
            (self, level),
            (Self::All, _)
                | (Self::Log, LogLevel::Log)
                | (Self::Warning, LogLevel::Warning)
                | (Self::Error, LogLevel::Error)
        )
    }
}

/// One captured log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleEntry {
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
}

impl ConsoleEntry {
    /// Entry with only a level and a message.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            file: None,
            line: None,
            stacktrace: None,
        }
    }
}

/// Read access to the host's log ring.
pub trait LogSource {
    /// Every retained entry, oldest first.
    fn entries(&self) -> Vec<ConsoleEntry>;
}

/// Bounded FIFO of console entries; the oldest entry is evicted when full.
#[derive(Debug)]
pub struct ConsoleRing {
    capacity: usize,
    entries: VecDeque<ConsoleEntry>,
}

impl ConsoleRing {
    /// Ring holding at most `capacity` entries (minimum one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Adds an entry, evicting the oldest when full.
    pub fn push(&mut self, entry: ConsoleEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ConsoleRing {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

/// Shared handle to a [`ConsoleRing`], cloneable across threads.
#[derive(Debug, Clone, Default)]
pub struct ConsoleHandle {
    ring: Arc<Mutex<ConsoleRing>>,
}

impl ConsoleHandle {
    /// Handle over a fresh ring of `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: Arc::new(Mutex::new(ConsoleRing::with_capacity(capacity))),
        }
    }

    /// Pushes an entry.
    pub fn push(&self, entry: ConsoleEntry) {
        self.ring
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Pushes a plain message.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.push(ConsoleEntry::new(level, message));
    }
}

impl LogSource for ConsoleHandle {
    fn entries(&self) -> Vec<ConsoleEntry> {
        self.ring
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .cloned()
            .collect()
    }
}

/// Counts over the whole ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsoleSummary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub logs: usize,
}

/// Immutable result of [`snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleSnapshot {
    pub summary: ConsoleSummary,
    pub entries: Vec<ConsoleEntry>,
}

/// Takes the `limit` most recent entries, then filters them by level.
///
/// `limit` defaults to [`DEFAULT_LIMIT`] and is clamped to `1..=MAX_LIMIT`.
pub fn snapshot(
    source: &dyn LogSource,
    limit: Option<usize>,
    filter: LevelFilter,
) -> ConsoleSnapshot {
    let all = source.entries();
    let mut summary = ConsoleSummary {
        total: all.len(),
        ..ConsoleSummary::default()
    };
    for entry in &all {
        match entry.level {
            LogLevel::Error => summary.errors += 1,
            LogLevel::Warning => summary.warnings += 1,
            LogLevel::Log => summary.logs += 1,
        }
    }
    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let start = all.len().saturating_sub(limit);
    let entries = all
        .into_iter()
        .skip(start)
        .filter(|entry| filter.admits(entry.level))
        .collect();
    ConsoleSnapshot { summary, entries }
}

/// `tracing` layer that mirrors events into a [`ConsoleHandle`].
#[derive(Debug, Clone)]
pub struct ConsoleLayer {
    console: ConsoleHandle,
}

impl ConsoleLayer {
    /// Layer feeding `console`.
    #[must_use]
    pub fn new(console: ConsoleHandle) -> Self {
        Self { console }
    }
}

impl<S: Subscriber> Layer<S> for ConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = match *metadata.level() {
            Level::ERROR => LogLevel::Error,
            Level::WARN => LogLevel::Warning,
            _ => LogLevel::Log,
        };
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.console.push(ConsoleEntry {
            level,
            message: visitor.finish(metadata.target()),
            file: metadata.file().map(str::to_owned),
            line: metadata.line(),
            stacktrace: None,
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self, target: &str) -> String {
        let mut rendered = self.message.unwrap_or_else(|| target.to_owned());
        for field in self.fields {
            rendered.push(' ');
            rendered.push_str(&field);
        }
        rendered
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_owned());
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }
}
