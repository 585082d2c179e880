use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::models::Platform;
use crate::orchestrator::UpsertOutcome;

/// Maximum number of events retained in the ring buffer.
const EVENT_LOG_CAPACITY: usize = 200;

/// A typed event from the detection/save/sync pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugEvent {
    SessionChanged {
        active: bool,
    },
    TitleEmitted {
        platform: Platform,
        title: String,
    },
    RelayFailed {
        title: String,
        message: String,
    },
    Saved {
        platform: Platform,
        title: String,
        outcome: UpsertOutcome,
    },
    CoverLookup {
        title: String,
        found: bool,
    },
    SyncPushed {
        title: String,
        created: bool,
    },
    Reconciled {
        added: usize,
        updated: usize,
    },
    Error {
        source: String,
        message: String,
    },
}

impl fmt::Display for DebugEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionChanged { active: true } => write!(f, "session active"),
            Self::SessionChanged { active: false } => write!(f, "session inactive"),
            Self::TitleEmitted { platform, title } => write!(f, "detected \"{title}\" on {platform}"),
            Self::RelayFailed { title, message } => write!(f, "relay failed for \"{title}\": {message}"),
            Self::Saved {
                platform,
                title,
                outcome,
            } => write!(
                f,
                "saved \"{title}\" ({platform}), views: {}",
                outcome.view_count()
            ),
            Self::CoverLookup { title, found } => {
                let result = if *found { "found" } else { "none" };
                write!(f, "cover for \"{title}\": {result}")
            }
            Self::SyncPushed { title, created } => {
                let verb = if *created { "created" } else { "updated" };
                write!(f, "remote {verb} \"{title}\"")
            }
            Self::Reconciled { added, updated } => {
                write!(f, "reconciled: {added} added, {updated} updated")
            }
            Self::Error { source, message } => write!(f, "{source}: {message}"),
        }
    }
}

/// A timestamped event entry.
pub type EventEntry = (DateTime<Utc>, DebugEvent);

/// Bounded ring buffer of debug events.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<EventEntry>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(EVENT_LOG_CAPACITY),
        }
    }

    /// Push a new event, evicting the oldest if at capacity.
    pub fn push(&mut self, event: DebugEvent) {
        if self.entries.len() >= EVENT_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back((Utc::now(), event));
    }

    /// Return a snapshot of all entries (newest last).
    pub fn snapshot(&self) -> Vec<EventEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Thread-safe handle to the event log.
pub type SharedEventLog = Arc<Mutex<EventLog>>;

/// Create a new shared event log.
pub fn shared_event_log() -> SharedEventLog {
    Arc::new(Mutex::new(EventLog::new()))
}

/// Push onto a shared log, tolerating a poisoned lock.
pub fn record(log: &SharedEventLog, event: DebugEvent) {
    log.lock().unwrap_or_else(|e| e.into_inner()).push(event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut log = EventLog::new();
        for i in 0..(EVENT_LOG_CAPACITY + 5) {
            log.push(DebugEvent::Reconciled {
                added: i,
                updated: 0,
            });
        }
        assert_eq!(log.len(), EVENT_LOG_CAPACITY);
        let first = &log.snapshot()[0].1;
        assert_eq!(
            *first,
            DebugEvent::Reconciled {
                added: 5,
                updated: 0
            }
        );
    }

    #[test]
    fn display_is_readable() {
        let event = DebugEvent::Saved {
            platform: Platform::Hbo,
            title: "Dune".into(),
            outcome: UpsertOutcome::Updated { view_count: 3 },
        };
        assert_eq!(event.to_string(), "saved \"Dune\" (hbo), views: 3");
    }

    #[test]
    fn shared_log_records() {
        let log = shared_event_log();
        record(&log, DebugEvent::SessionChanged { active: true });
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
