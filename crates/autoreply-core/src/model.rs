//! Value types shared by the merger, the reconciler and the ports.
//!
//! Everything here is created fresh for a single run and never mutated after
//! construction.

use std::fmt;

use chrono::DateTime;
use chrono_tz::Tz;

use crate::error::{AutoReplyError, Result};

/// A point in time, carried in the mailbox's time zone.
///
/// Ordering and equality compare the absolute instant, so values in different
/// zones still compare correctly; the zone only matters for display and for the
/// wall-clock times sent back to the mailbox.
pub type Instant = DateTime<Tz>;

/// Stable identity of a calendar event, used to deduplicate query results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        EventId(id.into())
    }

    /// Structural identity for providers that do not expose an event id.
    pub fn fingerprint(subject: &str, start: &Instant, end: &Instant) -> Self {
        EventId(format!(
            "{}|{}|{}",
            subject,
            start.to_rfc3339(),
            end.to_rfc3339()
        ))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One all-day calendar entry matching the absence keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsenceEvent {
    pub id: EventId,
    pub start: Instant,
    pub end: Instant,
}

impl AbsenceEvent {
    pub fn new(id: EventId, start: Instant, end: Instant) -> Self {
        Self { id, start, end }
    }
}

/// The continuous span covered by one or more chained absence events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VacationPeriod {
    start: Instant,
    end: Instant,
}

impl VacationPeriod {
    /// Build a period, rejecting `start > end`.
    pub fn new(start: Instant, end: Instant) -> Result<Self> {
        if start > end {
            return Err(AutoReplyError::InvalidPeriod {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn end(&self) -> Instant {
        self.end
    }
}

/// Internal and external reply bodies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplyMessages {
    pub internal: String,
    pub external: String,
}

/// The mailbox's automatic-reply configuration as read before reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoReplyState {
    Disabled,
    AlwaysEnabled,
    Scheduled {
        start: Instant,
        end: Instant,
        internal_message: String,
        external_message: String,
    },
}

impl AutoReplyState {
    /// Graph's name for the status, used in log output.
    pub fn status_name(&self) -> &'static str {
        match self {
            AutoReplyState::Disabled => "disabled",
            AutoReplyState::AlwaysEnabled => "alwaysEnabled",
            AutoReplyState::Scheduled { .. } => "scheduled",
        }
    }
}

/// A scheduled automatic reply to be written to the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledReply {
    pub start: Instant,
    pub end: Instant,
    pub messages: ReplyMessages,
}

/// Outcome of reconciling the mailbox state against a vacation period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    NoOp,
    Update(ScheduledReply),
}
