//! Traits implemented by the calendar, mailbox and rendering collaborators.

use crate::error::Result;
use crate::model::{AbsenceEvent, AutoReplyState, Instant, ReplyMessages, ScheduledReply};

/// A calendar-view query for absence events.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery<'a> {
    pub start: Instant,
    pub end: Instant,
    /// Subject the events must match exactly.
    pub subject: &'a str,
    /// Maximum number of events to return.
    pub top: usize,
}

/// Calendar lookup of all-day absence events.
///
/// Implementations return events sorted by start ascending, with instants
/// normalized to the zone of `query.start`.
pub trait CalendarQuery {
    fn query(&mut self, query: &EventQuery<'_>) -> Result<Vec<AbsenceEvent>>;
}

impl<F> CalendarQuery for F
where
    F: FnMut(&EventQuery<'_>) -> Result<Vec<AbsenceEvent>>,
{
    fn query(&mut self, query: &EventQuery<'_>) -> Result<Vec<AbsenceEvent>> {
        self(query)
    }
}

/// The mailbox's reported zone and current auto-reply state.
#[derive(Debug, Clone, PartialEq)]
pub struct MailboxSnapshot {
    /// Zone name as reported by the mailbox (IANA or Windows).
    pub time_zone: String,
    pub auto_reply: AutoReplyState,
}

/// Read/write access to the mailbox auto-reply setting.
pub trait Mailbox {
    fn read_auto_reply(&mut self) -> Result<MailboxSnapshot>;

    /// Schedule automatic replies to all recipients for `reply`'s bounds.
    fn write_auto_reply(&mut self, reply: &ScheduledReply) -> Result<()>;
}

/// Produces the internal and external messages for a schedule.
pub trait RenderMessages {
    fn render_messages(&self, start: &Instant, end: &Instant) -> Result<ReplyMessages>;
}
