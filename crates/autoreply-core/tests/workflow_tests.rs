//! End-to-end tests of a single run against in-memory mailbox and calendar fakes.

use autoreply_core::error::{AutoReplyError, Result};
use autoreply_core::{
    run_once, AbsenceEvent, AutoReplyState, CalendarQuery, EventId, EventQuery, Mailbox,
    MailboxSnapshot, MessageRenderer, RunOptions, RunOutcome, ScheduledReply,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;

struct FakeMailbox {
    snapshot: MailboxSnapshot,
    writes: Vec<ScheduledReply>,
    reject_writes: bool,
}

impl FakeMailbox {
    fn new(time_zone: &str, auto_reply: AutoReplyState) -> Self {
        Self {
            snapshot: MailboxSnapshot {
                time_zone: time_zone.to_string(),
                auto_reply,
            },
            writes: Vec::new(),
            reject_writes: false,
        }
    }
}

impl Mailbox for FakeMailbox {
    fn read_auto_reply(&mut self) -> Result<MailboxSnapshot> {
        Ok(self.snapshot.clone())
    }

    fn write_auto_reply(&mut self, reply: &ScheduledReply) -> Result<()> {
        if self.reject_writes {
            return Err(AutoReplyError::Mailbox("403 Forbidden".into()));
        }
        self.writes.push(reply.clone());
        Ok(())
    }
}

/// Calendar view over a fixed set of events, recording each query.
struct FakeCalendar {
    events: Vec<AbsenceEvent>,
    queries: Vec<(DateTime<Utc>, DateTime<Utc>, usize)>,
}

impl CalendarQuery for FakeCalendar {
    fn query(&mut self, q: &EventQuery<'_>) -> Result<Vec<AbsenceEvent>> {
        self.queries
            .push((q.start.with_timezone(&Utc), q.end.with_timezone(&Utc), q.top));
        let mut hits: Vec<AbsenceEvent> = self
            .events
            .iter()
            .filter(|e| e.end > q.start && e.start < q.end)
            .cloned()
            .collect();
        hits.sort_by_key(|e| e.start);
        hits.truncate(q.top);
        Ok(hits)
    }
}

fn berlin(month: u32, day: u32) -> autoreply_core::Instant {
    Tz::Europe__Berlin
        .with_ymd_and_hms(2026, month, day, 0, 0, 0)
        .unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 30, 6, 0, 0).unwrap()
}

fn summer_calendar() -> FakeCalendar {
    FakeCalendar {
        events: vec![
            AbsenceEvent::new(EventId::new("week-1"), berlin(8, 1), berlin(8, 8)),
            AbsenceEvent::new(EventId::new("week-2"), berlin(8, 8), berlin(8, 15)),
            AbsenceEvent::new(EventId::new("autumn"), berlin(10, 5), berlin(10, 9)),
        ],
        queries: Vec::new(),
    }
}

fn renderer() -> MessageRenderer {
    MessageRenderer::from_strings(
        "Im Urlaub bis {{ end | date }}",
        "Out of office until {{ end | date(\"%Y-%m-%d\") }}",
    )
}

#[test]
fn disabled_mailbox_gets_merged_schedule() {
    let mut mailbox = FakeMailbox::new("W. Europe Standard Time", AutoReplyState::Disabled);
    let mut calendar = summer_calendar();

    let outcome = run_once(&mut mailbox, &mut calendar, &renderer(), &RunOptions::default(), now()).unwrap();

    let RunOutcome::Updated { period, reply } = outcome.clone() else {
        panic!("expected an update, got {:?}", outcome);
    };
    assert_eq!(period.start(), berlin(8, 1));
    assert_eq!(period.end(), berlin(8, 15));
    assert_eq!(mailbox.writes, vec![reply.clone()]);
    assert_eq!(reply.messages.internal, "Im Urlaub bis 15.08.2026");
    assert_eq!(reply.messages.external, "Out of office until 2026-08-15");
    assert_eq!(reply.start.timezone(), Tz::Europe__Berlin);
}

#[test]
fn anchor_lookup_covers_future_period_only() {
    let mut mailbox = FakeMailbox::new("Europe/Berlin", AutoReplyState::Disabled);
    let mut calendar = summer_calendar();

    run_once(&mut mailbox, &mut calendar, &renderer(), &RunOptions::default(), now()).unwrap();

    let (start, end, top) = calendar.queries[0];
    assert_eq!(start, now());
    assert_eq!(end, now() + Duration::days(3));
    assert_eq!(top, 1);
}

#[test]
fn no_upcoming_absence_is_benign() {
    let mut mailbox = FakeMailbox::new("Europe/Berlin", AutoReplyState::Disabled);
    let mut calendar = summer_calendar();
    let options = RunOptions {
        future_period_days: 1,
        ..RunOptions::default()
    };

    let outcome = run_once(&mut mailbox, &mut calendar, &renderer(), &options, now()).unwrap();

    assert_eq!(outcome, RunOutcome::NoAbsence);
    assert!(mailbox.writes.is_empty());
    assert_eq!(calendar.queries.len(), 1, "merger must not run without an anchor");
}

#[test]
fn dry_run_reports_without_writing() {
    let mut mailbox = FakeMailbox::new("Europe/Berlin", AutoReplyState::Disabled);
    let mut calendar = summer_calendar();
    let options = RunOptions {
        dry_run: true,
        ..RunOptions::default()
    };

    let outcome = run_once(&mut mailbox, &mut calendar, &renderer(), &options, now()).unwrap();

    assert!(matches!(outcome, RunOutcome::DryRun { .. }));
    assert!(mailbox.writes.is_empty());
}

#[test]
fn always_enabled_mailbox_is_unchanged() {
    let mut mailbox = FakeMailbox::new("Europe/Berlin", AutoReplyState::AlwaysEnabled);
    let mut calendar = summer_calendar();

    let outcome = run_once(&mut mailbox, &mut calendar, &renderer(), &RunOptions::default(), now()).unwrap();

    assert!(matches!(outcome, RunOutcome::Unchanged { .. }));
    assert!(mailbox.writes.is_empty());
}

#[test]
fn matching_schedule_is_unchanged() {
    let current = AutoReplyState::Scheduled {
        start: berlin(8, 1),
        end: berlin(8, 15),
        internal_message: "Im Urlaub bis 15.08.2026".to_string(),
        external_message: "Out of office until 2026-08-15".to_string(),
    };
    let mut mailbox = FakeMailbox::new("Europe/Berlin", current);
    let mut calendar = summer_calendar();

    let outcome = run_once(&mut mailbox, &mut calendar, &renderer(), &RunOptions::default(), now()).unwrap();

    assert!(matches!(outcome, RunOutcome::Unchanged { .. }));
    assert!(mailbox.writes.is_empty());
}

#[test]
fn rejected_write_surfaces_error() {
    let mut mailbox = FakeMailbox::new("Europe/Berlin", AutoReplyState::Disabled);
    mailbox.reject_writes = true;
    let mut calendar = summer_calendar();

    let err = run_once(&mut mailbox, &mut calendar, &renderer(), &RunOptions::default(), now()).unwrap_err();

    assert!(matches!(err, AutoReplyError::Mailbox(_)));
}

#[test]
fn unknown_mailbox_zone_runs_in_utc() {
    let mut mailbox = FakeMailbox::new("Unknown Standard Time", AutoReplyState::Disabled);
    let mut calendar = summer_calendar();

    let outcome = run_once(&mut mailbox, &mut calendar, &renderer(), &RunOptions::default(), now()).unwrap();

    let RunOutcome::Updated { reply, .. } = outcome.clone() else {
        panic!("expected an update, got {:?}", outcome);
    };
    // The anchor query is issued in UTC; events keep their own instants.
    assert_eq!(reply.start, berlin(8, 1));
    assert_eq!(mailbox.writes.len(), 1);
}
