//! One complete pass: find the next absence, merge it, reconcile, write.

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::merger::{merge_adjacent, MergeOptions};
use crate::model::{Decision, ScheduledReply, VacationPeriod};
use crate::ports::{CalendarQuery, EventQuery, Mailbox, RenderMessages};
use crate::reconciler::reconcile;
use crate::zone::resolve_zone;

/// Policy for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Subject of absence events (e.g. "Urlaub").
    pub subject: String,
    /// How far ahead of now an absence must start to be picked up.
    pub future_period_days: i64,
    pub max_delta_hours: i64,
    pub max_chain_queries: usize,
    /// Compute the decision but never write to the mailbox.
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            subject: "Urlaub".to_string(),
            future_period_days: 3,
            max_delta_hours: 12,
            max_chain_queries: 100,
            dry_run: false,
        }
    }
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No absence event starts within the look-ahead window.
    NoAbsence,
    /// The mailbox already matches the vacation period.
    Unchanged { period: VacationPeriod },
    /// The mailbox schedule was written.
    Updated {
        period: VacationPeriod,
        reply: ScheduledReply,
    },
    /// An update was needed but dry-run mode skipped the write.
    DryRun {
        period: VacationPeriod,
        reply: ScheduledReply,
    },
}

/// Run the detect → merge → reconcile → write sequence once.
///
/// The mailbox is read first so every instant can be normalized to its zone.
/// Any port failure aborts the run; a failed write after a successful decision
/// is surfaced as an error without retry.
pub fn run_once<M, C, R>(
    mailbox: &mut M,
    calendar: &mut C,
    renderer: &R,
    options: &RunOptions,
    now: DateTime<Utc>,
) -> Result<RunOutcome>
where
    M: Mailbox + ?Sized,
    C: CalendarQuery + ?Sized,
    R: RenderMessages + ?Sized,
{
    let snapshot = mailbox.read_auto_reply()?;
    let zone = resolve_zone(&snapshot.time_zone);
    tracing::info!(zone = %zone, "mailbox time zone");

    let now = now.with_timezone(&zone);
    let lookup = EventQuery {
        start: now,
        end: now + Duration::days(options.future_period_days),
        subject: &options.subject,
        top: 1,
    };
    tracing::info!(from = %lookup.start, to = %lookup.end, "querying calendar for upcoming absence");

    let Some(anchor) = calendar.query(&lookup)?.into_iter().next() else {
        tracing::info!("no upcoming absence events found");
        return Ok(RunOutcome::NoAbsence);
    };
    tracing::info!(
        start = %anchor.start.format("%Y-%m-%d"),
        end = %anchor.end.format("%Y-%m-%d"),
        "found upcoming absence event"
    );

    let merge_options = MergeOptions {
        subject: options.subject.clone(),
        max_queries: options.max_chain_queries,
    };
    let period = merge_adjacent(&anchor, calendar, &merge_options)?;
    tracing::info!(start = %period.start(), end = %period.end(), "vacation period");
    tracing::info!(status = snapshot.auto_reply.status_name(), "current automatic replies");

    let decision = reconcile(
        &snapshot.auto_reply,
        &period,
        now,
        options.max_delta_hours,
        |start, end| renderer.render_messages(start, end),
    )?;

    let reply = match decision {
        Decision::NoOp => return Ok(RunOutcome::Unchanged { period }),
        Decision::Update(reply) => reply,
    };
    tracing::info!(start = %reply.start, end = %reply.end, "scheduling automatic replies");
    tracing::debug!(internal = %reply.messages.internal, external = %reply.messages.external, "reply messages");

    if options.dry_run {
        tracing::info!("dry run, automatic replies not updated");
        return Ok(RunOutcome::DryRun { period, reply });
    }

    mailbox.write_auto_reply(&reply)?;
    tracing::info!("automatic replies updated");
    Ok(RunOutcome::Updated { period, reply })
}
