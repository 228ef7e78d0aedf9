//! Decide whether the mailbox auto-reply schedule must change for a vacation.
//!
//! Rules, evaluated in order:
//!
//! | Current state        | Condition                         | Decision                          |
//! |----------------------|-----------------------------------|-----------------------------------|
//! | disabled             | always                            | schedule the period               |
//! | always enabled       | always                            | no-op                             |
//! | scheduled `[s, e]`   | `e < now`                         | schedule the period               |
//! | scheduled `[s, e]`   | same bounds as the period         | no-op unless the messages differ  |
//! | scheduled `[s, e]`   | ends before the period starts     | union if the gap < max delta      |
//! | scheduled `[s, e]`   | starts before, overlaps           | union of both                     |
//! | scheduled `[s, e]`   | starts at/after the period start  | schedule the period               |

use chrono::Duration;

use crate::error::Result;
use crate::model::{AutoReplyState, Decision, Instant, ReplyMessages, ScheduledReply, VacationPeriod};

/// Reconcile the current auto-reply state against `period`.
///
/// `render` is invoked at most once, with the bounds of the final schedule, and
/// only when an update is needed or the current messages must be compared.
/// A schedule ending before the period merges only when the gap is strictly
/// less than `max_delta_hours`.
///
/// # Errors
/// Returns whatever `render` fails with.
pub fn reconcile<R>(
    current: &AutoReplyState,
    period: &VacationPeriod,
    now: Instant,
    max_delta_hours: i64,
    render: R,
) -> Result<Decision>
where
    R: FnOnce(&Instant, &Instant) -> Result<ReplyMessages>,
{
    let (p_start, p_end) = (period.start(), period.end());

    let (start, end) = match current {
        AutoReplyState::Disabled => {
            tracing::info!("automatic replies are not active, scheduling for vacation period");
            (p_start, p_end)
        }
        AutoReplyState::AlwaysEnabled => {
            tracing::info!("automatic replies are always enabled, leaving them untouched");
            return Ok(Decision::NoOp);
        }
        AutoReplyState::Scheduled {
            start: s,
            end: e,
            internal_message,
            external_message,
        } => {
            let (s, e) = (*s, *e);
            if e < now {
                tracing::info!("scheduled automatic replies already ended, scheduling for vacation period");
                (p_start, p_end)
            } else if s == p_start && e == p_end {
                let messages = render(&p_start, &p_end)?;
                if messages.internal == *internal_message && messages.external == *external_message {
                    tracing::info!("automatic replies already scheduled for the vacation period");
                    return Ok(Decision::NoOp);
                }
                tracing::info!("automatic replies scheduled for the vacation period with outdated messages");
                return Ok(update(p_start, p_end, messages));
            } else if s < p_start && e < p_start {
                let gap = p_start - e;
                if gap < Duration::hours(max_delta_hours) {
                    tracing::info!(
                        gap_hours = gap.num_minutes() as f64 / 60.0,
                        max_delta_hours,
                        "scheduled automatic replies end shortly before the vacation, joining both"
                    );
                    (s.min(p_start), e.max(p_end))
                } else {
                    tracing::info!("automatic replies are scheduled for an earlier, separate period");
                    return Ok(Decision::NoOp);
                }
            } else if s < p_start {
                tracing::info!("scheduled automatic replies overlap the vacation, joining both");
                (s.min(p_start), e.max(p_end))
            } else {
                tracing::info!("vacation starts before the scheduled automatic replies, rescheduling");
                (p_start, p_end)
            }
        }
    };

    let messages = render(&start, &end)?;
    Ok(update(start, end, messages))
}

fn update(start: Instant, end: Instant, messages: ReplyMessages) -> Decision {
    Decision::Update(ScheduledReply {
        start,
        end,
        messages,
    })
}
