//! Chain adjacent or overlapping absence events into one vacation period.
//!
//! Starting from an anchor event, the calendar is queried forward from the
//! current link's start. The first unseen event that starts no later than the
//! current link's end becomes the next link. Chaining stops when no such event
//! exists or when the query budget is spent.

use std::collections::HashSet;

use chrono::Duration;

use crate::error::Result;
use crate::model::{AbsenceEvent, EventId, VacationPeriod};
use crate::ports::{CalendarQuery, EventQuery};

/// Length of each forward lookup window.
pub const LOOKAHEAD_DAYS: i64 = 365;

/// Page size requested per lookup.
pub const PAGE_SIZE: usize = 10;

/// Tuning for [`merge_adjacent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Subject the chained events must carry.
    pub subject: String,
    /// Maximum number of calendar queries issued for one merge.
    pub max_queries: usize,
}

impl MergeOptions {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            max_queries: 100,
        }
    }
}

/// Extend `anchor` into the full continuous vacation period.
///
/// The adjacency test compares each candidate against the *current* link's end,
/// so the chain is built one event at a time. The period ends where the last
/// accepted link ends. Events already accepted are never accepted again.
///
/// # Errors
/// Propagates the first calendar query failure; no partial period is returned.
pub fn merge_adjacent<Q: CalendarQuery + ?Sized>(
    anchor: &AbsenceEvent,
    query: &mut Q,
    options: &MergeOptions,
) -> Result<VacationPeriod> {
    let mut seen: HashSet<EventId> = HashSet::new();
    seen.insert(anchor.id.clone());

    let mut current = anchor.clone();
    let mut queries = 0usize;

    loop {
        if queries >= options.max_queries {
            tracing::warn!(
                queries,
                chained = seen.len(),
                "absence chain query limit reached, stopping early"
            );
            break;
        }
        queries += 1;

        let window = EventQuery {
            start: current.start,
            end: current.start + Duration::days(LOOKAHEAD_DAYS),
            subject: &options.subject,
            top: PAGE_SIZE,
        };
        let candidates = query.query(&window)?;

        let next = candidates
            .into_iter()
            .filter(|event| !seen.contains(&event.id))
            .find(|event| event.start <= current.end);

        match next {
            Some(event) => {
                tracing::debug!(id = %event.id, start = %event.start, end = %event.end, "chained absence event");
                seen.insert(event.id.clone());
                current = event;
            }
            None => break,
        }
    }

    tracing::info!(
        chained = seen.len() - 1,
        "found adjacent/overlapping absence events"
    );

    VacationPeriod::new(anchor.start, current.end)
}
