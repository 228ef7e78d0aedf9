//! Tests for the auto-reply reconciliation decision table.

use std::cell::RefCell;

use autoreply_core::error::AutoReplyError;
use autoreply_core::{
    reconcile, AutoReplyState, Decision, Instant, ReplyMessages, ScheduledReply, VacationPeriod,
};
use chrono::TimeZone;
use chrono_tz::Tz;

fn at(month: u32, day: u32, hour: u32) -> Instant {
    Tz::UTC.with_ymd_and_hms(2026, month, day, hour, 0, 0).unwrap()
}

fn jan(day: u32) -> Instant {
    at(1, day, 0)
}

fn period(start: Instant, end: Instant) -> VacationPeriod {
    VacationPeriod::new(start, end).unwrap()
}

fn scheduled(start: Instant, end: Instant, internal: &str, external: &str) -> AutoReplyState {
    AutoReplyState::Scheduled {
        start,
        end,
        internal_message: internal.to_string(),
        external_message: external.to_string(),
    }
}

fn messages() -> ReplyMessages {
    ReplyMessages {
        internal: "away".to_string(),
        external: "out of office".to_string(),
    }
}

fn update(start: Instant, end: Instant) -> Decision {
    Decision::Update(ScheduledReply {
        start,
        end,
        messages: messages(),
    })
}

/// Runs `reconcile` with a renderer that records the bounds it was asked for.
fn run(
    current: &AutoReplyState,
    p: &VacationPeriod,
    now: Instant,
    max_delta_hours: i64,
) -> (Decision, Vec<(Instant, Instant)>) {
    let calls = RefCell::new(Vec::new());
    let decision = reconcile(current, p, now, max_delta_hours, |s, e| {
        calls.borrow_mut().push((*s, *e));
        Ok(messages())
    })
    .unwrap();
    (decision, calls.into_inner())
}

// ─────────────────────────────────────────────────────────────────────────────
// Unscheduled states
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn disabled_schedules_exact_period() {
    let p = period(jan(13), jan(15));

    let (decision, renders) = run(&AutoReplyState::Disabled, &p, jan(1), 12);

    assert_eq!(decision, update(jan(13), jan(15)));
    assert_eq!(renders, vec![(jan(13), jan(15))]);
}

#[test]
fn always_enabled_is_left_alone_without_rendering() {
    let p = period(jan(13), jan(15));

    let (decision, renders) = run(&AutoReplyState::AlwaysEnabled, &p, jan(1), 12);

    assert_eq!(decision, Decision::NoOp);
    assert!(renders.is_empty(), "no-op must not render messages");
}

// ─────────────────────────────────────────────────────────────────────────────
// Scheduled states
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn stale_schedule_is_replaced() {
    let last_december = Tz::UTC.with_ymd_and_hms(2025, 12, 22, 0, 0, 0).unwrap();
    let current = scheduled(last_december, jan(2), "old", "old");
    let p = period(jan(13), jan(15));

    let (decision, _) = run(&current, &p, jan(5), 12);

    assert_eq!(decision, update(jan(13), jan(15)));
}

#[test]
fn stale_check_precedes_equality_check() {
    let current = scheduled(jan(1), jan(3), "away", "out of office");
    let p = period(jan(1), jan(3));

    let (decision, renders) = run(&current, &p, jan(4), 12);

    assert_eq!(decision, update(jan(1), jan(3)));
    assert_eq!(renders.len(), 1);
}

#[test]
fn identical_schedule_and_messages_is_noop() {
    let current = scheduled(jan(13), jan(15), "away", "out of office");
    let p = period(jan(13), jan(15));

    let (decision, renders) = run(&current, &p, jan(1), 12);

    assert_eq!(decision, Decision::NoOp);
    assert_eq!(renders, vec![(jan(13), jan(15))], "equality check renders once");
}

#[test]
fn identical_schedule_with_changed_messages_updates() {
    let current = scheduled(jan(13), jan(15), "away", "gone fishing");
    let p = period(jan(13), jan(15));

    let (decision, renders) = run(&current, &p, jan(1), 12);

    assert_eq!(decision, update(jan(13), jan(15)));
    assert_eq!(renders.len(), 1, "messages are rendered only once");
}

#[test]
fn earlier_schedule_beyond_max_delta_is_noop() {
    // Gap from Jan 12 to Jan 13 is 24h, not below 12h.
    let current = scheduled(jan(10), jan(12), "a", "b");
    let p = period(jan(13), jan(15));

    let (decision, renders) = run(&current, &p, jan(1), 12);

    assert_eq!(decision, Decision::NoOp);
    assert!(renders.is_empty());
}

#[test]
fn earlier_schedule_within_max_delta_is_joined() {
    let current = scheduled(jan(10), jan(12), "a", "b");
    let p = period(jan(13), jan(15));

    let (decision, renders) = run(&current, &p, jan(1), 30);

    assert_eq!(decision, update(jan(10), jan(15)));
    assert_eq!(renders, vec![(jan(10), jan(15))], "renders with the joined bounds");
}

#[test]
fn gap_equal_to_max_delta_is_not_joined() {
    let current = scheduled(jan(10), jan(12), "a", "b");
    let p = period(jan(13), jan(15));

    let (decision, _) = run(&current, &p, jan(1), 24);

    assert_eq!(decision, Decision::NoOp);
}

#[test]
fn gap_uses_exact_hours_not_calendar_days() {
    // Ends at 20:00 the day before: 4h gap.
    let current = scheduled(jan(10), at(1, 12, 20), "a", "b");
    let p = period(jan(13), jan(15));

    let (decision, _) = run(&current, &p, jan(1), 5);

    assert_eq!(decision, update(jan(10), jan(15)));
}

#[test]
fn containing_schedule_keeps_union() {
    let current = scheduled(jan(1), jan(20), "a", "b");
    let p = period(jan(5), jan(10));

    let (decision, _) = run(&current, &p, jan(1), 12);

    assert_eq!(decision, update(jan(1), jan(20)));
}

#[test]
fn partially_overlapping_schedule_is_extended() {
    let current = scheduled(jan(1), jan(6), "a", "b");
    let p = period(jan(5), jan(10));

    let (decision, _) = run(&current, &p, jan(1), 12);

    assert_eq!(decision, update(jan(1), jan(10)));
}

#[test]
fn schedule_ending_exactly_at_period_start_counts_as_overlap() {
    let current = scheduled(jan(1), jan(5), "a", "b");
    let p = period(jan(5), jan(10));

    let (decision, _) = run(&current, &p, jan(1), 0);

    assert_eq!(decision, update(jan(1), jan(10)));
}

#[test]
fn later_schedule_is_replaced_by_period() {
    let current = scheduled(jan(7), jan(20), "a", "b");
    let p = period(jan(5), jan(10));

    let (decision, _) = run(&current, &p, jan(1), 12);

    assert_eq!(decision, update(jan(5), jan(10)));
}

#[test]
fn same_start_different_end_is_replaced_by_period() {
    let current = scheduled(jan(5), jan(8), "away", "out of office");
    let p = period(jan(5), jan(10));

    let (decision, _) = run(&current, &p, jan(1), 12);

    assert_eq!(decision, update(jan(5), jan(10)));
}

#[test]
fn bounds_compare_as_instants_across_zones() {
    let berlin = Tz::Europe__Berlin;
    // 01:00 Berlin on Jan 13 is midnight UTC.
    let p = period(
        berlin.with_ymd_and_hms(2026, 1, 13, 1, 0, 0).unwrap(),
        berlin.with_ymd_and_hms(2026, 1, 15, 1, 0, 0).unwrap(),
    );
    let current = scheduled(jan(13), jan(15), "away", "out of office");

    let (decision, _) = run(&current, &p, jan(1), 12);

    assert_eq!(decision, Decision::NoOp);
}

#[test]
fn render_failure_propagates() {
    let p = period(jan(13), jan(15));

    let result = reconcile(&AutoReplyState::Disabled, &p, jan(1), 12, |_, _| {
        Err(AutoReplyError::Template("undefined filter".into()))
    });

    assert!(matches!(result, Err(AutoReplyError::Template(_))));
}

#[test]
fn inverted_period_is_rejected() {
    let result = VacationPeriod::new(jan(15), jan(13));
    assert!(matches!(result, Err(AutoReplyError::InvalidPeriod { .. })));
}

#[test]
fn noop_only_for_documented_cases() {
    let p = period(jan(13), jan(15));
    let now = jan(1);
    let cases: Vec<(AutoReplyState, bool)> = vec![
        (AutoReplyState::Disabled, false),
        (AutoReplyState::AlwaysEnabled, true),
        (scheduled(jan(13), jan(15), "away", "out of office"), true),
        (scheduled(jan(13), jan(15), "x", "out of office"), false),
        (scheduled(jan(2), jan(4), "a", "b"), true),
        (scheduled(jan(2), jan(14), "a", "b"), false),
        (scheduled(jan(14), jan(20), "a", "b"), false),
    ];

    for (current, expect_noop) in cases {
        let (decision, _) = run(&current, &p, now, 12);
        assert_eq!(
            matches!(decision, Decision::NoOp),
            expect_noop,
            "unexpected decision for {:?}",
            current
        );
    }
}
