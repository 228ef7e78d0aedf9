//! # autoreply-core
//!
//! Keeps an Outlook mailbox's automatic replies in step with the absence entries
//! on its calendar.
//!
//! A single all-day absence entry is often only one fragment of a longer,
//! back-to-back vacation. The engine first walks the calendar forward to find the
//! full continuous period, then compares that period against the mailbox's
//! current auto-reply schedule and decides on the smallest change that makes
//! them agree.
//!
//! ## Modules
//!
//! - [`model`] — Absence events, vacation periods, auto-reply states, decisions
//! - [`merger`] — Chain adjacent/overlapping absence events into one period
//! - [`reconciler`] — Decide whether (and how) the mailbox schedule must change
//! - [`template`] — Template sources and the reply message renderer
//! - [`zone`] — Mailbox time zone resolution and local-time normalization
//! - [`ports`] — Traits implemented by calendar and mailbox adapters
//! - [`workflow`] — One complete detect → merge → reconcile → write pass
//! - [`error`] — Error types

pub mod error;
pub mod merger;
pub mod model;
pub mod ports;
pub mod reconciler;
pub mod template;
pub mod workflow;
pub mod zone;

pub use error::AutoReplyError;
pub use merger::{merge_adjacent, MergeOptions};
pub use model::{
    AbsenceEvent, AutoReplyState, Decision, EventId, Instant, ReplyMessages, ScheduledReply,
    VacationPeriod,
};
pub use ports::{CalendarQuery, EventQuery, Mailbox, MailboxSnapshot, RenderMessages};
pub use reconciler::reconcile;
pub use template::{MessageKind, MessageRenderer, TemplateSource};
pub use workflow::{run_once, RunOptions, RunOutcome};
