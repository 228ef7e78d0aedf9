//! Microsoft Graph adapters for the calendar and mailbox ports.

use autoreply_core::error::{AutoReplyError, Result as CoreResult};
use autoreply_core::zone::{localize, parse_naive, resolve_zone, to_wall_clock};
use autoreply_core::{
    AbsenceEvent, AutoReplyState, CalendarQuery, EventId, EventQuery, Instant, Mailbox,
    MailboxSnapshot, ScheduledReply,
};
use chrono_tz::Tz;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Graph request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Graph returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("unexpected Graph payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Core(#[from] AutoReplyError),
}

/// `dateTimeTimeZone` resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DateTimeTimeZone {
    date_time: String,
    #[serde(default)]
    time_zone: Option<String>,
}

impl DateTimeTimeZone {
    /// Interpret in the resource's own zone, then move to `zone`.
    fn in_own_zone(&self, zone: Tz) -> Result<Instant, GraphError> {
        let own = self
            .time_zone
            .as_deref()
            .map(resolve_zone)
            .unwrap_or(zone);
        Ok(localize(parse_naive(&self.date_time)?, own)?.with_timezone(&zone))
    }

    /// Interpret the wall-clock time directly in `zone` (all-day events float).
    fn as_wall_clock_in(&self, zone: Tz) -> Result<Instant, GraphError> {
        Ok(localize(parse_naive(&self.date_time)?, zone)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MailboxSettings {
    #[serde(default)]
    time_zone: Option<String>,
    #[serde(default)]
    automatic_replies_setting: Option<AutomaticRepliesSetting>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutomaticRepliesSetting {
    status: String,
    #[serde(default)]
    scheduled_start_date_time: Option<DateTimeTimeZone>,
    #[serde(default)]
    scheduled_end_date_time: Option<DateTimeTimeZone>,
    #[serde(default)]
    internal_reply_message: Option<String>,
    #[serde(default)]
    external_reply_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarView {
    #[serde(default)]
    value: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    start: DateTimeTimeZone,
    end: DateTimeTimeZone,
}

fn snapshot_from(settings: MailboxSettings) -> Result<MailboxSnapshot, GraphError> {
    let time_zone = settings.time_zone.unwrap_or_else(|| "UTC".to_string());
    let zone = resolve_zone(&time_zone);
    let replies = settings
        .automatic_replies_setting
        .ok_or_else(|| GraphError::Payload("missing automaticRepliesSetting".into()))?;

    let auto_reply = match replies.status.as_str() {
        "disabled" => AutoReplyState::Disabled,
        "alwaysEnabled" => AutoReplyState::AlwaysEnabled,
        "scheduled" => {
            let (Some(start), Some(end)) = (
                replies.scheduled_start_date_time.as_ref(),
                replies.scheduled_end_date_time.as_ref(),
            ) else {
                return Err(GraphError::Payload(
                    "scheduled automatic replies without start/end".into(),
                ));
            };
            AutoReplyState::Scheduled {
                start: start.in_own_zone(zone)?,
                end: end.in_own_zone(zone)?,
                internal_message: replies.internal_reply_message.unwrap_or_default(),
                external_message: replies.external_reply_message.unwrap_or_default(),
            }
        }
        other => {
            return Err(GraphError::Payload(format!(
                "unknown automatic replies status '{}'",
                other
            )))
        }
    };

    Ok(MailboxSnapshot {
        time_zone,
        auto_reply,
    })
}

fn absence_from(event: Event, zone: Tz) -> Result<AbsenceEvent, GraphError> {
    let start = event.start.as_wall_clock_in(zone)?;
    let end = event.end.as_wall_clock_in(zone)?;
    let id = match event.id {
        Some(id) if !id.is_empty() => EventId::new(id),
        _ => EventId::fingerprint(event.subject.as_deref().unwrap_or_default(), &start, &end),
    };
    Ok(AbsenceEvent::new(id, start, end))
}

fn subject_filter(subject: &str) -> String {
    format!(
        "subject eq '{}' and isAllDay eq true",
        subject.replace('\'', "''")
    )
}

fn update_payload(reply: &ScheduledReply) -> serde_json::Value {
    let zone = reply.start.timezone();
    serde_json::json!({
        "automaticRepliesSetting": {
            "status": "scheduled",
            "scheduledStartDateTime": {
                "dateTime": to_wall_clock(&reply.start),
                "timeZone": zone.name(),
            },
            "scheduledEndDateTime": {
                "dateTime": to_wall_clock(&reply.end.with_timezone(&zone)),
                "timeZone": zone.name(),
            },
            "internalReplyMessage": reply.messages.internal,
            "externalReplyMessage": reply.messages.external,
            "externalAudience": "all",
        }
    })
}

/// Authenticated Microsoft Graph client for the signed-in user.
#[derive(Debug, Clone)]
pub struct GraphClient {
    http: Client,
    base_url: String,
    token: String,
}

impl GraphClient {
    pub fn new(http: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, GraphError> {
        let response = request.bearer_auth(&self.token).send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(GraphError::Status { status, body })
    }

    fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GraphError> {
        Ok(self.send(request)?.json()?)
    }

    pub fn mailbox_snapshot(&self) -> Result<MailboxSnapshot, GraphError> {
        let settings: MailboxSettings = self.get_json(self.http.get(self.url("/me/mailboxSettings")))?;
        tracing::debug!(?settings, "mailbox settings");
        snapshot_from(settings)
    }

    pub fn calendar_view(&self, query: &EventQuery<'_>) -> Result<Vec<AbsenceEvent>, GraphError> {
        let zone = query.start.timezone();
        let request = self
            .http
            .get(self.url("/me/calendar/calendarView"))
            .query(&[
                ("startDateTime", query.start.to_rfc3339()),
                ("endDateTime", query.end.to_rfc3339()),
                ("$filter", subject_filter(query.subject)),
                ("$orderby", "start/dateTime".to_string()),
                ("$top", query.top.to_string()),
            ]);
        let view: CalendarView = self.get_json(request)?;
        view.value
            .into_iter()
            .map(|event| absence_from(event, zone))
            .collect()
    }

    pub fn schedule_auto_reply(&self, reply: &ScheduledReply) -> Result<(), GraphError> {
        self.send(
            self.http
                .patch(self.url("/me/mailboxSettings"))
                .json(&update_payload(reply)),
        )?;
        Ok(())
    }
}

/// Mailbox port backed by [`GraphClient`].
pub struct GraphMailbox<'a>(pub &'a GraphClient);

impl Mailbox for GraphMailbox<'_> {
    fn read_auto_reply(&mut self) -> CoreResult<MailboxSnapshot> {
        self.0
            .mailbox_snapshot()
            .map_err(|e| AutoReplyError::Mailbox(Box::new(e)))
    }

    fn write_auto_reply(&mut self, reply: &ScheduledReply) -> CoreResult<()> {
        self.0
            .schedule_auto_reply(reply)
            .map_err(|e| AutoReplyError::Mailbox(Box::new(e)))
    }
}

/// Calendar port backed by [`GraphClient`].
pub struct GraphCalendar<'a>(pub &'a GraphClient);

impl CalendarQuery for GraphCalendar<'_> {
    fn query(&mut self, query: &EventQuery<'_>) -> CoreResult<Vec<AbsenceEvent>> {
        self.0
            .calendar_view(query)
            .map_err(|e| AutoReplyError::Calendar(Box::new(e)))
    }
}
