//! Template sources and the reply message renderer.
//!
//! Templates use Jinja syntax. Two variables are available, `start` and `end`,
//! holding the schedule bounds as RFC 3339 strings, plus a `date` filter that
//! formats them with a `strftime` pattern (`{{ end | date("%A, %d %B") }}`,
//! default `%d.%m.%Y`).
//!
//! A bare `{{ start }}` therefore renders with a `T` separator
//! (`2026-08-03T00:00:00+02:00`), not the space-separated form of Jinja
//! templates fed native datetimes. Use the `date` filter for display text.

use std::path::PathBuf;

use chrono::format::{Item, StrftimeItems};
use chrono::DateTime;
use minijinja::{context, Environment, Error, ErrorKind};
use serde::{Deserialize, Serialize};

use crate::error::{AutoReplyError, Result};
use crate::model::{Instant, ReplyMessages};
use crate::ports::RenderMessages;

const DEFAULT_DATE_FORMAT: &str = "%d.%m.%Y";

/// Where a message template comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TemplateSource {
    /// Template read from a file on disk.
    Local { path: PathBuf },
    /// Template given inline.
    String { content: String },
}

impl TemplateSource {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        TemplateSource::Local { path: path.into() }
    }

    pub fn inline(content: impl Into<String>) -> Self {
        TemplateSource::String {
            content: content.into(),
        }
    }

    /// Load the template text.
    pub fn resolve_content(&self) -> Result<String> {
        match self {
            TemplateSource::Local { path } => std::fs::read_to_string(path).map_err(|e| {
                AutoReplyError::Template(format!("cannot read {}: {}", path.display(), e))
            }),
            TemplateSource::String { content } => Ok(content.clone()),
        }
    }
}

/// Which of the two reply messages to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Internal,
    External,
}

/// Renders the internal/external reply messages for a schedule.
///
/// Built once per process; template sources are resolved at construction so a
/// missing file fails before any mailbox access.
pub struct MessageRenderer {
    env: Environment<'static>,
    internal: String,
    external: String,
}

impl MessageRenderer {
    pub fn new(internal: &TemplateSource, external: &TemplateSource) -> Result<Self> {
        Ok(Self::from_strings(
            internal.resolve_content()?,
            external.resolve_content()?,
        ))
    }

    pub fn from_strings(internal: impl Into<String>, external: impl Into<String>) -> Self {
        let mut env = Environment::new();
        env.add_filter("date", format_date);
        Self {
            env,
            internal: internal.into(),
            external: external.into(),
        }
    }

    pub fn render(&self, kind: MessageKind, start: &Instant, end: &Instant) -> Result<String> {
        let source = match kind {
            MessageKind::Internal => &self.internal,
            MessageKind::External => &self.external,
        };
        let ctx = context! {
            start => start.to_rfc3339(),
            end => end.to_rfc3339(),
        };
        Ok(self.env.render_str(source, ctx)?)
    }
}

impl RenderMessages for MessageRenderer {
    fn render_messages(&self, start: &Instant, end: &Instant) -> Result<ReplyMessages> {
        Ok(ReplyMessages {
            internal: self.render(MessageKind::Internal, start, end)?,
            external: self.render(MessageKind::External, start, end)?,
        })
    }
}

/// `date` filter: values that are not RFC 3339 timestamps pass through unchanged.
fn format_date(value: String, format: Option<String>) -> std::result::Result<String, Error> {
    let format = format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("invalid date format {:?}", format),
        ));
    }
    Ok(match DateTime::parse_from_rfc3339(&value) {
        Ok(dt) => dt.format(format).to_string(),
        Err(_) => value,
    })
}
