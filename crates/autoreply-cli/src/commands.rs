//! The `init` and `run` subcommands.

use anyhow::{Context, Result};
use autoreply_core::{run_once, MessageRenderer, RunOutcome};
use chrono::Utc;
use reqwest::blocking::Client;

use crate::auth::acquire_token;
use crate::config::Settings;
use crate::graph::{GraphCalendar, GraphClient, GraphMailbox};

fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("outlook-autoreply/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Load the token cache, obtain an access token and persist the cache again.
fn authenticate(settings: &Settings, http: &Client) -> Result<String> {
    tracing::info!("initializing token cache");
    let mut cache = settings
        .cache
        .load(http)
        .context("Failed to load token cache")?;

    tracing::info!("getting access token");
    let token = acquire_token(&settings.app, &mut cache, Utc::now())
        .context("Failed to acquire access token")?;

    tracing::info!("saving token cache");
    settings
        .cache
        .store(http, &cache)
        .context("Failed to save token cache")?;

    Ok(token)
}

/// Sign in once so later unattended runs can reuse the cached tokens.
pub fn init(settings: &Settings) -> Result<()> {
    settings.app.validate()?;
    let http = http_client()?;
    authenticate(settings, &http)?;
    Ok(())
}

/// Detect the next absence and reconcile the mailbox's automatic replies.
pub fn run(settings: &Settings) -> Result<RunOutcome> {
    settings.app.validate()?;
    let absence = &settings.absence;
    let renderer = MessageRenderer::new(
        &absence.internal_reply_template,
        &absence.external_reply_template,
    )
    .context("Failed to load reply templates")?;

    let http = http_client()?;
    let token = authenticate(settings, &http)?;
    let graph = GraphClient::new(http, settings.app.base_url.clone(), token);

    let outcome = run_once(
        &mut GraphMailbox(&graph),
        &mut GraphCalendar(&graph),
        &renderer,
        &absence.run_options(settings.dry_run),
        Utc::now(),
    )
    .context("Failed to reconcile automatic replies")?;

    tracing::info!("run complete");
    Ok(outcome)
}
