//! Access token acquisition for Microsoft Graph.
//!
//! Order of attempts: cached access token → refresh-token grant → OAuth 2.0
//! device-code sign-in on the terminal.

use chrono::{DateTime, Duration, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::reqwest::http_client;
use oauth2::{
    AuthType, AuthUrl, ClientId, DeviceAuthorizationUrl, RefreshToken, Scope,
    StandardDeviceAuthorizationResponse, TokenResponse, TokenUrl,
};
use thiserror::Error;

use crate::cache::TokenCache;
use crate::config::AppRegistration;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid authority URL: {0}")]
    InvalidAuthority(String),

    #[error("device code sign-in failed: {0}")]
    DeviceCode(String),

    #[error("refresh token grant failed: {0}")]
    Refresh(String),
}

/// Return a usable access token, updating `cache` with whatever was obtained.
pub fn acquire_token(
    app: &AppRegistration,
    cache: &mut TokenCache,
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    if let Some(token) = cache.valid_access_token(now) {
        tracing::debug!("using cached access token");
        return Ok(token.to_string());
    }

    let client = oauth_client(app)?;

    if let Some(refresh) = cache.refresh_token.clone() {
        match client
            .exchange_refresh_token(&RefreshToken::new(refresh))
            .add_scopes(scopes(app))
            .request(http_client)
        {
            Ok(response) => {
                tracing::info!("access token refreshed");
                return Ok(store_response(cache, &response, now));
            }
            Err(e) => {
                let error = AuthError::Refresh(e.to_string());
                tracing::warn!(%error, "falling back to device code sign-in");
            }
        }
    }

    let response = device_code_sign_in(&client, app)?;
    Ok(store_response(cache, &response, now))
}

fn device_code_sign_in(
    client: &BasicClient,
    app: &AppRegistration,
) -> Result<BasicTokenResponse, AuthError> {
    let details: StandardDeviceAuthorizationResponse = client
        .exchange_device_code()
        .map_err(|e| AuthError::DeviceCode(e.to_string()))?
        .add_scopes(scopes(app))
        .request(http_client)
        .map_err(|e| AuthError::DeviceCode(e.to_string()))?;

    eprintln!(
        "To sign in, open {} and enter the code {}",
        details.verification_uri().url().as_str(),
        details.user_code().secret()
    );

    client
        .exchange_device_access_token(&details)
        .request(http_client, std::thread::sleep, None)
        .map_err(|e| AuthError::DeviceCode(e.to_string()))
}

fn oauth_client(app: &AppRegistration) -> Result<BasicClient, AuthError> {
    let authority = format!(
        "{}/{}/oauth2/v2.0",
        app.authority_host.trim_end_matches('/'),
        app.tenant_id
    );
    let invalid = |e: oauth2::url::ParseError| AuthError::InvalidAuthority(e.to_string());

    let client = BasicClient::new(
        ClientId::new(app.client_id.clone()),
        None,
        AuthUrl::new(format!("{}/authorize", authority)).map_err(invalid)?,
        Some(TokenUrl::new(format!("{}/token", authority)).map_err(invalid)?),
    )
    // Public client: the client id travels in the request body.
    .set_auth_type(AuthType::RequestBody)
    .set_device_authorization_url(
        DeviceAuthorizationUrl::new(format!("{}/devicecode", authority)).map_err(invalid)?,
    );
    Ok(client)
}

fn scopes(app: &AppRegistration) -> Vec<Scope> {
    app.scopes.iter().cloned().map(Scope::new).collect()
}

fn store_response(cache: &mut TokenCache, response: &BasicTokenResponse, now: DateTime<Utc>) -> String {
    let access_token = response.access_token().secret().clone();
    cache.access_token = Some(access_token.clone());
    if let Some(refresh) = response.refresh_token() {
        cache.refresh_token = Some(refresh.secret().clone());
    }
    cache.expires_at = response
        .expires_in()
        .and_then(|d| Duration::from_std(d).ok())
        .map(|d| now + d);
    access_token
}
