//! Credential exchange against the Rackspace auth endpoint

use reqwest::header::USER_AGENT;

use super::session::{Credentials, ServiceLocation, Session};
use crate::error::{CloudDbError, Result};

/// Exchange credentials for a [`Session`].
///
/// Sends a single GET to the auth endpoint with `X-Auth-User` and
/// `X-Auth-Key` headers. A 204 response carries the bearer token in
/// `X-Auth-Token` and the account id as the trailing path segment of
/// `X-Server-Management-Url`; from these the account-scoped management
/// location is constructed and parsed.
///
/// # Errors
///
/// Returns [`CloudDbError::Authentication`] on any non-204 status, or when
/// the expected response headers are missing or malformed.
pub async fn authenticate(http: &reqwest::Client, credentials: &Credentials) -> Result<Session> {
    tracing::debug!(url = %credentials.auth_url, user = %credentials.username, "authenticating");

    let response = http
        .get(&credentials.auth_url)
        .header("X-Auth-User", &credentials.username)
        .header("X-Auth-Key", &credentials.api_key)
        .header(USER_AGENT, crate::USER_AGENT)
        .send()
        .await?;

    let status = response.status().as_u16();
    if status != 204 {
        return Err(CloudDbError::authentication(format!(
            "authentication failed with response code {status}"
        )));
    }

    let headers = response.headers();
    let token = headers
        .get("x-auth-token")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            CloudDbError::authentication("auth response is missing the X-Auth-Token header")
        })?
        .to_string();
    let management_url = headers
        .get("x-server-management-url")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            CloudDbError::authentication(
                "auth response is missing the X-Server-Management-Url header",
            )
        })?;
    let account_id = trailing_account_id(management_url).ok_or_else(|| {
        CloudDbError::authentication(format!(
            "no account id at the end of management URL {management_url}"
        ))
    })?;

    let base = match &credentials.service_url {
        Some(service_url) => service_url.trim_end_matches('/').to_string(),
        None => format!(
            "https://{}.databases.api.rackspacecloud.com/v1.0",
            credentials.region
        ),
    };
    let location = ServiceLocation::from_url(&format!("{base}/{account_id}"))?;
    tracing::debug!(host = %location.host, path = %location.path, "authenticated");

    Ok(Session { token, location })
}

/// Extract the trailing all-digit path segment of a management URL, if any.
fn trailing_account_id(url: &str) -> Option<&str> {
    let (_, segment) = url.trim_end().rsplit_once('/')?;
    (!segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())).then_some(segment)
}
