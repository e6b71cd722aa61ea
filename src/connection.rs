//! Connection to the Cloud Databases API and the request pipeline
//!
//! A [`Connection`] owns the credentials, the authenticated [`Session`],
//! and its own HTTP client (injectable for tests). Every resource
//! operation funnels through the same pipeline: default headers and the
//! bearer token are attached, transport failures are retried a bounded
//! number of times, and a 401 transparently re-authenticates and
//! re-issues the original request when the retry policy allows it.

use std::time::Duration;

use reqwest::header::{
    ACCEPT, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT,
};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock};

use crate::auth::{self, Credentials, Region, ServiceLocation, Session};
use crate::error::{CloudDbError, Result, classify};
use crate::flavor::{Flavor, FlavorInfo, FlavorsEnvelope};
use crate::instance::{
    CreateInstanceEnvelope, CreateInstanceParams, Instance, InstanceEnvelope, InstanceInfo,
    InstancesEnvelope,
};

/// Default production auth endpoint (USA)
pub const AUTH_USA: &str = "https://auth.api.rackspacecloud.com/v1.0";
/// Production auth endpoint (UK)
pub const AUTH_UK: &str = "https://lon.auth.api.rackspacecloud.com/v1.0";

/// Total attempts per request before a transport failure is terminal
const MAX_TRANSPORT_ATTEMPTS: u32 = 5;
/// Re-authentication attempts per request before a 401 is terminal
const MAX_REAUTH_ATTEMPTS: u32 = 2;

/// Header carrying the bearer token
const X_AUTH_TOKEN: &str = "x-auth-token";

/// Raw response handed back by the request pipeline.
///
/// The pipeline does not range-check the status; callers classify it via
/// [`ApiResponse::ensure_success`].
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body text
    pub body: String,
}

impl ApiResponse {
    /// Classify this response, returning a typed fault for any status
    /// outside the 200-299 range.
    ///
    /// # Errors
    ///
    /// Returns [`CloudDbError::Api`] for non-2xx statuses.
    pub fn ensure_success(&self) -> Result<()> {
        classify(self.status.as_u16(), &self.body)
    }

    /// Deserialize the body as JSON.
    pub(crate) fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Transient request descriptor, constructed per call. Retries reuse the
/// descriptor; only the auth header is re-read from the current session.
struct ApiRequest {
    method: Method,
    location: ServiceLocation,
    path: String,
    headers: HeaderMap,
    body: Option<String>,
}

/// Builder for [`Connection`]
///
/// `username`, `api_key`, and `region` are required; everything else has
/// a production default.
#[derive(Debug, Default)]
pub struct ConnectionBuilder {
    username: Option<String>,
    api_key: Option<String>,
    region: Option<Region>,
    auth_url: Option<String>,
    service_url: Option<String>,
    retry_auth: bool,
    timeout: Option<Duration>,
    http_client: Option<reqwest::Client>,
}

impl ConnectionBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            retry_auth: true,
            ..Self::default()
        }
    }

    /// Rackspace Cloud username (required)
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Rackspace Cloud API key (required)
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Region in which to manage database instances (required)
    #[must_use]
    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Auth endpoint URL (defaults to [`AUTH_USA`])
    #[must_use]
    pub fn auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = Some(auth_url.into());
        self
    }

    /// Override the management-endpoint base URL. The account id returned
    /// by authentication is appended to this. Intended for tests and
    /// non-standard deployments.
    #[must_use]
    pub fn service_url(mut self, service_url: impl Into<String>) -> Self {
        self.service_url = Some(service_url.into());
        self
    }

    /// Whether to transparently re-authenticate when the token expires
    /// (default: true)
    #[must_use]
    pub fn retry_auth(mut self, retry_auth: bool) -> Self {
        self.retry_auth = retry_auth;
        self
    }

    /// Request timeout applied to the internally built HTTP client.
    /// Ignored when a client is injected via
    /// [`http_client`](Self::http_client).
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Inject a preconfigured HTTP client instead of building one
    #[must_use]
    pub fn http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Authenticate and build the [`Connection`].
    ///
    /// Authentication fully completes (or fails) before the connection is
    /// usable.
    ///
    /// # Errors
    ///
    /// Returns [`CloudDbError::MissingArgument`] when a required builder
    /// value is absent or empty, and [`CloudDbError::Authentication`] when
    /// the credential exchange fails.
    pub async fn connect(self) -> Result<Connection> {
        let username = self
            .username
            .filter(|value| !value.is_empty())
            .ok_or_else(|| CloudDbError::missing_argument("must supply a username"))?;
        let api_key = self
            .api_key
            .filter(|value| !value.is_empty())
            .ok_or_else(|| CloudDbError::missing_argument("must supply an api_key"))?;
        let region = self
            .region
            .ok_or_else(|| CloudDbError::missing_argument("must supply a region"))?;

        let credentials = Credentials {
            username,
            api_key,
            region,
            auth_url: self.auth_url.unwrap_or_else(|| AUTH_USA.to_string()),
            service_url: self.service_url,
        };

        let http = match self.http_client {
            Some(client) => client,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build()?
            }
        };

        let session = auth::authenticate(&http, &credentials).await?;
        Ok(Connection {
            http,
            credentials,
            session: RwLock::new(Some(session)),
            refresh_gate: Mutex::new(()),
            retry_auth: self.retry_auth,
        })
    }
}

/// An authenticated connection to the Cloud Databases management API.
///
/// Construction authenticates eagerly; see [`Connection::builder`].
/// Operations on one connection may run concurrently - session reads and
/// refreshes are synchronized internally, and at most one
/// re-authentication is in flight at a time.
#[derive(Debug)]
pub struct Connection {
    http: reqwest::Client,
    credentials: Credentials,
    session: RwLock<Option<Session>>,
    refresh_gate: Mutex<()>,
    retry_auth: bool,
}

impl Connection {
    /// Create a builder for a new connection
    #[must_use]
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Whether the connection currently holds an authenticated session
    pub async fn authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Current bearer token, if authenticated
    pub async fn auth_token(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.token.clone())
    }

    /// Current service location, if authenticated
    pub async fn service_location(&self) -> Option<ServiceLocation> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.location.clone())
    }

    /// Returns the list of available database instances.
    ///
    /// # Errors
    ///
    /// Returns a classified [`CloudDbError::Api`] fault on any non-2xx
    /// response.
    pub async fn list_instances(&self) -> Result<Vec<InstanceInfo>> {
        let response = self.service_request(Method::GET, "/instances", None).await?;
        response.ensure_success()?;
        let envelope: InstancesEnvelope = response.json()?;
        Ok(envelope.instances)
    }

    /// Returns the list of available database instances with detail
    /// (hostname, flavor, volume, timestamps).
    ///
    /// # Errors
    ///
    /// Returns a classified [`CloudDbError::Api`] fault on any non-2xx
    /// response.
    pub async fn list_instances_detail(&self) -> Result<Vec<InstanceInfo>> {
        let response = self
            .service_request(Method::GET, "/instances/detail", None)
            .await?;
        response.ensure_success()?;
        let envelope: InstancesEnvelope = response.json()?;
        Ok(envelope.instances)
    }

    /// Creates a new database instance under this account and returns a
    /// handle to it.
    ///
    /// # Errors
    ///
    /// Returns [`CloudDbError::Syntax`] before any HTTP call when the
    /// parameters are invalid, and a classified fault when the API
    /// rejects the request.
    pub async fn create_instance(&self, params: CreateInstanceParams) -> Result<Instance<'_>> {
        params.validate()?;
        let body = serde_json::to_string(&CreateInstanceEnvelope { instance: &params })?;
        let response = self
            .service_request(Method::POST, "/instances", Some(body))
            .await?;
        response.ensure_success()?;
        let envelope: InstanceEnvelope = response.json()?;
        Ok(Instance::from_info(self, envelope.instance))
    }

    /// Fetches the instance with the given id and returns a populated
    /// handle.
    ///
    /// # Errors
    ///
    /// Returns an [`ItemNotFound`](crate::FaultKind::ItemNotFound) fault
    /// when no such instance exists.
    pub async fn instance(&self, id: &str) -> Result<Instance<'_>> {
        Instance::fetch(self, id).await
    }

    /// Returns the list of available database flavors.
    ///
    /// # Errors
    ///
    /// Returns a classified [`CloudDbError::Api`] fault on any non-2xx
    /// response.
    pub async fn list_flavors(&self) -> Result<Vec<FlavorInfo>> {
        let response = self.service_request(Method::GET, "/flavors", None).await?;
        response.ensure_success()?;
        let envelope: FlavorsEnvelope = response.json()?;
        Ok(envelope.flavors)
    }

    /// Returns the list of available database flavors with detail
    /// (RAM, vCPU counts).
    ///
    /// # Errors
    ///
    /// Returns a classified [`CloudDbError::Api`] fault on any non-2xx
    /// response.
    pub async fn list_flavors_detail(&self) -> Result<Vec<FlavorInfo>> {
        let response = self
            .service_request(Method::GET, "/flavors/detail", None)
            .await?;
        response.ensure_success()?;
        let envelope: FlavorsEnvelope = response.json()?;
        Ok(envelope.flavors)
    }

    /// Fetches the flavor with the given id and returns a populated
    /// handle.
    ///
    /// # Errors
    ///
    /// Returns a classified [`CloudDbError::Api`] fault on any non-2xx
    /// response.
    pub async fn flavor(&self, id: &str) -> Result<Flavor<'_>> {
        Flavor::fetch(self, id).await
    }

    /// Issue a request against the account-scoped service location.
    /// `suffix` extends the location's base path.
    pub(crate) async fn service_request(
        &self,
        method: Method,
        suffix: &str,
        body: Option<String>,
    ) -> Result<ApiResponse> {
        let location = self.service_location().await.ok_or_else(|| {
            CloudDbError::authentication("connection is not authenticated")
        })?;
        let path = format!("{}{}", location.path, suffix);
        self.execute(ApiRequest {
            method,
            location,
            path,
            headers: HeaderMap::new(),
            body,
        })
        .await
    }

    /// The request pipeline: dispatch, then handle expired-token signals.
    ///
    /// A 401 is treated as token expiry, not a generic fault. When the
    /// retry policy allows it the session is refreshed and the original
    /// request re-issued, up to a bounded number of re-authentication
    /// attempts. Any other status is returned unclassified.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut reauth_attempts = 0;
        loop {
            let used_token = self.auth_token().await;
            let response = self.dispatch(&request).await?;
            if response.status != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }
            if !self.retry_auth {
                return Err(CloudDbError::connection(
                    "authentication token expired and re-authentication is disabled",
                ));
            }
            if reauth_attempts >= MAX_REAUTH_ATTEMPTS {
                return Err(CloudDbError::connection(format!(
                    "authentication token still rejected after {reauth_attempts} \
                     re-authentication attempts"
                )));
            }
            reauth_attempts += 1;
            tracing::debug!(attempt = reauth_attempts, "token expired, re-authenticating");
            self.refresh_session(used_token.as_deref()).await?;
        }
    }

    /// Dispatch with bounded transport retries. Connection-reset class
    /// failures are retried with a fresh connection from the pool; other
    /// HTTP errors propagate immediately.
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = format!(
            "{}://{}:{}{}",
            request.location.scheme, request.location.host, request.location.port, request.path
        );
        for attempt in 1..=MAX_TRANSPORT_ATTEMPTS {
            match self.roundtrip(request, &url).await {
                Ok(response) => {
                    tracing::debug!(method = %request.method, %url, status = %response.status, "response received");
                    return Ok(response);
                }
                Err(err) if is_transient(&err) && attempt < MAX_TRANSPORT_ATTEMPTS => {
                    tracing::warn!(
                        attempt,
                        host = %request.location.host,
                        error = %err,
                        "transport failure, retrying"
                    );
                }
                Err(err) if is_transient(&err) => {
                    return Err(CloudDbError::connection(format!(
                        "unable to reconnect to {} after {} attempts",
                        request.location.host, MAX_TRANSPORT_ATTEMPTS
                    )));
                }
                Err(err) => return Err(err.into()),
            }
        }
        // loop always returns within MAX_TRANSPORT_ATTEMPTS iterations
        Err(CloudDbError::connection(format!(
            "unable to reconnect to {} after {} attempts",
            request.location.host, MAX_TRANSPORT_ATTEMPTS
        )))
    }

    /// One request/response round trip with full header assembly.
    async fn roundtrip(
        &self,
        request: &ApiRequest,
        url: &str,
    ) -> std::result::Result<ApiResponse, reqwest::Error> {
        let headers = self.prepare_headers(request).await;
        let mut call = self.http.request(request.method.clone(), url).headers(headers);
        if let Some(body) = &request.body {
            call = call.body(body.clone());
        }
        let response = call.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    /// Merge caller-supplied headers over the standard defaults. The auth
    /// token is read from the current session, so a retried request picks
    /// up a refreshed token.
    async fn prepare_headers(&self, request: &ApiRequest) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("Keep-Alive"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(crate::USER_AGENT));
        let body_len = request.body.as_ref().map_or(0, String::len);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body_len));
        if let Some(session) = self.session.read().await.as_ref() {
            if let Ok(value) = HeaderValue::from_str(&session.token) {
                headers.insert(X_AUTH_TOKEN, value);
            }
        }
        for (name, value) in &request.headers {
            headers.insert(name.clone(), value.clone());
        }
        headers
    }

    /// Replace the session with a freshly authenticated one.
    ///
    /// Refreshes are serialized: callers queue on the gate, and a caller
    /// whose token was already replaced while it waited adopts the new
    /// session instead of re-authenticating again. On failure the session
    /// is left unauthenticated and the error propagates.
    async fn refresh_session(&self, stale_token: Option<&str>) -> Result<()> {
        let _gate = self.refresh_gate.lock().await;
        let current = self
            .session
            .read()
            .await
            .as_ref()
            .map(|session| session.token.clone());
        if let (Some(current), Some(stale)) = (current.as_deref(), stale_token) {
            if current != stale {
                tracing::debug!("session already refreshed by a concurrent caller");
                return Ok(());
            }
        }
        match auth::authenticate(&self.http, &self.credentials).await {
            Ok(session) => {
                *self.session.write().await = Some(session);
                Ok(())
            }
            Err(err) => {
                *self.session.write().await = None;
                Err(err)
            }
        }
    }
}

/// Connection-reset / broken-pipe / premature-EOF class failures that
/// warrant a transport-level retry.
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_body() || err.is_decode()
}
