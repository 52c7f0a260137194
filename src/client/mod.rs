//! Authenticated HTTP client for the Resident Feedback API.
//!
//! All outbound traffic goes through `AuthenticatedClient::send`, which owns the
//! retry policy. Typed operations for each endpoint live in `crate::api` and are
//! thin wrappers that pick the expected status and decode the body.
//!
//! Flow Overview:
//! - Build the URL from the configured base and the request path.
//! - Attach `Authorization: Bearer` when the request requires auth and a token exists.
//! - On 401 for an authorized request, join or start the shared refresh, then
//!   re-issue the original request once with the resulting token.
//! - A second 401 is `Unauthenticated`; any other non-2xx is `UnexpectedStatus`.
//!
//! Security boundary: tokens are only exposed while building the request header
//! and are never written to logs or error messages.

pub mod config;
pub mod error;
mod refresh;
pub mod request;

use crate::session::CredentialStore;
use reqwest::{StatusCode, header::CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tracing::{Instrument, debug, info_span, warn};
use url::Url;

pub use config::{ClientConfig, ConfigError, Environment};
pub use error::ApiError;
pub use request::{ApiRequest, ApiResponse, RequestBody};

/// Where the session stands from the client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Refreshing,
}

/// Cheap to clone; clones share the connection pool, the credential store,
/// and the refresh gate.
#[derive(Clone)]
pub struct AuthenticatedClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<CredentialStore>,
    refresh: refresh::RefreshGate,
    logins_in_flight: AtomicUsize,
}

impl AuthenticatedClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig, credentials: Arc<CredentialStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: config.base_url.clone(),
                credentials,
                refresh: refresh::RefreshGate::default(),
                logins_in_flight: AtomicUsize::new(0),
            }),
        })
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.inner.credentials
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    #[must_use]
    pub fn session_state(&self) -> SessionState {
        if self.inner.refresh.in_flight() {
            SessionState::Refreshing
        } else if self.inner.logins_in_flight.load(Ordering::SeqCst) > 0 {
            SessionState::Authenticating
        } else if self.inner.credentials.is_authenticated() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    /// Sends `request`, refreshing the session and retrying once on 401.
    /// # Errors
    /// Returns `Unauthenticated` if the session cannot be refreshed or the retry
    /// is rejected again, `UnexpectedStatus` for any other non-2xx response, and
    /// `Transport` for network failures.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let bearer = if request.requires_auth {
            self.inner.credentials.access_token()
        } else {
            None
        };

        let response = self.attempt(request, bearer.as_ref()).await?;
        if !(request.requires_auth && response.status == StatusCode::UNAUTHORIZED) {
            return ensure_success(response);
        }

        debug!("authorized request rejected, refreshing session");
        self.refresh_after(bearer.as_ref()).await?;

        let token = self
            .inner
            .credentials
            .access_token()
            .ok_or(ApiError::Unauthenticated)?;
        let retried = self.attempt(request, Some(&token)).await?;
        if retried.status == StatusCode::UNAUTHORIZED {
            warn!("request rejected after token refresh");
            return Err(ApiError::Unauthenticated);
        }

        ensure_success(retried)
    }

    /// One round trip with an explicit bearer token, no retry policy.
    pub(crate) async fn attempt(
        &self,
        request: &ApiRequest,
        bearer: Option<&SecretString>,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.endpoint_url(&request.path)?;

        let span = info_span!(
            "api.request",
            http.method = %request.method,
            url = %url,
            http.status = tracing::field::Empty
        );

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), url)
            .header(CONTENT_TYPE, "application/json");

        if let Some(token) = bearer {
            builder = builder.bearer_auth(token.expose_secret());
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.to_json()?);
        }

        async move {
            let response = builder.send().await?;
            let status = response.status();
            tracing::Span::current().record("http.status", status.as_u16());

            let body = response.bytes().await?;
            debug!("response received: {} bytes", body.len());

            Ok(ApiResponse { status, body })
        }
        .instrument(span)
        .await
    }

    /// Joins `path` below the base URL. A leading slash is ignored so the base
    /// path is preserved.
    /// # Errors
    /// Returns an error if the result is not a valid URL.
    pub fn endpoint_url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self
            .inner
            .base_url
            .join(path.trim().trim_start_matches('/'))?)
    }

    /// Marks a login or registration as in flight until the guard drops.
    pub(crate) fn authenticating(&self) -> LoginGuard<'_> {
        self.inner.logins_in_flight.fetch_add(1, Ordering::SeqCst);
        LoginGuard {
            counter: &self.inner.logins_in_flight,
        }
    }
}

pub(crate) struct LoginGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for LoginGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

fn ensure_success(response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if response.status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::unexpected(response.status, &response.body))
    }
}
