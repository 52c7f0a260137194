//! Sign-in, registration, token refresh, and identity loading. These payloads
//! carry passwords and tokens, so their `Debug` output is redacted and they
//! must never be logged.
//!
//! Flow Overview: login and register obtain a token pair, fetch `auth/me` with
//! the new access token, and only then commit pair and identity to the
//! credential store together. A failure anywhere leaves the store untouched.

use crate::{
    client::{ApiError, ApiRequest, AuthenticatedClient, RequestBody},
    session::{Identity, TokenPair},
};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPairResponse {
    access_token: String,
    refresh_token: String,
}

/// `auth/refresh` may rotate the refresh token or leave it out.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshResponse {
    pub(crate) access_token: String,
    #[serde(default)]
    pub(crate) refresh_token: Option<String>,
}

impl AuthenticatedClient {
    /// Signs in and loads the identity. Expects 200.
    /// # Errors
    /// Returns `UnexpectedStatus` for rejected credentials and `Decode` for a
    /// malformed token pair. The credential store is unchanged on any error.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<Identity, ApiError> {
        let _authenticating = self.authenticating();

        let request = ApiRequest::post(
            "auth/login",
            RequestBody::Login(LoginRequest {
                email: email.trim().to_string(),
                password: password.expose_secret().to_string(),
            }),
        )
        .unauthenticated();

        let tokens: TokenPairResponse = self
            .send(&request)
            .await?
            .expect_status(&[StatusCode::OK])?
            .json()?;

        self.establish_session(tokens).await
    }

    /// Signs in with credentials remembered in the secure store.
    /// # Errors
    /// Returns `Unauthenticated` when nothing is remembered, otherwise as `login`.
    pub async fn login_saved(&self) -> Result<Identity, ApiError> {
        let saved = self
            .credentials()
            .saved_login()?
            .ok_or(ApiError::Unauthenticated)?;
        self.login(&saved.email, &saved.password).await
    }

    /// Creates an account and signs in. Expects 201.
    /// # Errors
    /// As `login`.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, ApiError> {
        let _authenticating = self.authenticating();

        let request = ApiRequest::post(
            "auth/register",
            RequestBody::Register(RegisterRequest {
                name: name.trim().to_string(),
                email: email.trim().to_string(),
                password: password.expose_secret().to_string(),
            }),
        )
        .unauthenticated();

        let tokens: TokenPairResponse = self
            .send(&request)
            .await?
            .expect_status(&[StatusCode::CREATED])?
            .json()?;

        self.establish_session(tokens).await
    }

    /// Refreshes the access token, sharing any refresh already in flight.
    /// # Errors
    /// Returns `Unauthenticated` if no refresh token is stored, the server
    /// rejects it, or the session was cleared meanwhile.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let current = self.credentials().access_token();
        self.refresh_after(current.as_ref()).await
    }

    /// Fetches `auth/me` and caches it in the credential store. Expects 200.
    /// # Errors
    /// Returns `Unauthenticated` if the session ended before the identity
    /// arrived, otherwise as `send`.
    pub async fn load_identity(&self) -> Result<Identity, ApiError> {
        let epoch = self.credentials().epoch();

        let identity: Identity = self
            .send(&ApiRequest::get("auth/me"))
            .await?
            .expect_status(&[StatusCode::OK])?
            .json()?;

        if !self.credentials().set_identity(identity.clone(), epoch) {
            return Err(ApiError::Unauthenticated);
        }

        Ok(identity)
    }

    /// Completes a session hydrated from the secure store by loading the
    /// identity. Clears the session when the server no longer accepts it.
    /// Returns whether a usable session exists.
    /// # Errors
    /// Transport and unexpected status errors are returned and leave the
    /// session in place so it can be retried.
    pub async fn restore_session(&self) -> Result<bool, ApiError> {
        if !self.credentials().is_authenticated() {
            return Ok(false);
        }
        if self.credentials().identity().is_some() {
            return Ok(true);
        }

        match self.load_identity().await {
            Ok(_) => Ok(true),
            Err(ApiError::Unauthenticated) => {
                info!("stored session is no longer valid");
                self.logout()?;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Ends the local session. There is no server-side logout endpoint.
    /// # Errors
    /// Returns an error if the secure store cannot be cleared; memory is
    /// cleared regardless.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.credentials().clear()?;
        info!("signed out");
        Ok(())
    }

    pub(crate) async fn request_refresh(
        &self,
        refresh_token: &SecretString,
    ) -> Result<RefreshResponse, ApiError> {
        let request = ApiRequest::post(
            "auth/refresh",
            RequestBody::Refresh(RefreshRequest {
                refresh_token: refresh_token.expose_secret().to_string(),
            }),
        )
        .unauthenticated();

        self.attempt(&request, None)
            .await?
            .expect_status(&[StatusCode::OK])?
            .json()
    }

    async fn establish_session(&self, tokens: TokenPairResponse) -> Result<Identity, ApiError> {
        let pair = TokenPair::new(tokens.access_token, tokens.refresh_token);

        let response = self
            .attempt(&ApiRequest::get("auth/me"), Some(&pair.access_token))
            .await?;
        if response.status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthenticated);
        }
        let identity: Identity = response.expect_status(&[StatusCode::OK])?.json()?;

        self.credentials().set_session(pair, identity.clone())?;
        debug!("session established for role {}", identity.role);

        Ok(identity)
    }
}
