//! Request descriptors and raw responses. Bodies are a closed set, one variant
//! per endpoint, so every payload the client can send has a known JSON shape.

use super::error::ApiError;
use crate::api::{
    assessments::AssessmentDraft,
    auth::{LoginRequest, RefreshRequest, RegisterRequest},
    residents::{NewResident, ResidentPatch},
};
use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum RequestBody {
    Login(LoginRequest),
    Register(RegisterRequest),
    Refresh(RefreshRequest),
    CreateResident(NewResident),
    UpdateResident(ResidentPatch),
    CreateAssessment(AssessmentDraft),
}

impl RequestBody {
    /// # Errors
    /// Returns an error if the payload cannot be serialized.
    pub fn to_json(&self) -> Result<Vec<u8>, ApiError> {
        serde_json::to_vec(self).map_err(ApiError::Encode)
    }
}

/// One outbound call: where it goes, what it carries, and whether it needs the
/// bearer token.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub path: String,
    pub method: Method,
    pub body: Option<RequestBody>,
    pub requires_auth: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>, body: RequestBody) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>, body: RequestBody) -> Self {
        Self::new(Method::PATCH, path).with_body(body)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Authorized by default.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            body: None,
            requires_auth: true,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn unauthenticated(mut self) -> Self {
        self.requires_auth = false;
        self
    }
}

#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ApiResponse {
    /// Fails unless the status is one of `expected`.
    /// # Errors
    /// Returns `UnexpectedStatus` carrying the actual status.
    pub fn expect_status(self, expected: &[StatusCode]) -> Result<Self, ApiError> {
        if expected.contains(&self.status) {
            Ok(self)
        } else {
            Err(ApiError::unexpected(self.status, &self.body))
        }
    }

    /// # Errors
    /// Returns `Decode` if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(ApiError::Decode)
    }
}
