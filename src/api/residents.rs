//! Resident roster endpoints.

use super::{CreatedId, resource_id};
use crate::client::{ApiError, ApiRequest, AuthenticatedClient, RequestBody};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resident {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub pg_year: u8,
    pub active: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewResident {
    pub name: String,
    pub pg_year: u8,
    pub active: bool,
}

/// Partial update. Only fields that are set are sent, so the server keeps its
/// values for everything else.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pg_year: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl ResidentPatch {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn pg_year(mut self, pg_year: u8) -> Self {
        self.pg_year = Some(pg_year);
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.pg_year.is_none() && self.active.is_none()
    }
}

impl AuthenticatedClient {
    /// Lists every resident the server returns, active or not. Expects 200.
    /// # Errors
    /// As `send`, plus `Decode` for a malformed list.
    pub async fn residents(&self) -> Result<Vec<Resident>, ApiError> {
        self.send(&ApiRequest::get("residents"))
            .await?
            .expect_status(&[StatusCode::OK])?
            .json()
    }

    /// Creates a resident and returns its id. Expects 201.
    /// # Errors
    /// As `send`; any status other than 201 is `UnexpectedStatus`.
    pub async fn create_resident(
        &self,
        name: &str,
        pg_year: u8,
        active: bool,
    ) -> Result<String, ApiError> {
        let body = RequestBody::CreateResident(NewResident {
            name: name.trim().to_string(),
            pg_year,
            active,
        });

        let created: CreatedId = self
            .send(&ApiRequest::post("residents", body))
            .await?
            .expect_status(&[StatusCode::CREATED])?
            .json()?;

        Ok(created.id)
    }

    /// Applies a partial update. Expects 200.
    /// # Errors
    /// Returns `InvalidInput` for an empty id, otherwise as `send`.
    pub async fn update_resident(&self, id: &str, patch: &ResidentPatch) -> Result<(), ApiError> {
        let id = resource_id(id)?;
        let request = ApiRequest::patch(
            format!("residents/{id}"),
            RequestBody::UpdateResident(patch.clone()),
        );

        self.send(&request)
            .await?
            .expect_status(&[StatusCode::OK])?;
        Ok(())
    }

    /// Expects 200 or 204.
    /// # Errors
    /// Returns `InvalidInput` for an empty id, otherwise as `send`.
    pub async fn delete_resident(&self, id: &str) -> Result<(), ApiError> {
        let id = resource_id(id)?;

        self.send(&ApiRequest::delete(format!("residents/{id}")))
            .await?
            .expect_status(&[StatusCode::OK, StatusCode::NO_CONTENT])?;
        Ok(())
    }
}
