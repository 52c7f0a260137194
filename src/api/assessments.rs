//! Assessment submission and history endpoints.

use super::resource_id;
use crate::client::{ApiError, ApiRequest, AuthenticatedClient, RequestBody};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use url::form_urlencoded;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseComplexity {
    Low,
    Moderate,
    High,
}

impl CaseComplexity {
    pub const ALL: [Self; 3] = [Self::Low, Self::Moderate, Self::High];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        }
    }
}

/// Entrustment level; the wire values contain spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustLevel {
    #[serde(rename = "Limited Participation")]
    LimitedParticipation,
    #[serde(rename = "Direct Supervision")]
    DirectSupervision,
    #[serde(rename = "Indirect Supervision")]
    IndirectSupervision,
    #[serde(rename = "Practice Ready")]
    PracticeReady,
}

impl TrustLevel {
    pub const ALL: [Self; 4] = [
        Self::LimitedParticipation,
        Self::DirectSupervision,
        Self::IndirectSupervision,
        Self::PracticeReady,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LimitedParticipation => "Limited Participation",
            Self::DirectSupervision => "Direct Supervision",
            Self::IndirectSupervision => "Indirect Supervision",
            Self::PracticeReady => "Practice Ready",
        }
    }
}

impl fmt::Display for CaseComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive; spaces, dashes, and underscores are interchangeable.
fn normalize_label(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for CaseComplexity {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_label(raw);
        Self::ALL
            .into_iter()
            .find(|value| normalize_label(value.as_str()) == wanted)
            .ok_or_else(|| format!("unknown complexity: {raw}"))
    }
}

impl FromStr for TrustLevel {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_label(raw);
        Self::ALL
            .into_iter()
            .find(|value| normalize_label(value.as_str()) == wanted)
            .ok_or_else(|| format!("unknown trust level: {raw}"))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDraft {
    pub resident_id: String,
    pub surgery_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<CaseComplexity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_level: Option<TrustLevel>,
    pub feedback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    #[serde(rename = "_id")]
    pub id: String,
    pub surgeon_id: String,
    pub resident_id: String,
    pub surgery_type: String,
    pub complexity: Option<CaseComplexity>,
    pub trust_level: Option<TrustLevel>,
    pub note: Option<String>,
    pub feedback: String,
    pub created_at: Option<String>,
}

impl AuthenticatedClient {
    /// Submits an assessment. Expects 201.
    /// # Errors
    /// Returns `InvalidInput` when no resident is selected, otherwise as `send`.
    pub async fn create_assessment(&self, draft: &AssessmentDraft) -> Result<(), ApiError> {
        resource_id(&draft.resident_id)?;

        self.send(&ApiRequest::post(
            "assessments",
            RequestBody::CreateAssessment(draft.clone()),
        ))
        .await?
        .expect_status(&[StatusCode::CREATED])?;
        Ok(())
    }

    /// Lists assessments recorded for one resident. Expects 200.
    /// # Errors
    /// As `send`, plus `Decode` for a malformed list.
    pub async fn assessments(&self, resident_id: &str) -> Result<Vec<Assessment>, ApiError> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("residentId", resident_id.trim())
            .finish();

        self.send(&ApiRequest::get(format!("assessments?{query}")))
            .await?
            .expect_status(&[StatusCode::OK])?
            .json()
    }

    /// Expects 200 or 204.
    /// # Errors
    /// Returns `InvalidInput` for an empty id, otherwise as `send`.
    pub async fn delete_assessment(&self, id: &str) -> Result<(), ApiError> {
        let id = resource_id(id)?;

        self.send(&ApiRequest::delete(format!("assessments/{id}")))
            .await?
            .expect_status(&[StatusCode::OK, StatusCode::NO_CONTENT])?;
        Ok(())
    }
}
