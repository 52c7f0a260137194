//! Typed operations for the Resident Feedback endpoints. Each operation picks
//! the status it requires, builds its request body from the closed
//! `RequestBody` set, and decodes the response. Data is returned exactly as the
//! server sent it; filtering and sorting belong to callers.

pub mod assessments;
pub mod auth;
pub mod residents;

use crate::client::ApiError;
use serde::{Deserialize, Serialize};

/// Body of a create response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatedId {
    pub id: String,
}

/// Trims a resource id and rejects values that would change the request path.
pub(crate) fn resource_id(id: &str) -> Result<&str, ApiError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidInput("resource id is required".to_string()));
    }
    if trimmed.contains(['/', '\\', '?', '#']) || is_dot_segment(trimmed) {
        return Err(ApiError::InvalidInput(format!(
            "resource id contains reserved characters: {trimmed}"
        )));
    }
    Ok(trimmed)
}

/// `.` and `..`, including the percent-encoded forms URL parsing resolves.
fn is_dot_segment(id: &str) -> bool {
    let decoded = id.to_ascii_lowercase().replace("%2e", ".");
    matches!(decoded.as_str(), "." | "..")
}
