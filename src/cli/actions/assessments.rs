use crate::{api::assessments::AssessmentDraft, cli::actions::print_json, client::AuthenticatedClient};
use anyhow::Result;
use serde_json::json;

#[derive(Debug)]
pub enum Command {
    List { resident_id: String },
    Create(AssessmentDraft),
    Delete { id: String },
}

/// # Errors
/// Returns the client error.
pub async fn execute(client: &AuthenticatedClient, command: Command) -> Result<()> {
    match command {
        Command::List { resident_id } => print_json(&client.assessments(&resident_id).await?),
        Command::Create(draft) => {
            client.create_assessment(&draft).await?;
            print_json(&json!({ "created": true, "residentId": draft.resident_id }))
        }
        Command::Delete { id } => {
            client.delete_assessment(&id).await?;
            print_json(&json!({ "deleted": id }))
        }
    }
}
