use crate::{
    client::{ApiError, AuthenticatedClient},
    cli::actions::{Action, assessments, residents, session},
};
use anyhow::{Result, anyhow};
use tracing::warn;

/// Execute the provided action.
// This is the single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    let (client, outcome) = match action {
        Action::Session(globals, command) => {
            let client = globals.client()?;
            let outcome = session::execute(&client, command).await;
            (client, outcome)
        }
        Action::Residents(globals, command) => {
            let client = globals.client()?;
            let outcome = residents::execute(&client, command).await;
            (client, outcome)
        }
        Action::Assessments(globals, command) => {
            let client = globals.client()?;
            let outcome = assessments::execute(&client, command).await;
            (client, outcome)
        }
    };

    outcome.or_else(|err| end_session_on_unauthenticated(&client, err))
}

/// An `Unauthenticated` failure means the stored session is unusable; drop it
/// so the next run starts from a clean sign-in.
fn end_session_on_unauthenticated(client: &AuthenticatedClient, err: anyhow::Error) -> Result<()> {
    match err.downcast_ref::<ApiError>() {
        Some(ApiError::Unauthenticated) => {
            if let Err(clear_err) = client.logout() {
                warn!("failed to clear session: {clear_err}");
            }
            Err(anyhow!("not signed in or session expired, run `resfeed login`"))
        }
        _ => Err(err),
    }
}
