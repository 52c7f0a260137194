use crate::{
    api::residents::{Resident, ResidentPatch},
    cli::actions::print_json,
    client::AuthenticatedClient,
};
use anyhow::{Result, bail};
use serde_json::json;

#[derive(Debug)]
pub enum Command {
    List { active_only: bool },
    Create { name: String, pg_year: u8, active: bool },
    Update { id: String, patch: ResidentPatch },
    Delete { id: String },
}

/// The API returns every resident; the roster screen shows only active ones.
#[must_use]
pub fn active_only(residents: Vec<Resident>) -> Vec<Resident> {
    residents.into_iter().filter(|resident| resident.active).collect()
}

/// # Errors
/// Returns the client error, or an error for an update with nothing to change.
pub async fn execute(client: &AuthenticatedClient, command: Command) -> Result<()> {
    match command {
        Command::List { active_only: only } => {
            let residents = client.residents().await?;
            let residents = if only { active_only(residents) } else { residents };
            print_json(&residents)
        }
        Command::Create {
            name,
            pg_year,
            active,
        } => {
            let id = client.create_resident(&name, pg_year, active).await?;
            print_json(&json!({ "id": id }))
        }
        Command::Update { id, patch } => {
            if patch.is_empty() {
                bail!("nothing to update, pass --name, --pg-year, or --active");
            }
            client.update_resident(&id, &patch).await?;
            print_json(&json!({ "updated": id }))
        }
        Command::Delete { id } => {
            client.delete_resident(&id).await?;
            print_json(&json!({ "deleted": id }))
        }
    }
}
