use crate::{cli::actions::print_json, client::AuthenticatedClient};
use anyhow::Result;
use secrecy::SecretString;
use serde_json::json;
use tracing::info;

#[derive(Debug)]
pub enum Command {
    Login {
        email: String,
        password: SecretString,
        remember: bool,
    },
    LoginSaved,
    Register {
        name: String,
        email: String,
        password: SecretString,
    },
    Logout {
        forget: bool,
    },
    WhoAmI,
    Refresh,
}

/// # Errors
/// Returns the client error, which the caller maps to a sign-in prompt when
/// the session is gone.
pub async fn execute(client: &AuthenticatedClient, command: Command) -> Result<()> {
    match command {
        Command::Login {
            email,
            password,
            remember,
        } => {
            let identity = client.login(&email, &password).await?;
            if remember {
                client.credentials().remember_login(&email, &password)?;
                info!("credentials remembered for {email}");
            }
            print_json(&identity)
        }
        Command::LoginSaved => print_json(&client.login_saved().await?),
        Command::Register {
            name,
            email,
            password,
        } => print_json(&client.register(&name, &email, &password).await?),
        Command::Logout { forget } => {
            client.logout()?;
            if forget {
                client.credentials().forget_login()?;
            }
            print_json(&json!({ "signedOut": true }))
        }
        Command::WhoAmI => print_json(&client.load_identity().await?),
        Command::Refresh => {
            client.refresh().await?;
            print_json(&json!({ "refreshed": true }))
        }
    }
}
