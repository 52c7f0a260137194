pub mod assessments;
pub mod residents;
pub mod session;

// Internal "interpreter" for `Action`.
mod run;

use crate::cli::globals::GlobalArgs;
use anyhow::Result;
use serde::Serialize;

#[derive(Debug)]
pub enum Action {
    Session(GlobalArgs, session::Command),
    Residents(GlobalArgs, residents::Command),
    Assessments(GlobalArgs, assessments::Command),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> Result<()> {
        run::execute(self).await
    }
}

/// Pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
