use crate::{
    api::{
        assessments::{AssessmentDraft, CaseComplexity, TrustLevel},
        residents::ResidentPatch,
    },
    cli::{
        actions::{Action, assessments, residents, session},
        globals::{GlobalArgs, default_store_path},
    },
    client::Environment,
};
use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};

fn required(matches: &ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing required argument: --{name}"))
}

fn globals(matches: &ArgMatches) -> GlobalArgs {
    let base_url = match matches.get_one::<String>("base-url") {
        Some(url) => url.clone(),
        None if matches.get_flag("local") => Environment::Local.base_url().to_string(),
        None => Environment::Production.base_url().to_string(),
    };

    let store_path = matches
        .get_one::<String>("store")
        .map_or_else(default_store_path, PathBuf::from);

    let mut globals = GlobalArgs::new(base_url, store_path);
    if let Some(seconds) = matches.get_one::<u64>("timeout") {
        globals.set_request_timeout(Duration::from_secs(*seconds));
    }
    globals
}

fn login(sub_m: &ArgMatches) -> Result<session::Command> {
    if sub_m.get_flag("saved") {
        return Ok(session::Command::LoginSaved);
    }

    Ok(session::Command::Login {
        email: required(sub_m, "email")?,
        password: SecretString::from(required(sub_m, "password")?),
        remember: sub_m.get_flag("remember"),
    })
}

fn residents(sub_m: &ArgMatches) -> Result<residents::Command> {
    match sub_m.subcommand() {
        Some(("list", m)) => Ok(residents::Command::List {
            active_only: m.get_flag("active-only"),
        }),
        Some(("create", m)) => Ok(residents::Command::Create {
            name: required(m, "name")?,
            pg_year: m
                .get_one::<u8>("pg-year")
                .copied()
                .context("missing required argument: --pg-year")?,
            active: !m.get_flag("inactive"),
        }),
        Some(("update", m)) => {
            let mut patch = ResidentPatch::default();
            if let Some(name) = m.get_one::<String>("name") {
                patch = patch.name(name.trim());
            }
            if let Some(pg_year) = m.get_one::<u8>("pg-year") {
                patch = patch.pg_year(*pg_year);
            }
            if let Some(active) = m.get_one::<bool>("active") {
                patch = patch.active(*active);
            }
            Ok(residents::Command::Update {
                id: required(m, "id")?,
                patch,
            })
        }
        Some(("delete", m)) => Ok(residents::Command::Delete {
            id: required(m, "id")?,
        }),
        _ => bail!("unknown residents command"),
    }
}

fn assessments(sub_m: &ArgMatches) -> Result<assessments::Command> {
    match sub_m.subcommand() {
        Some(("list", m)) => Ok(assessments::Command::List {
            resident_id: required(m, "resident")?,
        }),
        Some(("create", m)) => {
            let complexity = m
                .get_one::<String>("complexity")
                .map(|raw| raw.parse::<CaseComplexity>())
                .transpose()
                .map_err(|e| anyhow!(e))?;
            let trust_level = m
                .get_one::<String>("trust-level")
                .map(|raw| raw.parse::<TrustLevel>())
                .transpose()
                .map_err(|e| anyhow!(e))?;

            Ok(assessments::Command::Create(AssessmentDraft {
                resident_id: required(m, "resident")?,
                surgery_type: required(m, "surgery-type")?,
                complexity,
                trust_level,
                feedback: required(m, "feedback")?,
                note: m.get_one::<String>("note").cloned(),
            }))
        }
        Some(("delete", m)) => Ok(assessments::Command::Delete {
            id: required(m, "id")?,
        }),
        _ => bail!("unknown assessments command"),
    }
}

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let globals = globals(matches);

    match matches.subcommand() {
        Some(("login", sub_m)) => Ok(Action::Session(globals, login(sub_m)?)),
        Some(("register", sub_m)) => Ok(Action::Session(
            globals,
            session::Command::Register {
                name: required(sub_m, "name")?,
                email: required(sub_m, "email")?,
                password: SecretString::from(required(sub_m, "password")?),
            },
        )),
        Some(("logout", sub_m)) => Ok(Action::Session(
            globals,
            session::Command::Logout {
                forget: sub_m.get_flag("forget"),
            },
        )),
        Some(("whoami", _)) => Ok(Action::Session(globals, session::Command::WhoAmI)),
        Some(("refresh", _)) => Ok(Action::Session(globals, session::Command::Refresh)),
        Some(("residents", sub_m)) => Ok(Action::Residents(globals, residents(sub_m)?)),
        Some(("assessments", sub_m)) => Ok(Action::Assessments(globals, assessments(sub_m)?)),
        _ => bail!("unknown command"),
    }
}
