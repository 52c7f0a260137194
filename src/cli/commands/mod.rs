use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

fn email_arg() -> Arg {
    Arg::new("email")
        .short('e')
        .long("email")
        .help("Account email")
        .env("RESFEED_EMAIL")
}

fn password_arg() -> Arg {
    Arg::new("password")
        .short('p')
        .long("password")
        .help("Account password")
        .env("RESFEED_PASSWORD")
        .hide_env_values(true)
}

fn id_arg(help: &'static str) -> Arg {
    Arg::new("id").help(help).required(true)
}

fn residents_command() -> Command {
    Command::new("residents")
        .about("Manage the resident roster")
        .subcommand_required(true)
        .subcommand(
            Command::new("list").about("List residents").arg(
                Arg::new("active-only")
                    .long("active-only")
                    .help("Only show active residents")
                    .action(ArgAction::SetTrue),
            ),
        )
        .subcommand(
            Command::new("create")
                .about("Add a resident")
                .arg(
                    Arg::new("name")
                        .short('n')
                        .long("name")
                        .help("Resident name")
                        .required(true),
                )
                .arg(
                    Arg::new("pg-year")
                        .short('y')
                        .long("pg-year")
                        .help("Post-graduate year")
                        .required(true)
                        .value_parser(clap::value_parser!(u8).range(1..=10)),
                )
                .arg(
                    Arg::new("inactive")
                        .long("inactive")
                        .help("Create the resident as inactive")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("update")
                .about("Change selected fields of a resident")
                .arg(id_arg("Resident id"))
                .arg(Arg::new("name").short('n').long("name").help("New name"))
                .arg(
                    Arg::new("pg-year")
                        .short('y')
                        .long("pg-year")
                        .help("New post-graduate year")
                        .value_parser(clap::value_parser!(u8).range(1..=10)),
                )
                .arg(
                    Arg::new("active")
                        .long("active")
                        .help("Mark the resident active or inactive")
                        .value_parser(clap::value_parser!(bool)),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Remove a resident")
                .arg(id_arg("Resident id")),
        )
}

fn assessments_command() -> Command {
    Command::new("assessments")
        .about("Record and review assessments")
        .subcommand_required(true)
        .subcommand(
            Command::new("list")
                .about("List assessments for a resident")
                .arg(
                    Arg::new("resident")
                        .short('r')
                        .long("resident")
                        .help("Resident id")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("create")
                .about("Submit an assessment")
                .arg(
                    Arg::new("resident")
                        .short('r')
                        .long("resident")
                        .help("Resident id")
                        .required(true),
                )
                .arg(
                    Arg::new("surgery-type")
                        .short('s')
                        .long("surgery-type")
                        .help("Procedure performed")
                        .required(true),
                )
                .arg(
                    Arg::new("feedback")
                        .short('f')
                        .long("feedback")
                        .help("Feedback for the resident")
                        .required(true),
                )
                .arg(
                    Arg::new("complexity")
                        .short('c')
                        .long("complexity")
                        .help("Case complexity: low, moderate, high"),
                )
                .arg(
                    Arg::new("trust-level")
                        .short('t')
                        .long("trust-level")
                        .help("Trust level: limited-participation, direct-supervision, indirect-supervision, practice-ready"),
                )
                .arg(Arg::new("note").long("note").help("Private note")),
        )
        .subcommand(
            Command::new("delete")
                .about("Remove an assessment")
                .arg(id_arg("Assessment id")),
        )
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("resfeed")
        .about("Resident Feedback client")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .help("API base URL, example: https://residentfeedback-api.onrender.com/")
                .env("RESFEED_BASE_URL")
                .global(true)
                .conflicts_with("local"),
        )
        .arg(
            Arg::new("local")
                .long("local")
                .help("Use the local development API at http://localhost:3000/")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .help("Session file (default: ~/.resfeed/session.json)")
                .env("RESFEED_STORE")
                .global(true),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("Request timeout in seconds")
                .default_value("30")
                .env("RESFEED_TIMEOUT")
                .global(true)
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .help("Emit logs as JSON")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("RESFEED_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .subcommand(
            Command::new("login")
                .about("Sign in and store the session")
                .arg(email_arg().required_unless_present("saved"))
                .arg(password_arg().required_unless_present("saved"))
                .arg(
                    Arg::new("remember")
                        .long("remember")
                        .help("Remember these credentials for `login --saved`")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("saved")
                        .long("saved")
                        .help("Sign in with remembered credentials")
                        .action(ArgAction::SetTrue)
                        .conflicts_with_all(["email", "password", "remember"]),
                ),
        )
        .subcommand(
            Command::new("register")
                .about("Create an account and sign in")
                .arg(
                    Arg::new("name")
                        .short('n')
                        .long("name")
                        .help("Display name")
                        .required(true),
                )
                .arg(email_arg().required(true))
                .arg(password_arg().required(true)),
        )
        .subcommand(
            Command::new("logout")
                .about("Clear the stored session")
                .arg(
                    Arg::new("forget")
                        .long("forget")
                        .help("Also forget remembered credentials")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("whoami").about("Show the signed-in identity"))
        .subcommand(Command::new("refresh").about("Refresh the access token"))
        .subcommand(residents_command())
        .subcommand(assessments_command())
}
