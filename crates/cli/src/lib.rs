pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "leadops",
    about = "Leadops operator CLI",
    long_about = "Operate the lead pipeline database: migrations, demo data, readiness checks, config inspection and lead lookups.",
    after_help = "Examples:\n  leadops doctor --json\n  leadops seed\n  leadops leads --user-id 1 --follow-up"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset and verify it")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity and schema version")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List the current leads of the manager behind a user id")]
    Leads {
        #[arg(long, help = "User id of the account manager")]
        user_id: i64,
        #[arg(long, help = "List follow-up leads instead of direct leads")]
        follow_up: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Leads { user_id, follow_up } => commands::leads::run(user_id, follow_up),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
