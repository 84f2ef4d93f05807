pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "replog",
    about = "Replog operator CLI",
    long_about = "Operate replog migrations, readiness checks, and one-shot chat runs.",
    after_help = "Examples:\n  replog migrate\n  replog doctor --json\n  replog chat --message \"Met Dr. Patel today\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Run one message through the chat pipeline and print the reply")]
    Chat {
        #[arg(long, help = "The interaction description to process")]
        message: String,
        #[arg(long, help = "Id of the most recently logged interaction, for anaphoric edits")]
        last_interaction_id: Option<i64>,
    },
    #[command(about = "Validate config, LLM provider readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Chat { message, last_interaction_id } => {
            commands::chat::run(&message, last_interaction_id)
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
