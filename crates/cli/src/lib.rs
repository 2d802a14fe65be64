pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use solvent_core::config::{AppConfig, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "solvent",
    about = "Solvent question-answering CLI",
    long_about = "Answer free-form questions through a bounded reasoning loop with \
capability dispatch, engine failover, and a persistent answer cache.",
    after_help = "Examples:\n  solvent ask \"What is 2+2?\"\n  solvent ask \"What is in the sheet?\" --attachment data.xlsx\n  solvent run --questions questions.json\n  solvent doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Answer a single question and print a structured result")]
    Ask {
        #[arg(help = "The question text")]
        question: String,
        #[arg(long, help = "Bare file name of an attachment in the attachments directory")]
        attachment: Option<String>,
    },
    #[command(about = "Answer a batch of questions from a JSON file, one result per question")]
    Run {
        #[arg(long, help = "Path to a JSON array of {id, text, attachment?} records")]
        questions: String,
    },
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
    #[command(about = "Validate config, cache readability, and engine reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

fn init_logging(config: &AppConfig) {
    use solvent_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Logging comes up before any command work; a broken config falls
    // back to default logging so the command can still report the error.
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => init_logging(&config),
        Err(_) => init_logging(&AppConfig::default()),
    }

    let result = match cli.command {
        Command::Ask { question, attachment } => {
            commands::ask::run(&question, attachment.as_deref())
        }
        Command::Run { questions } => commands::run::run(&questions),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
