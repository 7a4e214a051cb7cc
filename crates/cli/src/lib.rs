pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use panelquote_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "panelquote",
    about = "Panel quotation risk and BOM pricing CLI",
    long_about = "Classify free-text panel orders, score their risk, build the bill of materials and price it against a catalog snapshot.",
    after_help = "Examples:\n  panelquote quote \"cotizar isodec eps 100 mm techo, luz 4 m, 10 paneles de 6 m\"\n  panelquote batch orders.jsonl --workers 8\n  panelquote regress\n  panelquote doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Configuration file (defaults to panelquote.toml)")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Catalog TOML replacing the built-in catalog")]
    pub catalog: Option<PathBuf>,
    #[arg(long, global = true, help = "Log level written to stderr")]
    pub log_level: Option<String>,
    #[arg(long, global = true, help = "Log format: compact|pretty|json")]
    pub log_format: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(about = "Quote one order text and print the quotation as JSON")]
    Quote(commands::quote::QuoteArgs),
    #[command(about = "Quote a file of orders with bounded parallel workers")]
    Batch(commands::batch::BatchArgs),
    #[command(about = "Run the regression suite and report per-case outcomes")]
    Regress(commands::regress::RegressArgs),
    #[command(about = "Run seeded synthetic orders and check pipeline invariants")]
    Stress(commands::stress::StressArgs),
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, catalog loading and a sample quotation")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

impl Cli {
    pub fn load_options(&self) -> Result<LoadOptions, String> {
        let log_format = self
            .log_format
            .as_deref()
            .map(str::parse::<LogFormat>)
            .transpose()
            .map_err(|error| error.to_string())?;
        let max_workers = match &self.command {
            Command::Batch(args) => args.workers,
            _ => None,
        };

        Ok(LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config.clone(),
            overrides: ConfigOverrides {
                catalog_path: self.catalog.clone(),
                log_level: self.log_level.clone(),
                log_format,
                max_workers,
            },
        })
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let result = execute(&cli);
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Runs a parsed command line; logging goes to stderr so stdout stays machine-readable.
pub fn execute(cli: &Cli) -> commands::CommandResult {
    let options = match cli.load_options() {
        Ok(options) => options,
        Err(message) => {
            return commands::CommandResult::failure(
                "cli",
                "bad_request",
                message,
                commands::EXIT_BAD_INPUT,
            )
        }
    };

    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config);
    }

    match &cli.command {
        Command::Quote(args) => commands::quote::run(&options, args),
        Command::Batch(args) => commands::batch::run(&options, args),
        Command::Regress(args) => commands::regress::run(&options, args),
        Command::Stress(args) => commands::stress::run(&options, args),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Doctor { json } => commands::doctor::run(&options, *json),
    }
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed when commands run inside tests.
    let _ = match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
}
