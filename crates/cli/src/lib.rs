pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use cobuy_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};
use rust_decimal::Decimal;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(
    name = "cobuy",
    about = "Cobuy co-purchase recommender CLI",
    long_about = "Record co-purchases, query suggestions, manage the catalog, and check runtime readiness.",
    after_help = "Examples:\n  cobuy record 1 2 3\n  cobuy suggest 2 3 --limit 4\n  cobuy doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Record that the given products were bought together")]
    Record {
        #[arg(long, help = "Order reference to attach to the recording")]
        order_id: Option<String>,
        #[arg(required = true, help = "Product ids purchased together")]
        product_ids: Vec<String>,
    },
    #[command(about = "Suggest products frequently bought with the given products")]
    Suggest {
        #[arg(required = true, help = "Product ids to base suggestions on")]
        product_ids: Vec<String>,
        #[arg(long, help = "Maximum suggestions (defaults to recommender.default_limit)")]
        limit: Option<usize>,
        #[arg(long, help = "Return ranked ids with scores instead of catalog products")]
        scores: bool,
    },
    #[command(about = "Delete learned affinities for the given products, or for the whole catalog")]
    Purge {
        #[arg(help = "Product ids to purge; purges every catalog product when omitted")]
        product_ids: Vec<String>,
    },
    #[command(subcommand, about = "Manage catalog products")]
    Catalog(CatalogCommand),
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, affinity store reachability, and catalog connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum CatalogCommand {
    #[command(about = "Insert or update a catalog product")]
    Add {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        slug: String,
        #[arg(long)]
        price: Decimal,
        #[arg(long, help = "Mark the product as not available for sale")]
        unavailable: bool,
    },
    #[command(about = "Remove a catalog product")]
    Remove { id: String },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&load_logging_config());

    let result = match cli.command {
        Command::Record { order_id, product_ids } => {
            commands::record::run(order_id.as_deref(), &product_ids)
        }
        Command::Suggest { product_ids, limit, scores } => {
            commands::suggest::run(&product_ids, limit, scores)
        }
        Command::Purge { product_ids } => commands::purge::run(&product_ids),
        Command::Catalog(CatalogCommand::Add { id, name, slug, price, unavailable }) => {
            commands::catalog::add(commands::catalog::NewProduct {
                id,
                name,
                slug,
                price,
                available: !unavailable,
            })
        }
        Command::Catalog(CatalogCommand::Remove { id }) => commands::catalog::remove(&id),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn load_logging_config() -> LoggingConfig {
    AppConfig::load(LoadOptions::default())
        .map(|config| config.logging)
        .unwrap_or_else(|_| AppConfig::default().logging)
}

/// Logs go to stderr so stdout carries only command output.
pub fn init_logging(config: &LoggingConfig) {
    let level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr);

    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
