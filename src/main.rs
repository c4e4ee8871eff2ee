use crate::config::{AppConfig, ENV_ADDR, ENV_DB_PATH};
use crate::db::{init_db, Database};
use crate::domain::challenges::ChallengeClassifier;
use crate::domain::evaluator::FilterEngine;
use crate::responses::error_to_response;
use crate::router::{handle, AppState};
use astra::Server;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod db;
mod domain;
mod errors;
mod responses;
mod router;
mod spreadsheets;

#[cfg(test)]
mod tests;

#[derive(Parser)]
#[command(name = "water_screen")]
#[command(about = "Screens property listings for water and wastewater problems")]
struct Cli {
    /// SQLite file.
    #[arg(long, global = true, env = ENV_DB_PATH)]
    db: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve {
        /// Listen address.
        #[arg(long, env = ENV_ADDR)]
        addr: Option<SocketAddr>,
    },
    /// Load listing documents from a JSON file.
    Seed {
        #[arg(long)]
        file: PathBuf,
        /// Remove every stored property first.
        #[arg(long, default_value_t = false)]
        replace: bool,
    },
    /// Run a filter over the store and print the matches as JSON.
    Screen {
        /// Filter in query-string form, e.g. `state=AZ&noWaterAccess=true`.
        #[arg(long, default_value = "")]
        query: String,
        /// Include approved properties, not only pending ones.
        #[arg(long, default_value_t = false)]
        all: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    if let Some(db_path) = cli.db {
        config.db_path = db_path;
    }

    let db = Database::new(config.db_path.clone());
    if let Err(e) = init_db(&db) {
        error!(error = %e, "Database initialization failed");
        std::process::exit(1);
    }

    match cli.command.unwrap_or(Command::Serve { addr: None }) {
        Command::Seed { file, replace } => {
            if let Err(e) = commands::seed_from_file(&db, &file, replace) {
                error!(error = %e, "Seeding failed");
                std::process::exit(1);
            }
        }
        Command::Screen { query, all } => {
            let engine = build_engine(&config);
            match commands::screen_store(&db, &engine, &config.engine, &query, all) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    error!(error = %e, "Screening failed");
                    std::process::exit(1);
                }
            }
        }
        Command::Serve { addr } => {
            if let Some(addr) = addr {
                config.addr = addr;
            }
            serve(db, config);
        }
    }
}

fn build_engine(config: &AppConfig) -> FilterEngine {
    FilterEngine::new(ChallengeClassifier::new(&config.engine.challenge_table))
}

fn serve(db: Database, config: AppConfig) {
    let engine = build_engine(&config);
    let state = Arc::new(AppState::new(db, config.engine, engine));

    info!(
        addr = %config.addr,
        workers = config.max_workers,
        db = %state.db.path(),
        "Starting server"
    );

    let server = Server::bind(&config.addr).max_workers(config.max_workers);

    let result = server.serve(move |req, _info| {
        handle(req, &state).unwrap_or_else(error_to_response)
    });

    match result {
        Ok(()) => info!("Server shut down cleanly"),
        Err(e) => error!(error = %e, "Server ended with error"),
    }
}
