mod commands;
mod config;
mod server;
mod views;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_food_add, cmd_food_delete, cmd_food_list, cmd_meal_add, cmd_meal_delete, cmd_meal_list,
};
use crate::config::Config;
use wgze_core::db::Database;

#[derive(Parser)]
#[command(
    name = "wgze",
    version,
    about = "Was gab's zu essen? Track what you ate and when",
    long_about = "\n\n  🍽️  WGZE - was gab's zu essen?\n\n  \
        Keeps a list of dishes and the days you ate them, so you can see\n  \
        at a glance what has not been on the table for a while.\n"
)]
struct Cli {
    /// Path to the SQLite database (default: wgze.db in the data directory)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web app
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Directory served under /static
        #[arg(long, value_name = "PATH", default_value = "static")]
        static_dir: PathBuf,
    },
    /// Manage foods
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Log and list meals
    Meal {
        #[command(subcommand)]
        command: MealCommands,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Add a food
    Add {
        /// Food name
        name: String,
        /// Notes or recipe
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List foods, least recently eaten first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a food and all of its meals
    Delete {
        /// Food ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MealCommands {
    /// Log a meal for an existing food
    Add {
        /// Food name (must already exist)
        food: String,
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Optional notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List meals, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a meal by ID
    Delete {
        /// Meal ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(path) = cli.db {
        config = config.with_db_path(path)?;
    }
    debug!(
        data_dir = %config.data_dir.display(),
        db = %config.db_path.display(),
        "opening database"
    );
    let db = Database::open(&config.db_path)?;

    match cli.command {
        Commands::Serve {
            port,
            bind,
            static_dir,
        } => server::start_server(db, &bind, port, &static_dir).await,
        Commands::Food { command } => match command {
            FoodCommands::Add { name, notes, json } => {
                cmd_food_add(&db, &name, notes.as_deref(), json)
            }
            FoodCommands::List { json } => cmd_food_list(&db, json),
            FoodCommands::Delete { id, json } => cmd_food_delete(&db, id, json),
        },
        Commands::Meal { command } => match command {
            MealCommands::Add {
                food,
                date,
                notes,
                json,
            } => cmd_meal_add(&db, &food, date.as_deref(), notes.as_deref(), json),
            MealCommands::List { json } => cmd_meal_list(&db, json),
            MealCommands::Delete { id, json } => cmd_meal_delete(&db, id, json),
        },
    }
}
