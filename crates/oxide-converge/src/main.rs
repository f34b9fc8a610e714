//! oxide-converge CLI
//!
//! Command-line tool for running schema tasks.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use oxide_converge::prelude::*;
use oxide_converge::{logging, Generator, Verbosity};

/// Desired-state schema convergence.
#[derive(Parser)]
#[command(name = "oxide-converge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file with the named database configurations.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database URL, used when no configuration file is given.
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Increase output (-v for progress, -vv for statements).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all log output.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tasks of the given directories.
    Up {
        /// Task directory (repeatable).
        #[arg(short, long, required = true)]
        path: Vec<PathBuf>,
    },

    /// Print the schema of a database as JSON.
    Snapshot {
        /// Configured database name (the first one if not specified).
        #[arg(short, long, default_value = "")]
        name: String,
    },

    /// Write task stubs for the existing schema.
    Generate {
        /// Output directory.
        #[arg(short, long, default_value = "tasks")]
        out: PathBuf,

        /// Configured database name (the first one if not specified).
        #[arg(short, long, default_value = "")]
        name: String,
    },
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::from_file(path),
            None => Ok(Config::new().database("default", DatabaseConfig::sqlite(&self.database))),
        }
    }
}

async fn open_model(config: &Config, name: &str) -> Result<SchemaModel> {
    let (resolved, db) = config.get(name)?;
    SchemaModel::connect(
        resolved,
        db.clone(),
        Arc::new(SqliteConnectionFactory),
        Arc::new(DefaultNaming),
    )
    .await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        Verbosity::from_count(cli.verbose)
    };
    logging::init(verbosity)?;

    let config = cli.load_config()?;

    match cli.command {
        Commands::Up { path } => {
            let scheduler = path
                .iter()
                .fold(Scheduler::new(config)?, |scheduler, dir| scheduler.path(dir));
            let report = scheduler.run().await?;

            for task in &report.executed {
                println!("  Applied {task}");
            }
            for task in &report.missing {
                println!("  Missing {task}");
            }
            info!(executed = report.executed.len(), "Done");
        }

        Commands::Snapshot { name } => {
            let model = open_model(&config, &name).await?;
            println!("{}", serde_json::to_string_pretty(model.applied())?);
            model.close().await?;
        }

        Commands::Generate { out, name } => {
            let model = open_model(&config, &name).await?;
            let files = Generator::new(&out).generate(model.applied(), &name)?;
            for file in &files {
                println!("  Created {}", file.display());
            }
            model.close().await?;
        }
    }

    Ok(())
}
