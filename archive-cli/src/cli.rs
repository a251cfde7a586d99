use std::path::PathBuf;

use anyhow::Context;
use archive_core::{
    Config, WeatherStore, WeatherTable, cache::ResponseCache, pipeline, provider_from_config,
};
use clap::{Parser, Subcommand};

const PREVIEW_ROWS: usize = 5;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "weather-archive",
    version,
    about = "Fetch historical daily weather and store it in SQLite"
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level (cache hits and misses). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch all configured ranges and replace the stored table (the default).
    Run,

    /// Print rows currently in the database.
    Show {
        /// Maximum number of rows to print.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Inspect or create the config file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Manage the HTTP response cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print where the config file is read from.
    Path,
    /// Write the built-in defaults to the config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Delete every cached response.
    Clear,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = match &self.config {
            Some(path) => path.clone(),
            None => Config::config_file_path()?,
        };

        match self.command.unwrap_or(Command::Run) {
            Command::Run => {
                let config = Config::load_from(&config_path)?;
                let provider = provider_from_config(&config)?;

                let table = pipeline::fetch(&config, provider.as_ref()).await?;

                if table.is_empty() {
                    println!("No weather data available. Check API response.");
                    return Ok(());
                }

                print!("{}", table.preview(PREVIEW_ROWS));

                let summary = pipeline::load(&config, &table)?;
                println!(
                    "Stored {} days in {} ({} duplicate dates dropped).",
                    summary.inserted,
                    config.database_path.display(),
                    summary.duplicates_removed
                );
            }
            Command::Show { limit } => {
                let config = Config::load_from(&config_path)?;
                let store = WeatherStore::open(&config.database_path).with_context(|| {
                    format!("Failed to open database {}", config.database_path.display())
                })?;
                let rows = store.records()?;

                if rows.is_empty() {
                    println!("No weather data stored in {}.", config.database_path.display());
                } else {
                    let total = rows.len();
                    print!("{}", WeatherTable::new(rows).preview(limit));
                    println!("{total} rows total.");
                }
            }
            Command::Config { action: ConfigAction::Path } => {
                println!("{}", config_path.display());
            }
            Command::Config { action: ConfigAction::Init { force } } => {
                if config_path.exists() && !force {
                    anyhow::bail!(
                        "Config file already exists at {}.\n\
                         Hint: pass --force to overwrite it.",
                        config_path.display()
                    );
                }
                Config::default().save_to(&config_path)?;
                println!("Wrote default config to {}", config_path.display());
            }
            Command::Cache { action: CacheAction::Clear } => {
                let config = Config::load_from(&config_path)?;
                let cache = ResponseCache::new(config.cache_dir()?);
                cache.clear().await?;
                println!("Cleared response cache at {}", cache.dir().display());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["weather-archive"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn show_accepts_limit_and_global_config() {
        let cli =
            Cli::try_parse_from(["weather-archive", "show", "--limit", "3", "--config", "x.toml"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Some(Command::Show { limit: 3 })));
    }

    #[test]
    fn cache_clear_parses() {
        let cli = Cli::try_parse_from(["weather-archive", "cache", "clear"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Cache { action: CacheAction::Clear })));
    }
}
