mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use memoport_lib::importer::{default_config_path, load_import_config, ImportConfig};

#[derive(Parser)]
#[command(name = "memoport-cli", about = "Import memo exports into a Markdown vault", version)]
struct Cli {
    /// Settings file (default: <config dir>/memoport/import.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Import an export archive into a vault
    Import {
        /// Export archive (.zip or .tar)
        archive: PathBuf,
        /// Vault directory (default: settings file, then current directory)
        #[arg(long)]
        vault: Option<PathBuf>,
        /// Vault folder to import under ("" for the vault root)
        #[arg(long)]
        target: Option<String>,
        /// Folder under the target holding memo files
        #[arg(long)]
        memos: Option<String>,
        /// Write one file per day
        #[arg(long)]
        merge_by_date: bool,
        /// Keep escaped double brackets as they are
        #[arg(long)]
        no_bilink: bool,
    },

    /// Show what an archive contains without importing it
    Preview {
        /// Export archive (.zip or .tar)
        archive: PathBuf,
    },

    /// Print the effective settings
    Config,
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ImportConfig> {
    match path.or_else(default_config_path) {
        Some(path) => load_import_config(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(ImportConfig::default()),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.config)?;

    match cli.command {
        Command::Import {
            archive,
            vault,
            target,
            memos,
            merge_by_date,
            no_bilink,
        } => {
            config.archive_path = archive;
            if let Some(vault) = vault {
                config.vault_base = vault;
            }
            if config.vault_base.as_os_str().is_empty() {
                config.vault_base =
                    std::env::current_dir().context("Failed to resolve current directory")?;
            }
            if let Some(target) = target {
                config.target_root = target;
            }
            if let Some(memos) = memos {
                config.memo_subfolder = memos;
            }
            config.merge_by_date |= merge_by_date;
            config.allow_bi_link &= !no_bilink;

            commands::import::run(&config, &cli.format).await?;
        }
        Command::Preview { archive } => {
            commands::preview::run(&archive, &config, &cli.format).await?;
        }
        Command::Config => {
            commands::config::run(&config, &cli.format)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
