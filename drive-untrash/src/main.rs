use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use drive_untrash::auth;
use drive_untrash::config::{ConfigOverrides, RestoreConfig};
use drive_untrash::logging::{LogFormat, init_logging};
use drive_untrash::restore::{FolderScope, run_restore};

#[derive(Debug, Parser)]
#[command(
    name = "drive-untrash",
    version,
    about = "Restore explicitly trashed items of a Google Drive",
    long_about = "Walks the given folders (or the whole drive when none are given) \
                  and untrashes every item that was trashed directly."
)]
struct Cli {
    /// Folder ids to restore; the whole drive when empty
    #[arg(value_parser = parse_folder_id)]
    folder_ids: Vec<String>,

    /// Show per-page and per-item progress
    #[arg(short, long)]
    verbose: bool,

    /// Maximum number of concurrent API calls
    #[arg(long)]
    max_connections: Option<usize>,

    /// Maximum attempts per API call
    #[arg(long)]
    retries: Option<u32>,

    /// Retry up to 50 times on rate limits and server errors
    #[arg(long)]
    aggressive: bool,

    /// List and count without restoring anything
    #[arg(long)]
    dry_run: bool,

    /// Remove the cached OAuth token and exit
    #[arg(long)]
    logout: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            max_connections: self.max_connections,
            retries: self.retries,
            aggressive: self.aggressive,
            dry_run: self.dry_run,
        }
    }

    fn roots(&self) -> Vec<FolderScope> {
        self.folder_ids
            .iter()
            .map(|id| FolderScope::folder(id.as_str(), id.as_str()))
            .collect()
    }
}

/// A blank id must not fall through to a whole-drive run.
fn parse_folder_id(raw: &str) -> Result<String, String> {
    let id = raw.trim();
    if id.is_empty() {
        Err("folder id must not be blank".to_string())
    } else {
        Ok(id.to_string())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose, LogFormat::from_env());

    let config = RestoreConfig::from_env().apply(&cli.overrides());
    if cli.logout {
        let storage = config
            .token_storage()
            .context("failed to resolve token cache location")?;
        storage.delete_token()?;
        info!(path = %storage.path().display(), "saved token removed");
        return Ok(());
    }

    let drive = auth::connect(&config).await?;
    let report = run_restore(Arc::new(drive), config.restore_options(), cli.roots()).await;
    info!(
        folders = report.folders_processed,
        restored = report.items_restored,
        failed = report.items_failed,
        listings_failed = report.listings_failed,
        duplicates = report.duplicate_references,
        "restore finished"
    );
    println!("{report}");
    Ok(())
}
