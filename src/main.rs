use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mj_archive::{default_archive_folder, ArchiveConfig, Archiver, MidjourneyArchiver};

/// Archive Midjourney job metadata and images locally.
#[derive(Parser, Debug)]
#[command(name = "mj-archive", version)]
struct Cli {
    /// Archive folder (default: <pictures dir>/midjourney)
    #[arg(long)]
    archive_folder: Option<PathBuf>,

    /// Maximum listing pages per crawl
    #[arg(long)]
    limit: Option<u32>,

    /// Run the browser headless. The first run needs a visible window so
    /// the Midjourney login can be completed by hand.
    #[arg(long)]
    headless: bool,

    /// Emit debug artifacts (login screenshot in the debug log)
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mj_archive=debug")),
        )
        .init();

    let folder = cli.archive_folder.unwrap_or_else(default_archive_folder);
    let config = ArchiveConfig::new(folder)
        .with_page_limit(cli.limit)
        .with_headless(cli.headless)
        .with_debug(cli.debug);

    let mut archiver = MidjourneyArchiver::new(config);
    match archiver.execute().await {
        Ok(summary) => {
            println!(
                "Archive complete: {} new jobs, {} images downloaded",
                summary.new_jobs, summary.images_downloaded
            );
        }
        Err(e) => {
            tracing::error!("Archive run failed: {}", e);
            std::process::exit(1);
        }
    }
}
