use mj_archive::{ArchiveConfig, Archiver, MidjourneyArchiver};
use std::path::PathBuf;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let folder = std::env::var("MJ_ARCHIVE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| mj_archive::default_archive_folder());

    // visible window so the login can be completed by hand
    let config = ArchiveConfig::new(folder)
        .with_headless(false)
        .with_page_limit(Some(2));

    let mut archiver = MidjourneyArchiver::new(config);

    println!("=== Midjourney archive run ===");

    match archiver.execute().await {
        Ok(summary) => {
            println!(
                "Done: {} new jobs, {} images downloaded",
                summary.new_jobs, summary.images_downloaded
            );
        }
        Err(e) => {
            eprintln!("Error: {}", e);
        }
    }
}
