//! End-to-end archive pipeline.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::api::MidjourneyApi;
use crate::config::ArchiveConfig;
use crate::crawler::JobCrawler;
use crate::downloader::Downloader;
use crate::error::ArchiveError;
use crate::traits::Archiver;
use crate::types::JobType;

/// Default archive root: `<pictures dir>/midjourney`, falling back to
/// `./midjourney` when the platform dir cannot be resolved.
pub fn default_archive_folder() -> PathBuf {
    dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Pictures")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("midjourney")
}

/// Runs the whole pipeline against one archive folder: login, crawl the
/// upscale listing then the full listing, download missing images.
pub struct MidjourneyArchiver {
    config: ArchiveConfig,
    api: MidjourneyApi,
}

impl MidjourneyArchiver {
    pub fn new(config: ArchiveConfig) -> Self {
        let api = MidjourneyApi::new(config.clone());
        Self { config, api }
    }
}

#[async_trait]
impl Archiver for MidjourneyArchiver {
    async fn initialize(&mut self) -> Result<(), ArchiveError> {
        std::fs::create_dir_all(&self.config.archive_folder)?;
        info!("Data will be saved in {:?}", self.config.archive_folder);
        self.api.initialize().await
    }

    async fn login(&mut self) -> Result<(), ArchiveError> {
        self.api.log_in().await?;
        self.api.ensure_user_info().await
    }

    async fn crawl(&mut self) -> Result<usize, ArchiveError> {
        let mut total_new = 0;
        // upscale listing first (it feeds the downloader), then all types
        for job_type in [Some(JobType::Upscale), None] {
            let mut crawler = JobCrawler::new(&self.config.archive_folder, job_type);
            total_new += crawler
                .crawl(&mut self.api, self.config.page_limit)
                .await?;
        }
        Ok(total_new)
    }

    async fn download(&mut self) -> Result<usize, ArchiveError> {
        let mut downloader = Downloader::new(&self.config.archive_folder)?;
        downloader.download_missing(&mut self.api).await
    }

    async fn close(&mut self) -> Result<(), ArchiveError> {
        self.api.close().await
    }

    fn archive_folder(&self) -> &Path {
        &self.config.archive_folder
    }
}
