use async_trait::async_trait;
use std::path::Path;

use crate::error::ArchiveError;
use crate::types::{ArchiveSummary, Job, JobType};

/// Source of job listing pages. Implemented by the browser-backed API;
/// mockable in crawler tests.
#[async_trait]
pub trait JobSource: Send {
    /// One page of the recent-jobs listing, newest first. An empty vec
    /// means the end of the listing.
    async fn recent_jobs(
        &mut self,
        page: u32,
        job_type: Option<JobType>,
    ) -> Result<Vec<Job>, ArchiveError>;
}

/// Source of image bytes. Returns the payload and its media subtype
/// (e.g. "png", "webp").
#[async_trait]
pub trait ImageSource: Send {
    async fn fetch_image(&mut self, url: &str) -> Result<(Vec<u8>, String), ArchiveError>;
}

/// Full archive pipeline.
#[async_trait]
pub trait Archiver: Send {
    /// Browser startup.
    async fn initialize(&mut self) -> Result<(), ArchiveError>;

    /// Authenticate and resolve the user id.
    async fn login(&mut self) -> Result<(), ArchiveError>;

    /// Crawl job metadata; returns the number of newly archived records.
    async fn crawl(&mut self) -> Result<usize, ArchiveError>;

    /// Download images for unarchived records; returns the download count.
    async fn download(&mut self) -> Result<usize, ArchiveError>;

    /// Release browser resources.
    async fn close(&mut self) -> Result<(), ArchiveError>;

    fn archive_folder(&self) -> &Path;

    /// Whole run: initialize → login → crawl → download → close.
    async fn execute(&mut self) -> Result<ArchiveSummary, ArchiveError> {
        self.initialize().await?;
        self.login().await?;
        let new_jobs = self.crawl().await?;
        let images_downloaded = self.download().await?;
        self.close().await?;
        Ok(ArchiveSummary {
            new_jobs,
            images_downloaded,
        })
    }
}
