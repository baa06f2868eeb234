use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::archiver::{default_archive_folder, MidjourneyArchiver};
use crate::config::ArchiveConfig;
use crate::error::ArchiveError;
use crate::traits::Archiver;

/// One archive run request.
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    pub archive_folder: Option<PathBuf>,
    pub page_limit: Option<u32>,
    pub headless: bool,
    pub debug: bool,
}

impl Default for ArchiveRequest {
    fn default() -> Self {
        Self {
            archive_folder: None,
            page_limit: None,
            headless: false,
            debug: false,
        }
    }
}

impl ArchiveRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_archive_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.archive_folder = Some(folder.into());
        self
    }

    pub fn with_page_limit(mut self, limit: Option<u32>) -> Self {
        self.page_limit = limit;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl From<ArchiveRequest> for ArchiveConfig {
    fn from(req: ArchiveRequest) -> Self {
        ArchiveConfig::new(req.archive_folder.unwrap_or_else(default_archive_folder))
            .with_page_limit(req.page_limit)
            .with_headless(req.headless)
            .with_debug(req.debug)
    }
}

/// Outcome of one archive run.
#[derive(Debug)]
pub struct ArchiveReport {
    pub archive_folder: PathBuf,
    pub new_jobs: usize,
    pub images_downloaded: usize,
}

/// tower::Service wrapper around the archiver.
#[derive(Debug, Clone, Default)]
pub struct ArchiveService {
    // room for rate limiting / scheduling later
}

impl ArchiveService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<ArchiveRequest> for ArchiveService {
    type Response = ArchiveReport;
    type Error = ArchiveError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ArchiveRequest) -> Self::Future {
        info!(
            "Archive request received: folder={:?}, limit={:?}",
            req.archive_folder, req.page_limit
        );

        Box::pin(async move {
            let config: ArchiveConfig = req.into();
            let mut archiver = MidjourneyArchiver::new(config);

            let summary = archiver.execute().await?;

            let report = ArchiveReport {
                archive_folder: archiver.archive_folder().to_path_buf(),
                new_jobs: summary.new_jobs,
                images_downloaded: summary.images_downloaded,
            };

            info!(
                "Archive run complete: {} new jobs, {} images, folder={:?}",
                report.new_jobs, report.images_downloaded, report.archive_folder
            );

            Ok(report)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_request_builder() {
        let req = ArchiveRequest::new()
            .with_archive_folder("/tmp/mj")
            .with_page_limit(Some(3))
            .with_headless(true);

        assert_eq!(req.archive_folder, Some(PathBuf::from("/tmp/mj")));
        assert_eq!(req.page_limit, Some(3));
        assert!(req.headless);
        assert!(!req.debug);
    }

    #[test]
    fn test_archive_request_to_config() {
        let req = ArchiveRequest::new()
            .with_archive_folder("/tmp/mj")
            .with_page_limit(Some(3));
        let config: ArchiveConfig = req.into();

        assert_eq!(config.archive_folder, PathBuf::from("/tmp/mj"));
        assert_eq!(config.page_limit, Some(3));
        assert_eq!(config.page_size, 50);
    }

    #[test]
    fn test_archive_request_default_folder() {
        let config: ArchiveConfig = ArchiveRequest::new().into();
        assert!(config.archive_folder.ends_with("midjourney"));
    }
}
