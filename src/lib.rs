//! Midjourney personal archive tool.
//!
//! Drives a Chromium session against the Midjourney web app, crawls the
//! paginated recent-jobs API for job metadata, persists it to JSON files in
//! an archive folder, and downloads the generated images into a
//! year/month folder tree with metadata embedded in PNG outputs.
//!
//! # Library usage
//!
//! ```rust,ignore
//! use mj_archive::{ArchiveConfig, Archiver, MidjourneyArchiver};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ArchiveConfig::new("~/Pictures/midjourney")
//!         .with_page_limit(Some(10));
//!
//!     let mut archiver = MidjourneyArchiver::new(config);
//!     let summary = archiver.execute().await.unwrap();
//!     println!("downloaded {} images", summary.images_downloaded);
//! }
//! ```
//!
//! # tower Service usage
//!
//! ```rust,ignore
//! use mj_archive::{ArchiveRequest, ArchiveService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = ArchiveService::new();
//!     let report = service.call(ArchiveRequest::new()).await.unwrap();
//!     println!("archived into {:?}", report.archive_folder);
//! }
//! ```

pub mod api;
pub mod archiver;
pub mod config;
pub mod crawler;
pub mod downloader;
pub mod error;
pub mod imaging;
pub mod service;
pub mod session;
pub mod traits;
pub mod types;
pub mod util;

pub use api::MidjourneyApi;
pub use archiver::{default_archive_folder, MidjourneyArchiver};
pub use config::ArchiveConfig;
pub use crawler::JobCrawler;
pub use downloader::Downloader;
pub use error::ArchiveError;
pub use service::{ArchiveReport, ArchiveRequest, ArchiveService};
pub use traits::{Archiver, ImageSource, JobSource};
pub use types::{ArchiveSummary, Job, JobType, UserInfo};
