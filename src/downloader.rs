//! Image downloader.
//!
//! Walks the upscale jobs file, downloads every image not yet marked
//! archived into `<archive>/<YYYY>/<MM>/`, re-encodes PNGs with metadata
//! and records the local path back into the jobs file. Per-item failures
//! are logged and the pass continues.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Datelike;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::crawler::jobs_file_name;
use crate::error::ArchiveError;
use crate::imaging::{encode_png_with_metadata, PngMetadata};
use crate::traits::ImageSource;
use crate::types::{Job, JobType};
use crate::util::{parse_enqueue_time, prompt_slug};

const MAX_FETCH_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Where one job's image goes and under which name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    pub year: String,
    pub month: String,
    pub file_name: String,
    pub prompt_slug: String,
}

/// Derive the archive location for a job:
/// `<YYYY>/<MM>/<YYYYMMDD-HHMM>_<prompt-slug>_<id4>.<ext>`.
pub fn plan_download(job: &Job) -> Result<DownloadPlan, ArchiveError> {
    let ts = parse_enqueue_time(&job.enqueue_time)?;
    let url = job
        .first_image_url()
        .ok_or_else(|| ArchiveError::Download(format!("job {} has no image url", job.id)))?;

    let slug = prompt_slug(job.prompt_text());
    let id4: String = job.id.chars().take(4).collect();
    let stamp = ts.format("%Y%m%d-%H%M");
    let ext = image_extension(url);

    Ok(DownloadPlan {
        year: format!("{:04}", ts.year()),
        month: format!("{:02}", ts.month()),
        file_name: format!("{}_{}_{}.{}", stamp, slug, id4, ext),
        prompt_slug: slug,
    })
}

/// File extension from the image URL path, defaulting to png.
fn image_extension(raw_url: &str) -> String {
    Url::parse(raw_url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
        })
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "png".to_string())
}

pub struct Downloader {
    archive_folder: PathBuf,
    jobs_path: PathBuf,
    jobs: Vec<Job>,
}

impl Downloader {
    /// Open the upscale jobs file under the archive folder. A missing file
    /// yields an empty job list.
    pub fn new(archive_folder: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let archive_folder = archive_folder.into();
        std::fs::create_dir_all(&archive_folder)?;

        let jobs_path = archive_folder.join(jobs_file_name(Some(JobType::Upscale)));
        let jobs = if jobs_path.is_file() {
            let text = std::fs::read_to_string(&jobs_path)?;
            serde_json::from_str(&text)?
        } else {
            Vec::new()
        };

        Ok(Self {
            archive_folder,
            jobs_path,
            jobs,
        })
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    fn save_jobs(&self) -> Result<(), ArchiveError> {
        let json = serde_json::to_string_pretty(&self.jobs)?;
        std::fs::write(&self.jobs_path, json)?;
        debug!("Updated {:?}", self.jobs_path);
        Ok(())
    }

    /// Download every unarchived job image, marking records as they land.
    /// Returns the number of images actually fetched.
    pub async fn download_missing<S: ImageSource>(
        &mut self,
        source: &mut S,
    ) -> Result<usize, ArchiveError> {
        let total = self.jobs.len();
        info!("Checking {} upscale jobs for missing images...", total);

        let mut downloaded = 0;
        for index in 0..self.jobs.len() {
            if self.jobs[index].arch {
                continue;
            }

            let plan = match plan_download(&self.jobs[index]) {
                Ok(plan) => plan,
                Err(e) => {
                    warn!("Skipping job {}: {}", self.jobs[index].id, e);
                    continue;
                }
            };

            let month_dir = self.archive_folder.join(&plan.year).join(&plan.month);
            std::fs::create_dir_all(&month_dir)?;
            let image_path = month_dir.join(&plan.file_name);

            if !image_path.is_file() {
                // url presence was checked by plan_download
                let url = self.jobs[index].first_image_url().unwrap_or_default().to_string();
                let (data, image_type) = match fetch_with_retry(source, &url).await {
                    Ok(fetched) => fetched,
                    Err(e) => {
                        warn!("Skipping job {}: {}", self.jobs[index].id, e);
                        continue;
                    }
                };

                write_image(&image_path, &data, &image_type, &self.jobs[index])?;
                downloaded += 1;

                let rel = relative_display(&image_path, &self.archive_folder);
                info!("[{}/{}] Saved {} from {}", index + 1, total, rel, url);
            } else {
                debug!("Image already on disk for job {}", self.jobs[index].id);
            }

            let rel = relative_display(&image_path, &self.archive_folder);
            let job = &mut self.jobs[index];
            job.arch = true;
            job.arch_image_path = Some(rel);
            job.arch_prompt_slug = Some(plan.prompt_slug);
        }

        self.save_jobs()?;
        info!("Downloaded {} new images", downloaded);
        Ok(downloaded)
    }
}

/// PNG payloads get metadata embedded; payloads the decoder rejects are
/// written untouched, as is anything that is not a PNG.
fn write_image(path: &Path, data: &[u8], image_type: &str, job: &Job) -> Result<(), ArchiveError> {
    if image_type == "png" {
        let meta = PngMetadata::for_job(job);
        match encode_png_with_metadata(data, &meta) {
            Ok(encoded) => {
                std::fs::write(path, encoded)?;
                return Ok(());
            }
            Err(e) => {
                warn!("Fishy PNG for job {} ({}), writing raw bytes", job.id, e);
            }
        }
    }
    std::fs::write(path, data)?;
    Ok(())
}

async fn fetch_with_retry<S: ImageSource>(
    source: &mut S,
    url: &str,
) -> Result<(Vec<u8>, String), ArchiveError> {
    let mut last_error = None;

    for attempt in 0..MAX_FETCH_RETRIES {
        match source.fetch_image(url).await {
            Ok(fetched) => return Ok(fetched),
            Err(e) if e.is_retryable() => {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt);
                warn!(
                    "Image fetch attempt {} failed, retrying in {}ms: {}",
                    attempt + 1,
                    backoff,
                    e
                );
                sleep(Duration::from_millis(backoff)).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error
        .unwrap_or_else(|| ArchiveError::Download("image fetch retries exhausted".into())))
}

fn relative_display(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
