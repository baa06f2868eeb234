//! Job metadata crawler.
//!
//! Pages through the recent-jobs listing and appends unseen records to the
//! jobs file, rewriting it after every page that added something. Stops on
//! an empty page, on a page with no new ids, or at the page limit.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::ArchiveError;
use crate::traits::JobSource;
use crate::types::{Job, JobType};

/// Jobs file name for a crawl scope: `jobs.json` for all types,
/// `jobs_<type>.json` otherwise.
pub fn jobs_file_name(job_type: Option<JobType>) -> String {
    match job_type {
        Some(t) => format!("jobs_{}.json", t.as_str()),
        None => "jobs.json".to_string(),
    }
}

pub struct JobCrawler {
    archive_file: PathBuf,
    job_type: Option<JobType>,
    jobs: Vec<Job>,
    seen: HashSet<String>,
}

impl JobCrawler {
    pub fn new(archive_folder: &Path, job_type: Option<JobType>) -> Self {
        let archive_file = archive_folder.join(jobs_file_name(job_type));
        let jobs = load_jobs(&archive_file);
        let seen = jobs.iter().map(|j| j.id.clone()).collect();
        Self {
            archive_file,
            job_type,
            jobs,
            seen,
        }
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    fn scope_label(&self) -> &'static str {
        match self.job_type {
            Some(JobType::Upscale) => "upscale",
            None => "all",
        }
    }

    /// Append unseen records and rewrite the jobs file when anything was
    /// added. Returns the number of new records.
    pub fn merge(&mut self, listing: Vec<Job>) -> Result<usize, ArchiveError> {
        let mut added = 0;
        for job in listing {
            if self.seen.insert(job.id.clone()) {
                self.jobs.push(job);
                added += 1;
            }
        }
        if added > 0 {
            self.persist()?;
        }
        Ok(added)
    }

    fn persist(&self) -> Result<(), ArchiveError> {
        let json = serde_json::to_string_pretty(&self.jobs)?;
        std::fs::write(&self.archive_file, json)?;
        debug!("Wrote {} jobs to {:?}", self.jobs.len(), self.archive_file);
        Ok(())
    }

    /// Page through the listing until it runs dry. Returns the total number
    /// of new records.
    pub async fn crawl<S: JobSource>(
        &mut self,
        source: &mut S,
        limit: Option<u32>,
    ) -> Result<usize, ArchiveError> {
        let label = self.scope_label();
        info!("Crawling {} job listing...", label);

        let mut total_new = 0;
        let mut page = 1u32;
        loop {
            if let Some(limit) = limit {
                if page > limit {
                    debug!("Page limit {} reached for {} jobs", limit, label);
                    break;
                }
            }

            let listing = source.recent_jobs(page, self.job_type).await?;
            if listing.is_empty() {
                debug!("Empty {} listing page: reached end of job listing", label);
                break;
            }

            let added = self.merge(listing)?;
            if added == 0 {
                debug!("No new {} jobs on page {}: stopping", label, page);
                break;
            }

            total_new += added;
            info!(
                "Page {}: {} new {} jobs ({} archived in total)",
                page,
                added,
                label,
                self.jobs.len()
            );
            page += 1;
        }

        info!("Crawl finished: {} new {} jobs", total_new, label);
        Ok(total_new)
    }
}

fn load_jobs(path: &Path) -> Vec<Job> {
    if !path.is_file() {
        return Vec::new();
    }
    match std::fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("Ignoring corrupt jobs file {:?}: {}", path, e);
                Vec::new()
            }
        },
        Err(e) => {
            warn!("Failed to read jobs file {:?}: {}", path, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    fn job(id: &str) -> Job {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "enqueue_time": "2023-01-01 10:00:00.000000",
            "prompt": format!("prompt for {id}")
        }))
        .unwrap()
    }

    struct StubSource {
        pages: VecDeque<Vec<Job>>,
        calls: u32,
    }

    impl StubSource {
        fn new(pages: Vec<Vec<Job>>) -> Self {
            Self {
                pages: pages.into(),
                calls: 0,
            }
        }
    }

    #[async_trait]
    impl JobSource for StubSource {
        async fn recent_jobs(
            &mut self,
            _page: u32,
            _job_type: Option<JobType>,
        ) -> Result<Vec<Job>, ArchiveError> {
            self.calls += 1;
            Ok(self.pages.pop_front().unwrap_or_default())
        }
    }

    #[test]
    fn test_jobs_file_name() {
        assert_eq!(jobs_file_name(None), "jobs.json");
        assert_eq!(jobs_file_name(Some(JobType::Upscale)), "jobs_upscale.json");
    }

    #[test]
    fn test_new_without_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let crawler = JobCrawler::new(dir.path(), None);
        assert!(crawler.jobs().is_empty());
    }

    #[test]
    fn test_new_with_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("jobs.json"), "this is not json").unwrap();
        let crawler = JobCrawler::new(dir.path(), None);
        assert!(crawler.jobs().is_empty());
    }

    #[test]
    fn test_merge_dedupes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut crawler = JobCrawler::new(dir.path(), Some(JobType::Upscale));

        let added = crawler.merge(vec![job("j1"), job("j2")]).unwrap();
        assert_eq!(added, 2);

        // same ids again contribute nothing
        let added = crawler.merge(vec![job("j1"), job("j2")]).unwrap();
        assert_eq!(added, 0);

        let saved: Vec<Job> = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("jobs_upscale.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].id, "j2");
    }

    #[test]
    fn test_reload_after_merge() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut crawler = JobCrawler::new(dir.path(), None);
            crawler.merge(vec![job("j1")]).unwrap();
        }
        let crawler = JobCrawler::new(dir.path(), None);
        assert_eq!(crawler.jobs().len(), 1);
        assert_eq!(crawler.jobs()[0].id, "j1");
    }

    #[tokio::test]
    async fn test_crawl_gathers_until_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut crawler = JobCrawler::new(dir.path(), None);
        let mut source = StubSource::new(vec![
            vec![job("j1"), job("j2")],
            vec![job("j3")],
            vec![],
        ]);

        let new = crawler.crawl(&mut source, Some(5)).await.unwrap();
        assert_eq!(new, 3);
        assert_eq!(crawler.jobs().len(), 3);
        assert_eq!(source.calls, 3);
    }

    #[tokio::test]
    async fn test_crawl_stops_on_duplicate_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut crawler = JobCrawler::new(dir.path(), None);
        let mut source = StubSource::new(vec![vec![job("j1")], vec![job("j1")]]);

        let new = crawler.crawl(&mut source, Some(5)).await.unwrap();
        assert_eq!(new, 1);
        assert_eq!(source.calls, 2);
    }

    #[tokio::test]
    async fn test_crawl_respects_page_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut crawler = JobCrawler::new(dir.path(), None);
        let mut source = StubSource::new(vec![
            vec![job("j1")],
            vec![job("j2")],
            vec![job("j3")],
        ]);

        let new = crawler.crawl(&mut source, Some(2)).await.unwrap();
        assert_eq!(new, 2);
        assert_eq!(source.calls, 2);
    }

    #[tokio::test]
    async fn test_crawl_propagates_source_errors() {
        struct FailingSource;

        #[async_trait]
        impl JobSource for FailingSource {
            async fn recent_jobs(
                &mut self,
                _page: u32,
                _job_type: Option<JobType>,
            ) -> Result<Vec<Job>, ArchiveError> {
                Err(ArchiveError::Navigation("tab crashed".into()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut crawler = JobCrawler::new(dir.path(), None);
        let err = crawler.crawl(&mut FailingSource, None).await.unwrap_err();
        assert!(matches!(err, ArchiveError::Navigation(_)));
    }
}
