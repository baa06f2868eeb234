use std::path::PathBuf;
use std::time::Duration;

/// Archive run configuration.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Root folder for job JSON, cookies and downloaded images.
    pub archive_folder: PathBuf,
    /// Run the browser headless. Keep false for the first run so the
    /// Midjourney login can be completed by hand.
    pub headless: bool,
    /// Emit debug artifacts (login screenshot into the debug log).
    pub debug: bool,
    /// Jobs requested per listing page.
    pub page_size: u32,
    /// Maximum number of listing pages per crawl, unbounded when None.
    pub page_limit: Option<u32>,
    /// How long to wait for the app page after navigating to the home page.
    /// Generous so a manual login fits inside it.
    pub login_timeout: Duration,
    /// Timeout for a single page request / script evaluation.
    pub request_timeout: Duration,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            archive_folder: PathBuf::from("./archive"),
            headless: false,
            debug: false,
            page_size: 50,
            page_limit: None,
            login_timeout: Duration::from_secs(600),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl ArchiveConfig {
    pub fn new(archive_folder: impl Into<PathBuf>) -> Self {
        Self {
            archive_folder: archive_folder.into(),
            ..Default::default()
        }
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_page_limit(mut self, page_limit: Option<u32>) -> Self {
        self.page_limit = page_limit;
        self
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ArchiveConfig::new("/tmp/mj")
            .with_headless(true)
            .with_page_limit(Some(5))
            .with_page_size(25)
            .with_login_timeout(Duration::from_secs(120));

        assert_eq!(config.archive_folder, PathBuf::from("/tmp/mj"));
        assert!(config.headless);
        assert_eq!(config.page_limit, Some(5));
        assert_eq!(config.page_size, 25);
        assert_eq!(config.login_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_config_defaults() {
        let config = ArchiveConfig::default();
        assert!(!config.headless);
        assert_eq!(config.page_size, 50);
        assert_eq!(config.page_limit, None);
        assert_eq!(config.login_timeout, Duration::from_secs(600));
    }
}
