//! Browser cookie persistence.
//!
//! Cookies from a successful login are written to `cookies.json` in the
//! archive folder and restored into the page on the next run, so the
//! Midjourney session survives restarts.

use std::path::{Path, PathBuf};

use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam, TimeSinceEpoch};
use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ArchiveError;

const COOKIES_FILE: &str = "cookies.json";

/// On-disk cookie record. Only the fields needed to rebuild a CDP
/// `CookieParam` are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires: f64,
    pub secure: bool,
    pub http_only: bool,
}

impl From<&Cookie> for StoredCookie {
    fn from(c: &Cookie) -> Self {
        Self {
            name: c.name.clone(),
            value: c.value.clone(),
            domain: c.domain.clone(),
            path: c.path.clone(),
            expires: c.expires,
            secure: c.secure,
            http_only: c.http_only,
        }
    }
}

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(archive_folder: &Path) -> Self {
        Self {
            path: archive_folder.join(COOKIES_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored cookies, or empty when the file is missing or unreadable.
    pub fn load(&self) -> Vec<StoredCookie> {
        if !self.path.is_file() {
            return Vec::new();
        }
        match std::fs::read_to_string(&self.path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(cookies) => cookies,
                Err(e) => {
                    warn!("Ignoring corrupt cookie file {:?}: {}", self.path, e);
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("Failed to read cookie file {:?}: {}", self.path, e);
                Vec::new()
            }
        }
    }

    pub fn save(&self, cookies: &[StoredCookie]) -> Result<(), ArchiveError> {
        let json = serde_json::to_string_pretty(cookies)?;
        std::fs::write(&self.path, json)?;
        debug!("Saved {} cookies to {:?}", cookies.len(), self.path);
        Ok(())
    }

    /// Restore stored cookies into the page. Cookies the browser rejects
    /// (wrong domain, expired) are skipped.
    pub async fn apply(&self, page: &Page) -> Result<usize, ArchiveError> {
        let cookies = self.load();
        let mut applied = 0;
        for cookie in &cookies {
            let mut builder = CookieParam::builder()
                .name(&cookie.name)
                .value(&cookie.value)
                .domain(&cookie.domain)
                .path(&cookie.path)
                .secure(cookie.secure)
                .http_only(cookie.http_only);
            if cookie.expires > 0.0 {
                builder = builder.expires(TimeSinceEpoch::new(cookie.expires));
            }
            let param = match builder.build() {
                Ok(param) => param,
                Err(e) => {
                    debug!("Skipping malformed cookie {}: {}", cookie.name, e);
                    continue;
                }
            };
            match page.set_cookie(param).await {
                Ok(_) => applied += 1,
                Err(e) => debug!("Failed to set cookie {}: {}", cookie.name, e),
            }
        }
        debug!("Restored {}/{} cookies", applied, cookies.len());
        Ok(applied)
    }
}
