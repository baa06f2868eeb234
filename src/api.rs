//! Browser-backed Midjourney API client.
//!
//! Drives a Chromium session over CDP: restores cookies, waits out the
//! (possibly manual) login, reads the account page's `__NEXT_DATA__` blob,
//! fetches recent-jobs listing pages rendered as JSON inside a `<pre>`
//! element, and pulls image bytes through an in-page XHR so the session
//! cookies apply to the CDN request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use scraper::{Html, Selector};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ArchiveConfig;
use crate::error::ArchiveError;
use crate::session::{SessionStore, StoredCookie};
use crate::traits::{ImageSource, JobSource};
use crate::types::{Job, JobType, UserInfo};

const HOME_URL: &str = "https://www.midjourney.com/home/";
const APP_URL: &str = "https://www.midjourney.com/app/";
const ACCOUNT_URL: &str = "https://www.midjourney.com/account/";
const RECENT_JOBS_URL: &str = "https://www.midjourney.com/api/app/recent-jobs/";

const SESSION_TOKEN_COOKIE: &str = "__Secure-next-auth.session-token";
const APP_ELEMENT_ID: &str = "app-root";
const NEXT_DATA_ELEMENT_ID: &str = "__NEXT_DATA__";
const NO_JOBS_MSG: &str = "No jobs found.";
const USER_JSON: &str = "user.json";

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// In-page XHR fetch of the displayed image as a data URI. Runs inside the
/// image tab, so the CDN request carries the session cookies.
const DATA_URI_FETCH_JS: &str = r#"
new Promise((resolve, reject) => {
    const img = document.querySelector('img');
    if (!img) { reject(new Error('no img element on page')); return; }
    const xhr = new XMLHttpRequest();
    xhr.onload = () => {
        const reader = new FileReader();
        reader.onloadend = () => resolve(reader.result);
        reader.readAsDataURL(xhr.response);
    };
    xhr.onerror = () => reject(new Error('image request failed'));
    xhr.open('GET', img.src);
    xhr.responseType = 'blob';
    xhr.send();
})
"#;

pub struct MidjourneyApi {
    config: ArchiveConfig,
    browser: Option<Browser>,
    page: Option<Arc<Page>>,
    session: SessionStore,
    session_token: Option<String>,
    user_id: Option<String>,
}

impl MidjourneyApi {
    pub fn new(config: ArchiveConfig) -> Self {
        let session = SessionStore::new(&config.archive_folder);
        Self {
            config,
            browser: None,
            page: None,
            session,
            session_token: None,
            user_id: None,
        }
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn page(&self) -> Result<&Arc<Page>, ArchiveError> {
        self.page
            .as_ref()
            .ok_or_else(|| ArchiveError::BrowserInit("browser not initialized".into()))
    }

    /// Launch Chromium and open a blank page.
    pub async fn initialize(&mut self) -> Result<(), ArchiveError> {
        info!("Initializing browser...");

        std::fs::create_dir_all(&self.config.archive_folder)?;

        // Unique profile dir per run so parallel runs do not clash
        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("mj-archive-{}", unique_id));

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&user_data_dir)
            .window_size(1280, 900)
            .request_timeout(self.config.request_timeout)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        // CHROME_PATH / CHROMIUM_PATH override the bundled discovery
        if let Ok(chrome_path) =
            std::env::var("CHROME_PATH").or_else(|_| std::env::var("CHROMIUM_PATH"))
        {
            builder = builder.chrome_executable(chrome_path);
        }

        if !self.config.headless {
            builder = builder.with_head();
        }

        if self.config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ArchiveError::BrowserInit(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ArchiveError::BrowserInit(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ArchiveError::BrowserInit(e.to_string()))?;

        self.browser = Some(browser);
        self.page = Some(Arc::new(page));

        info!("Browser initialized");
        Ok(())
    }

    /// Restore cookies, open the home page and wait until the app page is
    /// reached and the session-token cookie is set. The wait is long enough
    /// for a manual login in headful mode. Cookies are re-persisted on
    /// success.
    pub async fn log_in(&mut self) -> Result<(), ArchiveError> {
        let page = self.page()?.clone();

        self.session.apply(&page).await?;

        info!("Opening {}", HOME_URL);
        page.goto(HOME_URL)
            .await
            .map_err(|e| ArchiveError::Navigation(e.to_string()))?;

        let deadline = Instant::now() + self.config.login_timeout;
        let check_app_root = format!(
            "window.location.href.startsWith('{}') && document.getElementById('{}') !== null",
            APP_URL, APP_ELEMENT_ID
        );

        let mut seconds = 0u64;
        loop {
            let ready = page
                .evaluate(check_app_root.as_str())
                .await
                .map(|v| v.into_value::<bool>().unwrap_or(false))
                .unwrap_or(false);
            if ready {
                break;
            }
            if Instant::now() >= deadline {
                return Err(ArchiveError::Timeout(format!(
                    "app page not reached within {:?}; log in manually in the browser window",
                    self.config.login_timeout
                )));
            }
            if seconds % 30 == 0 && seconds > 0 {
                info!("Waiting for login... ({}s elapsed)", seconds);
            }
            seconds += 1;
            sleep(POLL_INTERVAL).await;
        }

        let cookies = page
            .get_cookies()
            .await
            .map_err(|e| ArchiveError::Session(e.to_string()))?;

        let token = cookies
            .iter()
            .find(|c| c.name == SESSION_TOKEN_COOKIE)
            .map(|c| c.value.clone())
            .ok_or_else(|| {
                ArchiveError::Login("session token cookie not present after login".into())
            })?;

        let stored: Vec<StoredCookie> = cookies.iter().map(StoredCookie::from).collect();
        self.session.save(&stored)?;
        self.session_token = Some(token);

        if self.config.debug {
            self.debug_screenshot(&page, "post-login").await;
        }

        info!("Login confirmed, session cookie persisted");
        Ok(())
    }

    /// Resolve the user id, reading `user.json` from the archive folder or
    /// fetching and caching the account page payload.
    pub async fn ensure_user_info(&mut self) -> Result<(), ArchiveError> {
        let user_json = self.config.archive_folder.join(USER_JSON);

        let info = if user_json.is_file() {
            let text = std::fs::read_to_string(&user_json)?;
            UserInfo(serde_json::from_str(&text)?)
        } else {
            let info = self.fetch_user_info().await?;
            std::fs::write(&user_json, serde_json::to_string_pretty(&info.0)?)?;
            debug!("Cached user info to {:?}", user_json);
            info
        };

        let user_id = info
            .user_id()
            .ok_or_else(|| ArchiveError::Scrape("user id missing from account payload".into()))?
            .to_string();

        info!("User id: {}", user_id);
        self.user_id = Some(user_id);
        Ok(())
    }

    async fn fetch_user_info(&self) -> Result<UserInfo, ArchiveError> {
        let page = self.page()?.clone();

        info!("Fetching account page for user info...");
        page.goto(ACCOUNT_URL)
            .await
            .map_err(|e| ArchiveError::Navigation(e.to_string()))?;

        let check = format!(
            "document.getElementById('{}') !== null",
            NEXT_DATA_ELEMENT_ID
        );
        self.wait_for(&page, &check, "__NEXT_DATA__ element").await?;

        let html = page
            .content()
            .await
            .map_err(|e| ArchiveError::Scrape(e.to_string()))?;

        let value = extract_next_data(&html)?;
        Ok(UserInfo(value))
    }

    /// Fetch one page of the recent-jobs listing.
    pub async fn recent_jobs(
        &self,
        page_num: u32,
        job_type: Option<JobType>,
    ) -> Result<Vec<Job>, ArchiveError> {
        let user_id = self
            .user_id
            .as_deref()
            .ok_or_else(|| ArchiveError::Session("user id not resolved yet".into()))?;

        let mut url = Url::parse(RECENT_JOBS_URL)
            .map_err(|e| ArchiveError::Navigation(e.to_string()))?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("page", &page_num.to_string());
            if let Some(job_type) = job_type {
                q.append_pair("jobType", job_type.as_str());
            }
            q.append_pair("amount", &self.config.page_size.to_string());
            q.append_pair("orderBy", "new");
            q.append_pair("jobStatus", "completed");
            q.append_pair("userId", user_id);
            q.append_pair("dedupe", "true");
            q.append_pair("refreshApi", "0");
        }

        debug!("Requesting {}", url);
        let page = self.page()?.clone();
        page.goto(url.as_str())
            .await
            .map_err(|e| ArchiveError::Navigation(e.to_string()))?;

        self.wait_for(&page, "document.querySelector('pre') !== null", "job listing")
            .await?;

        let html = page
            .content()
            .await
            .map_err(|e| ArchiveError::Scrape(e.to_string()))?;

        let value = extract_pre_json(&html)?;
        let jobs = parse_job_listing(value)?;
        debug!("Got job listing with {} jobs", jobs.len());
        Ok(jobs)
    }

    /// Fetch an image through the browser session. Returns the raw bytes
    /// and the media subtype from the data-URI header.
    pub async fn fetch_image(&self, url: &str) -> Result<(Vec<u8>, String), ArchiveError> {
        let page = self.page()?.clone();

        page.goto(url)
            .await
            .map_err(|e| ArchiveError::Navigation(e.to_string()))?;

        let result = page
            .evaluate(DATA_URI_FETCH_JS)
            .await
            .map_err(|e| ArchiveError::JavaScript(e.to_string()))?;

        let data_uri = result
            .into_value::<String>()
            .map_err(|e| ArchiveError::Download(format!("data URI not returned: {e}")))?;

        decode_data_uri(&data_uri)
    }

    pub async fn close(&mut self) -> Result<(), ArchiveError> {
        info!("Closing browser...");
        self.page = None;
        self.browser = None;
        Ok(())
    }

    /// Poll a boolean page expression until true or the request timeout.
    async fn wait_for(&self, page: &Page, script: &str, what: &str) -> Result<(), ArchiveError> {
        let start = Instant::now();
        while start.elapsed() < self.config.request_timeout {
            let ready = page
                .evaluate(script)
                .await
                .map(|v| v.into_value::<bool>().unwrap_or(false))
                .unwrap_or(false);
            if ready {
                return Ok(());
            }
            sleep(POLL_INTERVAL).await;
        }
        Err(ArchiveError::Timeout(format!(
            "{} not ready after {:?}",
            what, self.config.request_timeout
        )))
    }

    async fn debug_screenshot(&self, page: &Page, label: &str) {
        match page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            Ok(bytes) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                debug!("{} screenshot: data:image/png;base64,{}", label, encoded);
            }
            Err(e) => warn!("Failed to take {} screenshot: {}", label, e),
        }
    }
}

#[async_trait]
impl JobSource for MidjourneyApi {
    async fn recent_jobs(
        &mut self,
        page: u32,
        job_type: Option<JobType>,
    ) -> Result<Vec<Job>, ArchiveError> {
        MidjourneyApi::recent_jobs(self, page, job_type).await
    }
}

#[async_trait]
impl ImageSource for MidjourneyApi {
    async fn fetch_image(&mut self, url: &str) -> Result<(Vec<u8>, String), ArchiveError> {
        MidjourneyApi::fetch_image(self, url).await
    }
}

/// Pull the JSON body out of the `<pre>` element of a listing page.
fn extract_pre_json(html: &str) -> Result<serde_json::Value, ArchiveError> {
    let doc = Html::parse_document(html);
    let selector =
        Selector::parse("pre").map_err(|e| ArchiveError::Scrape(format!("pre selector: {e}")))?;
    let pre = doc
        .select(&selector)
        .next()
        .ok_or_else(|| ArchiveError::Scrape("no <pre> element in listing page".into()))?;
    let text: String = pre.text().collect();
    Ok(serde_json::from_str(&text)?)
}

/// Pull the `__NEXT_DATA__` JSON payload out of the account page.
fn extract_next_data(html: &str) -> Result<serde_json::Value, ArchiveError> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse(&format!("script#{}", NEXT_DATA_ELEMENT_ID))
        .map_err(|e| ArchiveError::Scrape(format!("script selector: {e}")))?;
    let script = doc
        .select(&selector)
        .next()
        .ok_or_else(|| ArchiveError::Scrape("__NEXT_DATA__ script not found".into()))?;
    let text: String = script.text().collect();
    Ok(serde_json::from_str(&text)?)
}

/// Interpret a listing response: a job array, an empty array, or the
/// `[{"msg": "No jobs found."}]` sentinel. Anything else is an error.
fn parse_job_listing(value: serde_json::Value) -> Result<Vec<Job>, ArchiveError> {
    let items = match value {
        serde_json::Value::Array(items) => items,
        other => return Err(ArchiveError::UnexpectedResponse(summarize(&other))),
    };

    if items.is_empty() {
        debug!("Listing response: no jobs");
        return Ok(Vec::new());
    }

    if let Some(msg) = items[0].get("msg").and_then(|m| m.as_str()) {
        if msg == NO_JOBS_MSG {
            debug!("Listing response: 'No jobs found'");
            return Ok(Vec::new());
        }
        return Err(ArchiveError::UnexpectedResponse(msg.to_string()));
    }

    serde_json::from_value(serde_json::Value::Array(items))
        .map_err(|e| ArchiveError::UnexpectedResponse(format!("malformed job records: {e}")))
}

/// Split a data URI into payload bytes and media subtype.
fn decode_data_uri(uri: &str) -> Result<(Vec<u8>, String), ArchiveError> {
    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| ArchiveError::Download(format!("malformed data URI: {}", summarize_str(uri))))?;

    let media = header
        .strip_prefix("data:")
        .unwrap_or(header)
        .split(';')
        .next()
        .unwrap_or_default();
    let image_type = media.rsplit('/').next().unwrap_or_default().to_string();
    if image_type.is_empty() {
        return Err(ArchiveError::Download(format!(
            "data URI without media type: {}",
            summarize_str(uri)
        )));
    }

    let data = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ArchiveError::Download(format!("base64 decode failed: {e}")))?;

    Ok((data, image_type))
}

fn summarize(value: &serde_json::Value) -> String {
    summarize_str(&value.to_string())
}

fn summarize_str(s: &str) -> String {
    s.chars().take(200).collect()
}
