//! Job and user metadata types.
//!
//! Job records are whatever the recent-jobs endpoint returns; only the
//! fields the archive logic touches are typed, everything else rides along
//! in `extra` so the on-disk JSON keeps the full record.

use serde::{Deserialize, Serialize};

/// Job subtype to crawl. `Upscale` jobs carry the final full-resolution
/// render; `None` on the crawler side means all types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    Upscale,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Upscale => "upscale",
        }
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// One generated-image job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub enqueue_time: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub image_paths: Vec<String>,

    /// Set once the image has been written under the archive folder.
    #[serde(default, skip_serializing_if = "is_false")]
    pub arch: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch_image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch_prompt_slug: Option<String>,

    /// Remaining fields from the API response, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Job {
    /// Prompt text for file naming and PNG metadata. Falls back to the full
    /// command when the prompt is missing.
    pub fn prompt_text(&self) -> &str {
        self.prompt
            .as_deref()
            .filter(|p| !p.is_empty())
            .or(self.full_command.as_deref())
            .unwrap_or_default()
    }

    pub fn first_image_url(&self) -> Option<&str> {
        self.image_paths.first().map(String::as_str)
    }
}

/// Counters from one archive run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveSummary {
    pub new_jobs: usize,
    pub images_downloaded: usize,
}

/// Raw `__NEXT_DATA__` payload from the account page, cached to user.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo(pub serde_json::Value);

impl UserInfo {
    /// User id at props.pageProps.user.id.
    pub fn user_id(&self) -> Option<&str> {
        self.0
            .get("props")?
            .get("pageProps")?
            .get("user")?
            .get("id")?
            .as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_roundtrip_preserves_unknown_fields() {
        let raw = serde_json::json!({
            "id": "abcd1234-0000",
            "enqueue_time": "2023-01-01 10:00:00.000000",
            "prompt": "a red fox",
            "image_paths": ["https://cdn.example.com/img.png"],
            "event": {"height": 1024},
            "liked_by_user": true
        });

        let job: Job = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(job.id, "abcd1234-0000");
        assert!(!job.arch);
        assert_eq!(job.extra["event"]["height"], 1024);

        let back = serde_json::to_value(&job).unwrap();
        assert_eq!(back["liked_by_user"], true);
        assert_eq!(back["event"]["height"], 1024);
        // unarchived jobs do not grow arch fields on disk
        assert!(back.get("arch").is_none());
        assert!(back.get("arch_image_path").is_none());
    }

    #[test]
    fn test_prompt_text_fallback() {
        let job: Job = serde_json::from_value(serde_json::json!({
            "id": "x",
            "enqueue_time": "t",
            "full_command": "/imagine a red fox"
        }))
        .unwrap();
        assert_eq!(job.prompt_text(), "/imagine a red fox");

        let job: Job = serde_json::from_value(serde_json::json!({
            "id": "x",
            "enqueue_time": "t"
        }))
        .unwrap();
        assert_eq!(job.prompt_text(), "");
    }

    #[test]
    fn test_user_id_traversal() {
        let info = UserInfo(serde_json::json!({
            "props": {"pageProps": {"user": {"id": "user-42"}}}
        }));
        assert_eq!(info.user_id(), Some("user-42"));

        let info = UserInfo(serde_json::json!({"props": {}}));
        assert_eq!(info.user_id(), None);
    }

    #[test]
    fn test_job_type_str() {
        assert_eq!(JobType::Upscale.as_str(), "upscale");
    }
}
