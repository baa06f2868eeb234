use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("browser init error: {0}")]
    BrowserInit(String),

    #[error("navigation error: {0}")]
    Navigation(String),

    #[error("javascript error: {0}")]
    JavaScript(String),

    #[error("login error: {0}")]
    Login(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("scrape error: {0}")]
    Scrape(String),

    #[error("json error: {0}")]
    Json(String),

    #[error("unexpected job listing response: {0}")]
    UnexpectedResponse(String),

    #[error("download error: {0}")]
    Download(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("file io error: {0}")]
    FileIo(#[from] std::io::Error),
}

impl ArchiveError {
    /// Transient failures worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ArchiveError::Navigation(_)
                | ArchiveError::Download(_)
                | ArchiveError::Timeout(_)
                | ArchiveError::JavaScript(_)
        )
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(e: serde_json::Error) -> Self {
        ArchiveError::Json(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ArchiveError::Download("connection reset".into()).is_retryable());
        assert!(ArchiveError::Timeout("image fetch".into()).is_retryable());
        assert!(!ArchiveError::Login("no session token".into()).is_retryable());
        assert!(!ArchiveError::Json("bad listing".into()).is_retryable());
    }
}
