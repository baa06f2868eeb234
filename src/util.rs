use chrono::NaiveDateTime;

use crate::error::ArchiveError;

/// Timestamp format used by the recent-jobs API (e.g. "2023-10-01 12:00:00.000000").
pub const ENQUEUE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Slug length cap for image file names.
pub const PROMPT_SLUG_MAX: usize = 49;

pub fn parse_enqueue_time(value: &str) -> Result<NaiveDateTime, ArchiveError> {
    NaiveDateTime::parse_from_str(value, ENQUEUE_TIME_FORMAT)
        .map_err(|e| ArchiveError::Scrape(format!("bad enqueue_time {value:?}: {e}")))
}

/// Slugified prompt, capped for file-name use. Slug output is ASCII so the
/// byte truncation is char-safe.
pub fn prompt_slug(prompt: &str) -> String {
    let mut s = slug::slugify(prompt);
    s.truncate(PROMPT_SLUG_MAX);
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_enqueue_time() {
        let ts = parse_enqueue_time("2023-10-01 12:00:00.000000").unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2023, 10, 1));
        assert_eq!(ts.hour(), 12);
    }

    #[test]
    fn test_parse_enqueue_time_leap_day() {
        let ts = parse_enqueue_time("2024-02-29 10:30:00.500000").unwrap();
        assert_eq!((ts.month(), ts.day()), (2, 29));
    }

    #[test]
    fn test_parse_enqueue_time_rejects_garbage() {
        assert!(parse_enqueue_time("not a date").is_err());
    }

    #[test]
    fn test_prompt_slug() {
        assert_eq!(prompt_slug("A red fox, 4k --v 5"), "a-red-fox-4k-v-5");
    }

    #[test]
    fn test_prompt_slug_truncation() {
        let long = "word ".repeat(40);
        let s = prompt_slug(&long);
        assert!(s.len() <= PROMPT_SLUG_MAX);
        assert!(s.starts_with("word-word"));
    }

    #[test]
    fn test_prompt_slug_empty() {
        assert_eq!(prompt_slug(""), "");
    }
}
