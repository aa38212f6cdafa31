//! Utility functions for fileio

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encoding set for a single URL path segment
const SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'%')
    .add(b' ')
    .add(b'?')
    .add(b'#')
    .add(b'&')
    .add(b'"')
    .add(b'<')
    .add(b'>');

/// Encode a bucket or filename for use as one URL path segment
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT_ENCODE_SET).to_string()
}

/// Validate a bucket name or filename
///
/// Segments become directory and file names on disk, so anything that
/// could escape the storage root is rejected.
pub fn validate_segment(kind: &str, segment: &str) -> crate::Result<()> {
    if segment.is_empty() {
        return Err(crate::Error::InvalidKey(format!("{} cannot be empty", kind)));
    }

    if segment == "." || segment == ".." {
        return Err(crate::Error::InvalidKey(format!(
            "{} cannot be '{}'",
            kind, segment
        )));
    }

    if segment.len() > 1024 {
        return Err(crate::Error::InvalidKey(format!(
            "{} too long (max 1024 bytes)",
            kind
        )));
    }

    if segment
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(crate::Error::InvalidKey(format!(
            "{} contains invalid characters: {}",
            kind, segment
        )));
    }

    Ok(())
}

/// Seconds since the epoch as a string, "0" when unknown
pub fn format_time(t: Option<SystemTime>) -> String {
    match t.and_then(|x| x.duration_since(UNIX_EPOCH).ok()) {
        Some(d) => d.as_secs().to_string(),
        None => "0".into(),
    }
}

/// Collision-resistant stored name for an upload: `{millis}-{rand}-{original}`
pub fn unique_object_name(original: &str) -> String {
    format!(
        "{}-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        rand::random::<u32>(),
        original
    )
}

/// Default process-derived node identity
pub fn default_node_id() -> String {
    format!("server-{}", std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("plain.txt"), "plain.txt");
        assert_eq!(encode_segment("a b?.txt"), "a%20b%3F.txt");
        assert_eq!(encode_segment("x/y"), "x%2Fy");
    }

    #[test]
    fn test_validate_segment() {
        assert!(validate_segment("bucket", "photos-2024").is_ok());
        assert!(validate_segment("filename", "report v2.pdf").is_ok());
        assert!(validate_segment("bucket", "").is_err());
        assert!(validate_segment("bucket", "..").is_err());
        assert!(validate_segment("filename", "../etc/passwd").is_err());
        assert!(validate_segment("filename", "a\\b").is_err());
        assert!(validate_segment("filename", &"x".repeat(2000)).is_err());
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(None), "0");
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(format_time(Some(t)), "1700000000");
    }

    #[test]
    fn test_unique_object_name() {
        let a = unique_object_name("x.txt");
        let b = unique_object_name("x.txt");
        assert!(a.ends_with("-x.txt"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_default_node_id() {
        assert!(default_node_id().starts_with("server-"));
    }
}
