//! Object keys (`bucket:filename`)

use crate::common::utils::validate_segment;
use serde::{Deserialize, Serialize};

/// Identity of a stored object across the cluster
///
/// Renders as `bucket:filename`, the string hashed onto the ring and used
/// as the registry key. Only the first `:` separates the two parts, so
/// filenames may themselves contain colons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    bucket: String,
    filename: String,
}

impl ObjectKey {
    pub fn new(bucket: impl Into<String>, filename: impl Into<String>) -> crate::Result<Self> {
        let bucket = bucket.into();
        let filename = filename.into();
        validate_segment("bucket", &bucket)?;
        if bucket.contains(':') {
            return Err(crate::Error::InvalidKey(format!(
                "bucket cannot contain ':': {}",
                bucket
            )));
        }
        validate_segment("filename", &filename)?;
        Ok(Self { bucket, filename })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.bucket, self.filename)
    }
}

impl std::str::FromStr for ObjectKey {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.split_once(':') {
            Some((bucket, filename)) => ObjectKey::new(bucket, filename),
            None => Err(crate::Error::InvalidKey(format!(
                "expected bucket:filename, got {}",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let key = ObjectKey::new("bucket1", "x.txt").unwrap();
        assert_eq!(key.to_string(), "bucket1:x.txt");
        assert_eq!("bucket1:x.txt".parse::<ObjectKey>().unwrap(), key);
    }

    #[test]
    fn test_filename_may_contain_colon() {
        let key: ObjectKey = "logs:12:30.log".parse().unwrap();
        assert_eq!(key.bucket(), "logs");
        assert_eq!(key.filename(), "12:30.log");
    }

    #[test]
    fn test_invalid_keys() {
        assert!("no-separator".parse::<ObjectKey>().is_err());
        assert!(":x.txt".parse::<ObjectKey>().is_err());
        assert!("b:".parse::<ObjectKey>().is_err());
        assert!(ObjectKey::new("b", "../up").is_err());
        assert!(ObjectKey::new("a:b", "f").is_err());
    }
}
