//! Common types for the client SDK

use crate::{ClientError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A bucket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketDescriptor {
    /// Bucket name
    pub name: String,
    /// Creation date
    pub creation_date: DateTime<Utc>,
}

/// An object in a bucket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// ETag without surrounding quotes
    pub etag: String,
    /// Last modified time, when the provider reported one
    pub last_modified: Option<DateTime<Utc>>,
    /// Content type, when the provider reported one
    pub content_type: Option<String>,
}

/// One entry of an object listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListEntry {
    /// A stored object
    Object(ObjectDescriptor),
    /// Keys sharing this prefix up to the next `/`, collapsed into one pseudo-directory
    CommonPrefix(String),
}

impl ListEntry {
    /// Object key or common prefix
    pub fn name(&self) -> &str {
        match self {
            Self::Object(obj) => &obj.key,
            Self::CommonPrefix(prefix) => prefix,
        }
    }

    /// Whether this entry is a pseudo-directory
    pub fn is_prefix(&self) -> bool {
        matches!(self, Self::CommonPrefix(_))
    }

    /// The object, if this entry is one
    pub fn as_object(&self) -> Option<&ObjectDescriptor> {
        match self {
            Self::Object(obj) => Some(obj),
            Self::CommonPrefix(_) => None,
        }
    }
}

/// Inclusive byte range for partial reads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    start: u64,
    end: Option<u64>,
}

impl ByteRange {
    /// Bytes `start..=end`
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if start > end {
            return Err(ClientError::InvalidArgument(format!(
                "range start {} is past end {}",
                start, end
            )));
        }
        Ok(Self {
            start,
            end: Some(end),
        })
    }

    /// Bytes from `start` to the end of the object
    pub fn starting_at(start: u64) -> Self {
        Self { start, end: None }
    }

    /// First byte offset
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last byte offset, if bounded
    pub fn end(&self) -> Option<u64> {
        self.end
    }

    /// Value of the `Range` request header
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header_value())
    }
}

/// A time-limited URL granting access without credentials
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedUrl {
    /// The full URL, signature included
    pub url: String,
    /// When the provider stops accepting it
    pub expires_at: DateTime<Utc>,
}

impl fmt::Display for PresignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_range_header() {
        assert_eq!(ByteRange::new(0, 9).unwrap().header_value(), "bytes=0-9");
        assert_eq!(ByteRange::starting_at(100).header_value(), "bytes=100-");
        assert!(ByteRange::new(10, 9).is_err());
    }

    #[test]
    fn test_list_entry_name() {
        let prefix = ListEntry::CommonPrefix("a/".to_string());
        assert!(prefix.is_prefix());
        assert_eq!(prefix.name(), "a/");
        assert!(prefix.as_object().is_none());
    }
}
