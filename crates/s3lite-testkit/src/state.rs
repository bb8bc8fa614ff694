//! Application state

use crate::GatewayConfig;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use s3lite_client::{Credentials, Signer};
use std::collections::{BTreeMap, HashMap};

/// A stored object
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub data: Bytes,
    /// ETag without quotes
    pub etag: String,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
}

/// A bucket and its objects, ordered by key
#[derive(Debug)]
pub struct BucketData {
    pub created: DateTime<Utc>,
    pub objects: BTreeMap<String, StoredObject>,
}

/// A part received for a pending upload
#[derive(Clone, Debug)]
pub struct UploadedPart {
    pub etag: String,
    pub digest: [u8; 16],
    pub data: Bytes,
}

/// A multipart upload that was initiated but not yet completed or aborted
#[derive(Debug)]
pub struct PendingUpload {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub parts: BTreeMap<u32, UploadedPart>,
}

/// Summary of one part of a completed upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartRecord {
    pub part_number: u32,
    pub etag: String,
    pub size: u64,
}

/// A completed multipart upload, kept for inspection by tests
#[derive(Clone, Debug)]
pub struct CompletedUpload {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub etag: String,
    pub parts: Vec<PartRecord>,
}

/// Everything the gateway stores
#[derive(Debug, Default)]
pub struct Store {
    pub buckets: BTreeMap<String, BucketData>,
    pub uploads: HashMap<String, PendingUpload>,
    pub completed: Vec<CompletedUpload>,
    pub aborted: Vec<String>,
    /// Part number whose upload is answered with 500 InternalError
    pub fail_part: Option<u32>,
}

/// Shared application state
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Verifies request signatures
    pub signer: Signer,
    store: Mutex<Store>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: GatewayConfig) -> Self {
        let signer = Signer::new(
            Credentials::new(config.access_key.clone(), config.secret_key.clone()),
            config.region.clone(),
        );
        Self {
            config,
            signer,
            store: Mutex::new(Store::default()),
        }
    }

    pub(crate) fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock()
    }

    /// Names of all buckets
    pub fn bucket_names(&self) -> Vec<String> {
        self.store().buckets.keys().cloned().collect()
    }

    /// Keys in a bucket; empty if the bucket does not exist
    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        self.store()
            .buckets
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// A stored object's content
    pub fn object_data(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.store()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| o.data.clone())
    }

    /// Number of multipart uploads still pending
    pub fn pending_uploads(&self) -> usize {
        self.store().uploads.len()
    }

    /// Ids of aborted multipart uploads
    pub fn aborted_uploads(&self) -> Vec<String> {
        self.store().aborted.clone()
    }

    /// Completed multipart uploads, oldest first
    pub fn completed_uploads(&self) -> Vec<CompletedUpload> {
        self.store().completed.clone()
    }

    /// Make uploads of `part_number` fail with 500 until cleared with `None`
    pub fn fail_part(&self, part_number: Option<u32>) {
        self.store().fail_part = part_number;
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
