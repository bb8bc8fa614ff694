//! # s3lite client
//!
//! A small client for S3-compatible object storage (AWS S3, MinIO and
//! friends).
//!
//! ## Features
//!
//! - **SigV4**: header signing and presigned URLs, with signing keys cached per day
//! - **Streaming**: downloads are read chunk by chunk; uploads read the source part by part
//! - **Multipart**: large objects are split into parts uploaded concurrently,
//!   with every part checked against its MD5 and aborted on failure
//! - **Listing**: paginated ListObjectsV2 as a lazy stream or page by page
//!
//! ## Example
//!
//! ```rust,ignore
//! use s3lite_client::StorageClient;
//! use futures::TryStreamExt;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = StorageClient::with_endpoint("localhost:9000", "minioadmin", "minioadmin")?;
//!
//!     // Create a bucket
//!     client.make_bucket("my-bucket").await?;
//!
//!     // Upload and read back
//!     client.put_object_bytes("my-bucket", "hello.txt", "Hello, World!", Some("text/plain")).await?;
//!     let data = client.get_object("my-bucket", "hello.txt").await?.bytes().await?;
//!     println!("Content: {}", String::from_utf8_lossy(&data));
//!
//!     // List
//!     let entries: Vec<_> = client.list_objects("my-bucket", "", true).try_collect().await?;
//!     println!("{} objects", entries.len());
//!
//!     // Share
//!     let url = client.presigned_get_url("my-bucket", "hello.txt", Duration::from_secs(3600))?;
//!     println!("{}", url);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod list;
mod multipart;
mod object_io;
mod stream;
mod transport;
mod types;

pub mod signer;
pub mod xml;

pub use client::{validate_bucket_name, validate_object_key, StorageClient, MAX_KEY_LENGTH};
pub use config::{
    Config, Credentials, Endpoint, DEFAULT_REGION, MAX_OBJECT_SIZE, MAX_PARTS, MAX_PART_SIZE,
    MIN_PART_SIZE,
};
pub use error::{ClientError, ErrorKind, ProviderError, Result};
pub use list::{ObjectLister, MAX_PAGE_SIZE};
pub use multipart::{
    composite_etag, CompletedPart, MultipartUpload, PartPlan, ProgressCallback, UploadProgress,
};
pub use reqwest::Method;
pub use signer::{SignatureError, Signer};
pub use stream::ObjectStream;
pub use types::*;
