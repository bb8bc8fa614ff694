//! Multipart upload support for large objects

use crate::client::StorageClient;
use crate::config::{MAX_OBJECT_SIZE, MAX_PARTS, MAX_PART_SIZE, MIN_PART_SIZE};
use crate::transport::S3Request;
use crate::xml;
use crate::{ClientError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::{Bytes, BytesMut};
use futures::{stream, TryStreamExt};
use md5::{Digest, Md5};
use reqwest::{header::ETAG, Method};
use std::io::ErrorKind as IoErrorKind;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

const MIB: u64 = 1024 * 1024;

/// Progress callback type
pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Upload progress information
#[derive(Clone, Debug)]
pub struct UploadProgress {
    /// Bytes uploaded so far
    pub bytes_uploaded: u64,
    /// Total bytes to upload
    pub total_bytes: u64,
    /// Part that just finished
    pub current_part: u32,
    /// Total number of parts
    pub total_parts: u32,
}

impl UploadProgress {
    /// Get percentage complete
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.bytes_uploaded as f64 / self.total_bytes as f64) * 100.0
    }
}

/// How an object of known size is split into parts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartPlan {
    /// Declared object size
    pub total_size: u64,
    /// Size of every part but the last
    pub part_size: u64,
    /// Number of parts
    pub part_count: u32,
}

impl PartPlan {
    /// Split `total_size` into parts of `preferred_part_size`.
    ///
    /// The part size is clamped to the provider limits and grown (in whole
    /// MiB) when the object would otherwise need more than 10,000 parts.
    pub fn new(total_size: u64, preferred_part_size: u64) -> Result<Self> {
        if total_size > MAX_OBJECT_SIZE {
            return Err(ClientError::InvalidArgument(format!(
                "object size {} exceeds the maximum of {} bytes",
                total_size, MAX_OBJECT_SIZE
            )));
        }

        let mut part_size = preferred_part_size.clamp(MIN_PART_SIZE, MAX_PART_SIZE);
        if total_size.div_ceil(part_size) > MAX_PARTS {
            part_size = total_size.div_ceil(MAX_PARTS).div_ceil(MIB) * MIB;
            debug!(total_size, part_size, "Grew part size to stay within the part limit");
        }
        let part_count = total_size.div_ceil(part_size).max(1);

        Ok(Self {
            total_size,
            part_size,
            part_count: part_count as u32,
        })
    }

    /// Length of part `part_number` (1-based)
    pub fn part_len(&self, part_number: u32) -> u64 {
        if part_number < self.part_count {
            self.part_size
        } else {
            self.total_size - self.part_size * (self.part_count as u64 - 1)
        }
    }
}

/// A part accepted by the provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedPart {
    /// Part number (1-based)
    pub part_number: u32,
    /// ETag returned for the part, without quotes
    pub etag: String,
    /// Part length in bytes
    pub size: u64,
    digest: [u8; 16],
}

/// Multipart upload handle.
///
/// Dropping a handle that was neither completed nor aborted aborts the
/// upload in the background, so parts are not left behind on the provider.
pub struct MultipartUpload {
    client: StorageClient,
    bucket: String,
    key: String,
    upload_id: String,
    parts: Vec<CompletedPart>,
    finished: bool,
}

impl MultipartUpload {
    /// Start a new multipart upload
    pub async fn start(
        client: &StorageClient,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<Self> {
        crate::client::validate_bucket_name(bucket)?;
        crate::client::validate_object_key(key)?;

        let mut request = S3Request::new(Method::POST)
            .object(bucket, key)
            .query("uploads", "");
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }

        let result: xml::InitiateMultipartUploadResult =
            client.transport().send_xml(request).await?;
        if result.upload_id.is_empty() {
            return Err(ClientError::InvalidResponse(
                "initiate response has an empty UploadId".to_string(),
            ));
        }
        debug!(bucket, key, upload_id = %result.upload_id, "Initiated multipart upload");

        Ok(Self {
            client: client.clone(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: result.upload_id,
            parts: Vec::new(),
            finished: false,
        })
    }

    /// Upload a part; re-uploading a part number replaces the earlier one
    pub async fn upload_part(&mut self, part_number: u32, data: Bytes) -> Result<&CompletedPart> {
        if part_number == 0 || part_number as u64 > MAX_PARTS {
            return Err(ClientError::InvalidArgument(format!(
                "part number {} outside [1, {}]",
                part_number, MAX_PARTS
            )));
        }

        let part = self.send_part(part_number, data).await?;
        self.parts.retain(|p| p.part_number != part_number);
        self.parts.push(part);
        Ok(&self.parts[self.parts.len() - 1])
    }

    /// Complete the upload, returning the object's ETag
    pub async fn complete(mut self) -> Result<String> {
        self.finish().await
    }

    /// Abort the upload
    pub async fn abort(mut self) -> Result<()> {
        self.abort_now().await
    }

    /// Get the upload ID
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Get the number of completed parts
    pub fn completed_parts(&self) -> usize {
        self.parts.len()
    }

    async fn send_part(&self, part_number: u32, data: Bytes) -> Result<CompletedPart> {
        let size = data.len() as u64;
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&Md5::digest(&data));

        let request = S3Request::new(Method::PUT)
            .object(&self.bucket, &self.key)
            .query("partNumber", part_number.to_string())
            .query("uploadId", self.upload_id.as_str())
            .header("content-md5", BASE64.encode(digest))
            .body(data);
        let response = self.client.transport().send(request).await?;

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|s| xml::trim_etag(s).to_string())
            .ok_or_else(|| {
                ClientError::InvalidResponse(format!("part {} response has no ETag", part_number))
            })?;

        // Encrypted objects get opaque ETags; only plain MD5 ETags can be checked
        let expected = hex::encode(digest);
        if is_md5_hex(&etag) && !etag.eq_ignore_ascii_case(&expected) {
            return Err(ClientError::Integrity(format!(
                "part {} ETag {} does not match its MD5 {}",
                part_number, etag, expected
            )));
        }

        debug!(part_number, size, etag = %etag, "Uploaded part");
        Ok(CompletedPart {
            part_number,
            etag,
            size,
            digest,
        })
    }

    /// Read the source part by part and upload up to `concurrency` parts at once
    async fn send_all_parts<R>(
        &self,
        reader: R,
        plan: PartPlan,
        concurrency: usize,
        progress: Option<ProgressCallback>,
    ) -> Result<Vec<CompletedPart>>
    where
        R: AsyncRead + Unpin + Send,
    {
        let chunks = stream::try_unfold(
            (reader, 1u32),
            move |(mut reader, part_number)| async move {
                if part_number > plan.part_count {
                    return Ok::<_, ClientError>(None);
                }

                let mut buf = BytesMut::zeroed(plan.part_len(part_number) as usize);
                reader.read_exact(&mut buf).await.map_err(|e| {
                    if e.kind() == IoErrorKind::UnexpectedEof {
                        ClientError::Integrity(format!(
                            "source ended before the declared {} bytes",
                            plan.total_size
                        ))
                    } else {
                        ClientError::Io(e)
                    }
                })?;

                if part_number == plan.part_count {
                    let mut extra = [0u8; 1];
                    if reader.read(&mut extra).await? != 0 {
                        return Err(ClientError::Integrity(format!(
                            "source is longer than the declared {} bytes",
                            plan.total_size
                        )));
                    }
                }

                Ok(Some(((part_number, buf.freeze()), (reader, part_number + 1))))
            },
        );

        let mut uploaded = 0u64;
        let mut parts: Vec<CompletedPart> = chunks
            .map_ok(|(part_number, data)| self.send_part(part_number, data))
            .try_buffer_unordered(concurrency)
            .inspect_ok(move |part| {
                uploaded += part.size;
                if let Some(cb) = &progress {
                    cb(UploadProgress {
                        bytes_uploaded: uploaded,
                        total_bytes: plan.total_size,
                        current_part: part.part_number,
                        total_parts: plan.part_count,
                    });
                }
            })
            .try_collect()
            .await?;

        parts.sort_by_key(|p| p.part_number);
        Ok(parts)
    }

    async fn finish(&mut self) -> Result<String> {
        if self.parts.is_empty() {
            return Err(ClientError::InvalidArgument(
                "cannot complete a multipart upload with no parts".to_string(),
            ));
        }
        self.parts.sort_by_key(|p| p.part_number);

        let document = xml::CompleteMultipartUpload {
            parts: self
                .parts
                .iter()
                .map(|p| xml::CompletedPartEntry {
                    part_number: p.part_number,
                    etag: format!("\"{}\"", p.etag),
                })
                .collect(),
        };
        let body =
            xml::to_xml("CompleteMultipartUpload", &document).map_err(ClientError::XmlParse)?;

        let request = S3Request::new(Method::POST)
            .object(&self.bucket, &self.key)
            .query("uploadId", self.upload_id.as_str())
            .header("content-type", "application/xml")
            .body(Bytes::from(body));
        let result: xml::CompleteMultipartUploadResult =
            self.client.transport().send_xml(request).await?;

        let etag = xml::trim_etag(&result.etag).to_string();
        let digests: Vec<[u8; 16]> = self.parts.iter().map(|p| p.digest).collect();
        let expected = composite_etag(&digests);
        if is_composite_etag(&etag) && !etag.eq_ignore_ascii_case(&expected) {
            return Err(ClientError::Integrity(format!(
                "object ETag {} does not match the uploaded parts ({})",
                etag, expected
            )));
        }

        self.finished = true;
        info!(
            bucket = %self.bucket,
            key = %self.key,
            parts = self.parts.len(),
            etag = %etag,
            "Completed multipart upload"
        );
        Ok(etag)
    }

    async fn abort_now(&mut self) -> Result<()> {
        self.finished = true;
        abort_upload(&self.client, &self.bucket, &self.key, &self.upload_id).await
    }
}

impl Drop for MultipartUpload {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                upload_id = %self.upload_id,
                "Multipart upload dropped outside a runtime; not aborted"
            );
            return;
        };

        let client = self.client.clone();
        let bucket = std::mem::take(&mut self.bucket);
        let key = std::mem::take(&mut self.key);
        let upload_id = std::mem::take(&mut self.upload_id);
        handle.spawn(async move {
            match abort_upload(&client, &bucket, &key, &upload_id).await {
                Ok(()) => debug!(upload_id = %upload_id, "Aborted abandoned multipart upload"),
                Err(e) => warn!(
                    upload_id = %upload_id,
                    error = %e,
                    "Failed to abort abandoned multipart upload"
                ),
            }
        });
    }
}

/// Upload `size` bytes from `reader` as a multipart upload.
///
/// Any failure aborts the upload; the returned error carries the cause and,
/// if the abort failed as well, that error too.
pub(crate) async fn upload_stream<R>(
    client: &StorageClient,
    bucket: &str,
    key: &str,
    reader: R,
    size: u64,
    content_type: Option<&str>,
    progress: Option<ProgressCallback>,
) -> Result<String>
where
    R: AsyncRead + Unpin + Send,
{
    let plan = PartPlan::new(size, client.config().part_size)?;
    let concurrency = client.config().multipart_concurrency;

    let mut upload = MultipartUpload::start(client, bucket, key, content_type).await?;
    info!(
        bucket,
        key,
        size,
        parts = plan.part_count,
        upload_id = %upload.upload_id,
        "Starting multipart upload"
    );

    let outcome = match upload.send_all_parts(reader, plan, concurrency, progress).await {
        Ok(parts) => {
            upload.parts = parts;
            upload.finish().await
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(etag) => Ok(etag),
        Err(source) => {
            let upload_id = upload.upload_id.clone();
            let abort_error = upload.abort_now().await.err();
            warn!(
                upload_id = %upload_id,
                error = %source,
                abort_failed = abort_error.is_some(),
                "Multipart upload failed; aborted"
            );
            Err(ClientError::MultipartAborted {
                upload_id,
                source: Box::new(source),
                abort_error: abort_error.map(Box::new),
            })
        }
    }
}

async fn abort_upload(
    client: &StorageClient,
    bucket: &str,
    key: &str,
    upload_id: &str,
) -> Result<()> {
    let request = S3Request::new(Method::DELETE)
        .object(bucket, key)
        .query("uploadId", upload_id);
    match client.transport().send(request).await {
        Ok(_) => Ok(()),
        // Already gone
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

/// ETag S3 assigns to a multipart object: `hex(md5(md5_1 ‖ … ‖ md5_n))-n`
pub fn composite_etag(part_digests: &[[u8; 16]]) -> String {
    let mut hasher = Md5::new();
    for digest in part_digests {
        hasher.update(digest);
    }
    format!("{}-{}", hex::encode(hasher.finalize()), part_digests.len())
}

pub(crate) fn is_md5_hex(etag: &str) -> bool {
    etag.len() == 32 && etag.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_composite_etag(etag: &str) -> bool {
    match etag.split_once('-') {
        Some((digest, count)) => {
            is_md5_hex(digest) && !count.is_empty() && count.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}
