//! Object upload, download, stat and listing

use crate::client::{validate_bucket_name, validate_object_key, StorageClient};
use crate::list::ObjectLister;
use crate::multipart::{self, ProgressCallback, UploadProgress};
use crate::stream::ObjectStream;
use crate::transport::S3Request;
use crate::types::{ByteRange, ListEntry, ObjectDescriptor};
use crate::xml;
use crate::{ClientError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use md5::{Digest, Md5};
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use reqwest::Method;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, info, instrument};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

impl StorageClient {
    // ==================== Upload ====================

    /// Upload exactly `size` bytes read from `body`.
    ///
    /// Objects larger than the multipart threshold are split into parts and
    /// uploaded concurrently; smaller ones go in a single request. A body
    /// shorter or longer than `size` fails with an integrity error. Returns
    /// the stored object's descriptor; `last_modified` is left unset since
    /// PUT responses do not carry it.
    pub async fn put_object<R>(
        &self,
        bucket: &str,
        key: &str,
        body: R,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<ObjectDescriptor>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.put_object_with_progress(bucket, key, body, size, content_type, None)
            .await
    }

    /// [`StorageClient::put_object`] reporting progress after each part
    #[instrument(skip(self, body, progress))]
    pub async fn put_object_with_progress<R>(
        &self,
        bucket: &str,
        key: &str,
        mut body: R,
        size: u64,
        content_type: Option<&str>,
        progress: Option<ProgressCallback>,
    ) -> Result<ObjectDescriptor>
    where
        R: AsyncRead + Unpin + Send,
    {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;

        if size > self.config().multipart_threshold {
            let etag =
                multipart::upload_stream(self, bucket, key, body, size, content_type, progress)
                    .await?;
            return Ok(uploaded(key, size, etag, content_type));
        }

        let mut buf = Vec::with_capacity(size as usize);
        (&mut body).take(size).read_to_end(&mut buf).await?;
        if (buf.len() as u64) < size {
            return Err(ClientError::Integrity(format!(
                "source ended after {} of the declared {} bytes",
                buf.len(),
                size
            )));
        }
        let mut extra = [0u8; 1];
        if body.read(&mut extra).await? != 0 {
            return Err(ClientError::Integrity(format!(
                "source is longer than the declared {} bytes",
                size
            )));
        }

        let etag = self
            .put_single(bucket, key, Bytes::from(buf), content_type)
            .await?;
        if let Some(cb) = &progress {
            cb(UploadProgress {
                bytes_uploaded: size,
                total_bytes: size,
                current_part: 1,
                total_parts: 1,
            });
        }
        Ok(uploaded(key, size, etag, content_type))
    }

    /// Upload an in-memory object
    pub async fn put_object_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        content_type: Option<&str>,
    ) -> Result<ObjectDescriptor> {
        let data = data.into();
        let size = data.len() as u64;
        if size > self.config().multipart_threshold {
            return self.put_object(bucket, key, &data[..], size, content_type).await;
        }

        validate_bucket_name(bucket)?;
        validate_object_key(key)?;
        let etag = self.put_single(bucket, key, data, content_type).await?;
        Ok(uploaded(key, size, etag, content_type))
    }

    /// Upload a local file. The content type is guessed from the file
    /// extension when not given.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: impl AsRef<Path>,
        content_type: Option<&str>,
    ) -> Result<ObjectDescriptor> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let content_type = match content_type {
            Some(ct) => ct.to_string(),
            None => mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };

        let object = self
            .put_object(bucket, key, BufReader::new(file), size, Some(&content_type))
            .await?;
        info!(bucket, key, size, etag = %object.etag, "Uploaded file");
        Ok(object)
    }

    async fn put_single(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<String> {
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&Md5::digest(&data));
        let size = data.len();

        let request = S3Request::new(Method::PUT)
            .object(bucket, key)
            .header("content-type", content_type.unwrap_or(DEFAULT_CONTENT_TYPE))
            .header("content-md5", BASE64.encode(digest))
            .body(data);
        let response = self.transport().send(request).await?;

        let etag = header_str(response.headers(), ETAG.as_str())
            .map(|s| xml::trim_etag(s).to_string())
            .unwrap_or_default();
        let expected = hex::encode(digest);
        if multipart::is_md5_hex(&etag) && !etag.eq_ignore_ascii_case(&expected) {
            return Err(ClientError::Integrity(format!(
                "object ETag {} does not match the uploaded MD5 {}",
                etag, expected
            )));
        }

        debug!(bucket, key, size, etag = %etag, "Put object");
        Ok(etag)
    }

    // ==================== Download ====================

    /// Stream an object's content
    #[instrument(skip(self))]
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectStream> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;

        let request = S3Request::new(Method::GET).object(bucket, key).streaming();
        let response = self.transport().send(request).await?;
        let info = describe(key, response.headers())?;
        Ok(ObjectStream::new(info, None, response))
    }

    /// Stream part of an object
    #[instrument(skip(self))]
    pub async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        range: ByteRange,
    ) -> Result<ObjectStream> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;

        let request = S3Request::new(Method::GET)
            .object(bucket, key)
            .header("range", range.header_value())
            .streaming();
        let response = self.transport().send(request).await?;
        let info = describe(key, response.headers())?;
        let content_range =
            header_str(response.headers(), CONTENT_RANGE.as_str()).map(str::to_string);
        Ok(ObjectStream::new(info, content_range, response))
    }

    /// Download an object to `dir/key`, creating parent directories.
    ///
    /// The object is stat'ed first, then written to a temporary `.part`
    /// file that is renamed into place once the body is complete.
    #[instrument(skip(self, dir), fields(dir = %dir.as_ref().display()))]
    pub async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        dir: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        validate_object_key(key)?;
        let relative = Path::new(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ClientError::InvalidArgument(format!(
                "object key '{}' cannot be used as a relative file path",
                key
            )));
        }

        let info = self.stat_object(bucket, key).await?;

        let target = dir.as_ref().join(relative);
        let file_name = target
            .file_name()
            .ok_or_else(|| {
                ClientError::InvalidArgument(format!("object key '{}' has no file name", key))
            })?
            .to_string_lossy()
            .into_owned();
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = target.with_file_name(format!("{}.part", file_name));

        let body = self.get_object(bucket, key).await?;
        let mut file = tokio::fs::File::create(&partial).await?;
        match body.write_to(&mut file).await {
            Ok(written) => {
                file.sync_all().await?;
                drop(file);
                tokio::fs::rename(&partial, &target).await?;
                info!(bucket, key, size = written, expected = info.size, "Downloaded file");
                Ok(target)
            }
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }

    // ==================== Metadata ====================

    /// Get object metadata without its content
    #[instrument(skip(self))]
    pub async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectDescriptor> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;

        let response = self
            .transport()
            .send(S3Request::new(Method::HEAD).object(bucket, key))
            .await?;
        describe(key, response.headers())
    }

    /// Delete an object. Deleting a missing key succeeds.
    #[instrument(skip(self))]
    pub async fn remove_object(&self, bucket: &str, key: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;

        self.transport()
            .send(S3Request::new(Method::DELETE).object(bucket, key))
            .await?;
        Ok(())
    }

    // ==================== Listing ====================

    /// Stream the objects under `prefix`.
    ///
    /// Non-recursive listings yield a [`ListEntry::CommonPrefix`] for each
    /// pseudo-directory instead of the objects below it.
    pub fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> BoxStream<'static, Result<ListEntry>> {
        match self.lister(bucket, prefix, recursive) {
            Ok(lister) => lister.into_stream(),
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        }
    }

    /// Page-by-page listing with resumable continuation tokens
    pub fn lister(&self, bucket: &str, prefix: &str, recursive: bool) -> Result<ObjectLister> {
        validate_bucket_name(bucket)?;
        Ok(ObjectLister::new(self.clone(), bucket, prefix, recursive))
    }
}

fn uploaded(key: &str, size: u64, etag: String, content_type: Option<&str>) -> ObjectDescriptor {
    ObjectDescriptor {
        key: key.to_string(),
        size,
        etag,
        last_modified: None,
        content_type: Some(content_type.unwrap_or(DEFAULT_CONTENT_TYPE).to_string()),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Object metadata from GET/HEAD response headers.
///
/// HEAD responses have no body, so the size comes from the raw
/// `Content-Length` header; ranged responses carry the full size in
/// `Content-Range`.
fn describe(key: &str, headers: &HeaderMap) -> Result<ObjectDescriptor> {
    let content_range = header_str(headers, CONTENT_RANGE.as_str());
    let size = match content_range.and_then(total_from_content_range) {
        Some(total) => total,
        None => header_str(headers, CONTENT_LENGTH.as_str())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| {
                ClientError::InvalidResponse(format!(
                    "response for '{}' has no Content-Length",
                    key
                ))
            })?,
    };

    Ok(ObjectDescriptor {
        key: key.to_string(),
        size,
        etag: header_str(headers, ETAG.as_str())
            .map(|s| xml::trim_etag(s).to_string())
            .unwrap_or_default(),
        last_modified: header_str(headers, LAST_MODIFIED.as_str()).and_then(xml::parse_http_date),
        content_type: header_str(headers, CONTENT_TYPE.as_str()).map(str::to_string),
    })
}

/// `bytes 0-9/100` -> `100`
fn total_from_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_describe_head_response() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1024"));
        headers.insert(ETAG, HeaderValue::from_static("\"0cc175b9c0f1b6a831c399e269772661\""));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert(LAST_MODIFIED, HeaderValue::from_static("Tue, 05 Mar 2024 07:08:09 GMT"));

        let info = describe("notes.txt", &headers).unwrap();
        assert_eq!(info.size, 1024);
        assert_eq!(info.etag, "0cc175b9c0f1b6a831c399e269772661");
        assert_eq!(info.content_type.as_deref(), Some("text/plain"));
        assert!(info.last_modified.is_some());
    }

    #[test]
    fn test_describe_ranged_response_reports_full_size() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("10"));
        headers.insert(CONTENT_RANGE, HeaderValue::from_static("bytes 0-9/100"));

        assert_eq!(describe("k", &headers).unwrap().size, 100);
    }

    #[test]
    fn test_describe_requires_length() {
        let err = describe("k", &HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }
}
