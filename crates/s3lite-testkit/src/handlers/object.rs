//! Object operation handlers

use super::bucket::no_such_bucket;
use super::{quoted, verify_content_md5, verify_payload_hash};
use crate::state::StoredObject;
use crate::{ApiError, AppState, S3ErrorCode};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use s3lite_client::xml;
use std::sync::Arc;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// PUT /{bucket}/{key} - Put object
pub async fn put_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    validate_key(&key)?;
    verify_payload_hash(&headers, &body)?;
    let digest = verify_content_md5(&headers, &body)?;
    let etag = hex::encode(digest);

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let mut store = state.store();
    let data = store
        .buckets
        .get_mut(&bucket)
        .ok_or_else(|| no_such_bucket(&bucket))?;
    let size = body.len();
    data.objects.insert(
        key.clone(),
        StoredObject {
            data: body,
            etag: etag.clone(),
            content_type,
            last_modified: Utc::now(),
        },
    );
    tracing::debug!(bucket = %bucket, key = %key, size, "Stored object");

    Ok((StatusCode::OK, [(header::ETAG, quoted(&etag))], "").into_response())
}

/// GET /{bucket}/{key} - Get object
pub async fn get_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let object = lookup(&state, &bucket, &key)?;
    let total_size = object.data.len();

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (status, body, content_range) = match range {
        Some(range) if total_size > 0 => {
            let (start, end) = parse_range_header(&range, total_size).map_err(|_| {
                ApiError::s3(
                    S3ErrorCode::InvalidRange,
                    "The requested range is not satisfiable",
                )
            })?;
            (
                StatusCode::PARTIAL_CONTENT,
                object.data.slice(start..=end),
                Some(format!("bytes {}-{}/{}", start, end, total_size)),
            )
        }
        _ => (StatusCode::OK, object.data.clone(), None),
    };

    let mut response = Response::builder()
        .status(status)
        .header(header::CONTENT_LENGTH, body.len())
        .header(header::CONTENT_TYPE, &object.content_type)
        .header(header::ETAG, quoted(&object.etag))
        .header(header::LAST_MODIFIED, xml::format_http_date(&object.last_modified))
        .header(header::ACCEPT_RANGES, "bytes");
    if let Some(content_range) = content_range {
        response = response.header(header::CONTENT_RANGE, content_range);
    }

    response
        .body(Body::from(body))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Parse a `Range: bytes=…` header into inclusive offsets
pub(crate) fn parse_range_header(range: &str, total_size: usize) -> Result<(usize, usize), ()> {
    let range = range.strip_prefix("bytes=").ok_or(())?;

    let (start_str, end_str) = range.split_once('-').ok_or(())?;
    if start_str.is_empty() {
        // Suffix range: bytes=-500 means last 500 bytes
        let suffix_len: usize = end_str.parse().map_err(|_| ())?;
        if suffix_len == 0 {
            return Err(());
        }
        Ok((total_size.saturating_sub(suffix_len), total_size - 1))
    } else if end_str.is_empty() {
        let start: usize = start_str.parse().map_err(|_| ())?;
        if start >= total_size {
            return Err(());
        }
        Ok((start, total_size - 1))
    } else {
        let start: usize = start_str.parse().map_err(|_| ())?;
        let end: usize = end_str.parse().map_err(|_| ())?;
        if start > end || start >= total_size {
            return Err(());
        }
        Ok((start, end.min(total_size - 1)))
    }
}

/// HEAD /{bucket}/{key} - Head object
pub async fn head_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let object = lookup(&state, &bucket, &key)?;

    // No body, so the length is set explicitly
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, object.data.len())
        .header(header::CONTENT_TYPE, &object.content_type)
        .header(header::ETAG, quoted(&object.etag))
        .header(header::LAST_MODIFIED, xml::format_http_date(&object.last_modified))
        .body(Body::empty())
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// DELETE /{bucket}/{key} - Delete object; missing keys are not an error
pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let mut store = state.store();
    let data = store
        .buckets
        .get_mut(&bucket)
        .ok_or_else(|| no_such_bucket(&bucket))?;
    data.objects.remove(&key);

    Ok(StatusCode::NO_CONTENT.into_response())
}

fn lookup(state: &AppState, bucket: &str, key: &str) -> Result<StoredObject, ApiError> {
    let store = state.store();
    let data = store
        .buckets
        .get(bucket)
        .ok_or_else(|| no_such_bucket(bucket))?;
    data.objects.get(key).cloned().ok_or_else(|| {
        ApiError::s3_with_resource(
            S3ErrorCode::NoSuchKey,
            "The specified key does not exist.",
            format!("/{}/{}", bucket, key),
        )
    })
}

pub(crate) fn validate_key(key: &str) -> Result<(), ApiError> {
    s3lite_client::validate_object_key(key)
        .map_err(|e| ApiError::s3(S3ErrorCode::InvalidArgument, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_header() {
        assert_eq!(parse_range_header("bytes=0-9", 100), Ok((0, 9)));
        assert_eq!(parse_range_header("bytes=90-", 100), Ok((90, 99)));
        assert_eq!(parse_range_header("bytes=-10", 100), Ok((90, 99)));
        assert_eq!(parse_range_header("bytes=50-500", 100), Ok((50, 99)));
        assert!(parse_range_header("bytes=100-", 100).is_err());
        assert!(parse_range_header("bytes=9-0", 100).is_err());
        assert!(parse_range_header("items=0-9", 100).is_err());
    }
}
