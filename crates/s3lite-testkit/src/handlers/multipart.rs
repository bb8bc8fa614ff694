//! Multipart upload handlers

use super::bucket::no_such_bucket;
use super::object::validate_key;
use super::{quoted, verify_content_md5, verify_payload_hash, xml_response};
use crate::state::{CompletedUpload, PartRecord, PendingUpload, StoredObject, UploadedPart};
use crate::{ApiError, AppState, S3ErrorCode};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use md5::{Digest, Md5};
use s3lite_client::xml::{
    self, CompleteMultipartUpload, CompleteMultipartUploadResult, InitiateMultipartUploadResult,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

const MAX_PART_NUMBER: u32 = 10_000;

/// Query parameters for multipart operations
#[derive(Debug, Default, Deserialize)]
pub struct MultipartParams {
    #[serde(rename = "uploadId")]
    pub upload_id: Option<String>,
    #[serde(rename = "partNumber")]
    pub part_number: Option<u32>,
    pub uploads: Option<String>,
}

/// POST /{bucket}/{key}?uploads - Create multipart upload
pub async fn create_multipart_upload(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    validate_key(&key)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let upload_id = uuid::Uuid::new_v4().simple().to_string();
    {
        let mut store = state.store();
        if !store.buckets.contains_key(&bucket) {
            return Err(no_such_bucket(&bucket));
        }
        store.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.clone(),
                key: key.clone(),
                content_type,
                parts: BTreeMap::new(),
            },
        );
    }
    tracing::debug!(
        bucket = %bucket,
        key = %key,
        upload_id = %upload_id,
        "Created multipart upload"
    );

    xml_response(
        "InitiateMultipartUploadResult",
        &InitiateMultipartUploadResult {
            xmlns: Some(xml::S3_NAMESPACE.to_string()),
            bucket,
            key,
            upload_id,
        },
    )
}

/// PUT /{bucket}/{key}?partNumber=N&uploadId=X - Upload part
pub async fn upload_part(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<MultipartParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let upload_id = params.upload_id.unwrap_or_default();
    let part_number = params
        .part_number
        .filter(|n| (1..=MAX_PART_NUMBER).contains(n))
        .ok_or_else(|| {
            ApiError::s3(
                S3ErrorCode::InvalidArgument,
                "Part number must be an integer between 1 and 10000, inclusive",
            )
        })?;

    verify_payload_hash(&headers, &body)?;
    let digest = verify_content_md5(&headers, &body)?;
    let etag = hex::encode(digest);

    let mut store = state.store();
    if store.fail_part == Some(part_number) {
        return Err(ApiError::s3(
            S3ErrorCode::InternalError,
            "We encountered an internal error. Please try again.",
        ));
    }
    let upload = pending_upload(&mut store.uploads, &upload_id, &bucket, &key)?;
    upload.parts.insert(
        part_number,
        UploadedPart {
            etag: etag.clone(),
            digest,
            data: body,
        },
    );

    Ok((StatusCode::OK, [(header::ETAG, quoted(&etag))], "").into_response())
}

/// POST /{bucket}/{key}?uploadId=X - Complete multipart upload
pub async fn complete_multipart_upload(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<MultipartParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let upload_id = params.upload_id.unwrap_or_default();
    verify_payload_hash(&headers, &body)?;

    let text = std::str::from_utf8(&body)
        .map_err(|_| ApiError::s3(S3ErrorCode::MalformedXML, "Body is not UTF-8"))?;
    let request: CompleteMultipartUpload = xml::from_xml(text).map_err(|e| {
        ApiError::s3(
            S3ErrorCode::MalformedXML,
            format!("The XML you provided was not well-formed: {}", e),
        )
    })?;
    if request.parts.is_empty() {
        return Err(ApiError::s3(
            S3ErrorCode::MalformedXML,
            "You must specify at least one part",
        ));
    }
    if request
        .parts
        .windows(2)
        .any(|w| w[0].part_number >= w[1].part_number)
    {
        return Err(ApiError::s3(
            S3ErrorCode::InvalidPartOrder,
            "The list of parts was not in ascending order.",
        ));
    }

    let min_part_size = state.config.min_part_size;
    let mut store = state.store();
    let upload = pending_upload(&mut store.uploads, &upload_id, &bucket, &key)?;

    let mut data = BytesMut::new();
    let mut hasher = Md5::new();
    let mut records = Vec::with_capacity(request.parts.len());
    let last = request.parts.len() - 1;
    for (idx, requested) in request.parts.iter().enumerate() {
        let part = upload
            .parts
            .get(&requested.part_number)
            .filter(|p| p.etag == xml::trim_etag(&requested.etag))
            .ok_or_else(|| {
                ApiError::s3(
                    S3ErrorCode::InvalidPart,
                    format!(
                        "Part {} could not be found or its ETag did not match",
                        requested.part_number
                    ),
                )
            })?;
        if idx != last && (part.data.len() as u64) < min_part_size {
            return Err(ApiError::s3(
                S3ErrorCode::EntityTooSmall,
                format!(
                    "Part {} is smaller than the minimum allowed size of {} bytes",
                    requested.part_number, min_part_size
                ),
            ));
        }

        hasher.update(part.digest);
        data.extend_from_slice(&part.data);
        records.push(PartRecord {
            part_number: requested.part_number,
            etag: part.etag.clone(),
            size: part.data.len() as u64,
        });
    }
    let etag = format!("{}-{}", hex::encode(hasher.finalize()), records.len());
    let content_type = upload.content_type.clone();

    let bucket_data = store
        .buckets
        .get_mut(&bucket)
        .ok_or_else(|| no_such_bucket(&bucket))?;
    bucket_data.objects.insert(
        key.clone(),
        StoredObject {
            data: data.freeze(),
            etag: etag.clone(),
            content_type,
            last_modified: Utc::now(),
        },
    );
    store.uploads.remove(&upload_id);
    store.completed.push(CompletedUpload {
        bucket: bucket.clone(),
        key: key.clone(),
        upload_id: upload_id.clone(),
        etag: etag.clone(),
        parts: records,
    });
    drop(store);
    tracing::debug!(
        bucket = %bucket,
        key = %key,
        upload_id = %upload_id,
        etag = %etag,
        "Completed multipart upload"
    );

    xml_response(
        "CompleteMultipartUploadResult",
        &CompleteMultipartUploadResult {
            xmlns: Some(xml::S3_NAMESPACE.to_string()),
            location: Some(format!("/{}/{}", bucket, key)),
            bucket,
            key,
            etag: quoted(&etag),
        },
    )
}

/// DELETE /{bucket}/{key}?uploadId=X - Abort multipart upload
pub async fn abort_multipart_upload(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<MultipartParams>,
) -> Result<Response, ApiError> {
    let upload_id = params.upload_id.unwrap_or_default();

    let mut store = state.store();
    pending_upload(&mut store.uploads, &upload_id, &bucket, &key)?;
    store.uploads.remove(&upload_id);
    store.aborted.push(upload_id.clone());
    drop(store);
    tracing::debug!(
        bucket = %bucket,
        key = %key,
        upload_id = %upload_id,
        "Aborted multipart upload"
    );

    Ok(StatusCode::NO_CONTENT.into_response())
}

fn pending_upload<'a>(
    uploads: &'a mut std::collections::HashMap<String, PendingUpload>,
    upload_id: &str,
    bucket: &str,
    key: &str,
) -> Result<&'a mut PendingUpload, ApiError> {
    uploads
        .get_mut(upload_id)
        .filter(|u| u.bucket == bucket && u.key == key)
        .ok_or_else(|| {
            ApiError::s3_with_resource(
                S3ErrorCode::NoSuchUpload,
                "The specified upload does not exist.",
                upload_id,
            )
        })
}
