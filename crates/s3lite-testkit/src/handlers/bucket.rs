//! Bucket operation handlers

use super::{verify_payload_hash, xml_response};
use crate::state::BucketData;
use crate::{ApiError, AppState, S3ErrorCode};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use chrono::Utc;
use s3lite_client::xml::{
    self, BucketEntry, BucketList, CommonPrefixEntry, ContentsEntry, ListAllMyBucketsResult,
    ListBucketResult,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

const MAX_KEYS: usize = 1000;

/// GET / - List buckets
pub async fn list_buckets(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let buckets = state
        .store()
        .buckets
        .iter()
        .map(|(name, data)| BucketEntry {
            name: name.clone(),
            creation_date: xml::format_timestamp(&data.created),
        })
        .collect();

    xml_response(
        "ListAllMyBucketsResult",
        &ListAllMyBucketsResult {
            xmlns: Some(xml::S3_NAMESPACE.to_string()),
            buckets: BucketList { bucket: buckets },
        },
    )
}

/// PUT /{bucket} - Create bucket
pub async fn create_bucket(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    verify_payload_hash(&headers, &body)?;
    s3lite_client::validate_bucket_name(&bucket)
        .map_err(|e| ApiError::s3(S3ErrorCode::InvalidBucketName, e.to_string()))?;

    let mut store = state.store();
    if store.buckets.contains_key(&bucket) {
        return Err(ApiError::s3_with_resource(
            S3ErrorCode::BucketAlreadyOwnedByYou,
            "Your previous request to create the named bucket succeeded and you already own it.",
            format!("/{}", bucket),
        ));
    }
    store.buckets.insert(
        bucket.clone(),
        BucketData {
            created: Utc::now(),
            objects: BTreeMap::new(),
        },
    );
    tracing::debug!(bucket = %bucket, "Created bucket");

    Ok((StatusCode::OK, [("Location", format!("/{}", bucket))], "").into_response())
}

/// DELETE /{bucket} - Delete bucket
pub async fn delete_bucket(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
) -> Result<Response, ApiError> {
    let mut store = state.store();
    let data = store
        .buckets
        .get(&bucket)
        .ok_or_else(|| no_such_bucket(&bucket))?;
    if !data.objects.is_empty() {
        return Err(ApiError::s3_with_resource(
            S3ErrorCode::BucketNotEmpty,
            "The bucket you tried to delete is not empty",
            format!("/{}", bucket),
        ));
    }
    store.buckets.remove(&bucket);

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// HEAD /{bucket} - Check if bucket exists
pub async fn head_bucket(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
) -> Result<Response, ApiError> {
    if !state.store().buckets.contains_key(&bucket) {
        return Err(no_such_bucket(&bucket));
    }
    Ok(StatusCode::OK.into_response())
}

/// Query parameters for ListObjectsV2
#[derive(Debug, Default, Deserialize)]
pub struct ListObjectsParams {
    #[serde(rename = "list-type")]
    pub list_type: Option<u8>,
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    #[serde(rename = "max-keys")]
    pub max_keys: Option<usize>,
    #[serde(rename = "continuation-token")]
    pub continuation_token: Option<String>,
    #[serde(rename = "start-after")]
    pub start_after: Option<String>,
}

/// GET /{bucket}?list-type=2 - List objects
pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    Query(params): Query<ListObjectsParams>,
) -> Result<Response, ApiError> {
    let prefix = params.prefix.clone().unwrap_or_default();
    let delimiter = params.delimiter.clone().filter(|d| !d.is_empty());
    let max_keys = params.max_keys.unwrap_or(MAX_KEYS).clamp(1, MAX_KEYS);

    let marker = match &params.continuation_token {
        Some(token) => decode_token(token)?,
        None => params.start_after.clone().unwrap_or_default(),
    };

    let store = state.store();
    let data = store
        .buckets
        .get(&bucket)
        .ok_or_else(|| no_such_bucket(&bucket))?;

    let mut contents = Vec::new();
    let mut common_prefixes: Vec<String> = Vec::new();
    let mut last_name: Option<String> = None;
    let mut is_truncated = false;

    for (key, object) in data
        .objects
        .iter()
        .filter(|(key, _)| key.starts_with(&prefix) && key.as_str() > marker.as_str())
    {
        let collapsed = delimiter.as_ref().and_then(|d| {
            key[prefix.len()..]
                .find(d.as_str())
                .map(|idx| key[..prefix.len() + idx + d.len()].to_string())
        });

        // Keys under an already listed prefix are skipped
        if let Some(cp) = &collapsed {
            if cp.as_str() <= marker.as_str() || common_prefixes.last() == Some(cp) {
                continue;
            }
        }

        if contents.len() + common_prefixes.len() == max_keys {
            is_truncated = true;
            break;
        }

        match collapsed {
            Some(cp) => {
                last_name = Some(cp.clone());
                common_prefixes.push(cp);
            }
            None => {
                last_name = Some(key.clone());
                contents.push(ContentsEntry {
                    key: key.clone(),
                    last_modified: xml::format_timestamp(&object.last_modified),
                    etag: super::quoted(&object.etag),
                    size: object.data.len() as u64,
                    storage_class: Some("STANDARD".to_string()),
                });
            }
        }
    }

    let key_count = (contents.len() + common_prefixes.len()) as u32;
    let next_continuation_token = if is_truncated {
        last_name.map(|name| general_purpose::STANDARD.encode(name))
    } else {
        None
    };

    xml_response(
        "ListBucketResult",
        &ListBucketResult {
            xmlns: Some(xml::S3_NAMESPACE.to_string()),
            name: bucket,
            prefix,
            delimiter,
            max_keys: max_keys as u32,
            key_count,
            is_truncated,
            continuation_token: params.continuation_token,
            next_continuation_token,
            contents,
            common_prefixes: common_prefixes
                .into_iter()
                .map(|prefix| CommonPrefixEntry { prefix })
                .collect(),
        },
    )
}

fn decode_token(token: &str) -> Result<String, ApiError> {
    general_purpose::STANDARD
        .decode(token)
        .ok()
        .and_then(|raw| String::from_utf8(raw).ok())
        .ok_or_else(|| {
            ApiError::s3(
                S3ErrorCode::InvalidArgument,
                "The continuation token provided is incorrect",
            )
        })
}

pub(crate) fn no_such_bucket(bucket: &str) -> ApiError {
    ApiError::s3_with_resource(
        S3ErrorCode::NoSuchBucket,
        "The specified bucket does not exist",
        format!("/{}", bucket),
    )
}
