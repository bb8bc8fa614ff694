//! S3 API request handlers

pub mod bucket;
pub mod multipart;
pub mod object;

pub use bucket::*;
pub use multipart::*;
pub use object::*;

use crate::{ApiError, S3ErrorCode};
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose, Engine as _};
use md5::{Digest, Md5};
use s3lite_client::{signer, xml};
use serde::Serialize;

/// Render an XML document response
pub(crate) fn xml_response<T: Serialize>(root: &str, document: &T) -> Result<Response, ApiError> {
    let body = xml::to_xml(root, document).map_err(ApiError::Internal)?;
    Ok((
        StatusCode::OK,
        [("Content-Type", "application/xml")],
        body,
    )
        .into_response())
}

/// Check the body against the signed `x-amz-content-sha256`
pub(crate) fn verify_payload_hash(headers: &HeaderMap, body: &[u8]) -> Result<(), ApiError> {
    let claimed = match headers.get("x-amz-content-sha256").and_then(|v| v.to_str().ok()) {
        None => return Ok(()),
        Some(signer::UNSIGNED_PAYLOAD) => return Ok(()),
        Some(claimed) => claimed,
    };
    if !claimed.eq_ignore_ascii_case(&signer::hex_sha256(body)) {
        return Err(ApiError::s3(
            S3ErrorCode::XAmzContentSHA256Mismatch,
            "The provided 'x-amz-content-sha256' header does not match what was computed.",
        ));
    }
    Ok(())
}

/// MD5 of the body, checked against `Content-MD5` when the client sent one
pub(crate) fn verify_content_md5(headers: &HeaderMap, body: &[u8]) -> Result<[u8; 16], ApiError> {
    let mut digest = [0u8; 16];
    digest.copy_from_slice(&Md5::digest(body));

    if let Some(md5_header) = headers.get("Content-MD5").and_then(|v| v.to_str().ok()) {
        let expected = general_purpose::STANDARD
            .decode(md5_header.trim())
            .map_err(|_| ApiError::s3(S3ErrorCode::InvalidDigest, "Invalid Content-MD5"))?;
        if expected.as_slice() != digest.as_slice() {
            return Err(ApiError::s3(
                S3ErrorCode::BadDigest,
                "The Content-MD5 you specified did not match what we received.",
            ));
        }
    }
    Ok(digest)
}

pub(crate) fn quoted(etag: &str) -> String {
    format!("\"{}\"", etag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_verify_content_md5() {
        let mut headers = HeaderMap::new();
        headers.insert("Content-MD5", HeaderValue::from_static("XUFAKrxLKna5cZ2REBfFkg=="));
        let digest = verify_content_md5(&headers, b"hello").unwrap();
        assert_eq!(hex::encode(digest), "5d41402abc4b2a76b9719d911017c592");

        let err = verify_content_md5(&headers, b"jello").unwrap_err();
        assert_eq!(err.error_code(), S3ErrorCode::BadDigest);
    }

    #[test]
    fn test_verify_payload_hash() {
        let mut headers = HeaderMap::new();
        assert!(verify_payload_hash(&headers, b"anything").is_ok());

        headers.insert(
            "x-amz-content-sha256",
            HeaderValue::from_static(signer::EMPTY_SHA256),
        );
        assert!(verify_payload_hash(&headers, b"").is_ok());
        let err = verify_payload_hash(&headers, b"not empty").unwrap_err();
        assert_eq!(err.error_code(), S3ErrorCode::XAmzContentSHA256Mismatch);
    }
}
