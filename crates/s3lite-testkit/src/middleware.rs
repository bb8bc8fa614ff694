//! HTTP middleware (signature verification, logging)

use crate::{ApiError, AppState, S3ErrorCode};
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use s3lite_client::SignatureError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Verify the SigV4 signature of every request.
///
/// Requests carrying `X-Amz-Signature` in the query are checked as
/// presigned URLs, everything else by its `Authorization` header.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.config.auth_enabled {
        return Ok(next.run(request).await);
    }

    let headers: BTreeMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let method = request.method().as_str();
    let raw_path = request.uri().path();
    let raw_query = request.uri().query().unwrap_or("");

    let verified = if raw_query.contains("X-Amz-Signature=") {
        state
            .signer
            .verify_presigned(method, raw_path, raw_query, &headers, Utc::now())
    } else {
        state
            .signer
            .verify_headers(method, raw_path, raw_query, &headers, Utc::now())
    };

    if let Err(e) = verified {
        tracing::debug!(
            method = %method,
            path = %raw_path,
            error = %e,
            "Rejected request signature"
        );
        return Err(signature_error(e, raw_path));
    }

    Ok(next.run(request).await)
}

fn signature_error(err: SignatureError, resource: &str) -> ApiError {
    let code = match err {
        SignatureError::Missing(_) | SignatureError::Malformed(_) | SignatureError::Expired => {
            S3ErrorCode::AccessDenied
        }
        SignatureError::UnknownAccessKey => S3ErrorCode::InvalidAccessKeyId,
        SignatureError::Mismatch => S3ErrorCode::SignatureDoesNotMatch,
        SignatureError::TimeSkewed => S3ErrorCode::RequestTimeTooSkewed,
        SignatureError::InvalidExpiry => S3ErrorCode::AuthorizationQueryParametersError,
    };
    let message = match err {
        SignatureError::Expired => "Request has expired".to_string(),
        other => other.to_string(),
    };
    ApiError::s3_with_resource(code, message, resource)
}

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    tracing::debug!(
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_error_codes() {
        let expired = signature_error(SignatureError::Expired, "/b/k");
        assert_eq!(expired.error_code(), S3ErrorCode::AccessDenied);
        assert_eq!(expired.to_string(), "Request has expired");

        let mismatch = signature_error(SignatureError::Mismatch, "/b/k");
        assert_eq!(mismatch.error_code().status_code().as_u16(), 403);

        let skewed = signature_error(SignatureError::TimeSkewed, "/b/k");
        assert_eq!(skewed.error_code(), S3ErrorCode::RequestTimeTooSkewed);
    }
}
