//! Client error types

use crate::xml;
use reqwest::{header::HeaderMap, StatusCode};
use std::fmt;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Coarse classification of a [`ClientError`], for callers deciding how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad credentials, endpoint or tuning, detected before any request
    Configuration,
    /// Caller supplied an invalid bucket name, key, range or expiry
    InvalidArgument,
    /// 404: bucket, object or upload absent
    NotFound,
    /// 409: e.g. deleting a non-empty bucket
    Conflict,
    /// 401/403: signature or credentials rejected
    Auth,
    /// Connection reset, refused or timed out
    TransientNetwork,
    /// Any other status reported by the provider
    Provider,
    /// Unexpected response shape
    Protocol,
    /// Returned ETag, digest or length did not match what was sent
    Integrity,
    /// Local I/O failure (reading an upload source, writing a download)
    Io,
}

/// Error details reported by the storage provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// HTTP status code
    pub status: u16,
    /// Provider error code (e.g. `NoSuchKey`)
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Resource the error refers to
    pub resource: Option<String>,
    /// Provider request id
    pub request_id: Option<String>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status, self.message)?;
        if let Some(resource) = &self.resource {
            write!(f, " [{}]", resource)?;
        }
        Ok(())
    }
}

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument supplied by the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Bucket, object or multipart upload does not exist
    #[error("Not found: {0}")]
    NotFound(ProviderError),

    /// Request conflicts with the current state of the resource
    #[error("Conflict: {0}")]
    Conflict(ProviderError),

    /// Authentication or authorization failure
    #[error("Access denied: {0}")]
    Auth(ProviderError),

    /// Any other error status reported by the provider
    #[error("S3 error: {0}")]
    Provider(ProviderError),

    /// Network failure; idempotent operations may be retried by the caller
    #[error("Network error: {0}")]
    Transient(#[source] reqwest::Error),

    /// Non-network HTTP client failure
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    /// Response did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// XML parsing error
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// ETag, digest or length mismatch
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A multipart upload failed and was aborted
    #[error("Multipart upload {upload_id} aborted: {source}{}", abort_suffix(.abort_error))]
    MultipartAborted {
        /// Upload id assigned by the provider
        upload_id: String,
        /// The failure that caused the abort
        #[source]
        source: Box<ClientError>,
        /// Set when the abort request itself failed; the upload may need manual cleanup
        abort_error: Option<Box<ClientError>>,
    },
}

fn abort_suffix(abort_error: &Option<Box<ClientError>>) -> String {
    match abort_error {
        Some(e) => format!(" (abort also failed: {})", e),
        None => String::new(),
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            Self::Transient(err)
        } else {
            Self::Http(err)
        }
    }
}

impl From<quick_xml::de::DeError> for ClientError {
    fn from(err: quick_xml::de::DeError) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl ClientError {
    /// Build an error from a non-2xx response.
    ///
    /// HEAD responses carry no body, so the code falls back to the
    /// `x-amz-error-code` header and then to a status-derived default.
    pub fn from_response(status: StatusCode, headers: &HeaderMap, body: &str) -> Self {
        let parsed = xml::parse_error(body);
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };

        let code = parsed
            .as_ref()
            .and_then(|e| e.code.clone())
            .or_else(|| header("x-amz-error-code"))
            .unwrap_or_else(|| default_code(status).to_string());
        let message = parsed
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            });
        let resource = parsed.as_ref().and_then(|e| e.resource.clone());
        let request_id = parsed
            .as_ref()
            .and_then(|e| e.request_id.clone())
            .or_else(|| header("x-amz-request-id"));

        Self::from_provider(ProviderError {
            status: status.as_u16(),
            code,
            message,
            resource,
            request_id,
        })
    }

    /// Classify a provider error by its HTTP status
    pub fn from_provider(err: ProviderError) -> Self {
        match err.status {
            404 => Self::NotFound(err),
            409 => Self::Conflict(err),
            401 | 403 => Self::Auth(err),
            _ => Self::Provider(err),
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Provider(_) => ErrorKind::Provider,
            Self::Transient(_) => ErrorKind::TransientNetwork,
            Self::Http(_) | Self::InvalidResponse(_) | Self::XmlParse(_) => ErrorKind::Protocol,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Io(_) => ErrorKind::Io,
            Self::MultipartAborted { source, .. } => source.kind(),
        }
    }

    /// Provider details, if the error came from an error response
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::NotFound(e) | Self::Conflict(e) | Self::Auth(e) | Self::Provider(e) => Some(e),
            Self::MultipartAborted { source, .. } => source.provider_error(),
            _ => None,
        }
    }

    /// HTTP status, if the error came from an error response
    pub fn status(&self) -> Option<u16> {
        self.provider_error().map(|e| e.status)
    }

    /// Provider error code, if any
    pub fn code(&self) -> Option<&str> {
        self.provider_error().map(|e| e.code.as_str())
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Whether an idempotent request that failed this way may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transient(_) => true,
            Self::Provider(e) => e.status >= 500 || e.code == "SlowDown",
            _ => false,
        }
    }
}

fn default_code(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "BadRequest",
        401 | 403 => "AccessDenied",
        404 => "NotFound",
        405 => "MethodNotAllowed",
        409 => "Conflict",
        412 => "PreconditionFailed",
        416 => "InvalidRange",
        503 => "SlowDown",
        s if s >= 500 => "InternalError",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_error() {
        let xml = r#"<?xml version="1.0"?>
<Error>
    <Code>NoSuchKey</Code>
    <Message>The specified key does not exist.</Message>
    <Resource>/bucket/missing.txt</Resource>
    <RequestId>abc123</RequestId>
</Error>"#;

        let error = ClientError::from_response(StatusCode::NOT_FOUND, &HeaderMap::new(), xml);

        match &error {
            ClientError::NotFound(e) => {
                assert_eq!(e.code, "NoSuchKey");
                assert_eq!(e.message, "The specified key does not exist.");
                assert_eq!(e.resource.as_deref(), Some("/bucket/missing.txt"));
                assert_eq!(e.request_id.as_deref(), Some("abc123"));
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
        assert!(error.is_not_found());
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_headless_error_uses_header_code() {
        let mut headers = HeaderMap::new();
        headers.insert("x-amz-error-code", "NoSuchBucket".parse().unwrap());

        let error = ClientError::from_response(StatusCode::NOT_FOUND, &headers, "");
        assert_eq!(error.code(), Some("NoSuchBucket"));
        assert_eq!(error.status(), Some(404));
    }

    #[test]
    fn test_status_classification() {
        let cases = [
            (StatusCode::CONFLICT, ErrorKind::Conflict),
            (StatusCode::FORBIDDEN, ErrorKind::Auth),
            (StatusCode::UNAUTHORIZED, ErrorKind::Auth),
            (StatusCode::BAD_REQUEST, ErrorKind::Provider),
            (StatusCode::SERVICE_UNAVAILABLE, ErrorKind::Provider),
        ];
        for (status, kind) in cases {
            let error = ClientError::from_response(status, &HeaderMap::new(), "");
            assert_eq!(error.kind(), kind, "status {}", status);
        }

        let unavailable =
            ClientError::from_response(StatusCode::SERVICE_UNAVAILABLE, &HeaderMap::new(), "");
        assert_eq!(unavailable.code(), Some("SlowDown"));
        assert!(unavailable.is_retryable());
    }

    #[test]
    fn test_multipart_aborted_reports_both_errors() {
        let error = ClientError::MultipartAborted {
            upload_id: "u-1".to_string(),
            source: Box::new(ClientError::Integrity("part 2 ETag mismatch".to_string())),
            abort_error: Some(Box::new(ClientError::InvalidResponse("boom".to_string()))),
        };

        assert_eq!(error.kind(), ErrorKind::Integrity);
        let text = error.to_string();
        assert!(text.contains("part 2 ETag mismatch"));
        assert!(text.contains("abort also failed"));
    }
}
