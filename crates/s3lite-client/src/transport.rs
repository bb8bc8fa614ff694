//! Signed HTTP transport over a pooled keep-alive connection

use crate::config::{Config, Endpoint};
use crate::signer::{self, Signer};
use crate::types::PresignedUrl;
use crate::xml;
use crate::{ClientError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// A request before signing
#[derive(Debug, Clone)]
pub(crate) struct S3Request {
    method: Method,
    bucket: Option<String>,
    key: Option<String>,
    query: Vec<(String, String)>,
    headers: BTreeMap<String, String>,
    body: Bytes,
    payload_hash: String,
    /// Streaming responses must not be cut off by the total request timeout
    streaming: bool,
}

impl S3Request {
    pub(crate) fn new(method: Method) -> Self {
        Self {
            method,
            bucket: None,
            key: None,
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: Bytes::new(),
            payload_hash: signer::EMPTY_SHA256.to_string(),
            streaming: false,
        }
    }

    pub(crate) fn bucket(mut self, bucket: &str) -> Self {
        self.bucket = Some(bucket.to_string());
        self
    }

    pub(crate) fn object(mut self, bucket: &str, key: &str) -> Self {
        self.bucket = Some(bucket.to_string());
        self.key = Some(key.to_string());
        self
    }

    pub(crate) fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Add a header that will be covered by the signature
    pub(crate) fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Attach a body; its SHA-256 becomes the signed payload hash
    pub(crate) fn body(mut self, body: Bytes) -> Self {
        self.payload_hash = signer::hex_sha256(&body);
        self.body = body;
        self
    }

    pub(crate) fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    /// URI-encoded path-style resource path
    pub(crate) fn path(&self) -> String {
        resource_path(self.bucket.as_deref(), self.key.as_deref())
    }
}

fn resource_path(bucket: Option<&str>, key: Option<&str>) -> String {
    match (bucket, key) {
        (Some(bucket), Some(key)) => format!("/{}/{}", bucket, signer::uri_encode(key, false)),
        (Some(bucket), None) => format!("/{}", bucket),
        _ => "/".to_string(),
    }
}

/// Signs requests and maps error responses
pub(crate) struct Transport {
    http: Client,
    endpoint: Endpoint,
    signer: Signer,
    timeout: Duration,
}

impl Transport {
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            signer: Signer::new(config.credentials.clone(), config.region.clone()),
            timeout: config.timeout,
        })
    }

    /// Sign and send a request.
    ///
    /// Non-2xx responses are turned into errors; on success the body is
    /// left unread so callers can stream it.
    pub(crate) async fn send(&self, request: S3Request) -> Result<Response> {
        let path = request.path();
        let S3Request {
            method,
            query,
            mut headers,
            body,
            payload_hash,
            streaming,
            ..
        } = request;

        headers.insert("host".to_string(), self.endpoint.host_header());
        self.signer.sign_headers(
            method.as_str(),
            &path,
            &query,
            &mut headers,
            &payload_hash,
            Utc::now(),
        );

        let url = self.url(&path, &query);
        let mut req = self.http.request(method.clone(), &url);
        for (name, value) in &headers {
            // reqwest derives Host from the URL
            if name != "host" {
                req = req.header(name.as_str(), value.as_str());
            }
        }
        if !streaming {
            req = req.timeout(self.timeout);
        }
        if method == Method::PUT || method == Method::POST {
            req = req.body(body);
        }

        debug!(method = %method, path = %path, "Sending request");
        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            let err = ClientError::from_response(status, &headers, &text);
            debug!(
                method = %method,
                path = %path,
                status = %status.as_u16(),
                error = %err,
                "Request failed"
            );
            return Err(err);
        }

        Ok(response)
    }

    /// Send a request and parse its XML response body.
    ///
    /// Some operations report failure inside a 200 response, so an `<Error>`
    /// document is mapped to an error here too.
    pub(crate) async fn send_xml<T: DeserializeOwned>(&self, request: S3Request) -> Result<T> {
        let response = self.send(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;

        if xml::parse_error(&text).is_some() {
            let mapped = ClientError::from_response(status, &headers, &text);
            return Err(match mapped.provider_error() {
                Some(e) if e.status < 300 => ClientError::Provider(crate::ProviderError {
                    status: 500,
                    ..e.clone()
                }),
                _ => mapped,
            });
        }
        Ok(xml::from_xml(&text)?)
    }

    /// Build a presigned URL for `method` on an object
    pub(crate) fn presign(
        &self,
        method: &Method,
        bucket: &str,
        key: &str,
        expiry: Duration,
        at: DateTime<Utc>,
    ) -> Result<PresignedUrl> {
        let path = resource_path(Some(bucket), Some(key));
        let query = self
            .signer
            .presign(
                method.as_str(),
                &self.endpoint.host_header(),
                &path,
                &[],
                expiry,
                at,
            )
            .map_err(|e| ClientError::InvalidArgument(e.to_string()))?;

        // X-Amz-Expires carries whole seconds only
        let validity = chrono::Duration::try_seconds(expiry.as_secs() as i64).ok_or_else(|| {
            ClientError::InvalidArgument(format!("expiry {:?} out of range", expiry))
        })?;

        Ok(PresignedUrl {
            url: self.url(&path, &query),
            expires_at: at + validity,
        })
    }

    fn url(&self, path: &str, query: &[(String, String)]) -> String {
        let mut url = format!("{}{}", self.endpoint.base_url(), path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&signer::canonical_query_string(query));
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_path_encodes_key() {
        let request = S3Request::new(Method::GET).object("photos", "2024/summer beach.jpg");
        assert_eq!(request.path(), "/photos/2024/summer%20beach.jpg");
        assert_eq!(S3Request::new(Method::GET).path(), "/");
        assert_eq!(S3Request::new(Method::HEAD).bucket("photos").path(), "/photos");
    }

    #[test]
    fn test_body_sets_payload_hash() {
        let request = S3Request::new(Method::PUT).body(Bytes::from_static(b"hello"));
        assert_eq!(
            request.payload_hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        let empty = S3Request::new(Method::PUT);
        assert_eq!(empty.payload_hash, signer::EMPTY_SHA256);
    }
}
