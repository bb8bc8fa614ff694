//! S3 XML wire documents.
//!
//! The same types are used to parse responses here and to render them in
//! `s3lite-testkit`, so both sides agree on element names.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Namespace of S3 response documents
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// `<Error>` body of a failed request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDocument {
    #[serde(rename = "Code", default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(rename = "Message", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "Resource", default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(rename = "RequestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// `GET /` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListAllMyBucketsResult {
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    #[serde(rename = "Buckets", default)]
    pub buckets: BucketList,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketList {
    #[serde(rename = "Bucket", default)]
    pub bucket: Vec<BucketEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CreationDate")]
    pub creation_date: String,
}

/// `PUT /{bucket}` request body for regions other than us-east-1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBucketConfiguration {
    #[serde(rename = "LocationConstraint")]
    pub location_constraint: String,
}

/// `GET /{bucket}?list-type=2` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListBucketResult {
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Prefix", default)]
    pub prefix: String,
    #[serde(rename = "Delimiter", default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    #[serde(rename = "MaxKeys", default)]
    pub max_keys: u32,
    #[serde(rename = "KeyCount", default)]
    pub key_count: u32,
    #[serde(rename = "IsTruncated", default)]
    pub is_truncated: bool,
    #[serde(rename = "ContinuationToken", default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
    #[serde(
        rename = "NextContinuationToken",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub next_continuation_token: Option<String>,
    #[serde(rename = "Contents", default)]
    pub contents: Vec<ContentsEntry>,
    #[serde(rename = "CommonPrefixes", default)]
    pub common_prefixes: Vec<CommonPrefixEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentsEntry {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "LastModified")]
    pub last_modified: String,
    #[serde(rename = "ETag", default)]
    pub etag: String,
    #[serde(rename = "Size", default)]
    pub size: u64,
    #[serde(rename = "StorageClass", default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonPrefixEntry {
    #[serde(rename = "Prefix")]
    pub prefix: String,
}

/// `POST /{bucket}/{key}?uploads` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateMultipartUploadResult {
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    #[serde(rename = "Bucket")]
    pub bucket: String,
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "UploadId")]
    pub upload_id: String,
}

/// `POST /{bucket}/{key}?uploadId=…` request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteMultipartUpload {
    #[serde(rename = "Part", default)]
    pub parts: Vec<CompletedPartEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedPartEntry {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// `POST /{bucket}/{key}?uploadId=…` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteMultipartUploadResult {
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    #[serde(rename = "Location", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "Bucket")]
    pub bucket: String,
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// Parse an XML document
pub fn from_xml<T: DeserializeOwned>(xml: &str) -> Result<T, quick_xml::de::DeError> {
    quick_xml::de::from_str(xml)
}

/// Render a document under the given root element, with an XML declaration
pub fn to_xml<T: Serialize>(root: &str, value: &T) -> Result<String, String> {
    let body = quick_xml::se::to_string_with_root(root, value).map_err(|e| e.to_string())?;
    Ok(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>{}"#,
        body
    ))
}

/// Parse an `<Error>` body; `None` if the body is not an error document
pub fn parse_error(body: &str) -> Option<ErrorDocument> {
    if !body.contains("<Error>") {
        return None;
    }
    from_xml(body).ok()
}

/// Strip the quotes S3 puts around ETags
pub fn trim_etag(etag: &str) -> &str {
    etag.trim().trim_matches('"')
}

/// Timestamp in listing documents (ISO 8601 with milliseconds)
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Timestamp in `Last-Modified` headers (RFC 7231 IMF-fixdate)
pub fn format_http_date(ts: &DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_buckets() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListAllMyBucketsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
    <Owner>
        <ID>user123</ID>
        <DisplayName>Test User</DisplayName>
    </Owner>
    <Buckets>
        <Bucket>
            <Name>bucket1</Name>
            <CreationDate>2024-01-01T00:00:00.000Z</CreationDate>
        </Bucket>
        <Bucket>
            <Name>bucket2</Name>
            <CreationDate>2024-02-01T12:30:00.000Z</CreationDate>
        </Bucket>
    </Buckets>
</ListAllMyBucketsResult>"#;

        let result: ListAllMyBucketsResult = from_xml(xml).unwrap();
        assert_eq!(result.buckets.bucket.len(), 2);
        assert_eq!(result.buckets.bucket[0].name, "bucket1");
        assert!(parse_timestamp(&result.buckets.bucket[1].creation_date).is_some());
    }

    #[test]
    fn test_parse_empty_bucket_list() {
        let xml = r#"<ListAllMyBucketsResult><Buckets></Buckets></ListAllMyBucketsResult>"#;
        let result: ListAllMyBucketsResult = from_xml(xml).unwrap();
        assert!(result.buckets.bucket.is_empty());
    }

    #[test]
    fn test_parse_list_objects_v2() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
    <Name>photos</Name>
    <Prefix></Prefix>
    <Delimiter>/</Delimiter>
    <MaxKeys>1000</MaxKeys>
    <KeyCount>2</KeyCount>
    <IsTruncated>true</IsTruncated>
    <NextContinuationToken>ZA==</NextContinuationToken>
    <Contents>
        <Key>d</Key>
        <LastModified>2024-01-01T00:00:00.000Z</LastModified>
        <ETag>"d41d8cd98f00b204e9800998ecf8427e"</ETag>
        <Size>0</Size>
        <StorageClass>STANDARD</StorageClass>
    </Contents>
    <CommonPrefixes>
        <Prefix>a/</Prefix>
    </CommonPrefixes>
</ListBucketResult>"#;

        let result: ListBucketResult = from_xml(xml).unwrap();
        assert_eq!(result.name, "photos");
        assert!(result.is_truncated);
        assert_eq!(result.next_continuation_token.as_deref(), Some("ZA=="));
        assert_eq!(result.contents.len(), 1);
        assert_eq!(trim_etag(&result.contents[0].etag), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(result.common_prefixes[0].prefix, "a/");
    }

    #[test]
    fn test_complete_multipart_body() {
        let body = CompleteMultipartUpload {
            parts: vec![
                CompletedPartEntry {
                    part_number: 1,
                    etag: "\"aaa\"".to_string(),
                },
                CompletedPartEntry {
                    part_number: 2,
                    etag: "\"bbb\"".to_string(),
                },
            ],
        };

        let xml = to_xml("CompleteMultipartUpload", &body).unwrap();
        assert!(xml.contains("<CompleteMultipartUpload>"));
        assert!(xml.contains("<PartNumber>1</PartNumber>"));

        let parsed: CompleteMultipartUpload = from_xml(&xml).unwrap();
        assert_eq!(parsed.parts.len(), 2);
        assert_eq!(parsed.parts[1].etag, "\"bbb\"");
    }

    #[test]
    fn test_http_date() {
        let ts = parse_timestamp("2024-03-05T07:08:09.000Z").unwrap();
        let header = format_http_date(&ts);
        assert_eq!(header, "Tue, 05 Mar 2024 07:08:09 GMT");
        assert_eq!(parse_http_date(&header), Some(ts));
    }
}
