//! Paginated object listing (ListObjectsV2)

use crate::client::StorageClient;
use crate::transport::S3Request;
use crate::types::{ListEntry, ObjectDescriptor};
use crate::xml;
use crate::{ClientError, Result};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use reqwest::Method;
use tracing::debug;

/// Largest page a provider returns
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Walks a bucket listing one page at a time.
///
/// Each page is one request. The continuation token can be saved and
/// handed to a new lister to resume where this one stopped.
#[derive(Debug)]
pub struct ObjectLister {
    client: StorageClient,
    bucket: String,
    prefix: String,
    delimiter: Option<String>,
    page_size: Option<u32>,
    continuation: Option<String>,
    done: bool,
}

impl ObjectLister {
    /// Non-recursive listings collapse keys at the next `/` into common prefixes
    pub(crate) fn new(client: StorageClient, bucket: &str, prefix: &str, recursive: bool) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            delimiter: if recursive { None } else { Some("/".to_string()) },
            page_size: None,
            continuation: None,
            done: false,
        }
    }

    /// Ask for at most `page_size` entries per request
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size.clamp(1, MAX_PAGE_SIZE));
        self
    }

    /// Resume from a token returned by [`ObjectLister::continuation_token`]
    pub fn with_continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation = Some(token.into());
        self
    }

    /// Token for the next page; `None` before the first page and after the last
    pub fn continuation_token(&self) -> Option<&str> {
        self.continuation.as_deref()
    }

    /// Whether the last page has been returned
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fetch the next page, sorted by name. `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<ListEntry>>> {
        if self.done {
            return Ok(None);
        }

        let mut request = S3Request::new(Method::GET)
            .bucket(&self.bucket)
            .query("list-type", "2")
            .query("prefix", self.prefix.as_str());
        if let Some(delimiter) = &self.delimiter {
            request = request.query("delimiter", delimiter.as_str());
        }
        if let Some(page_size) = self.page_size {
            request = request.query("max-keys", page_size.to_string());
        }
        if let Some(token) = &self.continuation {
            request = request.query("continuation-token", token.as_str());
        }

        let page: xml::ListBucketResult = self.client.transport().send_xml(request).await?;

        let mut entries = Vec::with_capacity(page.contents.len() + page.common_prefixes.len());
        entries.extend(page.contents.into_iter().map(|c| {
            ListEntry::Object(ObjectDescriptor {
                etag: xml::trim_etag(&c.etag).to_string(),
                last_modified: xml::parse_timestamp(&c.last_modified),
                key: c.key,
                size: c.size,
                content_type: None,
            })
        }));
        entries.extend(
            page.common_prefixes
                .into_iter()
                .map(|p| ListEntry::CommonPrefix(p.prefix)),
        );
        entries.sort_by(|a, b| a.name().cmp(b.name()));

        match page.next_continuation_token.filter(|t| !t.is_empty()) {
            Some(token) if page.is_truncated => {
                if self.continuation.as_deref() == Some(token.as_str()) {
                    return Err(ClientError::InvalidResponse(
                        "listing continuation token did not advance".to_string(),
                    ));
                }
                self.continuation = Some(token);
            }
            None if page.is_truncated => {
                return Err(ClientError::InvalidResponse(
                    "truncated listing has no continuation token".to_string(),
                ));
            }
            _ => {
                self.done = true;
                self.continuation = None;
            }
        }

        debug!(
            bucket = %self.bucket,
            prefix = %self.prefix,
            entries = entries.len(),
            more = !self.done,
            "Listed page"
        );
        Ok(Some(entries))
    }

    /// Every remaining entry, fetching pages lazily as the stream is polled
    pub fn into_stream(self) -> BoxStream<'static, Result<ListEntry>> {
        stream::try_unfold(self, |mut lister| async move {
            match lister.next_page().await? {
                Some(entries) => {
                    let page = stream::iter(entries.into_iter().map(Ok::<_, ClientError>));
                    Ok(Some((page, lister)))
                }
                None => Ok::<_, ClientError>(None),
            }
        })
        .try_flatten()
        .boxed()
    }
}
