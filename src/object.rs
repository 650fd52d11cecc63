//! Value types exchanged with [`ObjectStorage`](crate::ObjectStorage) backends.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use tokio::io::AsyncRead;

/// User-defined object metadata (`x-*-meta-*` style headers).
pub type Metadata = BTreeMap<String, String>;

/// A streaming object body.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Metadata describing a stored object, as returned by `head`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub name: String,
    pub size: u64,
    pub etag: String,
    pub content_type: Option<String>,
    pub last_modified: SystemTime,
    pub metadata: Metadata,
}

/// A fully buffered object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetObject {
    pub content: Bytes,
    pub meta: ObjectMeta,
}

/// Parameters for a `list` call.
///
/// ```
/// # use stowage_cluster::ListQuery;
/// let query = ListQuery::prefix("photos/").delimiter("/").max_keys(100);
/// assert_eq!(query.prefix.as_deref(), Some("photos/"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Only return names starting with this prefix.
    pub prefix: Option<String>,
    /// Return names strictly after this one.
    pub marker: Option<String>,
    /// Group names sharing a prefix up to this delimiter into `prefixes`.
    pub delimiter: Option<String>,
    /// Page size. Backends apply their own default when `None`.
    pub max_keys: Option<usize>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectMeta>,
    /// Common prefixes collapsed by the query delimiter.
    pub prefixes: Vec<String>,
    /// Pass as `marker` to fetch the next page.
    pub next_marker: Option<String>,
    pub is_truncated: bool,
}

/// Options for `put` and `put_stream`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub metadata: Metadata,
}

impl PutOptions {
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Result of a successful write of object content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult {
    pub name: String,
    pub etag: String,
}

/// Options for `copy`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyOptions {
    /// Replace the source metadata instead of copying it.
    pub metadata: Option<Metadata>,
}

/// Options for `delete_multi`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteMultiOptions {
    /// Do not report the deleted names back.
    pub quiet: bool,
}

/// Result of `delete_multi`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteMultiResult {
    pub deleted: Vec<String>,
}

/// HTTP verb a signed URL is valid for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpMethod {
    #[default]
    Get,
    Put,
    Head,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Head => "HEAD",
            HttpMethod::Delete => "DELETE",
        })
    }
}

/// Options for `signature_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureOptions {
    /// How long the URL stays valid. Default: 1800 seconds.
    pub expires: Duration,
    pub method: HttpMethod,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self {
            expires: Duration::from_secs(1800),
            method: HttpMethod::Get,
        }
    }
}
