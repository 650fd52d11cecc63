use crate::adapters::cluster::BackendConfig;
use crate::{
    CopyOptions, DeleteMultiOptions, DeleteMultiResult, Error, GetObject, ListPage, ListQuery,
    Metadata, ObjectMeta, ObjectReader, ObjectStorage, PutOptions, PutResult, Result,
    SignatureOptions,
};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncReadExt};

const DEFAULT_MAX_KEYS: usize = 1000;

/// Configuration for a [`MemoryStorage`] backend.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct MemoryConfig {
    /// Name used in signed URLs. Default: `"memory"`.
    #[cfg_attr(feature = "serde", serde(default = "default_bucket"))]
    pub bucket: String,

    /// Upper bound for a single call. Only matters together with `latency`.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            deserialize_with = "crate::adapters::cluster::config::deserialize_duration"
        )
    )]
    pub timeout: Option<Duration>,

    /// Artificial delay added to every call, to simulate a remote endpoint.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            deserialize_with = "crate::adapters::cluster::config::deserialize_duration"
        )
    )]
    pub latency: Option<Duration>,
}

#[cfg(feature = "serde")]
fn default_bucket() -> String {
    "memory".to_string()
}

impl MemoryConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            timeout: None,
            latency: None,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl BackendConfig for MemoryConfig {
    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }
}

#[derive(Clone)]
struct StoredObject {
    content: Bytes,
    content_type: Option<String>,
    metadata: Metadata,
    etag: String,
    last_modified: SystemTime,
}

impl StoredObject {
    fn new(content: Bytes, content_type: Option<String>, metadata: Metadata) -> Self {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Self {
            etag: format!("\"{:016X}\"", hasher.finish()),
            content,
            content_type,
            metadata,
            last_modified: SystemTime::now(),
        }
    }

    fn meta(&self, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: name.to_string(),
            size: self.content.len() as u64,
            etag: self.etag.clone(),
            content_type: self.content_type.clone(),
            last_modified: self.last_modified,
            metadata: self.metadata.clone(),
        }
    }
}

/// A simple in-memory [`ObjectStorage`] backend.
///
/// - Objects live in a shared `BTreeMap`, so clones see the same data.
/// - Missing objects fail with [`Error::NotFound`] (status 404).
/// - [`set_available(false)`](Self::set_available) makes every call except
///   `signature_url` fail with status 503, to simulate an outage.
///
/// Intended for tests, local development, and ephemeral usage.
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    available: Arc<AtomicBool>,
    bucket: Arc<str>,
    timeout: Option<Duration>,
    latency: Option<Duration>,
}

impl MemoryStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        Self::from_parts(MemoryConfig::default())
    }

    /// Create an empty storage that signs URLs for `bucket`.
    pub fn with_bucket(bucket: impl Into<String>) -> Self {
        Self::from_parts(MemoryConfig::new(bucket))
    }

    /// Build a backend from its configuration.
    pub fn from_config(config: MemoryConfig) -> Result<Self> {
        if config.bucket.is_empty() {
            return Err(Error::Config("memory bucket name cannot be empty".to_string()));
        }
        Ok(Self::from_parts(config))
    }

    fn from_parts(config: MemoryConfig) -> Self {
        Self {
            inner: Arc::default(),
            available: Arc::new(AtomicBool::new(true)),
            bucket: config.bucket.into(),
            timeout: config.timeout,
            latency: config.latency,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the number of stored objects.
    pub fn len(&self) -> usize {
        self.inner.read().expect("poisoned lock").len()
    }

    /// Returns true if there are no stored objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all objects.
    pub fn clear(&self) {
        self.inner.write().expect("poisoned lock").clear();
    }

    /// Toggle the simulated outage. Shared by all clones.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Apply configured latency and timeout, then the availability switch.
    async fn enter(&self) -> Result<()> {
        if let Some(latency) = self.latency {
            let delay = tokio::time::sleep(latency);
            match self.timeout {
                Some(timeout) => {
                    if tokio::time::timeout(timeout, delay).await.is_err() {
                        tracing::warn!(
                            bucket = %self.bucket,
                            ?timeout,
                            "Memory backend call timed out"
                        );
                        return Err(Error::Timeout(timeout));
                    }
                }
                None => delay.await,
            }
        }

        if !self.is_available() {
            return Err(Error::Status {
                status: 503,
                code: Some("ServiceUnavailable".to_string()),
                message: format!("memory backend {} is unavailable", self.bucket),
            });
        }
        Ok(())
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::Status {
                status: 400,
                code: Some("InvalidObjectName".to_string()),
                message: "object name cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    fn store(&self, name: &str, content: Bytes, options: &PutOptions) -> PutResult {
        let object = StoredObject::new(
            content,
            options.content_type.clone(),
            options.metadata.clone(),
        );
        let etag = object.etag.clone();
        let mut map = self.inner.write().expect("poisoned lock");
        map.insert(name.to_string(), object);
        PutResult {
            name: name.to_string(),
            etag,
        }
    }

    fn load(&self, name: &str) -> Result<StoredObject> {
        let map = self.inner.read().expect("poisoned lock");
        map.get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Avoid dumping potentially large in-memory contents.
        f.debug_struct("MemoryStorage")
            .field("bucket", &self.bucket)
            .field("len", &self.len())
            .field("available", &self.is_available())
            .finish()
    }
}

impl ObjectStorage for MemoryStorage {
    async fn head(&self, name: &str) -> Result<ObjectMeta> {
        Self::validate_name(name)?;
        self.enter().await?;
        Ok(self.load(name)?.meta(name))
    }

    async fn get(&self, name: &str) -> Result<GetObject> {
        Self::validate_name(name)?;
        self.enter().await?;
        let object = self.load(name)?;
        Ok(GetObject {
            meta: object.meta(name),
            content: object.content,
        })
    }

    async fn get_stream(&self, name: &str) -> Result<ObjectReader> {
        Self::validate_name(name)?;
        self.enter().await?;
        let object = self.load(name)?;
        Ok(Box::new(std::io::Cursor::new(object.content)))
    }

    async fn list(&self, query: &ListQuery) -> Result<ListPage> {
        self.enter().await?;

        let max_keys = query.max_keys.unwrap_or(DEFAULT_MAX_KEYS).max(1);
        let prefix = query.prefix.as_deref().unwrap_or("");
        let start = match &query.marker {
            Some(marker) => Bound::Excluded(marker.clone()),
            None => Bound::Unbounded,
        };

        let map = self.inner.read().expect("poisoned lock");
        let mut page = ListPage::default();
        let mut last_seen: Option<&str> = None;

        for (name, object) in map.range((start, Bound::Unbounded)) {
            if !name.starts_with(prefix) {
                // Names are sorted: once past the prefix range nothing else matches.
                if name.as_str() > prefix {
                    break;
                }
                continue;
            }

            let common = query
                .delimiter
                .as_deref()
                .filter(|delimiter| !delimiter.is_empty())
                .and_then(|delimiter| {
                    name[prefix.len()..]
                        .find(delimiter)
                        .map(|pos| &name[..prefix.len() + pos + delimiter.len()])
                });

            // Further names under the common prefix just added are consumed silently.
            if let Some(common) = common
                && page.prefixes.last().map(String::as_str) == Some(common)
            {
                last_seen = Some(name.as_str());
                continue;
            }

            if page.objects.len() + page.prefixes.len() >= max_keys {
                page.is_truncated = true;
                page.next_marker = last_seen.map(str::to_string);
                break;
            }

            match common {
                Some(common) => page.prefixes.push(common.to_string()),
                None => page.objects.push(object.meta(name)),
            }
            last_seen = Some(name.as_str());
        }

        Ok(page)
    }

    async fn put(&self, name: &str, content: Bytes, options: &PutOptions) -> Result<PutResult> {
        Self::validate_name(name)?;
        self.enter().await?;
        Ok(self.store(name, content, options))
    }

    async fn put_stream<R: AsyncRead + Send + Unpin>(
        &self,
        name: &str,
        mut input: R,
        options: &PutOptions,
    ) -> Result<PutResult> {
        Self::validate_name(name)?;
        self.enter().await?;

        let mut buf = Vec::new();
        input.read_to_end(&mut buf).await?;
        Ok(self.store(name, Bytes::from(buf), options))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.enter().await?;
        let mut map = self.inner.write().expect("poisoned lock");
        map.remove(name);
        Ok(())
    }

    async fn delete_multi(
        &self,
        names: &[String],
        options: &DeleteMultiOptions,
    ) -> Result<DeleteMultiResult> {
        self.enter().await?;
        let mut map = self.inner.write().expect("poisoned lock");
        for name in names {
            map.remove(name);
        }
        Ok(DeleteMultiResult {
            deleted: if options.quiet {
                Vec::new()
            } else {
                names.to_vec()
            },
        })
    }

    async fn copy(&self, target: &str, source: &str, options: &CopyOptions) -> Result<PutResult> {
        Self::validate_name(target)?;
        self.enter().await?;

        let source_object = self.load(source)?;
        let object = StoredObject::new(
            source_object.content,
            source_object.content_type,
            options.metadata.clone().unwrap_or(source_object.metadata),
        );
        let etag = object.etag.clone();
        let mut map = self.inner.write().expect("poisoned lock");
        map.insert(target.to_string(), object);
        Ok(PutResult {
            name: target.to_string(),
            etag,
        })
    }

    async fn put_meta(&self, name: &str, metadata: &Metadata) -> Result<()> {
        Self::validate_name(name)?;
        self.enter().await?;
        let mut map = self.inner.write().expect("poisoned lock");
        let object = map
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        object.metadata = metadata.clone();
        object.last_modified = SystemTime::now();
        Ok(())
    }

    async fn signature_url(&self, name: &str, options: &SignatureOptions) -> Result<String> {
        Self::validate_name(name)?;

        let expires = (SystemTime::now() + options.expires)
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let path = name
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        Ok(format!(
            "memory://{}/{}?Expires={}&Method={}",
            self.bucket, path, expires, options.method
        ))
    }
}
