//! Client-side routing across a fixed set of object storage backends.
//!
//! [`ClusterStorage`] wraps an ordered list of backends that all implement
//! [`ObjectStorage`] and is itself an [`ObjectStorage`], so it can be used (and
//! nested) wherever a single backend is expected.
//!
//! # Routing
//!
//! - **Reads** (`head`, `get`, `get_stream`, `list`) try one backend at a
//!   time in [`Schedule`] order. A transient failure (no status, status
//!   `<= 200` or `>= 500`) is reported to the failover listener and the next
//!   backend is tried; a client error (`200 < status < 500`) is returned
//!   immediately. When every backend fails transiently the call fails with
//!   [`Error::AllServerDown`].
//! - **Writes** (`put`, `put_stream`, `delete`, `delete_multi`, `copy`,
//!   `put_meta`) go to every backend concurrently. The call succeeds only if
//!   all backends succeed and then returns backend 0's result. Each backend
//!   call is a spawned Tokio task, so a write that was started keeps running
//!   on every backend even if the caller drops it or times out.
//! - **`signature_url`** probes backends with `head` before signing, see
//!   [`ClusterStorage::signature_url`](ObjectStorage::signature_url).
//!
//! # Consistency
//!
//! Writes are not transactional. If one backend fails a write the others
//! that succeeded keep the change: nothing is rolled back, and the backends
//! can diverge. [`WriteFailureDetails`](crate::WriteFailureDetails) lists which
//! backends applied the write.
//!
//! # Example
//!
//! ```
//! # use stowage_cluster::{ClusterStorage, MemoryStorage, ObjectStorageExt, Schedule};
//! # async fn example() -> stowage_cluster::Result<()> {
//! let storage = ClusterStorage::builder()
//!     .add_backend(MemoryStorage::with_bucket("primary"))
//!     .add_backend(MemoryStorage::with_bucket("replica"))
//!     .schedule(Schedule::MasterSlave)
//!     .on_failover(|event| {
//!         eprintln!("{} failed on backend {}", event.operation, event.backend_index)
//!     })
//!     .build()?;
//!
//! storage.put_bytes("file.txt", b"data").await?;
//! assert_eq!(storage.get_string("file.txt").await?, "data");
//! # Ok(())
//! # }
//! ```

mod classify;
pub(crate) mod config;
mod pool;
mod read;
mod schedule;
mod signature;
mod write;

pub use classify::{ErrorClass, classify};
pub use config::{BackendConfig, ClusterConfig, parse_duration};
pub use pool::BackendPool;
pub use schedule::Schedule;

use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    CopyOptions, DeleteMultiOptions, DeleteMultiResult, Error, GetObject, ListPage, ListQuery,
    Metadata, ObjectMeta, ObjectReader, ObjectStorage, PutOptions, PutResult, Result,
    SignatureOptions,
};
use schedule::Scheduler;

/// A transient backend failure that the cluster absorbed by moving on to the
/// next backend.
#[derive(Debug)]
pub struct FailoverEvent {
    /// Operation name (`get`, `head`, ...)
    pub operation: &'static str,
    /// Zero-based attempt number within the call
    pub attempt: usize,
    /// Index of the backend that failed
    pub backend_index: usize,
    pub error: Error,
}

type FailoverListener = Arc<dyn Fn(&FailoverEvent) + Send + Sync>;

/// Routes object storage calls over a [`BackendPool`].
pub struct ClusterStorage<B: ObjectStorage> {
    pool: BackendPool<B>,
    scheduler: Scheduler,
    listener: Option<FailoverListener>,
}

impl<B: ObjectStorage> ClusterStorage<B> {
    /// Create a builder for configuring a cluster.
    pub fn builder() -> ClusterStorageBuilder<B> {
        ClusterStorageBuilder::new()
    }

    /// Create a round-robin cluster over pre-built backends.
    pub fn new(backends: Vec<B>) -> Result<Self> {
        ClusterStorageBuilder::new().backends(backends).build()
    }

    /// Build one backend per configuration entry through `connect` and route
    /// over them with the configured schedule.
    pub fn from_config<C, F>(config: ClusterConfig<C>, connect: F) -> Result<Self>
    where
        C: BackendConfig,
        F: FnMut(C) -> Result<B>,
    {
        ClusterStorageBuilder::from_config(config, connect)?.build()
    }

    pub fn backend_count(&self) -> usize {
        self.pool.len()
    }

    /// Get a reference to a specific backend by index.
    pub fn backend(&self, index: usize) -> Option<&B> {
        self.pool.get(index)
    }

    pub fn pool(&self) -> &BackendPool<B> {
        &self.pool
    }

    pub fn schedule(&self) -> Schedule {
        self.scheduler.schedule()
    }

    /// Index of the backend the next round-robin selection will pick.
    pub fn cursor(&self) -> usize {
        self.scheduler.cursor()
    }

    fn report_failover(&self, event: FailoverEvent) {
        tracing::warn!(
            operation = event.operation,
            attempt = event.attempt,
            backend_index = event.backend_index,
            error = ?event.error,
            "Backend failed, trying next"
        );
        if let Some(listener) = &self.listener {
            listener(&event);
        }
    }
}

impl<B: ObjectStorage> Debug for ClusterStorage<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterStorage")
            .field("pool", &self.pool)
            .field("schedule", &self.scheduler.schedule())
            .field("cursor", &self.scheduler.cursor())
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl<B: ObjectStorage + 'static> ObjectStorage for ClusterStorage<B> {
    async fn head(&self, name: &str) -> Result<ObjectMeta> {
        self.dispatch_read("head", |backend| backend.head(name))
            .await
    }

    async fn get(&self, name: &str) -> Result<GetObject> {
        self.dispatch_read("get", |backend| backend.get(name)).await
    }

    async fn get_stream(&self, name: &str) -> Result<ObjectReader> {
        self.dispatch_read("get_stream", |backend| backend.get_stream(name))
            .await
    }

    async fn list(&self, query: &ListQuery) -> Result<ListPage> {
        self.dispatch_read("list", |backend| backend.list(query))
            .await
    }

    async fn put(&self, name: &str, content: Bytes, options: &PutOptions) -> Result<PutResult> {
        self.dispatch_write("put", |backend| {
            let (name, content, options) = (name.to_string(), content.clone(), options.clone());
            async move { backend.put(&name, content, &options).await }
        })
        .await
    }

    async fn put_stream<R: AsyncRead + Send + Unpin>(
        &self,
        name: &str,
        mut input: R,
        options: &PutOptions,
    ) -> Result<PutResult> {
        // A reader can only be consumed once; every backend needs the same bytes.
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer).await?;
        let content = Bytes::from(buffer);

        self.dispatch_write("put_stream", |backend| {
            let input = std::io::Cursor::new(content.clone());
            let (name, options) = (name.to_string(), options.clone());
            async move { backend.put_stream(&name, input, &options).await }
        })
        .await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.dispatch_write("delete", |backend| {
            let name = name.to_string();
            async move { backend.delete(&name).await }
        })
        .await
    }

    async fn delete_multi(
        &self,
        names: &[String],
        options: &DeleteMultiOptions,
    ) -> Result<DeleteMultiResult> {
        let options = *options;
        self.dispatch_write("delete_multi", |backend| {
            let names = names.to_vec();
            async move { backend.delete_multi(&names, &options).await }
        })
        .await
    }

    async fn copy(&self, target: &str, source: &str, options: &CopyOptions) -> Result<PutResult> {
        self.dispatch_write("copy", |backend| {
            let (target, source) = (target.to_string(), source.to_string());
            let options = options.clone();
            async move { backend.copy(&target, &source, &options).await }
        })
        .await
    }

    async fn put_meta(&self, name: &str, metadata: &Metadata) -> Result<()> {
        self.dispatch_write("put_meta", |backend| {
            let (name, metadata) = (name.to_string(), metadata.clone());
            async move { backend.put_meta(&name, &metadata).await }
        })
        .await
    }

    /// Sign a URL on a backend that (probably) has the object.
    ///
    /// Every backend but the last in schedule order is probed with `head`.
    /// The first probe that succeeds signs. A transient probe failure moves
    /// on to the next backend. A client-error probe failure (for example a
    /// 404) stops the search and the *same* backend signs anyway, so the URL
    /// may point at a backend that lacks the object. The last backend is
    /// never probed and signs unconditionally when reached.
    async fn signature_url(&self, name: &str, options: &SignatureOptions) -> Result<String> {
        self.resolve_signature_url(name, options).await
    }
}

/// Builder for [`ClusterStorage`].
pub struct ClusterStorageBuilder<B: ObjectStorage> {
    backends: Vec<B>,
    schedule: Schedule,
    listener: Option<FailoverListener>,
}

impl<B: ObjectStorage> ClusterStorageBuilder<B> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            schedule: Schedule::default(),
            listener: None,
        }
    }

    /// Start from a configuration: backends are constructed in order through
    /// `connect`, each inheriting the cluster timeout if it has none.
    pub fn from_config<C, F>(config: ClusterConfig<C>, connect: F) -> Result<Self>
    where
        C: BackendConfig,
        F: FnMut(C) -> Result<B>,
    {
        let (schedule, configs) = config.into_backend_configs()?;
        Ok(Self {
            backends: pool::connect_all(configs, connect)?,
            schedule,
            listener: None,
        })
    }

    /// Append a backend. Order matters: it decides master-slave priority and
    /// whose result a write returns.
    pub fn add_backend(mut self, backend: B) -> Self {
        self.backends.push(backend);
        self
    }

    /// Append several backends.
    pub fn backends(mut self, backends: impl IntoIterator<Item = B>) -> Self {
        self.backends.extend(backends);
        self
    }

    /// Set the schedule (default: round robin).
    pub fn schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Register a listener for transient failures the cluster absorbs.
    pub fn on_failover<F>(mut self, listener: F) -> Self
    where
        F: Fn(&FailoverEvent) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Build the cluster. Fails with [`Error::Config`] when no backend was added.
    pub fn build(self) -> Result<ClusterStorage<B>> {
        let pool = BackendPool::new(self.backends)?;
        tracing::debug!(
            backend_count = pool.len(),
            schedule = ?self.schedule,
            "Cluster storage ready"
        );
        Ok(ClusterStorage {
            pool,
            scheduler: Scheduler::new(self.schedule),
            listener: self.listener,
        })
    }
}

impl<B: ObjectStorage> Default for ClusterStorageBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ObjectStorage> Debug for ClusterStorageBuilder<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterStorageBuilder")
            .field("backend_count", &self.backends.len())
            .field("schedule", &self.schedule)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}
