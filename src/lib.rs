use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncRead;

#[cfg(feature = "memory")]
pub use adapters::memory::{MemoryConfig, MemoryStorage};

pub use adapters::cluster;
pub use adapters::cluster::{
    BackendConfig, ClusterConfig, ClusterStorage, ClusterStorageBuilder, FailoverEvent, Schedule,
};

mod object;
pub use object::{
    CopyOptions, DeleteMultiOptions, DeleteMultiResult, GetObject, HttpMethod, ListPage, ListQuery,
    Metadata, ObjectMeta, ObjectReader, PutOptions, PutResult, SignatureOptions,
};

/// A specialized Result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Details about a fan-out write that did not succeed on every backend.
///
/// Backends that succeeded are **not** rolled back: after a partial failure
/// the backends may hold divergent data. `successes` tells the caller which
/// ones already applied the write.
///
/// ```
/// # use stowage_cluster::{ClusterStorage, Error, MemoryStorage, ObjectStorageExt};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let storage = ClusterStorage::builder()
/// #     .add_backend(MemoryStorage::new())
/// #     .add_backend(MemoryStorage::new())
/// #     .build()?;
/// match storage.put_bytes("file.txt", b"data").await {
///     Err(Error::WriteFailure(details)) => {
///         println!("{} of {} failed", details.failure_count(), details.total_backends());
///         for (idx, error) in &details.failures {
///             eprintln!("Backend {}: {:?}", idx, error);
///         }
///     }
///     _ => {}
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WriteFailureDetails {
    /// Name of the write operation (`put`, `delete`, ...)
    pub operation: &'static str,
    /// Indices of backends that succeeded
    pub successes: Vec<usize>,
    /// Indices and errors of backends that failed, in pool order
    pub failures: Vec<(usize, Box<Error>)>,
}

impl WriteFailureDetails {
    /// Total number of backends involved
    pub fn total_backends(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// True when some backends applied the write and others did not.
    pub fn is_partial(&self) -> bool {
        !self.successes.is_empty() && !self.failures.is_empty()
    }

    /// The failure of the lowest-indexed failing backend.
    pub fn first_failure(&self) -> Option<(usize, &Error)> {
        self.failures.first().map(|(idx, err)| (*idx, err.as_ref()))
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|(idx, _)| *idx).collect()
    }
}

impl std::fmt::Display for WriteFailureDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} failed on {} of {} backends",
            self.operation,
            self.failure_count(),
            self.total_backends()
        )?;
        if let Some((idx, err)) = self.first_failure() {
            write!(f, " (backend {idx}: {err})")?;
        }
        Ok(())
    }
}

/// A unified Error type for storage operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Backend responded with status {status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Storage backend connection error")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO Error")]
    Io(#[from] std::io::Error),

    #[error("Invalid cluster configuration: {0}")]
    Config(String),

    #[error("all clients are down ({attempts} backends tried)")]
    AllServerDown { attempts: usize },

    #[error("{0}")]
    WriteFailure(WriteFailureDetails),

    #[error("Generic storage error: {0}")]
    Generic(String),
}

impl Error {
    /// Build an error from a backend-reported status code.
    pub fn status_code(status: u16, message: impl Into<String>) -> Self {
        Error::Status {
            status,
            code: None,
            message: message.into(),
        }
    }

    /// The numeric status attached to this error, if the backend reported one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::NotFound(_) => Some(404),
            Error::PermissionDenied(_) => Some(403),
            Error::Status { status, .. } => Some(*status),
            Error::WriteFailure(details) => details.first_failure().and_then(|(_, e)| e.status()),
            _ => None,
        }
    }

    /// Every backend failed the same read with a retriable error.
    pub fn is_all_server_down(&self) -> bool {
        matches!(self, Error::AllServerDown { .. })
    }
}

/// Adapter modules, gated behind Cargo features.
pub mod adapters {
    pub mod cluster;
    #[cfg(feature = "memory")]
    pub mod memory;
}

/// The object storage client interface every backend implements.
///
/// Methods fall in three groups, which [`ClusterStorage`] routes differently:
///
/// - **read**: [`head`](Self::head), [`get`](Self::get),
///   [`get_stream`](Self::get_stream), [`list`](Self::list)
/// - **write**: [`put`](Self::put), [`put_stream`](Self::put_stream),
///   [`delete`](Self::delete), [`delete_multi`](Self::delete_multi),
///   [`copy`](Self::copy), [`put_meta`](Self::put_meta)
/// - **signing**: [`signature_url`](Self::signature_url)
///
/// Errors should carry the backend status where there is one (see
/// [`Error::status`]); the cluster uses it to decide whether another backend
/// is worth trying.
pub trait ObjectStorage: Send + Sync + Debug {
    /// Fetch object metadata without the body.
    fn head(&self, name: &str) -> impl Future<Output = Result<ObjectMeta>> + Send;

    /// Fetch an object into memory.
    fn get(&self, name: &str) -> impl Future<Output = Result<GetObject>> + Send;

    /// Fetch an object as a byte stream.
    fn get_stream(&self, name: &str) -> impl Future<Output = Result<ObjectReader>> + Send;

    /// List one page of objects.
    fn list(&self, query: &ListQuery) -> impl Future<Output = Result<ListPage>> + Send;

    /// Store an object from a buffer.
    fn put(
        &self,
        name: &str,
        content: Bytes,
        options: &PutOptions,
    ) -> impl Future<Output = Result<PutResult>> + Send;

    /// Store an object from a reader.
    fn put_stream<R: AsyncRead + Send + Unpin>(
        &self,
        name: &str,
        input: R,
        options: &PutOptions,
    ) -> impl Future<Output = Result<PutResult>> + Send;

    /// Delete an object. Idempotent (returns `Ok(())` if already deleted).
    fn delete(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Delete several objects in one call.
    fn delete_multi(
        &self,
        names: &[String],
        options: &DeleteMultiOptions,
    ) -> impl Future<Output = Result<DeleteMultiResult>> + Send;

    /// Server-side copy of `source` to `target`.
    fn copy(
        &self,
        target: &str,
        source: &str,
        options: &CopyOptions,
    ) -> impl Future<Output = Result<PutResult>> + Send;

    /// Replace the user metadata of an existing object.
    fn put_meta(&self, name: &str, metadata: &Metadata) -> impl Future<Output = Result<()>> + Send;

    /// Produce a pre-signed URL. Signing alone does not check that the object exists.
    fn signature_url(
        &self,
        name: &str,
        options: &SignatureOptions,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Convenience methods built on [`ObjectStorage`].
pub trait ObjectStorageExt: ObjectStorage {
    /// Check if an object exists. A 404 from `head` means `false`.
    fn exists(&self, name: &str) -> impl Future<Output = Result<bool>> + Send {
        async move {
            match self.head(name).await {
                Ok(_) => Ok(true),
                Err(e) if e.status() == Some(404) => Ok(false),
                Err(e) => Err(e),
            }
        }
    }

    /// Download an object as a UTF-8 string.
    fn get_string(&self, name: &str) -> impl Future<Output = Result<String>> + Send {
        async move {
            let object = self.get(name).await?;
            String::from_utf8(object.content.to_vec())
                .map_err(|e| Error::Generic(format!("invalid utf-8: {e}")))
        }
    }

    /// Upload a byte slice with default options.
    fn put_bytes(
        &self,
        name: &str,
        bytes: &[u8],
    ) -> impl Future<Output = Result<PutResult>> + Send {
        let content = Bytes::copy_from_slice(bytes);
        async move { self.put(name, content, &PutOptions::default()).await }
    }
}

impl<T: ObjectStorage + ?Sized> ObjectStorageExt for T {}
