use std::future::Future;
use std::sync::Arc;

use super::ClusterStorage;
use crate::{Error, ObjectStorage, Result, WriteFailureDetails};

impl<B: ObjectStorage + 'static> ClusterStorage<B> {
    /// Concurrent fan-out: the same call on every backend, all awaited.
    ///
    /// Succeeds only if every backend succeeds, returning backend 0's value.
    /// Backends that succeeded before another failed are left as they are.
    ///
    /// Each backend call runs as its own task. Once issued, the calls run to
    /// completion even if the caller stops waiting.
    pub(crate) async fn dispatch_write<T, F, Fut>(
        &self,
        operation: &'static str,
        call: F,
    ) -> Result<T>
    where
        F: Fn(Arc<B>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let tasks: Vec<_> = self
            .pool
            .handles()
            .map(|backend| tokio::spawn(call(backend)))
            .collect();
        let results = futures::future::join_all(tasks).await;

        let mut first = None;
        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for (idx, joined) in results.into_iter().enumerate() {
            let result = joined.unwrap_or_else(|e| {
                Err(Error::Generic(format!("{operation} task on backend {idx} failed: {e}")))
            });
            match result {
                Ok(value) => {
                    if idx == 0 {
                        first = Some(value);
                    }
                    successes.push(idx);
                }
                Err(e) => failures.push((idx, Box::new(e))),
            }
        }

        match first {
            Some(value) if failures.is_empty() => Ok(value),
            _ => {
                let details = WriteFailureDetails {
                    operation,
                    successes,
                    failures,
                };
                tracing::error!(
                    operation,
                    success_count = details.success_count(),
                    failure_count = details.failure_count(),
                    failed = ?details.failed_indices(),
                    "Cluster write failed"
                );
                if details.is_partial() {
                    tracing::warn!(
                        operation,
                        applied = ?details.successes,
                        "Write applied on some backends only, backends have diverged"
                    );
                }
                Err(Error::WriteFailure(details))
            }
        }
    }
}
