use std::future::Future;

use super::classify::{ErrorClass, classify};
use super::{ClusterStorage, FailoverEvent};
use crate::{Error, ObjectStorage, Result};

impl<B: ObjectStorage> ClusterStorage<B> {
    /// Sequential failover: one backend call outstanding at a time, in
    /// schedule order, at most one attempt per backend.
    pub(crate) async fn dispatch_read<'a, T, F, Fut>(
        &'a self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut(&'a B) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max = self.pool.len();

        for attempt in 0..max {
            let backend_index = self.scheduler.choose(attempt, max);

            let error = match call(self.pool.at(backend_index)).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match classify(&error) {
                ErrorClass::Fatal => {
                    tracing::debug!(
                        operation,
                        backend_index,
                        status = ?error.status(),
                        "Client error, not retrying on other backends"
                    );
                    return Err(error);
                }
                ErrorClass::Transient => self.report_failover(FailoverEvent {
                    operation,
                    attempt,
                    backend_index,
                    error,
                }),
            }
        }

        tracing::error!(operation, attempts = max, "All backends failed");
        Err(Error::AllServerDown { attempts: max })
    }
}
