use super::classify::{ErrorClass, classify};
use super::{ClusterStorage, FailoverEvent};
use crate::{ObjectStorage, Result, SignatureOptions};

impl<B: ObjectStorage> ClusterStorage<B> {
    pub(crate) async fn resolve_signature_url(
        &self,
        name: &str,
        options: &SignatureOptions,
    ) -> Result<String> {
        let max = self.pool.len();
        let mut attempt = 0;

        // The last backend in schedule order is never probed.
        while attempt + 1 < max {
            let backend_index = self.scheduler.choose(attempt, max);
            let backend = self.pool.at(backend_index);

            if let Err(error) = backend.head(name).await {
                match classify(&error) {
                    ErrorClass::Transient => {
                        self.report_failover(FailoverEvent {
                            operation: "signature_url",
                            attempt,
                            backend_index,
                            error,
                        });
                        attempt += 1;
                        continue;
                    }
                    ErrorClass::Fatal => {
                        tracing::debug!(
                            name,
                            backend_index,
                            status = ?error.status(),
                            "Existence probe returned a client error, signing here anyway"
                        );
                    }
                }
            }

            return backend.signature_url(name, options).await;
        }

        let backend_index = self.scheduler.choose(attempt, max);
        self.pool
            .at(backend_index)
            .signature_url(name, options)
            .await
    }
}
