//! The transactional retry loop.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use morph_store::{DocumentStore, SessionHandle};
use tracing::{debug, error, warn};

use crate::{RetryPolicy, Transient, TransactionError};

/// Runs operations inside store transactions.
#[derive(Clone)]
pub struct TransactionRunner {
    store: Arc<dyn DocumentStore>,
    policy: RetryPolicy,
}

impl TransactionRunner {
    pub fn new(store: Arc<dyn DocumentStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` on a fresh session inside a transaction.
    ///
    /// The transaction commits when `op` succeeds and aborts when it fails.
    /// A transient failure, from `op` or from the commit, re-runs `op` from
    /// scratch on a new session until the attempts are spent.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(SessionHandle) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<TransactionError> + Transient + fmt::Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let session = self.store.start_session().await.map_err(TransactionError::from)?;
            session.start_transaction().await.map_err(TransactionError::from)?;

            let outcome = match op(session.clone()).await {
                Ok(value) => session
                    .commit_transaction()
                    .await
                    .map(|()| value)
                    .map_err(|err| E::from(TransactionError::from(err))),
                Err(err) => Err(err),
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = label, attempt, "transaction committed after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if let Err(abort) = session.abort_transaction().await {
                warn!(operation = label, error = %abort, "abort failed");
            }

            if !err.is_transient() {
                return Err(err);
            }
            if attempt >= self.policy.max_attempts {
                error!(operation = label, attempts = attempt, error = %err, "transaction retries exhausted");
                return Err(E::from(TransactionError::retries_exhausted(attempt, err.to_string())));
            }

            let delay = self.policy.backoff.delay(attempt);
            warn!(
                operation = label,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient transaction failure, retrying"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

impl fmt::Debug for TransactionRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionRunner")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
