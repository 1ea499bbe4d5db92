//! Bounded submission of operations.
//!
//! # Responsibilities
//! - Cap the number of sagas in flight (semaphore permits)
//! - Acknowledge acceptance synchronously, run the saga on its own task
//! - Hand back a completion channel so callers and tests can await the outcome
//! - Record a crashed saga on its operation record

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{oneshot, Semaphore};
use tracing::Instrument;

use crate::coordination::coordinator::Coordinator;
use crate::coordination::error::OperationError;
use crate::coordination::operations::OperationRequest;
use crate::persistence::OperationKind;

/// Outcome delivered on the completion channel.
pub type Completion = Result<String, OperationError>;

/// Acknowledgement for an accepted operation.
#[derive(Debug)]
pub struct Submitted {
    pub kind: OperationKind,
    pub correlation_id: String,
    pub completion: oneshot::Receiver<Completion>,
}

/// Why a submission was refused.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Too many operations in flight (limit {limit})")]
    Saturated { limit: usize },

    #[error(transparent)]
    Rejected(#[from] OperationError),
}

/// Schedules coordinator sagas onto the runtime.
pub struct Dispatcher {
    coordinator: Arc<Coordinator>,
    permits: Arc<Semaphore>,
    limit: usize,
}

impl Dispatcher {
    pub fn new(coordinator: Arc<Coordinator>, max_in_flight: usize) -> Self {
        Self {
            coordinator,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            limit: max_in_flight,
        }
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Sagas currently running.
    pub fn in_flight(&self) -> usize {
        self.limit - self.permits.available_permits()
    }

    /// Accept `request` and start its saga.
    pub async fn submit(&self, request: OperationRequest) -> Result<Submitted, DispatchError> {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| DispatchError::Saturated { limit: self.limit })?;

        let accepted = self.coordinator.accept(request).await?;
        let kind = accepted.kind;
        let correlation_id = accepted.correlation_id.clone();

        let (tx, rx) = oneshot::channel();
        let coordinator = Arc::clone(&self.coordinator);
        let span = tracing::info_span!("operation", kind = %kind, correlation_id = %correlation_id);
        let saga = {
            let coordinator = Arc::clone(&coordinator);
            let accepted = accepted.clone();
            async move { coordinator.execute(accepted).await }.instrument(span.clone())
        };

        let supervisor = async move {
            let _permit = permit;
            let outcome = match tokio::spawn(saga).await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    let error = OperationError::TaskFailed(join_error.to_string());
                    tracing::error!(error = %error, "Operation task crashed");
                    coordinator.record_failure(&accepted, &error).await;
                    Err(error)
                }
            };
            // The caller may have stopped listening
            let _ = tx.send(outcome);
        };
        tokio::spawn(supervisor.instrument(span));

        Ok(Submitted {
            kind,
            correlation_id,
            completion: rx,
        })
    }

    /// Wait until every in-flight saga has finished.
    pub async fn drain(&self) {
        let limit = u32::try_from(self.limit).unwrap_or(u32::MAX);
        if let Ok(permits) = self.permits.acquire_many(limit).await {
            drop(permits);
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("limit", &self.limit)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
