use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cadence_core::{config::RemoteConfig, SchedulerAddress, TargetAddress};
use cadence_protocol::{Ack, MutationRequest, SchedulerSnapshot};
use thiserror::Error;

/// Failure reported by the transport for a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The call did not complete within its budget.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The service answered with an error response.
    #[error("Rejected by service ({code}): {message}")]
    Rejected { code: String, message: String },

    /// The request never got an answer (connection loss, encoding failure, …).
    #[error("Transport error: {0}")]
    Transport(String),
}

/// The remote scheduling service, as seen by the engine.
///
/// Implemented by the host's RPC transport. Implementations should not retry
/// on their own behalf unless the host wants retries everywhere; the engine
/// never retries.
#[async_trait]
pub trait SchedulerService: Send + Sync {
    /// Return the scheduler for `target`, creating it if it does not exist yet.
    async fn get_or_create_scheduler(
        &self,
        target: &TargetAddress,
    ) -> Result<SchedulerSnapshot, ServiceError>;

    /// Apply one mutation to the scheduler at `scheduler`.
    async fn mutate(
        &self,
        scheduler: &SchedulerAddress,
        request: &MutationRequest,
    ) -> Result<Ack, ServiceError>;
}

/// A [`SchedulerService`] with a per-call timeout applied to every request.
#[derive(Clone)]
pub struct RemoteClient {
    service: Arc<dyn SchedulerService>,
    timeout: Duration,
}

impl RemoteClient {
    pub fn new(service: Arc<dyn SchedulerService>, config: &RemoteConfig) -> Self {
        Self::with_timeout(service, config.timeout())
    }

    pub fn with_timeout(service: Arc<dyn SchedulerService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get_or_create_scheduler(
        &self,
        target: &TargetAddress,
    ) -> Result<SchedulerSnapshot, ServiceError> {
        self.timed(self.service.get_or_create_scheduler(target)).await
    }

    pub async fn mutate(
        &self,
        scheduler: &SchedulerAddress,
        request: &MutationRequest,
    ) -> Result<Ack, ServiceError> {
        self.timed(self.service.mutate(scheduler, request)).await
    }

    async fn timed<T>(
        &self,
        call: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, ServiceError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout {
                ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl SchedulerService for Slow {
        async fn get_or_create_scheduler(
            &self,
            _target: &TargetAddress,
        ) -> Result<SchedulerSnapshot, ServiceError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(SchedulerSnapshot::default())
        }

        async fn mutate(
            &self,
            _scheduler: &SchedulerAddress,
            _request: &MutationRequest,
        ) -> Result<Ack, ServiceError> {
            Err(ServiceError::Rejected {
                code: "request.invalid".to_string(),
                message: "no".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let client = RemoteClient::with_timeout(Arc::new(Slow), Duration::from_millis(20));
        let err = client
            .get_or_create_scheduler(&TargetAddress::from("DRIV:dev:1"))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Timeout { ms: 20 });
    }

    #[tokio::test]
    async fn service_errors_pass_through() {
        let client = RemoteClient::new(Arc::new(Slow), &RemoteConfig::default());
        assert_eq!(client.timeout(), Duration::from_secs(30));
        let err = client
            .mutate(
                &SchedulerAddress::from("SERV:sched:1"),
                &MutationRequest::delete("c1", "WEEKLY"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Rejected { ref code, .. } if code == "request.invalid"));
    }
}
