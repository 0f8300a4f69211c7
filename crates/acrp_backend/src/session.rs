//! Provisioning sessions with cleanup on failure.

use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use acrp_core::{DesiredState, StateHandle};

use crate::backend::{ApplyOutcome, ProvisioningBackend};
use crate::error::BackendResult;

const UNIQUE_ID_LEN: usize = 6;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random six character base-36 suffix for isolating parallel requests.
/// Lowercase only, so it survives the registry login server lowercasing.
pub fn unique_id() -> String {
    let mut value = Uuid::new_v4().as_u128();
    let mut id = String::with_capacity(UNIQUE_ID_LEN);
    for _ in 0..UNIQUE_ID_LEN {
        id.push(char::from(BASE36[(value % 36) as usize]));
        value /= 36;
    }
    id
}

/// Scopes apply/destroy pairs against one backend.
///
/// A failed apply triggers a best-effort destroy of whatever was partially
/// created; the apply error is what the caller sees.
#[derive(Clone)]
pub struct ProvisioningSession {
    backend: Arc<dyn ProvisioningBackend>,
    cleanup_on_failure: bool,
}

impl ProvisioningSession {
    pub fn new(backend: Arc<dyn ProvisioningBackend>) -> Self {
        Self {
            backend,
            cleanup_on_failure: true,
        }
    }

    /// Leave partially created resources in place after a failed apply.
    pub fn without_cleanup(mut self) -> Self {
        self.cleanup_on_failure = false;
        self
    }

    pub fn backend(&self) -> &Arc<dyn ProvisioningBackend> {
        &self.backend
    }

    pub async fn apply(&self, state: &DesiredState) -> BackendResult<ApplyOutcome> {
        match self.backend.apply(state).await {
            Ok(outcome) => {
                info!("Applied {} in {}ms", state.handle, outcome.duration_ms());
                Ok(outcome)
            }
            Err(e) => {
                warn!("Apply of {} failed: {}", state.handle, e);
                if self.cleanup_on_failure {
                    self.cleanup(&state.handle).await;
                }
                Err(e)
            }
        }
    }

    pub async fn destroy(&self, handle: &StateHandle) -> BackendResult<()> {
        self.backend.destroy(handle).await?;
        info!("Destroyed {}", handle);
        Ok(())
    }

    /// Apply `state`, run `check` against the outcome, then always destroy.
    ///
    /// The check's error wins over a destroy error.
    pub async fn round_trip<T, F, Fut>(&self, state: &DesiredState, check: F) -> BackendResult<T>
    where
        F: FnOnce(ApplyOutcome) -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        let outcome = self.apply(state).await?;
        let checked = check(outcome).await;
        let destroyed = self.destroy(&state.handle).await;

        match (checked, destroyed) {
            (Err(e), destroyed) => {
                if let Err(destroy_err) = destroyed {
                    warn!("Destroy of {} also failed: {}", state.handle, destroy_err);
                }
                Err(e)
            }
            (Ok(_), Err(e)) => Err(e),
            (Ok(value), Ok(())) => Ok(value),
        }
    }

    async fn cleanup(&self, handle: &StateHandle) {
        info!("Cleaning up partially applied {}", handle);
        if let Err(e) = self.backend.destroy(handle).await {
            warn!("Cleanup of {} failed: {}", handle, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;
    use crate::backend::MockProvisioningBackend;
    use crate::error::BackendError;

    fn state() -> DesiredState {
        DesiredState::new(StateHandle::new("testacr01-dev"))
    }

    fn outcome() -> ApplyOutcome {
        ApplyOutcome {
            handle: StateHandle::new("testacr01-dev"),
            outputs: BTreeMap::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_unique_id_shape() {
        for _ in 0..200 {
            let id = unique_id();
            assert_eq!(id.len(), 6);
            assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()), "{}", id);
        }
        assert_ne!(unique_id(), unique_id());
    }

    #[tokio::test]
    async fn test_failed_apply_triggers_destroy() {
        let mut backend = MockProvisioningBackend::new();
        backend
            .expect_apply()
            .times(1)
            .returning(|_| Err(BackendError::Permanent("quota exceeded".into())));
        backend.expect_destroy().times(1).returning(|_| Ok(()));

        let session = ProvisioningSession::new(Arc::new(backend));
        let err = session.apply(&state()).await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_cleanup_error_does_not_mask_apply_error() {
        let mut backend = MockProvisioningBackend::new();
        backend
            .expect_apply()
            .returning(|_| Err(BackendError::Transient("throttled".into())));
        backend
            .expect_destroy()
            .returning(|_| Err(BackendError::Permanent("lock held".into())));

        let session = ProvisioningSession::new(Arc::new(backend));
        let err = session.apply(&state()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_without_cleanup_skips_destroy() {
        let mut backend = MockProvisioningBackend::new();
        backend
            .expect_apply()
            .returning(|_| Err(BackendError::Permanent("bad".into())));
        backend.expect_destroy().times(0);

        let session = ProvisioningSession::new(Arc::new(backend)).without_cleanup();
        assert!(session.apply(&state()).await.is_err());
    }

    #[tokio::test]
    async fn test_round_trip_destroys_after_failed_check() {
        let mut backend = MockProvisioningBackend::new();
        backend.expect_apply().times(1).returning(|_| Ok(outcome()));
        backend.expect_destroy().times(1).returning(|_| Ok(()));

        let session = ProvisioningSession::new(Arc::new(backend));
        let result: BackendResult<()> = session
            .round_trip(&state(), |_| async {
                Err(BackendError::Permanent("login server missing".into()))
            })
            .await;

        assert!(result.unwrap_err().to_string().contains("login server missing"));
    }
}
