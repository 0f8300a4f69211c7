//! Provisioning backend trait and types.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use acrp_core::{DesiredState, StateHandle};

use crate::error::{BackendError, BackendResult};

/// Result of applying a desired state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub handle: StateHandle,
    /// Module outputs. List and map outputs are JSON-encoded.
    pub outputs: BTreeMap<String, String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ApplyOutcome {
    pub fn output(&self, name: &str) -> Option<&str> {
        self.outputs.get(name).map(String::as_str)
    }

    /// Decode a list output.
    pub fn output_list(&self, name: &str) -> BackendResult<Vec<String>> {
        match self.outputs.get(name) {
            Some(raw) => Ok(serde_json::from_str(raw)?),
            None => Err(BackendError::Permanent(format!("output '{}' not found", name))),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }
}

/// External system that creates and destroys the resources of a request.
///
/// Calls may be slow (minutes) and are single-shot; wrap a backend in
/// [`crate::RetryingBackend`] to retry transient failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    /// Converge the backend onto `state`.
    async fn apply(&self, state: &DesiredState) -> BackendResult<ApplyOutcome>;

    /// Remove everything recorded under `handle`.
    async fn destroy(&self, handle: &StateHandle) -> BackendResult<()>;
}

#[async_trait]
impl<T: ProvisioningBackend + ?Sized> ProvisioningBackend for Arc<T> {
    async fn apply(&self, state: &DesiredState) -> BackendResult<ApplyOutcome> {
        (**self).apply(state).await
    }

    async fn destroy(&self, handle: &StateHandle) -> BackendResult<()> {
        (**self).destroy(handle).await
    }
}
