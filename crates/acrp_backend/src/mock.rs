//! In-memory provisioning backend for testing.
//!
//! Tracks which resources are "live" per state handle so tests can assert
//! that a round trip leaves nothing behind.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::json;
use tracing::debug;

use acrp_core::{DesiredState, StateHandle};

use crate::backend::{ApplyOutcome, ProvisioningBackend};
use crate::error::{BackendError, BackendResult};

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedCall {
    pub method: String,
    pub handle: String,
}

/// Failure to inject into the next apply.
#[derive(Debug, Clone)]
struct InjectedFailure {
    transient: bool,
    message: String,
    /// Leave the registry behind as a partially created resource.
    partial: bool,
}

/// Mock backend for testing.
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Live resources per handle, e.g. `registry:myacr` or `token:myacr-dev-pr-token`.
    live: Arc<RwLock<BTreeMap<StateHandle, BTreeSet<String>>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    /// Failures consumed in order by apply.
    apply_failures: Arc<RwLock<Vec<InjectedFailure>>>,
    destroy_failure: Arc<RwLock<Option<String>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next apply. Queued failures are consumed in order.
    pub fn fail_next_apply(self, transient: bool, message: impl Into<String>, partial: bool) -> Self {
        self.apply_failures.write().push(InjectedFailure {
            transient,
            message: message.into(),
            partial,
        });
        self
    }

    /// Fail every destroy until cleared.
    pub fn fail_destroy(self, message: impl Into<String>) -> Self {
        *self.destroy_failure.write() = Some(message.into());
        self
    }

    pub fn clear_destroy_failure(&self) {
        *self.destroy_failure.write() = None;
    }

    /// Live resources recorded under `handle`.
    pub fn live_resources(&self, handle: &StateHandle) -> Vec<String> {
        self.live
            .read()
            .get(handle)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether no resources are live under any handle.
    pub fn is_clean(&self) -> bool {
        self.live.read().values().all(BTreeSet::is_empty)
    }

    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.captured_calls.read().iter().any(|c| c.method == method)
    }

    fn record_call(&self, method: &str, handle: &StateHandle) {
        self.captured_calls.write().push(CapturedCall {
            method: method.to_string(),
            handle: handle.to_string(),
        });
    }

    fn take_apply_failure(&self) -> Option<InjectedFailure> {
        let mut failures = self.apply_failures.write();
        if failures.is_empty() {
            None
        } else {
            Some(failures.remove(0))
        }
    }
}

/// Resource keys a desired state creates.
fn resources_for(state: &DesiredState) -> BackendResult<BTreeSet<String>> {
    let registry_name = state
        .get_str("registry_name")
        .ok_or_else(|| BackendError::Permanent("variable 'registry_name' is required".to_string()))?;

    let mut resources = BTreeSet::new();
    resources.insert(format!("registry:{}", registry_name));

    if let Some(scope_maps) = state.get("scope_maps").and_then(|v| v.as_array()) {
        for scope_map in scope_maps {
            if let Some(name) = scope_map.get("name").and_then(|v| v.as_str()) {
                resources.insert(format!("scope_map:{}", name));
            }
            if let Some(token) = scope_map.get("token_name").and_then(|v| v.as_str()) {
                resources.insert(format!("token:{}", token));
            }
        }
    }

    if let Some(endpoint) = state.get_str("private_endpoint_name") {
        resources.insert(format!("private_endpoint:{}", endpoint));
    }

    Ok(resources)
}

/// Names of resources with the given kind prefix.
fn names_of(resources: &BTreeSet<String>, kind: &str) -> Vec<String> {
    let prefix = format!("{}:", kind);
    resources
        .iter()
        .filter_map(|r| r.strip_prefix(&prefix).map(str::to_string))
        .collect()
}

fn outputs_for(state: &DesiredState, resources: &BTreeSet<String>) -> BTreeMap<String, String> {
    let registry_name = state.get_str("registry_name").unwrap_or_default();
    let resource_group = state.get_str("resource_group_name").unwrap_or_default();
    let registry_id = format!(
        "/subscriptions/mock-sub/resourceGroups/{}/providers/Microsoft.ContainerRegistry/registries/{}",
        resource_group, registry_name
    );

    let mut outputs = BTreeMap::new();
    outputs.insert("registry_name".to_string(), registry_name.to_string());
    outputs.insert("resource_group_name".to_string(), resource_group.to_string());
    outputs.insert(
        "login_server".to_string(),
        format!("{}.azurecr.io", registry_name.to_lowercase()),
    );
    outputs.insert("id".to_string(), registry_id.clone());
    outputs.insert("registry_id".to_string(), registry_id);
    outputs.insert(
        "scope_map_names".to_string(),
        json!(names_of(resources, "scope_map")).to_string(),
    );
    outputs.insert(
        "token_names".to_string(),
        json!(names_of(resources, "token")).to_string(),
    );

    if let Some(endpoint) = names_of(resources, "private_endpoint").into_iter().next() {
        let network_rg = state.get_str("network_resource_group_name").unwrap_or(resource_group);
        outputs.insert(
            "private_endpoint_id".to_string(),
            format!(
                "/subscriptions/mock-sub/resourceGroups/{}/providers/Microsoft.Network/privateEndpoints/{}",
                network_rg, endpoint
            ),
        );
        outputs.insert("private_endpoint_name".to_string(), endpoint);
    }

    outputs
}

#[async_trait]
impl ProvisioningBackend for MockBackend {
    async fn apply(&self, state: &DesiredState) -> BackendResult<ApplyOutcome> {
        let started_at = Utc::now();
        self.record_call("apply", &state.handle);

        let resources = resources_for(state)?;

        if let Some(failure) = self.take_apply_failure() {
            if failure.partial {
                let partial: BTreeSet<String> = resources
                    .iter()
                    .filter(|r| r.starts_with("registry:"))
                    .cloned()
                    .collect();
                self.live
                    .write()
                    .entry(state.handle.clone())
                    .or_default()
                    .extend(partial);
            }
            return Err(if failure.transient {
                BackendError::Transient(failure.message)
            } else {
                BackendError::Permanent(failure.message)
            });
        }

        debug!("Mock apply {} ({} resources)", state.handle, resources.len());
        let outputs = outputs_for(state, &resources);
        self.live.write().insert(state.handle.clone(), resources);

        Ok(ApplyOutcome {
            handle: state.handle.clone(),
            outputs,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn destroy(&self, handle: &StateHandle) -> BackendResult<()> {
        self.record_call("destroy", handle);

        if let Some(message) = self.destroy_failure.read().clone() {
            return Err(BackendError::Permanent(message));
        }

        let removed = self.live.write().remove(handle);
        debug!(
            "Mock destroy {} ({} resources)",
            handle,
            removed.map(|r| r.len()).unwrap_or(0)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DesiredState {
        let mut state = DesiredState::new(StateHandle::new("testacr01-dev"));
        state.set("registry_name", "testacr01");
        state.set("resource_group_name", "test-rg");
        state.set(
            "scope_maps",
            json!([{"name": "testacr01-dev-pr-scope", "token_name": "testacr01-dev-pr-token"}]),
        );
        state
    }

    #[tokio::test]
    async fn test_apply_records_live_resources() {
        let backend = MockBackend::new();
        let outcome = backend.apply(&state()).await.unwrap();

        assert_eq!(outcome.output("login_server"), Some("testacr01.azurecr.io"));
        assert_eq!(
            outcome.output_list("scope_map_names").unwrap(),
            vec!["testacr01-dev-pr-scope"]
        );
        assert_eq!(
            backend.live_resources(&state().handle),
            vec![
                "registry:testacr01",
                "scope_map:testacr01-dev-pr-scope",
                "token:testacr01-dev-pr-token"
            ]
        );
        assert!(!backend.is_clean());
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let backend = MockBackend::new();
        backend.apply(&state()).await.unwrap();

        backend.destroy(&state().handle).await.unwrap();
        backend.destroy(&state().handle).await.unwrap();

        assert!(backend.is_clean());
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_partial_failure_leaves_registry() {
        let backend = MockBackend::new().fail_next_apply(false, "scope map quota exceeded", true);

        let err = backend.apply(&state()).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(backend.live_resources(&state().handle), vec!["registry:testacr01"]);

        backend.apply(&state()).await.unwrap();
        assert_eq!(backend.live_resources(&state().handle).len(), 3);
    }

    #[tokio::test]
    async fn test_missing_registry_name_is_rejected() {
        let backend = MockBackend::new();
        let result = backend.apply(&DesiredState::new(StateHandle::new("empty"))).await;

        assert!(matches!(result, Err(BackendError::Permanent(_))));
        assert!(backend.was_called("apply"));
        assert!(backend.is_clean());
    }

    #[tokio::test]
    async fn test_destroy_failure() {
        let backend = MockBackend::new().fail_destroy("lock held");
        assert!(backend.destroy(&state().handle).await.is_err());

        backend.clear_destroy_failure();
        assert!(backend.destroy(&state().handle).await.is_ok());
    }
}
