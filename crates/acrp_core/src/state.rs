//! Desired state handed to a provisioning backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque identity of one request's backend state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateHandle(String);

impl StateHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Handle for a registry in an environment.
    pub fn for_registry(registry_name: &str, environment: &str) -> Self {
        Self(format!("{}-{}", registry_name, environment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flat input variables for one request, keyed by module input name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    pub handle: StateHandle,
    pub variables: BTreeMap<String, serde_json::Value>,
}

impl DesiredState {
    pub fn new(handle: StateHandle) -> Self {
        Self {
            handle,
            variables: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.variables.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_str())
    }

    /// Render as a `*.tfvars.json` document.
    pub fn to_tfvars_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_for_registry() {
        let handle = StateHandle::for_registry("testacrabc123", "sandbox");
        assert_eq!(handle.as_str(), "testacrabc123-sandbox");
        assert_eq!(handle.to_string(), "testacrabc123-sandbox");
    }

    #[test]
    fn test_tfvars_rendering() {
        let mut state = DesiredState::new(StateHandle::new("testacrabc123-sandbox"));
        state.set("registry_name", "testacrabc123");
        state.set("admin_enabled", false);
        state.set("retention_policy_days", 7);

        let rendered: serde_json::Value = serde_json::from_str(&state.to_tfvars_json().unwrap()).unwrap();
        assert_eq!(rendered["registry_name"], "testacrabc123");
        assert_eq!(rendered["admin_enabled"], false);
        assert!(rendered.get("handle").is_none());
        assert_eq!(state.get_str("registry_name"), Some("testacrabc123"));
        assert_eq!(state.get_str("admin_enabled"), None);
    }
}
