//! Provisioning requests and plans.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};
use crate::models::{NetworkBinding, RegistryConfig, Team};
use crate::network::PrivateEndpointNames;
use crate::scope::{
    check_derived_name_lengths, derive_scope_resources, resolve_scope_resources, ScopeAssignment,
    ScopeResource, SharedEnvironmentPolicy,
};
use crate::state::{DesiredState, StateHandle};
use crate::validator::RegistryValidator;

/// Everything needed to provision one registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    pub registry: RegistryConfig,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub network: Option<NetworkBinding>,
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub shared_environments: SharedEnvironmentPolicy,
}

impl ProvisioningRequest {
    pub fn new(registry: RegistryConfig) -> Self {
        Self {
            registry,
            teams: Vec::new(),
            network: None,
            domain_name: None,
            shared_environments: SharedEnvironmentPolicy::default(),
        }
    }

    pub fn with_team(mut self, team: Team) -> Self {
        self.teams.push(team);
        self
    }

    pub fn with_network(mut self, network: NetworkBinding) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_domain_name(mut self, domain: impl Into<String>) -> Self {
        self.domain_name = Some(domain.into());
        self
    }

    pub fn with_shared_environments(mut self, policy: SharedEnvironmentPolicy) -> Self {
        self.shared_environments = policy;
        self
    }

    /// Load a request from a `.yaml`, `.yml` or `.toml` file.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            other => Err(CoreError::UnsupportedFormat(format!(
                "{} (extension {:?})",
                path.display(),
                other.unwrap_or("")
            ))),
        }
    }

    pub fn from_yaml_str(content: &str) -> CoreResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save the request as YAML.
    pub fn to_file(&self, path: &Path) -> CoreResult<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn handle(&self) -> StateHandle {
        StateHandle::for_registry(&self.registry.name, &self.registry.environment)
    }

    /// Validate the request and derive everything the backend needs.
    ///
    /// Nothing here touches a backend, so a failing plan never leaves
    /// partially created resources.
    pub fn plan(&self, validator: &RegistryValidator) -> CoreResult<ProvisioningPlan> {
        info!("Planning registry {} ({})", self.registry.name, self.registry.environment);

        validator.validate(&self.registry)?;
        validator.validate_teams(&self.teams)?;

        let private_endpoint = match &self.network {
            Some(network) => {
                network.validate()?;
                network.check_registry(&self.registry.name, &self.registry.resource_group)?;
                Some(network.endpoint_names(&self.registry.name)?)
            }
            None => None,
        };

        let scope_resources =
            derive_scope_resources(&self.registry.name, &self.registry.environment, &self.teams);
        let assignments = resolve_scope_resources(scope_resources.clone(), self.shared_environments)?;
        check_derived_name_lengths(&assignments)?;

        debug!(
            "Plan for {} has {} scope maps from {} team/environment pairs",
            self.registry.name,
            assignments.len(),
            scope_resources.len()
        );

        let desired_state = self.desired_state(&assignments, private_endpoint.as_ref());

        Ok(ProvisioningPlan {
            registry: self.registry.clone(),
            scope_resources,
            assignments,
            private_endpoint,
            desired_state,
        })
    }

    fn desired_state(
        &self,
        assignments: &[ScopeAssignment],
        private_endpoint: Option<&PrivateEndpointNames>,
    ) -> DesiredState {
        let registry = &self.registry;
        let mut state = DesiredState::new(self.handle());

        state.set("registry_name", registry.name.as_str());
        state.set("resource_group_name", registry.resource_group.as_str());
        state.set("location", registry.location.as_str());
        state.set("sku", registry.sku.as_str());
        state.set("environment", registry.environment.as_str());
        state.set("admin_enabled", registry.admin_enabled);
        state.set("public_network_access", registry.public_network_access);
        state.set("network_rule_bypass_option", registry.network_rule_bypass.as_str());
        state.set("quarantine_policy_enabled", registry.quarantine_policy_enabled);
        state.set("trust_policy_enabled", registry.trust_policy_enabled);
        state.set("retention_policy_enabled", registry.retention_policy_enabled);
        state.set("retention_policy_days", registry.retention_policy_days);
        state.set("zone_redundancy_enabled", registry.zone_redundancy_enabled);
        state.set("export_policy_enabled", registry.export_policy_enabled);
        state.set("anonymous_pull_enabled", registry.anonymous_pull_enabled);
        state.set("data_endpoint_enabled", registry.data_endpoint_enabled);
        state.set("tags", json!(registry.tags));
        state.set("teams", json!(self.teams));

        let scope_maps: Vec<_> = assignments
            .iter()
            .map(|a| {
                json!({
                    "name": a.scope_map_name,
                    "token_name": a.token_name,
                    "environment": a.environment_tag,
                    "teams": a.teams,
                    "actions": a.actions,
                })
            })
            .collect();
        state.set("scope_maps", scope_maps);

        if let Some(domain) = &self.domain_name {
            state.set("domain_name", domain.as_str());
        }

        if let (Some(network), Some(names)) = (&self.network, private_endpoint) {
            state.set("subnet_id", network.subnet_id.as_str());
            state.set("private_dns_zone_ids", json!(network.private_dns_zone_ids));
            state.set("private_endpoint_name", names.endpoint.as_str());
            state.set("private_service_connection_name", names.service_connection.as_str());
            if let Some(registry_id) = &network.registry_id {
                state.set("registry_id", registry_id.as_str());
            }
            let mut tags = registry.tags.clone();
            tags.extend(network.tags.clone());
            state.set("network_tags", json!(tags));
            state.set(
                "network_resource_group_name",
                network.resource_group.as_deref().unwrap_or(&registry.resource_group),
            );
            state.set(
                "network_location",
                network.location.as_deref().unwrap_or(&registry.location),
            );
        }

        state
    }
}

/// A validated request and everything derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningPlan {
    pub registry: RegistryConfig,
    /// One entry per (team, environment) pair, before policy is applied.
    pub scope_resources: Vec<ScopeResource>,
    /// Scope maps and tokens to create.
    pub assignments: Vec<ScopeAssignment>,
    pub private_endpoint: Option<PrivateEndpointNames>,
    pub desired_state: DesiredState,
}

impl ProvisioningPlan {
    pub fn scope_map_names(&self) -> Vec<String> {
        self.assignments.iter().map(|a| a.scope_map_name.clone()).collect()
    }

    pub fn token_names(&self) -> Vec<String> {
        self.assignments.iter().map(|a| a.token_name.clone()).collect()
    }

    pub fn login_server(&self) -> String {
        self.registry.login_server()
    }
}
