//! ARM resource ids and private endpoint naming.

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationRule};
use crate::models::NetworkBinding;

pub const REGISTRY_RESOURCE_TYPE: &str = "Microsoft.ContainerRegistry/registries";
pub const SUBNET_RESOURCE_TYPE: &str = "Microsoft.Network/virtualNetworks/subnets";
pub const DNS_ZONE_RESOURCE_TYPE: &str = "Microsoft.Network/privateDnsZones";

/// A parsed Azure Resource Manager id:
/// `/subscriptions/{sub}/resourceGroups/{rg}/providers/{ns}/{type}/{name}[/{type}/{name}]*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub namespace: String,
    /// Type segments, outermost first (`virtualNetworks`, `subnets`).
    pub types: Vec<String>,
    /// Name segments, paired with `types`.
    pub names: Vec<String>,
}

impl ResourceId {
    pub fn parse(id: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| {
            ValidationError::new(
                "resource_id",
                ValidationRule::InvalidResourceId,
                format!("Invalid resource id '{}': {}", id, reason),
            )
        };

        let segments: Vec<&str> = id.trim_start_matches('/').split('/').collect();
        if segments.len() < 8 {
            return Err(invalid("too few segments"));
        }
        if !segments[0].eq_ignore_ascii_case("subscriptions")
            || !segments[2].eq_ignore_ascii_case("resourceGroups")
            || !segments[4].eq_ignore_ascii_case("providers")
        {
            return Err(invalid("expected /subscriptions/../resourceGroups/../providers/.."));
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty segment"));
        }

        let tail = &segments[6..];
        if tail.len() % 2 != 0 {
            return Err(invalid("unpaired type/name segment"));
        }

        Ok(Self {
            subscription_id: segments[1].to_string(),
            resource_group: segments[3].to_string(),
            namespace: segments[5].to_string(),
            types: tail.iter().step_by(2).map(|s| s.to_string()).collect(),
            names: tail.iter().skip(1).step_by(2).map(|s| s.to_string()).collect(),
        })
    }

    /// Full type such as `Microsoft.Network/virtualNetworks/subnets`.
    pub fn resource_type(&self) -> String {
        format!("{}/{}", self.namespace, self.types.join("/"))
    }

    /// Innermost resource name.
    pub fn name(&self) -> &str {
        self.names.last().map(String::as_str).unwrap_or_default()
    }

    pub fn is_type(&self, resource_type: &str) -> bool {
        self.resource_type().eq_ignore_ascii_case(resource_type)
    }

    /// Parse and require a particular resource type.
    pub fn parse_typed(id: &str, resource_type: &str, field: &str) -> Result<Self, ValidationError> {
        let parsed = Self::parse(id).map_err(|e| ValidationError { field: field.to_string(), ..e })?;
        if !parsed.is_type(resource_type) {
            return Err(ValidationError::new(
                field,
                ValidationRule::InvalidResourceId,
                format!(
                    "Expected a {} id but '{}' is a {}",
                    resource_type,
                    id,
                    parsed.resource_type()
                ),
            ));
        }
        Ok(parsed)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/{}",
            self.subscription_id, self.resource_group, self.namespace
        )?;
        for (ty, name) in self.types.iter().zip(&self.names) {
            write!(f, "/{}/{}", ty, name)?;
        }
        Ok(())
    }
}

/// Names of the private endpoint resources for one registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateEndpointNames {
    pub endpoint: String,
    pub service_connection: String,
    pub dns_zone_group: String,
}

impl PrivateEndpointNames {
    pub fn for_registry(registry_name: &str) -> Self {
        Self {
            endpoint: format!("{}-pe", registry_name),
            service_connection: format!("{}-psc", registry_name),
            dns_zone_group: format!("{}-dns", registry_name),
        }
    }
}

impl NetworkBinding {
    /// Check every id in the binding has the expected shape.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(registry_id) = &self.registry_id {
            ResourceId::parse_typed(registry_id, REGISTRY_RESOURCE_TYPE, "network.registry_id")?;
        }
        ResourceId::parse_typed(&self.subnet_id, SUBNET_RESOURCE_TYPE, "network.subnet_id")?;
        for zone_id in &self.private_dns_zone_ids {
            ResourceId::parse_typed(zone_id, DNS_ZONE_RESOURCE_TYPE, "network.private_dns_zone_ids")?;
        }
        Ok(())
    }

    /// Check `registry_id`, when set, names the registry being provisioned.
    /// ARM names compare case-insensitively.
    pub fn check_registry(&self, registry_name: &str, resource_group: &str) -> Result<(), ValidationError> {
        let Some(registry_id) = &self.registry_id else {
            return Ok(());
        };
        let parsed = ResourceId::parse_typed(registry_id, REGISTRY_RESOURCE_TYPE, "network.registry_id")?;
        if !parsed.name().eq_ignore_ascii_case(registry_name)
            || !parsed.resource_group.eq_ignore_ascii_case(resource_group)
        {
            return Err(ValidationError::new(
                "network.registry_id",
                ValidationRule::InvalidResourceId,
                format!(
                    "Registry id '{}' does not match registry '{}' in resource group '{}'",
                    registry_id, registry_name, resource_group
                ),
            ));
        }
        Ok(())
    }

    /// Registry name from `registry_id`, or `fallback` when no id is set.
    pub fn registry_name(&self, fallback: &str) -> Result<String, ValidationError> {
        match &self.registry_id {
            Some(id) => Ok(ResourceId::parse_typed(id, REGISTRY_RESOURCE_TYPE, "network.registry_id")?
                .name()
                .to_string()),
            None => Ok(fallback.to_string()),
        }
    }

    pub fn endpoint_names(&self, fallback_registry: &str) -> Result<PrivateEndpointNames, ValidationError> {
        Ok(PrivateEndpointNames::for_registry(&self.registry_name(fallback_registry)?))
    }
}
