//! Registry, team and network request models.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Registry names must be within these bounds (inclusive).
pub const MIN_REGISTRY_NAME_LEN: usize = 5;
pub const MAX_REGISTRY_NAME_LEN: usize = 50;

/// Retention days must be within these bounds when retention is enabled.
pub const MIN_RETENTION_DAYS: i64 = 1;
pub const MAX_RETENTION_DAYS: i64 = 365;

/// Registry service tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sku {
    Basic,
    Standard,
    Premium,
}

impl Sku {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sku::Basic => "Basic",
            Sku::Standard => "Standard",
            Sku::Premium => "Premium",
        }
    }

    /// Parse a tier name. Matching is exact, as the registry API is.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Basic" => Some(Sku::Basic),
            "Standard" => Some(Sku::Standard),
            "Premium" => Some(Sku::Premium),
            _ => None,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Sku::Basic, Sku::Standard, Sku::Premium]
    }
}

impl Default for Sku {
    fn default() -> Self {
        Self::Premium
    }
}

impl std::fmt::Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which trusted services may bypass network rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NetworkRuleBypass {
    #[default]
    AzureServices,
    #[serde(rename = "None")]
    Disabled,
}

impl NetworkRuleBypass {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkRuleBypass::AzureServices => "AzureServices",
            NetworkRuleBypass::Disabled => "None",
        }
    }
}

fn default_sku() -> String {
    Sku::default().as_str().to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_true() -> bool {
    true
}

fn default_retention_days() -> i64 {
    7
}

/// Registry configuration as supplied by the caller.
///
/// `sku` and `environment` stay raw strings so that bad values reach the
/// validator instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(alias = "registry_name")]
    pub name: String,
    #[serde(alias = "resource_group_name")]
    pub resource_group: String,
    pub location: String,
    #[serde(default = "default_sku")]
    pub sku: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub admin_enabled: bool,
    #[serde(default = "default_true")]
    pub public_network_access: bool,
    #[serde(default, alias = "network_rule_bypass_option")]
    pub network_rule_bypass: NetworkRuleBypass,
    #[serde(default)]
    pub quarantine_policy_enabled: bool,
    #[serde(default)]
    pub trust_policy_enabled: bool,
    #[serde(default)]
    pub retention_policy_enabled: bool,
    #[serde(default = "default_retention_days")]
    pub retention_policy_days: i64,
    #[serde(default)]
    pub zone_redundancy_enabled: bool,
    #[serde(default = "default_true")]
    pub export_policy_enabled: bool,
    #[serde(default)]
    pub anonymous_pull_enabled: bool,
    #[serde(default)]
    pub data_endpoint_enabled: bool,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl RegistryConfig {
    /// Minimal configuration; everything else takes its default.
    pub fn new(
        name: impl Into<String>,
        resource_group: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resource_group: resource_group.into(),
            location: location.into(),
            sku: default_sku(),
            environment: default_environment(),
            admin_enabled: false,
            public_network_access: true,
            network_rule_bypass: NetworkRuleBypass::default(),
            quarantine_policy_enabled: false,
            trust_policy_enabled: false,
            retention_policy_enabled: false,
            retention_policy_days: default_retention_days(),
            zone_redundancy_enabled: false,
            export_policy_enabled: true,
            anonymous_pull_enabled: false,
            data_endpoint_enabled: false,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = sku.into();
        self
    }

    pub fn with_environment(mut self, env: impl Into<String>) -> Self {
        self.environment = env.into();
        self
    }

    /// Enable the retention policy for `days` days.
    pub fn with_retention(mut self, days: i64) -> Self {
        self.retention_policy_enabled = true;
        self.retention_policy_days = days;
        self
    }

    pub fn with_public_network_access(mut self, enabled: bool) -> Self {
        self.public_network_access = enabled;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// The parsed tier, if `sku` names one.
    pub fn parsed_sku(&self) -> Option<Sku> {
        Sku::from_str(&self.sku)
    }

    pub fn login_server(&self) -> String {
        format!("{}.azurecr.io", self.name.to_lowercase())
    }

    /// Names of enabled settings that only the Premium tier supports.
    pub fn premium_features(&self) -> Vec<&'static str> {
        let mut features = Vec::new();
        if self.quarantine_policy_enabled {
            features.push("quarantine_policy_enabled");
        }
        if self.trust_policy_enabled {
            features.push("trust_policy_enabled");
        }
        if self.retention_policy_enabled {
            features.push("retention_policy_enabled");
        }
        if self.zone_redundancy_enabled {
            features.push("zone_redundancy_enabled");
        }
        if self.data_endpoint_enabled {
            features.push("data_endpoint_enabled");
        }
        if !self.export_policy_enabled {
            features.push("export_policy_enabled");
        }
        if !self.public_network_access {
            features.push("public_network_access");
        }
        features
    }
}

/// A team granted repository-scoped access in some environments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub principal_id: String,
    /// Ordered environment tags; derivation follows this order.
    pub allowed_environments: Vec<String>,
}

impl Team {
    pub fn new<I, S>(name: impl Into<String>, principal_id: impl Into<String>, allowed_environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            principal_id: principal_id.into(),
            allowed_environments: allowed_environments.into_iter().map(Into::into).collect(),
        }
    }
}

/// Private endpoint wiring for a registry.
///
/// `registry_id`, `resource_group` and `location` fall back to the
/// registry being provisioned when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkBinding {
    #[serde(default)]
    pub registry_id: Option<String>,
    pub subnet_id: String,
    #[serde(default)]
    pub private_dns_zone_ids: BTreeSet<String>,
    #[serde(default, alias = "resource_group_name")]
    pub resource_group: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl NetworkBinding {
    pub fn new(subnet_id: impl Into<String>) -> Self {
        Self {
            registry_id: None,
            subnet_id: subnet_id.into(),
            private_dns_zone_ids: BTreeSet::new(),
            resource_group: None,
            location: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_registry_id(mut self, id: impl Into<String>) -> Self {
        self.registry_id = Some(id.into());
        self
    }

    pub fn with_dns_zone(mut self, zone_id: impl Into<String>) -> Self {
        self.private_dns_zone_ids.insert(zone_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config = RegistryConfig::new("testacrabc", "test-rg", "East US");
        assert_eq!(config.parsed_sku(), Some(Sku::Premium));
        assert_eq!(config.environment, "dev");
        assert!(config.export_policy_enabled);
        assert!(config.premium_features().is_empty());
    }

    #[test]
    fn test_login_server_is_lowercase() {
        let config = RegistryConfig::new("TestAcr01", "rg", "East US");
        assert_eq!(config.login_server(), "testacr01.azurecr.io");
    }

    #[test]
    fn test_sku_parsing_is_exact() {
        assert_eq!(Sku::from_str("Standard"), Some(Sku::Standard));
        assert_eq!(Sku::from_str("standard"), None);
        assert_eq!(Sku::from_str("InvalidSKU"), None);
    }

    #[test]
    fn test_deserialize_with_terraform_aliases() {
        let yaml = r#"
registry_name: validacr123
resource_group_name: test-rg
location: East US
network_rule_bypass_option: AzureServices
retention_policy_enabled: true
retention_policy_days: 30
"#;
        let config: RegistryConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name, "validacr123");
        assert_eq!(config.resource_group, "test-rg");
        assert_eq!(config.retention_policy_days, 30);
        assert_eq!(config.premium_features(), vec!["retention_policy_enabled"]);
    }
}
