//! Error types for the provisioning core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// The rule a [`ValidationError`] reports as violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRule {
    InvalidNameLength,
    InvalidEnvironment,
    InvalidSku,
    InvalidRetentionDays,
    InvalidNameCharacters,
    MissingResourceGroup,
    MissingLocation,
    PremiumFeatureRequired,
    InvalidTeamName,
    DuplicateTeam,
    InvalidPrincipalId,
    EmptyAllowedEnvironments,
    DerivedNameTooLong,
    InvalidResourceId,
    DuplicateEnvironment,
    InvalidPattern,
    InvalidImageName,
    InvalidTag,
    InvalidPromotionPath,
    InvalidRegistry,
    CrossBoundaryPromotion,
    RegistryEnvironmentMismatch,
}

impl ValidationRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationRule::InvalidNameLength => "invalid_name_length",
            ValidationRule::InvalidEnvironment => "invalid_environment",
            ValidationRule::InvalidSku => "invalid_sku",
            ValidationRule::InvalidRetentionDays => "invalid_retention_days",
            ValidationRule::InvalidNameCharacters => "invalid_name_characters",
            ValidationRule::MissingResourceGroup => "missing_resource_group",
            ValidationRule::MissingLocation => "missing_location",
            ValidationRule::PremiumFeatureRequired => "premium_feature_required",
            ValidationRule::InvalidTeamName => "invalid_team_name",
            ValidationRule::DuplicateTeam => "duplicate_team",
            ValidationRule::InvalidPrincipalId => "invalid_principal_id",
            ValidationRule::EmptyAllowedEnvironments => "empty_allowed_environments",
            ValidationRule::DerivedNameTooLong => "derived_name_too_long",
            ValidationRule::InvalidResourceId => "invalid_resource_id",
            ValidationRule::DuplicateEnvironment => "duplicate_environment",
            ValidationRule::InvalidPattern => "invalid_pattern",
            ValidationRule::InvalidImageName => "invalid_image_name",
            ValidationRule::InvalidTag => "invalid_tag",
            ValidationRule::InvalidPromotionPath => "invalid_promotion_path",
            ValidationRule::InvalidRegistry => "invalid_registry",
            ValidationRule::CrossBoundaryPromotion => "cross_boundary_promotion",
            ValidationRule::RegistryEnvironmentMismatch => "registry_environment_mismatch",
        }
    }
}

impl std::fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A caller-fixable violation of a request rule. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ValidationError {
    /// Request field the rule applies to.
    pub field: String,
    pub rule: ValidationRule,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, rule: ValidationRule, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rule,
            message: message.into(),
        }
    }
}

/// Two distinct claimants derived the same resource name.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Derived name '{name}' is claimed by both {name_a} and {name_b}")]
pub struct NameConflictError {
    /// The colliding derived name.
    pub name: String,
    /// First claimant, as `team/environment`.
    pub name_a: String,
    /// Second claimant, as `team/environment`.
    pub name_b: String,
}

/// Errors that can occur while loading, validating or planning a request.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Name conflict: {0}")]
    NameConflict(#[from] NameConflictError),

    #[error("Unsupported request format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CoreError {
    /// Whether the caller can fix this error by changing the request.
    pub fn is_caller_fixable(&self) -> bool {
        matches!(self, CoreError::Validation(_) | CoreError::NameConflict(_))
    }
}
