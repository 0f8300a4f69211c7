//! Request validation.
//!
//! Registry rules run in a fixed priority order and the first failing rule
//! wins. Message text is stable; callers match on substrings of it.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::environment::EnvironmentSet;
use crate::error::{ValidationError, ValidationRule};
use crate::models::{
    RegistryConfig, Sku, Team, MAX_REGISTRY_NAME_LEN, MAX_RETENTION_DAYS, MIN_REGISTRY_NAME_LEN,
    MIN_RETENTION_DAYS,
};

pub const MAX_TEAM_NAME_LEN: usize = 64;
const TEAM_NAME_PATTERN: &str = r"^[a-z0-9]+(?:[._-][a-z0-9]+)*$";

/// Compile `pattern` once into `cell`. A pattern that fails to compile
/// stays an error on every call, so checks using it fail closed.
pub(crate) fn compiled_pattern(
    cell: &'static OnceLock<Result<Regex, String>>,
    pattern: &str,
) -> Result<&'static Regex, ValidationError> {
    cell.get_or_init(|| Regex::new(pattern).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| {
            ValidationError::new(
                "pattern",
                ValidationRule::InvalidPattern,
                format!("Invalid regex '{}': {}", pattern, e),
            )
        })
}

fn team_name_regex() -> Result<&'static Regex, ValidationError> {
    static PATTERN: OnceLock<Result<Regex, String>> = OnceLock::new();
    compiled_pattern(&PATTERN, TEAM_NAME_PATTERN)
}

type RegistryCheck = fn(&RegistryValidator, &RegistryConfig) -> Result<(), ValidationError>;

/// All violations found in a request.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    /// Advisory findings; they never make a report invalid.
    pub warnings: Vec<String>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn record(&mut self, result: Result<(), ValidationError>) {
        if let Err(e) = result {
            self.add_error(e);
        }
    }

    pub fn merge(&mut self, other: ValidationReport) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// The highest-priority violation, if any.
    pub fn into_result(self) -> Result<(), ValidationError> {
        match self.errors.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Validator for registry configurations and team lists.
#[derive(Debug, Clone, Default)]
pub struct RegistryValidator {
    environments: EnvironmentSet,
}

impl RegistryValidator {
    pub fn new(environments: EnvironmentSet) -> Self {
        Self { environments }
    }

    pub fn environments(&self) -> &EnvironmentSet {
        &self.environments
    }

    const REGISTRY_CHECKS: &'static [RegistryCheck] = &[
        Self::check_name_length,
        Self::check_environment,
        Self::check_sku,
        Self::check_retention_days,
        Self::check_name_characters,
        Self::check_resource_group,
        Self::check_location,
        Self::check_premium_features,
    ];

    /// Validate a registry configuration; the first failing rule wins.
    pub fn validate(&self, config: &RegistryConfig) -> Result<(), ValidationError> {
        debug!("Validating registry configuration for {}", config.name);
        for check in Self::REGISTRY_CHECKS {
            check(self, config)?;
        }
        Ok(())
    }

    /// Run every registry rule and collect all violations.
    pub fn validate_all(&self, config: &RegistryConfig) -> ValidationReport {
        let mut report = ValidationReport::new();
        for check in Self::REGISTRY_CHECKS {
            report.record(check(self, config));
        }
        report
    }

    /// Validate teams in input order; the first failing rule wins.
    pub fn validate_teams(&self, teams: &[Team]) -> Result<(), ValidationError> {
        self.validate_teams_all(teams).into_result()
    }

    /// Run every team rule and collect all violations.
    pub fn validate_teams_all(&self, teams: &[Team]) -> ValidationReport {
        let mut report = ValidationReport::new();
        let mut seen = HashSet::new();

        for (index, team) in teams.iter().enumerate() {
            report.record(self.check_team_name(index, team));
            if !seen.insert(team.name.as_str()) {
                report.add_error(ValidationError::new(
                    format!("teams[{}].name", index),
                    ValidationRule::DuplicateTeam,
                    format!("Team '{}' is declared more than once", team.name),
                ));
            }
            report.record(self.check_principal_id(index, team));
            report.record(self.check_team_environments(index, team));
        }

        report
    }

    fn check_name_length(&self, config: &RegistryConfig) -> Result<(), ValidationError> {
        let len = config.name.chars().count();
        if !(MIN_REGISTRY_NAME_LEN..=MAX_REGISTRY_NAME_LEN).contains(&len) {
            return Err(ValidationError::new(
                "registry_name",
                ValidationRule::InvalidNameLength,
                format!(
                    "Registry name must be {}-{} characters (got {})",
                    MIN_REGISTRY_NAME_LEN, MAX_REGISTRY_NAME_LEN, len
                ),
            ));
        }
        Ok(())
    }

    fn check_environment(&self, config: &RegistryConfig) -> Result<(), ValidationError> {
        if !self.environments.contains(&config.environment) {
            return Err(self.invalid_environment("environment", &config.environment));
        }
        Ok(())
    }

    fn check_sku(&self, config: &RegistryConfig) -> Result<(), ValidationError> {
        if config.parsed_sku().is_none() {
            let allowed: Vec<_> = Sku::all().iter().map(|s| s.as_str()).collect();
            return Err(ValidationError::new(
                "sku",
                ValidationRule::InvalidSku,
                format!("SKU must be one of: {} (got '{}')", allowed.join(", "), config.sku),
            ));
        }
        Ok(())
    }

    fn check_retention_days(&self, config: &RegistryConfig) -> Result<(), ValidationError> {
        if config.retention_policy_enabled
            && !(MIN_RETENTION_DAYS..=MAX_RETENTION_DAYS).contains(&config.retention_policy_days)
        {
            return Err(ValidationError::new(
                "retention_policy_days",
                ValidationRule::InvalidRetentionDays,
                format!(
                    "Retention policy days must be between {} and {} (got {})",
                    MIN_RETENTION_DAYS, MAX_RETENTION_DAYS, config.retention_policy_days
                ),
            ));
        }
        Ok(())
    }

    fn check_name_characters(&self, config: &RegistryConfig) -> Result<(), ValidationError> {
        if !config.name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::new(
                "registry_name",
                ValidationRule::InvalidNameCharacters,
                "Registry name must contain only alphanumeric characters",
            ));
        }
        Ok(())
    }

    fn check_resource_group(&self, config: &RegistryConfig) -> Result<(), ValidationError> {
        if config.resource_group.trim().is_empty() {
            return Err(ValidationError::new(
                "resource_group_name",
                ValidationRule::MissingResourceGroup,
                "Resource group name cannot be empty",
            ));
        }
        Ok(())
    }

    fn check_location(&self, config: &RegistryConfig) -> Result<(), ValidationError> {
        if config.location.trim().is_empty() {
            return Err(ValidationError::new(
                "location",
                ValidationRule::MissingLocation,
                "Location cannot be empty",
            ));
        }
        Ok(())
    }

    fn check_premium_features(&self, config: &RegistryConfig) -> Result<(), ValidationError> {
        if config.parsed_sku() == Some(Sku::Premium) {
            return Ok(());
        }
        let features = config.premium_features();
        if let Some(first) = features.first() {
            return Err(ValidationError::new(
                *first,
                ValidationRule::PremiumFeatureRequired,
                format!(
                    "Premium SKU required for: {} (sku is '{}')",
                    features.join(", "),
                    config.sku
                ),
            ));
        }
        Ok(())
    }

    fn check_team_name(&self, index: usize, team: &Team) -> Result<(), ValidationError> {
        let field = format!("teams[{}].name", index);
        let pattern = team_name_regex().map_err(|e| ValidationError { field: field.clone(), ..e })?;
        if team.name.is_empty() || team.name.len() > MAX_TEAM_NAME_LEN || !pattern.is_match(&team.name) {
            return Err(ValidationError::new(
                field,
                ValidationRule::InvalidTeamName,
                format!(
                    "Team name '{}' must be 1-{} lowercase letters, numbers, periods, hyphens, and underscores",
                    team.name, MAX_TEAM_NAME_LEN
                ),
            ));
        }
        Ok(())
    }

    fn check_principal_id(&self, index: usize, team: &Team) -> Result<(), ValidationError> {
        if Uuid::parse_str(&team.principal_id).is_err() {
            return Err(ValidationError::new(
                format!("teams[{}].principal_id", index),
                ValidationRule::InvalidPrincipalId,
                format!(
                    "Principal id for team '{}' must be a UUID (got '{}')",
                    team.name, team.principal_id
                ),
            ));
        }
        Ok(())
    }

    fn check_team_environments(&self, index: usize, team: &Team) -> Result<(), ValidationError> {
        let field = format!("teams[{}].allowed_environments", index);
        if team.allowed_environments.is_empty() {
            return Err(ValidationError::new(
                field,
                ValidationRule::EmptyAllowedEnvironments,
                format!("Team '{}' must allow at least one environment", team.name),
            ));
        }
        if let Some(env) = team
            .allowed_environments
            .iter()
            .find(|env| !self.environments.contains(env))
        {
            return Err(self.invalid_environment(&field, env));
        }

        let mut seen = HashSet::new();
        for env in &team.allowed_environments {
            if !seen.insert(env.as_str()) {
                return Err(ValidationError::new(
                    field,
                    ValidationRule::DuplicateEnvironment,
                    format!("Team '{}' lists environment '{}' more than once", team.name, env),
                ));
            }
        }
        Ok(())
    }

    fn invalid_environment(&self, field: &str, value: &str) -> ValidationError {
        ValidationError::new(
            field,
            ValidationRule::InvalidEnvironment,
            format!(
                "Environment must be one of: {} (got '{}')",
                self.environments.describe(),
                value
            ),
        )
    }
}

/// Validate against the default environment set.
pub fn validate(config: &RegistryConfig) -> Result<(), ValidationError> {
    RegistryValidator::default().validate(config)
}
