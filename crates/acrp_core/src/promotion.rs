//! Image promotion validation.
//!
//! A promotion copies one image tag from a source registry to a target
//! registry. Unlike registry validation every rule runs and all violations
//! are reported together, plus advisory warnings.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ValidationError, ValidationRule};
use crate::validator::{compiled_pattern, ValidationReport, MAX_TEAM_NAME_LEN};

/// Environments an image can be promoted between.
pub const PROMOTION_ENVIRONMENTS: &[&str] = &["pr", "dev", "perf", "preproduction", "production", "prod"];

/// Environments that must be served from the nonprod registry.
const NONPROD_ENVIRONMENTS: &[&str] = &["pr", "dev", "perf"];

/// Environments that must be served from the prod registry.
const PROD_ENVIRONMENTS: &[&str] = &["preproduction", "production", "prod"];

pub const MAX_IMAGE_NAME_LEN: usize = 128;
pub const MAX_TAG_LEN: usize = 128;

const NAME_PATTERN: &str = r"^[a-z0-9]+(?:[._-][a-z0-9]+)*$";
const TAG_PATTERN: &str = r"^[a-zA-Z0-9][a-zA-Z0-9._-]{0,127}$";
const SANDBOX_REGISTRY_PATTERN: &str = r"^brightcloudsandbox-[a-f0-9]{8}\.azurecr\.io$";
const NONPROD_REGISTRY_PATTERN: &str = r"^brightcloudnonprod-[a-f0-9]{8}\.azurecr\.io$";
const PROD_REGISTRY_PATTERN: &str = r"^brightcloudprod-[a-f0-9]{8}\.azurecr\.io$";

const LATEST_TAG: &str = "latest";

/// Targets reachable from `source`. `None` for an unknown source; an empty
/// slice for terminal environments.
pub fn allowed_targets(source: &str) -> Option<&'static [&'static str]> {
    match source {
        "pr" => Some(&["dev"]),
        "dev" => Some(&["perf", "preproduction", "prod"]),
        "perf" => Some(&["preproduction", "prod"]),
        "preproduction" => Some(&["production", "prod"]),
        "production" | "prod" => Some(&[]),
        _ => None,
    }
}

/// Which platform registry a login server belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    Sandbox,
    Nonprod,
    Prod,
}

impl RegistryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryKind::Sandbox => "sandbox",
            RegistryKind::Nonprod => "nonprod",
            RegistryKind::Prod => "prod",
        }
    }

    /// Classify a login server such as `brightcloudprod-0a1b2c3d.azurecr.io`.
    pub fn from_login_server(login_server: &str) -> Result<Option<Self>, ValidationError> {
        static SANDBOX: OnceLock<Result<Regex, String>> = OnceLock::new();
        static NONPROD: OnceLock<Result<Regex, String>> = OnceLock::new();
        static PROD: OnceLock<Result<Regex, String>> = OnceLock::new();

        let kinds = [
            (RegistryKind::Sandbox, compiled_pattern(&SANDBOX, SANDBOX_REGISTRY_PATTERN)?),
            (RegistryKind::Nonprod, compiled_pattern(&NONPROD, NONPROD_REGISTRY_PATTERN)?),
            (RegistryKind::Prod, compiled_pattern(&PROD, PROD_REGISTRY_PATTERN)?),
        ];
        Ok(kinds
            .into_iter()
            .find(|(_, pattern)| pattern.is_match(login_server))
            .map(|(kind, _)| kind))
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One image tag to copy between registries.
///
/// There is a single `image_name`: the image keeps its repository name in
/// the target registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRequest {
    pub source_registry: String,
    pub target_registry: String,
    pub source_environment: String,
    pub target_environment: String,
    pub team_name: String,
    pub image_name: String,
    pub source_tag: String,
    pub target_tag: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub force: bool,
}

/// Validate a promotion request, collecting every violation.
pub fn validate_promotion(request: &PromotionRequest) -> ValidationReport {
    debug!(
        "Validating promotion of {}:{} from {} to {}",
        request.image_name, request.source_tag, request.source_environment, request.target_environment
    );

    let mut report = ValidationReport::new();
    check_team_name(request, &mut report);
    check_image_name(request, &mut report);
    check_environments(request, &mut report);
    check_promotion_path(request, &mut report);
    let kinds = check_registries(request, &mut report);
    check_tags(request, &mut report);
    if let Some((source, target)) = kinds {
        check_cross_boundary(source, target, &mut report);
    }
    report
}

fn name_regex() -> Result<&'static Regex, ValidationError> {
    static PATTERN: OnceLock<Result<Regex, String>> = OnceLock::new();
    compiled_pattern(&PATTERN, NAME_PATTERN)
}

fn tag_regex() -> Result<&'static Regex, ValidationError> {
    static PATTERN: OnceLock<Result<Regex, String>> = OnceLock::new();
    compiled_pattern(&PATTERN, TAG_PATTERN)
}

fn check_team_name(request: &PromotionRequest, report: &mut ValidationReport) {
    let name = &request.team_name;
    if name.is_empty() {
        report.add_error(ValidationError::new(
            "team_name",
            ValidationRule::InvalidTeamName,
            "Team name cannot be empty.",
        ));
        return;
    }

    match name_regex() {
        Ok(pattern) if !pattern.is_match(name) => report.add_error(ValidationError::new(
            "team_name",
            ValidationRule::InvalidTeamName,
            "Team name must contain only lowercase letters, numbers, periods, hyphens, and underscores.",
        )),
        Ok(_) => {}
        Err(e) => report.add_error(ValidationError { field: "team_name".into(), ..e }),
    }

    if name.len() > MAX_TEAM_NAME_LEN {
        report.add_error(ValidationError::new(
            "team_name",
            ValidationRule::InvalidTeamName,
            format!("Team name must be {} characters or less.", MAX_TEAM_NAME_LEN),
        ));
    }
}

fn check_image_name(request: &PromotionRequest, report: &mut ValidationReport) {
    let name = &request.image_name;
    if name.is_empty() {
        report.add_error(ValidationError::new(
            "image_name",
            ValidationRule::InvalidImageName,
            "Image name cannot be empty.",
        ));
        return;
    }

    match name_regex() {
        Ok(pattern) if !pattern.is_match(name) => report.add_error(ValidationError::new(
            "image_name",
            ValidationRule::InvalidImageName,
            "Image name must contain only lowercase letters, numbers, periods, hyphens, and underscores.",
        )),
        Ok(_) => {}
        Err(e) => report.add_error(ValidationError { field: "image_name".into(), ..e }),
    }

    if name.len() > MAX_IMAGE_NAME_LEN {
        report.add_error(ValidationError::new(
            "image_name",
            ValidationRule::InvalidImageName,
            format!("Image name must be {} characters or less.", MAX_IMAGE_NAME_LEN),
        ));
    }
}

fn check_environments(request: &PromotionRequest, report: &mut ValidationReport) {
    for (field, label, env) in [
        ("source_environment", "source", &request.source_environment),
        ("target_environment", "target", &request.target_environment),
    ] {
        if !PROMOTION_ENVIRONMENTS.contains(&env.as_str()) {
            report.add_error(ValidationError::new(
                field,
                ValidationRule::InvalidEnvironment,
                format!(
                    "Invalid {} environment: {}. Must be one of: {}",
                    label,
                    env,
                    PROMOTION_ENVIRONMENTS.join(", ")
                ),
            ));
        }
    }

    if request.source_environment == request.target_environment {
        report.add_error(ValidationError::new(
            "target_environment",
            ValidationRule::InvalidPromotionPath,
            "Source and target environments cannot be the same.",
        ));
    }
}

fn check_promotion_path(request: &PromotionRequest, report: &mut ValidationReport) {
    let source = &request.source_environment;
    let target = &request.target_environment;
    let Some(targets) = allowed_targets(source) else {
        report.add_error(ValidationError::new(
            "source_environment",
            ValidationRule::InvalidPromotionPath,
            format!("Promotion from {} is not allowed.", source),
        ));
        return;
    };

    if !targets.contains(&target.as_str()) {
        let allowed = if targets.is_empty() { "none".to_string() } else { targets.join(", ") };
        report.add_error(ValidationError::new(
            "target_environment",
            ValidationRule::InvalidPromotionPath,
            format!(
                "Invalid promotion path: {} → {}. Allowed targets from {}: {}",
                source, target, source, allowed
            ),
        ));
    }
}

/// Classify both registries. Returns the kinds when both are recognised.
fn check_registries(
    request: &PromotionRequest,
    report: &mut ValidationReport,
) -> Option<(RegistryKind, RegistryKind)> {
    let mut classify = |field: &str, label: &str, login_server: &str| match RegistryKind::from_login_server(login_server) {
        Ok(Some(kind)) => Some(kind),
        Ok(None) => {
            report.add_error(ValidationError::new(
                field,
                ValidationRule::InvalidRegistry,
                format!("Invalid {} registry format: {}", label, login_server),
            ));
            None
        }
        Err(e) => {
            report.add_error(ValidationError { field: field.to_string(), ..e });
            None
        }
    };

    let source = classify("source_registry", "source", &request.source_registry);
    let target = classify("target_registry", "target", &request.target_registry);
    let (source, target) = (source?, target?);

    let source_env = request.source_environment.as_str();
    if NONPROD_ENVIRONMENTS.contains(&source_env) && source != RegistryKind::Nonprod {
        report.add_error(ValidationError::new(
            "source_registry",
            ValidationRule::RegistryEnvironmentMismatch,
            format!("Environment {} must use nonprod registry, not {}", source_env, source),
        ));
    }

    let target_env = request.target_environment.as_str();
    if PROD_ENVIRONMENTS.contains(&target_env) && target != RegistryKind::Prod {
        report.add_error(ValidationError::new(
            "target_registry",
            ValidationRule::RegistryEnvironmentMismatch,
            format!("Environment {} must use prod registry, not {}", target_env, target),
        ));
    }

    Some((source, target))
}

fn check_tags(request: &PromotionRequest, report: &mut ValidationReport) {
    for (field, label, tag) in [
        ("source_tag", "source", &request.source_tag),
        ("target_tag", "target", &request.target_tag),
    ] {
        match tag_regex() {
            Ok(pattern) if !pattern.is_match(tag) => report.add_error(ValidationError::new(
                field,
                ValidationRule::InvalidTag,
                format!("Invalid {} tag format: {}", label, tag),
            )),
            Ok(_) => {}
            Err(e) => report.add_error(ValidationError { field: field.to_string(), ..e }),
        }
    }

    if request.source_tag == LATEST_TAG || request.target_tag == LATEST_TAG {
        report.add_warning(
            "Using \"latest\" tag is discouraged. Consider using specific version tags or git commit SHAs.",
        );
    }

    for (field, label, tag) in [
        ("source_tag", "Source", &request.source_tag),
        ("target_tag", "Target", &request.target_tag),
    ] {
        if tag.len() > MAX_TAG_LEN {
            report.add_error(ValidationError::new(
                field,
                ValidationRule::InvalidTag,
                format!("{} tag must be {} characters or less.", label, MAX_TAG_LEN),
            ));
        }
    }
}

fn check_cross_boundary(source: RegistryKind, target: RegistryKind, report: &mut ValidationReport) {
    use RegistryKind::*;

    if (source, target) == (Nonprod, Prod) {
        return;
    }

    let mut reject = |field: &str, message: &str| {
        report.add_error(ValidationError::new(
            field,
            ValidationRule::CrossBoundaryPromotion,
            message,
        ))
    };

    if source == Sandbox {
        reject(
            "source_registry",
            "Promotion from sandbox registry is not allowed. Sandbox is for experimentation only.",
        );
    }
    if target == Sandbox {
        reject(
            "target_registry",
            "Promotion to sandbox registry is not allowed. Sandbox is for experimentation only.",
        );
    }
    if (source, target) == (Prod, Nonprod) {
        reject(
            "target_registry",
            "Backward promotion from production to non-production is not allowed.",
        );
    }
    if source == target && source != Nonprod {
        reject(
            "target_registry",
            "Same-registry promotion is only allowed within non-production environments.",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONPROD: &str = "brightcloudnonprod-0a1b2c3d.azurecr.io";
    const PROD: &str = "brightcloudprod-4e5f6a7b.azurecr.io";
    const SANDBOX: &str = "brightcloudsandbox-8c9d0e1f.azurecr.io";

    fn request() -> PromotionRequest {
        PromotionRequest {
            source_registry: NONPROD.to_string(),
            target_registry: PROD.to_string(),
            source_environment: "dev".to_string(),
            target_environment: "preproduction".to_string(),
            team_name: "payments".to_string(),
            image_name: "my-service".to_string(),
            source_tag: "v1.0.0".to_string(),
            target_tag: "v1.0.0".to_string(),
            dry_run: false,
            force: false,
        }
    }

    fn messages(report: &ValidationReport) -> Vec<String> {
        report.errors.iter().map(|e| e.message.clone()).collect()
    }

    #[test]
    fn test_registry_kind_from_login_server() {
        assert_eq!(RegistryKind::from_login_server(NONPROD).unwrap(), Some(RegistryKind::Nonprod));
        assert_eq!(RegistryKind::from_login_server(PROD).unwrap(), Some(RegistryKind::Prod));
        assert_eq!(RegistryKind::from_login_server(SANDBOX).unwrap(), Some(RegistryKind::Sandbox));
        assert_eq!(RegistryKind::from_login_server("brightcloudprod-abc123.azurecr.io").unwrap(), None);
        assert_eq!(RegistryKind::from_login_server("invalid-registry.com").unwrap(), None);
    }

    #[test]
    fn test_allowed_targets() {
        assert_eq!(allowed_targets("pr"), Some(&["dev"][..]));
        assert_eq!(allowed_targets("production"), Some(&[][..]));
        assert_eq!(allowed_targets("sandbox"), None);
    }

    #[test]
    fn test_valid_promotion() {
        let report = validate_promotion(&request());
        assert!(report.valid, "{:?}", messages(&report));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_image_name_format() {
        let mut req = request();
        req.image_name = "INVALID-NAME-WITH-CAPS".to_string();
        let report = validate_promotion(&req);
        assert!(!report.valid);
        assert_eq!(report.errors[0].rule, ValidationRule::InvalidImageName);
        assert!(messages(&report).contains(
            &"Image name must contain only lowercase letters, numbers, periods, hyphens, and underscores.".to_string()
        ));
    }

    #[test]
    fn test_empty_image_name() {
        let mut req = request();
        req.image_name = String::new();
        let report = validate_promotion(&req);
        assert!(messages(&report).contains(&"Image name cannot be empty.".to_string()));
    }

    #[test]
    fn test_long_image_name() {
        let mut req = request();
        req.image_name = "a".repeat(130);
        let report = validate_promotion(&req);
        assert!(!report.valid);
        assert!(messages(&report).contains(&"Image name must be 128 characters or less.".to_string()));
    }

    #[test]
    fn test_team_name_rules() {
        let mut req = request();
        req.team_name = String::new();
        assert!(messages(&validate_promotion(&req)).contains(&"Team name cannot be empty.".to_string()));

        req.team_name = "Payments Team".to_string();
        let report = validate_promotion(&req);
        assert_eq!(report.errors[0].field, "team_name");
        assert_eq!(report.errors[0].rule, ValidationRule::InvalidTeamName);
    }

    #[test]
    fn test_valid_promotion_paths() {
        for (from, to) in [
            ("pr", "dev"),
            ("dev", "perf"),
            ("dev", "preproduction"),
            ("perf", "preproduction"),
            ("preproduction", "production"),
        ] {
            let mut req = request();
            req.source_environment = from.to_string();
            req.target_environment = to.to_string();
            let report = validate_promotion(&req);
            assert!(report.valid, "{} -> {}: {:?}", from, to, messages(&report));
        }
    }

    #[test]
    fn test_invalid_promotion_paths() {
        for (from, to) in [
            ("production", "dev"),
            ("production", "preproduction"),
            ("perf", "dev"),
            ("preproduction", "dev"),
        ] {
            let mut req = request();
            req.source_environment = from.to_string();
            req.target_environment = to.to_string();
            let report = validate_promotion(&req);
            assert!(!report.valid, "{} -> {} should be rejected", from, to);
            assert!(report.errors.iter().any(|e| e.rule == ValidationRule::InvalidPromotionPath));
        }
    }

    #[test]
    fn test_same_environment() {
        let mut req = request();
        req.target_registry = NONPROD.to_string();
        req.target_environment = "dev".to_string();
        let report = validate_promotion(&req);
        assert!(messages(&report).contains(&"Source and target environments cannot be the same.".to_string()));
    }

    #[test]
    fn test_unknown_environment() {
        let mut req = request();
        req.source_environment = "staging".to_string();
        let report = validate_promotion(&req);
        let msgs = messages(&report);
        assert!(msgs.iter().any(|m| m.starts_with("Invalid source environment: staging.")));
        assert!(msgs.contains(&"Promotion from staging is not allowed.".to_string()));
    }

    #[test]
    fn test_registry_formats() {
        for registry in [
            "invalid-registry.com",
            "brightcloud-wrong-format.azurecr.io",
            "not-azurecr.io",
        ] {
            let mut req = request();
            req.source_registry = registry.to_string();
            let report = validate_promotion(&req);
            assert!(!report.valid);
            assert!(messages(&report).iter().any(|m| m.contains("Invalid source registry format")));
        }
    }

    #[test]
    fn test_sandbox_promotion_rejected() {
        let mut req = request();
        req.source_registry = SANDBOX.to_string();
        req.target_registry = NONPROD.to_string();
        req.target_environment = "perf".to_string();
        let report = validate_promotion(&req);
        assert!(messages(&report).contains(
            &"Promotion from sandbox registry is not allowed. Sandbox is for experimentation only.".to_string()
        ));
    }

    #[test]
    fn test_backward_promotion_rejected() {
        let mut req = request();
        req.source_registry = PROD.to_string();
        req.target_registry = NONPROD.to_string();
        req.source_environment = "production".to_string();
        req.target_environment = "dev".to_string();
        let report = validate_promotion(&req);
        assert!(messages(&report)
            .contains(&"Backward promotion from production to non-production is not allowed.".to_string()));
    }

    #[test]
    fn test_invalid_tags() {
        for tag in [String::new(), "tag with spaces".to_string(), "tag@invalid".to_string(), "a".repeat(130)] {
            let mut req = request();
            req.source_tag = tag.clone();
            let report = validate_promotion(&req);
            assert!(!report.valid, "tag {:?} should be rejected", tag);
            assert!(report.errors.iter().all(|e| e.field == "source_tag"));
        }
    }

    #[test]
    fn test_latest_tag_warns_only() {
        let mut req = request();
        req.source_tag = "latest".to_string();
        req.target_tag = "latest".to_string();
        let report = validate_promotion(&req);
        assert!(report.valid);
        assert_eq!(
            report.warnings,
            vec!["Using \"latest\" tag is discouraged. Consider using specific version tags or git commit SHAs."]
        );
    }

    #[test]
    fn test_nonprod_environment_needs_nonprod_registry() {
        let mut req = request();
        req.source_registry = PROD.to_string();
        let report = validate_promotion(&req);
        assert!(!report.valid);
        assert!(messages(&report)
            .iter()
            .any(|m| m.contains("Environment dev must use nonprod registry")));
    }

    #[test]
    fn test_prod_environment_needs_prod_registry() {
        let mut req = request();
        req.target_registry = NONPROD.to_string();
        req.source_environment = "perf".to_string();
        req.target_environment = "production".to_string();
        let report = validate_promotion(&req);
        assert!(!report.valid);
        assert!(messages(&report)
            .iter()
            .any(|m| m.contains("Environment production must use prod registry")));
    }

    #[test]
    fn test_deserialize_without_flags() {
        let req: PromotionRequest = serde_json::from_str(
            r#"{"source_registry":"a","target_registry":"b","source_environment":"dev",
                "target_environment":"perf","team_name":"t","image_name":"i",
                "source_tag":"v1","target_tag":"v1"}"#,
        )
        .unwrap();
        assert!(!req.dry_run);
        assert!(!req.force);
    }
}
