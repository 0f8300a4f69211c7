//! Validate command - Report every rule violation in a request.

use anyhow::Result;
use clap::Args;
use tracing::info;

use acrp_core::{CoreError, ValidationReport};

use super::RequestArgs;

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub request: RequestArgs,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    let request = args.request.load()?;
    let validator = args.request.validator();
    info!("Validating registry {}", request.registry.name);

    let mut report = ValidationReport::new();
    report.merge(validator.validate_all(&request.registry));
    report.merge(validator.validate_teams_all(&request.teams));

    let errors = report.errors.clone();
    if let Err(first) = report.into_result() {
        println!("❌ {} violation(s):", errors.len());
        for error in &errors {
            println!("   - [{}] {}: {}", error.rule, error.field, error);
        }
        return Err(CoreError::from(first).into());
    }

    // Rule checks passed; planning surfaces name conflicts and network errors.
    let plan = request.plan(&validator)?;

    println!("✅ Request is valid");
    println!("   Registry:   {} ({})", plan.registry.name, plan.registry.environment);
    println!("   Scope maps: {}", plan.assignments.len());
    if let Some(names) = &plan.private_endpoint {
        println!("   Endpoint:   {}", names.endpoint);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use tempfile::tempdir;

    fn args_for(path: &Path) -> ValidateArgs {
        ValidateArgs {
            request: RequestArgs {
                request: path.to_path_buf(),
                environments: vec!["test".to_string()],
            },
        }
    }

    #[tokio::test]
    async fn test_valid_request() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("request.yaml");
        std::fs::write(
            &path,
            "registry:\n  name: validacr123\n  resource_group: test-rg\n  location: East US\n  environment: test\n",
        )
        .unwrap();

        assert!(execute(args_for(&path)).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_request_reports_first_violation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("request.yaml");
        std::fs::write(
            &path,
            "registry:\n  name: acr\n  resource_group: test-rg\n  location: East US\n  environment: invalid-env\n",
        )
        .unwrap();

        let err = execute(args_for(&path)).await.unwrap_err();
        match err.downcast_ref::<CoreError>() {
            Some(CoreError::Validation(e)) => assert!(e.message.contains("Registry name must be 5-50 characters")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_overlapping_teams_conflict() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("request.toml");
        std::fs::write(
            &path,
            r#"
[registry]
name = "validacr123"
resource_group = "test-rg"
location = "East US"
environment = "test"

[[teams]]
name = "test-team"
principal_id = "11111111-1111-1111-1111-111111111111"
allowed_environments = ["pr", "dev"]

[[teams]]
name = "prod-team"
principal_id = "22222222-2222-2222-2222-222222222222"
allowed_environments = ["pr", "dev", "production"]
"#,
        )
        .unwrap();

        let err = execute(args_for(&path)).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::NameConflict(_))));
    }
}
