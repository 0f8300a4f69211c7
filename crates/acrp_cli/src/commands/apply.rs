//! Apply command - Provision a request with Terraform.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use super::{BackendArgs, RequestArgs};

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    #[command(flatten)]
    pub backend: BackendArgs,

    /// Keep partially created resources when apply fails
    #[arg(long)]
    pub no_cleanup: bool,
}

pub async fn execute(args: ApplyArgs) -> Result<()> {
    let request = args.request.load()?;

    // Invalid requests fail here, before any backend call.
    let plan = request.plan(&args.request.validator())?;

    let mut session = args.backend.session().await?;
    if args.no_cleanup {
        session = session.without_cleanup();
    }

    info!("Applying {}", plan.desired_state.handle);
    let outcome = session
        .apply(&plan.desired_state)
        .await
        .with_context(|| format!("Apply of {} failed", plan.desired_state.handle))?;

    println!("✅ Applied {} in {}ms", outcome.handle, outcome.duration_ms());
    for (name, value) in &outcome.outputs {
        println!("   {} = {}", name, value);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use acrp_core::CoreError;
    use tempfile::tempdir;

    const REQUEST: &str = r#"
registry:
  name: applyacr123
  resource_group: test-rg
  location: East US
  environment: test
teams:
  - name: payments
    principal_id: 11111111-1111-1111-1111-111111111111
    allowed_environments: [dev, pr]
"#;

    fn args_for(request: &Path, module_dir: &Path) -> ApplyArgs {
        ApplyArgs {
            request: RequestArgs {
                request: request.to_path_buf(),
                environments: vec!["test".to_string()],
            },
            backend: BackendArgs {
                module_dir: module_dir.to_path_buf(),
                state_dir: None,
                terraform_bin: "terraform".to_string(),
                dry_run: true,
                max_attempts: 1,
                timeout: 60,
            },
            no_cleanup: false,
        }
    }

    #[tokio::test]
    async fn test_dry_run_apply_writes_var_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("request.yaml");
        std::fs::write(&path, REQUEST).unwrap();

        execute(args_for(&path, dir.path())).await.unwrap();

        let var_file = dir.path().join("applyacr123-test.tfvars.json");
        let vars: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(var_file).unwrap()).unwrap();
        assert_eq!(vars["registry_name"], "applyacr123");
    }

    #[tokio::test]
    async fn test_var_file_goes_to_state_dir() {
        let dir = tempdir().unwrap();
        let state_dir = dir.path().join("state");
        let path = dir.path().join("request.yaml");
        std::fs::write(&path, REQUEST).unwrap();

        let mut args = args_for(&path, dir.path());
        args.backend.state_dir = Some(state_dir.clone());
        execute(args).await.unwrap();

        assert!(state_dir.join("applyacr123-test.tfvars.json").exists());
        assert!(!dir.path().join("applyacr123-test.tfvars.json").exists());
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_backend() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("request.yaml");
        std::fs::write(&path, REQUEST.replace("environment: test", "environment: staging")).unwrap();

        let err = execute(args_for(&path, dir.path())).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::Validation(_))));
        assert!(!dir.path().join("applyacr123-staging.tfvars.json").exists());
    }

    #[tokio::test]
    async fn test_missing_module_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("request.yaml");
        std::fs::write(&path, REQUEST).unwrap();

        let err = execute(args_for(&path, &dir.path().join("missing"))).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Module directory not found"));
    }
}
