//! CLI command definitions.
//!
//! Every command takes a request file (YAML or TOML) describing one
//! registry, its teams and an optional private endpoint binding.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use acrp_backend::{ProvisioningSession, RetryPolicy, RetryingBackend, TerraformBackend, TerraformOptions};
use acrp_core::{EnvironmentSet, ProvisioningRequest, RegistryValidator};

pub mod apply;
pub mod destroy;
pub mod plan;
pub mod validate;

/// acrp - Azure Container Registry provisioning
#[derive(Parser)]
#[command(name = "acrp")]
#[command(version, about = "Validate, plan and provision Azure Container Registries")]
#[command(long_about = r#"
acrp validates registry requests, derives per-team scope maps and tokens,
and applies the result with Terraform.

COMMANDS:
  validate  → Report every rule violation in a request file
  plan      → Print derived names (or the full desired state with --json)
  apply     → Provision the request with Terraform
  destroy   → Remove everything a request provisioned

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  5 - IaC error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a request file
    Validate(validate::ValidateArgs),

    /// Show what a request would provision
    Plan(plan::PlanArgs),

    /// Provision a request
    Apply(apply::ApplyArgs),

    /// Remove a provisioned request
    Destroy(destroy::DestroyArgs),
}

/// Request file and environment options shared by every command.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Request file (.yaml, .yml or .toml)
    pub request: PathBuf,

    /// Additional environment tags to accept (repeatable)
    #[arg(short, long = "environment", value_name = "TAG")]
    pub environments: Vec<String>,
}

impl RequestArgs {
    pub fn load(&self) -> Result<ProvisioningRequest> {
        debug!("Loading request from {:?}", self.request);
        if !self.request.exists() {
            anyhow::bail!("Request file not found: {}", self.request.display());
        }
        Ok(ProvisioningRequest::from_file(&self.request)?)
    }

    pub fn validator(&self) -> RegistryValidator {
        let environments = self
            .environments
            .iter()
            .fold(EnvironmentSet::default(), |set, env| set.with(env.as_str()));
        RegistryValidator::new(environments)
    }
}

/// Terraform backend options shared by apply and destroy.
#[derive(Args, Debug)]
pub struct BackendArgs {
    /// Terraform module directory
    #[arg(long, env = "ACRP_MODULE_DIR", default_value = ".")]
    pub module_dir: PathBuf,

    /// Directory for per-request var and state files (defaults to the module directory)
    #[arg(long, env = "ACRP_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Terraform executable
    #[arg(long, env = "ACRP_TERRAFORM_BIN", default_value = "terraform")]
    pub terraform_bin: String,

    /// Print terraform commands without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Attempts per backend call for transient failures
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    /// Per-command timeout in seconds
    #[arg(long, default_value_t = 1800)]
    pub timeout: u64,
}

impl BackendArgs {
    pub fn terraform_options(&self) -> TerraformOptions {
        let mut options = TerraformOptions::new(&self.module_dir)
            .binary(&self.terraform_bin)
            .timeout(self.timeout);
        if let Some(dir) = &self.state_dir {
            options = options.state_dir(dir);
        }
        if self.dry_run {
            options = options.dry_run();
        }
        options
    }

    /// Build a session over a retrying Terraform backend.
    pub async fn session(&self) -> Result<ProvisioningSession> {
        let terraform = TerraformBackend::new(self.terraform_options());
        if !self.dry_run && !terraform.is_available().await {
            anyhow::bail!("Terraform binary not found: {}", self.terraform_bin);
        }
        if !self.module_dir.is_dir() {
            return Err(anyhow::anyhow!("Module directory not found: {}", self.module_dir.display()))
                .context("Invalid --module-dir argument");
        }

        let policy = RetryPolicy::default().with_max_attempts(self.max_attempts);
        Ok(ProvisioningSession::new(Arc::new(RetryingBackend::new(terraform, policy))))
    }
}
