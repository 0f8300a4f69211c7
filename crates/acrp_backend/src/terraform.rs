//! Terraform CLI backend.
//!
//! Each state handle gets its own var file, local state file and Terraform
//! data directory (`TF_DATA_DIR`) inside the state directory, so independent
//! requests never share state or provider/lock files.
//!
//! `-state` only applies to the local backend. A module configured with a
//! remote backend ignores it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use acrp_core::{DesiredState, StateHandle};

use crate::backend::{ApplyOutcome, ProvisioningBackend};
use crate::error::{BackendError, BackendResult};

/// Result of one Terraform invocation.
#[derive(Debug)]
pub struct TerraformResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl TerraformResult {
    /// Combined output (stdout + stderr).
    pub fn combined_output(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Terraform backend options.
#[derive(Debug, Clone)]
pub struct TerraformOptions {
    /// Terraform executable.
    pub binary: String,
    /// Module to apply.
    pub module_dir: PathBuf,
    /// Where var and state files live (defaults to `module_dir`).
    pub state_dir: Option<PathBuf>,
    /// Per-command timeout in seconds.
    pub timeout_secs: u64,
    /// Log commands without executing them.
    pub dry_run: bool,
}

impl TerraformOptions {
    pub fn new(module_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: "terraform".to_string(),
            module_dir: module_dir.into(),
            state_dir: None,
            timeout_secs: 1800,
            dry_run: false,
        }
    }

    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// One entry of `terraform output -json`.
#[derive(Debug, Deserialize)]
struct OutputEntry {
    #[serde(default)]
    sensitive: bool,
    value: serde_json::Value,
}

/// Backend that runs the `terraform` CLI against a module directory.
pub struct TerraformBackend {
    options: TerraformOptions,
}

impl TerraformBackend {
    pub fn new(options: TerraformOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TerraformOptions {
        &self.options
    }

    /// Check the terraform executable responds.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.options.binary)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn state_dir(&self) -> &Path {
        self.options.state_dir.as_deref().unwrap_or(&self.options.module_dir)
    }

    pub fn var_file_path(&self, handle: &StateHandle) -> PathBuf {
        self.state_dir().join(format!("{}.tfvars.json", handle))
    }

    pub fn state_file_path(&self, handle: &StateHandle) -> PathBuf {
        self.state_dir().join(format!("{}.tfstate", handle))
    }

    /// `TF_DATA_DIR` for `handle`: installed providers, modules and backend config.
    pub fn data_dir_path(&self, handle: &StateHandle) -> PathBuf {
        self.state_dir().join(format!(".terraform-{}", handle))
    }

    /// Remove everything kept on disk for `handle`. Missing files are fine.
    pub fn remove_handle_files(&self, handle: &StateHandle) {
        let files = [
            self.var_file_path(handle),
            self.state_file_path(handle),
            self.state_dir().join(format!("{}.tfstate.backup", handle)),
        ];
        for path in files.iter().filter(|p| p.exists()) {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Could not remove {}: {}", path.display(), e);
            }
        }

        let data_dir = self.data_dir_path(handle);
        if data_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&data_dir) {
                warn!("Could not remove {}: {}", data_dir.display(), e);
            }
        }
    }

    /// Write the desired state as a var file and return its path.
    pub fn write_var_file(&self, state: &DesiredState) -> BackendResult<PathBuf> {
        std::fs::create_dir_all(self.state_dir())?;
        let path = self.var_file_path(&state.handle);
        std::fs::write(&path, state.to_tfvars_json()?)?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    pub fn init_args(&self) -> Vec<String> {
        vec!["init".to_string(), "-input=false".to_string(), "-no-color".to_string()]
    }

    pub fn apply_args(&self, handle: &StateHandle) -> Vec<String> {
        self.mutating_args("apply", handle)
    }

    pub fn destroy_args(&self, handle: &StateHandle) -> Vec<String> {
        self.mutating_args("destroy", handle)
    }

    pub fn output_args(&self, handle: &StateHandle) -> Vec<String> {
        vec![
            "output".to_string(),
            "-json".to_string(),
            format!("-state={}", self.state_file_path(handle).display()),
        ]
    }

    fn mutating_args(&self, command: &str, handle: &StateHandle) -> Vec<String> {
        vec![
            command.to_string(),
            "-auto-approve".to_string(),
            "-input=false".to_string(),
            "-no-color".to_string(),
            format!("-var-file={}", self.var_file_path(handle).display()),
            format!("-state={}", self.state_file_path(handle).display()),
        ]
    }

    /// Decode `terraform output -json`. Sensitive outputs are skipped;
    /// non-string values are JSON-encoded.
    pub fn parse_outputs(raw: &str) -> BackendResult<BTreeMap<String, String>> {
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let entries: BTreeMap<String, OutputEntry> = serde_json::from_str(raw)?;
        let mut outputs = BTreeMap::new();
        for (name, entry) in entries {
            if entry.sensitive {
                debug!("Skipping sensitive output {}", name);
                continue;
            }
            let value = match entry.value {
                serde_json::Value::String(s) => s,
                other => serde_json::to_string(&other)?,
            };
            outputs.insert(name, value);
        }
        Ok(outputs)
    }

    /// Terraform command for `handle`, run in the module directory.
    fn command(&self, handle: &StateHandle, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.options.binary);
        cmd.args(args)
            .current_dir(&self.options.module_dir)
            .env("TF_DATA_DIR", self.data_dir_path(handle))
            .env("TF_IN_AUTOMATION", "1")
            .env("TF_INPUT", "0")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, handle: &StateHandle, args: &[String]) -> BackendResult<TerraformResult> {
        let command_line = format!(
            "TF_DATA_DIR={} {} {}",
            self.data_dir_path(handle).display(),
            self.options.binary,
            args.join(" ")
        );
        if self.options.dry_run {
            info!("[dry-run] {}", command_line);
            return Ok(TerraformResult {
                success: true,
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
            });
        }

        debug!("Executing: {}", command_line);

        let child = self.command(handle, args).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BackendError::NotAvailable(format!("{} not found", self.options.binary))
            } else {
                BackendError::Io(e)
            }
        })?;

        let timeout = Duration::from_secs(self.options.timeout_secs);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(BackendError::Transient(format!(
                    "{} timed out after {} seconds",
                    command_line, self.options.timeout_secs
                )))
            }
        };

        Ok(TerraformResult {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn run_checked(
        &self,
        operation: &str,
        handle: &StateHandle,
        args: &[String],
    ) -> BackendResult<TerraformResult> {
        let result = self.run(handle, args).await?;
        if !result.success {
            return Err(BackendError::from_output(operation, &result.combined_output()));
        }
        Ok(result)
    }

    /// `terraform init` into the data directory of `handle`.
    pub async fn init(&self, handle: &StateHandle) -> BackendResult<TerraformResult> {
        std::fs::create_dir_all(self.state_dir())?;
        info!("Running terraform init in {:?} for {}", self.options.module_dir, handle);
        self.run_checked("terraform init", handle, &self.init_args()).await
    }
}

#[async_trait]
impl ProvisioningBackend for TerraformBackend {
    async fn apply(&self, state: &DesiredState) -> BackendResult<ApplyOutcome> {
        let started_at = Utc::now();
        info!("Applying {} with terraform", state.handle);

        let handle = &state.handle;
        self.init(handle).await?;
        self.write_var_file(state)?;
        self.run_checked("terraform apply", handle, &self.apply_args(handle)).await?;
        let output = self
            .run_checked("terraform output", handle, &self.output_args(handle))
            .await?;

        let outputs = Self::parse_outputs(&output.stdout)?;
        info!("Applied {} ({} outputs)", state.handle, outputs.len());

        Ok(ApplyOutcome {
            handle: state.handle.clone(),
            outputs,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn destroy(&self, handle: &StateHandle) -> BackendResult<()> {
        let var_file = self.var_file_path(handle);
        if !self.options.dry_run && !var_file.exists() {
            return Err(BackendError::UnknownHandle(handle.to_string()));
        }

        info!("Destroying {} with terraform", handle);
        self.init(handle).await?;
        self.run_checked("terraform destroy", handle, &self.destroy_args(handle)).await?;

        if !self.options.dry_run {
            self.remove_handle_files(handle);
        }
        Ok(())
    }
}
