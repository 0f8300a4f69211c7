//! # acrp_backend
//!
//! Provisioning backends for the ACR platform.
//!
//! The core crate produces a [`acrp_core::DesiredState`]; a
//! [`ProvisioningBackend`] turns it into real resources and removes them
//! again. Backends provided:
//!
//! - [`TerraformBackend`]: runs the `terraform` CLI against a module directory
//! - [`MockBackend`]: in-memory, for tests
//! - [`RetryingBackend`]: wraps another backend and retries transient failures
//!
//! [`ProvisioningSession`] pairs apply with a best-effort destroy when an
//! apply fails part way.

pub mod backend;
pub mod error;
pub mod mock;
pub mod retry;
pub mod session;
pub mod terraform;

pub use backend::{ApplyOutcome, ProvisioningBackend};
pub use error::{is_transient_output, BackendError, BackendResult};
pub use mock::{CapturedCall, MockBackend};
pub use retry::{with_retry, RetryPolicy, RetryingBackend};
pub use session::{unique_id, ProvisioningSession};
pub use terraform::{TerraformBackend, TerraformOptions, TerraformResult};
