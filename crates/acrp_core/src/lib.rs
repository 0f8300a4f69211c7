//! # acrp_core
//!
//! Request validation and resource name derivation for the ACR platform.
//!
//! This crate is pure: it never talks to a cloud API. A request is
//! validated against ordered rules, the team/environment matrix is expanded
//! into scope maps and tokens, and the result is packaged as a
//! [`DesiredState`] for a provisioning backend.
//!
//! ## Example
//!
//! ```rust
//! use acrp_core::{ProvisioningRequest, RegistryConfig, RegistryValidator, Team};
//!
//! let request = ProvisioningRequest::new(
//!     RegistryConfig::new("myregistry01", "my-rg", "East US").with_environment("sandbox"),
//! )
//! .with_team(Team::new(
//!     "payments",
//!     "11111111-1111-1111-1111-111111111111",
//!     ["sandbox"],
//! ));
//!
//! let plan = request.plan(&RegistryValidator::default()).unwrap();
//! assert_eq!(plan.scope_map_names(), vec!["myregistry01-sandbox-sandbox-scope"]);
//! ```

pub mod environment;
pub mod error;
pub mod models;
pub mod network;
pub mod promotion;
pub mod request;
pub mod scope;
pub mod state;
pub mod validator;

pub use environment::{EnvironmentSet, DEFAULT_ENVIRONMENTS};
pub use error::{CoreError, CoreResult, NameConflictError, ValidationError, ValidationRule};
pub use models::{NetworkBinding, NetworkRuleBypass, RegistryConfig, Sku, Team};
pub use network::{PrivateEndpointNames, ResourceId};
pub use promotion::{validate_promotion, PromotionRequest, RegistryKind};
pub use request::{ProvisioningPlan, ProvisioningRequest};
pub use scope::{
    derive_scope_resources, detect_name_conflicts, resolve_scope_resources, ScopeAssignment, ScopeResource,
    SharedEnvironmentPolicy,
};
pub use state::{DesiredState, StateHandle};
pub use validator::{validate, RegistryValidator, ValidationReport};
