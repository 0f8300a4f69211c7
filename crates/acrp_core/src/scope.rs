//! Scope-map and token name derivation.
//!
//! Every (team, allowed environment) pair expands to one scope map and one
//! token named `{registry}-{environment}-{env_tag}-scope` / `-token`. The
//! expansion is pure: identical input yields identical output, in team
//! order then allowed-environment order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NameConflictError, ValidationError, ValidationRule};
use crate::models::Team;

/// Upper bound on scope-map and token names accepted by the registry.
pub const MAX_DERIVED_NAME_LEN: usize = 50;

/// What to do when two pairs derive the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedEnvironmentPolicy {
    /// Fail with a [`NameConflictError`].
    #[default]
    Reject,
    /// Merge colliding pairs into one resource shared by all claimants.
    Share,
}

/// One derived scope map and token for a (team, environment) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeResource {
    pub team: String,
    pub environment_tag: String,
    pub scope_map_name: String,
    pub token_name: String,
    /// Repository actions granted by the scope map.
    pub actions: Vec<String>,
}

impl ScopeResource {
    pub fn names(&self) -> (&str, &str) {
        (&self.scope_map_name, &self.token_name)
    }

    /// `team/env_tag`, used to identify claimants in conflicts.
    pub fn claimant(&self) -> String {
        format!("{}/{}", self.team, self.environment_tag)
    }
}

/// A scope map and token after the shared-environment policy is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeAssignment {
    pub scope_map_name: String,
    pub token_name: String,
    pub environment_tag: String,
    /// Teams that claimed this name, first claimant first.
    pub teams: Vec<String>,
    pub actions: Vec<String>,
}

pub fn scope_map_name(registry_name: &str, environment: &str, env_tag: &str) -> String {
    format!("{}-{}-{}-scope", registry_name, environment, env_tag)
}

pub fn token_name(registry_name: &str, environment: &str, env_tag: &str) -> String {
    format!("{}-{}-{}-token", registry_name, environment, env_tag)
}

/// Repository actions scoping a team to its own namespace.
pub fn repository_actions(team: &str) -> Vec<String> {
    ["content/read", "content/write", "metadata/read"]
        .iter()
        .map(|action| format!("repositories/{}/*/{}", team, action))
        .collect()
}

/// Expand teams into one scope map and token per allowed environment.
///
/// An empty team list yields an empty result. Collisions are not checked
/// here; see [`detect_name_conflicts`] and [`resolve_scope_resources`].
pub fn derive_scope_resources(registry_name: &str, environment: &str, teams: &[Team]) -> Vec<ScopeResource> {
    let resources: Vec<ScopeResource> = teams
        .iter()
        .flat_map(|team| {
            team.allowed_environments.iter().map(move |env_tag| ScopeResource {
                team: team.name.clone(),
                environment_tag: env_tag.clone(),
                scope_map_name: scope_map_name(registry_name, environment, env_tag),
                token_name: token_name(registry_name, environment, env_tag),
                actions: repository_actions(&team.name),
            })
        })
        .collect();

    debug!(
        "Derived {} scope resources for {} teams on {}",
        resources.len(),
        teams.len(),
        registry_name
    );
    resources
}

pub fn scope_map_names(resources: &[ScopeResource]) -> Vec<String> {
    resources.iter().map(|r| r.scope_map_name.clone()).collect()
}

pub fn token_names(resources: &[ScopeResource]) -> Vec<String> {
    resources.iter().map(|r| r.token_name.clone()).collect()
}

/// Report the first derived name claimed by two pairs.
///
/// Token names share the scope-map template, so they collide exactly when
/// scope-map names do.
pub fn detect_name_conflicts(resources: &[ScopeResource]) -> Result<(), NameConflictError> {
    let mut claimed: HashMap<&str, &ScopeResource> = HashMap::new();
    for resource in resources {
        if let Some(first) = claimed.insert(&resource.scope_map_name, resource) {
            return Err(NameConflictError {
                name: resource.scope_map_name.clone(),
                name_a: first.claimant(),
                name_b: resource.claimant(),
            });
        }
    }
    Ok(())
}

/// Apply the shared-environment policy to derived resources.
pub fn resolve_scope_resources(
    resources: Vec<ScopeResource>,
    policy: SharedEnvironmentPolicy,
) -> Result<Vec<ScopeAssignment>, NameConflictError> {
    if policy == SharedEnvironmentPolicy::Reject {
        detect_name_conflicts(&resources)?;
    }

    let mut assignments: Vec<ScopeAssignment> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for resource in resources {
        match index.get(&resource.scope_map_name).copied() {
            Some(i) => {
                let shared = &mut assignments[i];
                if !shared.teams.contains(&resource.team) {
                    shared.teams.push(resource.team);
                }
                for action in resource.actions {
                    if !shared.actions.contains(&action) {
                        shared.actions.push(action);
                    }
                }
            }
            None => {
                index.insert(resource.scope_map_name.clone(), assignments.len());
                assignments.push(ScopeAssignment {
                    scope_map_name: resource.scope_map_name,
                    token_name: resource.token_name,
                    environment_tag: resource.environment_tag,
                    teams: vec![resource.team],
                    actions: resource.actions,
                });
            }
        }
    }

    Ok(assignments)
}

/// Check derived names fit the registry's name length limit.
pub fn check_derived_name_lengths(assignments: &[ScopeAssignment]) -> Result<(), ValidationError> {
    for assignment in assignments {
        for name in [&assignment.scope_map_name, &assignment.token_name] {
            if name.len() > MAX_DERIVED_NAME_LEN {
                return Err(ValidationError::new(
                    "teams",
                    ValidationRule::DerivedNameTooLong,
                    format!(
                        "Derived name '{}' exceeds {} characters; shorten the registry name or environment",
                        name, MAX_DERIVED_NAME_LEN
                    ),
                ));
            }
        }
    }
    Ok(())
}
