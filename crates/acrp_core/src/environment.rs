//! Deployment environment tags.

use serde::{Deserialize, Serialize};

/// Environment tags accepted when no explicit set is configured.
pub const DEFAULT_ENVIRONMENTS: &[&str] = &[
    "sandbox",
    "pr",
    "dev",
    "perf",
    "nonprod",
    "preproduction",
    "production",
];

/// The declared set of allowed environment tags, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentSet {
    environments: Vec<String>,
}

impl Default for EnvironmentSet {
    fn default() -> Self {
        Self::new(DEFAULT_ENVIRONMENTS.iter().copied())
    }
}

impl EnvironmentSet {
    /// Build a set from tags; duplicates keep their first position.
    pub fn new<I, S>(environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self {
            environments: Vec::new(),
        };
        for env in environments {
            set = set.with(env);
        }
        set
    }

    /// Add a tag to the set.
    pub fn with(mut self, env: impl Into<String>) -> Self {
        let env = env.into();
        if !self.environments.contains(&env) {
            self.environments.push(env);
        }
        self
    }

    pub fn contains(&self, env: &str) -> bool {
        self.environments.iter().any(|e| e == env)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.environments.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }

    /// Comma-separated listing used in error messages.
    pub fn describe(&self) -> String {
        self.environments.join(", ")
    }
}
