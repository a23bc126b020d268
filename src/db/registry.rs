//! Environment resolution.
//!
//! Maps a requested environment name (or the configured default) to a
//! canonical [`Environment`] that has a connection descriptor. Static after
//! startup; resolution never touches the network or the pools.

use std::collections::BTreeMap;

use crate::config::DescriptorSet;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionDescriptor, Environment};

/// Placeholder reported when a call omits the environment and no default exists.
const DEFAULT_PLACEHOLDER: &str = "<default>";

#[derive(Debug, Clone)]
pub struct EnvironmentRegistry {
    descriptors: BTreeMap<Environment, ConnectionDescriptor>,
    default: Option<Environment>,
}

impl EnvironmentRegistry {
    /// Build a registry with an explicit default.
    ///
    /// Fails if the default has no descriptor.
    pub fn new(
        descriptors: impl IntoIterator<Item = ConnectionDescriptor>,
        default: Option<Environment>,
    ) -> Result<Self, String> {
        let descriptors: BTreeMap<_, _> = descriptors
            .into_iter()
            .map(|d| (d.environment, d))
            .collect();

        if let Some(env) = default {
            if !descriptors.contains_key(&env) {
                return Err(format!(
                    "default environment '{}' has no connection string; set {}{}",
                    env,
                    crate::config::DATABASE_URL_PREFIX,
                    env.as_str().to_ascii_uppercase()
                ));
            }
        }

        Ok(Self {
            descriptors,
            default,
        })
    }

    /// Build a registry from collected connection strings.
    ///
    /// Default environment, in order: the configured selector; `local` when it
    /// came from an unqualified connection string; the only configured
    /// environment; otherwise none.
    pub fn from_descriptor_set(
        set: DescriptorSet,
        selector: Option<Environment>,
    ) -> Result<Self, String> {
        let default = selector.or_else(|| {
            if set.unqualified_local {
                Some(Environment::Local)
            } else if set.descriptors.len() == 1 {
                set.descriptors.keys().next().copied()
            } else {
                None
            }
        });
        Self::new(set.descriptors.into_values(), default)
    }

    /// Resolve a requested environment name to a configured canonical key.
    ///
    /// A missing or blank name selects the default environment.
    pub fn resolve(&self, requested: Option<&str>) -> DbResult<Environment> {
        let requested = requested.map(str::trim).filter(|s| !s.is_empty());

        let env = match requested {
            Some(name) => Environment::from_alias(name)
                .ok_or_else(|| DbError::unknown_environment(name, self.available()))?,
            None => self
                .default
                .ok_or_else(|| DbError::unknown_environment(DEFAULT_PLACEHOLDER, self.available()))?,
        };

        if self.descriptors.contains_key(&env) {
            Ok(env)
        } else {
            Err(DbError::unknown_environment(
                requested.unwrap_or(env.as_str()),
                self.available(),
            ))
        }
    }

    pub fn descriptor(&self, env: Environment) -> Option<&ConnectionDescriptor> {
        self.descriptors.get(&env)
    }

    /// Configured environments in canonical order.
    pub fn environments(&self) -> Vec<Environment> {
        self.descriptors.keys().copied().collect()
    }

    pub fn default_environment(&self) -> Option<Environment> {
        self.default
    }

    fn available(&self) -> Vec<String> {
        self.descriptors.keys().map(|e| e.to_string()).collect()
    }
}
