//! Source environment resolution
//!
//! A target environment is promoted from its nearest predecessor in the
//! chain that has a repository. Intermediate environments that were never
//! provisioned are skipped.

use crate::domain::environment::Environment;
use crate::domain::registry::EnvironmentRegistry;

pub struct SourceResolver<'a> {
    registry: &'a EnvironmentRegistry,
}

impl<'a> SourceResolver<'a> {
    pub fn new(registry: &'a EnvironmentRegistry) -> Self {
        Self { registry }
    }

    /// Nearest configured predecessor of `target`. `None` for the first
    /// environment, unknown names, or when no predecessor has a repository.
    pub fn resolve(&self, target: &str) -> Option<&'a Environment> {
        let registry: &'a EnvironmentRegistry = self.registry;
        let position = registry.position(target)?;

        registry.list()[..position]
            .iter()
            .rev()
            .find(|env| env.has_repository())
    }
}
