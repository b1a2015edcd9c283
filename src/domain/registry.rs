//! Environment registry
//!
//! Ordered collection of environments. The order is the promotion chain and
//! never changes at runtime: entries can be added at the tail or removed,
//! but never moved.

use crate::domain::environment::{Environment, EnvironmentUpdate};

#[derive(Debug, Clone, Default)]
pub struct EnvironmentRegistry {
    environments: Vec<Environment>,
}

impl EnvironmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from environments in chain order. Later duplicates
    /// of a name are ignored.
    pub fn from_environments(environments: impl IntoIterator<Item = Environment>) -> Self {
        let mut registry = Self::new();
        for env in environments {
            registry.add(env);
        }
        registry
    }

    /// All environments in chain order
    pub fn list(&self) -> &[Environment] {
        &self.environments
    }

    pub fn get(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|env| env.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Environment> {
        self.environments.iter_mut().find(|env| env.name == name)
    }

    /// Chain position of an environment
    pub fn position(&self, name: &str) -> Option<usize> {
        self.environments.iter().position(|env| env.name == name)
    }

    /// Merge `update` into the named environment, appending a new one at
    /// the tail when the name is unknown.
    ///
    /// A malformed `owner/repo` leaves the parsed repository unset; callers
    /// check `Environment::has_repository` before using it.
    pub fn upsert(&mut self, name: &str, update: EnvironmentUpdate) {
        match self.get_mut(name) {
            Some(env) => update.apply_to(env),
            None => {
                let mut env = Environment::new(name);
                update.apply_to(&mut env);
                self.environments.push(env);
            }
        }
    }

    /// Insert at the tail. No-op when the name already exists.
    pub fn add(&mut self, env: Environment) -> bool {
        if self.get(&env.name).is_some() {
            return false;
        }
        self.environments.push(env);
        true
    }

    /// Remove by name, returning the removed environment
    pub fn remove(&mut self, name: &str) -> Option<Environment> {
        let index = self.position(name)?;
        Some(self.environments.remove(index))
    }

    /// Disjoint mutable access for per-environment fan-out
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Environment> {
        self.environments.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}
