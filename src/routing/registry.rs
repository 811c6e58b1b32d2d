//! Service lookup by path.
//!
//! # Responsibilities
//! - Store services under unique names, in registration order
//! - Resolve a request path to the first service claiming it
//!
//! # Design Decisions
//! - Built during startup, then frozen behind an `Arc` (lock-free lookups)
//! - O(n) claim scan (acceptable for a handful of services)
//! - First claim wins; explicit `None` rather than a silent default

use std::sync::Arc;

use thiserror::Error;

use crate::routing::service::Service;

/// Error type for registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A service with this name is already registered.
    #[error("service '{0}' is already registered")]
    Duplicate(String),
}

/// A registered service and its name.
pub struct ServiceEntry {
    name: String,
    service: Arc<dyn Service>,
}

impl ServiceEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self) -> &Arc<dyn Service> {
        &self.service
    }
}

impl std::fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEntry").field("name", &self.name).finish()
    }
}

/// Ordered set of services keyed by unique name.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    entries: Vec<ServiceEntry>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under a unique name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        service: Arc<dyn Service>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(RegistryError::Duplicate(name));
        }
        tracing::debug!(service = %name, "Service registered");
        self.entries.push(ServiceEntry { name, service });
        Ok(())
    }

    /// Fetch a service by its registered name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Service>> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.service)
    }

    /// Find the first service, in registration order, claiming `path`.
    ///
    /// A single leading `/` is stripped before services are asked.
    pub fn lookup(&self, path: &str) -> Option<&ServiceEntry> {
        let path = path.strip_prefix('/').unwrap_or(path);
        self.entries.iter().find(|e| e.service.claims(path))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
