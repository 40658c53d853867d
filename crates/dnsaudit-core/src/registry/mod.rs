//! Plugin-based backend registry
//!
//! Backends are registered by type name at startup and built from
//! [`BackendConfig`] at run time, so the runner never matches on concrete
//! backend types.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dnsaudit_core::registry::BackendRegistry;
//! use dnsaudit_core::config::BackendConfig;
//!
//! let registry = BackendRegistry::new();
//! dnsaudit_core::backend::register_builtin(&registry);
//!
//! let backends = registry.create_backends(&BackendConfig::Memory).await?;
//! ```
//!
//! ## Custom backends
//!
//! A crate wiring in a real cloud account registers its own factory and is
//! selected with `BackendConfig::Custom { factory: "<name>", .. }`:
//!
//! ```rust,ignore
//! registry.register_backend("aws", Box::new(AwsBackendFactory));
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::traits::{ComputeInventory, EvaluationStore, ZoneDirectory};

/// The three collaborators one run needs
///
/// A single implementation often provides all three (see [`Backends::shared`]),
/// but they can also come from different places.
#[derive(Clone)]
pub struct Backends {
    pub zones: Arc<dyn ZoneDirectory>,
    pub inventory: Arc<dyn ComputeInventory>,
    pub store: Arc<dyn EvaluationStore>,
}

impl Backends {
    /// Use one value as all three collaborators
    pub fn shared<T>(backend: T) -> Self
    where
        T: ZoneDirectory + ComputeInventory + EvaluationStore + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            zones: backend.clone(),
            inventory: backend.clone(),
            store: backend,
        }
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("zones", &self.zones.directory_name())
            .finish_non_exhaustive()
    }
}

/// Factory trait for building backends from configuration
///
/// Creation is async: a backend may need to read files or resolve
/// credentials before it can serve requests.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn create(&self, config: &BackendConfig) -> Result<Backends>;
}

/// Registry of backend factories, keyed by backend type name
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct BackendRegistry {
    backends: RwLock<HashMap<String, Arc<dyn BackendFactory>>>,
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend factory
    ///
    /// A later registration under the same name replaces the earlier one.
    pub fn register_backend(&self, name: impl Into<String>, factory: Box<dyn BackendFactory>) {
        let mut backends = self.backends.write().unwrap_or_else(|e| e.into_inner());
        backends.insert(name.into(), Arc::from(factory));
    }

    /// Build the backends described by `config`
    ///
    /// # Errors
    ///
    /// - `Error::Config` if no factory is registered for the backend type
    /// - whatever the factory returns
    pub async fn create_backends(&self, config: &BackendConfig) -> Result<Backends> {
        let backend_type = config.type_name();

        let factory = {
            let backends = self.backends.read().unwrap_or_else(|e| e.into_inner());
            backends
                .get(backend_type)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown backend type: {}", backend_type)))?
        };

        factory.create(config).await
    }

    /// List all registered backend types, sorted
    pub fn list_backends(&self) -> Vec<String> {
        let backends = self.backends.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a backend type is registered
    pub fn has_backend(&self, name: &str) -> bool {
        let backends = self.backends.read().unwrap_or_else(|e| e.into_inner());
        backends.contains_key(name)
    }
}
