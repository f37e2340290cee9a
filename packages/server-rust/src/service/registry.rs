use std::any::TypeId;
use std::sync::Arc;

use actionwire_core::HandlerAddress;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;

use super::operation::ConfigurationError;
use crate::traits::Endpoint;

// ---------------------------------------------------------------------------
// EndpointEntry
// ---------------------------------------------------------------------------

/// A registered endpoint together with the concrete type it was registered as.
#[derive(Clone)]
pub struct EndpointEntry {
    pub name: String,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub endpoint: Arc<dyn Endpoint>,
}

impl std::fmt::Debug for EndpointEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointEntry")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EndpointRegistry
// ---------------------------------------------------------------------------

/// Registry of service endpoints, the handler container discovery scans.
///
/// Provides two lookup mechanisms:
/// - **By name** (`get_by_name`): the name the endpoint was registered under
/// - **By address** (`resolve`): name plus expected concrete type, used at invocation
///
/// One endpoint type may be registered under several names. Enumeration
/// (`names`) follows registration order so discovery is deterministic.
pub struct EndpointRegistry {
    /// Name-based lookup: endpoint name -> entry.
    by_name: DashMap<String, EndpointEntry>,
    /// Registration order for deterministic discovery.
    order: RwLock<Vec<String>>,
}

impl EndpointRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_name: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Register an endpoint under `name`. The endpoint becomes accessible via
    /// `get_by_name()` and `resolve()`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DuplicateEndpoint` if `name` is taken.
    pub fn register<T: Endpoint>(
        &self,
        name: impl Into<String>,
        endpoint: T,
    ) -> Result<(), ConfigurationError> {
        match self.by_name.entry(name.into()) {
            Entry::Occupied(occupied) => Err(ConfigurationError::DuplicateEndpoint {
                name: occupied.key().clone(),
            }),
            Entry::Vacant(vacant) => {
                let name = vacant.key().clone();
                let _slot = vacant.insert(EndpointEntry {
                    name: name.clone(),
                    type_id: TypeId::of::<T>(),
                    type_name: std::any::type_name::<T>(),
                    endpoint: Arc::new(endpoint),
                });
                // The shard stays locked until `_slot` drops.
                self.order.write().push(name);
                Ok(())
            }
        }
    }

    /// Retrieve an endpoint entry by its name.
    pub fn get_by_name(&self, name: &str) -> Option<EndpointEntry> {
        self.by_name.get(name).map(|entry| entry.value().clone())
    }

    /// Retrieve the endpoint an operation was registered against. The entry must
    /// still have the type recorded in the address.
    pub fn resolve(&self, address: &HandlerAddress) -> Option<Arc<dyn Endpoint>> {
        self.by_name
            .get(&address.endpoint_name)
            .filter(|entry| entry.type_id == address.endpoint_type)
            .map(|entry| entry.endpoint.clone())
    }

    /// Endpoint names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
