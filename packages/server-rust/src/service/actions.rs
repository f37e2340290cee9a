//! Action registry: maps action keys (and payload roots) to operation invokers.
//!
//! Built once by [`ActionRegistry::discover`] and then only read. Shared across
//! requests as `Arc<ActionRegistry>` without locking.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use actionwire_core::{InboundMessage, OperationDescriptor, PayloadSource};
use tracing::{debug, info, trace, warn};

use super::config::DispatchConfig;
use super::invoker::OperationInvoker;
use super::operation::{ConfigurationError, ResolveError};
use super::registry::EndpointRegistry;
use super::resolver::MetadataResolver;
use crate::traits::PayloadCodec;

pub struct ActionRegistry {
    tables: ActionTables,
    codec: Arc<dyn PayloadCodec>,
    endpoints: Arc<EndpointRegistry>,
    config: DispatchConfig,
    discovered: bool,
}

/// Lookup tables. Discovery fills a copy and swaps it in only on success.
#[derive(Debug, Default, Clone)]
struct ActionTables {
    /// Action key -> invoker.
    actions: HashMap<String, Arc<OperationInvoker>>,
    /// Payload root local name -> action key.
    roots: HashMap<String, String>,
}

impl ActionTables {
    fn insert_action(
        &mut self,
        action: String,
        handle: Arc<OperationInvoker>,
    ) -> Result<(), ConfigurationError> {
        match self.actions.entry(action) {
            Entry::Occupied(occupied) => Err(ConfigurationError::DuplicateAction {
                action: occupied.key().clone(),
            }),
            Entry::Vacant(vacant) => {
                trace!(action = %vacant.key(), handler = %handle.descriptor().address, "registered action");
                vacant.insert(handle);
                Ok(())
            }
        }
    }

    fn insert_descriptor(
        &mut self,
        descriptor: OperationDescriptor,
        codec: &Arc<dyn PayloadCodec>,
        endpoints: &Arc<EndpointRegistry>,
    ) -> Result<(), ConfigurationError> {
        let action = descriptor.action.clone();
        if self.actions.contains_key(&action) {
            return Err(ConfigurationError::DuplicateAction { action });
        }
        let root = descriptor
            .payload_root
            .as_ref()
            .map(|root| root.local_name.clone());
        if let Some(root) = root.as_ref() {
            if let Some(existing) = self.roots.get(root) {
                return Err(ConfigurationError::DuplicatePayloadRoot {
                    root: root.clone(),
                    existing: existing.clone(),
                    action,
                });
            }
        }

        let invoker = OperationInvoker::new(descriptor, Arc::clone(codec), Arc::clone(endpoints));
        self.insert_action(action.clone(), Arc::new(invoker))?;
        if let Some(root) = root {
            trace!(payload_root = %root, action = %action, "mapped payload root");
            self.roots.insert(root, action);
        }
        Ok(())
    }
}

impl ActionRegistry {
    #[must_use]
    pub fn new(
        endpoints: Arc<EndpointRegistry>,
        codec: Arc<dyn PayloadCodec>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            tables: ActionTables::default(),
            codec,
            endpoints,
            config,
            discovered: false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.actions.is_empty()
    }

    /// Registered action keys, sorted.
    #[must_use]
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.tables.actions.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }

    /// Scans every registered endpoint and registers an invoker for each of
    /// its operations. Endpoints without a service contract are skipped with a
    /// warning, methods that are not operations silently. Calling this again
    /// after a successful run does nothing.
    ///
    /// # Errors
    ///
    /// Any `ConfigurationError`, including duplicate actions and payload
    /// roots. Startup must not continue. The registry is left as it was
    /// before the call.
    pub fn discover(&mut self) -> Result<(), ConfigurationError> {
        if self.discovered {
            debug!("discovery already ran");
            return Ok(());
        }

        let mut staged = self.tables.clone();
        for name in self.endpoints.names() {
            let Some(entry) = self.endpoints.get_by_name(&name) else {
                continue;
            };
            let decl = entry.endpoint.declaration();
            let resolver =
                MetadataResolver::new(&decl).with_action_trim_chars(&self.config.action_trim_chars);
            let candidates = match resolver.candidate_methods() {
                Ok(candidates) => candidates,
                Err(ResolveError::Configuration(err)) => return Err(err),
                Err(err) => {
                    warn!(endpoint = %name, type_name = entry.type_name, "skipping endpoint: {err}");
                    continue;
                }
            };

            for signature in candidates {
                match resolver.resolve_operation(signature, &entry) {
                    Ok(descriptor) => {
                        staged.insert_descriptor(descriptor, &self.codec, &self.endpoints)?;
                    }
                    Err(ResolveError::Configuration(err)) => return Err(err),
                    Err(err) => trace!(endpoint = %name, "skipping method: {err}"),
                }
            }
        }

        self.tables = staged;
        self.discovered = true;
        info!(
            endpoints = self.endpoints.len(),
            operations = self.tables.actions.len(),
            "action discovery complete"
        );
        Ok(())
    }

    /// Registers `handle` under `action`.
    ///
    /// # Errors
    ///
    /// `DuplicateAction` if the action is already taken; the registry is left
    /// unchanged.
    pub fn register(
        &mut self,
        action: impl Into<String>,
        handle: Arc<OperationInvoker>,
    ) -> Result<(), ConfigurationError> {
        self.tables.insert_action(action.into(), handle)
    }

    /// Finds the invoker for `message`.
    ///
    /// A non-empty action (after trimming) is looked up directly and never
    /// falls back. Otherwise the local name of the payload root selects the
    /// operation, when fallback is enabled.
    ///
    /// # Errors
    ///
    /// `UnsupportedPayloadSource` when the fallback is needed but the payload
    /// is an unparsed stream.
    pub fn lookup(
        &self,
        message: &InboundMessage,
    ) -> Result<Option<Arc<OperationInvoker>>, ConfigurationError> {
        let action = message
            .action
            .as_deref()
            .and_then(|raw| self.config.normalize_action(raw));
        if let Some(action) = action {
            debug!(call_id = message.call_id, action, "looking up endpoint by action");
            return Ok(self.tables.actions.get(action).cloned());
        }
        if !self.config.payload_root_fallback {
            debug!(call_id = message.call_id, "no action and payload root fallback is disabled");
            return Ok(None);
        }

        if matches!(message.payload, PayloadSource::Stream(_)) {
            return Err(ConfigurationError::UnsupportedPayloadSource {
                kind: message.payload.kind(),
            });
        }
        let Some(root) = message.payload.tree_root() else {
            debug!(call_id = message.call_id, "message has neither action nor payload root");
            return Ok(None);
        };
        debug!(
            call_id = message.call_id,
            payload_root = root.local_name(),
            "looking up endpoint by payload root"
        );
        let tables = &self.tables;
        Ok(tables
            .roots
            .get(root.local_name())
            .and_then(|action| tables.actions.get(action))
            .cloned())
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions())
            .field("roots", &self.tables.roots)
            .field("config", &self.config)
            .field("discovered", &self.discovered)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
