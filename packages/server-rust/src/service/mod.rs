//! Operation discovery and dispatch.
//!
//! 1. **Resolution** (`resolver`): declarative metadata -> `OperationDescriptor`
//! 2. **Registration** (`actions`): action key and payload root -> operation
//! 3. **Binding** (`binder`): payload <-> handler arguments and output cells
//! 4. **Invocation** (`invoker`): bind, call the endpoint, bind the response
//! 5. **Dispatch** (`router`, `middleware`): the tower service stack

pub mod actions;
pub mod binder;
pub mod config;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod invoker;
pub mod middleware;
pub mod operation;
pub mod registry;
pub mod resolver;
pub mod router;

pub use actions::ActionRegistry;
pub use config::{DispatchConfig, DEFAULT_ACTION_TRIM_CHARS};
pub use invoker::OperationInvoker;
pub use middleware::{build_dispatch_pipeline, TraceLayer};
pub use operation::{
    BindingError, CodecError, ConfigurationError, DispatchError, ResolveError, ResponsePayload,
};
pub use registry::{EndpointEntry, EndpointRegistry};
pub use resolver::MetadataResolver;
pub use router::Dispatcher;
