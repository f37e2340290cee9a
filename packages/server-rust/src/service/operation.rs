//! Error taxonomy and dispatch results.
//!
//! - [`ConfigurationError`]: fatal at discovery, aborts startup.
//! - [`ResolveError`]: metadata resolution outcome; only its `Configuration`
//!   variant is fatal.
//! - [`BindingError`], [`CodecError`]: per-request, reported as invocation errors.
//! - [`DispatchError`]: everything a single dispatch can fail with.

use std::sync::Arc;

use actionwire_core::{Value, ValueType, WrapperType};

// ---------------------------------------------------------------------------
// ResponsePayload
// ---------------------------------------------------------------------------

/// Bound response, ready for the codec.
#[derive(Debug)]
pub enum ResponsePayload {
    /// A response wrapper filled from the return value and output cells.
    Wrapped {
        value: Value,
        wrapper: Arc<WrapperType>,
        /// Root element to encode the wrapper under.
        element: String,
    },
    /// The raw return value.
    Direct {
        value: Value,
        value_type: ValueType,
        element: String,
    },
    /// No response body.
    Empty,
}

impl ResponsePayload {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Wrapped { value, .. } | Self::Direct { value, .. } => Some(value),
            Self::Empty => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Fatal startup errors: the registry cannot be built as declared.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("endpoint already registered for action {action}")]
    DuplicateAction { action: String },
    #[error("payload root {root} already mapped to action {existing}, cannot map it to {action}")]
    DuplicatePayloadRoot {
        root: String,
        existing: String,
        action: String,
    },
    #[error("endpoint name {name} already registered")]
    DuplicateEndpoint { name: String },
    #[error("parameter {index} of {method} has no wire name")]
    MissingParameterMetadata { method: String, index: usize },
    #[error("wrapper {wrapper} has no accessor for {wire_name}")]
    MissingAccessor {
        wrapper: &'static str,
        wire_name: String,
    },
    #[error("wrapper {wrapper} has no mutator for {wire_name} accepting {value_type}")]
    MissingMutator {
        wrapper: &'static str,
        wire_name: String,
        value_type: &'static str,
    },
    #[error("accessor {wire_name} of wrapper {wrapper} yields {actual}, parameter expects {expected}")]
    AccessorTypeMismatch {
        wrapper: &'static str,
        wire_name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("parameter {index} of {method} is {mode} but {reason}")]
    InvalidOutputBinding {
        method: String,
        index: usize,
        mode: actionwire_core::ParamMode,
        reason: &'static str,
    },
    #[error("payload root lookup supports only tree sources, got {kind}")]
    UnsupportedPayloadSource { kind: &'static str },
}

/// Outcome of resolving declarative metadata for one method or endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The method is not an operation for this binder; skip it.
    #[error("no {metadata} metadata declared for {method}")]
    MetadataNotFound {
        method: String,
        metadata: &'static str,
    },
    /// The endpoint implements no service contract; skip the endpoint.
    #[error("no service marker found in hierarchy of {endpoint}")]
    ContractNotFound { endpoint: String },
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Per-request binding failures.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("empty payload cannot be unwrapped by {wrapper}")]
    EmptyPayload { wrapper: &'static str },
    #[error("payload is {actual}, expected wrapper {wrapper}")]
    WrapperTypeMismatch {
        wrapper: &'static str,
        actual: &'static str,
    },
    #[error("wrapper {wrapper} has no accessor for {wire_name}")]
    MissingAccessor {
        wrapper: &'static str,
        wire_name: String,
    },
    #[error("wrapper {wrapper} has no mutator for {wire_name} accepting {value_type}")]
    MissingMutator {
        wrapper: &'static str,
        wire_name: String,
        value_type: &'static str,
    },
    #[error("output values should be placed in cells: argument {index} ({wire_name}) is not a cell")]
    InvalidOutputBinding { index: usize, wire_name: String },
    #[error("handler returned {actual} but {method} declares {declared}")]
    ReturnTypeMismatch {
        method: String,
        declared: &'static str,
        actual: &'static str,
    },
    #[error("expected {expected} arguments, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },
}

/// Failures at the codec boundary.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error(transparent)]
    Xml(#[from] actionwire_core::XmlError),
    #[error("payload is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("cannot decode {target}: {reason}")]
    Decode { target: &'static str, reason: String },
    #[error("cannot encode {target}: {reason}")]
    Encode { target: &'static str, reason: String },
    #[error("no element {wire_name} in payload")]
    MissingElement { wire_name: String },
    #[error("{target} has no XML form")]
    Unsupported { target: &'static str },
}

/// Errors surfaced by one dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Routing miss: unhandled message.
    #[error("no endpoint found for message {call_id} (action: {action:?}, payload root: {payload_root:?})")]
    NoEndpoint {
        call_id: u64,
        action: Option<String>,
        payload_root: Option<String>,
    },
    #[error("endpoint {address} is not available")]
    EndpointUnavailable { address: String },
    #[error("invocation of {action} failed: {source}")]
    InvocationFailure {
        action: String,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl DispatchError {
    /// True for errors caused by the message rather than the deployment.
    #[must_use]
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Self::NoEndpoint { .. }
                | Self::Codec(_)
                | Self::Binding(BindingError::EmptyPayload { .. })
        )
    }
}
