use std::any::Any;

use actionwire_core::{
    BoundArguments, EndpointDecl, Invocation, MethodSignature, OutboundMessage,
    ParameterBinding, PayloadSource, Value, WrapperType,
};

use crate::service::operation::{CodecError, ResponsePayload};

/// A service handler: declares its operations and executes them.
/// Registered by name in the `EndpointRegistry`; discovery reads
/// `declaration()` once, invocation calls `invoke()` per request.
pub trait Endpoint: Send + Sync + Any {
    /// Declarative metadata of the concrete endpoint type.
    fn declaration(&self) -> EndpointDecl;

    /// Execute `method` with the bound arguments.
    ///
    /// The arguments come back inside the returned `Invocation`, with any output
    /// cells filled in. Errors are propagated to the caller unchanged.
    fn invoke(
        &self,
        method: &MethodSignature,
        arguments: BoundArguments,
    ) -> anyhow::Result<Invocation>;
}

/// Marshaling boundary between raw payloads and typed values.
/// Implementations: XML via `quick-xml` (`XmlCodec`), in-memory fakes (tests).
pub trait PayloadCodec: Send + Sync {
    /// Decode the payload root into a value of `wrapper`.
    /// Returns `None` when the payload carries no root element.
    fn unmarshal(
        &self,
        source: &PayloadSource,
        wrapper: &WrapperType,
    ) -> Result<Option<Value>, CodecError>;

    /// Resolve a single directly-bound parameter from the payload.
    fn resolve_argument(
        &self,
        source: &PayloadSource,
        binding: &ParameterBinding,
    ) -> Result<Value, CodecError>;

    /// Serialize a bound response into the result sink.
    fn marshal(
        &self,
        response: &ResponsePayload,
        sink: &mut OutboundMessage,
    ) -> Result<(), CodecError>;
}
