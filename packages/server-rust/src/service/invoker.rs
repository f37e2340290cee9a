use std::sync::Arc;

use actionwire_core::{InboundMessage, OperationDescriptor};
use tracing::debug;

use super::binder::{bind_arguments, bind_direct, bind_response};
use super::operation::{DispatchError, ResponsePayload};
use super::registry::EndpointRegistry;
use crate::traits::PayloadCodec;

/// Executes one registered operation: binds the request, calls the endpoint
/// and binds the response.
pub struct OperationInvoker {
    descriptor: OperationDescriptor,
    codec: Arc<dyn PayloadCodec>,
    endpoints: Arc<EndpointRegistry>,
}

impl OperationInvoker {
    #[must_use]
    pub fn new(
        descriptor: OperationDescriptor,
        codec: Arc<dyn PayloadCodec>,
        endpoints: Arc<EndpointRegistry>,
    ) -> Self {
        Self {
            descriptor,
            codec,
            endpoints,
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.descriptor.action
    }

    /// Codec the response is to be marshaled with.
    #[must_use]
    pub fn codec(&self) -> &Arc<dyn PayloadCodec> {
        &self.codec
    }

    /// Runs the operation against `message`.
    ///
    /// # Errors
    ///
    /// - `Codec` / `Binding` when the payload does not fit the operation.
    /// - `EndpointUnavailable` when the endpoint is gone or changed type.
    /// - `InvocationFailure` when the handler fails; the cause is preserved.
    pub fn invoke(&self, message: &InboundMessage) -> Result<ResponsePayload, DispatchError> {
        let descriptor = &self.descriptor;
        let arguments = match &descriptor.request_wrapper {
            Some(wrapper_type) => {
                let wrapper = self.codec.unmarshal(&message.payload, wrapper_type)?;
                bind_arguments(descriptor, wrapper_type, wrapper)?
            }
            None => bind_direct(descriptor, |binding| {
                self.codec.resolve_argument(&message.payload, binding)
            })?,
        };

        let endpoint = self.endpoints.resolve(&descriptor.address).ok_or_else(|| {
            DispatchError::EndpointUnavailable {
                address: descriptor.address.to_string(),
            }
        })?;

        debug!(
            call_id = message.call_id,
            action = %descriptor.action,
            handler = %descriptor.address,
            "invoking handler"
        );
        let invocation = endpoint
            .invoke(descriptor.method(), arguments)
            .map_err(|source| DispatchError::InvocationFailure {
                action: descriptor.action.clone(),
                source,
            })?;

        Ok(bind_response(
            descriptor,
            invocation.arguments,
            invocation.returned,
        )?)
    }
}

impl std::fmt::Debug for OperationInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationInvoker")
            .field("action", &self.descriptor.action)
            .field("address", &self.descriptor.address.to_string())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
