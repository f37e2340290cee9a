//! Message dispatch: routes an `InboundMessage` to its operation and returns
//! the marshaled `OutboundMessage`.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use actionwire_core::{InboundMessage, OutboundMessage};
use tower::Service;
use tracing::debug;

use super::actions::ActionRegistry;
use super::operation::DispatchError;

type DispatchFuture = Pin<Box<dyn Future<Output = Result<OutboundMessage, DispatchError>> + Send>>;

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Innermost service of the dispatch pipeline.
///
/// Assigns call ids to messages that do not carry one, looks the operation up
/// in the action registry, invokes it and marshals the response through the
/// registry's codec. A message no operation claims fails with
/// `DispatchError::NoEndpoint`.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ActionRegistry>,
    next_call_id: Arc<AtomicU64>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            next_call_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Dispatches one message synchronously.
    ///
    /// # Errors
    ///
    /// Any [`DispatchError`]; registry state is never affected.
    pub fn dispatch(&self, mut message: InboundMessage) -> Result<OutboundMessage, DispatchError> {
        if message.call_id == 0 {
            message.call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        }
        let call_id = message.call_id;
        tracing::Span::current().record("call_id", call_id);

        let Some(invoker) = self.registry.lookup(&message)? else {
            return Err(DispatchError::NoEndpoint {
                call_id,
                action: message.action,
                payload_root: message
                    .payload
                    .tree_root()
                    .map(|root| root.local_name().to_string()),
            });
        };
        debug!(call_id, action = invoker.action(), "dispatching");

        let response = invoker.invoke(&message)?;
        let mut sink = OutboundMessage::new(call_id);
        sink.action = Some(invoker.action().to_string());
        invoker.codec().marshal(&response, &mut sink)?;
        Ok(sink)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("operations", &self.registry.len())
            .field("next_call_id", &self.next_call_id.load(Ordering::Relaxed))
            .finish()
    }
}

impl Service<InboundMessage> for Dispatcher {
    type Response = OutboundMessage;
    type Error = DispatchError;
    type Future = DispatchFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, message: InboundMessage) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { dispatcher.dispatch(message) })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
