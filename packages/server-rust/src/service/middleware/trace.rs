//! Tracing middleware for dispatch.
//!
//! Wraps every dispatch in an `info` span carrying the action and call id, and
//! records duration and outcome when the dispatch completes.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use actionwire_core::{InboundMessage, OutboundMessage};
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::operation::DispatchError;

// ---------------------------------------------------------------------------
// TraceLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments dispatches with a `tracing` span.
#[derive(Debug, Clone, Default)]
pub struct TraceLayer;

impl<S> Layer<S> for TraceLayer {
    type Service = TraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceService { inner }
    }
}

// ---------------------------------------------------------------------------
// TraceService
// ---------------------------------------------------------------------------

/// Service wrapper that records dispatch duration and outcome.
#[derive(Debug, Clone)]
pub struct TraceService<S> {
    inner: S,
}

impl<S> Service<InboundMessage> for TraceService<S>
where
    S: Service<InboundMessage, Response = OutboundMessage, Error = DispatchError> + Send,
    S::Future: Send + 'static,
{
    type Response = OutboundMessage;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<OutboundMessage, DispatchError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, message: InboundMessage) -> Self::Future {
        let span = info_span!(
            "dispatch",
            action = message.action.as_deref().unwrap_or_default(),
            call_id = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );
        // Preset call ids are known up front; the dispatcher records the rest.
        if message.call_id != 0 {
            span.record("call_id", message.call_id);
        }

        let fut = {
            let _entered = span.enter();
            self.inner.call(message)
        };

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = start.elapsed().as_millis() as u64;
                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(err) if err.is_client_fault() => "rejected",
                    Err(_) => "error",
                };
                let span = tracing::Span::current();
                span.record("duration_ms", duration_ms);
                span.record("outcome", outcome);

                match &result {
                    Ok(response) => tracing::info!(
                        call_id = response.call_id,
                        duration_ms,
                        has_body = response.has_body(),
                        "dispatch complete"
                    ),
                    Err(err) => tracing::warn!(duration_ms, outcome, error = %err, "dispatch failed"),
                }
                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use actionwire_core::{PayloadSource, XmlElement};
    use tower::ServiceExt;

    use super::*;

    /// Echoes the call id back, or fails for messages without an action.
    struct ImmediateService;

    impl Service<InboundMessage> for ImmediateService {
        type Response = OutboundMessage;
        type Error = DispatchError;
        type Future =
            Pin<Box<dyn Future<Output = Result<OutboundMessage, DispatchError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, message: InboundMessage) -> Self::Future {
            Box::pin(async move {
                match message.action {
                    Some(action) => {
                        let mut response = OutboundMessage::new(message.call_id);
                        response.action = Some(action);
                        Ok(response)
                    }
                    None => Err(DispatchError::NoEndpoint {
                        call_id: message.call_id,
                        action: None,
                        payload_root: None,
                    }),
                }
            })
        }
    }

    fn message() -> InboundMessage {
        let mut message = InboundMessage::new(PayloadSource::Tree(XmlElement::new("Body")));
        message.call_id = 42;
        message
    }

    #[tokio::test]
    async fn trace_layer_passes_through_response() {
        let svc = TraceLayer.layer(ImmediateService);
        let response = svc.oneshot(message().with_action("ping")).await.unwrap();
        assert_eq!(response.call_id, 42);
        assert_eq!(response.action.as_deref(), Some("ping"));
    }

    #[tokio::test]
    async fn trace_layer_passes_through_error() {
        let svc = TraceLayer.layer(ImmediateService);
        let err = svc.oneshot(message()).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoEndpoint { call_id: 42, .. }));
    }
}
