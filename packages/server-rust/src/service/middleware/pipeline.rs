//! Pipeline composition: discovers operations and wraps the dispatcher with
//! the middleware stack.

use std::sync::Arc;

use actionwire_core::{InboundMessage, OutboundMessage};
use tower::ServiceBuilder;

use super::trace::TraceLayer;
use crate::service::actions::ActionRegistry;
use crate::service::config::DispatchConfig;
use crate::service::operation::{ConfigurationError, DispatchError};
use crate::service::registry::EndpointRegistry;
use crate::service::router::Dispatcher;
use crate::traits::PayloadCodec;

/// Build the dispatch pipeline for every endpoint in `endpoints`.
///
/// Runs discovery once, then wraps the resulting [`Dispatcher`] with
/// `TraceLayer`. The returned service implements
/// `tower::Service<InboundMessage>` and is cheap to clone.
///
/// # Errors
///
/// Any [`ConfigurationError`] raised during discovery. No partially built
/// pipeline is returned.
pub fn build_dispatch_pipeline(
    endpoints: Arc<EndpointRegistry>,
    codec: Arc<dyn PayloadCodec>,
    config: DispatchConfig,
) -> Result<
    impl tower::Service<InboundMessage, Response = OutboundMessage, Error = DispatchError> + Clone,
    ConfigurationError,
> {
    let mut registry = ActionRegistry::new(endpoints, codec, config);
    registry.discover()?;

    Ok(ServiceBuilder::new()
        .layer(TraceLayer)
        .service(Dispatcher::new(Arc::new(registry))))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use actionwire_core::{BoundArguments, EndpointDecl, Invocation, MethodSignature};
    use tower::ServiceExt;

    use super::*;
    use crate::codec::XmlCodec;
    use crate::demo::Calculator;
    use crate::service::fixtures::ExchangeEndpoint;
    use crate::traits::Endpoint;

    const DIVMOD: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
        <soap:Body><divmod><dividend>9</dividend><divisor>4</divisor></divmod></soap:Body>
    </soap:Envelope>"#;

    /// Same contract and actions as `Calculator`, under another type.
    struct CalculatorClone;

    impl Endpoint for CalculatorClone {
        fn declaration(&self) -> EndpointDecl {
            Calculator.declaration()
        }

        fn invoke(
            &self,
            method: &MethodSignature,
            arguments: BoundArguments,
        ) -> anyhow::Result<Invocation> {
            Calculator.invoke(method, arguments)
        }
    }

    #[tokio::test]
    async fn pipeline_dispatches_through_all_layers() {
        let endpoints = Arc::new(EndpointRegistry::new());
        endpoints.register("calculator", Calculator).unwrap();
        endpoints.register("exchange", ExchangeEndpoint).unwrap();

        let svc = build_dispatch_pipeline(endpoints, Arc::new(XmlCodec), DispatchConfig::default())
            .unwrap();
        let message = InboundMessage::from_envelope(DIVMOD, None).unwrap();
        let response = svc.oneshot(message).await.unwrap();

        assert_eq!(response.call_id, 1);
        assert_eq!(
            response.payload(),
            Some("<divmodResponse><quotient>2</quotient><remainder>1</remainder></divmodResponse>")
        );
        assert!(response.into_envelope().contains("<divmodResponse>"));
    }

    #[tokio::test]
    async fn clones_share_the_call_id_sequence() {
        let endpoints = Arc::new(EndpointRegistry::new());
        endpoints.register("calculator", Calculator).unwrap();
        let svc = build_dispatch_pipeline(endpoints, Arc::new(XmlCodec), DispatchConfig::default())
            .unwrap();

        let first = svc
            .clone()
            .oneshot(InboundMessage::from_envelope(DIVMOD, None).unwrap())
            .await
            .unwrap();
        let second = svc
            .oneshot(InboundMessage::from_envelope(DIVMOD, None).unwrap())
            .await
            .unwrap();
        assert_eq!((first.call_id, second.call_id), (1, 2));
    }

    #[test]
    fn conflicting_endpoints_fail_the_build() {
        let endpoints = Arc::new(EndpointRegistry::new());
        endpoints.register("calculator", Calculator).unwrap();
        endpoints.register("shadow", CalculatorClone).unwrap();

        let err = build_dispatch_pipeline(endpoints, Arc::new(XmlCodec), DispatchConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigurationError::DuplicateAction { .. }));
    }
}
