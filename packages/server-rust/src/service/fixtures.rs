//! Shared test endpoints and wrapper tables.

use std::any::TypeId;
use std::sync::Arc;

use actionwire_core::{
    BoundArguments, EndpointDecl, Invocation, MethodDecl, MethodSignature, OperationDescriptor,
    ParamMode, RequestWrapper, ResponseWrapper, ServiceContract, ValueType, WebMethod, WebParam,
    WebResult, WebService, WrapperType,
};
use serde::{Deserialize, Serialize};

use super::registry::EndpointEntry;
use super::resolver::MetadataResolver;
use crate::traits::Endpoint;

pub(crate) const EXCHANGE_ACTION: &str = "urn:test#exchange";

pub(crate) fn i32_type() -> ValueType {
    ValueType::text::<i32>()
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ExchangeRequest {
    pub x: i32,
    pub z: i32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ExchangeResponse {
    pub y: i32,
    pub z: i32,
    pub total: i32,
}

pub(crate) fn exchange_request() -> Arc<WrapperType> {
    Arc::new(
        WrapperType::builder::<ExchangeRequest>()
            .root(Some("urn:test"), "exchange")
            .field("x", |w: &ExchangeRequest| w.x, |w: &mut ExchangeRequest, v: i32| w.x = v)
            .field("z", |w: &ExchangeRequest| w.z, |w: &mut ExchangeRequest, v: i32| w.z = v)
            .xml()
            .build(),
    )
}

pub(crate) fn exchange_response() -> Arc<WrapperType> {
    Arc::new(
        WrapperType::builder::<ExchangeResponse>()
            .root(Some("urn:test"), "exchangeResponse")
            .setter("y", |w: &mut ExchangeResponse, v: i32| w.y = v)
            .setter("z", |w: &mut ExchangeResponse, v: i32| w.z = v)
            .setter("total", |w: &mut ExchangeResponse, v: i32| w.total = v)
            .xml()
            .build(),
    )
}

/// `exchange(x: IN, y: OUT, z: INOUT) -> total`.
pub(crate) fn exchange_signature() -> MethodSignature {
    MethodSignature::new("exchange")
        .param(i32_type())
        .holder(i32_type())
        .holder(i32_type())
        .returns(i32_type())
}

/// Sets `y = x + 4`, bumps `z` by one and returns `x + z`.
pub(crate) struct ExchangeEndpoint;

impl Endpoint for ExchangeEndpoint {
    fn declaration(&self) -> EndpointDecl {
        let method = MethodDecl::new(exchange_signature())
            .web_method(WebMethod::action(EXCHANGE_ACTION))
            .request_wrapper(RequestWrapper::new(exchange_request()))
            .response_wrapper(ResponseWrapper::new(exchange_response()))
            .web_param(0, WebParam::named("x"))
            .web_param(1, WebParam::named("y").mode(ParamMode::Out))
            .web_param(2, WebParam::named("z").mode(ParamMode::InOut))
            .web_result(WebResult::named("total"));
        EndpointDecl::new("ExchangeEndpoint").implements(
            ServiceContract::new("Exchanger")
                .web_service(WebService::namespace("urn:test"))
                .method(method),
        )
    }

    fn invoke(
        &self,
        method: &MethodSignature,
        mut arguments: BoundArguments,
    ) -> anyhow::Result<Invocation> {
        anyhow::ensure!(method.name() == "exchange", "unexpected method {method}");
        let x = *arguments.value::<i32>(0)?;
        let z = arguments.cell_value::<i32>(2)?.copied().unwrap_or_default();
        arguments.set_output(1, x + 4)?;
        arguments.set_output(2, z + 1)?;
        Ok(Invocation::new(arguments).returning(x + z))
    }
}

/// Always fails.
pub(crate) struct FailingEndpoint;

impl Endpoint for FailingEndpoint {
    fn declaration(&self) -> EndpointDecl {
        EndpointDecl::new("FailingEndpoint")
            .web_service(WebService::default())
            .method(
                MethodDecl::new(MethodSignature::new("explode"))
                    .web_method(WebMethod::action("explode")),
            )
    }

    fn invoke(
        &self,
        _method: &MethodSignature,
        _arguments: BoundArguments,
    ) -> anyhow::Result<Invocation> {
        anyhow::bail!("handler exploded")
    }
}

pub(crate) fn exchange_entry() -> EndpointEntry {
    EndpointEntry {
        name: "exchange".into(),
        type_id: TypeId::of::<ExchangeEndpoint>(),
        type_name: "ExchangeEndpoint",
        endpoint: Arc::new(ExchangeEndpoint),
    }
}

/// The exchange operation as discovery would resolve it.
pub(crate) fn exchange_descriptor() -> OperationDescriptor {
    let decl = ExchangeEndpoint.declaration();
    let signature = exchange_signature();
    MetadataResolver::new(&decl)
        .resolve_operation(&signature, &exchange_entry())
        .expect("exchange fixture resolves")
}
