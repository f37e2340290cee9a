//! Built-in calculator endpoint served by the `actionwire-dispatch` binary.
//!
//! Covers each parameter direction: `add` binds two IN values directly,
//! `divmod` unwraps a request wrapper and reports the remainder through an OUT
//! cell, `increment` updates an INOUT counter.

use std::sync::Arc;

use actionwire_core::{
    BoundArguments, EndpointDecl, Invocation, MethodDecl, MethodSignature, ParamMode,
    RequestWrapper, ResponseWrapper, ServiceContract, ValueType, WebMethod, WebParam, WebResult,
    WebService, WrapperType,
};
use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::traits::Endpoint;

pub const CALCULATOR_NAMESPACE: &str = "urn:actionwire:calculator";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DivModRequest {
    pub dividend: i32,
    pub divisor: i32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DivModResponse {
    pub quotient: i32,
    pub remainder: i32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IncrementRequest {
    pub counter: i32,
    pub step: i32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IncrementResponse {
    pub counter: i32,
}

fn int() -> ValueType {
    ValueType::text::<i32>()
}

fn action(operation: &str) -> WebMethod {
    WebMethod::action(format!("{CALCULATOR_NAMESPACE}#{operation}"))
}

fn divmod_request() -> Arc<WrapperType> {
    Arc::new(
        WrapperType::builder::<DivModRequest>()
            .root(Some(CALCULATOR_NAMESPACE), "divmod")
            .getter("dividend", |r: &DivModRequest| r.dividend)
            .getter("divisor", |r: &DivModRequest| r.divisor)
            .xml()
            .build(),
    )
}

fn divmod_response() -> Arc<WrapperType> {
    Arc::new(
        WrapperType::builder::<DivModResponse>()
            .root(Some(CALCULATOR_NAMESPACE), "divmodResponse")
            .setter("quotient", |r: &mut DivModResponse, v: i32| r.quotient = v)
            .setter("remainder", |r: &mut DivModResponse, v: i32| r.remainder = v)
            .xml()
            .build(),
    )
}

fn increment_request() -> Arc<WrapperType> {
    Arc::new(
        WrapperType::builder::<IncrementRequest>()
            .root(Some(CALCULATOR_NAMESPACE), "increment")
            .getter("counter", |r: &IncrementRequest| r.counter)
            .getter("step", |r: &IncrementRequest| r.step)
            .xml()
            .build(),
    )
}

fn increment_response() -> Arc<WrapperType> {
    Arc::new(
        WrapperType::builder::<IncrementResponse>()
            .root(Some(CALCULATOR_NAMESPACE), "incrementResponse")
            .setter("counter", |r: &mut IncrementResponse, v: i32| r.counter = v)
            .xml()
            .build(),
    )
}

/// Integer calculator.
#[derive(Debug, Default)]
pub struct Calculator;

impl Calculator {
    #[must_use]
    pub fn add_signature() -> MethodSignature {
        MethodSignature::new("add").param(int()).param(int()).returns(int())
    }

    #[must_use]
    pub fn divmod_signature() -> MethodSignature {
        MethodSignature::new("divmod")
            .param(int())
            .param(int())
            .holder(int())
            .returns(int())
    }

    #[must_use]
    pub fn increment_signature() -> MethodSignature {
        MethodSignature::new("increment").holder(int()).param(int())
    }
}

impl Endpoint for Calculator {
    fn declaration(&self) -> EndpointDecl {
        let contract = ServiceContract::new("CalculatorService")
            .web_service(WebService::namespace(CALCULATOR_NAMESPACE))
            .method(
                MethodDecl::new(Self::add_signature())
                    .web_method(action("add"))
                    .web_param(0, WebParam::named("a"))
                    .web_param(1, WebParam::named("b"))
                    .web_result(WebResult::named("sum")),
            )
            .method(
                MethodDecl::new(Self::divmod_signature())
                    .web_method(action("divmod"))
                    .request_wrapper(RequestWrapper::new(divmod_request()))
                    .response_wrapper(ResponseWrapper::new(divmod_response()))
                    .web_param(0, WebParam::named("dividend"))
                    .web_param(1, WebParam::named("divisor"))
                    .web_param(2, WebParam::named("remainder").mode(ParamMode::Out))
                    .web_result(WebResult::named("quotient")),
            )
            .method(
                MethodDecl::new(Self::increment_signature())
                    .web_method(action("increment"))
                    .request_wrapper(RequestWrapper::new(increment_request()))
                    .response_wrapper(ResponseWrapper::new(increment_response()))
                    .web_param(0, WebParam::named("counter").mode(ParamMode::InOut))
                    .web_param(1, WebParam::named("step")),
            );
        EndpointDecl::new("Calculator").implements(contract)
    }

    fn invoke(
        &self,
        method: &MethodSignature,
        mut arguments: BoundArguments,
    ) -> anyhow::Result<Invocation> {
        match method.name() {
            "add" => {
                let a = *arguments.value::<i32>(0)?;
                let b = *arguments.value::<i32>(1)?;
                let sum = a
                    .checked_add(b)
                    .ok_or_else(|| anyhow!("{a} + {b} overflows"))?;
                Ok(Invocation::new(arguments).returning(sum))
            }
            "divmod" => {
                let dividend = arguments.take::<i32>(0)?;
                let divisor = arguments.take::<i32>(1)?;
                if divisor == 0 {
                    bail!("division by zero");
                }
                let quotient = dividend
                    .checked_div(divisor)
                    .ok_or_else(|| anyhow!("{dividend} / {divisor} overflows"))?;
                arguments.set_output(2, dividend - quotient * divisor)?;
                Ok(Invocation::new(arguments).returning(quotient))
            }
            "increment" => {
                let counter = arguments.cell_value::<i32>(0)?.copied().unwrap_or_default();
                let step = *arguments.value::<i32>(1)?;
                let counter = counter
                    .checked_add(step)
                    .ok_or_else(|| anyhow!("{counter} + {step} overflows"))?;
                arguments.set_output(0, counter)?;
                Ok(Invocation::new(arguments))
            }
            other => bail!("calculator has no operation {other}"),
        }
    }
}
