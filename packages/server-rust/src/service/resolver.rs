//! Declarative metadata resolution.
//!
//! An endpoint's metadata is spread over its own method declarations and the
//! contracts it implements. For every item the concrete declaration is
//! consulted first, then each contract in declaration order; the first
//! declaration carrying the item wins. Items resolve independently, so a
//! method may take its action from the endpoint and its parameter names from
//! a contract.

use std::sync::Arc;

use actionwire_core::{
    EndpointDecl, HandlerAddress, MethodDecl, MethodSignature, OperationDescriptor, ParamMode,
    ParameterBinding, QualifiedName, RequestWrapper, ResultBinding, ServiceContract, WebMethod,
    WebParam, WrapperType,
};
use tracing::{trace, warn};

use super::config::{trim_action, DEFAULT_ACTION_TRIM_CHARS};
use super::operation::{ConfigurationError, ResolveError};
use super::registry::EndpointEntry;

/// Resolves operation descriptors from one endpoint's declaration.
pub struct MetadataResolver<'a> {
    decl: &'a EndpointDecl,
    action_trim_chars: &'a str,
}

impl<'a> MetadataResolver<'a> {
    #[must_use]
    pub fn new(decl: &'a EndpointDecl) -> Self {
        Self {
            decl,
            action_trim_chars: DEFAULT_ACTION_TRIM_CHARS,
        }
    }

    /// Declared actions are trimmed with the same set as inbound ones.
    #[must_use]
    pub fn with_action_trim_chars(mut self, trim_chars: &'a str) -> Self {
        self.action_trim_chars = trim_chars;
        self
    }

    /// Contracts carrying the service marker, in declaration order.
    ///
    /// # Errors
    ///
    /// `ContractNotFound` when neither the endpoint type nor any contract it
    /// implements is marked as a service.
    pub fn service_contracts(&self) -> Result<Vec<&'a ServiceContract>, ResolveError> {
        let marked: Vec<_> = self
            .decl
            .contracts
            .iter()
            .filter(|contract| contract.is_service())
            .collect();
        if marked.is_empty() && self.decl.web_service.is_none() {
            return Err(ResolveError::ContractNotFound {
                endpoint: self.decl.type_name.clone(),
            });
        }
        Ok(marked)
    }

    /// Method signatures eligible for registration: those declared on a marked
    /// endpoint type, then those of each marked contract. Each signature
    /// appears once.
    ///
    /// # Errors
    ///
    /// Propagates `ContractNotFound` from [`Self::service_contracts`].
    pub fn candidate_methods(&self) -> Result<Vec<&'a MethodSignature>, ResolveError> {
        let contracts = self.service_contracts()?;
        let own = self
            .decl
            .web_service
            .as_ref()
            .map(|_| self.decl.methods.as_slice())
            .unwrap_or_default();

        let mut candidates: Vec<&MethodSignature> = Vec::new();
        let declared = own
            .iter()
            .chain(contracts.into_iter().flat_map(|contract| contract.methods.iter()));
        for method in declared {
            if !candidates.contains(&&method.signature) {
                candidates.push(&method.signature);
            }
        }
        Ok(candidates)
    }

    /// Declarations of `signature`, most specific first.
    fn declarations(
        &self,
        signature: &'a MethodSignature,
    ) -> impl Iterator<Item = &'a MethodDecl> + 'a {
        let decl = self.decl;
        decl.find(signature).into_iter().chain(
            decl.contracts
                .iter()
                .filter_map(move |contract| contract.find(signature)),
        )
    }

    fn first<T: 'a>(
        &self,
        signature: &'a MethodSignature,
        pick: impl Fn(&'a MethodDecl) -> Option<&'a T>,
    ) -> Option<&'a T> {
        self.declarations(signature).find_map(pick)
    }

    /// Namespace for payload roots that do not name one.
    fn default_namespace(&self) -> Option<&'a str> {
        std::iter::once(self.decl.web_service.as_ref())
            .chain(self.decl.contracts.iter().map(|c| c.web_service.as_ref()))
            .flatten()
            .find_map(|ws| ws.target_namespace.as_deref())
    }

    /// The operation marker of `signature`.
    ///
    /// # Errors
    ///
    /// `MetadataNotFound` when no declaration marks the method as an operation,
    /// or the marker excludes it.
    pub fn resolve_web_method(
        &self,
        signature: &'a MethodSignature,
    ) -> Result<&'a WebMethod, ResolveError> {
        match self.first(signature, |d| d.web_method.as_ref()) {
            Some(web_method) if !web_method.exclude => Ok(web_method),
            Some(_) => Err(ResolveError::MetadataNotFound {
                method: signature.to_string(),
                metadata: "included web method",
            }),
            None => Err(ResolveError::MetadataNotFound {
                method: signature.to_string(),
                metadata: "web method",
            }),
        }
    }

    /// Binding of parameter `index` of `signature`.
    ///
    /// # Errors
    ///
    /// - `MetadataNotFound` when no declaration annotates the parameter or the
    ///   annotation names no wire field.
    /// - `Configuration(InvalidOutputBinding)` when the declared mode
    ///   disagrees with whether the parameter is an output cell.
    pub fn resolve_parameter(
        &self,
        signature: &'a MethodSignature,
        index: usize,
    ) -> Result<ParameterBinding, ResolveError> {
        let not_found = || ResolveError::MetadataNotFound {
            method: signature.to_string(),
            metadata: "web param",
        };
        let param_type = signature.params().get(index).ok_or_else(not_found)?;
        let web_param = self
            .first(signature, |d| d.param(index))
            .ok_or_else(not_found)?;
        let wire_name = web_param.wire_name().ok_or_else(not_found)?;

        let reason = match (web_param.mode.is_output(), param_type.is_holder()) {
            (true, false) => Some("the parameter is not an output cell"),
            (false, true) => Some("output cells are reserved for OUT and INOUT parameters"),
            _ => None,
        };
        if let Some(reason) = reason {
            return Err(ConfigurationError::InvalidOutputBinding {
                method: signature.to_string(),
                index,
                mode: web_param.mode,
                reason,
            }
            .into());
        }

        Ok(ParameterBinding {
            index,
            wire_name: wire_name.to_string(),
            mode: web_param.mode,
            target_type: param_type.value_type(),
        })
    }

    /// Build the complete descriptor of `signature` served by `endpoint`.
    ///
    /// # Errors
    ///
    /// - `MetadataNotFound` when the method is not an operation.
    /// - `Configuration` when it is one but its metadata is incomplete or does
    ///   not fit its wrappers. Startup must abort.
    pub fn resolve_operation(
        &self,
        signature: &'a MethodSignature,
        endpoint: &EndpointEntry,
    ) -> Result<OperationDescriptor, ResolveError> {
        let web_method = self.resolve_web_method(signature)?;
        let action = web_method
            .action
            .as_deref()
            .and_then(|action| trim_action(action, self.action_trim_chars))
            .unwrap_or_else(|| signature.name())
            .to_string();

        let parameters = (0..signature.params().len())
            .map(|index| {
                self.resolve_parameter(signature, index)
                    .map_err(|err| match err {
                        ResolveError::MetadataNotFound { .. } => {
                            ResolveError::from(ConfigurationError::MissingParameterMetadata {
                                method: signature.to_string(),
                                index,
                            })
                        }
                        other => other,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let request = self.first(signature, |d| d.request_wrapper.as_ref());
        let response = self.first(signature, |d| d.response_wrapper.as_ref());
        let web_result = self.first(signature, |d| d.web_result.as_ref());

        let result = match (signature.return_type(), web_result.and_then(|r| r.wire_name())) {
            (Some(value_type), Some(wire_name)) => Some(ResultBinding {
                wire_name: wire_name.to_string(),
                value_type,
            }),
            (Some(_), None) if response.is_some() => {
                warn!(
                    method = %signature,
                    "return value has no web result mapping and will not be written to the response wrapper"
                );
                None
            }
            _ => None,
        };

        if let Some(request) = request {
            check_request_wrapper(&request.wrapper, &parameters)?;
        }
        if let Some(response) = response {
            check_response_wrapper(&response.wrapper, &parameters, result.as_ref())?;
        }

        let payload_root = self.payload_root(signature, request, &parameters);
        let response_root = response.and_then(|r| {
            r.local_name
                .as_deref()
                .filter(|local| !local.is_empty())
                .map(|local| {
                    QualifiedName::new(
                        r.target_namespace.as_deref().or(self.default_namespace()),
                        local,
                    )
                })
        });

        trace!(
            action = %action,
            method = %signature,
            endpoint = %endpoint.name,
            parameters = parameters.len(),
            wrapped_request = request.is_some(),
            wrapped_response = response.is_some(),
            "resolved operation"
        );

        Ok(OperationDescriptor {
            action,
            address: HandlerAddress {
                endpoint_name: endpoint.name.clone(),
                endpoint_type: endpoint.type_id,
                endpoint_type_name: endpoint.type_name,
                method: signature.clone(),
            },
            request_wrapper: request.map(|r| Arc::clone(&r.wrapper)),
            response_wrapper: response.map(|r| Arc::clone(&r.wrapper)),
            parameters,
            result,
            payload_root,
            response_root,
        })
    }

    /// The element that identifies the operation's payload: the request
    /// wrapper's declared name, else the wrapper type's own root, else the
    /// element of the only parameter read from the request.
    fn payload_root(
        &self,
        signature: &'a MethodSignature,
        request: Option<&'a RequestWrapper>,
        parameters: &[ParameterBinding],
    ) -> Option<QualifiedName> {
        if let Some(request) = request {
            let declared = request
                .local_name
                .as_deref()
                .filter(|local| !local.is_empty())
                .map(|local| {
                    QualifiedName::new(
                        request
                            .target_namespace
                            .as_deref()
                            .or(self.default_namespace()),
                        local,
                    )
                });
            return declared.or_else(|| request.wrapper.root().cloned());
        }

        let mut inputs = parameters.iter().filter(|p| p.mode != ParamMode::Out);
        let only = inputs.next()?;
        if inputs.next().is_some() {
            return None;
        }
        let web_param: &WebParam = self.first(signature, |d| d.param(only.index))?;
        let local = web_param.element_name()?;
        Some(QualifiedName::new(
            web_param
                .target_namespace
                .as_deref()
                .or(self.default_namespace()),
            local,
        ))
    }
}

/// Every parameter read from the request needs an accessor of its type.
fn check_request_wrapper(
    wrapper: &WrapperType,
    parameters: &[ParameterBinding],
) -> Result<(), ConfigurationError> {
    for param in parameters.iter().filter(|p| p.mode.is_input()) {
        let accessor =
            wrapper
                .accessor(&param.wire_name)
                .ok_or_else(|| ConfigurationError::MissingAccessor {
                    wrapper: wrapper.name(),
                    wire_name: param.wire_name.clone(),
                })?;
        if accessor.value_type() != param.target_type {
            return Err(ConfigurationError::AccessorTypeMismatch {
                wrapper: wrapper.name(),
                wire_name: param.wire_name.clone(),
                expected: param.target_type.name(),
                actual: accessor.value_type().name(),
            });
        }
    }
    Ok(())
}

/// Every output parameter and the mapped result need a compatible mutator.
fn check_response_wrapper(
    wrapper: &WrapperType,
    parameters: &[ParameterBinding],
    result: Option<&ResultBinding>,
) -> Result<(), ConfigurationError> {
    let outputs = parameters
        .iter()
        .filter(|p| p.mode.is_output())
        .map(|p| (p.wire_name.as_str(), p.target_type))
        .chain(result.map(|r| (r.wire_name.as_str(), r.value_type)));
    for (wire_name, value_type) in outputs {
        if wrapper.find_mutator(wire_name, value_type.type_id()).is_none() {
            return Err(ConfigurationError::MissingMutator {
                wrapper: wrapper.name(),
                wire_name: wire_name.to_string(),
                value_type: value_type.name(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::any::TypeId;

    use actionwire_core::{ResponseWrapper, ValueType, WebResult, WebService};

    use super::*;
    use crate::service::fixtures::{exchange_request, exchange_response, i32_type, ExchangeEndpoint};

    fn entry() -> EndpointEntry {
        EndpointEntry {
            name: "calc".into(),
            type_id: TypeId::of::<ExchangeEndpoint>(),
            type_name: "ExchangeEndpoint",
            endpoint: Arc::new(ExchangeEndpoint),
        }
    }

    fn add_sig() -> MethodSignature {
        MethodSignature::new("add")
            .param(i32_type())
            .param(i32_type())
            .returns(i32_type())
    }

    fn annotated_add() -> MethodDecl {
        MethodDecl::new(add_sig())
            .web_method(WebMethod::action("urn:calc#add"))
            .web_param(0, WebParam::named("a"))
            .web_param(1, WebParam::named("b"))
            .web_result(WebResult::named("sum"))
    }

    fn marked_contract() -> ServiceContract {
        ServiceContract::new("Calculator").web_service(WebService::namespace("urn:calc"))
    }

    #[test]
    fn unmarked_endpoint_has_no_contract() {
        let decl = EndpointDecl::new("Plain")
            .method(annotated_add())
            .implements(ServiceContract::new("Unmarked"));
        let err = MetadataResolver::new(&decl).service_contracts().unwrap_err();
        assert!(matches!(err, ResolveError::ContractNotFound { endpoint } if endpoint == "Plain"));
    }

    #[test]
    fn marker_on_the_endpoint_type_counts() {
        let decl = EndpointDecl::new("Calc")
            .web_service(WebService::default())
            .method(annotated_add());
        let resolver = MetadataResolver::new(&decl);
        assert!(resolver.service_contracts().unwrap().is_empty());
        assert_eq!(resolver.candidate_methods().unwrap(), vec![&add_sig()]);
    }

    #[test]
    fn candidates_are_deduplicated_across_contracts() {
        let decl = EndpointDecl::new("Calc")
            .method(MethodDecl::new(add_sig()))
            .implements(marked_contract().method(annotated_add()))
            .implements(marked_contract().method(MethodDecl::new(add_sig())));
        let candidates = MetadataResolver::new(&decl).candidate_methods().unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn concrete_declaration_takes_precedence() {
        let concrete = MethodDecl::new(add_sig()).web_method(WebMethod::action("concrete"));
        let decl = EndpointDecl::new("Calc")
            .method(concrete)
            .implements(marked_contract().method(annotated_add()));
        let sig = add_sig();
        let descriptor = MetadataResolver::new(&decl)
            .resolve_operation(&sig, &entry())
            .unwrap();

        assert_eq!(descriptor.action, "concrete");
        // Parameter names and result fall through to the contract.
        assert_eq!(descriptor.parameters[0].wire_name, "a");
        assert_eq!(descriptor.parameters[1].wire_name, "b");
        assert_eq!(descriptor.result.as_ref().unwrap().wire_name, "sum");
        assert_eq!(descriptor.address.endpoint_name, "calc");
    }

    #[test]
    fn empty_action_defaults_to_method_name() {
        let method = MethodDecl::new(MethodSignature::new("ping")).web_method(WebMethod::default());
        let decl = EndpointDecl::new("Pinger")
            .web_service(WebService::default())
            .method(method);
        let sig = MethodSignature::new("ping");
        let descriptor = MetadataResolver::new(&decl)
            .resolve_operation(&sig, &entry())
            .unwrap();
        assert_eq!(descriptor.action, "ping");
        assert!(descriptor.payload_root.is_none());
    }

    #[test]
    fn declared_action_is_trimmed_like_inbound_actions() {
        let sig = MethodSignature::new("ping");
        let method = MethodDecl::new(sig.clone()).web_method(WebMethod::action("\"urn:q#ping\"\n"));
        let decl = EndpointDecl::new("Pinger")
            .web_service(WebService::default())
            .method(method);

        let descriptor = MetadataResolver::new(&decl)
            .resolve_operation(&sig, &entry())
            .unwrap();
        assert_eq!(descriptor.action, "urn:q#ping");

        // A set that keeps quotes also keeps them on the declared action.
        let descriptor = MetadataResolver::new(&decl)
            .with_action_trim_chars("\n")
            .resolve_operation(&sig, &entry())
            .unwrap();
        assert_eq!(descriptor.action, "\"urn:q#ping\"");

        let quotes_only = EndpointDecl::new("Pinger")
            .web_service(WebService::default())
            .method(MethodDecl::new(sig.clone()).web_method(WebMethod::action("''")));
        let descriptor = MetadataResolver::new(&quotes_only)
            .resolve_operation(&sig, &entry())
            .unwrap();
        assert_eq!(descriptor.action, "ping");
    }

    #[test]
    fn method_without_marker_is_not_an_operation() {
        let decl = EndpointDecl::new("Calc").implements(
            marked_contract().method(MethodDecl::new(add_sig()).web_param(0, WebParam::named("a"))),
        );
        let sig = add_sig();
        let err = MetadataResolver::new(&decl)
            .resolve_operation(&sig, &entry())
            .unwrap_err();
        assert!(matches!(err, ResolveError::MetadataNotFound { metadata: "web method", .. }));
    }

    #[test]
    fn excluded_method_is_not_an_operation() {
        let excluded = WebMethod {
            exclude: true,
            ..WebMethod::default()
        };
        let decl = EndpointDecl::new("Calc")
            .implements(marked_contract().method(MethodDecl::new(add_sig()).web_method(excluded)));
        let sig = add_sig();
        let err = MetadataResolver::new(&decl).resolve_web_method(&sig).unwrap_err();
        assert!(matches!(err, ResolveError::MetadataNotFound { .. }));
    }

    #[test]
    fn unannotated_parameter_of_an_operation_is_fatal() {
        let method = MethodDecl::new(add_sig())
            .web_method(WebMethod::action("add"))
            .web_param(0, WebParam::named("a"));
        let decl = EndpointDecl::new("Calc").implements(marked_contract().method(method));
        let sig = add_sig();
        let resolver = MetadataResolver::new(&decl);

        assert!(matches!(
            resolver.resolve_parameter(&sig, 1),
            Err(ResolveError::MetadataNotFound { .. })
        ));
        let err = resolver.resolve_operation(&sig, &entry()).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Configuration(ConfigurationError::MissingParameterMetadata { index: 1, .. })
        ));
    }

    #[test]
    fn output_mode_requires_a_cell() {
        let sig = MethodSignature::new("m").param(i32_type());
        let method = MethodDecl::new(sig.clone())
            .web_method(WebMethod::default())
            .web_param(0, WebParam::named("y").mode(ParamMode::Out));
        let decl = EndpointDecl::new("Calc").implements(marked_contract().method(method));
        let err = MetadataResolver::new(&decl)
            .resolve_parameter(&sig, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Configuration(ConfigurationError::InvalidOutputBinding {
                mode: ParamMode::Out,
                ..
            })
        ));
    }

    #[test]
    fn cell_requires_an_output_mode() {
        let sig = MethodSignature::new("m").holder(i32_type());
        let method = MethodDecl::new(sig.clone())
            .web_method(WebMethod::default())
            .web_param(0, WebParam::named("y"));
        let decl = EndpointDecl::new("Calc").implements(marked_contract().method(method));
        let err = MetadataResolver::new(&decl)
            .resolve_parameter(&sig, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Configuration(ConfigurationError::InvalidOutputBinding {
                mode: ParamMode::In,
                ..
            })
        ));
    }

    fn exchange_sig() -> MethodSignature {
        MethodSignature::new("exchange")
            .param(i32_type())
            .holder(i32_type())
            .holder(i32_type())
    }

    fn exchange_decl() -> MethodDecl {
        MethodDecl::new(exchange_sig())
            .web_method(WebMethod::action("urn:calc#exchange"))
            .request_wrapper(RequestWrapper::new(exchange_request()).local_name("exchange"))
            .response_wrapper(ResponseWrapper::new(exchange_response()))
            .web_param(0, WebParam::named("x"))
            .web_param(1, WebParam::named("y").mode(ParamMode::Out))
            .web_param(2, WebParam::named("z").mode(ParamMode::InOut))
    }

    #[test]
    fn wrapped_operation_resolves_roots() {
        let decl = EndpointDecl::new("Calc").implements(marked_contract().method(exchange_decl()));
        let sig = exchange_sig();
        let descriptor = MetadataResolver::new(&decl)
            .resolve_operation(&sig, &entry())
            .unwrap();

        assert_eq!(
            descriptor.payload_root,
            Some(QualifiedName::new(Some("urn:calc"), "exchange"))
        );
        assert_eq!(descriptor.response_element(), "exchangeResponse");
        assert!(descriptor.result.is_none());
        let modes: Vec<_> = descriptor.parameters.iter().map(|p| p.mode).collect();
        assert_eq!(modes, vec![ParamMode::In, ParamMode::Out, ParamMode::InOut]);
    }

    #[test]
    fn missing_accessor_is_fatal() {
        let sig = MethodSignature::new("exchange").param(i32_type());
        let method = MethodDecl::new(sig.clone())
            .web_method(WebMethod::default())
            .request_wrapper(RequestWrapper::new(exchange_request()))
            .web_param(0, WebParam::named("missing"));
        let decl = EndpointDecl::new("Calc").implements(marked_contract().method(method));
        let err = MetadataResolver::new(&decl)
            .resolve_operation(&sig, &entry())
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Configuration(ConfigurationError::MissingAccessor { wire_name, .. })
                if wire_name == "missing"
        ));
    }

    #[test]
    fn accessor_type_must_match_parameter() {
        let sig = MethodSignature::new("exchange").param(ValueType::of::<String>());
        let method = MethodDecl::new(sig.clone())
            .web_method(WebMethod::default())
            .request_wrapper(RequestWrapper::new(exchange_request()))
            .web_param(0, WebParam::named("x"));
        let decl = EndpointDecl::new("Calc").implements(marked_contract().method(method));
        let err = MetadataResolver::new(&decl)
            .resolve_operation(&sig, &entry())
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Configuration(ConfigurationError::AccessorTypeMismatch { .. })
        ));
    }

    #[test]
    fn missing_mutator_is_fatal() {
        let sig = MethodSignature::new("exchange")
            .holder(i32_type())
            .returns(i32_type());
        let method = MethodDecl::new(sig.clone())
            .web_method(WebMethod::default())
            .response_wrapper(ResponseWrapper::new(exchange_response()))
            .web_param(0, WebParam::named("y").mode(ParamMode::Out))
            .web_result(WebResult::named("grand_total"));
        let decl = EndpointDecl::new("Calc").implements(marked_contract().method(method));
        let err = MetadataResolver::new(&decl)
            .resolve_operation(&sig, &entry())
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Configuration(ConfigurationError::MissingMutator { wire_name, .. })
                if wire_name == "grand_total"
        ));
    }

    #[test]
    fn single_input_parameter_names_the_payload_root() {
        let sig = MethodSignature::new("negate")
            .param(i32_type())
            .holder(i32_type())
            .returns(i32_type());
        let method = MethodDecl::new(sig.clone())
            .web_method(WebMethod::default())
            .web_param(0, WebParam::named("n").part_name("negateRequest"))
            .web_param(1, WebParam::named("log").mode(ParamMode::Out));
        let decl = EndpointDecl::new("Calc").implements(marked_contract().method(method));
        let descriptor = MetadataResolver::new(&decl)
            .resolve_operation(&sig, &entry())
            .unwrap();
        assert_eq!(
            descriptor.payload_root,
            Some(QualifiedName::new(Some("urn:calc"), "negateRequest"))
        );
    }

    #[test]
    fn several_input_parameters_leave_no_payload_root() {
        let decl = EndpointDecl::new("Calc").implements(marked_contract().method(annotated_add()));
        let sig = add_sig();
        let descriptor = MetadataResolver::new(&decl)
            .resolve_operation(&sig, &entry())
            .unwrap();
        assert!(descriptor.payload_root.is_none());
        assert_eq!(descriptor.result_element(), "sum");
    }
}
