//! Declarative service metadata.
//!
//! Endpoints describe themselves with these types: which contracts they
//! implement, which methods are operations, and how each parameter and the
//! return value map onto the wire. A concrete endpoint method may leave any item
//! out and inherit it from a contract declaring the same method.

use std::sync::Arc;

use crate::descriptor::{MethodSignature, ParamMode};
use crate::wrapper::WrapperType;

// ---------------------------------------------------------------------------
// Annotation values
// ---------------------------------------------------------------------------

/// Service marker on a contract or endpoint type.
#[derive(Debug, Clone, Default)]
pub struct WebService {
    pub target_namespace: Option<String>,
}

impl WebService {
    /// A service marker declaring `namespace` as its target namespace.
    #[must_use]
    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            target_namespace: Some(namespace.into()),
        }
    }
}

/// Marks a method as an operation.
#[derive(Debug, Clone, Default)]
pub struct WebMethod {
    /// Routing key; the method name is used when empty.
    pub action: Option<String>,
    /// Excluded methods are never registered.
    pub exclude: bool,
}

impl WebMethod {
    #[must_use]
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Self::default()
        }
    }
}

/// Wire mapping of one parameter.
#[derive(Debug, Clone, Default)]
pub struct WebParam {
    pub name: Option<String>,
    pub part_name: Option<String>,
    pub target_namespace: Option<String>,
    pub mode: ParamMode,
}

impl WebParam {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn mode(mut self, mode: ParamMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn part_name(mut self, part_name: impl Into<String>) -> Self {
        self.part_name = Some(part_name.into());
        self
    }

    /// `name` if non-empty, else `part_name` if non-empty.
    #[must_use]
    pub fn wire_name(&self) -> Option<&str> {
        non_empty(self.name.as_deref()).or_else(|| non_empty(self.part_name.as_deref()))
    }

    /// `part_name` if non-empty, else `name` if non-empty.
    #[must_use]
    pub fn element_name(&self) -> Option<&str> {
        non_empty(self.part_name.as_deref()).or_else(|| non_empty(self.name.as_deref()))
    }
}

/// Wire mapping of the return value.
#[derive(Debug, Clone, Default)]
pub struct WebResult {
    pub name: Option<String>,
    pub part_name: Option<String>,
}

impl WebResult {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            part_name: None,
        }
    }

    #[must_use]
    pub fn wire_name(&self) -> Option<&str> {
        non_empty(self.name.as_deref()).or_else(|| non_empty(self.part_name.as_deref()))
    }
}

/// Declares that a method's request arrives as one wrapper value.
#[derive(Debug, Clone)]
pub struct RequestWrapper {
    pub wrapper: Arc<WrapperType>,
    pub local_name: Option<String>,
    pub target_namespace: Option<String>,
}

/// Declares that a method's response leaves as one wrapper value.
#[derive(Debug, Clone)]
pub struct ResponseWrapper {
    pub wrapper: Arc<WrapperType>,
    pub local_name: Option<String>,
    pub target_namespace: Option<String>,
}

impl RequestWrapper {
    #[must_use]
    pub fn new(wrapper: Arc<WrapperType>) -> Self {
        Self {
            wrapper,
            local_name: None,
            target_namespace: None,
        }
    }

    #[must_use]
    pub fn local_name(mut self, local_name: impl Into<String>) -> Self {
        self.local_name = Some(local_name.into());
        self
    }

    #[must_use]
    pub fn target_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.target_namespace = Some(namespace.into());
        self
    }
}

impl ResponseWrapper {
    #[must_use]
    pub fn new(wrapper: Arc<WrapperType>) -> Self {
        Self {
            wrapper,
            local_name: None,
            target_namespace: None,
        }
    }

    #[must_use]
    pub fn local_name(mut self, local_name: impl Into<String>) -> Self {
        self.local_name = Some(local_name.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// A method as declared on a contract or an endpoint type.
#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub signature: MethodSignature,
    pub web_method: Option<WebMethod>,
    pub request_wrapper: Option<RequestWrapper>,
    pub response_wrapper: Option<ResponseWrapper>,
    pub web_result: Option<WebResult>,
    /// One slot per parameter; `None` where the parameter is unannotated.
    pub params: Vec<Option<WebParam>>,
}

impl MethodDecl {
    /// An unannotated declaration of `signature`.
    #[must_use]
    pub fn new(signature: MethodSignature) -> Self {
        let params = vec![None; signature.params().len()];
        Self {
            signature,
            web_method: None,
            request_wrapper: None,
            response_wrapper: None,
            web_result: None,
            params,
        }
    }

    #[must_use]
    pub fn web_method(mut self, web_method: WebMethod) -> Self {
        self.web_method = Some(web_method);
        self
    }

    #[must_use]
    pub fn request_wrapper(mut self, wrapper: RequestWrapper) -> Self {
        self.request_wrapper = Some(wrapper);
        self
    }

    #[must_use]
    pub fn response_wrapper(mut self, wrapper: ResponseWrapper) -> Self {
        self.response_wrapper = Some(wrapper);
        self
    }

    #[must_use]
    pub fn web_result(mut self, web_result: WebResult) -> Self {
        self.web_result = Some(web_result);
        self
    }

    /// Annotates parameter `index`. Indices past the signature are ignored.
    #[must_use]
    pub fn web_param(mut self, index: usize, web_param: WebParam) -> Self {
        if let Some(slot) = self.params.get_mut(index) {
            *slot = Some(web_param);
        }
        self
    }

    #[must_use]
    pub fn param(&self, index: usize) -> Option<&WebParam> {
        self.params.get(index).and_then(Option::as_ref)
    }
}

/// A service contract: the interface an endpoint implements.
#[derive(Debug, Clone)]
pub struct ServiceContract {
    pub name: String,
    pub web_service: Option<WebService>,
    pub methods: Vec<MethodDecl>,
}

impl ServiceContract {
    /// A contract without the service marker.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            web_service: None,
            methods: Vec::new(),
        }
    }

    #[must_use]
    pub fn web_service(mut self, web_service: WebService) -> Self {
        self.web_service = Some(web_service);
        self
    }

    #[must_use]
    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    #[must_use]
    pub fn find(&self, signature: &MethodSignature) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| &m.signature == signature)
    }

    #[must_use]
    pub fn is_service(&self) -> bool {
        self.web_service.is_some()
    }
}

/// The concrete endpoint type: its own declarations and the contracts it implements.
#[derive(Debug, Clone)]
pub struct EndpointDecl {
    pub type_name: String,
    pub web_service: Option<WebService>,
    pub methods: Vec<MethodDecl>,
    /// Declared contracts, in declaration order.
    pub contracts: Vec<ServiceContract>,
}

impl EndpointDecl {
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            web_service: None,
            methods: Vec::new(),
            contracts: Vec::new(),
        }
    }

    #[must_use]
    pub fn web_service(mut self, web_service: WebService) -> Self {
        self.web_service = Some(web_service);
        self
    }

    #[must_use]
    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    #[must_use]
    pub fn implements(mut self, contract: ServiceContract) -> Self {
        self.contracts.push(contract);
        self
    }

    #[must_use]
    pub fn find(&self, signature: &MethodSignature) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| &m.signature == signature)
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    #[test]
    fn web_param_name_precedence() {
        let both = WebParam::named("x").part_name("xPart");
        assert_eq!(both.wire_name(), Some("x"));
        assert_eq!(both.element_name(), Some("xPart"));

        let empty_name = WebParam {
            name: Some(String::new()),
            part_name: Some("p".into()),
            ..WebParam::default()
        };
        assert_eq!(empty_name.wire_name(), Some("p"));
        assert_eq!(WebParam::default().wire_name(), None);
    }

    #[test]
    fn method_decl_has_slot_per_param() {
        let sig = MethodSignature::new("m")
            .param(ValueType::of::<i32>())
            .param(ValueType::of::<i32>());
        let decl = MethodDecl::new(sig)
            .web_param(1, WebParam::named("b"))
            .web_param(5, WebParam::named("ignored"));
        assert_eq!(decl.params.len(), 2);
        assert!(decl.param(0).is_none());
        assert_eq!(decl.param(1).unwrap().wire_name(), Some("b"));
    }

    #[test]
    fn contract_finds_method_by_signature() {
        let sig = MethodSignature::new("ping");
        let contract = ServiceContract::new("Pinger")
            .web_service(WebService::default())
            .method(MethodDecl::new(sig.clone()));
        assert!(contract.is_service());
        assert!(contract.find(&sig).is_some());
        assert!(contract.find(&MethodSignature::new("pong")).is_none());
    }
}
