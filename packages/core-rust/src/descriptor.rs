//! Binding descriptors: the merged, final description of a registered operation.
//!
//! Descriptors are produced once at discovery time and never change afterwards.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::value::ValueType;
use crate::wrapper::WrapperType;

// ---------------------------------------------------------------------------
// Parameter direction and shape
// ---------------------------------------------------------------------------

/// Direction of a handler parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ParamMode {
    #[default]
    In,
    Out,
    InOut,
}

impl ParamMode {
    /// OUT and INOUT parameters are carried in output cells.
    #[must_use]
    pub fn is_output(self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }

    /// IN and INOUT parameters are read from the request.
    #[must_use]
    pub fn is_input(self) -> bool {
        matches!(self, Self::In | Self::InOut)
    }
}

impl fmt::Display for ParamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::In => "IN",
            Self::Out => "OUT",
            Self::InOut => "INOUT",
        })
    }
}

/// Shape of a parameter in a handler signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Passed as a plain value.
    Value(ValueType),
    /// Passed as an output cell whose contents are of the given type.
    Holder(ValueType),
}

impl ParamType {
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Value(ty) | Self::Holder(ty) => *ty,
        }
    }

    #[must_use]
    pub fn is_holder(&self) -> bool {
        matches!(self, Self::Holder(_))
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(ty) => write!(f, "{ty}"),
            Self::Holder(ty) => write!(f, "Holder<{ty}>"),
        }
    }
}

// ---------------------------------------------------------------------------
// MethodSignature
// ---------------------------------------------------------------------------

/// Name, parameter shapes and return type of a handler method.
///
/// Two signatures are equal when name and parameter types match; the return
/// type does not take part, mirroring how an implementation overrides a
/// contract method.
#[derive(Debug, Clone)]
pub struct MethodSignature {
    name: String,
    params: Vec<ParamType>,
    returns: Option<ValueType>,
}

impl MethodSignature {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: None,
        }
    }

    /// Appends a plain value parameter.
    #[must_use]
    pub fn param(mut self, ty: ValueType) -> Self {
        self.params.push(ParamType::Value(ty));
        self
    }

    /// Appends an output-cell parameter.
    #[must_use]
    pub fn holder(mut self, ty: ValueType) -> Self {
        self.params.push(ParamType::Holder(ty));
        self
    }

    #[must_use]
    pub fn returns(mut self, ty: ValueType) -> Self {
        self.returns = Some(ty);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    /// Declared return type; `None` means void.
    #[must_use]
    pub fn return_type(&self) -> Option<ValueType> {
        self.returns
    }
}

impl PartialEq for MethodSignature {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.params == other.params
    }
}

impl Eq for MethodSignature {}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")?;
        match &self.returns {
            Some(ty) => write!(f, " -> {ty}"),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Names and addresses
// ---------------------------------------------------------------------------

/// XML element name with an optional namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub namespace: Option<String>,
    pub local_name: String,
}

impl QualifiedName {
    #[must_use]
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Empty namespaces are treated as absent.
    #[must_use]
    pub fn new(namespace: Option<&str>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            local_name: local_name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local_name),
            None => f.write_str(&self.local_name),
        }
    }
}

/// Where to find the handler of an operation at invocation time.
#[derive(Debug, Clone)]
pub struct HandlerAddress {
    /// Name of the endpoint in the endpoint registry.
    pub endpoint_name: String,
    /// Concrete type the endpoint was registered with.
    pub endpoint_type: TypeId,
    pub endpoint_type_name: &'static str,
    pub method: MethodSignature,
}

impl fmt::Display for HandlerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]::{}",
            self.endpoint_name, self.endpoint_type_name, self.method
        )
    }
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// Binding of one handler argument to a wire field.
#[derive(Debug, Clone)]
pub struct ParameterBinding {
    pub index: usize,
    pub wire_name: String,
    pub mode: ParamMode,
    pub target_type: ValueType,
}

/// Binding of the return value to a response field.
#[derive(Debug, Clone)]
pub struct ResultBinding {
    pub wire_name: String,
    pub value_type: ValueType,
}

/// Everything needed to route to, bind and invoke one operation.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    /// Unique routing key.
    pub action: String,
    pub address: HandlerAddress,
    /// Absent: parameters bind directly, one wire field each.
    pub request_wrapper: Option<Arc<WrapperType>>,
    /// Absent: the return value is the response.
    pub response_wrapper: Option<Arc<WrapperType>>,
    /// One per handler argument, in declaration order.
    pub parameters: Vec<ParameterBinding>,
    pub result: Option<ResultBinding>,
    /// Payload element that identifies this operation when no action is sent.
    pub payload_root: Option<QualifiedName>,
    /// Element a wrapped response is encoded under, when declared.
    pub response_root: Option<QualifiedName>,
}

impl OperationDescriptor {
    #[must_use]
    pub fn method(&self) -> &MethodSignature {
        &self.address.method
    }

    /// Name of the element carrying a direct (unwrapped) result.
    #[must_use]
    pub fn result_element(&self) -> String {
        self.result
            .as_ref()
            .map_or_else(|| self.default_response_element(), |r| r.wire_name.clone())
    }

    /// Name of the element a wrapped response is encoded under: the declared
    /// response root, else the wrapper's own root, else `<method>Response`.
    #[must_use]
    pub fn response_element(&self) -> String {
        self.response_root
            .as_ref()
            .or_else(|| self.response_wrapper.as_ref().and_then(|w| w.root()))
            .map_or_else(|| self.default_response_element(), |root| root.local_name.clone())
    }

    fn default_response_element(&self) -> String {
        format!("{}Response", self.method().name())
    }
}
