//! Parameter binding between wrapper values and handler arguments.
//!
//! Binding is pure: no I/O and no state outside its inputs. The same
//! descriptor and payload always produce the same arguments.

use std::sync::Arc;

use actionwire_core::{
    Argument, BoundArguments, OperationDescriptor, OutputCell, ParamMode, ParameterBinding,
    Value, WrapperType,
};
use tracing::trace;

use super::operation::{BindingError, ResponsePayload};

// ---------------------------------------------------------------------------
// Unwrap
// ---------------------------------------------------------------------------

/// Unwraps a decoded request wrapper into one argument per parameter binding:
/// IN reads the accessor value, OUT gets an empty cell, INOUT gets a cell
/// around the accessor value.
///
/// # Errors
///
/// - `EmptyPayload` when there is no wrapper to unwrap.
/// - `WrapperTypeMismatch` when the wrapper is not an instance of `wrapper_type`.
/// - `MissingAccessor` when an input binding has no accessor.
pub fn bind_arguments(
    descriptor: &OperationDescriptor,
    wrapper_type: &WrapperType,
    wrapper: Option<Value>,
) -> Result<BoundArguments, BindingError> {
    let wrapper = wrapper.ok_or(BindingError::EmptyPayload {
        wrapper: wrapper_type.name(),
    })?;
    if !wrapper_type.is_instance(&wrapper) {
        return Err(BindingError::WrapperTypeMismatch {
            wrapper: wrapper_type.name(),
            actual: wrapper.type_name(),
        });
    }

    let mut args = Vec::with_capacity(descriptor.parameters.len());
    for binding in &descriptor.parameters {
        let arg = match binding.mode {
            ParamMode::In => Argument::Value(read_field(wrapper_type, &wrapper, binding)?),
            ParamMode::Out => Argument::Cell(OutputCell::new()),
            ParamMode::InOut => {
                Argument::Cell(OutputCell::with(read_field(wrapper_type, &wrapper, binding)?))
            }
        };
        trace!(
            wrapper = wrapper_type.name(),
            field = %binding.wire_name,
            mode = %binding.mode,
            "bound argument {}",
            binding.index
        );
        args.push(arg);
    }
    Ok(BoundArguments::new(args, Some(wrapper)))
}

/// Binds parameters one by one through `resolve` when the operation has no
/// request wrapper. OUT parameters get an empty cell and are never resolved.
///
/// # Errors
///
/// Propagates the first error returned by `resolve`.
pub fn bind_direct<E>(
    descriptor: &OperationDescriptor,
    mut resolve: impl FnMut(&ParameterBinding) -> Result<Value, E>,
) -> Result<BoundArguments, E> {
    let args = descriptor
        .parameters
        .iter()
        .map(|binding| -> Result<Argument, E> {
            Ok(match binding.mode {
                ParamMode::In => Argument::Value(resolve(binding)?),
                ParamMode::Out => Argument::Cell(OutputCell::new()),
                ParamMode::InOut => Argument::Cell(OutputCell::with(resolve(binding)?)),
            })
        })
        .collect::<Result<Vec<_>, E>>()?;
    Ok(BoundArguments::new(args, None))
}

fn read_field(
    wrapper_type: &WrapperType,
    wrapper: &Value,
    binding: &ParameterBinding,
) -> Result<Value, BindingError> {
    let accessor =
        wrapper_type
            .accessor(&binding.wire_name)
            .ok_or_else(|| BindingError::MissingAccessor {
                wrapper: wrapper_type.name(),
                wire_name: binding.wire_name.clone(),
            })?;
    accessor
        .read(wrapper)
        .ok_or(BindingError::WrapperTypeMismatch {
            wrapper: wrapper_type.name(),
            actual: wrapper.type_name(),
        })
}

// ---------------------------------------------------------------------------
// Wrap
// ---------------------------------------------------------------------------

/// Builds the response from what the handler handed back.
///
/// With a response wrapper, a fresh wrapper receives the return value (when
/// the method is non-void and maps its result) and the contents of every
/// filled OUT/INOUT cell. Empty cells leave their field untouched. Without
/// one, the return value itself is the response.
///
/// # Errors
///
/// - `ArityMismatch` when the handler returned a different number of arguments.
/// - `InvalidOutputBinding` when an output argument is not a cell.
/// - `MissingMutator` when no mutator accepts a value.
/// - `ReturnTypeMismatch` when a direct return value contradicts the signature.
pub fn bind_response(
    descriptor: &OperationDescriptor,
    arguments: BoundArguments,
    returned: Option<Value>,
) -> Result<ResponsePayload, BindingError> {
    let Some(wrapper_type) = &descriptor.response_wrapper else {
        return bind_direct_response(descriptor, returned);
    };

    let mut wrapper = wrapper_type.instantiate();
    if let (Some(_), Some(result), Some(value)) = (
        descriptor.method().return_type(),
        descriptor.result.as_ref(),
        returned,
    ) {
        write_field(wrapper_type, &mut wrapper, &result.wire_name, value)?;
    }

    let (args, _) = arguments.into_parts();
    if args.len() != descriptor.parameters.len() {
        return Err(BindingError::ArityMismatch {
            expected: descriptor.parameters.len(),
            actual: args.len(),
        });
    }
    for (binding, arg) in descriptor.parameters.iter().zip(args) {
        if !binding.mode.is_output() {
            continue;
        }
        let Argument::Cell(cell) = arg else {
            return Err(BindingError::InvalidOutputBinding {
                index: binding.index,
                wire_name: binding.wire_name.clone(),
            });
        };
        match cell.into_inner() {
            Some(value) => write_field(wrapper_type, &mut wrapper, &binding.wire_name, value)?,
            None => trace!(field = %binding.wire_name, "output cell left empty"),
        }
    }

    Ok(ResponsePayload::Wrapped {
        value: wrapper,
        wrapper: Arc::clone(wrapper_type),
        element: descriptor.response_element(),
    })
}

fn bind_direct_response(
    descriptor: &OperationDescriptor,
    returned: Option<Value>,
) -> Result<ResponsePayload, BindingError> {
    let method = descriptor.method();
    match (method.return_type(), returned) {
        (None, Some(value)) => Err(BindingError::ReturnTypeMismatch {
            method: method.to_string(),
            declared: "void",
            actual: value.type_name(),
        }),
        (Some(declared), Some(value)) if !declared.accepts(&value) => {
            Err(BindingError::ReturnTypeMismatch {
                method: method.to_string(),
                declared: declared.name(),
                actual: value.type_name(),
            })
        }
        (Some(value_type), Some(value)) => Ok(ResponsePayload::Direct {
            value,
            value_type,
            element: descriptor.result_element(),
        }),
        (_, None) => Ok(ResponsePayload::Empty),
    }
}

/// Writes `value` through the first mutator registered for `wire_name` that
/// accepts its type.
fn write_field(
    wrapper_type: &WrapperType,
    wrapper: &mut Value,
    wire_name: &str,
    value: Value,
) -> Result<(), BindingError> {
    let missing = |value_type: &'static str| BindingError::MissingMutator {
        wrapper: wrapper_type.name(),
        wire_name: wire_name.to_string(),
        value_type,
    };
    let Some(mutator) = wrapper_type.find_mutator(wire_name, value.type_id()) else {
        return Err(missing(value.type_name()));
    };
    trace!(
        wrapper = wrapper_type.name(),
        field = wire_name,
        accepts = ?mutator.accepts(),
        "writing response field"
    );
    mutator
        .write(wrapper, value)
        .map_err(|rejected| missing(rejected.type_name()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
