//! Type-erased values flowing between payload wrappers and handler arguments.

use std::any::{Any, TypeId};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// An owned value of any `'static` type.
///
/// Wrapper fields, handler arguments and return values all travel as `Value`.
/// The concrete type is recovered with [`Value::downcast_ref`] or
/// [`Value::downcast`]; the type name is kept for diagnostics.
pub struct Value {
    inner: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wraps a concrete value.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Box::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// `TypeId` of the wrapped value (not of the box).
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.inner.as_ref().type_id()
    }

    /// Name of the wrapped value's type, as reported by `std::any::type_name`.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.inner.downcast_mut::<T>()
    }

    /// Unwraps the concrete value.
    ///
    /// # Errors
    ///
    /// Returns the original `Value` unchanged if it does not hold a `T`.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        match self.inner.downcast::<T>() {
            Ok(boxed) => Ok(*boxed),
            Err(inner) => Err(Self { inner, type_name }),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value<{}>", self.type_name)
    }
}

// ---------------------------------------------------------------------------
// ValueType
// ---------------------------------------------------------------------------

type ParseFn = fn(&str) -> Result<Value, String>;
type RenderFn = fn(&Value) -> Option<String>;

/// Runtime token describing the type of a parameter, field or return value.
///
/// Equality is by `TypeId` only. Scalar types created through
/// [`ValueType::text`] additionally know how to parse themselves from element
/// text and render themselves back, which is what direct (unwrapped) parameter
/// binding relies on.
#[derive(Clone, Copy)]
pub struct ValueType {
    type_id: TypeId,
    name: &'static str,
    parse: Option<ParseFn>,
    render: Option<RenderFn>,
}

impl ValueType {
    /// Opaque type token without text conversion.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            parse: None,
            render: None,
        }
    }

    /// Type token for a scalar that round-trips through its textual form.
    #[must_use]
    pub fn text<T>() -> Self
    where
        T: Any + Send + Sync + FromStr + fmt::Display,
        T::Err: fmt::Display,
    {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            parse: Some(parse_text::<T>),
            render: Some(render_text::<T>),
        }
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if `value` holds exactly this type.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        value.type_id() == self.type_id
    }

    /// Parses element text into a value of this type.
    ///
    /// Returns `None` when the type has no text form.
    #[must_use]
    pub fn parse(&self, text: &str) -> Option<Result<Value, String>> {
        self.parse.map(|parse| parse(text.trim()))
    }

    /// Renders a value of this type as element text.
    ///
    /// Returns `None` when the type has no text form or `value` is of another type.
    #[must_use]
    pub fn render(&self, value: &Value) -> Option<String> {
        self.render.and_then(|render| render(value))
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ValueType {}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form: `alloc::string::String` -> `String`.
        f.write_str(self.name.rsplit("::").next().unwrap_or(self.name))
    }
}

fn parse_text<T>(text: &str) -> Result<Value, String>
where
    T: Any + Send + Sync + FromStr,
    T::Err: fmt::Display,
{
    text.parse::<T>().map(Value::new).map_err(|e| e.to_string())
}

fn render_text<T: Any + fmt::Display>(value: &Value) -> Option<String> {
    value.downcast_ref::<T>().map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_recovers_concrete_value() {
        let value = Value::new(42_i32);
        assert!(value.is::<i32>());
        assert_eq!(value.type_id(), TypeId::of::<i32>());
        assert_eq!(value.downcast::<i32>().unwrap(), 42);
    }

    #[test]
    fn failed_downcast_returns_original() {
        let value = Value::new("hello".to_string());
        let value = value.downcast::<i32>().unwrap_err();
        assert_eq!(value.downcast_ref::<String>().unwrap(), "hello");
    }

    #[test]
    fn text_type_parses_and_renders() {
        let ty = ValueType::text::<i64>();
        let parsed = ty.parse(" 17 ").unwrap().unwrap();
        assert_eq!(parsed.downcast_ref::<i64>(), Some(&17));
        assert_eq!(ty.render(&parsed).as_deref(), Some("17"));
        assert!(ty.parse("seventeen").unwrap().is_err());
    }

    #[test]
    fn opaque_type_has_no_text_form() {
        let ty = ValueType::of::<Vec<u8>>();
        assert!(ty.parse("abc").is_none());
        assert!(ty.render(&Value::new(vec![1_u8])).is_none());
    }

    #[test]
    fn value_types_compare_by_type_id() {
        assert_eq!(ValueType::of::<String>(), ValueType::text::<String>());
        assert_ne!(ValueType::of::<i32>(), ValueType::of::<i64>());
        assert_eq!(ValueType::of::<String>().to_string(), "String");
    }
}
