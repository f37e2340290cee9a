//! Wrapper binding tables.
//!
//! A wrapper is the single structured value a request or response payload
//! decodes to; its fields correspond one-to-one to an operation's parameters or
//! return value. [`WrapperType`] is the explicit table of typed getter and
//! setter closures for one wrapper struct, built once with
//! [`WrapperType::builder`] and consulted by wire name during binding.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::descriptor::QualifiedName;
use crate::value::{Value, ValueType};

type Getter = Box<dyn Fn(&Value) -> Option<Value> + Send + Sync>;
type Setter = Box<dyn Fn(&mut Value, Value) -> Result<(), Value> + Send + Sync>;
type DecodeFn = fn(&str) -> Result<Value, String>;
type EncodeFn = fn(&Value, &str) -> Result<String, String>;

// ---------------------------------------------------------------------------
// Accessor / Mutator
// ---------------------------------------------------------------------------

/// Typed read access to one wrapper field.
pub struct Accessor {
    name: String,
    value_type: ValueType,
    get: Getter,
}

impl Accessor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Reads the field off `wrapper`. `None` if `wrapper` is of another type.
    #[must_use]
    pub fn read(&self, wrapper: &Value) -> Option<Value> {
        (self.get)(wrapper)
    }
}

/// What a mutator is willing to store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepts {
    Exact(ValueType),
    /// Dynamic setter; compatible with every content type.
    Any,
}

/// Typed write access to one wrapper field.
pub struct Mutator {
    name: String,
    accepts: Accepts,
    set: Setter,
}

impl Mutator {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn accepts(&self) -> Accepts {
        self.accepts
    }

    /// Returns true if a value of type `ty` may be written through this mutator.
    #[must_use]
    pub fn is_compatible(&self, ty: TypeId) -> bool {
        match self.accepts {
            Accepts::Exact(expected) => expected.type_id() == ty,
            Accepts::Any => true,
        }
    }

    /// Writes `value` into `wrapper`.
    ///
    /// # Errors
    ///
    /// Hands `value` back if either the wrapper or the value has the wrong type.
    pub fn write(&self, wrapper: &mut Value, value: Value) -> Result<(), Value> {
        (self.set)(wrapper, value)
    }
}

// ---------------------------------------------------------------------------
// WrapperType
// ---------------------------------------------------------------------------

/// Binding table for a wrapper struct.
pub struct WrapperType {
    name: &'static str,
    type_id: TypeId,
    root: Option<QualifiedName>,
    construct: fn() -> Value,
    accessors: Vec<Accessor>,
    mutators: Vec<Mutator>,
    xml: Option<(DecodeFn, EncodeFn)>,
}

impl WrapperType {
    /// Starts a binding table for `T`.
    #[must_use]
    pub fn builder<T: Default + Any + Send + Sync>() -> WrapperTypeBuilder<T> {
        WrapperTypeBuilder {
            inner: Self {
                name: short_type_name::<T>(),
                type_id: TypeId::of::<T>(),
                root: None,
                construct: construct_default::<T>,
                accessors: Vec::new(),
                mutators: Vec::new(),
                xml: None,
            },
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Explicit payload root element name, if declared on the wrapper.
    #[must_use]
    pub fn root(&self) -> Option<&QualifiedName> {
        self.root.as_ref()
    }

    /// Returns true if `value` is an instance of this wrapper.
    #[must_use]
    pub fn is_instance(&self, value: &Value) -> bool {
        value.type_id() == self.type_id
    }

    /// A fresh, default-initialised wrapper value.
    #[must_use]
    pub fn instantiate(&self) -> Value {
        (self.construct)()
    }

    #[must_use]
    pub fn accessor(&self, wire_name: &str) -> Option<&Accessor> {
        self.accessors.iter().find(|a| a.name == wire_name)
    }

    /// All mutators registered under `wire_name`, in declaration order.
    pub fn mutators<'a>(&'a self, wire_name: &'a str) -> impl Iterator<Item = &'a Mutator> + 'a {
        self.mutators.iter().filter(move |m| m.name == wire_name)
    }

    /// First mutator named `wire_name` compatible with values of type `ty`.
    #[must_use]
    pub fn find_mutator(&self, wire_name: &str, ty: TypeId) -> Option<&Mutator> {
        self.mutators
            .iter()
            .find(|m| m.name == wire_name && m.is_compatible(ty))
    }

    #[must_use]
    pub fn supports_xml(&self) -> bool {
        self.xml.is_some()
    }

    /// Decodes a wrapper from its XML element. `None` if the wrapper has no XML form.
    #[must_use]
    pub fn decode_xml(&self, xml: &str) -> Option<Result<Value, String>> {
        self.xml.map(|(decode, _)| decode(xml))
    }

    /// Encodes a wrapper as an XML element named `root`. `None` if the wrapper has
    /// no XML form.
    #[must_use]
    pub fn encode_xml(&self, value: &Value, root: &str) -> Option<Result<String, String>> {
        self.xml.map(|(_, encode)| encode(value, root))
    }
}

impl fmt::Debug for WrapperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperType")
            .field("name", &self.name)
            .field("root", &self.root)
            .field(
                "accessors",
                &self.accessors.iter().map(Accessor::name).collect::<Vec<_>>(),
            )
            .field(
                "mutators",
                &self.mutators.iter().map(Mutator::name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// WrapperTypeBuilder
// ---------------------------------------------------------------------------

/// Typed builder for [`WrapperType`]. Closures receive the concrete wrapper.
pub struct WrapperTypeBuilder<T> {
    inner: WrapperType,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Default + Any + Send + Sync> WrapperTypeBuilder<T> {
    /// Declares the payload root element name.
    #[must_use]
    pub fn root(mut self, namespace: Option<&str>, local_name: &str) -> Self {
        self.inner.root = Some(QualifiedName::new(namespace, local_name));
        self
    }

    /// Registers a getter for `wire_name`.
    #[must_use]
    pub fn getter<F, G>(mut self, wire_name: &str, get: G) -> Self
    where
        F: Any + Send + Sync,
        G: Fn(&T) -> F + Send + Sync + 'static,
    {
        self.inner.accessors.push(Accessor {
            name: wire_name.to_string(),
            value_type: ValueType::of::<F>(),
            get: Box::new(move |wrapper: &Value| {
                wrapper.downcast_ref::<T>().map(|w| Value::new(get(w)))
            }),
        });
        self
    }

    /// Registers a setter for `wire_name` accepting exactly `F`.
    #[must_use]
    pub fn setter<F, S>(mut self, wire_name: &str, set: S) -> Self
    where
        F: Any + Send + Sync,
        S: Fn(&mut T, F) + Send + Sync + 'static,
    {
        self.inner.mutators.push(Mutator {
            name: wire_name.to_string(),
            accepts: Accepts::Exact(ValueType::of::<F>()),
            set: Box::new(move |wrapper: &mut Value, value: Value| {
                let Some(target) = wrapper.downcast_mut::<T>() else {
                    return Err(value);
                };
                set(target, value.downcast::<F>()?);
                Ok(())
            }),
        });
        self
    }

    /// Registers a setter for `wire_name` that inspects the value itself.
    #[must_use]
    pub fn dynamic_setter<S>(mut self, wire_name: &str, set: S) -> Self
    where
        S: Fn(&mut T, Value) -> Result<(), Value> + Send + Sync + 'static,
    {
        self.inner.mutators.push(Mutator {
            name: wire_name.to_string(),
            accepts: Accepts::Any,
            set: Box::new(move |wrapper: &mut Value, value: Value| match wrapper.downcast_mut::<T>() {
                Some(target) => set(target, value),
                None => Err(value),
            }),
        });
        self
    }

    /// Getter and setter for the same field.
    #[must_use]
    pub fn field<F, G, S>(self, wire_name: &str, get: G, set: S) -> Self
    where
        F: Any + Send + Sync,
        G: Fn(&T) -> F + Send + Sync + 'static,
        S: Fn(&mut T, F) + Send + Sync + 'static,
    {
        self.getter(wire_name, get).setter(wire_name, set)
    }

    /// Enables XML decoding/encoding through serde.
    #[must_use]
    pub fn xml(mut self) -> Self
    where
        T: Serialize + DeserializeOwned,
    {
        self.inner.xml = Some((decode_xml::<T>, encode_xml::<T>));
        self
    }

    #[must_use]
    pub fn build(self) -> WrapperType {
        self.inner
    }
}

fn construct_default<T: Default + Any + Send + Sync>() -> Value {
    Value::new(T::default())
}

fn decode_xml<T: DeserializeOwned + Any + Send + Sync>(xml: &str) -> Result<Value, String> {
    quick_xml::de::from_str::<T>(xml)
        .map(Value::new)
        .map_err(|e| e.to_string())
}

fn encode_xml<T: Serialize + Any>(value: &Value, root: &str) -> Result<String, String> {
    let wrapper = value.downcast_ref::<T>().ok_or_else(|| {
        format!(
            "expected {}, found {}",
            std::any::type_name::<T>(),
            value.type_name()
        )
    })?;
    quick_xml::se::to_string_with_root(root, wrapper).map_err(|e| e.to_string())
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Exchange {
        x: i32,
        z: i32,
        note: String,
    }

    fn exchange_type() -> WrapperType {
        WrapperType::builder::<Exchange>()
            .root(Some("urn:test"), "exchange")
            .field("x", |w: &Exchange| w.x, |w: &mut Exchange, v: i32| w.x = v)
            .field("z", |w: &Exchange| w.z, |w: &mut Exchange, v: i32| w.z = v)
            .setter("note", |w: &mut Exchange, v: String| w.note = v)
            .dynamic_setter("note", |w: &mut Exchange, v: Value| {
                let n = v.downcast::<i64>()?;
                w.note = format!("#{n}");
                Ok(())
            })
            .xml()
            .build()
    }

    #[test]
    fn accessor_reads_typed_field() {
        let ty = exchange_type();
        let wrapper = Value::new(Exchange {
            x: 5,
            ..Exchange::default()
        });
        let accessor = ty.accessor("x").unwrap();
        assert_eq!(accessor.value_type(), ValueType::of::<i32>());
        assert_eq!(accessor.read(&wrapper).unwrap().downcast_ref::<i32>(), Some(&5));
        assert!(ty.accessor("missing").is_none());
    }

    #[test]
    fn accessor_rejects_foreign_wrapper() {
        let ty = exchange_type();
        assert!(ty.accessor("x").unwrap().read(&Value::new(1_u8)).is_none());
    }

    #[test]
    fn exact_mutator_wins_over_later_dynamic_one() {
        let ty = exchange_type();
        let mut wrapper = ty.instantiate();
        let value = Value::new("hi".to_string());
        let mutator = ty.find_mutator("note", value.type_id()).unwrap();
        assert!(matches!(mutator.accepts(), Accepts::Exact(_)));
        mutator.write(&mut wrapper, value).unwrap();
        assert_eq!(wrapper.downcast_ref::<Exchange>().unwrap().note, "hi");
    }

    #[test]
    fn dynamic_mutator_is_compatible_fallback() {
        let ty = exchange_type();
        let mut wrapper = ty.instantiate();
        let value = Value::new(3_i64);
        let mutator = ty.find_mutator("note", value.type_id()).unwrap();
        assert_eq!(mutator.accepts(), Accepts::Any);
        mutator.write(&mut wrapper, value).unwrap();
        assert_eq!(wrapper.downcast_ref::<Exchange>().unwrap().note, "#3");
    }

    #[test]
    fn found_mutator_outlives_the_lookup_name() {
        let ty = exchange_type();
        let mutator = {
            let wire_name = String::from("note");
            ty.find_mutator(&wire_name, TypeId::of::<String>())
        };
        assert_eq!(mutator.map(Mutator::name), Some("note"));
        let accepts: Vec<_> = ty.mutators("note").map(Mutator::accepts).collect();
        assert_eq!(accepts, vec![Accepts::Exact(ValueType::of::<String>()), Accepts::Any]);
    }

    #[test]
    fn no_compatible_mutator() {
        let ty = exchange_type();
        assert!(ty.find_mutator("x", TypeId::of::<String>()).is_none());
        assert!(ty.find_mutator("y", TypeId::of::<i32>()).is_none());
    }

    #[test]
    fn xml_hooks_round_trip_through_serde() {
        let ty = exchange_type();
        let decoded = ty
            .decode_xml("<exchange><x>5</x><z>7</z><note>n</note></exchange>")
            .unwrap()
            .unwrap();
        let exchange = decoded.downcast_ref::<Exchange>().unwrap();
        assert_eq!((exchange.x, exchange.z), (5, 7));

        let xml = ty.encode_xml(&decoded, "exchangeResponse").unwrap().unwrap();
        assert!(xml.starts_with("<exchangeResponse>"));
        assert!(xml.contains("<z>7</z>"));
    }

    #[test]
    fn wrapper_metadata() {
        let ty = exchange_type();
        assert_eq!(ty.name(), "Exchange");
        assert_eq!(ty.root().unwrap().local_name, "exchange");
        assert!(ty.is_instance(&ty.instantiate()));
        assert!(ty.supports_xml());
    }
}
