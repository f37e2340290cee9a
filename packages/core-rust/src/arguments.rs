//! Output cells and the per-invocation argument vector.
//!
//! A handler receives its arguments by value inside [`BoundArguments`] and hands
//! them back inside an [`Invocation`]. OUT and INOUT parameters travel as
//! [`OutputCell`]s the handler fills or replaces; the response binder reads the
//! returned cells, so nothing is shared between caller and callee.

use std::any::Any;

use crate::value::Value;

// ---------------------------------------------------------------------------
// OutputCell
// ---------------------------------------------------------------------------

/// One-slot container carrying a value out of a call.
#[derive(Debug, Default)]
pub struct OutputCell {
    value: Option<Value>,
}

impl OutputCell {
    /// Creates an empty cell (OUT parameters).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cell holding an initial value (INOUT parameters).
    #[must_use]
    pub fn with(value: Value) -> Self {
        Self { value: Some(value) }
    }

    #[must_use]
    pub fn get(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Replaces the contents, returning the previous value.
    pub fn set(&mut self, value: Value) -> Option<Value> {
        self.value.replace(value)
    }

    pub fn take(&mut self) -> Option<Value> {
        self.value.take()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    #[must_use]
    pub fn into_inner(self) -> Option<Value> {
        self.value
    }
}

// ---------------------------------------------------------------------------
// Argument
// ---------------------------------------------------------------------------

/// A single handler argument.
#[derive(Debug)]
pub enum Argument {
    /// Plain input value.
    Value(Value),
    /// Output cell for OUT / INOUT parameters.
    Cell(OutputCell),
    /// Input value already moved out by the handler.
    Taken,
}

impl Argument {
    fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Cell(_) | Self::Taken => None,
        }
    }

    pub fn as_cell(&self) -> Option<&OutputCell> {
        match self {
            Self::Cell(cell) => Some(cell),
            Self::Value(_) | Self::Taken => None,
        }
    }
}

/// Misuse of [`BoundArguments`] accessors from handler code.
#[derive(Debug, thiserror::Error)]
pub enum ArgumentError {
    #[error("argument index {index} out of range ({len} arguments)")]
    OutOfRange { index: usize, len: usize },
    #[error("argument {index} is an output cell, not a value")]
    NotAValue { index: usize },
    #[error("argument {index} is not an output cell")]
    NotACell { index: usize },
    #[error("argument {index} was already taken")]
    Taken { index: usize },
    #[error("argument {index} holds {actual}, expected {expected}")]
    TypeMismatch {
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },
}

// ---------------------------------------------------------------------------
// BoundArguments
// ---------------------------------------------------------------------------

/// Ordered arguments for one invocation plus the request wrapper they came from.
#[derive(Debug, Default)]
pub struct BoundArguments {
    args: Vec<Argument>,
    wrapper: Option<Value>,
}

impl BoundArguments {
    #[must_use]
    pub fn new(args: Vec<Argument>, wrapper: Option<Value>) -> Self {
        Self { args, wrapper }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Argument> {
        self.args.get(index)
    }

    #[must_use]
    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    /// The request wrapper the arguments were unwrapped from, if any.
    #[must_use]
    pub fn wrapper(&self) -> Option<&Value> {
        self.wrapper.as_ref()
    }

    /// Borrows the input value at `index` as a `T`.
    ///
    /// # Errors
    ///
    /// Fails if the index is out of range, the argument is a cell, or it holds
    /// another type.
    pub fn value<T: Any>(&self, index: usize) -> Result<&T, ArgumentError> {
        match self.slot(index)? {
            Argument::Taken => Err(ArgumentError::Taken { index }),
            arg => {
                let value = arg.as_value().ok_or(ArgumentError::NotAValue { index })?;
                downcast_arg(value, index)
            }
        }
    }

    /// Moves the input value at `index` out as a `T`. Later reads of the same
    /// index fail with `ArgumentError::Taken`.
    ///
    /// # Errors
    ///
    /// Same as [`BoundArguments::value`]; on error the argument stays in place.
    pub fn take<T: Any>(&mut self, index: usize) -> Result<T, ArgumentError> {
        self.value::<T>(index)?;
        let Some(slot) = self.args.get_mut(index) else {
            return Err(ArgumentError::OutOfRange {
                index,
                len: self.args.len(),
            });
        };
        match std::mem::replace(slot, Argument::Taken) {
            Argument::Value(value) => value.downcast::<T>().map_err(|value| {
                let actual = value.type_name();
                *slot = Argument::Value(value);
                ArgumentError::TypeMismatch {
                    index,
                    expected: std::any::type_name::<T>(),
                    actual,
                }
            }),
            other => {
                *slot = other;
                Err(ArgumentError::NotAValue { index })
            }
        }
    }

    /// Borrows the output cell at `index`.
    ///
    /// # Errors
    ///
    /// Fails if the index is out of range or the argument is not a cell.
    pub fn cell(&self, index: usize) -> Result<&OutputCell, ArgumentError> {
        self.slot(index)?
            .as_cell()
            .ok_or(ArgumentError::NotACell { index })
    }

    /// Borrows the contents of the cell at `index`, if it has any.
    ///
    /// # Errors
    ///
    /// Fails if the index is out of range, the argument is not a cell, or the cell
    /// holds another type.
    pub fn cell_value<T: Any>(&self, index: usize) -> Result<Option<&T>, ArgumentError> {
        self.cell(index)?
            .get()
            .map(|v| downcast_arg(v, index))
            .transpose()
    }

    /// Mutable access to the cell at `index`.
    ///
    /// # Errors
    ///
    /// Fails if the index is out of range or the argument is not a cell.
    pub fn cell_mut(&mut self, index: usize) -> Result<&mut OutputCell, ArgumentError> {
        let len = self.args.len();
        match self.args.get_mut(index) {
            Some(Argument::Cell(cell)) => Ok(cell),
            Some(Argument::Value(_) | Argument::Taken) => Err(ArgumentError::NotACell { index }),
            None => Err(ArgumentError::OutOfRange { index, len }),
        }
    }

    /// Stores `value` into the cell at `index`.
    ///
    /// # Errors
    ///
    /// Same as [`BoundArguments::cell_mut`].
    pub fn set_output<T: Any + Send + Sync>(
        &mut self,
        index: usize,
        value: T,
    ) -> Result<(), ArgumentError> {
        self.cell_mut(index)?.set(Value::new(value));
        Ok(())
    }

    /// Splits into the argument vector and the originating wrapper.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Argument>, Option<Value>) {
        (self.args, self.wrapper)
    }

    fn slot(&self, index: usize) -> Result<&Argument, ArgumentError> {
        self.args.get(index).ok_or(ArgumentError::OutOfRange {
            index,
            len: self.args.len(),
        })
    }
}

fn downcast_arg<T: Any>(value: &Value, index: usize) -> Result<&T, ArgumentError> {
    value
        .downcast_ref::<T>()
        .ok_or_else(|| ArgumentError::TypeMismatch {
            index,
            expected: std::any::type_name::<T>(),
            actual: value.type_name(),
        })
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// What a handler hands back: its arguments (cells possibly filled) and an
/// optional return value.
#[derive(Debug)]
pub struct Invocation {
    pub arguments: BoundArguments,
    pub returned: Option<Value>,
}

impl Invocation {
    /// A void completion.
    #[must_use]
    pub fn new(arguments: BoundArguments) -> Self {
        Self {
            arguments,
            returned: None,
        }
    }

    /// Attaches a return value.
    #[must_use]
    pub fn returning<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.returned = Some(Value::new(value));
        self
    }
}
