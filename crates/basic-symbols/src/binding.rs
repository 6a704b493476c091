//! What a name resolves to once found: a scalar, an array, or a structure
//! instance.

use basic_core::{StrRef, Value};
use std::rc::Rc;

fn default_for(kind: FieldType) -> Value {
    match kind {
        FieldType::Int => Value::Int(0),
        FieldType::Float => Value::Float(0.0),
        FieldType::Str => Value::Str(StrRef::heap(basic_memory::Addr::NULL, 0)),
    }
}

/// The element type of a declared array, or a structure field.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FieldType {
    Int,
    Float,
    Str,
}

/// A structure template: `DIM point{x%, y%, label$}` creates one of these
/// once, and every `point{}` variable (or array element) shares it.
#[derive(Clone, Debug)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<(String, FieldType)>,
}

impl StructDef {
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }
}

/// An array's declared element kind and shape, plus its flattened,
/// row-major data.
#[derive(Clone, Debug)]
pub struct ArrayBinding {
    pub kind: FieldType,
    pub dims: Vec<usize>,
    pub data: Vec<Value>,
}

impl ArrayBinding {
    /// # Errors
    /// Returns `None` if any dimension is zero, since every array here has
    /// rank at least 1 with a positive extent in each dimension.
    #[must_use]
    pub fn new(kind: FieldType, dims: Vec<usize>, fill: Value) -> Option<Self> {
        if dims.is_empty() || dims.iter().any(|&d| d == 0) {
            return None;
        }
        let total: usize = dims.iter().product();
        Some(Self {
            kind,
            dims,
            data: vec![fill; total],
        })
    }

    /// Flatten a multi-dimensional subscript to an index into `data`,
    /// row-major (last dimension varies fastest).
    #[must_use]
    pub fn flat_index(&self, subscripts: &[usize]) -> Option<usize> {
        if subscripts.len() != self.dims.len() {
            return None;
        }
        let mut index = 0usize;
        for (sub, dim) in subscripts.iter().zip(&self.dims) {
            if sub >= dim {
                return None;
            }
            index = index * dim + sub;
        }
        Some(index)
    }
}

/// A structure instance: field values in the order its [`StructDef`]
/// declares them.
#[derive(Clone, Debug)]
pub struct StructInstance {
    pub def: Rc<StructDef>,
    pub fields: Vec<Value>,
}

impl StructInstance {
    /// Each field starts at its own declared type's zero value (`0`, `0.0`
    /// or `""`), not a single value shared across mixed-type fields.
    #[must_use]
    pub fn new(def: Rc<StructDef>) -> Self {
        let fields = def.fields.iter().map(|(_, kind)| default_for(*kind)).collect();
        Self { fields, def }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.def.field_index(field).and_then(|i| self.fields.get(i))
    }

    pub fn set(&mut self, field: &str, value: Value) -> Option<()> {
        let i = self.def.field_index(field)?;
        *self.fields.get_mut(i)? = value;
        Some(())
    }
}

/// What a resolved name actually holds.
#[derive(Clone, Debug)]
pub enum Binding {
    Scalar(Value),
    Array(ArrayBinding),
    Struct(StructInstance),
}

impl Binding {
    #[must_use]
    pub const fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_array(&self) -> Option<&ArrayBinding> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub const fn as_array_mut(&mut self) -> Option<&mut ArrayBinding> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }
}
