use std::fmt;

use crate::ir::{Type, TypeId};

use super::EvalError;

/// Index into the interpreter heap.
pub type Handle = usize;

/// A runtime value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Void,
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Real(f64),
    Str(String),
    Array(Handle),
    Object(Handle),
    /// Opaque carrier bytes produced by `cast_to_void_star`.
    Bundle(Vec<u8>),
}

/// Heap cell behind an array or object handle.
#[derive(Clone, Debug)]
pub enum HeapCell {
    Array(Vec<Value>),
    Object { ty: TypeId, fields: Vec<Value> },
    /// Strings only live on the heap while they travel in a bundle.
    Str(String),
}

impl Value {
    /// Zero value of a type.
    pub fn default_of(ty: &Type) -> Value {
        match ty {
            Type::Void => Value::Void,
            Type::Bool => Value::Bool(false),
            Type::Int => Value::Int(0),
            Type::UInt => Value::UInt(0),
            Type::Real => Value::Real(0.0),
            Type::CString => Value::Str(String::new()),
            Type::Ref(inner) => Value::default_of(inner),
            Type::CVoidPtr | Type::Wide(_) | Type::Array(_) | Type::Class(_) => Value::Nil,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Real(_) => "real",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Bundle(_) => "bundle",
        }
    }

    /// Integer view; booleans count as 0 or 1.
    pub fn as_int(&self) -> Result<i64, EvalError> {
        match self {
            Value::Int(v) => Ok(*v),
            Value::UInt(v) => i64::try_from(*v).map_err(|_| EvalError::Overflow),
            Value::Bool(b) => Ok(i64::from(*b)),
            other => Err(EvalError::TypeMismatch {
                expected: "int",
                found: other.kind(),
            }),
        }
    }

    pub fn as_real(&self) -> Result<f64, EvalError> {
        match self {
            Value::Real(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            Value::UInt(v) => Ok(*v as f64),
            Value::Bool(b) => Ok(f64::from(u8::from(*b))),
            other => Err(EvalError::TypeMismatch {
                expected: "real",
                found: other.kind(),
            }),
        }
    }

    pub fn truthy(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(v) => Ok(*v != 0),
            Value::UInt(v) => Ok(*v != 0),
            other => Err(EvalError::TypeMismatch {
                expected: "bool",
                found: other.kind(),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "()"),
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{:?}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(h) => write!(f, "<array {}>", h),
            Value::Object(h) => write!(f, "<object {}>", h),
            Value::Bundle(b) => write!(f, "<bundle {} bytes>", b.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_coercions() {
        assert_eq!(Value::default_of(&Type::Real), Value::Real(0.0));
        assert_eq!(Value::default_of(&Type::Array(Box::new(Type::Int))), Value::Nil);
        assert_eq!(Value::Bool(true).as_int().expect("int"), 1);
        assert_eq!(Value::Int(3).as_real().expect("real"), 3.0);
        assert!(Value::Str("x".into()).as_int().is_err());
        assert_eq!(Value::Real(2.0).to_string(), "2.0");
    }
}
