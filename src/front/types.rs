//! Source-level types.
//!
//! Types are cheap to clone (array/function types nest behind `Rc`) so that
//! the same type instance can be shared between a symbol table entry and the
//! expression it types, matching the reference's "types are shared" symbol
//! table ownership policy.

use std::rc::Rc;

use crate::common::WORD_SIZE;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    Void,
    /// `len = None` marks a decayed pointer parameter (e.g. `int a[]`).
    Array { elem: Rc<Type>, len: Option<usize> },
    Func { ret: Rc<Type>, params: Vec<Type> },
}

impl Type {
    pub fn array(elem: Type, len: Option<usize>) -> Type {
        Type::Array {
            elem: Rc::new(elem),
            len,
        }
    }

    pub fn func(ret: Type, params: Vec<Type>) -> Type {
        Type::Func {
            ret: Rc::new(ret),
            params,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    /// Byte size of one value of this type, for `Decl`. Only meaningful for
    /// `Int` and sized `Array`s.
    pub fn byte_size(&self) -> Option<i32> {
        match self {
            Type::Int => Some(WORD_SIZE),
            Type::Array {
                elem,
                len: Some(len),
            } => elem.byte_size().map(|sz| sz * *len as i32),
            _ => None,
        }
    }

    /// The element size used when indexing one dimension into this type: the
    /// size of the element type if this is an array, or the size of the
    /// pointee if this is a decayed-pointer (unsized array) type.
    pub fn index_elem_size(&self) -> Option<i32> {
        match self {
            Type::Array { elem, .. } => elem.byte_size().or_else(|| elem.index_elem_size()),
            _ => None,
        }
    }

    pub fn elem_type(&self) -> Option<&Type> {
        match self {
            Type::Array { elem, .. } => Some(elem),
            _ => None,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Void => write!(f, "void"),
            Type::Array { elem, len: Some(n) } => write!(f, "{elem}[{n}]"),
            Type::Array { elem, len: None } => write!(f, "{elem}[]"),
            Type::Func { ret, params } => {
                write!(f, "{ret}(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
        }
    }
}
