//! Type representation for checked Go code
//!
//! `Type` equality is type identity: parameter names, field positions and
//! method positions do not take part in comparisons. Named types live in the
//! session's [`Env`](crate::env::Env) and are compared by handle.

use std::rc::Rc;

use crate::ast::{ChanDir, Pos};
use crate::env::NamedId;

/// Predeclared basic types plus the untyped constant kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    String,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    pub fn name(&self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::String => "string",
            BasicKind::UntypedBool => "untyped bool",
            BasicKind::UntypedInt => "untyped int",
            BasicKind::UntypedRune => "untyped rune",
            BasicKind::UntypedFloat => "untyped float",
            BasicKind::UntypedString => "untyped string",
            BasicKind::UntypedNil => "untyped nil",
        }
    }

    pub fn is_untyped(&self) -> bool {
        matches!(
            self,
            BasicKind::UntypedBool
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
                | BasicKind::UntypedFloat
                | BasicKind::UntypedString
                | BasicKind::UntypedNil
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            BasicKind::Int
                | BasicKind::Int8
                | BasicKind::Int16
                | BasicKind::Int32
                | BasicKind::Int64
                | BasicKind::Uint
                | BasicKind::Uint8
                | BasicKind::Uint16
                | BasicKind::Uint32
                | BasicKind::Uint64
                | BasicKind::Uintptr
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
        )
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            BasicKind::Uint
                | BasicKind::Uint8
                | BasicKind::Uint16
                | BasicKind::Uint32
                | BasicKind::Uint64
                | BasicKind::Uintptr
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, BasicKind::Float32 | BasicKind::Float64 | BasicKind::UntypedFloat)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_string(&self) -> bool {
        matches!(self, BasicKind::String | BasicKind::UntypedString)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, BasicKind::Bool | BasicKind::UntypedBool)
    }

    pub fn is_ordered(&self) -> bool {
        self.is_numeric() || self.is_string()
    }

    /// Size in bits of a sized numeric kind; `int` and `uint` are 64 bits
    pub fn bits(&self) -> Option<u32> {
        match self {
            BasicKind::Int8 | BasicKind::Uint8 => Some(8),
            BasicKind::Int16 | BasicKind::Uint16 => Some(16),
            BasicKind::Int32 | BasicKind::Uint32 | BasicKind::Float32 => Some(32),
            BasicKind::Int | BasicKind::Int64 | BasicKind::Uint | BasicKind::Uint64 | BasicKind::Uintptr | BasicKind::Float64 => {
                Some(64)
            }
            _ => None,
        }
    }

    /// Inclusive value range of a typed integer kind
    pub fn int_range(&self) -> Option<(i128, i128)> {
        let bits = self.bits()?;
        if !self.is_integer() {
            return None;
        }
        if self.is_unsigned() {
            Some((0, (1i128 << bits) - 1))
        } else {
            Some((-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1))
        }
    }

    /// The type an untyped constant takes when nothing forces another
    pub fn default_kind(&self) -> BasicKind {
        match self {
            BasicKind::UntypedBool => BasicKind::Bool,
            BasicKind::UntypedInt => BasicKind::Int,
            BasicKind::UntypedRune => BasicKind::Int32,
            BasicKind::UntypedFloat => BasicKind::Float64,
            BasicKind::UntypedString => BasicKind::String,
            other => *other,
        }
    }

    /// Ranks untyped numeric kinds: int < rune < float
    pub fn untyped_rank(&self) -> u8 {
        match self {
            BasicKind::UntypedInt => 1,
            BasicKind::UntypedRune => 2,
            BasicKind::UntypedFloat => 3,
            _ => 0,
        }
    }
}

/// A struct field
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub typ: Type,
    pub embedded: bool,
    pub pos: Pos,
}

impl PartialEq for FieldInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.embedded == other.embedded && self.typ == other.typ
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructType {
    pub fields: Vec<FieldInfo>,
}

/// A parameter or result
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub typ: Type,
}

impl Param {
    pub fn new(name: impl Into<String>, typ: Type) -> Self {
        Param { name: name.into(), typ }
    }

    pub fn unnamed(typ: Type) -> Self {
        Param {
            name: String::new(),
            typ,
        }
    }
}

/// A function or method signature. For a variadic signature the last
/// parameter has slice type.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub recv: Option<Param>,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub variadic: bool,
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.variadic == other.variadic
            && self.params.len() == other.params.len()
            && self.results.len() == other.results.len()
            && self.params.iter().zip(&other.params).all(|(a, b)| a.typ == b.typ)
            && self.results.iter().zip(&other.results).all(|(a, b)| a.typ == b.typ)
    }
}

impl Signature {
    pub fn params_tuple(&self) -> Type {
        Type::tuple(self.params.iter().map(|p| p.typ.clone()).collect())
    }

    /// The call result: no value, a single type or a tuple
    pub fn result_type(&self) -> Type {
        match self.results.len() {
            1 => self.results[0].typ.clone(),
            _ => Type::tuple(self.results.iter().map(|p| p.typ.clone()).collect()),
        }
    }
}

/// An interface method
#[derive(Debug, Clone)]
pub struct MethodSig {
    pub name: String,
    pub sig: Rc<Signature>,
    pub pos: Pos,
}

impl PartialEq for MethodSig {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.sig == other.sig
    }
}

#[derive(Debug, Clone, Default)]
pub struct InterfaceType {
    /// Explicitly declared methods
    pub methods: Vec<MethodSig>,
    pub embeddeds: Vec<Type>,
    /// Complete method set including embedded interfaces, sorted by name
    pub all_methods: Vec<MethodSig>,
}

impl PartialEq for InterfaceType {
    fn eq(&self, other: &Self) -> bool {
        self.all_methods == other.all_methods
    }
}

impl InterfaceType {
    pub fn is_empty(&self) -> bool {
        self.all_methods.is_empty()
    }

    pub fn method(&self, name: &str) -> Option<&MethodSig> {
        self.all_methods.iter().find(|m| m.name == name)
    }

    /// An interface whose method set is already complete
    pub fn with_methods(mut methods: Vec<MethodSig>) -> Self {
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        InterfaceType {
            all_methods: methods.clone(),
            methods,
            embeddeds: Vec::new(),
        }
    }
}

/// A Go type
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// The type of erroneous expressions; compatible with everything
    Invalid,
    Basic(BasicKind),
    Pointer(Rc<Type>),
    Array(i64, Rc<Type>),
    Slice(Rc<Type>),
    Map(Rc<Type>, Rc<Type>),
    Chan(ChanDir, Rc<Type>),
    Struct(Rc<StructType>),
    /// Multiple values, as produced by calls and comma-ok forms
    Tuple(Rc<Vec<Type>>),
    Signature(Rc<Signature>),
    Interface(Rc<InterfaceType>),
    Named(NamedId),
}

impl Type {
    pub fn int() -> Type {
        Type::Basic(BasicKind::Int)
    }

    pub fn bool() -> Type {
        Type::Basic(BasicKind::Bool)
    }

    pub fn string() -> Type {
        Type::Basic(BasicKind::String)
    }

    pub fn float64() -> Type {
        Type::Basic(BasicKind::Float64)
    }

    pub fn untyped_nil() -> Type {
        Type::Basic(BasicKind::UntypedNil)
    }

    pub fn empty_interface() -> Type {
        Type::Interface(Rc::new(InterfaceType::default()))
    }

    pub fn pointer(elem: Type) -> Type {
        Type::Pointer(Rc::new(elem))
    }

    pub fn slice(elem: Type) -> Type {
        Type::Slice(Rc::new(elem))
    }

    pub fn map(key: Type, value: Type) -> Type {
        Type::Map(Rc::new(key), Rc::new(value))
    }

    pub fn tuple(types: Vec<Type>) -> Type {
        Type::Tuple(Rc::new(types))
    }

    pub fn no_value() -> Type {
        Type::tuple(Vec::new())
    }

    pub fn signature(sig: Signature) -> Type {
        Type::Signature(Rc::new(sig))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }

    pub fn basic(&self) -> Option<BasicKind> {
        match self {
            Type::Basic(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_untyped(&self) -> bool {
        self.basic().map_or(false, |k| k.is_untyped())
    }

    pub fn is_untyped_nil(&self) -> bool {
        self.basic() == Some(BasicKind::UntypedNil)
    }

    pub fn is_named(&self) -> bool {
        matches!(self, Type::Named(_))
    }

    pub fn tuple_len(&self) -> Option<usize> {
        match self {
            Type::Tuple(types) => Some(types.len()),
            _ => None,
        }
    }

    /// The default type of an untyped constant kind, otherwise the type itself
    pub fn default_type(&self) -> Type {
        match self {
            Type::Basic(kind) if kind.is_untyped() && *kind != BasicKind::UntypedNil => {
                Type::Basic(kind.default_kind())
            }
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_signature_identity_ignores_names() {
        let a = Signature {
            params: vec![Param::new("s", Type::string())],
            results: vec![Param::unnamed(Type::empty_interface())],
            ..Default::default()
        };
        let b = Signature {
            params: vec![Param::new("other", Type::string())],
            results: vec![Param::new("r", Type::empty_interface())],
            ..Default::default()
        };
        assert_eq!(Type::signature(a), Type::signature(b));
    }

    #[test]
    fn test_variadic_distinguishes_signatures() {
        let a = Signature {
            params: vec![Param::unnamed(Type::slice(Type::int()))],
            variadic: true,
            ..Default::default()
        };
        let b = Signature {
            params: vec![Param::unnamed(Type::slice(Type::int()))],
            ..Default::default()
        };
        assert_ne!(Type::signature(a), Type::signature(b));
    }

    #[test]
    fn test_int_ranges() {
        assert_eq!(BasicKind::Int8.int_range(), Some((-128, 127)));
        assert_eq!(BasicKind::Uint16.int_range(), Some((0, 65535)));
        assert_eq!(BasicKind::Float64.int_range(), None);
    }

    #[test]
    fn test_default_types() {
        assert_eq!(Type::Basic(BasicKind::UntypedRune).default_type(), Type::Basic(BasicKind::Int32));
        assert_eq!(Type::untyped_nil().default_type(), Type::untyped_nil());
    }
}
