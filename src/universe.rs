//! The Universe scope of predeclared identifiers

use std::rc::Rc;

use crate::ast::Pos;
use crate::constant::ConstValue;
use crate::env::{Builtin, Env, ObjKind, Object};
use crate::types::{BasicKind, InterfaceType, MethodSig, Param, Signature, Type};

const BASIC_TYPES: &[(&str, BasicKind)] = &[
    ("bool", BasicKind::Bool),
    ("int", BasicKind::Int),
    ("int8", BasicKind::Int8),
    ("int16", BasicKind::Int16),
    ("int32", BasicKind::Int32),
    ("int64", BasicKind::Int64),
    ("uint", BasicKind::Uint),
    ("uint8", BasicKind::Uint8),
    ("uint16", BasicKind::Uint16),
    ("uint32", BasicKind::Uint32),
    ("uint64", BasicKind::Uint64),
    ("uintptr", BasicKind::Uintptr),
    ("float32", BasicKind::Float32),
    ("float64", BasicKind::Float64),
    ("string", BasicKind::String),
    ("byte", BasicKind::Uint8),
    ("rune", BasicKind::Int32),
];

const BUILTINS: &[Builtin] = &[
    Builtin::Append,
    Builtin::Cap,
    Builtin::Close,
    Builtin::Copy,
    Builtin::Delete,
    Builtin::Len,
    Builtin::Make,
    Builtin::New,
    Builtin::Panic,
    Builtin::Print,
    Builtin::Println,
    Builtin::Recover,
];

/// Populates the Universe scope of a fresh environment
pub(crate) fn install(env: &mut Env) {
    let universe = env.universe;
    let declare = |env: &mut Env, name: &str, kind: ObjKind, typ: Type| {
        let mut obj = Object::new(name, kind, typ, None, Pos::default());
        obj.color = crate::env::Color::Black;
        let id = env.new_object(obj);
        env.bind(universe, name, id);
        id
    };

    for (name, kind) in BASIC_TYPES {
        declare(env, name, ObjKind::TypeName, Type::Basic(*kind));
    }

    // type error interface { Error() string }
    let error_obj = declare(env, "error", ObjKind::TypeName, Type::Invalid);
    let named = env.new_named(error_obj);
    let error_method = MethodSig {
        name: "Error".to_string(),
        sig: Rc::new(Signature {
            results: vec![Param::unnamed(Type::string())],
            ..Default::default()
        }),
        pos: Pos::default(),
    };
    env.set_underlying(named, Type::Interface(Rc::new(InterfaceType::with_methods(vec![error_method]))));
    env.obj_mut(error_obj).typ = Type::Named(named);

    declare(
        env,
        "true",
        ObjKind::Const(ConstValue::Bool(true)),
        Type::Basic(BasicKind::UntypedBool),
    );
    declare(
        env,
        "false",
        ObjKind::Const(ConstValue::Bool(false)),
        Type::Basic(BasicKind::UntypedBool),
    );
    declare(
        env,
        "iota",
        ObjKind::Const(ConstValue::Int(0)),
        Type::Basic(BasicKind::UntypedInt),
    );
    declare(env, "nil", ObjKind::Nil, Type::untyped_nil());

    for builtin in BUILTINS {
        declare(env, builtin.name(), ObjKind::Builtin(*builtin), Type::Invalid);
    }
}

/// The predeclared `error` type
pub fn error_type(env: &Env) -> Type {
    env.lookup_local(env.universe, "error")
        .map(|id| env.obj(id).typ.clone())
        .unwrap_or(Type::Invalid)
}

/// `Type::Basic` of a predeclared basic type name
pub fn basic_type(name: &str) -> Option<Type> {
    BASIC_TYPES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, kind)| Type::Basic(*kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_aliases_uint8() {
        let env = Env::new();
        let byte = env.lookup_local(env.universe, "byte").unwrap();
        assert_eq!(env.obj(byte).typ, Type::Basic(BasicKind::Uint8));
    }

    #[test]
    fn test_error_is_interface() {
        let env = Env::new();
        let err = error_type(&env);
        assert!(err.is_named());
        assert!(env.is_interface(&err));
    }
}
