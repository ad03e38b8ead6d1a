//! Intrinsic bridge signatures
//!
//! [`SigBuilder`] declares Go-typed functions, constants, variables and named
//! types directly as objects of a package scope, with no source text behind
//! them. Every bridge package is described this way, as are the intrinsics
//! installed into the prompt's main package.

use std::rc::Rc;

use crate::ast::Pos;
use crate::constant::ConstValue;
use crate::env::{Color, Env, ObjId, ObjKind, Object, PkgId, ScopeId};
use crate::error::Result;
use crate::runtime::{NameTable, Value};
use crate::types::{Param, Signature, Type};
use crate::universe;

/// Declares bridge objects into one package scope
pub struct SigBuilder<'e> {
    env: &'e mut Env,
    pkg: PkgId,
    scope: ScopeId,
}

impl<'e> SigBuilder<'e> {
    pub fn new(env: &'e mut Env, pkg: PkgId) -> Self {
        let scope = env.package(pkg).scope;
        SigBuilder { env, pkg, scope }
    }

    pub fn env(&self) -> &Env {
        self.env
    }

    /// The predeclared `error` type
    pub fn error(&self) -> Type {
        universe::error_type(self.env)
    }

    /// Bridge objects are complete the moment they exist
    fn declare(&mut self, name: &str, kind: ObjKind, typ: Type) -> ObjId {
        let mut obj = Object::new(name, kind, typ, Some(self.pkg), Pos::default());
        obj.color = Color::Black;
        let id = self.env.new_object(obj);
        self.env.bind(self.scope, name, id);
        id
    }

    fn signature(params: &[Type], results: &[Type], variadic: bool) -> Signature {
        let mut params: Vec<Param> = params.iter().cloned().map(Param::unnamed).collect();
        if variadic {
            if let Some(last) = params.last_mut() {
                last.typ = Type::slice(last.typ.clone());
            }
        }
        Signature {
            recv: None,
            params,
            results: results.iter().cloned().map(Param::unnamed).collect(),
            variadic,
        }
    }

    /// `func name(params...) (results...)`
    pub fn func(&mut self, name: &str, params: &[Type], results: &[Type]) -> ObjId {
        let sig = Self::signature(params, results, false);
        self.declare(name, ObjKind::Func, Type::signature(sig))
    }

    /// Like [`func`](Self::func), with the last parameter given as the
    /// element type of a `...T` parameter
    pub fn variadic(&mut self, name: &str, params: &[Type], results: &[Type]) -> ObjId {
        let sig = Self::signature(params, results, true);
        self.declare(name, ObjKind::Func, Type::signature(sig))
    }

    pub fn constant(&mut self, name: &str, value: ConstValue, typ: Type) -> ObjId {
        self.declare(name, ObjKind::Const(value), typ)
    }

    pub fn var(&mut self, name: &str, typ: Type) -> ObjId {
        self.declare(name, ObjKind::Var, typ)
    }

    /// `type name underlying`; returns the new named type
    pub fn named(&mut self, name: &str, underlying: Type) -> Type {
        let obj = self.declare(name, ObjKind::TypeName, Type::Invalid);
        let named = self.env.new_named(obj);
        self.env.set_underlying(named, underlying);
        let typ = Type::Named(named);
        self.env.obj_mut(obj).typ = typ.clone();
        typ
    }

    /// Attaches a method to a named type declared by this builder. `recv`
    /// is the named type or a pointer to it.
    pub fn method(&mut self, recv: &Type, name: &str, params: &[Type], results: &[Type]) -> Option<ObjId> {
        self.method_sig(recv, name, Self::signature(params, results, false))
    }

    pub fn variadic_method(&mut self, recv: &Type, name: &str, params: &[Type], results: &[Type]) -> Option<ObjId> {
        self.method_sig(recv, name, Self::signature(params, results, true))
    }

    fn method_sig(&mut self, recv: &Type, name: &str, mut sig: Signature) -> Option<ObjId> {
        let base = match recv {
            Type::Pointer(elem) => (**elem).clone(),
            other => other.clone(),
        };
        let Type::Named(named) = base else {
            return None;
        };
        sig.recv = Some(Param::new("recv", recv.clone()));
        let mut obj = Object::new(name, ObjKind::Func, Type::Signature(Rc::new(sig)), Some(self.pkg), Pos::default());
        obj.color = Color::Black;
        let id = self.env.new_object(obj);
        self.env.add_method(named, id);
        Some(id)
    }

    /// Marks the package complete
    pub fn finish(self) -> PkgId {
        self.env.set_complete(self.pkg, true);
        self.pkg
    }
}

/// Names the prompt's intrinsics are installed under
pub const INTRINSICS: &[&str] = &[
    "__lua",
    "__zygo",
    "__tostring",
    "__st",
    "__ls",
    "__gls",
    "__lst",
    "__glst",
    "__gijit_printQuoted",
];

/// Declares the intrinsics into the session's main package
pub fn install(env: &mut Env, pkg: PkgId) {
    let mut b = SigBuilder::new(env, pkg);
    let any = Type::empty_interface();
    let error = b.error();

    b.func("__lua", &[Type::string()], &[any.clone(), error.clone()]);
    b.func("__zygo", &[Type::string()], &[any.clone(), error]);
    b.func("__tostring", &[any.clone()], &[Type::string()]);
    b.func("__st", &[any.clone()], &[Type::string()]);
    for name in ["__ls", "__gls", "__lst", "__glst"] {
        b.func(name, &[], &[]);
    }
    b.variadic("__gijit_printQuoted", &[any], &[]);
    tracing::trace!(count = INTRINSICS.len(), "installed intrinsics");
}

/// Runtime side of the intrinsics
pub fn natives() -> NameTable {
    let mut table = NameTable::new();

    // __lua(s) -> (value, error)
    table.insert(
        "__lua".to_string(),
        Value::native("__lua", 1, |args| {
            let Some(text) = args[0].as_str() else {
                return Ok(Value::fail("__lua: argument is not a string"));
            };
            Ok(match lua::eval(text) {
                Ok(value) => Value::ok(value),
                Err(message) => Value::fail(format!("__lua: {}", message)),
            })
        }),
    );

    // __zygo(s) -> (value, error)
    table.insert(
        "__zygo".to_string(),
        Value::native("__zygo", 1, |args| {
            let Some(text) = args[0].as_str() else {
                return Ok(Value::fail("__zygo: argument is not a string"));
            };
            Ok(match zygo::eval(text) {
                Ok(value) => Value::ok(value),
                Err(message) => Value::fail(format!("__zygo: {}", message)),
            })
        }),
    );

    table.insert(
        "__tostring".to_string(),
        Value::native("__tostring", 1, |args| Ok(Value::String(args[0].to_string()))),
    );

    table.insert(
        "__st".to_string(),
        Value::native("__st", 1, |args| Ok(Value::String(go_syntax(&args[0])))),
    );

    // variable listings are answered by the REPL from the symbol environment
    for name in ["__ls", "__gls", "__lst", "__glst"] {
        table.insert(name.to_string(), Value::native(name, 0, |_| Ok(Value::Nil)));
    }

    table.insert(
        "__gijit_printQuoted".to_string(),
        Value::variadic("__gijit_printQuoted", 0, |args| {
            let quoted: Vec<String> = args.iter().map(go_syntax).collect();
            println!("{}", quoted.join(" "));
            Ok(Value::Nil)
        }),
    );

    table
}

/// `%#v`-like rendering: strings quoted, slices spelled out
pub fn go_syntax(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(go_syntax).collect();
            format!("[]interface {{}}{{{}}}", items.join(", "))
        }
        Value::Error(message) => format!("&errors.errorString{{s:{:?}}}", message),
        other => other.to_string(),
    }
}

/// Calls an intrinsic directly; used by the REPL for `__lua` and friends
pub fn call(name: &str, args: &[Value]) -> Result<Value> {
    let table = natives();
    match table.get(name) {
        Some(native) => native.call(args),
        None => Err(crate::error::GiltError::RuntimeError(format!("undefined: {}", name))),
    }
}

mod lua;

/// A tiny s-expression calculator behind `__zygo`
mod zygo {
    use crate::runtime::Value;

    #[derive(Debug, Clone, PartialEq)]
    enum Sexp {
        Int(i64),
        Float(f64),
        Str(String),
        Sym(String),
        List(Vec<Sexp>),
    }

    pub fn eval(text: &str) -> Result<Value, String> {
        let tokens = tokenize(text)?;
        let mut pos = 0;
        let sexp = parse(&tokens, &mut pos)?;
        if pos != tokens.len() {
            return Err(format!("unexpected '{}' after expression", tokens[pos]));
        }
        eval_sexp(&sexp)
    }

    fn tokenize(text: &str) -> Result<Vec<String>, String> {
        let mut tokens = Vec::new();
        let mut chars = text.chars().peekable();
        while let Some(&c) = chars.peek() {
            match c {
                '(' | ')' => {
                    tokens.push(c.to_string());
                    chars.next();
                }
                '"' => {
                    chars.next();
                    let mut s = String::from("\"");
                    loop {
                        match chars.next() {
                            Some('"') => break,
                            Some(ch) => s.push(ch),
                            None => return Err("unterminated string".to_string()),
                        }
                    }
                    tokens.push(s);
                }
                c if c.is_whitespace() => {
                    chars.next();
                }
                _ => {
                    let mut atom = String::new();
                    while let Some(&ch) = chars.peek() {
                        if ch.is_whitespace() || ch == '(' || ch == ')' {
                            break;
                        }
                        atom.push(ch);
                        chars.next();
                    }
                    tokens.push(atom);
                }
            }
        }
        Ok(tokens)
    }

    fn parse(tokens: &[String], pos: &mut usize) -> Result<Sexp, String> {
        let Some(token) = tokens.get(*pos) else {
            return Err("unexpected end of input".to_string());
        };
        *pos += 1;
        match token.as_str() {
            "(" => {
                let mut items = Vec::new();
                loop {
                    match tokens.get(*pos).map(String::as_str) {
                        Some(")") => {
                            *pos += 1;
                            return Ok(Sexp::List(items));
                        }
                        Some(_) => items.push(parse(tokens, pos)?),
                        None => return Err("missing ')'".to_string()),
                    }
                }
            }
            ")" => Err("unexpected ')'".to_string()),
            atom => {
                if let Some(s) = atom.strip_prefix('"') {
                    return Ok(Sexp::Str(s.to_string()));
                }
                if let Ok(i) = atom.parse::<i64>() {
                    return Ok(Sexp::Int(i));
                }
                if let Ok(x) = atom.parse::<f64>() {
                    return Ok(Sexp::Float(x));
                }
                Ok(Sexp::Sym(atom.to_string()))
            }
        }
    }

    fn eval_sexp(sexp: &Sexp) -> Result<Value, String> {
        match sexp {
            Sexp::Int(i) => Ok(Value::Int(*i)),
            Sexp::Float(x) => Ok(Value::Float(*x)),
            Sexp::Str(s) => Ok(Value::String(s.clone())),
            Sexp::Sym(s) if s == "true" => Ok(Value::Bool(true)),
            Sexp::Sym(s) if s == "false" => Ok(Value::Bool(false)),
            Sexp::Sym(s) => Err(format!("undefined symbol '{}'", s)),
            Sexp::List(items) => {
                let Some((head, rest)) = items.split_first() else {
                    return Ok(Value::Nil);
                };
                let Sexp::Sym(op) = head else {
                    return Err("call of a non-symbol".to_string());
                };
                let args = rest.iter().map(eval_sexp).collect::<Result<Vec<_>, _>>()?;
                apply(op, &args)
            }
        }
    }

    fn apply(op: &str, args: &[Value]) -> Result<Value, String> {
        match op {
            "+" | "-" | "*" | "/" => arith(op, args),
            "<" | ">" | "<=" | ">=" | "==" | "=" => {
                let [a, b] = args else {
                    return Err(format!("'{}' takes two arguments", op));
                };
                let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else {
                    return Ok(Value::Bool((op == "==" || op == "=") && a == b));
                };
                Ok(Value::Bool(match op {
                    "<" => a < b,
                    ">" => a > b,
                    "<=" => a <= b,
                    ">=" => a >= b,
                    _ => a == b,
                }))
            }
            "concat" => Ok(Value::String(args.iter().map(|a| a.to_string()).collect())),
            "list" => Ok(Value::Array(args.to_vec())),
            _ => Err(format!("undefined function '{}'", op)),
        }
    }

    fn arith(op: &str, args: &[Value]) -> Result<Value, String> {
        if args.is_empty() {
            return Err(format!("'{}' needs arguments", op));
        }
        if args.iter().all(|a| matches!(a, Value::Int(_))) {
            let ints: Vec<i64> = args.iter().filter_map(Value::as_i64).collect();
            if ints.len() == 1 && op == "-" {
                return Ok(Value::Int(-ints[0]));
            }
            let mut acc = ints[0];
            for &x in &ints[1..] {
                acc = match op {
                    "+" => acc.checked_add(x),
                    "-" => acc.checked_sub(x),
                    "*" => acc.checked_mul(x),
                    _ if x == 0 => return Err("division by zero".to_string()),
                    _ => acc.checked_div(x),
                }
                .ok_or_else(|| "integer overflow".to_string())?;
            }
            return Ok(Value::Int(acc));
        }
        let mut nums = Vec::with_capacity(args.len());
        for a in args {
            nums.push(a.as_f64().ok_or_else(|| format!("'{}' of a {}", op, a.type_name()))?);
        }
        if nums.len() == 1 && op == "-" {
            return Ok(Value::Float(-nums[0]));
        }
        let mut acc = nums[0];
        for &x in &nums[1..] {
            acc = match op {
                "+" => acc + x,
                "-" => acc - x,
                "*" => acc * x,
                _ => acc / x,
            };
        }
        Ok(Value::Float(acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lua_evaluates_constant_expression() {
        let result = call("__lua", &[Value::String("3 + 4".to_string())]).unwrap();
        assert_eq!(result, Value::Tuple(vec![Value::Int(7), Value::Nil]));
    }

    #[test]
    fn test_lua_reports_error_as_value() {
        let result = call("__lua", &[Value::String("nil + 1".to_string())]).unwrap();
        assert_eq!(
            result,
            Value::Tuple(vec![
                Value::Nil,
                Value::Error("__lua: attempt to perform arithmetic on a nil value".to_string())
            ])
        );
    }

    #[test]
    fn test_lua_runtime_literals() {
        let result = call("__lua", &[Value::String("3LL + 4LL".to_string())]).unwrap();
        assert_eq!(result, Value::Tuple(vec![Value::Int(7), Value::Nil]));
        let result = call("__lua", &[Value::String("\"hello \" .. \"world\"".to_string())]).unwrap();
        assert_eq!(
            result,
            Value::Tuple(vec![Value::String("hello world".to_string()), Value::Nil])
        );
    }

    #[test]
    fn test_zygo() {
        let result = call("__zygo", &[Value::String("(+ 3 4)".to_string())]).unwrap();
        assert_eq!(result, Value::Tuple(vec![Value::Int(7), Value::Nil]));
        assert_eq!(zygo::eval("(* 2 (- 10 4))").unwrap(), Value::Int(12));
        assert_eq!(zygo::eval("(< 1 2)").unwrap(), Value::Bool(true));
        assert!(zygo::eval("(+ 1").is_err());
        assert!(zygo::eval("(/ 1 0)").is_err());
    }

    #[test]
    fn test_install_declares_signatures() {
        let mut env = Env::new();
        let pkg = env.new_package("main", "main");
        install(&mut env, pkg);
        let scope = env.package(pkg).scope;

        for name in INTRINSICS {
            assert!(env.lookup_local(scope, name).is_some(), "{} missing", name);
        }
        let lua = env.lookup_local(scope, "__lua").unwrap();
        assert_eq!(env.type_string(&env.obj(lua).typ), "func(string) (interface{}, error)");
        let quoted = env.lookup_local(scope, "__gijit_printQuoted").unwrap();
        assert_eq!(env.type_string(&env.obj(quoted).typ), "func(...interface{})");
    }

    #[test]
    fn test_named_type_with_methods() {
        let mut env = Env::new();
        let pkg = env.new_package("demo", "demo");
        let mut b = SigBuilder::new(&mut env, pkg);
        let counter = b.named("Counter", Type::int());
        assert!(b.method(&Type::pointer(counter.clone()), "Inc", &[], &[]).is_some());
        assert!(b.method(&Type::int(), "Bad", &[], &[]).is_none());
        b.finish();

        let Type::Named(id) = counter else {
            panic!("not a named type");
        };
        assert_eq!(env.named(id).methods.len(), 1);
        assert!(env.package(pkg).complete);
    }
}
