//! Operands and the type relations between them

use crate::ast::{Expr, NodeId, Pos};
use crate::constant::ConstValue;
use crate::env::{Builtin, Env};
use crate::types::{BasicKind, Type};

use super::{Checker, LookupResult};

/// What kind of value an expression denotes
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Invalid,
    /// A call of a function without results
    NoValue,
    Builtin(Builtin),
    TypeExpr,
    Constant(ConstValue),
    /// Addressable storage
    Variable,
    /// `m[k]`: assignable, not addressable, comma-ok capable
    MapIndex,
    Value,
    /// Receive, map index or type assertion used where `v, ok` is allowed
    CommaOk,
}

/// The result of evaluating one expression
#[derive(Debug, Clone)]
pub struct Operand {
    pub mode: Mode,
    pub typ: Type,
    pub id: NodeId,
    pub pos: Pos,
    /// Source text for error messages
    pub text: String,
}

impl Operand {
    pub fn new(mode: Mode, typ: Type, e: &Expr) -> Self {
        Operand {
            mode,
            typ,
            id: e.id,
            pos: e.pos,
            text: e.to_string(),
        }
    }

    pub fn invalid(e: &Expr) -> Self {
        Self::new(Mode::Invalid, Type::Invalid, e)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.mode, Mode::Invalid)
    }

    pub fn invalidate(&mut self) {
        self.mode = Mode::Invalid;
        self.typ = Type::Invalid;
    }

    pub fn value(&self) -> Option<&ConstValue> {
        match &self.mode {
            Mode::Constant(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.mode, Mode::Constant(_))
    }

    pub fn is_nil(&self) -> bool {
        self.mode == Mode::Value && self.typ.is_untyped_nil()
    }

    /// Describes the operand the way error messages show it, e.g.
    /// `x (variable of type int)`
    pub fn describe(&self, env: &Env) -> String {
        if self.is_nil() {
            return "nil".to_string();
        }
        let typ = env.type_string(&self.typ);
        match &self.mode {
            Mode::Invalid => format!("{} (invalid operand)", self.text),
            Mode::NoValue => format!("{} (no value)", self.text),
            Mode::Builtin(_) => format!("{} (built-in)", self.text),
            Mode::TypeExpr => format!("{} (type)", self.text),
            Mode::Constant(v) => {
                let shown = v.to_string();
                if self.typ.is_untyped() {
                    if shown == self.text {
                        format!("{} ({} constant)", self.text, typ)
                    } else {
                        format!("{} ({} constant {})", self.text, typ, shown)
                    }
                } else if shown == self.text {
                    format!("{} (constant of type {})", self.text, typ)
                } else {
                    format!("{} (constant {} of type {})", self.text, shown, typ)
                }
            }
            Mode::Variable => format!("{} (variable of type {})", self.text, typ),
            Mode::MapIndex => format!("{} (map index expression of type {})", self.text, typ),
            Mode::Value => format!("{} (value of type {})", self.text, typ),
            Mode::CommaOk => format!("{} (comma, ok expression of type {})", self.text, typ),
        }
    }
}

/// Predeclared and declared types have names; composite literals of type do not
pub(crate) fn has_name(t: &Type) -> bool {
    matches!(t, Type::Basic(_) | Type::Named(_))
}

impl<'a> Checker<'a> {
    pub(crate) fn describe(&self, x: &Operand) -> String {
        x.describe(self.env)
    }

    pub(crate) fn type_str(&self, t: &Type) -> String {
        self.env.type_string(t)
    }

    pub(crate) fn comparable(&self, t: &Type) -> bool {
        self.comparable_depth(t, 0)
    }

    fn comparable_depth(&self, t: &Type, depth: usize) -> bool {
        if depth > 32 {
            return true;
        }
        match self.env.underlying(t) {
            Type::Basic(kind) => kind != BasicKind::UntypedNil,
            Type::Pointer(_) | Type::Chan(..) | Type::Interface(_) => true,
            Type::Struct(st) => st.fields.iter().all(|f| self.comparable_depth(&f.typ, depth + 1)),
            Type::Array(_, elem) => self.comparable_depth(&elem, depth + 1),
            Type::Invalid => true,
            _ => false,
        }
    }

    pub(crate) fn has_nil(&self, t: &Type) -> bool {
        matches!(
            self.env.underlying(t),
            Type::Pointer(_)
                | Type::Slice(_)
                | Type::Map(..)
                | Type::Chan(..)
                | Type::Signature(_)
                | Type::Interface(_)
                | Type::Basic(BasicKind::UntypedNil)
        )
    }

    /// Whether `x` may be assigned to a variable of type `t`
    pub(crate) fn assignable_to(&self, x: &Operand, t: &Type) -> bool {
        if x.is_invalid() || t.is_invalid() {
            return true;
        }
        let v = &x.typ;
        if v == t {
            return true;
        }
        let vu = self.env.underlying(v);
        let tu = self.env.underlying(t);

        if v.is_untyped() {
            return match &tu {
                Type::Basic(kind) => {
                    if x.is_nil() {
                        false
                    } else if let Some(value) = x.value() {
                        value.representable(*kind).is_some()
                    } else if vu == Type::Basic(BasicKind::UntypedBool) {
                        kind.is_boolean()
                    } else {
                        // non-constant shift results
                        kind.is_numeric()
                    }
                }
                Type::Interface(iface) => x.is_nil() || iface.is_empty(),
                Type::Pointer(_) | Type::Signature(_) | Type::Slice(_) | Type::Map(..) | Type::Chan(..) => x.is_nil(),
                _ => false,
            };
        }

        if vu == tu && (!has_name(v) || !has_name(t)) {
            return true;
        }

        if let Type::Interface(_) = tu {
            if self.missing_method(v, t).is_none() {
                return true;
            }
        }

        if let (Type::Chan(crate::ast::ChanDir::Both, ve), Type::Chan(_, te)) = (&vu, &tu) {
            if ve == te && (!has_name(v) || !has_name(t)) {
                return true;
            }
        }
        false
    }

    /// Whether untyped `x` belongs to the same family of types as `t`;
    /// range errors are left to the conversion
    fn untyped_fits(&self, x: &Operand, t: &Type) -> bool {
        match self.env.underlying(t) {
            Type::Basic(kind) => {
                if x.is_nil() {
                    return kind == BasicKind::UntypedNil;
                }
                match x.typ.basic() {
                    Some(BasicKind::UntypedBool) => kind.is_boolean(),
                    Some(BasicKind::UntypedString) => kind.is_string(),
                    Some(k) if k.is_numeric() => kind.is_numeric(),
                    _ => true,
                }
            }
            Type::Pointer(_) | Type::Signature(_) | Type::Slice(_) | Type::Map(..) | Type::Chan(..) => x.is_nil(),
            Type::Invalid => true,
            _ => false,
        }
    }

    /// Whether a non-constant `x` may be converted to `t`
    pub(crate) fn convertible_to(&self, x: &Operand, t: &Type) -> bool {
        if self.assignable_to(x, t) {
            return true;
        }
        let v = &x.typ;
        let vu = self.env.underlying(v);
        let tu = self.env.underlying(t);
        if vu == tu {
            return true;
        }
        if let (Type::Pointer(vb), Type::Pointer(tb)) = (v, t) {
            if self.env.underlying(vb) == self.env.underlying(tb) {
                return true;
            }
        }
        let vk = vu.basic();
        let tk = tu.basic();
        if let (Some(vk), Some(tk)) = (vk, tk) {
            if vk.is_numeric() && tk.is_numeric() {
                return true;
            }
            if tk.is_string() && vk.is_integer() {
                return true;
            }
        }
        if tk.map_or(false, |k| k.is_string()) && self.is_bytes_or_runes(&vu) {
            return true;
        }
        if vk.map_or(false, |k| k.is_string()) && self.is_bytes_or_runes(&tu) {
            return true;
        }
        false
    }

    fn is_bytes_or_runes(&self, t: &Type) -> bool {
        match t {
            Type::Slice(elem) => matches!(
                self.env.underlying(elem).basic(),
                Some(BasicKind::Uint8) | Some(BasicKind::Int32)
            ),
            _ => false,
        }
    }

    /// Returns the first method of interface `iface` that `t` lacks, and
    /// whether it exists with the wrong signature
    pub(crate) fn missing_method(&self, t: &Type, iface: &Type) -> Option<(String, bool)> {
        let Type::Interface(want) = self.env.underlying(iface) else {
            return None;
        };
        if want.is_empty() {
            return None;
        }
        if let Type::Interface(have) = self.env.underlying(t) {
            for m in &want.all_methods {
                match have.method(&m.name) {
                    None => return Some((m.name.clone(), false)),
                    Some(found) if found.sig != m.sig => return Some((m.name.clone(), true)),
                    _ => {}
                }
            }
            return None;
        }
        for m in &want.all_methods {
            match self.lookup_field_or_method(t, false, &m.name) {
                LookupResult::Method { obj, .. } => {
                    let Type::Signature(sig) = &self.env.obj(obj).typ else {
                        return Some((m.name.clone(), true));
                    };
                    if **sig != *m.sig {
                        return Some((m.name.clone(), true));
                    }
                }
                LookupResult::InterfaceMethod { sig, .. } => {
                    if *sig != *m.sig {
                        return Some((m.name.clone(), true));
                    }
                }
                LookupResult::Field { .. } => return Some((m.name.clone(), true)),
                _ => return Some((m.name.clone(), false)),
            }
        }
        None
    }

    /// Error text explaining why `t` does not implement `iface`
    pub(crate) fn missing_method_reason(&self, t: &Type, iface: &Type) -> String {
        match self.missing_method(t, iface) {
            Some((name, true)) => format!("(wrong type for method {})", name),
            Some((name, false)) => {
                let ptr_recv = !matches!(t, Type::Pointer(_))
                    && matches!(
                        self.lookup_field_or_method(&Type::pointer(t.clone()), false, &name),
                        LookupResult::Method { .. }
                    );
                if ptr_recv {
                    format!("(method {} has pointer receiver)", name)
                } else {
                    format!("(missing method {})", name)
                }
            }
            None => String::new(),
        }
    }

    /// Checks that `x` can be assigned to a variable of type `t` and gives
    /// untyped operands their final type. `context` names the assignment
    /// for error messages.
    pub(crate) fn assignment(&mut self, x: &mut Operand, t: Option<&Type>, context: &str) {
        match x.mode {
            Mode::Invalid => return,
            Mode::Constant(_) | Mode::Variable | Mode::MapIndex | Mode::Value | Mode::CommaOk => {}
            _ => {
                let desc = self.describe(x);
                self.error(x.pos, format!("cannot assign {} to variable in {}", desc, context));
                x.invalidate();
                return;
            }
        }

        if x.typ.is_untyped() {
            if let Some(t) = t {
                if !self.env.is_interface(t) && !self.untyped_fits(x, t) {
                    let desc = self.describe(x);
                    let ts = self.type_str(t);
                    self.error(x.pos, format!("cannot use {} as {} value in {}", desc, ts, context));
                    x.invalidate();
                    return;
                }
            }
            let target = match t {
                Some(t) if !self.env.is_interface(t) => t.clone(),
                _ => {
                    if t.is_none() && x.is_nil() {
                        self.error(x.pos, format!("use of untyped nil in {}", context));
                        x.invalidate();
                        return;
                    }
                    x.typ.default_type()
                }
            };
            self.convert_untyped(x, &target);
            if x.is_invalid() {
                return;
            }
        }

        let Some(t) = t else {
            return;
        };
        if !self.assignable_to(x, t) {
            let desc = self.describe(x);
            let ts = self.type_str(t);
            let mut message = format!("cannot use {} as {} value in {}", desc, ts, context);
            if self.env.is_interface(t) && !x.typ.is_untyped() {
                let reason = self.missing_method_reason(&x.typ, t);
                if !reason.is_empty() {
                    message = format!("{}: {} does not implement {} {}", message, self.type_str(&x.typ), ts, reason);
                }
            }
            self.error(x.pos, message);
            x.invalidate();
        }
    }
}
