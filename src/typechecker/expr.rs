//! Expression checking
//!
//! Untyped results are not recorded immediately: they wait in the checker's
//! untyped map until the context fixes their type (assignment, conversion,
//! argument passing or an operation with a typed operand). Whatever is still
//! untyped at the end of the check is recorded as is.

use std::collections::HashSet;
use std::rc::Rc;

use crate::ast::{BinaryOp, Block, Expr, ExprKind, FuncType, Ident, Literal, NodeId, UnaryOp};
use crate::constant::{ConstError, ConstValue};
use crate::env::ObjKind;
use crate::types::{BasicKind, Signature, Type};

use super::operand::{Mode, Operand};
use super::{Checker, LookupResult, Selection, SelectionKind, UntypedExpr};

impl<'a> Checker<'a> {
    /// Evaluates `e` as a single value
    pub(crate) fn expr(&mut self, e: &Expr) -> Operand {
        let mut x = self.raw_expr(e, None);
        self.exclude_non_values(&mut x);
        self.single_value(&mut x);
        x
    }

    /// Like [`Checker::expr`], with a type for elided composite literals
    pub(crate) fn expr_with_hint(&mut self, e: &Expr, hint: &Type) -> Operand {
        let mut x = self.raw_expr(e, Some(hint));
        self.exclude_non_values(&mut x);
        self.single_value(&mut x);
        x
    }

    /// Evaluates `e` as a value or a type
    pub(crate) fn expr_or_type(&mut self, e: &Expr) -> Operand {
        let mut x = self.raw_expr(e, None);
        if x.mode == Mode::NoValue {
            let desc = self.describe(&x);
            self.error(x.pos, format!("{} used as value or type", desc));
            x.invalidate();
        }
        self.single_value(&mut x);
        x
    }

    /// Evaluates `e`, spreading a multi-valued call into one operand per result
    pub(crate) fn multi_expr(&mut self, e: &Expr) -> Vec<Operand> {
        self.multi_expr_comma_ok(e, false)
    }

    /// As [`Checker::multi_expr`]; with `comma_ok` a map index, receive or
    /// type assertion yields a second untyped bool operand
    pub(crate) fn multi_expr_comma_ok(&mut self, e: &Expr, comma_ok: bool) -> Vec<Operand> {
        let mut x = self.raw_expr(e, None);
        self.exclude_non_values(&mut x);
        if x.is_invalid() {
            return vec![x];
        }
        if let Type::Tuple(types) = &x.typ {
            return types
                .iter()
                .map(|t| Operand {
                    mode: Mode::Value,
                    typ: t.clone(),
                    id: x.id,
                    pos: x.pos,
                    text: x.text.clone(),
                })
                .collect();
        }
        if comma_ok && matches!(x.mode, Mode::MapIndex | Mode::CommaOk) {
            let tuple = Type::tuple(vec![x.typ.clone(), Type::bool()]);
            let mut node = Some(e);
            while let Some(current) = node {
                if let Some(tv) = self.info.types.get_mut(&current.id) {
                    tv.typ = tuple.clone();
                }
                node = match &current.kind {
                    ExprKind::Paren(inner) => Some(inner),
                    _ => None,
                };
            }
            let ok = Operand {
                mode: Mode::Value,
                typ: Type::Basic(BasicKind::UntypedBool),
                id: x.id,
                pos: x.pos,
                text: x.text.clone(),
            };
            x.mode = Mode::Value;
            return vec![x, ok];
        }
        vec![x]
    }

    fn exclude_non_values(&mut self, x: &mut Operand) {
        let suffix = match x.mode {
            Mode::NoValue => "used as value",
            Mode::Builtin(_) => "must be called",
            Mode::TypeExpr => "is not an expression",
            _ => return,
        };
        let desc = self.describe(x);
        self.error(x.pos, format!("{} {}", desc, suffix));
        x.invalidate();
    }

    fn single_value(&mut self, x: &mut Operand) {
        if x.mode == Mode::Value {
            if let Some(n) = x.typ.tuple_len() {
                if n != 1 {
                    self.error(x.pos, format!("multiple-value {} in single-value context", x.text));
                    x.invalidate();
                }
            }
        }
    }

    /// Evaluates any expression and records its type, deferring untyped ones
    pub(crate) fn raw_expr(&mut self, e: &Expr, hint: Option<&Type>) -> Operand {
        let x = self.expr_internal(e, hint);
        if x.is_invalid() {
            return x;
        }
        if x.typ.is_untyped() {
            let children = untyped_children(e, &x);
            let shift_operand = self.untyped.get(&e.id).map_or(false, |u| u.shift_operand);
            self.untyped.insert(
                e.id,
                UntypedExpr {
                    mode: x.mode.clone(),
                    typ: x.typ.clone(),
                    children,
                    shift_operand,
                    pos: x.pos,
                    text: x.text.clone(),
                },
            );
        } else {
            self.record_type_and_value(e.id, &x.mode, &x.typ);
        }
        x
    }

    fn expr_internal(&mut self, e: &Expr, hint: Option<&Type>) -> Operand {
        match &e.kind {
            ExprKind::Ident(name) => self.ident(e, name),
            ExprKind::BasicLit(lit) => {
                let (value, kind) = match lit {
                    Literal::Int(i) => (ConstValue::Int(*i), BasicKind::UntypedInt),
                    Literal::Float(f) => (ConstValue::Float(*f), BasicKind::UntypedFloat),
                    Literal::Char(c) => (ConstValue::Int(*c as u32 as i128), BasicKind::UntypedRune),
                    Literal::String(s) => (ConstValue::String(s.clone()), BasicKind::UntypedString),
                };
                Operand::new(Mode::Constant(value), Type::Basic(kind), e)
            }
            ExprKind::CompositeLit { typ, elts } => self.composite_lit(e, typ.as_deref(), elts, hint),
            ExprKind::FuncLit { typ, body } => self.func_lit(e, typ, body),
            ExprKind::Paren(inner) => {
                let x = self.raw_expr(inner, hint);
                Operand {
                    id: e.id,
                    pos: e.pos,
                    text: e.to_string(),
                    ..x
                }
            }
            ExprKind::Selector { x, sel } => self.selector(e, x, sel),
            ExprKind::Index { x, index } => self.index_expr(e, x, index),
            ExprKind::Slice { x, low, high, max } => {
                self.slice_expr(e, x, low.as_deref(), high.as_deref(), max.as_deref())
            }
            ExprKind::TypeAssert { x, typ } => self.type_assert_expr(e, x, typ.as_deref()),
            ExprKind::Call { fun, args, ellipsis } => self.call(e, fun, args, *ellipsis),
            ExprKind::Star(inner) => {
                let x = self.expr_or_type(inner);
                match x.mode {
                    Mode::Invalid => Operand::invalid(e),
                    Mode::TypeExpr => Operand::new(Mode::TypeExpr, Type::pointer(x.typ), e),
                    _ => match self.env.underlying(&x.typ) {
                        Type::Pointer(elem) => Operand::new(Mode::Variable, (*elem).clone(), e),
                        _ => {
                            let desc = self.describe(&x);
                            self.error(x.pos, format!("invalid operation: cannot indirect {}", desc));
                            Operand::invalid(e)
                        }
                    },
                }
            }
            ExprKind::Unary { op, x } => self.unary(e, *op, x),
            ExprKind::Binary { op, x, y } => self.binary(e, *op, x, y),
            ExprKind::KeyValue { .. } => {
                self.error(e.pos, "unexpected key:value expression");
                Operand::invalid(e)
            }
            ExprKind::Ellipsis(_) => {
                self.error(e.pos, "invalid use of ...");
                Operand::invalid(e)
            }
            ExprKind::ArrayType { .. }
            | ExprKind::StructType(_)
            | ExprKind::FuncType(_)
            | ExprKind::InterfaceType(_)
            | ExprKind::MapType { .. }
            | ExprKind::ChanType { .. } => {
                let t = self.typ_expr(e);
                if t.is_invalid() {
                    Operand::invalid(e)
                } else {
                    Operand::new(Mode::TypeExpr, t, e)
                }
            }
        }
    }

    // Identifiers

    fn ident(&mut self, e: &Expr, name: &str) -> Operand {
        if name == "_" {
            self.error(e.pos, "cannot use _ as value");
            return Operand::invalid(e);
        }
        let Some((scope, id)) = self.env.lookup(self.ctx.scope, name) else {
            self.error(e.pos, format!("undefined: {}", name));
            return Operand::invalid(e);
        };
        self.record_use(e.id, id);

        if self.declared_here.contains(&id) {
            self.obj_decl(id);
            self.record_dep(id);
        }

        // a dot-imported name lives in a file scope but belongs to another package
        if let Some(pkg) = self.env.obj(id).pkg {
            if pkg != self.pkg && self.is_file_scope(scope) {
                self.dot_used.insert(pkg);
            }
        }

        let obj = self.env.obj(id);
        let typ = obj.typ.clone();
        match obj.kind.clone() {
            ObjKind::PkgName(_) => {
                self.env.obj_mut(id).used = true;
                self.error(e.pos, format!("use of package {} without selector", name));
                Operand::invalid(e)
            }
            ObjKind::Const(value) => {
                if typ.is_invalid() {
                    return Operand::invalid(e);
                }
                if name == "iota" && scope == self.env.universe {
                    return match self.ctx.iota.clone() {
                        Some(v) => Operand::new(Mode::Constant(v), typ, e),
                        None => {
                            self.error(e.pos, "cannot use iota outside constant declaration");
                            Operand::invalid(e)
                        }
                    };
                }
                Operand::new(Mode::Constant(value), typ, e)
            }
            ObjKind::TypeName => {
                if typ.is_invalid() {
                    return Operand::invalid(e);
                }
                Operand::new(Mode::TypeExpr, typ, e)
            }
            ObjKind::Var => {
                self.env.obj_mut(id).used = true;
                if typ.is_invalid() {
                    return Operand::invalid(e);
                }
                Operand::new(Mode::Variable, typ, e)
            }
            ObjKind::Func => {
                if typ.is_invalid() {
                    return Operand::invalid(e);
                }
                Operand::new(Mode::Value, typ, e)
            }
            ObjKind::Builtin(b) => Operand::new(Mode::Builtin(b), Type::Invalid, e),
            ObjKind::Nil => Operand::new(Mode::Value, Type::untyped_nil(), e),
        }
    }

    fn is_file_scope(&self, scope: crate::env::ScopeId) -> bool {
        scope != self.pkg_scope() && self.env.scope(scope).parent == Some(self.pkg_scope())
    }

    // Literals

    fn func_lit(&mut self, e: &Expr, ft: &FuncType, body: &Rc<Block>) -> Operand {
        let (sig, scope) = self.func_type(None, ft);
        let sig = Rc::new(sig);
        self.record_scope(e.id, scope);
        let decl = self.ctx.decl;
        self.func_body(decl, sig.clone(), scope, body);
        Operand::new(Mode::Value, Type::Signature(sig), e)
    }

    fn composite_lit(&mut self, e: &Expr, typ: Option<&Expr>, elts: &[Expr], hint: Option<&Type>) -> Operand {
        let (typ, base) = match (typ, hint) {
            (Some(texpr), _) => {
                // [...]T{...}: the length comes from the elements
                if let ExprKind::ArrayType { len: Some(len), elem } = &texpr.kind {
                    if matches!(len.kind, ExprKind::Ellipsis(None)) {
                        let elem = self.typ_expr(elem);
                        let n = self.indexed_elts(elts, &elem, -1);
                        let t = Type::Array(n, Rc::new(elem));
                        self.record_type_and_value(texpr.id, &Mode::TypeExpr, &t);
                        return Operand::new(Mode::Value, t, e);
                    }
                }
                let t = self.typ_expr(texpr);
                (t.clone(), t)
            }
            (None, Some(hint)) => {
                let base = match self.env.underlying(hint) {
                    Type::Pointer(elem) => (*elem).clone(),
                    _ => hint.clone(),
                };
                (hint.clone(), base)
            }
            (None, None) => {
                self.error(e.pos, "invalid composite literal type: missing type");
                self.use_exprs(elts);
                return Operand::invalid(e);
            }
        };

        match self.env.underlying(&base) {
            Type::Struct(st) => {
                if elts.is_empty() {
                    return Operand::new(Mode::Value, typ, e);
                }
                if matches!(elts[0].kind, ExprKind::KeyValue { .. }) {
                    let mut seen = HashSet::new();
                    for elt in elts {
                        let ExprKind::KeyValue { key, value } = &elt.kind else {
                            self.error(elt.pos, "mixture of field:value and value elements in struct literal");
                            continue;
                        };
                        let Some(name) = key.as_ident() else {
                            self.error(key.pos, format!("invalid field name {} in struct literal", key));
                            continue;
                        };
                        let Some(i) = st.fields.iter().position(|f| f.name == name) else {
                            self.error(key.pos, format!("unknown field {} in struct literal", name));
                            self.raw_expr(value, None);
                            continue;
                        };
                        if !seen.insert(i) {
                            self.error(key.pos, format!("duplicate field name {} in struct literal", name));
                            continue;
                        }
                        let field_typ = st.fields[i].typ.clone();
                        let mut x = self.expr_with_hint(value, &field_typ);
                        self.assignment(&mut x, Some(&field_typ), "struct literal");
                    }
                } else {
                    for (i, elt) in elts.iter().enumerate() {
                        if let ExprKind::KeyValue { value, .. } = &elt.kind {
                            self.error(elt.pos, "mixture of field:value and value elements in struct literal");
                            self.raw_expr(value, None);
                            continue;
                        }
                        let mut x = self.expr(elt);
                        let Some(field) = st.fields.get(i) else {
                            self.error(x.pos, format!("too many values in struct literal of type {}", self.type_str(&base)));
                            break;
                        };
                        let field_typ = field.typ.clone();
                        self.assignment(&mut x, Some(&field_typ), "struct literal");
                    }
                    if elts.len() < st.fields.len() {
                        let last = elts.last().map_or(e.pos, |l| l.pos);
                        self.error(last, format!("too few values in struct literal of type {}", self.type_str(&base)));
                    }
                }
            }
            Type::Array(n, elem) => {
                self.indexed_elts(elts, &elem, n);
            }
            Type::Slice(elem) => {
                self.indexed_elts(elts, &elem, -1);
            }
            Type::Map(key_typ, value_typ) => {
                let mut keys: Vec<ConstValue> = Vec::new();
                for elt in elts {
                    let ExprKind::KeyValue { key, value } = &elt.kind else {
                        self.error(elt.pos, "missing key in map literal");
                        self.raw_expr(elt, None);
                        continue;
                    };
                    let mut k = self.expr_with_hint(key, &key_typ);
                    self.assignment(&mut k, Some(&*key_typ), "map literal");
                    if let Some(v) = k.value() {
                        if keys.contains(v) {
                            self.error(k.pos, format!("duplicate key {} in map literal", k.text));
                            continue;
                        }
                        keys.push(v.clone());
                    }
                    let mut v = self.expr_with_hint(value, &value_typ);
                    self.assignment(&mut v, Some(&*value_typ), "map literal");
                }
            }
            Type::Invalid => {
                self.use_exprs(elts);
                return Operand::invalid(e);
            }
            _ => {
                self.error(e.pos, format!("invalid composite literal type {}", self.type_str(&typ)));
                self.use_exprs(elts);
                return Operand::invalid(e);
            }
        }
        Operand::new(Mode::Value, typ, e)
    }

    /// Checks array or slice literal elements; returns the literal's length
    fn indexed_elts(&mut self, elts: &[Expr], elem: &Type, length: i64) -> i64 {
        let mut seen = HashSet::new();
        let mut index: i64 = 0;
        let mut max: i64 = 0;
        for elt in elts {
            let mut valid_index = false;
            let mut value = elt;
            if let ExprKind::KeyValue { key, value: v } = &elt.kind {
                let reported = self.err_count;
                match self.index(key, length) {
                    Some(i) => {
                        index = i;
                        valid_index = true;
                    }
                    None if self.err_count == reported => {
                        self.error(key.pos, format!("index {} must be integer constant", key));
                    }
                    None => {}
                }
                value = v;
            } else if length >= 0 && index >= length {
                self.error(elt.pos, format!("index {} is out of bounds (>= {})", index, length));
            } else {
                valid_index = true;
            }

            if valid_index {
                if !seen.insert(index) {
                    self.error(elt.pos, format!("duplicate index {} in array or slice literal", index));
                }
                index += 1;
                max = max.max(index);
            }

            let mut x = self.expr_with_hint(value, elem);
            self.assignment(&mut x, Some(elem), "array or slice literal");
        }
        max
    }

    /// Checks an index; returns its value when it is constant. `max` is the
    /// length of the indexed value or -1 when unknown.
    pub(crate) fn index(&mut self, e: &Expr, max: i64) -> Option<i64> {
        let mut x = self.expr(e);
        if x.is_invalid() {
            return None;
        }
        self.convert_untyped(&mut x, &Type::int());
        if x.is_invalid() {
            return None;
        }
        if !self.env.basic_kind(&x.typ).map_or(false, |k| k.is_integer()) {
            let desc = self.describe(&x);
            self.error(x.pos, format!("invalid argument: index {} must be integer", desc));
            return None;
        }
        let value = x.value()?.as_int()?;
        if value < 0 {
            let desc = self.describe(&x);
            self.error(x.pos, format!("invalid argument: index {} must not be negative", desc));
            return None;
        }
        if max >= 0 && value >= max as i128 {
            self.error(x.pos, format!("invalid argument: index {} out of bounds [0:{}]", x.text, max));
            return None;
        }
        i64::try_from(value).ok()
    }

    pub(crate) fn use_exprs(&mut self, list: &[Expr]) {
        for e in list {
            match &e.kind {
                ExprKind::KeyValue { key, value } => {
                    if key.as_ident().is_none() {
                        self.raw_expr(key, None);
                    }
                    self.raw_expr(value, None);
                }
                _ => {
                    self.raw_expr(e, None);
                }
            }
        }
    }

    // Selectors

    fn selector(&mut self, e: &Expr, base: &Expr, sel: &Ident) -> Operand {
        // qualified identifier
        if let Some(name) = base.as_ident() {
            if let Some((_, id)) = self.env.lookup(self.ctx.scope, name) {
                if let ObjKind::PkgName(pkg) = self.env.obj(id).kind {
                    self.record_use(base.id, id);
                    self.env.obj_mut(id).used = true;
                    return self.qualified_ident(e, pkg, name, sel);
                }
            }
        }

        let x = self.expr_or_type(base);
        if x.is_invalid() {
            return Operand::invalid(e);
        }
        if matches!(x.mode, Mode::Builtin(_)) {
            let desc = self.describe(&x);
            self.error(x.pos, format!("{} must be called", desc));
            return Operand::invalid(e);
        }

        if x.mode == Mode::TypeExpr {
            return self.method_expr(e, &x, sel);
        }

        match self.lookup_field_or_method(&x.typ, x.mode == Mode::Variable, &sel.name) {
            LookupResult::Field { typ, index, indirect } => {
                self.record_selection(
                    e.id,
                    Selection {
                        kind: SelectionKind::FieldVal,
                        recv: x.typ.clone(),
                        obj: None,
                        index,
                        indirect,
                        typ: typ.clone(),
                    },
                );
                let mode = if x.mode == Mode::Variable || indirect {
                    Mode::Variable
                } else {
                    Mode::Value
                };
                Operand::new(mode, typ, e)
            }
            LookupResult::Method { obj, index, indirect } => {
                self.record_use(sel.id, obj);
                if self.declared_here.contains(&obj) {
                    self.obj_decl(obj);
                    self.record_dep(obj);
                }
                let Type::Signature(sig) = self.env.obj(obj).typ.clone() else {
                    return Operand::invalid(e);
                };
                let typ = Type::signature(Signature {
                    recv: None,
                    ..(*sig).clone()
                });
                self.record_selection(
                    e.id,
                    Selection {
                        kind: SelectionKind::MethodVal,
                        recv: x.typ.clone(),
                        obj: Some(obj),
                        index,
                        indirect,
                        typ: typ.clone(),
                    },
                );
                Operand::new(Mode::Value, typ, e)
            }
            LookupResult::InterfaceMethod { sig, index, indirect } => {
                let typ = Type::Signature(sig);
                self.record_selection(
                    e.id,
                    Selection {
                        kind: SelectionKind::MethodVal,
                        recv: x.typ.clone(),
                        obj: None,
                        index,
                        indirect,
                        typ: typ.clone(),
                    },
                );
                Operand::new(Mode::Value, typ, e)
            }
            LookupResult::NotAddressable(_) => {
                let desc = self.describe(&x);
                self.error(
                    sel.pos,
                    format!("cannot call pointer method {} on {}", sel.name, desc),
                );
                Operand::invalid(e)
            }
            LookupResult::Ambiguous => {
                self.error(sel.pos, format!("ambiguous selector {}", e));
                Operand::invalid(e)
            }
            LookupResult::NotFound => {
                let ts = self.type_str(&x.typ);
                let what = if matches!(self.env.underlying(&x.typ), Type::Pointer(ref p) if self.env.is_interface(p)) {
                    format!("type {} is pointer to interface, not interface", ts)
                } else {
                    format!("type {} has no field or method {}", ts, sel.name)
                };
                self.error(sel.pos, format!("{} undefined ({})", e, what));
                Operand::invalid(e)
            }
        }
    }

    fn qualified_ident(&mut self, e: &Expr, pkg: crate::env::PkgId, pkg_name: &str, sel: &Ident) -> Operand {
        let scope = self.env.package(pkg).scope;
        let Some(id) = self.env.lookup_local(scope, &sel.name) else {
            self.error(sel.pos, format!("undefined: {}.{}", pkg_name, sel.name));
            return Operand::invalid(e);
        };
        if !self.env.obj(id).is_exported() {
            self.error(
                sel.pos,
                format!("name {} not exported by package {}", sel.name, pkg_name),
            );
            return Operand::invalid(e);
        }
        self.record_use(sel.id, id);
        let obj = self.env.obj(id);
        let typ = obj.typ.clone();
        let mode = match &obj.kind {
            ObjKind::Const(v) => Mode::Constant(v.clone()),
            ObjKind::TypeName => Mode::TypeExpr,
            ObjKind::Var => Mode::Variable,
            ObjKind::Func => Mode::Value,
            ObjKind::Builtin(b) => Mode::Builtin(*b),
            _ => Mode::Invalid,
        };
        if typ.is_invalid() && !matches!(mode, Mode::Builtin(_)) {
            return Operand::invalid(e);
        }
        Operand::new(mode, typ, e)
    }

    /// `T.m`: the method as a function whose first parameter is the receiver
    fn method_expr(&mut self, e: &Expr, x: &Operand, sel: &Ident) -> Operand {
        let (obj, sig, index, indirect) = match self.lookup_field_or_method(&x.typ, false, &sel.name) {
            LookupResult::Method { obj, index, indirect } => {
                if self.declared_here.contains(&obj) {
                    self.obj_decl(obj);
                    self.record_dep(obj);
                }
                let Type::Signature(sig) = self.env.obj(obj).typ.clone() else {
                    return Operand::invalid(e);
                };
                (Some(obj), sig, index, indirect)
            }
            LookupResult::InterfaceMethod { sig, index, indirect } => (None, sig, index, indirect),
            LookupResult::NotAddressable(_) => {
                let ts = self.type_str(&x.typ);
                self.error(
                    sel.pos,
                    format!(
                        "invalid method expression {}.{} (needs pointer receiver (*{}).{})",
                        ts, sel.name, ts, sel.name
                    ),
                );
                return Operand::invalid(e);
            }
            LookupResult::Field { .. } | LookupResult::NotFound | LookupResult::Ambiguous => {
                let ts = self.type_str(&x.typ);
                self.error(sel.pos, format!("{} undefined (type {} has no method {})", e, ts, sel.name));
                return Operand::invalid(e);
            }
        };
        if let Some(obj) = obj {
            self.record_use(sel.id, obj);
        }
        let mut params = vec![crate::types::Param::unnamed(x.typ.clone())];
        params.extend(sig.params.iter().cloned());
        let typ = Type::signature(Signature {
            recv: None,
            params,
            results: sig.results.clone(),
            variadic: sig.variadic,
        });
        self.record_selection(
            e.id,
            Selection {
                kind: SelectionKind::MethodExpr,
                recv: x.typ.clone(),
                obj,
                index,
                indirect,
                typ: typ.clone(),
            },
        );
        Operand::new(Mode::Value, typ, e)
    }

    // Index, slice and type assertion

    fn index_expr(&mut self, e: &Expr, base: &Expr, index: &Expr) -> Operand {
        let x = self.expr_or_type(base);
        match x.mode {
            Mode::Invalid => {
                self.raw_expr(index, None);
                return Operand::invalid(e);
            }
            Mode::TypeExpr => {
                let desc = self.describe(&x);
                self.error(x.pos, format!("{} is not a generic type", desc));
                return Operand::invalid(e);
            }
            _ => {}
        }

        let (mode, typ, length) = match self.env.underlying(&x.typ) {
            Type::Basic(kind) if kind.is_string() => {
                let length = match x.value() {
                    Some(ConstValue::String(s)) => s.len() as i64,
                    _ => -1,
                };
                (Mode::Value, Type::Basic(BasicKind::Uint8), length)
            }
            Type::Array(n, elem) => {
                let mode = if x.mode == Mode::Variable { Mode::Variable } else { Mode::Value };
                (mode, (*elem).clone(), n)
            }
            Type::Pointer(p) => match self.env.underlying(&p) {
                Type::Array(n, elem) => (Mode::Variable, (*elem).clone(), n),
                _ => return self.cannot_index(e, &x, index),
            },
            Type::Slice(elem) => (Mode::Variable, (*elem).clone(), -1),
            Type::Map(key, value) => {
                let mut k = self.expr_with_hint(index, &key);
                self.assignment(&mut k, Some(&*key), "map index");
                return Operand::new(Mode::MapIndex, (*value).clone(), e);
            }
            _ => return self.cannot_index(e, &x, index),
        };
        self.index(index, length);
        Operand::new(mode, typ, e)
    }

    fn cannot_index(&mut self, e: &Expr, x: &Operand, index: &Expr) -> Operand {
        let desc = self.describe(x);
        self.error(x.pos, format!("invalid operation: cannot index {}", desc));
        self.raw_expr(index, None);
        Operand::invalid(e)
    }

    fn slice_expr(
        &mut self,
        e: &Expr,
        base: &Expr,
        low: Option<&Expr>,
        high: Option<&Expr>,
        max: Option<&Expr>,
    ) -> Operand {
        let x = self.expr(base);
        if x.is_invalid() {
            for part in [low, high, max].into_iter().flatten() {
                self.raw_expr(part, None);
            }
            return Operand::invalid(e);
        }

        let mut length = -1;
        let (mode, typ) = match self.env.underlying(&x.typ) {
            Type::Basic(kind) if kind.is_string() => {
                if max.is_some() {
                    self.error(e.pos, "invalid operation: 3-index slice of string");
                    return Operand::invalid(e);
                }
                if let Some(ConstValue::String(s)) = x.value() {
                    length = s.len() as i64 + 1;
                }
                let typ = if x.typ.is_untyped() { Type::string() } else { x.typ.clone() };
                (Mode::Value, typ)
            }
            Type::Array(n, elem) => {
                if x.mode != Mode::Variable {
                    let desc = self.describe(&x);
                    self.error(x.pos, format!("invalid operation: {} (slice of unaddressable value)", desc));
                    return Operand::invalid(e);
                }
                length = n + 1;
                (Mode::Value, Type::Slice(elem))
            }
            Type::Pointer(p) => match self.env.underlying(&p) {
                Type::Array(n, elem) => {
                    length = n + 1;
                    (Mode::Value, Type::Slice(elem))
                }
                _ => return self.cannot_slice(e, &x),
            },
            Type::Slice(_) => (Mode::Value, x.typ.clone()),
            _ => return self.cannot_slice(e, &x),
        };

        let mut constant_indices: Vec<i64> = Vec::new();
        for part in [low, high, max].into_iter().flatten() {
            if let Some(i) = self.index(part, length) {
                constant_indices.push(i);
            }
        }
        if constant_indices.windows(2).any(|w| w[0] > w[1]) {
            self.error(e.pos, "invalid slice indices: indices are out of order");
        }
        Operand::new(mode, typ, e)
    }

    fn cannot_slice(&mut self, e: &Expr, x: &Operand) -> Operand {
        let desc = self.describe(x);
        self.error(x.pos, format!("cannot slice {}", desc));
        Operand::invalid(e)
    }

    fn type_assert_expr(&mut self, e: &Expr, base: &Expr, typ: Option<&Expr>) -> Operand {
        let x = self.expr(base);
        if x.is_invalid() {
            return Operand::invalid(e);
        }
        let Some(texpr) = typ else {
            self.error(e.pos, "use of .(type) outside type switch");
            return Operand::invalid(e);
        };
        if !self.env.is_interface(&x.typ) {
            let desc = self.describe(&x);
            self.error(x.pos, format!("invalid operation: {} is not an interface", desc));
            return Operand::invalid(e);
        }
        let t = self.typ_expr(texpr);
        if t.is_invalid() {
            return Operand::invalid(e);
        }
        if !self.env.is_interface(&t) && self.missing_method(&t, &x.typ).is_some() {
            let reason = self.missing_method_reason(&t, &x.typ);
            let ts = self.type_str(&t);
            let xs = self.type_str(&x.typ);
            self.error(
                texpr.pos,
                format!("impossible type assertion: {}: {} does not implement {} {}", e, ts, xs, reason),
            );
            return Operand::invalid(e);
        }
        Operand::new(Mode::CommaOk, t, e)
    }

    // Operators

    fn unary(&mut self, e: &Expr, op: UnaryOp, operand: &Expr) -> Operand {
        let mut x = self.expr(operand);
        if x.is_invalid() {
            return Operand::invalid(e);
        }
        let text = e.to_string();
        match op {
            UnaryOp::Addr => {
                let is_lit = matches!(operand.unparen().kind, ExprKind::CompositeLit { .. });
                if !is_lit && x.mode != Mode::Variable {
                    let desc = self.describe(&x);
                    self.error(x.pos, format!("invalid operation: cannot take address of {}", desc));
                    return Operand::invalid(e);
                }
                return Operand::new(Mode::Value, Type::pointer(x.typ), e);
            }
            UnaryOp::Recv => {
                let Type::Chan(dir, elem) = self.env.underlying(&x.typ) else {
                    let desc = self.describe(&x);
                    self.error(x.pos, format!("invalid operation: cannot receive from non-channel {}", desc));
                    return Operand::invalid(e);
                };
                if dir == crate::ast::ChanDir::Send {
                    let desc = self.describe(&x);
                    self.error(x.pos, format!("invalid operation: cannot receive from send-only channel {}", desc));
                    return Operand::invalid(e);
                }
                return Operand::new(Mode::CommaOk, (*elem).clone(), e);
            }
            _ => {}
        }

        let kind = self.env.basic_kind(&x.typ);
        let ok = match op {
            UnaryOp::Plus | UnaryOp::Neg => kind.map_or(false, |k| k.is_numeric()),
            UnaryOp::Xor => kind.map_or(false, |k| k.is_integer()),
            UnaryOp::Not => kind.map_or(false, |k| k.is_boolean()),
            _ => false,
        };
        if !ok {
            let desc = self.describe(&x);
            self.error(x.pos, format!("invalid operation: operator {} not defined on {}", op, desc));
            return Operand::invalid(e);
        }

        if let Mode::Constant(value) = &x.mode {
            let unsigned_bits = kind.filter(|k| k.is_unsigned()).and_then(|k| k.bits());
            match ConstValue::unary_op(op, value, unsigned_bits) {
                Ok(v) => {
                    x.mode = Mode::Constant(v);
                    x.id = e.id;
                    x.pos = e.pos;
                    x.text = text;
                    self.overflow(&mut x);
                }
                Err(err) => {
                    self.const_error(e, err);
                    return Operand::invalid(e);
                }
            }
            return x;
        }
        Operand::new(Mode::Value, x.typ, e)
    }

    pub(crate) fn binary(&mut self, e: &Expr, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Operand {
        let mut x = self.expr(lhs);
        let mut y = self.expr(rhs);
        if x.is_invalid() || y.is_invalid() {
            return Operand::invalid(e);
        }
        if op.is_shift() {
            return self.shift(e, op, x, y);
        }
        self.match_types(&mut x, &mut y);
        if x.is_invalid() || y.is_invalid() {
            return Operand::invalid(e);
        }
        if op.is_comparison() {
            self.comparison(&mut x, &mut y, op);
            if x.is_invalid() {
                return Operand::invalid(e);
            }
            return Operand { id: e.id, pos: e.pos, text: e.to_string(), ..x };
        }

        if x.typ != y.typ {
            if !x.typ.is_invalid() && !y.typ.is_invalid() {
                let xs = self.type_str(&x.typ);
                let ys = self.type_str(&y.typ);
                self.error(x.pos, format!("invalid operation: {} (mismatched types {} and {})", e, xs, ys));
            }
            return Operand::invalid(e);
        }

        if !self.op_defined(op, &x) {
            let desc = self.describe(&x);
            self.error(x.pos, format!("invalid operation: operator {} not defined on {}", op, desc));
            return Operand::invalid(e);
        }

        if matches!(op, BinaryOp::Div | BinaryOp::Rem) {
            let integer = x.is_constant() || self.env.basic_kind(&x.typ).map_or(false, |k| k.is_integer());
            if integer {
                if let Some(v) = y.value() {
                    if v.as_float() == Some(0.0) {
                        self.error(y.pos, "invalid operation: division by zero");
                        return Operand::invalid(e);
                    }
                }
            }
        }

        if let (Mode::Constant(xv), Mode::Constant(yv)) = (&x.mode, &y.mode) {
            let int_div = self.env.basic_kind(&x.typ).map_or(false, |k| k.is_integer());
            return match ConstValue::binary_op(xv, op, yv, int_div) {
                Ok(v) => {
                    let mut result = Operand::new(Mode::Constant(v), x.typ.clone(), e);
                    self.overflow(&mut result);
                    result
                }
                Err(err) => {
                    self.const_error(e, err);
                    Operand::invalid(e)
                }
            };
        }
        Operand::new(Mode::Value, x.typ, e)
    }

    fn op_defined(&self, op: BinaryOp, x: &Operand) -> bool {
        let Some(kind) = self.env.basic_kind(&x.typ) else {
            return false;
        };
        match op {
            BinaryOp::Add => kind.is_numeric() || kind.is_string(),
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => kind.is_numeric(),
            BinaryOp::Rem | BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::AndNot => kind.is_integer(),
            BinaryOp::LogAnd | BinaryOp::LogOr => kind.is_boolean(),
            _ => false,
        }
    }

    /// Gives an untyped operand the type of the other operand where the
    /// combination allows it
    pub(crate) fn match_types(&mut self, x: &mut Operand, y: &mut Operand) {
        if !self.may_convert(x, y) {
            return;
        }
        let yt = y.typ.clone();
        self.convert_untyped(x, &yt);
        if x.is_invalid() {
            return;
        }
        let xt = x.typ.clone();
        self.convert_untyped(y, &xt);
    }

    fn may_convert(&self, x: &Operand, y: &Operand) -> bool {
        if !x.typ.is_untyped() && !y.typ.is_untyped() {
            return false;
        }
        let xk = self.env.basic_kind(&x.typ);
        let yk = self.env.basic_kind(&y.typ);
        if xk.is_some() != yk.is_some() {
            // untyped nil pairs with any type that has nil
            if x.is_nil() {
                return self.has_nil(&y.typ);
            }
            if y.is_nil() {
                return self.has_nil(&x.typ);
            }
            return false;
        }
        if let (Some(xk), Some(yk)) = (xk, yk) {
            if xk.is_boolean() != yk.is_boolean() || xk.is_string() != yk.is_string() {
                return false;
            }
        }
        if x.is_nil() {
            return self.has_nil(&y.typ);
        }
        if y.is_nil() {
            return self.has_nil(&x.typ);
        }
        true
    }

    /// Checks `x op y` for a comparison operator; `x` becomes the result
    pub(crate) fn comparison(&mut self, x: &mut Operand, y: &mut Operand, op: BinaryOp) {
        let mut problem: Option<String> = None;
        if self.assignable_to(x, &y.typ) || self.assignable_to(y, &x.typ) {
            match op {
                BinaryOp::Eq | BinaryOp::Ne => {
                    if x.is_nil() && y.is_nil() {
                        problem = Some(format!("operator {} not defined on nil", op));
                    } else if x.is_nil() || y.is_nil() {
                        let other = if x.is_nil() { &y.typ } else { &x.typ };
                        if !self.has_nil(other) {
                            problem = Some(format!("mismatched types {} and untyped nil", self.type_str(other)));
                        }
                    } else if !self.comparable(&x.typ) {
                        problem = Some(format!("operator {} not defined on {}", op, self.describe(x)));
                    } else if !self.comparable(&y.typ) {
                        problem = Some(format!("operator {} not defined on {}", op, self.describe(y)));
                    }
                }
                _ => {
                    let ordered = |t: &Type| self.env.basic_kind(t).map_or(false, |k| k.is_ordered());
                    if !ordered(&x.typ) {
                        problem = Some(format!("operator {} not defined on {}", op, self.describe(x)));
                    } else if !ordered(&y.typ) {
                        problem = Some(format!("operator {} not defined on {}", op, self.describe(y)));
                    }
                }
            }
        } else {
            problem = Some(format!(
                "mismatched types {} and {}",
                self.type_str(&x.typ),
                self.type_str(&y.typ)
            ));
        }

        if let Some(problem) = problem {
            self.error(x.pos, format!("invalid operation: {} {} {} ({})", x.text, op, y.text, problem));
            x.invalidate();
            return;
        }

        if let (Mode::Constant(xv), Mode::Constant(yv)) = (&x.mode, &y.mode) {
            match ConstValue::compare(xv, op, yv) {
                Ok(b) => x.mode = Mode::Constant(ConstValue::Bool(b)),
                Err(_) => x.mode = Mode::Value,
            }
        } else {
            x.mode = Mode::Value;
            // operands are materialized with their default types
            let xt = x.typ.default_type();
            let yt = y.typ.default_type();
            self.update_expr_type(x.id, &xt, true);
            self.update_expr_type(y.id, &yt, true);
        }
        x.typ = Type::Basic(BasicKind::UntypedBool);
    }

    fn shift(&mut self, e: &Expr, op: BinaryOp, mut x: Operand, mut y: Operand) -> Operand {
        // the shifted operand must be an integer or an untyped constant
        // representable as one
        let xval = x.value().and_then(|v| {
            if x.typ.is_untyped() {
                v.representable(BasicKind::UntypedInt)
            } else {
                None
            }
        });
        let x_integer = self.env.basic_kind(&x.typ).map_or(false, |k| k.is_integer());
        if !(x_integer || (x.typ.is_untyped() && xval.is_some()) || (x.typ.is_untyped() && !x.is_constant())) {
            let desc = self.describe(&x);
            self.error(x.pos, format!("invalid operation: shifted operand {} must be integer", desc));
            return Operand::invalid(e);
        }

        // the count must be a non-negative integer
        let mut count: Option<u32> = None;
        if let Some(v) = y.value() {
            match v.as_int() {
                Some(n) if n < 0 => {
                    let desc = self.describe(&y);
                    self.error(y.pos, format!("invalid shift count {} (negative)", desc));
                    return Operand::invalid(e);
                }
                Some(n) => count = Some(u32::try_from(n).unwrap_or(u32::MAX)),
                None => {
                    let desc = self.describe(&y);
                    self.error(y.pos, format!("invalid operation: shift count {} must be integer", desc));
                    return Operand::invalid(e);
                }
            }
            if y.typ.is_untyped() {
                self.convert_untyped(&mut y, &Type::Basic(BasicKind::Uint));
                if y.is_invalid() {
                    return Operand::invalid(e);
                }
            }
        } else if y.typ.is_untyped() {
            self.convert_untyped(&mut y, &Type::Basic(BasicKind::Uint));
            if y.is_invalid() {
                return Operand::invalid(e);
            }
        } else if !self.env.basic_kind(&y.typ).map_or(false, |k| k.is_integer()) {
            let desc = self.describe(&y);
            self.error(y.pos, format!("invalid operation: shift count {} must be integer", desc));
            return Operand::invalid(e);
        }

        if x.is_constant() {
            if let Some(count) = count {
                let Some(xv) = xval.or_else(|| x.value().cloned()) else {
                    return Operand::invalid(e);
                };
                if count > 1023 {
                    self.error(y.pos, format!("invalid shift count {}", y.text));
                    return Operand::invalid(e);
                }
                let mut typ = x.typ.clone();
                if typ.is_untyped() && typ.basic() != Some(BasicKind::UntypedRune) {
                    typ = Type::Basic(BasicKind::UntypedInt);
                }
                return match ConstValue::shift(&xv, op, count) {
                    Ok(v) => {
                        let mut result = Operand::new(Mode::Constant(v), typ, e);
                        self.overflow(&mut result);
                        result
                    }
                    Err(err) => {
                        self.const_error(e, err);
                        Operand::invalid(e)
                    }
                };
            }
            if x.typ.is_untyped() {
                // the final type of `1 << s` comes from context
                if let Some(u) = self.untyped.get_mut(&x.id) {
                    u.shift_operand = true;
                }
                x.mode = Mode::Value;
                return Operand::new(Mode::Value, x.typ, e);
            }
        }

        if !x_integer && !x.typ.is_untyped() {
            let desc = self.describe(&x);
            self.error(x.pos, format!("invalid operation: shifted operand {} must be integer", desc));
            return Operand::invalid(e);
        }
        Operand::new(Mode::Value, x.typ, e)
    }

    /// Reports typed constants that do not fit their type
    fn overflow(&mut self, x: &mut Operand) {
        let Mode::Constant(value) = &x.mode else {
            return;
        };
        if x.typ.is_untyped() {
            return;
        }
        if let Some(kind) = self.env.basic_kind(&x.typ) {
            match value.representable(kind) {
                Some(v) => x.mode = Mode::Constant(v),
                None => {
                    let ts = self.type_str(&x.typ);
                    self.error(x.pos, format!("constant {} overflows {}", value, ts));
                    x.invalidate();
                }
            }
        }
    }

    fn const_error(&mut self, e: &Expr, err: ConstError) {
        let message = match err {
            ConstError::DivByZero => "invalid operation: division by zero".to_string(),
            ConstError::Overflow => format!("constant overflow in {}", e),
            ConstError::NegativeShift => format!("invalid shift count in {}", e),
            ConstError::Mismatch => format!("invalid constant operation {}", e),
        };
        self.error(e.pos, message);
    }

    // Untyped conversion

    /// Converts an untyped operand to `target` (or, for an untyped target,
    /// to the larger of the two untyped kinds)
    pub(crate) fn convert_untyped(&mut self, x: &mut Operand, target: &Type) {
        if x.is_invalid() || !x.typ.is_untyped() || target.is_invalid() {
            return;
        }
        let Some(xk) = x.typ.basic() else {
            return;
        };

        if target.is_untyped() {
            let Some(tk) = target.basic() else {
                return;
            };
            if xk.is_numeric() && tk.is_numeric() {
                if xk.untyped_rank() < tk.untyped_rank() {
                    x.typ = target.clone();
                    self.update_expr_type(x.id, target, false);
                }
            } else if xk != tk {
                self.invalid_conversion(x, target);
            }
            return;
        }

        let final_typ = match self.env.underlying(target) {
            Type::Basic(tk) => {
                if let Mode::Constant(value) = &x.mode {
                    match value.representable(tk) {
                        Some(v) => x.mode = Mode::Constant(v),
                        None => {
                            self.representable_error(x, target);
                            x.invalidate();
                            return;
                        }
                    }
                } else {
                    let ok = if x.is_nil() {
                        false
                    } else if xk == BasicKind::UntypedBool {
                        tk.is_boolean()
                    } else {
                        tk.is_numeric()
                    };
                    if !ok {
                        self.invalid_conversion(x, target);
                        return;
                    }
                }
                target.clone()
            }
            Type::Interface(iface) => {
                if x.is_nil() {
                    return;
                }
                if !iface.is_empty() {
                    self.invalid_conversion(x, target);
                    return;
                }
                let default = x.typ.default_type();
                if let (Mode::Constant(value), Some(kind)) = (&x.mode, default.basic()) {
                    if value.representable(kind).is_none() {
                        self.representable_error(x, &default);
                        x.invalidate();
                        return;
                    }
                }
                default
            }
            Type::Pointer(_) | Type::Signature(_) | Type::Slice(_) | Type::Map(..) | Type::Chan(..) => {
                if !x.is_nil() {
                    self.invalid_conversion(x, target);
                }
                return;
            }
            _ => {
                self.invalid_conversion(x, target);
                return;
            }
        };
        x.typ = final_typ.clone();
        self.update_expr_type(x.id, &final_typ, true);
    }

    fn invalid_conversion(&mut self, x: &mut Operand, target: &Type) {
        let desc = self.describe(x);
        let ts = self.type_str(target);
        self.error(x.pos, format!("cannot convert {} to {}", desc, ts));
        x.invalidate();
    }

    fn representable_error(&mut self, x: &Operand, target: &Type) {
        let desc = self.describe(x);
        let ts = self.type_str(target);
        let xk = x.typ.basic();
        let tk = self.env.basic_kind(target);
        let message = match (xk, tk) {
            (Some(xk), Some(tk)) if xk.is_numeric() && tk.is_numeric() => {
                let fractional = matches!(x.value(), Some(ConstValue::Float(f)) if f.fract() != 0.0);
                if fractional && tk.is_integer() {
                    format!("cannot use {} as {} value (truncated)", desc, ts)
                } else {
                    format!("cannot use {} as {} value (overflows)", desc, ts)
                }
            }
            _ => format!("cannot convert {} to {}", desc, ts),
        };
        self.error(x.pos, message);
    }

    /// Propagates the final type of an untyped expression to the operands
    /// it was built from
    pub(crate) fn update_expr_type(&mut self, id: NodeId, target: &Type, is_final: bool) {
        let Some(old) = self.untyped.get(&id).cloned() else {
            return;
        };
        for child in &old.children {
            self.update_expr_type(*child, target, is_final);
        }

        if !is_final && target.is_untyped() {
            if let Some(entry) = self.untyped.get_mut(&id) {
                entry.typ = target.clone();
            }
            return;
        }

        self.untyped.remove(&id);
        if old.shift_operand && !self.env.basic_kind(target).map_or(false, |k| k.is_integer()) {
            let ts = self.type_str(target);
            self.error(
                old.pos,
                format!("invalid operation: shifted operand {} (type {}) must be integer", old.text, ts),
            );
            return;
        }
        let mode = match (&old.mode, self.env.basic_kind(target)) {
            (Mode::Constant(v), Some(kind)) if !target.is_untyped() => match v.representable(kind) {
                Some(v) => Mode::Constant(v),
                None => old.mode.clone(),
            },
            _ => old.mode.clone(),
        };
        self.record_type_and_value(id, &mode, target);
    }
}

/// Operands whose type follows an untyped expression's final type
fn untyped_children(e: &Expr, x: &Operand) -> Vec<NodeId> {
    match &e.kind {
        ExprKind::Paren(inner) => vec![inner.id],
        ExprKind::Unary { x: inner, .. } if !x.is_constant() => vec![inner.id],
        ExprKind::Binary { op, x: l, y: r } if !x.is_constant() => {
            if op.is_comparison() {
                Vec::new()
            } else if op.is_shift() {
                vec![l.id]
            } else {
                vec![l.id, r.id]
            }
        }
        _ => Vec::new(),
    }
}
