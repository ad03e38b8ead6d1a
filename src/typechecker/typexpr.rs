//! Type expressions and signatures

use std::collections::HashSet;
use std::rc::Rc;

use crate::ast::{Expr, ExprKind, Field, FuncType, Ident};
use crate::env::{ObjKind, Object, ScopeId};
use crate::types::{FieldInfo, InterfaceType, MethodSig, Param, Signature, StructType, Type};

use super::operand::Mode;
use super::{Checker, Delayed};

impl<'a> Checker<'a> {
    /// Evaluates `e` as a type; reports and returns Invalid otherwise
    pub(crate) fn typ_expr(&mut self, e: &Expr) -> Type {
        let t = self.typ_internal(e);
        if !t.is_invalid() {
            self.record_type_and_value(e.id, &Mode::TypeExpr, &t);
        }
        t
    }

    fn typ_internal(&mut self, e: &Expr) -> Type {
        match &e.kind {
            ExprKind::Ident(_) | ExprKind::Selector { .. } => {
                let x = self.expr_or_type(e);
                match x.mode {
                    Mode::TypeExpr => x.typ,
                    Mode::Invalid => Type::Invalid,
                    _ => {
                        let desc = self.describe(&x);
                        self.error(e.pos, format!("{} is not a type", desc));
                        Type::Invalid
                    }
                }
            }
            ExprKind::Paren(inner) => self.typ_expr(inner),
            ExprKind::ArrayType { len: None, elem } => Type::slice(self.typ_expr(elem)),
            ExprKind::ArrayType { len: Some(len), elem } => {
                if matches!(len.kind, ExprKind::Ellipsis(None)) {
                    self.error(len.pos, "invalid use of [...] array (outside a composite literal)");
                    self.typ_expr(elem);
                    return Type::Invalid;
                }
                let n = self.array_length(len);
                let elem = self.typ_expr(elem);
                match n {
                    Some(n) => Type::Array(n, Rc::new(elem)),
                    None => Type::Invalid,
                }
            }
            ExprKind::Ellipsis(_) => {
                self.error(e.pos, "invalid use of ...");
                Type::Invalid
            }
            ExprKind::StructType(fields) => self.struct_type(fields),
            ExprKind::Star(elem) => {
                let elem = self.typ_expr(elem);
                if elem.is_invalid() {
                    return Type::Invalid;
                }
                Type::pointer(elem)
            }
            ExprKind::FuncType(ft) => {
                let (sig, _) = self.func_type(None, ft);
                Type::signature(sig)
            }
            ExprKind::InterfaceType(methods) => self.interface_type(methods),
            ExprKind::MapType { key, value } => {
                let k = self.typ_expr(key);
                let v = self.typ_expr(value);
                self.later(Delayed::MapKey {
                    pos: key.pos,
                    key: k.clone(),
                });
                Type::map(k, v)
            }
            ExprKind::ChanType { dir, value } => Type::Chan(*dir, Rc::new(self.typ_expr(value))),
            _ => {
                self.error(e.pos, format!("{} is not a type", e));
                Type::Invalid
            }
        }
    }

    fn array_length(&mut self, e: &Expr) -> Option<i64> {
        let x = self.expr(e);
        if x.is_invalid() {
            return None;
        }
        let Some(value) = x.value() else {
            self.error(e.pos, format!("array length {} must be constant", e));
            return None;
        };
        let integer = x.typ.is_untyped() || self.env.basic_kind(&x.typ).map_or(false, |k| k.is_integer());
        match value.as_int() {
            Some(n) if integer && n >= 0 => i64::try_from(n).ok(),
            _ => {
                let desc = self.describe(&x);
                self.error(e.pos, format!("invalid array length {}", desc));
                None
            }
        }
    }

    fn struct_type(&mut self, fields: &[Field]) -> Type {
        let mut out: Vec<FieldInfo> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for field in fields {
            let typ = self.typ_expr(&field.typ);
            if field.names.is_empty() {
                let Some(name) = embedded_name(&field.typ) else {
                    self.error(field.typ.pos, format!("invalid embedded field type {}", field.typ));
                    continue;
                };
                if let Type::Pointer(base) = &typ {
                    if matches!(**base, Type::Pointer(_)) || self.env.is_interface(base) {
                        self.error(
                            field.typ.pos,
                            "embedded field type cannot be a pointer to an interface or pointer",
                        );
                        continue;
                    }
                }
                self.add_field(&mut out, &mut seen, name, typ, true, field.typ.pos);
            } else {
                for ident in &field.names {
                    self.add_field(&mut out, &mut seen, ident.name.clone(), typ.clone(), false, ident.pos);
                }
            }
        }
        Type::Struct(Rc::new(StructType { fields: out }))
    }

    fn add_field(
        &mut self,
        out: &mut Vec<FieldInfo>,
        seen: &mut HashSet<String>,
        name: String,
        typ: Type,
        embedded: bool,
        pos: crate::ast::Pos,
    ) {
        if name != "_" && !seen.insert(name.clone()) {
            self.error(pos, format!("{} redeclared", name));
            return;
        }
        out.push(FieldInfo {
            name,
            typ,
            embedded,
            pos,
        });
    }

    fn interface_type(&mut self, entries: &[Field]) -> Type {
        let mut methods: Vec<MethodSig> = Vec::new();
        let mut embeddeds: Vec<Type> = Vec::new();
        for entry in entries {
            match entry.names.first() {
                Some(name) => {
                    let ExprKind::FuncType(ft) = &entry.typ.kind else {
                        self.error(entry.typ.pos, format!("{} is not a method signature", entry.typ));
                        continue;
                    };
                    if name.is_blank() {
                        self.error(name.pos, "methods must have a unique non-blank name");
                        continue;
                    }
                    let (sig, _) = self.func_type(None, ft);
                    if methods.iter().any(|m| m.name == name.name) {
                        self.error(name.pos, format!("duplicate method {}", name.name));
                        continue;
                    }
                    methods.push(MethodSig {
                        name: name.name.clone(),
                        sig: Rc::new(sig),
                        pos: name.pos,
                    });
                }
                None => {
                    let t = self.typ_expr(&entry.typ);
                    if t.is_invalid() {
                        continue;
                    }
                    match self.env.underlying(&t) {
                        Type::Interface(_) => embeddeds.push(t),
                        Type::Invalid => {
                            self.error(entry.typ.pos, format!("invalid recursive type {}", entry.typ));
                        }
                        _ => {
                            let ts = self.type_str(&t);
                            self.error(entry.typ.pos, format!("{} is not an interface", ts));
                        }
                    }
                }
            }
        }

        let mut all: Vec<MethodSig> = methods.clone();
        for embedded in &embeddeds {
            let Type::Interface(iface) = self.env.underlying(embedded) else {
                continue;
            };
            for m in &iface.all_methods {
                match all.iter().find(|have| have.name == m.name) {
                    Some(have) if have.sig != m.sig => {
                        self.error(m.pos, format!("duplicate method {}", m.name));
                    }
                    Some(_) => {}
                    None => all.push(m.clone()),
                }
            }
        }
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Type::Interface(Rc::new(InterfaceType {
            methods,
            embeddeds,
            all_methods: all,
        }))
    }

    /// Builds a signature and the function scope holding its receiver,
    /// parameters and named results
    pub(crate) fn func_type(&mut self, recv: Option<&Field>, ft: &FuncType) -> (Signature, ScopeId) {
        let scope = self.env.new_scope(Some(self.ctx.scope), true);

        let recv = recv.map(|field| {
            let typ = self.typ_expr(&field.typ);
            let mut params = self.declare_params(scope, std::slice::from_ref(field), &[typ]);
            params.pop().unwrap_or_else(|| Param::unnamed(Type::Invalid))
        });

        let mut variadic = false;
        let mut param_types = Vec::with_capacity(ft.params.len());
        for (i, field) in ft.params.iter().enumerate() {
            match &field.typ.kind {
                ExprKind::Ellipsis(Some(elem)) => {
                    if i + 1 != ft.params.len() || field.names.len() > 1 {
                        self.error(field.typ.pos, "can only use ... with final parameter in list");
                    }
                    variadic = true;
                    let elem = self.typ_expr(elem);
                    param_types.push(Type::slice(elem));
                }
                _ => param_types.push(self.typ_expr(&field.typ)),
            }
        }
        let params = self.declare_params(scope, &ft.params, &param_types);

        let result_types: Vec<Type> = ft.results.iter().map(|f| self.typ_expr(&f.typ)).collect();
        let results = self.declare_params(scope, &ft.results, &result_types);

        (
            Signature {
                recv,
                params,
                results,
                variadic,
            },
            scope,
        )
    }

    fn declare_params(&mut self, scope: ScopeId, fields: &[Field], types: &[Type]) -> Vec<Param> {
        let mut params = Vec::new();
        for (field, typ) in fields.iter().zip(types) {
            if field.names.is_empty() {
                params.push(Param::unnamed(typ.clone()));
                continue;
            }
            for ident in &field.names {
                let obj = self.env.new_object(Object::new(
                    ident.name.clone(),
                    ObjKind::Var,
                    typ.clone(),
                    Some(self.pkg),
                    ident.pos,
                ));
                self.declare(scope, ident, obj);
                params.push(Param::new(ident.name.clone(), typ.clone()));
            }
        }
        params
    }

    /// Binds a local object, rejecting a second declaration in one block
    pub(crate) fn declare(&mut self, scope: ScopeId, ident: &Ident, obj: crate::env::ObjId) {
        if !ident.is_blank() {
            if self.env.lookup_local(scope, &ident.name).is_some() {
                self.error(ident.pos, format!("{} redeclared in this block", ident.name));
                return;
            }
            self.env.bind(scope, &ident.name, obj);
        }
        self.record_def(ident.id, obj);
    }
}

/// The implicit field name of an embedded field: its type name
fn embedded_name(e: &Expr) -> Option<String> {
    match &e.kind {
        ExprKind::Ident(name) => Some(name.clone()),
        ExprKind::Star(inner) => embedded_name(inner),
        ExprKind::Selector { sel, .. } => Some(sel.name.clone()),
        ExprKind::Paren(inner) => embedded_name(inner),
        _ => None,
    }
}
