//! Declarations: package-level objects on demand, and local declarations

use std::rc::Rc;

use crate::ast::{Decl, FuncDecl, Ident, TypeSpec, ValueSpec};
use crate::constant::ConstValue;
use crate::env::{Color, DeclKind, NamedId, ObjId, ObjKind, Object, VarSource};
use crate::types::{Signature, Type};

use super::assign::single_call;
use super::{Body, Checker, Context, Delayed, FuncWork};

impl<'a> Checker<'a> {
    /// Step 3: types every package-level object, in resolved order
    pub(crate) fn package_objects(&mut self, order: &[ObjId]) {
        let _span = tracing::trace_span!("package_objects").entered();
        for obj in order {
            self.obj_decl(*obj);
        }

        // methods whose receiver base type was declared by an earlier
        // submission, or not at all
        let leftover = std::mem::take(&mut self.methods);
        for (base, methods) in leftover {
            tracing::trace!(%base, count = methods.len(), "methods on an existing type");
            for method in methods {
                self.obj_decl(method);
            }
        }
    }

    /// Types a package-level object declared by these files, unless it
    /// already has been. A grey object is on the current path: a cycle.
    pub(crate) fn obj_decl(&mut self, id: ObjId) {
        match self.env.obj(id).color {
            Color::Black => return,
            Color::Grey => {
                let valid = self.valid_cycle(id);
                let obj = self.env.obj_mut(id);
                if !valid && !matches!(obj.kind, ObjKind::Func) {
                    obj.typ = Type::Invalid;
                }
                return;
            }
            Color::White => {
                // a variable typed together with the rest of its group
                if !self.env.obj(id).typ.is_invalid() {
                    self.env.obj_mut(id).color = Color::Black;
                    return;
                }
            }
        }

        let Some(info) = self.env.decl(self.pkg, id).cloned() else {
            self.env.obj_mut(id).color = Color::Black;
            return;
        };

        self.env.obj_mut(id).color = Color::Grey;
        self.obj_path.push(id);
        let saved = std::mem::replace(
            &mut self.ctx,
            Context {
                scope: info.file_scope,
                decl: Some(id),
                iota: None,
                sig: None,
            },
        );

        match &info.kind {
            DeclKind::Const { init, index, iota } => {
                self.ctx.iota = Some(ConstValue::Int(*iota));
                self.const_decl(id, init, *index);
            }
            DeclKind::Var { source, index, lhs } => self.var_decl(id, source, *index, lhs.as_deref()),
            DeclKind::Type(spec) => self.type_decl(id, spec, false),
            DeclKind::Func(fd) => self.func_decl(id, fd),
        }

        self.ctx = saved;
        self.obj_path.pop();
        self.env.obj_mut(id).color = Color::Black;
    }

    /// A cycle through `id` is legal when it contains only constants and
    /// variables (the initialization order reports those) or only types and
    /// functions with at least one type definition
    fn valid_cycle(&mut self, id: ObjId) -> bool {
        let Some(start) = self.obj_path.iter().position(|o| *o == id) else {
            return true;
        };
        let cycle: Vec<ObjId> = self.obj_path[start..].to_vec();

        let mut nval = 0;
        let mut ndef = 0;
        for obj in &cycle {
            match self.env.obj(*obj).kind {
                ObjKind::Const(_) | ObjKind::Var => nval += 1,
                ObjKind::TypeName => {
                    let alias = matches!(
                        self.env.decl(self.pkg, *obj).map(|d| &d.kind),
                        Some(DeclKind::Type(spec)) if spec.alias
                    );
                    if !alias {
                        ndef += 1;
                    }
                }
                _ => {}
            }
        }
        tracing::trace!(len = cycle.len(), nval, ndef, "declaration cycle");

        if nval == cycle.len() || (nval == 0 && ndef > 0) {
            return true;
        }
        self.cycle_error(&cycle);
        false
    }

    fn cycle_error(&mut self, cycle: &[ObjId]) {
        let first = cycle[0];
        if !self.cycle_reported.insert(first) {
            return;
        }
        let obj = self.env.obj(first);
        let (pos, name) = (obj.pos, obj.name.clone());
        let message = if obj.is_type_name() {
            format!("invalid recursive type {}", name)
        } else {
            format!("illegal cycle in declaration of {}", name)
        };
        self.error(pos, message);
    }

    // Constants

    fn const_decl(&mut self, obj: ObjId, init: &ValueSpec, index: usize) {
        let declared = init.typ.as_ref().map(|t| self.typ_expr(t));
        if let (Some(t), Some(texpr)) = (&declared, &init.typ) {
            if !t.is_invalid() && !matches!(self.env.underlying(t), Type::Basic(_)) {
                let ts = self.type_str(t);
                self.error(texpr.pos, format!("invalid constant type {}", ts));
                self.env.obj_mut(obj).typ = Type::Invalid;
                return;
            }
        }

        let Some(e) = init.values.get(index) else {
            self.env.obj_mut(obj).typ = Type::Invalid;
            return;
        };
        let mut x = self.expr(e);
        if x.is_invalid() || declared.as_ref().map_or(false, |t| t.is_invalid()) {
            self.env.obj_mut(obj).typ = Type::Invalid;
            return;
        }
        if !x.is_constant() {
            let desc = self.describe(&x);
            self.error(x.pos, format!("{} is not constant", desc));
            self.env.obj_mut(obj).typ = Type::Invalid;
            return;
        }

        let typ = declared.unwrap_or_else(|| x.typ.clone());
        self.assignment(&mut x, Some(&typ), "constant declaration");
        let Some(value) = x.value().cloned() else {
            self.env.obj_mut(obj).typ = Type::Invalid;
            return;
        };
        let o = self.env.obj_mut(obj);
        o.typ = typ;
        o.kind = ObjKind::Const(value);
    }

    // Variables

    fn var_decl(&mut self, obj: ObjId, source: &VarSource, index: usize, lhs: Option<&[ObjId]>) {
        if let Some(texpr) = source.type_expr() {
            let t = self.typ_expr(texpr);
            self.env.obj_mut(obj).typ = t;
        }

        match lhs {
            Some(group) => {
                for member in group {
                    self.adopt_reused(*member);
                }
            }
            None => self.adopt_reused(obj),
        }

        let values = source.values();
        let init = match lhs {
            Some(_) => values.first(),
            None => values.get(index),
        };
        let Some(init) = init else {
            return;
        };

        match lhs {
            Some(group) if group.len() > 1 => {
                if source.type_expr().is_some() {
                    let t = self.env.obj(obj).typ.clone();
                    for other in group {
                        self.env.obj_mut(*other).typ = t.clone();
                    }
                }
                self.init_vars(group, std::slice::from_ref(init), "variable declaration");

                // the other variables of the group share this initializer
                let deps = self.deps.get(&obj).cloned().unwrap_or_default();
                for other in group {
                    if *other != obj {
                        self.env.obj_mut(*other).color = Color::Black;
                        self.deps.insert(*other, deps.clone());
                    }
                }
            }
            _ if values.len() == 1 && single_call(values) => {
                self.init_vars(&[obj], values, "variable declaration");
            }
            _ => {
                let mut x = self.expr(init);
                self.init_var(obj, &mut x, "variable declaration");
            }
        }
    }

    /// A prompt `:=` target standing for an earlier variable of the same
    /// submission takes that variable's type, so the initializer is checked
    /// as an assignment to it
    fn adopt_reused(&mut self, obj: ObjId) {
        let Some(existing) = self.reused.get(&obj).copied() else {
            return;
        };
        self.obj_decl(existing);
        self.record_dep(existing);
        let typ = self.env.obj(existing).typ.clone();
        self.env.obj_mut(obj).typ = typ;
    }

    // Types

    /// Declares the type named by `spec`; `local` types may not have methods
    pub(crate) fn type_decl(&mut self, obj: ObjId, spec: &TypeSpec, local: bool) {
        if spec.alias {
            let t = self.typ_expr(&spec.typ);
            self.env.obj_mut(obj).typ = t;
            return;
        }

        let named = self.env.new_named(obj);
        self.env.obj_mut(obj).typ = Type::Named(named);

        let rhs = self.typ_expr(&spec.typ);
        let underlying = self.env.underlying(&rhs);
        if let Type::Named(other) = &rhs {
            // the right-hand side is still being declared further up the path
            let other_obj = self.env.named(*other).obj;
            if underlying.is_invalid() && self.env.obj(other_obj).color == Color::Grey {
                self.cycle_reported.insert(obj);
                self.error(spec.name.pos, format!("invalid recursive type {}", spec.name.name));
            }
        }
        self.env.set_underlying(named, underlying);

        let mut path = vec![named];
        let underlying = self.env.named(named).underlying.clone();
        if !self.valid_type(&underlying, &mut path) {
            self.env.set_underlying(named, Type::Invalid);
        }

        if !local {
            if let Some(methods) = self.methods.remove(&spec.name.name) {
                for method in methods {
                    self.obj_decl(method);
                }
            }
        }
    }

    /// Rejects types that contain themselves without indirection
    fn valid_type(&mut self, t: &Type, path: &mut Vec<NamedId>) -> bool {
        match t {
            Type::Array(_, elem) => self.valid_type(elem, path),
            Type::Struct(st) => {
                let st = st.clone();
                st.fields.iter().all(|f| self.valid_type(&f.typ, path))
            }
            Type::Interface(iface) => {
                let iface = iface.clone();
                iface.embeddeds.iter().all(|e| self.valid_type(e, path))
            }
            Type::Named(id) => {
                if let Some(start) = path.iter().position(|p| p == id) {
                    let obj = self.env.named(path[start]).obj;
                    if self.cycle_reported.insert(obj) {
                        let names: Vec<String> = path[start..]
                            .iter()
                            .map(|n| self.env.type_name(*n).to_string())
                            .collect();
                        let pos = self.env.obj(obj).pos;
                        let mut message = format!("invalid recursive type {}", names[0]);
                        if names.len() > 1 {
                            message.push_str(&format!(": {} refers to {}", names.join(" refers to "), names[0]));
                        }
                        self.error(pos, message);
                    }
                    return false;
                }
                path.push(*id);
                let underlying = self.env.named(*id).underlying.clone();
                let ok = self.valid_type(&underlying, path);
                path.pop();
                ok
            }
            _ => true,
        }
    }

    // Functions and methods

    fn func_decl(&mut self, obj: ObjId, fd: &Rc<FuncDecl>) {
        // recursive references see an empty signature until this one is done
        self.env.obj_mut(obj).typ = Type::signature(Signature::default());

        let (sig, scope) = self.func_type(fd.recv.as_ref(), &fd.typ);
        self.record_scope(fd.id, scope);
        let sig = Rc::new(sig);
        self.env.obj_mut(obj).typ = Type::Signature(sig.clone());

        if let Some(recv) = &sig.recv {
            let recv_typ = recv.typ.clone();
            self.attach_method(obj, &recv_typ, fd);
        }

        match &fd.body {
            None => self.error(fd.name.pos, "missing function body"),
            Some(_) => self.funcs.push(FuncWork {
                decl: Some(obj),
                name: fd.name.name.clone(),
                sig: Some(sig),
                scope,
                body: Body::Decl(fd.clone()),
            }),
        }
    }

    /// Adds a method to its receiver's named type. A method typed at an
    /// earlier prompt is replaced; two in one submission are an error.
    fn attach_method(&mut self, method: ObjId, recv: &Type, fd: &FuncDecl) {
        let pos = fd.recv.as_ref().map_or(fd.pos, |f| f.typ.pos);
        if recv.is_invalid() {
            return;
        }
        let base = match recv {
            Type::Pointer(elem) => (**elem).clone(),
            other => other.clone(),
        };
        let Type::Named(named) = base else {
            let ts = self.type_str(recv);
            self.error(pos, format!("invalid receiver type {}", ts));
            return;
        };

        let type_obj = self.env.named(named).obj;
        if self.env.obj(type_obj).pkg != Some(self.pkg) {
            let ts = self.type_str(&base);
            self.error(pos, format!("cannot define new methods on non-local type {}", ts));
            return;
        }
        if matches!(self.env.underlying(&base), Type::Pointer(_) | Type::Interface(_)) {
            let ts = self.type_str(&base);
            self.error(pos, format!("invalid receiver type {} (pointer or interface type)", ts));
            return;
        }
        if fd.name.is_blank() {
            return;
        }

        let existing = self
            .env
            .named(named)
            .methods
            .iter()
            .copied()
            .find(|m| self.env.obj(*m).name == fd.name.name);
        if let Some(existing) = existing {
            if existing != method && self.declared_here.contains(&existing) {
                let ts = self.type_str(&base);
                self.error(fd.name.pos, format!("method {}.{} already declared", ts, fd.name.name));
                return;
            }
        }

        if let Some(replaced) = self.env.add_method(named, method) {
            tracing::debug!(method = %fd.name.name, ?replaced, "replaced method from an earlier submission");
        }
        self.later(Delayed::FieldMethodClash { named, method });
    }

    // Local declarations

    pub(crate) fn decl_stmt(&mut self, decl: &Decl) {
        match decl {
            Decl::Const(specs) => {
                let mut last: Option<Rc<ValueSpec>> = None;
                for (iota, spec) in specs.iter().enumerate() {
                    if spec.typ.is_some() || !spec.values.is_empty() {
                        last = Some(spec.clone());
                    }
                    let init = last.clone().unwrap_or_else(|| spec.clone());
                    self.arity_match(spec, Some(&init));

                    let objs: Vec<ObjId> = spec
                        .names
                        .iter()
                        .map(|ident| {
                            self.env.new_object(Object::new(
                                ident.name.clone(),
                                ObjKind::Const(ConstValue::Int(0)),
                                Type::Invalid,
                                Some(self.pkg),
                                ident.pos,
                            ))
                        })
                        .collect();

                    let saved = self.ctx.iota.replace(ConstValue::Int(iota as i128));
                    for (i, obj) in objs.iter().enumerate() {
                        self.const_decl(*obj, &init, i);
                    }
                    self.ctx.iota = saved;

                    // constants are in scope after their specification
                    let scope = self.ctx.scope;
                    for (ident, obj) in spec.names.iter().zip(objs) {
                        self.declare(scope, ident, obj);
                    }
                }
            }
            Decl::Var(specs) => {
                for spec in specs {
                    self.arity_match(spec, None);
                    let typ = spec.typ.as_ref().map(|t| self.typ_expr(t));
                    let objs: Vec<ObjId> = spec
                        .names
                        .iter()
                        .map(|ident| {
                            self.env.new_object(Object::new(
                                ident.name.clone(),
                                ObjKind::Var,
                                typ.clone().unwrap_or(Type::Invalid),
                                Some(self.pkg),
                                ident.pos,
                            ))
                        })
                        .collect();

                    if !spec.values.is_empty() {
                        self.init_vars(&objs, &spec.values, "variable declaration");
                    }

                    let scope = self.ctx.scope;
                    for (ident, obj) in spec.names.iter().zip(objs) {
                        self.declare(scope, ident, obj);
                        if !ident.is_blank() {
                            self.locals.push(obj);
                        }
                    }
                }
            }
            Decl::Type(specs) => {
                for spec in specs {
                    let obj = self.env.new_object(Object::new(
                        spec.name.name.clone(),
                        ObjKind::TypeName,
                        Type::Invalid,
                        Some(self.pkg),
                        spec.name.pos,
                    ));
                    // in scope for its own definition
                    let scope = self.ctx.scope;
                    self.declare(scope, &spec.name, obj);
                    self.type_decl(obj, spec, true);
                    self.env.obj_mut(obj).color = Color::Black;
                }
            }
            Decl::Func(fd) => {
                self.error(fd.pos, "function declaration not allowed in function body");
            }
            Decl::Stmt(stmt) => {
                self.error(stmt.pos, "unexpected statement in declaration list");
            }
        }
    }

    /// Compares the number of names with the number of initializers of a
    /// `var` or `const` specification; `init` is the specification a
    /// constant takes its values from
    pub(crate) fn arity_match(&mut self, spec: &ValueSpec, init: Option<&ValueSpec>) {
        let names = spec.names.len();
        let values = init.map_or(spec.values.len(), |i| i.values.len());
        let inherited = init.map_or(false, |i| i.id != spec.id);

        if values == 0 {
            if spec.typ.is_none() || init.is_some() {
                self.error(spec.pos, "missing type or init expr");
            }
            return;
        }
        if names < values {
            if inherited {
                self.error(spec.pos, "extra init expr");
            } else {
                let extra = &spec.values[names];
                self.error(extra.pos, format!("extra init expr {}", extra));
            }
            return;
        }
        if names > values && (init.is_some() || values != 1) {
            let missing: &Ident = &spec.names[values];
            self.error(missing.pos, format!("missing init expr for {}", missing.name));
        }
    }
}
