//! Steps 1, 2 and 6: collecting package-level objects, ordering them, and
//! reporting unused imports

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::ast::{AssignKind, Decl, Expr, ExprKind, File, Ident, ImportSpec, Pos, Stmt, StmtKind, ValueSpec};
use crate::constant::ConstValue;
use crate::env::{DeclInfo, DeclKind, ObjId, ObjKind, Object, PkgId, ScopeId, VarSource};
use crate::types::Type;

use super::{Body, CheckResult, Checker, FuncWork};

/// One import made by the checked files
#[derive(Debug, Clone)]
pub(crate) struct ImportUse {
    /// The package name object; None for dot imports
    pub obj: Option<ObjId>,
    pub pkg: PkgId,
    pub path: String,
    pub pos: Pos,
    /// An explicit name different from the package's own
    pub alias: Option<String>,
}

impl<'a> Checker<'a> {
    /// Step 1: declares every package-level object of `files` and queues
    /// the prompt's statements
    pub(crate) fn collect_objects(&mut self, files: &[File]) -> CheckResult<()> {
        let _span = tracing::trace_span!("collect_objects", files = files.len()).entered();
        let pkg_scope = self.pkg_scope();

        for file in files {
            let file_scope = if self.conf.full_package {
                self.env.new_scope(Some(pkg_scope), false)
            } else {
                match self.env.package(self.pkg).repl_scope {
                    Some(scope) => scope,
                    None => self.env.enable_repl_scope(self.pkg),
                }
            };

            for spec in &file.imports {
                self.import_spec(file_scope, spec)?;
            }

            for decl in &file.decls {
                match decl {
                    Decl::Const(specs) => self.collect_consts(file_scope, specs),
                    Decl::Var(specs) => {
                        for spec in specs {
                            self.arity_match(spec, None);
                            let source = VarSource::Spec(spec.clone());
                            self.collect_vars(file_scope, &spec.names, source, spec.names.len() > 1 && spec.values.len() == 1);
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
                            self.declare_pkg_obj(
                                &spec.name,
                                obj,
                                DeclInfo {
                                    file_scope,
                                    kind: DeclKind::Type(spec.clone()),
                                },
                            );
                        }
                    }
                    Decl::Func(fd) => {
                        let obj = self.env.new_object(Object::new(
                            fd.name.name.clone(),
                            ObjKind::Func,
                            Type::Invalid,
                            Some(self.pkg),
                            fd.name.pos,
                        ));
                        let info = DeclInfo {
                            file_scope,
                            kind: DeclKind::Func(fd.clone()),
                        };
                        match &fd.recv {
                            Some(recv) => {
                                self.record_def(fd.name.id, obj);
                                self.env.set_decl(self.pkg, obj, info);
                                self.declared_here.insert(obj);
                                match receiver_base_name(&recv.typ) {
                                    Some(base) => self.methods.entry(base).or_default().push(obj),
                                    // checked on its own; the receiver type reports the error
                                    None => self.methods.entry(String::new()).or_default().push(obj),
                                }
                            }
                            None => {
                                let in_main = match &file.package {
                                    Some(clause) => clause.name == "main",
                                    None => self.env.package(self.pkg).name == "main",
                                };
                                let entry = fd.name.name == "init" || (in_main && fd.name.name == "main");
                                if entry && (!fd.typ.params.is_empty() || !fd.typ.results.is_empty()) {
                                    self.error(
                                        fd.name.pos,
                                        format!("func {} must have no arguments and no return values", fd.name.name),
                                    );
                                }
                                self.declare_pkg_obj(&fd.name, obj, info)
                            }
                        }
                    }
                    Decl::Stmt(stmt) => self.collect_stmt(file_scope, stmt),
                }
            }
        }

        if !self.repl_stmts.is_empty() {
            let parent = self.repl_scope.unwrap_or(pkg_scope);
            let scope = self.env.new_scope(Some(parent), true);
            let stmts = std::mem::take(&mut self.repl_stmts);
            self.funcs.push(FuncWork {
                decl: None,
                name: "<prompt>".to_string(),
                sig: None,
                scope,
                body: Body::Repl(stmts),
            });
        }
        Ok(())
    }

    fn import_spec(&mut self, file_scope: ScopeId, spec: &ImportSpec) -> CheckResult<()> {
        let imported = match self
            .importer
            .import(&mut *self.env, &spec.path, &self.dir, self.depth)
        {
            Ok(pkg) => pkg,
            Err(err) => return Err(self.fail(err)),
        };
        self.env.add_import(self.pkg, imported);
        self.info.imports.push((spec.path.clone(), imported));
        let pkg_name = self.env.package(imported).name.clone();

        match spec.name.as_ref().map(|n| n.name.as_str()) {
            Some("_") => {}
            Some(".") => {
                let pkg_scope = self.env.package(imported).scope;
                let exported: Vec<(String, ObjId)> = self
                    .env
                    .scope(pkg_scope)
                    .names
                    .iter()
                    .filter(|(_, obj)| self.env.obj(**obj).is_exported())
                    .map(|(name, obj)| (name.clone(), *obj))
                    .collect();
                tracing::trace!(path = %spec.path, names = exported.len(), "dot import");
                for (name, obj) in exported {
                    self.env.bind(file_scope, &name, obj);
                }
                self.imported.push(ImportUse {
                    obj: None,
                    pkg: imported,
                    path: spec.path.clone(),
                    pos: spec.pos,
                    alias: None,
                });
            }
            alias => {
                let name = alias.unwrap_or(pkg_name.as_str()).to_string();
                if self.conf.full_package {
                    if let Some(prev) = self.env.lookup_local(file_scope, &name) {
                        if matches!(self.env.obj(prev).kind, ObjKind::PkgName(_)) {
                            self.error(spec.pos, format!("{} redeclared in this block", name));
                            return Ok(());
                        }
                    }
                }
                let obj = self.env.new_object(Object::new(
                    name.clone(),
                    ObjKind::PkgName(imported),
                    Type::Invalid,
                    Some(self.pkg),
                    spec.pos,
                ));
                match &spec.name {
                    Some(ident) => self.record_def(ident.id, obj),
                    None => self.record_implicit(spec.id, obj),
                }
                self.env.bind(file_scope, &name, obj);
                self.imported.push(ImportUse {
                    obj: Some(obj),
                    pkg: imported,
                    path: spec.path.clone(),
                    pos: spec.pos,
                    alias: alias.filter(|a| *a != pkg_name).map(str::to_string),
                });
            }
        }
        Ok(())
    }

    fn collect_consts(&mut self, file_scope: ScopeId, specs: &[Rc<ValueSpec>]) {
        let mut last: Option<Rc<ValueSpec>> = None;
        for (iota, spec) in specs.iter().enumerate() {
            if spec.typ.is_some() || !spec.values.is_empty() {
                last = Some(spec.clone());
            }
            let init = last.clone().unwrap_or_else(|| spec.clone());
            self.arity_match(spec, Some(&init));

            for (index, ident) in spec.names.iter().enumerate() {
                let obj = self.env.new_object(Object::new(
                    ident.name.clone(),
                    ObjKind::Const(ConstValue::Int(0)),
                    Type::Invalid,
                    Some(self.pkg),
                    ident.pos,
                ));
                self.declare_pkg_obj(
                    ident,
                    obj,
                    DeclInfo {
                        file_scope,
                        kind: DeclKind::Const {
                            init: init.clone(),
                            index,
                            iota: iota as i128,
                        },
                    },
                );
            }
        }
    }

    /// Declares the variables of one `var` specification or prompt `:=`;
    /// `grouped` when one multi-valued initializer serves them all
    fn collect_vars(&mut self, file_scope: ScopeId, names: &[Ident], source: VarSource, grouped: bool) {
        self.collect_short_vars(file_scope, names, &vec![None; names.len()], source, grouped);
    }

    /// As [`Checker::collect_vars`]; a name with an `existing` variable
    /// gets an unbound object that assigns to it
    fn collect_short_vars(
        &mut self,
        file_scope: ScopeId,
        names: &[Ident],
        existing: &[Option<ObjId>],
        source: VarSource,
        grouped: bool,
    ) {
        let objs: Vec<ObjId> = names
            .iter()
            .map(|ident| {
                self.env.new_object(Object::new(
                    ident.name.clone(),
                    ObjKind::Var,
                    Type::Invalid,
                    Some(self.pkg),
                    ident.pos,
                ))
            })
            .collect();
        let lhs = if grouped { Some(objs.clone()) } else { None };
        for (index, ((ident, obj), prev)) in names.iter().zip(objs).zip(existing).enumerate() {
            let info = DeclInfo {
                file_scope,
                kind: DeclKind::Var {
                    source: source.clone(),
                    index,
                    lhs: lhs.clone(),
                },
            };
            match prev {
                Some(prev) => {
                    self.record_use(ident.id, *prev);
                    self.env.set_decl(self.pkg, obj, info);
                    self.objs.push(obj);
                    self.reused.insert(obj, *prev);
                }
                None => self.declare_pkg_obj(ident, obj, info),
            }
        }
    }

    /// A statement at the prompt: `:=` declares package variables, anything
    /// else runs in the prompt's own function-like scope
    fn collect_stmt(&mut self, file_scope: ScopeId, stmt: &Rc<Stmt>) {
        if self.conf.full_package {
            self.error(stmt.pos, "non-declaration statement outside function body");
            return;
        }
        self.repl_scope = Some(file_scope);

        let StmtKind::Assign {
            lhs,
            kind: AssignKind::Define,
            rhs,
        } = &stmt.kind
        else {
            self.repl_stmts.push(stmt.clone());
            return;
        };

        let scope = self.pkg_scope();
        let mut names: Vec<Ident> = Vec::with_capacity(lhs.len());
        let mut existing: Vec<Option<ObjId>> = Vec::with_capacity(lhs.len());
        let mut seen: HashSet<&str> = HashSet::new();
        for e in lhs {
            let Some(name) = e.as_ident() else {
                self.error(e.pos, format!("non-name {} on left side of :=", e));
                return;
            };
            if name != "_" && !seen.insert(name) {
                self.error(e.pos, format!("{} repeated on left side of :=", name));
                return;
            }
            // only variables from this submission are reused; earlier ones
            // are redefined
            let prev = match name {
                "_" => None,
                _ => self
                    .env
                    .lookup_local(scope, name)
                    .filter(|prev| self.declared_here.contains(prev))
                    .filter(|prev| matches!(self.env.obj(*prev).kind, ObjKind::Var)),
            };
            existing.push(prev);
            names.push(Ident {
                id: e.id,
                name: name.to_string(),
                pos: e.pos,
            });
        }
        let fresh = names.iter().zip(&existing).any(|(ident, prev)| !ident.is_blank() && prev.is_none());
        if !fresh {
            self.error(stmt.pos, "no new variables on left side of :=");
            return;
        }
        if rhs.len() != lhs.len() && rhs.len() != 1 {
            self.error(
                stmt.pos,
                format!("assignment mismatch: {} variables but {} values", lhs.len(), rhs.len()),
            );
            return;
        }
        let grouped = lhs.len() > 1 && rhs.len() == 1;
        self.collect_short_vars(file_scope, &names, &existing, VarSource::Short(stmt.clone()), grouped);
    }

    /// Binds a package-level object. At the prompt a name may be declared
    /// again by a later submission; redefining a type drops the old type's
    /// dependency record.
    fn declare_pkg_obj(&mut self, ident: &Ident, obj: ObjId, info: DeclInfo) {
        self.record_def(ident.id, obj);
        let file_scope = info.file_scope;
        self.env.set_decl(self.pkg, obj, info);
        self.declared_here.insert(obj);
        self.objs.push(obj);

        if ident.is_blank() {
            return;
        }
        if ident.name == "init" {
            if !matches!(self.env.obj(obj).kind, ObjKind::Func) {
                self.error(ident.pos, "cannot declare init - must be func");
            }
            return;
        }

        let scope = self.pkg_scope();
        if let Some(prev) = self.env.lookup_local(scope, &ident.name) {
            if self.declared_here.contains(&prev) || self.conf.full_package {
                self.error(ident.pos, format!("{} redeclared in this block", ident.name));
                return;
            }
            if self.env.obj(prev).is_type_name() && self.env.obj(obj).is_type_name() {
                let purged = self.env.purge_decl(self.pkg, prev);
                tracing::debug!(name = %ident.name, purged, "type redefined");
            }
        }

        // a prompt declaration supersedes an earlier same-named import
        if !self.conf.full_package {
            if let Some(prev) = self.env.lookup_local(file_scope, &ident.name) {
                if !self.imported.iter().any(|i| i.obj == Some(prev)) {
                    self.env.unbind(file_scope, &ident.name);
                }
            }
        }
        self.env.bind(scope, &ident.name, obj);
    }

    /// Step 2: types in source order, then everything else so that an
    /// initializer's dependencies come before it. Cycles keep source order;
    /// they are reported while the objects are typed.
    pub(crate) fn resolve_order(&mut self) -> Vec<ObjId> {
        let objs = self.objs.clone();
        let mut order: Vec<ObjId> = objs
            .iter()
            .copied()
            .filter(|obj| self.env.obj(*obj).is_type_name())
            .collect();
        let others: Vec<ObjId> = objs
            .iter()
            .copied()
            .filter(|obj| !self.env.obj(*obj).is_type_name())
            .collect();

        // syntactic edges: the package-level names an initializer mentions
        let pkg_scope = self.pkg_scope();
        let mut edges: HashMap<ObjId, Vec<ObjId>> = HashMap::new();
        for obj in &others {
            let Some(info) = self.env.decl(self.pkg, *obj) else {
                continue;
            };
            if matches!(info.kind, DeclKind::Func(_)) {
                continue;
            }
            let mut names = Vec::new();
            if let Some(e) = info.init_expr() {
                collect_names(e, &mut names);
            }
            let deps: Vec<ObjId> = names
                .iter()
                .filter_map(|name| self.env.lookup_local(pkg_scope, name))
                .filter(|dep| dep != obj && others.contains(dep))
                .collect();
            edges.insert(*obj, deps);
        }

        let mut placed: HashSet<ObjId> = HashSet::new();
        let mut remaining = others;
        while !remaining.is_empty() {
            let ready = remaining.iter().position(|obj| {
                edges
                    .get(obj)
                    .map_or(true, |deps| deps.iter().all(|d| placed.contains(d)))
            });
            // on a cycle, fall back to source order
            let next = remaining.remove(ready.unwrap_or(0));
            placed.insert(next);
            order.push(next);
        }
        order
    }

    /// Step 6
    pub(crate) fn unused_imports(&mut self) {
        let imports = std::mem::take(&mut self.imported);
        for import in &imports {
            let used = match import.obj {
                Some(obj) => self.env.obj(obj).used,
                None => self.dot_used.contains(&import.pkg),
            };
            if used {
                continue;
            }
            let message = match &import.alias {
                Some(alias) => format!("\"{}\" imported but not used as {}", import.path, alias),
                None => format!("\"{}\" imported but not used", import.path),
            };
            self.error(import.pos, message);
        }
        self.imported = imports;
    }
}

/// The type name a method receiver refers to: `T` in `T`, `*T` or `(*T)`
fn receiver_base_name(e: &Expr) -> Option<String> {
    match &e.kind {
        ExprKind::Ident(name) => Some(name.clone()),
        ExprKind::Star(inner) | ExprKind::Paren(inner) => receiver_base_name(inner),
        _ => None,
    }
}

/// Every identifier an expression mentions, including those inside
/// function literals
fn collect_names(e: &Expr, out: &mut Vec<String>) {
    match &e.kind {
        ExprKind::Ident(name) => out.push(name.clone()),
        ExprKind::BasicLit(_) | ExprKind::Ellipsis(None) => {}
        ExprKind::CompositeLit { typ, elts } => {
            if let Some(t) = typ {
                collect_names(t, out);
            }
            for elt in elts {
                collect_names(elt, out);
            }
        }
        ExprKind::FuncLit { body, .. } => {
            for stmt in &body.stmts {
                collect_stmt_names(stmt, out);
            }
        }
        ExprKind::Paren(x) | ExprKind::Star(x) | ExprKind::Ellipsis(Some(x)) => collect_names(x, out),
        ExprKind::Unary { x, .. } => collect_names(x, out),
        ExprKind::Selector { x, .. } => collect_names(x, out),
        ExprKind::Index { x, index } => {
            collect_names(x, out);
            collect_names(index, out);
        }
        ExprKind::Slice { x, low, high, max } => {
            collect_names(x, out);
            for part in [low, high, max].into_iter().flatten() {
                collect_names(part, out);
            }
        }
        ExprKind::TypeAssert { x, typ } => {
            collect_names(x, out);
            if let Some(t) = typ {
                collect_names(t, out);
            }
        }
        ExprKind::Call { fun, args, .. } => {
            collect_names(fun, out);
            for arg in args {
                collect_names(arg, out);
            }
        }
        ExprKind::Binary { x, y, .. } => {
            collect_names(x, out);
            collect_names(y, out);
        }
        ExprKind::KeyValue { key, value } => {
            collect_names(key, out);
            collect_names(value, out);
        }
        ExprKind::ArrayType { len, elem } => {
            if let Some(len) = len {
                collect_names(len, out);
            }
            collect_names(elem, out);
        }
        ExprKind::MapType { key, value } => {
            collect_names(key, out);
            collect_names(value, out);
        }
        ExprKind::ChanType { value, .. } => collect_names(value, out),
        ExprKind::StructType(_) | ExprKind::FuncType(_) | ExprKind::InterfaceType(_) => {}
    }
}

fn collect_stmt_names(stmt: &Stmt, out: &mut Vec<String>) {
    match &stmt.kind {
        StmtKind::Expr(e) | StmtKind::Go(e) | StmtKind::Defer(e) => collect_names(e, out),
        StmtKind::Send { chan, value } => {
            collect_names(chan, out);
            collect_names(value, out);
        }
        StmtKind::IncDec { x, .. } => collect_names(x, out),
        StmtKind::Assign { lhs, rhs, .. } => {
            for e in lhs.iter().chain(rhs) {
                collect_names(e, out);
            }
        }
        StmtKind::Return(results) => {
            for e in results {
                collect_names(e, out);
            }
        }
        StmtKind::Block(block) => {
            for s in &block.stmts {
                collect_stmt_names(s, out);
            }
        }
        StmtKind::If { init, cond, then, els } => {
            if let Some(init) = init {
                collect_stmt_names(init, out);
            }
            collect_names(cond, out);
            for s in &then.stmts {
                collect_stmt_names(s, out);
            }
            if let Some(els) = els {
                collect_stmt_names(els, out);
            }
        }
        StmtKind::For { init, cond, post, body } => {
            for s in [init, post].into_iter().flatten() {
                collect_stmt_names(s, out);
            }
            if let Some(cond) = cond {
                collect_names(cond, out);
            }
            for s in &body.stmts {
                collect_stmt_names(s, out);
            }
        }
        StmtKind::Range { x, body, .. } => {
            collect_names(x, out);
            for s in &body.stmts {
                collect_stmt_names(s, out);
            }
        }
        StmtKind::Switch { init, tag, body, .. } => {
            if let Some(init) = init {
                collect_stmt_names(init, out);
            }
            if let Some(tag) = tag {
                collect_names(tag, out);
            }
            for clause in body {
                for e in clause.list.iter().flatten() {
                    collect_names(e, out);
                }
                for s in &clause.body {
                    collect_stmt_names(s, out);
                }
            }
        }
        StmtKind::TypeSwitch { init, x, body, .. } => {
            if let Some(init) = init {
                collect_stmt_names(init, out);
            }
            collect_names(x, out);
            for clause in body {
                for s in &clause.body {
                    collect_stmt_names(s, out);
                }
            }
        }
        StmtKind::Select { body } => {
            for clause in body {
                if let Some(comm) = &clause.comm {
                    collect_stmt_names(comm, out);
                }
                for s in &clause.body {
                    collect_stmt_names(s, out);
                }
            }
        }
        StmtKind::Decl(_) | StmtKind::Empty | StmtKind::Branch(_) => {}
    }
}
