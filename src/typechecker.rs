//! Type checker for incremental Go submissions
//!
//! A [`Checker`] validates one batch of files belonging to one package
//! against the session's [`Env`]. Prompt submissions are checked against
//! everything earlier submissions declared; imported source packages are
//! checked by a nested checker one import level deeper.
//!
//! The pipeline is strictly ordered:
//! 1. collect objects (imports, package-level declarations, methods)
//! 2. resolve order (types first, then initializer dependencies)
//! 3. check package objects
//! 4. check function bodies and prompt statements
//! 5. compute initialization order
//! 6. report unused imports
//! 7. run delayed checks
//! 8. record the final types of untyped expressions

mod assign;
mod call;
mod decl;
mod expr;
mod initorder;
mod lookup;
mod operand;
mod resolver;
mod stmt;
mod typexpr;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use crate::ast::{File, FuncDecl, NodeId, Pos, Stmt};
use crate::constant::ConstValue;
use crate::env::{Env, NamedId, ObjId, PkgId, ScopeId};
use crate::error::{GiltError, Result};
use crate::types::{Signature, Type};

pub use lookup::LookupResult;
pub use operand::{Mode, Operand};

/// Past this many errors a check stops at the next phase boundary
const MAX_ERRORS: usize = 10;

/// Options consulted by the checker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckConfig {
    /// Skip the unused-import check (step 6)
    pub disable_unused_import_check: bool,
    /// Treat the files as a whole package: no prompt statements, no
    /// replacement of earlier declarations
    pub full_package: bool,
}

/// Resolves import paths to checked packages
pub trait Importer {
    /// Returns the complete package for `path`. `dir` is the directory of
    /// the importing package; `depth` is the import nesting of the caller.
    fn import(&mut self, env: &mut Env, path: &str, dir: &str, depth: usize) -> Result<PkgId>;
}

/// Recorded type (and value, for constants) of one expression
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAndValue {
    pub mode: Mode,
    pub typ: Type,
}

impl TypeAndValue {
    pub fn value(&self) -> Option<&ConstValue> {
        match &self.mode {
            Mode::Constant(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    FieldVal,
    MethodVal,
    MethodExpr,
}

/// What a selector expression `x.f` denotes
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub kind: SelectionKind,
    pub recv: Type,
    /// The method object; None for fields and interface methods
    pub obj: Option<ObjId>,
    /// Path through embedded fields
    pub index: Vec<usize>,
    pub indirect: bool,
    pub typ: Type,
}

/// One package-level variable initialization, in execution order
#[derive(Debug, Clone)]
pub struct Initializer {
    pub lhs: Vec<ObjId>,
    pub rhs: crate::ast::Expr,
}

/// A definition made by the checked files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewDef {
    pub obj: ObjId,
    pub scope: ScopeId,
    pub pkg_scope: bool,
}

/// Everything the emitter needs to know about a checked submission
#[derive(Debug, Default)]
pub struct Info {
    pub types: HashMap<NodeId, TypeAndValue>,
    pub defs: HashMap<NodeId, ObjId>,
    pub uses: HashMap<NodeId, ObjId>,
    /// Objects declared without an identifier of their own: unaliased
    /// imports and type switch case variables
    pub implicits: HashMap<NodeId, ObjId>,
    pub selections: HashMap<NodeId, Selection>,
    pub scopes: HashMap<NodeId, ScopeId>,
    pub init_order: Vec<Initializer>,
    pub new_code: Vec<NewDef>,
    /// Import paths resolved by this check, in source order
    pub imports: Vec<(String, PkgId)>,
}

impl Info {
    pub fn type_of(&self, id: NodeId) -> Option<&Type> {
        self.types.get(&id).map(|tv| &tv.typ)
    }

    pub fn value_of(&self, id: NodeId) -> Option<&ConstValue> {
        self.types.get(&id).and_then(|tv| tv.value())
    }
}

/// Early exit from a check; the reason is already in `first_err`
#[derive(Debug)]
pub(crate) struct Bailout;

pub(crate) type CheckResult<T> = std::result::Result<T, Bailout>;

/// Checks that must wait until every declaration is typed
#[derive(Debug, Clone)]
pub(crate) enum Delayed {
    /// Map keys must be comparable
    MapKey { pos: Pos, key: Type },
    /// A method may not share its name with a field of the receiver
    FieldMethodClash { named: NamedId, method: ObjId },
}

enum Body {
    Decl(Rc<FuncDecl>),
    /// Statements typed at the prompt outside any function
    Repl(Vec<Rc<Stmt>>),
}

/// A function body queued for step 4
struct FuncWork {
    decl: Option<ObjId>,
    name: String,
    sig: Option<Rc<Signature>>,
    scope: ScopeId,
    body: Body,
}

/// Untyped expression awaiting its final type
#[derive(Debug, Clone)]
pub(crate) struct UntypedExpr {
    pub mode: Mode,
    pub typ: Type,
    /// Operands whose type follows this expression's type
    pub children: Vec<NodeId>,
    /// Left operand of a non-constant shift
    pub shift_operand: bool,
    pub pos: Pos,
    pub text: String,
}

/// Where in the program the checker currently is
#[derive(Debug, Clone)]
pub(crate) struct Context {
    pub scope: ScopeId,
    /// Package-level object whose declaration is being checked
    pub decl: Option<ObjId>,
    pub iota: Option<ConstValue>,
    pub sig: Option<Rc<Signature>>,
}

/// Type checker for one package
pub struct Checker<'a> {
    pub(crate) env: &'a mut Env,
    importer: &'a mut dyn Importer,
    conf: CheckConfig,
    pkg: PkgId,
    depth: usize,
    dir: String,
    info: Info,

    first_err: Option<GiltError>,
    err_count: usize,

    /// Package-level objects declared by these files, in source order
    objs: Vec<ObjId>,
    declared_here: HashSet<ObjId>,
    /// Prompt `:=` targets that assign to a variable declared earlier in
    /// the same submission, mapped to that variable
    reused: HashMap<ObjId, ObjId>,
    /// Methods awaiting their receiver base type, by base type name
    methods: BTreeMap<String, Vec<ObjId>>,
    repl_stmts: Vec<Rc<Stmt>>,
    repl_scope: Option<ScopeId>,
    /// Imports made by these files, checked for use in step 6
    imported: Vec<resolver::ImportUse>,
    dot_used: HashSet<PkgId>,
    cycle_reported: HashSet<ObjId>,

    obj_path: Vec<ObjId>,
    funcs: Vec<FuncWork>,
    deps: HashMap<ObjId, Vec<ObjId>>,
    delayed: Vec<Delayed>,
    untyped: HashMap<NodeId, UntypedExpr>,
    locals: Vec<ObjId>,

    ctx: Context,
}

impl<'a> Checker<'a> {
    pub fn new(
        env: &'a mut Env,
        importer: &'a mut dyn Importer,
        conf: CheckConfig,
        pkg: PkgId,
        depth: usize,
        dir: &str,
    ) -> Self {
        let scope = env.package(pkg).scope;
        Checker {
            env,
            importer,
            conf,
            pkg,
            depth,
            dir: dir.to_string(),
            info: Info::default(),
            first_err: None,
            err_count: 0,
            objs: Vec::new(),
            declared_here: HashSet::new(),
            reused: HashMap::new(),
            methods: BTreeMap::new(),
            repl_stmts: Vec::new(),
            repl_scope: None,
            imported: Vec::new(),
            dot_used: HashSet::new(),
            cycle_reported: HashSet::new(),
            obj_path: Vec::new(),
            funcs: Vec::new(),
            deps: HashMap::new(),
            delayed: Vec::new(),
            untyped: HashMap::new(),
            locals: Vec::new(),
            ctx: Context {
                scope,
                decl: None,
                iota: None,
                sig: None,
            },
        }
    }

    /// Checks `files` as one package. On success the package is complete and
    /// the returned [`Info`] describes every checked expression; on failure
    /// the first error is returned.
    pub fn check_files(mut self, files: &[File]) -> Result<Info> {
        let path = self.env.package(self.pkg).path.clone();
        let _span = tracing::debug_span!("check", pkg = %path, depth = self.depth).entered();

        if self.check_files_inner(files).is_err() {
            tracing::debug!(errors = self.err_count, "check bailed out");
        }

        match self.first_err.take() {
            Some(err) => Err(err),
            None => Ok(self.info),
        }
    }

    fn check_files_inner(&mut self, files: &[File]) -> CheckResult<()> {
        self.check_package_clauses(files);

        self.collect_objects(files)?;
        let order = self.resolve_order();
        tracing::trace!(objects = order.len(), "resolved package object order");

        self.package_objects(&order);
        self.bail_if_flooded()?;

        self.function_bodies();
        self.bail_if_flooded()?;

        self.init_order();

        if !self.conf.disable_unused_import_check {
            self.unused_imports();
        }

        self.process_delayed();
        self.record_untyped();
        self.record_new_code();

        if self.first_err.is_none() {
            self.env.set_complete(self.pkg, true);
        }
        Ok(())
    }

    fn check_package_clauses(&mut self, files: &[File]) {
        let expected = self.env.package(self.pkg).name.clone();
        for file in files {
            if let Some(name) = &file.package {
                if self.conf.full_package && name.name != expected && !expected.is_empty() {
                    self.error(
                        name.pos,
                        format!("package {}; expected {}", name.name, expected),
                    );
                }
            }
        }
    }

    fn bail_if_flooded(&self) -> CheckResult<()> {
        if self.err_count > MAX_ERRORS {
            Err(Bailout)
        } else {
            Ok(())
        }
    }

    // Error reporting

    pub(crate) fn error(&mut self, pos: Pos, message: impl Into<String>) {
        let message = message.into();
        self.err_count += 1;
        tracing::trace!(%pos, %message, "type error");
        if self.first_err.is_none() {
            self.first_err = Some(GiltError::TypeError { pos, message });
        }
    }

    /// Records an import failure and stops the check
    pub(crate) fn fail(&mut self, err: GiltError) -> Bailout {
        self.err_count += 1;
        if self.first_err.is_none() {
            self.first_err = Some(err);
        }
        Bailout
    }

    // Recording

    pub(crate) fn record_type_and_value(&mut self, id: NodeId, mode: &Mode, typ: &Type) {
        if matches!(mode, Mode::Invalid) {
            return;
        }
        self.info.types.insert(
            id,
            TypeAndValue {
                mode: mode.clone(),
                typ: typ.clone(),
            },
        );
    }

    pub(crate) fn record_def(&mut self, id: NodeId, obj: ObjId) {
        self.info.defs.insert(id, obj);
    }

    pub(crate) fn record_use(&mut self, id: NodeId, obj: ObjId) {
        self.info.uses.insert(id, obj);
    }

    pub(crate) fn record_implicit(&mut self, id: NodeId, obj: ObjId) {
        self.info.implicits.insert(id, obj);
    }

    pub(crate) fn record_scope(&mut self, id: NodeId, scope: ScopeId) {
        self.info.scopes.insert(id, scope);
    }

    pub(crate) fn record_selection(&mut self, id: NodeId, selection: Selection) {
        self.info.selections.insert(id, selection);
    }

    pub(crate) fn later(&mut self, check: Delayed) {
        self.delayed.push(check);
    }

    /// Notes that the declaration being checked refers to `obj`
    pub(crate) fn record_dep(&mut self, obj: ObjId) {
        if let Some(decl) = self.ctx.decl {
            if self.declared_here.contains(&obj) {
                let deps = self.deps.entry(decl).or_default();
                if !deps.contains(&obj) {
                    deps.push(obj);
                }
            }
        }
    }

    // Steps 4, 7 and 8

    fn function_bodies(&mut self) {
        let _span = tracing::trace_span!("function_bodies").entered();
        let work = std::mem::take(&mut self.funcs);
        for item in work {
            let _func = tracing::trace_span!("body", name = %item.name).entered();
            match (&item.body, item.sig) {
                (Body::Decl(decl), Some(sig)) => {
                    if let Some(body) = &decl.body {
                        self.func_body(item.decl, sig, item.scope, body);
                    }
                }
                (Body::Repl(stmts), _) => self.repl_body(item.scope, stmts),
                (Body::Decl(_), None) => {}
            }
        }
    }

    fn process_delayed(&mut self) {
        let checks = std::mem::take(&mut self.delayed);
        for check in checks {
            match check {
                Delayed::MapKey { pos, key } => {
                    if !key.is_invalid() && !self.comparable(&key) {
                        let key = self.env.type_string(&key);
                        self.error(pos, format!("invalid map key type {}", key));
                    }
                }
                Delayed::FieldMethodClash { named, method } => {
                    let name = self.env.obj(method).name.clone();
                    if let Type::Struct(st) = self.env.named(named).underlying.clone() {
                        if st.fields.iter().any(|f| f.name == name) {
                            let pos = self.env.obj(method).pos;
                            let type_name = self.env.type_name(named).to_string();
                            self.error(
                                pos,
                                format!("field and method with the same name {} on type {}", name, type_name),
                            );
                        }
                    }
                }
            }
        }
    }

    fn record_untyped(&mut self) {
        let pending = std::mem::take(&mut self.untyped);
        for (id, expr) in pending {
            self.record_type_and_value(id, &expr.mode, &expr.typ);
        }
    }

    /// Lists the definitions the emitter must generate code for: at the
    /// prompt only the new package-level objects, for a whole package every
    /// definition
    fn record_new_code(&mut self) {
        let pkg_scope = self.pkg_scope();
        let objs: Vec<ObjId> = if self.conf.full_package {
            let mut defs: Vec<ObjId> = self.info.defs.values().copied().collect();
            defs.sort();
            defs.dedup();
            defs
        } else {
            let mut objs: Vec<ObjId> = self
                .objs
                .iter()
                .copied()
                .filter(|obj| !self.reused.contains_key(obj))
                .collect();
            let mut methods: Vec<ObjId> = self
                .declared_here
                .iter()
                .copied()
                .filter(|obj| !self.objs.contains(obj))
                .collect();
            methods.sort();
            objs.extend(methods);
            objs
        };
        for obj in objs {
            let scope = self.env.obj(obj).parent.unwrap_or(pkg_scope);
            self.info.new_code.push(NewDef {
                obj,
                scope,
                pkg_scope: scope == pkg_scope,
            });
        }
    }

    // Scope helpers

    pub(crate) fn open_scope(&mut self, node: NodeId, is_func: bool) -> ScopeId {
        let scope = self.env.new_scope(Some(self.ctx.scope), is_func);
        self.record_scope(node, scope);
        self.ctx.scope = scope;
        scope
    }

    pub(crate) fn close_scope(&mut self) {
        if let Some(parent) = self.env.scope(self.ctx.scope).parent {
            self.ctx.scope = parent;
        }
    }

    pub(crate) fn pkg_scope(&self) -> ScopeId {
        self.env.package(self.pkg).scope
    }
}

#[cfg(test)]
mod tests;
