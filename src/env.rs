//! Symbol environment: arenas of objects, scopes, named types and packages
//!
//! Everything a session has ever declared lives here, addressed by small
//! copyable handles. Scopes map names to object handles; a package's
//! dependency records are keyed by the same handles, so replacing a
//! declaration is a pair of map operations.
//!
//! Mutations of state that predates the current submission go through the
//! undo journal so a failed submission can be rolled back.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::ast::{Expr, FuncDecl, Pos, Stmt, StmtKind, TypeSpec, ValueSpec};
use crate::constant::ConstValue;
use crate::types::{BasicKind, Type};
use crate::universe;

macro_rules! handle {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle!(ObjId);
handle!(ScopeId);
handle!(NamedId);
handle!(PkgId);

/// Progress marker used for cycle detection while declarations are typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    White,
    Grey,
    Black,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Append,
    Cap,
    Close,
    Copy,
    Delete,
    Len,
    Make,
    New,
    Panic,
    Print,
    Println,
    Recover,
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Append => "append",
            Builtin::Cap => "cap",
            Builtin::Close => "close",
            Builtin::Copy => "copy",
            Builtin::Delete => "delete",
            Builtin::Len => "len",
            Builtin::Make => "make",
            Builtin::New => "new",
            Builtin::Panic => "panic",
            Builtin::Print => "print",
            Builtin::Println => "println",
            Builtin::Recover => "recover",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjKind {
    Var,
    Const(ConstValue),
    TypeName,
    Func,
    PkgName(PkgId),
    Builtin(Builtin),
    Nil,
}

/// A declared entity
#[derive(Debug, Clone)]
pub struct Object {
    pub name: String,
    pub kind: ObjKind,
    pub typ: Type,
    pub pkg: Option<PkgId>,
    pub pos: Pos,
    pub parent: Option<ScopeId>,
    pub color: Color,
    pub used: bool,
}

impl Object {
    pub fn new(name: impl Into<String>, kind: ObjKind, typ: Type, pkg: Option<PkgId>, pos: Pos) -> Self {
        Object {
            name: name.into(),
            kind,
            typ,
            pkg,
            pos,
            parent: None,
            color: Color::White,
            used: false,
        }
    }

    pub fn is_exported(&self) -> bool {
        self.name.chars().next().map_or(false, |c| c.is_uppercase())
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ObjKind::Var => "var",
            ObjKind::Const(_) => "const",
            ObjKind::TypeName => "type",
            ObjKind::Func => "func",
            ObjKind::PkgName(_) => "package",
            ObjKind::Builtin(_) => "builtin",
            ObjKind::Nil => "nil",
        }
    }

    pub fn is_type_name(&self) -> bool {
        matches!(self.kind, ObjKind::TypeName)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub names: BTreeMap<String, ObjId>,
    /// Function scopes stop the search for enclosing local variables
    pub is_func: bool,
}

/// A declared (defined) type
#[derive(Debug, Clone)]
pub struct NamedType {
    pub obj: ObjId,
    /// Never itself a `Type::Named`; Invalid until the declaration is checked
    pub underlying: Type,
    pub methods: Vec<ObjId>,
}

/// Where a package-level variable's initializer comes from
#[derive(Debug, Clone)]
pub enum VarSource {
    Spec(Rc<ValueSpec>),
    /// A `:=` statement typed at the prompt
    Short(Rc<Stmt>),
}

impl VarSource {
    pub fn type_expr(&self) -> Option<&Expr> {
        match self {
            VarSource::Spec(spec) => spec.typ.as_ref(),
            VarSource::Short(_) => None,
        }
    }

    pub fn values(&self) -> &[Expr] {
        match self {
            VarSource::Spec(spec) => &spec.values,
            VarSource::Short(stmt) => match &stmt.kind {
                StmtKind::Assign { rhs, .. } => rhs,
                _ => &[],
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Const {
        /// Spec supplying type and values; an earlier one when inherited
        init: Rc<ValueSpec>,
        index: usize,
        iota: i128,
    },
    Var {
        source: VarSource,
        index: usize,
        /// All variables initialized together by one multi-valued expression
        lhs: Option<Vec<ObjId>>,
    },
    Type(Rc<TypeSpec>),
    Func(Rc<FuncDecl>),
}

/// Dependency record of one package-level object
#[derive(Debug, Clone)]
pub struct DeclInfo {
    pub file_scope: ScopeId,
    pub kind: DeclKind,
}

impl DeclInfo {
    /// The initializer expression, if the object has its own
    pub fn init_expr(&self) -> Option<&Expr> {
        match &self.kind {
            DeclKind::Const { init, index, .. } => init.values.get(*index),
            DeclKind::Var { source, index, lhs } => {
                let values = source.values();
                if lhs.is_some() {
                    values.first()
                } else {
                    values.get(*index)
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Package {
    pub path: String,
    pub name: String,
    pub scope: ScopeId,
    pub complete: bool,
    pub imports: Vec<PkgId>,
    /// Cache key of the archive that produced this package
    pub archive: Option<String>,
    /// Dependency records of package-level objects
    pub decls: HashMap<ObjId, DeclInfo>,
    /// Persistent file scope shared by every prompt submission
    pub repl_scope: Option<ScopeId>,
}

#[derive(Debug)]
enum Undo {
    Bind {
        scope: ScopeId,
        name: String,
        prev: Option<ObjId>,
    },
    Decl {
        pkg: PkgId,
        obj: ObjId,
        prev: Option<DeclInfo>,
    },
    Methods {
        named: NamedId,
        prev: Vec<ObjId>,
    },
    Complete {
        pkg: PkgId,
        prev: bool,
    },
    Package {
        pkg: PkgId,
        prev: Box<Package>,
    },
}

#[derive(Debug, Default)]
struct Journal {
    entries: Vec<Undo>,
    scopes: usize,
    named: usize,
    packages: usize,
}

/// The session's symbol environment
#[derive(Debug)]
pub struct Env {
    objects: Vec<Object>,
    scopes: Vec<Scope>,
    named: Vec<NamedType>,
    packages: Vec<Package>,
    paths: HashMap<String, PkgId>,
    pub universe: ScopeId,
    journal: Option<Journal>,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    pub fn new() -> Self {
        let mut env = Env {
            objects: Vec::new(),
            scopes: vec![Scope::default()],
            named: Vec::new(),
            packages: Vec::new(),
            paths: HashMap::new(),
            universe: ScopeId(0),
            journal: None,
        };
        universe::install(&mut env);
        env
    }

    // Objects

    pub fn new_object(&mut self, obj: Object) -> ObjId {
        self.objects.push(obj);
        ObjId(self.objects.len() as u32 - 1)
    }

    pub fn obj(&self, id: ObjId) -> &Object {
        &self.objects[id.index()]
    }

    pub fn obj_mut(&mut self, id: ObjId) -> &mut Object {
        &mut self.objects[id.index()]
    }

    // Scopes

    pub fn new_scope(&mut self, parent: Option<ScopeId>, is_func: bool) -> ScopeId {
        self.scopes.push(Scope {
            parent,
            names: BTreeMap::new(),
            is_func,
        });
        ScopeId(self.scopes.len() as u32 - 1)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<ObjId> {
        self.scope(scope).names.get(name).copied()
    }

    /// Walks outward from `scope`; returns the scope the name was found in
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, ObjId)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(obj) = self.lookup_local(id, name) {
                return Some((id, obj));
            }
            current = self.scope(id).parent;
        }
        None
    }

    /// Binds `name` to `obj`, returning the replaced binding
    pub fn bind(&mut self, scope: ScopeId, name: &str, obj: ObjId) -> Option<ObjId> {
        let prev = self.scopes[scope.index()].names.insert(name.to_string(), obj);
        if self.objects[obj.index()].parent.is_none() {
            self.objects[obj.index()].parent = Some(scope);
        }
        if let Some(journal) = self.journal.as_mut() {
            if scope.index() < journal.scopes {
                journal.entries.push(Undo::Bind {
                    scope,
                    name: name.to_string(),
                    prev,
                });
            }
        }
        prev
    }

    // Named types

    pub fn new_named(&mut self, obj: ObjId) -> NamedId {
        self.named.push(NamedType {
            obj,
            underlying: Type::Invalid,
            methods: Vec::new(),
        });
        NamedId(self.named.len() as u32 - 1)
    }

    pub fn named(&self, id: NamedId) -> &NamedType {
        &self.named[id.index()]
    }

    pub fn set_underlying(&mut self, id: NamedId, underlying: Type) {
        debug_assert!(!underlying.is_named(), "underlying type must not be named");
        self.named[id.index()].underlying = underlying;
    }

    /// Attaches a method, replacing a same-named one. Returns the replaced method.
    pub fn add_method(&mut self, id: NamedId, method: ObjId) -> Option<ObjId> {
        if let Some(journal) = self.journal.as_mut() {
            if id.index() < journal.named {
                let prev = self.named[id.index()].methods.clone();
                journal.entries.push(Undo::Methods { named: id, prev });
            }
        }
        let name = self.objects[method.index()].name.clone();
        let methods = &mut self.named[id.index()].methods;
        match methods.iter().position(|m| self.objects[m.index()].name == name) {
            Some(i) => Some(std::mem::replace(&mut methods[i], method)),
            None => {
                methods.push(method);
                None
            }
        }
    }

    /// Removes a binding, as when a prompt declaration supersedes an import
    pub fn unbind(&mut self, scope: ScopeId, name: &str) -> Option<ObjId> {
        let prev = self.scopes[scope.index()].names.remove(name);
        if let (Some(journal), Some(_)) = (self.journal.as_mut(), prev) {
            if scope.index() < journal.scopes {
                journal.entries.push(Undo::Bind {
                    scope,
                    name: name.to_string(),
                    prev,
                });
            }
        }
        prev
    }

    // Packages

    pub fn new_package(&mut self, path: &str, name: &str) -> PkgId {
        let scope = self.new_scope(Some(self.universe), false);
        self.packages.push(Package {
            path: path.to_string(),
            name: name.to_string(),
            scope,
            complete: false,
            imports: Vec::new(),
            archive: None,
            decls: HashMap::new(),
            repl_scope: None,
        });
        let id = PkgId(self.packages.len() as u32 - 1);
        self.paths.insert(path.to_string(), id);
        id
    }

    pub fn package(&self, id: PkgId) -> &Package {
        &self.packages[id.index()]
    }

    pub fn package_by_path(&self, path: &str) -> Option<PkgId> {
        self.paths.get(path).copied()
    }

    /// Gives the package a persistent file scope for prompt submissions
    pub fn enable_repl_scope(&mut self, id: PkgId) -> ScopeId {
        let parent = self.package(id).scope;
        let scope = self.new_scope(Some(parent), false);
        self.packages[id.index()].repl_scope = Some(scope);
        scope
    }

    pub fn decl(&self, pkg: PkgId, obj: ObjId) -> Option<&DeclInfo> {
        self.package(pkg).decls.get(&obj)
    }

    pub fn set_decl(&mut self, pkg: PkgId, obj: ObjId, info: DeclInfo) {
        let prev = self.packages[pkg.index()].decls.insert(obj, info);
        self.record_decl_change(pkg, obj, prev);
    }

    /// Drops the dependency record of a replaced declaration
    pub fn purge_decl(&mut self, pkg: PkgId, obj: ObjId) -> bool {
        let prev = self.packages[pkg.index()].decls.remove(&obj);
        let purged = prev.is_some();
        self.record_decl_change(pkg, obj, prev);
        purged
    }

    fn record_decl_change(&mut self, pkg: PkgId, obj: ObjId, prev: Option<DeclInfo>) {
        if let Some(journal) = self.journal.as_mut() {
            if pkg.index() < journal.packages {
                journal.entries.push(Undo::Decl { pkg, obj, prev });
            }
        }
    }

    pub fn set_complete(&mut self, pkg: PkgId, complete: bool) {
        let prev = self.packages[pkg.index()].complete;
        if let Some(journal) = self.journal.as_mut() {
            if pkg.index() < journal.packages {
                journal.entries.push(Undo::Complete { pkg, prev });
            }
        }
        self.packages[pkg.index()].complete = complete;
    }

    /// Starts a package over with an empty scope, as when its source is
    /// re-read. Returns the new package scope.
    pub fn reset_package(&mut self, pkg: PkgId, name: &str) -> ScopeId {
        let scope = self.new_scope(Some(self.universe), false);
        let prev = std::mem::replace(
            &mut self.packages[pkg.index()],
            Package {
                path: String::new(),
                name: name.to_string(),
                scope,
                complete: false,
                imports: Vec::new(),
                archive: None,
                decls: HashMap::new(),
                repl_scope: None,
            },
        );
        self.packages[pkg.index()].path = prev.path.clone();
        if let Some(journal) = self.journal.as_mut() {
            if pkg.index() < journal.packages {
                journal.entries.push(Undo::Package {
                    pkg,
                    prev: Box::new(prev),
                });
            }
        }
        scope
    }

    pub fn set_package_archive(&mut self, pkg: PkgId, key: &str) {
        self.packages[pkg.index()].archive = Some(key.to_string());
    }

    pub fn add_import(&mut self, pkg: PkgId, imported: PkgId) {
        let imports = &mut self.packages[pkg.index()].imports;
        if !imports.contains(&imported) {
            imports.push(imported);
        }
    }

    // Journal

    /// Starts recording undo entries for the current submission
    pub fn begin(&mut self) {
        self.journal = Some(Journal {
            entries: Vec::new(),
            scopes: self.scopes.len(),
            named: self.named.len(),
            packages: self.packages.len(),
        });
    }

    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Restores every binding, dependency record and method set the
    /// submission touched. Arena entries it created stay allocated but
    /// become unreachable.
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        let undone = journal.entries.len();
        for entry in journal.entries.into_iter().rev() {
            match entry {
                Undo::Bind { scope, name, prev } => {
                    let names = &mut self.scopes[scope.index()].names;
                    match prev {
                        Some(obj) => {
                            names.insert(name, obj);
                        }
                        None => {
                            names.remove(&name);
                        }
                    }
                }
                Undo::Decl { pkg, obj, prev } => {
                    let decls = &mut self.packages[pkg.index()].decls;
                    match prev {
                        Some(info) => {
                            decls.insert(obj, info);
                        }
                        None => {
                            decls.remove(&obj);
                        }
                    }
                }
                Undo::Methods { named, prev } => self.named[named.index()].methods = prev,
                Undo::Complete { pkg, prev } => self.packages[pkg.index()].complete = prev,
                Undo::Package { pkg, prev } => self.packages[pkg.index()] = *prev,
            }
        }
        // packages first created by the failed submission must not be found again
        let known = journal.packages;
        self.paths.retain(|_, id| id.index() < known);
        tracing::debug!(undone, "rolled back failed submission");
    }

    // Types

    pub fn underlying(&self, typ: &Type) -> Type {
        match typ {
            Type::Named(id) => self.named(*id).underlying.clone(),
            other => other.clone(),
        }
    }

    pub fn is_interface(&self, typ: &Type) -> bool {
        matches!(self.underlying(typ), Type::Interface(_))
    }

    pub fn basic_kind(&self, typ: &Type) -> Option<BasicKind> {
        self.underlying(typ).basic()
    }

    pub fn type_name(&self, id: NamedId) -> &str {
        &self.obj(self.named(id).obj).name
    }

    /// Formats a type the way error messages show it
    pub fn type_string(&self, typ: &Type) -> String {
        let mut out = String::new();
        self.write_type(&mut out, typ, 0);
        out
    }

    fn write_type(&self, out: &mut String, typ: &Type, depth: usize) {
        if depth > 16 {
            out.push_str("...");
            return;
        }
        match typ {
            Type::Invalid => out.push_str("invalid type"),
            Type::Basic(kind) => out.push_str(kind.name()),
            Type::Pointer(elem) => {
                out.push('*');
                self.write_type(out, elem, depth + 1);
            }
            Type::Array(len, elem) => {
                out.push_str(&format!("[{}]", len));
                self.write_type(out, elem, depth + 1);
            }
            Type::Slice(elem) => {
                out.push_str("[]");
                self.write_type(out, elem, depth + 1);
            }
            Type::Map(key, value) => {
                out.push_str("map[");
                self.write_type(out, key, depth + 1);
                out.push(']');
                self.write_type(out, value, depth + 1);
            }
            Type::Chan(dir, elem) => {
                out.push_str(match dir {
                    crate::ast::ChanDir::Both => "chan ",
                    crate::ast::ChanDir::Send => "chan<- ",
                    crate::ast::ChanDir::Recv => "<-chan ",
                });
                self.write_type(out, elem, depth + 1);
            }
            Type::Struct(st) => {
                out.push_str("struct{");
                for (i, field) in st.fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str("; ");
                    }
                    if !field.embedded {
                        out.push_str(&field.name);
                        out.push(' ');
                    }
                    self.write_type(out, &field.typ, depth + 1);
                }
                out.push('}');
            }
            Type::Tuple(types) => {
                out.push('(');
                for (i, t) in types.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_type(out, t, depth + 1);
                }
                out.push(')');
            }
            Type::Signature(sig) => {
                out.push_str("func");
                self.write_signature(out, sig, depth);
            }
            Type::Interface(iface) => {
                if iface.all_methods.is_empty() {
                    out.push_str("interface{}");
                    return;
                }
                out.push_str("interface{");
                for (i, m) in iface.all_methods.iter().enumerate() {
                    if i > 0 {
                        out.push_str("; ");
                    }
                    out.push_str(&m.name);
                    self.write_signature(out, &m.sig, depth);
                }
                out.push('}');
            }
            Type::Named(id) => {
                let obj = self.obj(self.named(*id).obj);
                if let Some(pkg) = obj.pkg {
                    let pkg = self.package(pkg);
                    if pkg.path != "main" {
                        out.push_str(&pkg.name);
                        out.push('.');
                    }
                }
                out.push_str(&obj.name);
            }
        }
    }

    fn write_signature(&self, out: &mut String, sig: &crate::types::Signature, depth: usize) {
        out.push('(');
        for (i, p) in sig.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            if !p.name.is_empty() {
                out.push_str(&p.name);
                out.push(' ');
            }
            if sig.variadic && i == sig.params.len() - 1 {
                out.push_str("...");
                match &p.typ {
                    Type::Slice(elem) => self.write_type(out, elem, depth + 1),
                    other => self.write_type(out, other, depth + 1),
                }
            } else {
                self.write_type(out, &p.typ, depth + 1);
            }
        }
        out.push(')');
        match sig.results.len() {
            0 => {}
            1 if sig.results[0].name.is_empty() => {
                out.push(' ');
                self.write_type(out, &sig.results[0].typ, depth + 1);
            }
            _ => {
                out.push_str(" (");
                for (i, r) in sig.results.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if !r.name.is_empty() {
                        out.push_str(&r.name);
                        out.push(' ');
                    }
                    self.write_type(out, &r.typ, depth + 1);
                }
                out.push(')');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_walks_to_universe() {
        let mut env = Env::new();
        let pkg = env.new_package("main", "main");
        let scope = env.package(pkg).scope;
        let (found_in, obj) = env.lookup(scope, "int").unwrap();
        assert_eq!(found_in, env.universe);
        assert!(env.obj(obj).is_type_name());
    }

    #[test]
    fn test_rollback_restores_bindings_and_decls() {
        let mut env = Env::new();
        let pkg = env.new_package("main", "main");
        let scope = env.package(pkg).scope;
        let old = env.new_object(Object::new("x", ObjKind::Var, Type::int(), Some(pkg), Pos::default()));
        env.bind(scope, "x", old);

        env.begin();
        let new = env.new_object(Object::new("x", ObjKind::Var, Type::string(), Some(pkg), Pos::default()));
        env.bind(scope, "x", new);
        let y = env.new_object(Object::new("y", ObjKind::Var, Type::int(), Some(pkg), Pos::default()));
        env.bind(scope, "y", y);
        env.set_complete(pkg, true);
        env.rollback();

        assert_eq!(env.lookup_local(scope, "x"), Some(old));
        assert_eq!(env.lookup_local(scope, "y"), None);
        assert!(!env.package(pkg).complete);
    }

    #[test]
    fn test_type_string() {
        let env = Env::new();
        let sig = crate::types::Signature {
            params: vec![crate::types::Param::new("s", Type::string())],
            results: vec![
                crate::types::Param::unnamed(Type::empty_interface()),
                crate::types::Param::unnamed(universe::error_type(&env)),
            ],
            ..Default::default()
        };
        assert_eq!(
            env.type_string(&Type::signature(sig)),
            "func(s string) (interface{}, error)"
        );
        assert_eq!(env.type_string(&Type::map(Type::string(), Type::slice(Type::int()))), "map[string][]int");
    }
}
