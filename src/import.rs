//! Import resolution
//!
//! Every import path is satisfied in one of two ways:
//! - a bridge package from [`crate::stdlib`], declared once and cached for
//!   the whole session;
//! - foreign Go source, read through a [`SourceLoader`] and checked by a
//!   nested [`Checker`] one import level deeper. Source archives are only
//!   trusted within the submission that read them, so the next submission
//!   importing the path sees the current text on disk.
//!
//! Resolution for checking never touches the runtime. Resolution for
//! running registers bridge natives and runs package initialization text.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::ast::{File, FuncDecl, StmtKind};
use crate::env::{DeclKind, Env, ObjKind, PkgId};
use crate::error::{GiltError, Result};
use crate::intrinsics::SigBuilder;
use crate::parser::parse_source;
use crate::runtime::Runtime;
use crate::stdlib::{self, Bridge};
use crate::typechecker::{CheckConfig, Checker, Importer, Info};

/// A package imported at a deeper level than this may not import source
/// packages of its own
pub const MAX_IMPORT_DEPTH: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Declared from a bridge table
    Binary,
    /// Checked from Go source
    Source,
}

/// A resolved import
#[derive(Debug, Clone)]
pub struct Archive {
    pub path: String,
    pub name: String,
    pub pkg: PkgId,
    pub origin: Origin,
    /// Program text defining the package for the runtime
    pub init_text: String,
    /// SHA-256 of the source files, for source archives
    pub fingerprint: Option<String>,
    /// Submission that produced the archive
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub archives: usize,
}

/// Archives keyed by import path
#[derive(Debug, Default)]
pub struct ArchiveCache {
    archives: HashMap<String, Archive>,
    generation: u64,
    hits: u64,
    misses: u64,
    /// Bridges whose natives the runtime already has
    registered: HashSet<String>,
    /// Fingerprint of the source text last run for each source package
    loaded: HashMap<String, String>,
}

impl ArchiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a submission; source archives from earlier ones go stale
    pub fn new_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn is_valid(&self, archive: &Archive) -> bool {
        match archive.origin {
            Origin::Binary => true,
            Origin::Source => archive.generation == self.generation,
        }
    }

    /// A usable archive for `path`, counted as a hit or a miss
    pub fn get(&mut self, path: &str) -> Option<&Archive> {
        let valid = self.archives.get(path).map_or(false, |a| self.is_valid(a));
        if valid {
            self.hits += 1;
            tracing::debug!(path, "archive cache hit");
            self.archives.get(path)
        } else {
            self.misses += 1;
            tracing::debug!(path, "archive cache miss");
            None
        }
    }

    /// Looks up an archive without counting or validating it
    pub fn peek(&self, path: &str) -> Option<&Archive> {
        self.archives.get(path)
    }

    pub fn insert(&mut self, archive: Archive) {
        self.archives.insert(archive.path.clone(), archive);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            archives: self.archives.len(),
        }
    }

    /// Drops every archive made in `generation` or later, as when the
    /// submission that made them failed
    pub fn forget_since(&mut self, generation: u64) {
        let before = self.archives.len();
        self.archives.retain(|_, a| a.generation < generation);
        let dropped = before - self.archives.len();
        if dropped > 0 {
            tracing::debug!(dropped, generation, "forgot archives of failed submission");
        }
    }
}

/// The Go files of one package directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePackage {
    pub dir: PathBuf,
    /// `(file name, text)`, sorted by name
    pub files: Vec<(String, String)>,
}

impl SourcePackage {
    /// SHA-256 over every file name and text, hex encoded
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, text) in &self.files {
            hasher.update(name.as_bytes());
            hasher.update([0]);
            hasher.update(text.as_bytes());
            hasher.update([0]);
        }
        hex::encode(hasher.finalize())
    }
}

/// Finds and reads the source of an import path
pub trait SourceLoader {
    /// `dir` is the directory of the importing package
    fn load(&self, path: &str, dir: &str) -> Result<SourcePackage>;
}

/// Reads packages from disk, trying `<dir>/vendor/<path>` and then each
/// source root
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    roots: Vec<PathBuf>,
}

impl FsLoader {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        FsLoader { roots }
    }

    fn read_dir(dir: &Path) -> Result<Vec<(String, String)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".go") && !name.ends_with("_test.go") && entry.path().is_file() {
                let text = fs::read_to_string(entry.path())?;
                files.push((name, text));
            }
        }
        files.sort();
        Ok(files)
    }
}

impl SourceLoader for FsLoader {
    fn load(&self, path: &str, dir: &str) -> Result<SourcePackage> {
        let vendored = Path::new(dir).join("vendor").join(path);
        let candidates = std::iter::once(vendored).chain(self.roots.iter().map(|root| root.join(path)));

        let mut searched = Vec::new();
        for candidate in candidates {
            if !candidate.is_dir() {
                searched.push(candidate.display().to_string());
                continue;
            }
            let files = Self::read_dir(&candidate)?;
            if files.is_empty() {
                return Err(GiltError::SourceImport {
                    path: path.to_string(),
                    cause: format!("no buildable Go source files in {}", candidate.display()),
                });
            }
            tracing::debug!(path, dir = %candidate.display(), files = files.len(), "read package source");
            return Ok(SourcePackage { dir: candidate, files });
        }
        Err(GiltError::SourceImport {
            path: path.to_string(),
            cause: format!("cannot find package in any of: {}", searched.join(", ")),
        })
    }
}

/// Turns a checked source package into program text for the runtime
pub trait PackageWriter {
    fn write(&self, env: &Env, pkg: PkgId, info: &Info) -> String;
}

/// Emits the package table skeleton: one function per declaration, with
/// single-expression bodies carried over, and an `__init` running the
/// package's variable initializers in order
#[derive(Debug, Clone, Copy, Default)]
pub struct StubWriter;

impl StubWriter {
    fn function(out: &mut String, base: &str, fd: &FuncDecl) {
        let mut params: Vec<String> = Vec::new();
        let name = match &fd.recv {
            Some(recv) => {
                params.push(recv.names.first().map_or("recv".to_string(), |n| n.name.clone()));
                let typ = recv.typ.to_string();
                format!("{}.{}.{}", base, typ.trim_start_matches('*'), fd.name.name)
            }
            None => format!("{}.{}", base, fd.name.name),
        };
        for field in &fd.typ.params {
            params.extend(field.names.iter().map(|n| n.name.clone()));
        }
        let _ = writeln!(out, "function {}({})", name, params.join(", "));
        let body = fd.body.as_ref().map(|b| b.stmts.as_slice()).unwrap_or_default();
        match body {
            [stmt] => match &stmt.kind {
                StmtKind::Return(values) if !values.is_empty() => {
                    let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                    let _ = writeln!(out, "  return {}", values.join(", "));
                }
                _ => out.push_str("  -- 1 statement\n"),
            },
            stmts => {
                let _ = writeln!(out, "  -- {} statements", stmts.len());
            }
        }
        out.push_str("end\n");
    }
}

impl PackageWriter for StubWriter {
    fn write(&self, env: &Env, pkg: PkgId, info: &Info) -> String {
        let base = env.package(pkg).name.clone();
        let mut out = format!("{base} = {base} or {{}}\n", base = base);

        for def in info.new_code.iter().filter(|d| d.pkg_scope) {
            let obj = env.obj(def.obj);
            if !matches!(obj.kind, ObjKind::Func) {
                continue;
            }
            if let Some(DeclKind::Func(fd)) = env.decl(pkg, def.obj).map(|d| &d.kind) {
                Self::function(&mut out, &base, fd);
            }
        }

        let _ = writeln!(out, "function {}.__init()", base);
        for init in &info.init_order {
            let lhs: Vec<String> = init
                .lhs
                .iter()
                .map(|obj| format!("{}.{}", base, env.obj(*obj).name))
                .collect();
            let _ = writeln!(out, "  {} = {}", lhs.join(", "), init.rhs);
        }
        out.push_str("end\n");
        out
    }
}

/// Resolves imports against the archive cache, the bridge registry and
/// foreign source
pub struct ImportPipeline<'a> {
    cache: &'a mut ArchiveCache,
    loader: &'a dyn SourceLoader,
    writer: &'a dyn PackageWriter,
    test_mode: bool,
    disable_unused_import_check: bool,
    /// Source packages being checked, outermost first
    in_progress: Vec<String>,
}

impl<'a> ImportPipeline<'a> {
    pub fn new(cache: &'a mut ArchiveCache, loader: &'a dyn SourceLoader, writer: &'a dyn PackageWriter) -> Self {
        ImportPipeline {
            cache,
            loader,
            writer,
            test_mode: false,
            disable_unused_import_check: false,
            in_progress: Vec::new(),
        }
    }

    /// Makes test-only bridges importable
    pub fn test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }

    /// Carried into the checks of source packages
    pub fn disable_unused_import_check(mut self, disabled: bool) -> Self {
        self.disable_unused_import_check = disabled;
        self
    }

    /// Resolves `path` for the checker. `depth` is the import level of the
    /// importing package; the prompt is level 0.
    pub fn resolve_for_check(&mut self, env: &mut Env, path: &str, dir: &str, depth: usize) -> Result<PkgId> {
        if let Some(archive) = self.cache.get(path) {
            return Ok(archive.pkg);
        }
        if let Some(bridge) = stdlib::lookup(path, self.test_mode) {
            return Ok(self.load_bridge(env, bridge));
        }

        let level = depth + 1;
        if depth > MAX_IMPORT_DEPTH {
            return Err(GiltError::DeepImport {
                path: path.to_string(),
                depth: level,
                limit: MAX_IMPORT_DEPTH,
            });
        }
        if self.in_progress.iter().any(|p| p == path) {
            return Err(GiltError::SourceImport {
                path: path.to_string(),
                cause: format!("import cycle not allowed: {} -> {}", self.in_progress.join(" -> "), path),
            });
        }

        self.load_source(env, path, dir, level).map_err(|err| {
            if err.is_import_error() {
                err
            } else {
                GiltError::SourceImport {
                    path: path.to_string(),
                    cause: err.to_string(),
                }
            }
        })
    }

    fn load_bridge(&mut self, env: &mut Env, bridge: &Bridge) -> PkgId {
        let pkg = env.new_package(bridge.path, bridge.name());
        let mut b = SigBuilder::new(env, pkg);
        (bridge.declare)(&mut b);
        b.finish();
        env.set_package_archive(pkg, bridge.path);

        tracing::debug!(path = bridge.path, "declared bridge package");
        self.cache.insert(Archive {
            path: bridge.path.to_string(),
            name: bridge.name().to_string(),
            pkg,
            origin: Origin::Binary,
            init_text: bridge.init_text(),
            fingerprint: None,
            generation: self.cache.generation(),
        });
        pkg
    }

    fn load_source(&mut self, env: &mut Env, path: &str, dir: &str, level: usize) -> Result<PkgId> {
        let source = self.loader.load(path, dir)?;
        let files = source
            .files
            .iter()
            .map(|(name, text)| {
                parse_source(text).map_err(|err| GiltError::SourceImport {
                    path: path.to_string(),
                    cause: format!("{}: {}", name, err),
                })
            })
            .collect::<Result<Vec<File>>>()?;

        let name = files
            .iter()
            .find_map(|f| f.package.as_ref().map(|p| p.name.clone()))
            .unwrap_or_else(|| path.rsplit('/').next().unwrap_or(path).to_string());
        let fingerprint = source.fingerprint();

        let pkg = match env.package_by_path(path) {
            Some(pkg) => {
                env.reset_package(pkg, &name);
                pkg
            }
            None => env.new_package(path, &name),
        };
        tracing::debug!(path, level, fingerprint = %&fingerprint[..12], "checking source import");

        let conf = CheckConfig {
            disable_unused_import_check: self.disable_unused_import_check,
            full_package: true,
        };
        let pkg_dir = source.dir.to_string_lossy().into_owned();
        self.in_progress.push(path.to_string());
        let checked = Checker::new(env, self, conf, pkg, level, &pkg_dir).check_files(&files);
        self.in_progress.pop();
        let info = checked?;

        let init_text = self.writer.write(env, pkg, &info);
        env.set_package_archive(pkg, path);
        self.cache.insert(Archive {
            path: path.to_string(),
            name,
            pkg,
            origin: Origin::Source,
            init_text,
            fingerprint: Some(fingerprint),
            generation: self.cache.generation(),
        });
        Ok(pkg)
    }

    /// Makes a checked import available to the running program, its own
    /// imports first. Bridge natives are registered once per session; a
    /// source package's text and `__init` run again only when its source
    /// changed.
    pub fn resolve_for_run(&mut self, env: &Env, runtime: &mut dyn Runtime, path: &str) -> Result<()> {
        let archive = self
            .cache
            .peek(path)
            .cloned()
            .ok_or_else(|| GiltError::RuntimeError(format!("package {:?} was never type-checked", path)))?;

        if archive.origin == Origin::Source {
            let deps: Vec<String> = env
                .package(archive.pkg)
                .imports
                .iter()
                .map(|pkg| env.package(*pkg).path.clone())
                .collect();
            for dep in deps {
                self.resolve_for_run(env, runtime, &dep)?;
            }
        }

        match archive.origin {
            Origin::Binary => {
                if self.cache.registered.contains(path) {
                    return Ok(());
                }
                let bridge = stdlib::lookup(path, true).ok_or_else(|| {
                    GiltError::RuntimeError(format!("no bridge table for {:?}", path))
                })?;
                runtime.register(&archive.name, (bridge.natives)())?;
                runtime.exec(&archive.init_text)?;
                self.cache.registered.insert(path.to_string());
                tracing::debug!(path, "registered bridge natives");
            }
            Origin::Source => {
                let fingerprint = archive.fingerprint.unwrap_or_default();
                if self.cache.loaded.get(path) == Some(&fingerprint) {
                    tracing::trace!(path, "source package unchanged, not re-run");
                    return Ok(());
                }
                runtime.exec(&archive.init_text)?;
                runtime.exec(&format!("{}.__init();", archive.name))?;
                self.cache.loaded.insert(path.to_string(), fingerprint);
                tracing::debug!(path, "ran source package init");
            }
        }
        Ok(())
    }
}

impl Importer for ImportPipeline<'_> {
    fn import(&mut self, env: &mut Env, path: &str, dir: &str, depth: usize) -> Result<PkgId> {
        self.resolve_for_check(env, path, dir, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RecordingRuntime;
    use pretty_assertions::assert_eq;

    /// Packages held in memory, keyed by import path
    #[derive(Default)]
    struct MemLoader {
        packages: HashMap<String, Vec<(String, String)>>,
    }

    impl MemLoader {
        fn with(mut self, path: &str, text: &str) -> Self {
            self.set(path, text);
            self
        }

        fn set(&mut self, path: &str, text: &str) {
            self.packages
                .insert(path.to_string(), vec![("a.go".to_string(), text.to_string())]);
        }
    }

    impl SourceLoader for MemLoader {
        fn load(&self, path: &str, _dir: &str) -> Result<SourcePackage> {
            match self.packages.get(path) {
                Some(files) => Ok(SourcePackage {
                    dir: PathBuf::from(path),
                    files: files.clone(),
                }),
                None => Err(GiltError::SourceImport {
                    path: path.to_string(),
                    cause: "not found".to_string(),
                }),
            }
        }
    }

    const POLE: &str = "package pole\n\nfunc Pole(numPole int) int {\n\treturn numPole * 2\n}\n";

    #[test]
    fn test_bridge_cached_for_session() {
        let mut env = Env::new();
        let mut cache = ArchiveCache::new();
        let loader = MemLoader::default();

        cache.new_generation();
        let first = ImportPipeline::new(&mut cache, &loader, &StubWriter)
            .resolve_for_check(&mut env, "strings", ".", 0)
            .unwrap();
        cache.new_generation();
        let second = ImportPipeline::new(&mut cache, &loader, &StubWriter)
            .resolve_for_check(&mut env, "strings", ".", 0)
            .unwrap();

        assert_eq!(first, second);
        assert!(env.package(first).complete);
        assert_eq!(env.package(first).archive.as_deref(), Some("strings"));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1, archives: 1 });
    }

    #[test]
    fn test_source_reread_each_generation() {
        let mut env = Env::new();
        let mut cache = ArchiveCache::new();
        let mut loader = MemLoader::default().with("pole", POLE);

        cache.new_generation();
        ImportPipeline::new(&mut cache, &loader, &StubWriter)
            .resolve_for_check(&mut env, "pole", ".", 0)
            .unwrap();
        let first = cache.peek("pole").unwrap().clone();
        assert!(first.init_text.contains("return numPole * 2"), "{}", first.init_text);

        loader.set("pole", &POLE.replace("* 2", "* 3"));
        cache.new_generation();
        ImportPipeline::new(&mut cache, &loader, &StubWriter)
            .resolve_for_check(&mut env, "pole", ".", 0)
            .unwrap();
        let second = cache.peek("pole").unwrap().clone();

        assert_eq!(first.pkg, second.pkg);
        assert_ne!(first.fingerprint, second.fingerprint);
        assert!(second.init_text.contains("return numPole * 3"), "{}", second.init_text);
    }

    #[test]
    fn test_same_generation_reuses_source() {
        let mut env = Env::new();
        let mut cache = ArchiveCache::new();
        let loader = MemLoader::default().with("pole", POLE);

        cache.new_generation();
        let mut pipeline = ImportPipeline::new(&mut cache, &loader, &StubWriter);
        let a = pipeline.resolve_for_check(&mut env, "pole", ".", 0).unwrap();
        let b = pipeline.resolve_for_check(&mut env, "pole", ".", 0).unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_depth_ceiling() {
        let mut env = Env::new();
        let mut cache = ArchiveCache::new();
        let mut loader = MemLoader::default();
        for i in 1..=9 {
            let text = if i < 9 {
                format!("package p{i}\n\nimport \"p{next}\"\n\nvar V = p{next}.V + 1\n", i = i, next = i + 1)
            } else {
                "package p9\n\nvar V = 1\n".to_string()
            };
            loader.set(&format!("p{}", i), &text);
        }

        cache.new_generation();
        let err = ImportPipeline::new(&mut cache, &loader, &StubWriter)
            .resolve_for_check(&mut env, "p1", ".", 0)
            .unwrap_err();
        assert_eq!(
            err,
            GiltError::DeepImport {
                path: "p9".to_string(),
                depth: 9,
                limit: MAX_IMPORT_DEPTH,
            }
        );
    }

    #[test]
    fn test_chain_of_eight_source_packages() {
        let mut env = Env::new();
        let mut cache = ArchiveCache::new();
        let mut loader = MemLoader::default();
        for i in 1..=8 {
            let text = if i < 8 {
                format!("package q{i}\n\nimport \"q{next}\"\n\nvar V = q{next}.V + 1\n", i = i, next = i + 1)
            } else {
                "package q8\n\nvar V = 1\n".to_string()
            };
            loader.set(&format!("q{}", i), &text);
        }

        cache.new_generation();
        ImportPipeline::new(&mut cache, &loader, &StubWriter)
            .resolve_for_check(&mut env, "q1", ".", 0)
            .unwrap();
        assert_eq!(cache.stats().archives, 8);
    }

    #[test]
    fn test_import_cycle() {
        let mut env = Env::new();
        let mut cache = ArchiveCache::new();
        let loader = MemLoader::default()
            .with("a", "package a\n\nimport \"b\"\n\nvar X = b.Y\n")
            .with("b", "package b\n\nimport \"a\"\n\nvar Y = a.X\n");

        cache.new_generation();
        let err = ImportPipeline::new(&mut cache, &loader, &StubWriter)
            .resolve_for_check(&mut env, "a", ".", 0)
            .unwrap_err();
        assert!(err.to_string().contains("import cycle not allowed: a -> b -> a"), "{}", err);
    }

    #[test]
    fn test_type_errors_wrapped() {
        let mut env = Env::new();
        let mut cache = ArchiveCache::new();
        let loader = MemLoader::default().with("bad", "package bad\n\nvar X int = \"s\"\n");

        cache.new_generation();
        let err = ImportPipeline::new(&mut cache, &loader, &StubWriter)
            .resolve_for_check(&mut env, "bad", ".", 0)
            .unwrap_err();
        match err {
            GiltError::SourceImport { path, cause } => {
                assert_eq!(path, "bad");
                assert!(cause.contains("cannot use"), "{}", cause);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_test_only_bridge() {
        let mut env = Env::new();
        let mut cache = ArchiveCache::new();
        let loader = MemLoader::default();

        cache.new_generation();
        assert!(ImportPipeline::new(&mut cache, &loader, &StubWriter)
            .resolve_for_check(&mut env, "gitesting", ".", 0)
            .is_err());
        assert!(ImportPipeline::new(&mut cache, &loader, &StubWriter)
            .test_mode(true)
            .resolve_for_check(&mut env, "gitesting", ".", 0)
            .is_ok());
    }

    #[test]
    fn test_forget_since() {
        let mut env = Env::new();
        let mut cache = ArchiveCache::new();
        let loader = MemLoader::default();

        cache.new_generation();
        ImportPipeline::new(&mut cache, &loader, &StubWriter)
            .resolve_for_check(&mut env, "fmt", ".", 0)
            .unwrap();
        let failed = cache.new_generation();
        ImportPipeline::new(&mut cache, &loader, &StubWriter)
            .resolve_for_check(&mut env, "math", ".", 0)
            .unwrap();
        cache.forget_since(failed);

        assert!(cache.peek("fmt").is_some());
        assert!(cache.peek("math").is_none());
    }

    #[test]
    fn test_run_side_effects_once() {
        let mut env = Env::new();
        let mut cache = ArchiveCache::new();
        let loader = MemLoader::default().with("pole", POLE);
        let mut runtime = RecordingRuntime::new();

        for _ in 0..2 {
            cache.new_generation();
            let mut pipeline = ImportPipeline::new(&mut cache, &loader, &StubWriter);
            pipeline.resolve_for_check(&mut env, "pole", ".", 0).unwrap();
            pipeline.resolve_for_check(&mut env, "strings", ".", 0).unwrap();
            pipeline.resolve_for_run(&env, &mut runtime, "pole").unwrap();
            pipeline.resolve_for_run(&env, &mut runtime, "strings").unwrap();
        }

        assert_eq!(runtime.exec_count("pole.__init();"), 1);
        assert_eq!(runtime.exec_count("strings = __bridge[\"strings\"]\n"), 1);
        assert!(runtime.is_registered("strings"));
    }

    #[test]
    fn test_fs_loader_prefers_vendor() {
        let base = std::env::temp_dir().join(format!("gilt-loader-{}", std::process::id()));
        let vendored = base.join("app").join("vendor").join("lib");
        let rooted = base.join("root").join("lib");
        fs::create_dir_all(&vendored).unwrap();
        fs::create_dir_all(&rooted).unwrap();
        fs::write(vendored.join("lib.go"), "package lib\n").unwrap();
        fs::write(vendored.join("lib_test.go"), "package lib\n").unwrap();
        fs::write(rooted.join("lib.go"), "package lib\n\nvar X = 1\n").unwrap();

        let loader = FsLoader::new(vec![base.join("root")]);
        let app = base.join("app");
        let found = loader.load("lib", &app.to_string_lossy()).unwrap();
        assert_eq!(found.dir, vendored);
        assert_eq!(found.files, vec![("lib.go".to_string(), "package lib\n".to_string())]);

        let from_root = loader.load("lib", &base.to_string_lossy()).unwrap();
        assert_eq!(from_root.dir, rooted);
        assert!(loader.load("missing", ".").unwrap_err().is_import_error());

        fs::remove_dir_all(&base).ok();
    }
}
