//! Incremental compile session
//!
//! A [`Session`] owns everything that outlives one submission: the symbol
//! environment, the archive cache, the configuration and the runtime. Each
//! call to [`Session::submit`] parses one chunk of prompt input, checks it
//! against every earlier submission, resolves its imports for the runtime
//! and hands the translated text over. A failed submission leaves no trace.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use crate::config::Config;
use crate::env::{Env, ObjKind, PkgId};
use crate::error::{GiltError, Result};
use crate::import::{ArchiveCache, CacheStats, FsLoader, ImportPipeline, PackageWriter, SourceLoader, StubWriter};
use crate::intrinsics;
use crate::parser::parse_source;
use crate::runtime::{RecordingRuntime, Runtime, Value};
use crate::typechecker::{Checker, Info};

/// A session behind a single borrow boundary, for callers that hand it
/// around
pub type SharedSession<R = RecordingRuntime> = Rc<RefCell<Session<R>>>;

/// Result of one accepted submission
#[derive(Debug)]
pub struct Outcome {
    pub generation: u64,
    pub info: Info,
    /// Text handed to the runtime for the submission itself
    pub text: String,
}

pub struct Session<R = RecordingRuntime> {
    env: Env,
    main: PkgId,
    cache: ArchiveCache,
    config: Config,
    loader: Box<dyn SourceLoader>,
    writer: Box<dyn PackageWriter>,
    runtime: R,
    /// Directory of the prompt's package, for `vendor/` lookups
    dir: String,
}

impl Session<RecordingRuntime> {
    pub fn new(config: Config) -> Result<Self> {
        Session::with_runtime(config, RecordingRuntime::new())
    }
}

impl<R: Runtime> Session<R> {
    pub fn with_runtime(config: Config, mut runtime: R) -> Result<Self> {
        let mut env = Env::new();
        let main = env.new_package("main", "main");
        // created before any journal exists so rollbacks never remove it
        env.enable_repl_scope(main);
        intrinsics::install(&mut env, main);
        runtime.register("main", intrinsics::natives())?;

        let loader = FsLoader::new(config.source_roots.clone());
        tracing::debug!(
            test_mode = config.test_mode,
            roots = config.source_roots.len(),
            "session started"
        );
        Ok(Session {
            env,
            main,
            cache: ArchiveCache::new(),
            config,
            loader: Box::new(loader),
            writer: Box::new(StubWriter),
            runtime,
            dir: ".".to_string(),
        })
    }

    /// Replaces where imported source is read from
    pub fn with_loader(mut self, loader: impl SourceLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn with_writer(mut self, writer: impl PackageWriter + 'static) -> Self {
        self.writer = Box::new(writer);
        self
    }

    /// Sets the directory whose `vendor/` is searched first
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into().to_string_lossy().into_owned();
        self
    }

    pub fn into_shared(self) -> SharedSession<R> {
        Rc::new(RefCell::new(self))
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn main_package(&self) -> PkgId {
        self.main
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Checks and runs one chunk of input
    pub fn submit(&mut self, source: &str) -> Result<Outcome> {
        let generation = self.cache.new_generation();
        let _span = tracing::info_span!("submit", generation).entered();

        let file = parse_source(source)?;

        self.env.begin();
        let checked = {
            let mut pipeline = ImportPipeline::new(&mut self.cache, self.loader.as_ref(), self.writer.as_ref())
                .test_mode(self.config.test_mode)
                .disable_unused_import_check(self.config.disable_unused_import_check);
            Checker::new(
                &mut self.env,
                &mut pipeline,
                self.config.check_config(),
                self.main,
                0,
                &self.dir,
            )
            .check_files(&[file])
        };
        let info = match checked {
            Ok(info) => info,
            Err(err) => return Err(self.reject(generation, err)),
        };

        // still inside the journal: a runtime failure undoes the declarations too
        let text = match self.run(&info) {
            Ok(text) => text,
            Err(err) => return Err(self.reject(generation, err)),
        };
        self.env.commit();
        tracing::debug!(new = info.new_code.len(), imports = info.imports.len(), "submission accepted");
        Ok(Outcome { generation, info, text })
    }

    /// Hands the imports and then the submission itself to the runtime
    fn run(&mut self, info: &Info) -> Result<String> {
        let mut pipeline = ImportPipeline::new(&mut self.cache, self.loader.as_ref(), self.writer.as_ref());
        for (path, _) in &info.imports {
            pipeline.resolve_for_run(&self.env, &mut self.runtime, path)?;
        }

        let text = self.writer.write(&self.env, self.main, info);
        self.runtime.exec(&text)?;
        Ok(text)
    }

    fn reject(&mut self, generation: u64, err: GiltError) -> GiltError {
        self.env.rollback();
        self.cache.forget_since(generation);
        tracing::debug!(error = %err, "submission rejected");
        err
    }

    /// Calls a native the runtime has registered, e.g. `main.__lua`
    pub fn call(&mut self, table: &str, name: &str, args: &[Value]) -> Result<Value> {
        self.runtime.call(table, name, args)
    }

    /// `name kind type` for every prompt-visible declaration, intrinsics
    /// left out, sorted by name
    pub fn globals(&self) -> Vec<String> {
        let package = self.env.package(self.main);
        let mut scopes = vec![package.scope];
        scopes.extend(package.repl_scope);

        let mut names: Vec<(&String, crate::env::ObjId)> = scopes
            .iter()
            .flat_map(|scope| self.env.scope(*scope).names.iter().map(|(n, o)| (n, *o)))
            .filter(|(name, _)| !name.starts_with("__"))
            .collect();
        names.sort();
        names.dedup_by(|a, b| a.0 == b.0);

        names
            .into_iter()
            .map(|(name, id)| {
                let obj = self.env.obj(id);
                match obj.kind {
                    ObjKind::PkgName(pkg) => format!("{} package {:?}", name, self.env.package(pkg).path),
                    _ => format!("{} {} {}", name, obj.kind_name(), self.env.type_string(&obj.typ)),
                }
            })
            .collect()
    }

    /// Type of a prompt-visible name, as error messages print it
    pub fn type_of(&self, name: &str) -> Option<String> {
        let package = self.env.package(self.main);
        let scope = package.repl_scope.unwrap_or(package.scope);
        let (_, obj) = self.env.lookup(scope, name)?;
        Some(self.env.type_string(&self.env.obj(obj).typ))
    }
}

impl Outcome {
    /// One line per definition made at package level, `name type`
    pub fn describe(&self, env: &Env) -> Vec<String> {
        self.info
            .new_code
            .iter()
            .map(|def| {
                let obj = env.obj(def.obj);
                format!("{} {}", obj.name, env.type_string(&obj.typ))
            })
            .collect()
    }
}

/// Submits through a shared session, failing instead of blocking when a
/// submission is already in progress
pub fn submit_shared<R: Runtime>(session: &SharedSession<R>, source: &str) -> Result<Outcome> {
    let mut session = session
        .try_borrow_mut()
        .map_err(|_| GiltError::RuntimeError("session is busy with another submission".to_string()))?;
    session.submit(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn session() -> Session {
        Session::new(Config::default()).unwrap()
    }

    #[test]
    fn test_declarations_persist() {
        let mut s = session();
        s.submit("x := 21").unwrap();
        s.submit("y := x * 2").unwrap();
        assert_eq!(s.type_of("y").as_deref(), Some("int"));
    }

    #[test]
    fn test_failed_submission_leaves_no_trace() {
        let mut s = session();
        s.submit("a := 1").unwrap();
        assert!(s.submit("b := 2\nvar c string = a").is_err());
        assert_eq!(s.type_of("b"), None);
        assert_eq!(s.type_of("a").as_deref(), Some("int"));
        s.submit("b := \"again\"").unwrap();
        assert_eq!(s.type_of("b").as_deref(), Some("string"));
    }

    #[test]
    fn test_failed_import_is_forgotten() {
        let mut s = session();
        let err = s.submit("import \"strings\"\nvar n int = strings.ToUpper(\"x\")").unwrap_err();
        assert!(matches!(err, GiltError::TypeError { .. }));
        assert_eq!(s.cache_stats().archives, 0);

        s.submit("import \"strings\"\nn := strings.Count(\"cheese\", \"e\")").unwrap();
        assert_eq!(s.type_of("n").as_deref(), Some("int"));
        assert!(s.runtime().is_registered("strings"));
    }

    #[test]
    fn test_globals_hide_intrinsics() {
        let mut s = session();
        s.submit("type Celsius float64\nvar t Celsius = 20").unwrap();
        assert_eq!(
            s.globals(),
            vec!["Celsius type Celsius".to_string(), "t var Celsius".to_string()]
        );
    }

    #[test]
    fn test_intrinsics_callable() {
        let mut s = session();
        s.submit("v, err := __lua(\"3 + 4\")").unwrap();
        assert_eq!(s.type_of("v").as_deref(), Some("interface{}"));
        assert_eq!(s.type_of("err").as_deref(), Some("error"));
        let result = s.call("main", "__lua", &[Value::String("3 + 4".to_string())]).unwrap();
        assert_eq!(result, Value::Tuple(vec![Value::Int(7), Value::Nil]));
    }

    /// Refuses any chunk that assigns `main.boom`
    #[derive(Default)]
    struct FussyRuntime(RecordingRuntime);

    impl Runtime for FussyRuntime {
        fn register(&mut self, name: &str, table: crate::runtime::NameTable) -> Result<()> {
            self.0.register(name, table)
        }

        fn exec(&mut self, text: &str) -> Result<()> {
            if text.contains("main.boom") {
                return Err(GiltError::RuntimeError("boom".to_string()));
            }
            self.0.exec(text)
        }

        fn call(&mut self, table: &str, name: &str, args: &[Value]) -> Result<Value> {
            self.0.call(table, name, args)
        }
    }

    #[test]
    fn test_runtime_failure_rolls_back() {
        let mut s = Session::with_runtime(Config::default(), FussyRuntime::default()).unwrap();
        s.submit("a := 1").unwrap();

        let err = s
            .submit("import \"strings\"\nboom := strings.ToUpper(\"x\")")
            .unwrap_err();
        assert_eq!(err, GiltError::RuntimeError("boom".to_string()));
        assert_eq!(s.type_of("boom"), None);
        assert_eq!(s.type_of("a").as_deref(), Some("int"));
        assert_eq!(s.cache_stats().archives, 0);

        s.submit("import \"strings\"\nfine := strings.ToUpper(\"x\")").unwrap();
        assert_eq!(s.type_of("fine").as_deref(), Some("string"));
    }

    #[test]
    fn test_shared_session() {
        let shared = session().into_shared();
        submit_shared(&shared, "z := 1").unwrap();
        let guard = shared.borrow_mut();
        assert!(submit_shared(&shared, "w := 2").is_err());
        drop(guard);
        assert_eq!(shared.borrow().type_of("z").as_deref(), Some("int"));
    }
}
