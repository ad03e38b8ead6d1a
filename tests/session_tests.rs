//! End-to-end tests of prompt submissions through a session

use std::fs;
use std::path::{Path, PathBuf};

use gilt::config::Config;
use gilt::runtime::Value;
use gilt::{GiltError, Session};
use pretty_assertions::assert_eq;

/// A fresh scratch directory under the system temp dir
fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gilt-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_package(root: &Path, path: &str, text: &str) {
    let dir = root.join(path);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{}.go", path)), text).unwrap();
}

fn session_with_root(root: &Path) -> Session {
    let config = Config {
        source_roots: vec![root.to_path_buf()],
        ..Config::default()
    };
    Session::new(config).unwrap()
}

fn pole(factor: u32) -> String {
    format!(
        "package pole\n\nfunc Pole(numPole int) int {{\n\treturn numPole * {}\n}}\n",
        factor
    )
}

fn type_error(session: &mut Session, source: &str) -> String {
    match session.submit(source) {
        Err(GiltError::TypeError { message, .. }) => message,
        other => panic!("expected a type error for {:?}, got {:?}", source, other.map(|o| o.text)),
    }
}

// ============================================================================
// Redefinition
// ============================================================================

#[test]
fn test_type_redefinition_replaces_methods() {
    let mut session = Session::new(Config::default()).unwrap();
    session.submit("type T struct{ a int }").unwrap();
    session.submit("func (t T) A() int { return t.a }").unwrap();
    let old = session.env().lookup(session.env().package(session.main_package()).repl_scope.unwrap(), "T").unwrap().1;

    session.submit("type T struct{ b string }").unwrap();
    session.submit("func (t T) B() string { return t.b }").unwrap();
    let new = session.env().lookup(session.env().package(session.main_package()).repl_scope.unwrap(), "T").unwrap().1;

    assert_ne!(old, new);
    assert!(session.env().decl(session.main_package(), old).is_none());
    session.submit("var x T\ns := x.B()").unwrap();
    assert_eq!(session.type_of("s").as_deref(), Some("string"));

    let message = type_error(&mut session, "n := x.A()");
    assert_eq!(message, "x.A undefined (type T has no field or method A)");
}

// ============================================================================
// Import cache
// ============================================================================

#[test]
fn test_bridge_import_cached() {
    let mut session = Session::new(Config::default()).unwrap();
    session.submit("import \"strings\"\na := strings.ToUpper(\"x\")").unwrap();
    session.submit("import \"strings\"\nb := strings.Repeat(a, 2)").unwrap();

    let stats = session.cache_stats();
    assert_eq!((stats.hits, stats.misses, stats.archives), (1, 1, 1));
    assert_eq!(session.type_of("b").as_deref(), Some("string"));
}

#[test]
fn test_source_import_reread_after_rewrite() {
    let root = scratch("reread");
    write_package(&root, "pole", &pole(2));
    let mut session = session_with_root(&root);

    let first = session.submit("import \"pole\"\nr := pole.Pole(5)").unwrap();
    assert_eq!(session.type_of("r").as_deref(), Some("int"));
    assert!(first.info.imports.iter().any(|(path, _)| path == "pole"));

    write_package(&root, "pole", &pole(3));
    session.submit("import \"pole\"\nr := pole.Pole(5)").unwrap();

    let executed = session.runtime().executed();
    let doubled = executed.iter().position(|t| t.contains("return numPole * 2")).unwrap();
    let tripled = executed.iter().position(|t| t.contains("return numPole * 3")).unwrap();
    assert!(doubled < tripled);
    assert_eq!(session.runtime().exec_count("pole.__init();"), 2);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn test_depth_ceiling() {
    let root = scratch("depth");
    for i in 1..=9 {
        let name = format!("p{}", i);
        let text = if i < 9 {
            format!("package {name}\n\nimport \"p{next}\"\n\nvar V = p{next}.V + 1\n", name = name, next = i + 1)
        } else {
            "package p9\n\nvar V = 1\n".to_string()
        };
        write_package(&root, &name, &text);
    }
    let mut session = session_with_root(&root);

    let err = session.submit("import \"p1\"\nv := p1.V").unwrap_err();
    assert_eq!(
        err,
        GiltError::DeepImport {
            path: "p9".to_string(),
            depth: 9,
            limit: 7,
        }
    );
    assert!(err.to_string().starts_with("deep source imports forbidden"));
    assert_eq!(session.type_of("v"), None);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn test_missing_package_reports_remediation() {
    let root = scratch("missing");
    let mut session = session_with_root(&root);
    let err = session.submit("import \"nowhere\"\nx := nowhere.X").unwrap_err();
    assert!(err.is_import_error());
    assert!(err.to_string().contains("problem with package 'nowhere'"), "{}", err);
    fs::remove_dir_all(&root).ok();
}

#[test]
fn test_dot_import_runs_init_once() {
    let root = scratch("dot");
    write_package(&root, "pole", &pole(2));
    let mut session = session_with_root(&root);

    session.submit("import . \"pole\"\na := Pole(1)").unwrap();
    session.submit("import . \"pole\"\nb := Pole(2)").unwrap();

    assert_eq!(session.type_of("b").as_deref(), Some("int"));
    assert_eq!(session.runtime().exec_count("pole.__init();"), 1);
    fs::remove_dir_all(&root).ok();
}

// ============================================================================
// Intrinsics
// ============================================================================

#[test]
fn test_lua_intrinsic() {
    let mut session = Session::new(Config::default()).unwrap();
    session.submit("v, err := __lua(\"3 + 4\")").unwrap();
    assert_eq!(session.type_of("v").as_deref(), Some("interface{}"));
    assert_eq!(session.type_of("err").as_deref(), Some("error"));

    let message = type_error(&mut session, "w := __lua(\"1\")");
    assert_eq!(message, "assignment mismatch: 1 variable but __lua returns 2 values");

    // err is assigned again, not redeclared
    session
        .submit("a, err := __lua(\"1\")\nb, err := __lua(\"2\")")
        .unwrap();
    assert_eq!(session.type_of("b").as_deref(), Some("interface{}"));
    assert_eq!(session.type_of("err").as_deref(), Some("error"));

    let result = session
        .call("main", "__lua", &[Value::String("3 + 4".to_string())])
        .unwrap();
    assert_eq!(result, Value::Tuple(vec![Value::Int(7), Value::Nil]));
}

#[test]
fn test_test_only_bridge_needs_test_mode() {
    let mut plain = Session::new(Config::default()).unwrap();
    assert!(plain.submit("import \"gitesting\"\nvar t gitesting.T").is_err());

    let config = Config {
        test_mode: true,
        ..Config::default()
    };
    let mut testing = Session::new(config).unwrap();
    testing
        .submit("import \"gitesting\"\nvar t = &gitesting.T{}\nfailed := t.Failed()")
        .unwrap();
    assert_eq!(testing.type_of("failed").as_deref(), Some("bool"));
}

#[test]
fn test_os_and_sync_bridges() {
    let mut session = Session::new(Config::default()).unwrap();
    session
        .submit(
            "import (\n\t\"os\"\n\t\"sync\"\n)\n\
             home := os.Getenv(\"HOME\")\n\
             n := len(os.Args)\n\
             var mu sync.Mutex\n\
             var wg sync.WaitGroup\n\
             wg.Add(1)\n\
             mu.Lock()\n\
             mu.Unlock()\n\
             wg.Done()\n\
             wg.Wait()",
        )
        .unwrap();
    assert_eq!(session.type_of("home").as_deref(), Some("string"));
    assert_eq!(session.type_of("n").as_deref(), Some("int"));
    assert_eq!(session.type_of("mu").as_deref(), Some("sync.Mutex"));

    let msg = type_error(&mut session, "os.Exit(\"now\")");
    assert!(msg.starts_with("cannot use"), "{}", msg);
}

#[test]
fn test_gitesting_functions_type_check() {
    let config = Config {
        test_mode: true,
        ..Config::default()
    };
    let mut session = Session::new(config).unwrap();
    session
        .submit(
            "import \"gitesting\"\n\
             tot := gitesting.SumArrayInt64([3]int64{1, 2, 3})\n\
             s := gitesting.Summer(1, 2)\n\
             many := gitesting.SummerAny(1, 2, 3)\n\
             none := gitesting.SummerAny()\n\
             spread := gitesting.SummerAny([]int{4, 5}...)\n\
             up := gitesting.Incr(s)",
        )
        .unwrap();
    assert_eq!(session.type_of("tot").as_deref(), Some("int64"));
    for name in ["s", "many", "none", "spread", "up"] {
        assert_eq!(session.type_of(name).as_deref(), Some("int"), "{}", name);
    }

    let msg = type_error(&mut session, "x := gitesting.SumArrayInt64([2]int64{1, 2})");
    assert!(msg.starts_with("cannot use"), "{}", msg);
    let msg = type_error(&mut session, "y := gitesting.Summer(1)");
    assert!(msg.contains("not enough arguments"), "{}", msg);
    assert_eq!(session.call("gitesting", "Summer", &[Value::Int(2), Value::Int(3)]).unwrap(), Value::Int(5));
}

// ============================================================================
// Initialization order
// ============================================================================

#[test]
fn test_initializer_order() {
    let mut session = Session::new(Config::default()).unwrap();
    let outcome = session.submit("var a = b + 1\nvar b = 2").unwrap();
    let order: Vec<String> = outcome
        .info
        .init_order
        .iter()
        .map(|init| session.env().obj(init.lhs[0]).name.clone())
        .collect();
    assert_eq!(order, vec!["b".to_string(), "a".to_string()]);

    let message = type_error(&mut session, "var c = d\nvar d = c");
    assert!(message.starts_with("initialization cycle"), "{}", message);
}
