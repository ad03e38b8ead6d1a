use pretty_assertions::assert_eq;

use super::*;
use crate::constant::ConstValue;
use crate::env::ObjKind;
use crate::parser::parse_source;

struct NoImports;

impl Importer for NoImports {
    fn import(&mut self, _env: &mut Env, path: &str, _dir: &str, _depth: usize) -> Result<PkgId> {
        Err(GiltError::SourceImport {
            path: path.to_string(),
            cause: "no importer configured".to_string(),
        })
    }
}

/// A main package receiving prompt submissions
struct Prompt {
    env: Env,
    pkg: PkgId,
}

impl Prompt {
    fn new() -> Self {
        let mut env = Env::new();
        let pkg = env.new_package("main", "main");
        env.enable_repl_scope(pkg);
        Prompt { env, pkg }
    }

    fn submit(&mut self, source: &str) -> Result<Info> {
        let file = parse_source(source)?;
        let mut importer = NoImports;
        self.env.begin();
        let result = Checker::new(&mut self.env, &mut importer, CheckConfig::default(), self.pkg, 0, ".")
            .check_files(&[file]);
        match result {
            Ok(_) => self.env.commit(),
            Err(_) => self.env.rollback(),
        }
        result
    }

    fn ok(&mut self, source: &str) -> Info {
        match self.submit(source) {
            Ok(info) => info,
            Err(err) => panic!("{:?} rejected: {}", source, err),
        }
    }

    fn type_error(&mut self, source: &str) -> String {
        match self.submit(source) {
            Err(GiltError::TypeError { message, .. }) => message,
            other => panic!("expected a type error for {:?}, got {:?}", source, other),
        }
    }

    fn lookup(&self, name: &str) -> Option<ObjId> {
        let scope = self.env.package(self.pkg).repl_scope.unwrap();
        self.env.lookup(scope, name).map(|(_, obj)| obj)
    }

    fn type_of(&self, name: &str) -> String {
        let obj = self.lookup(name).unwrap();
        self.env.type_string(&self.env.obj(obj).typ)
    }
}

fn check_package(source: &str) -> Result<Info> {
    let file = parse_source(source)?;
    let mut env = Env::new();
    let pkg = env.new_package("p", "p");
    let mut importer = NoImports;
    let conf = CheckConfig {
        full_package: true,
        ..Default::default()
    };
    Checker::new(&mut env, &mut importer, conf, pkg, 1, ".").check_files(&[file])
}

fn package_error(source: &str) -> String {
    match check_package(source) {
        Err(GiltError::TypeError { message, .. }) => message,
        other => panic!("expected a type error, got {:?}", other),
    }
}

#[test]
fn test_short_var_decl_at_prompt() {
    let mut prompt = Prompt::new();
    prompt.ok("x := 1");
    assert_eq!(prompt.type_of("x"), "int");
    prompt.ok("y := x > 1");
    assert_eq!(prompt.type_of("y"), "bool");
}

#[test]
fn test_redefinition_across_submissions() {
    let mut prompt = Prompt::new();
    prompt.ok("x := 1");
    prompt.ok("x := \"now a string\"");
    assert_eq!(prompt.type_of("x"), "string");
}

#[test]
fn test_redeclared_within_one_submission() {
    let mut prompt = Prompt::new();
    let message = prompt.type_error("var x int\nvar x string");
    assert_eq!(message, "x redeclared in this block");
}

#[test]
fn test_type_redefinition_purges_old_record() {
    let mut prompt = Prompt::new();
    prompt.ok("type T struct { a int }");
    let first = prompt.lookup("T").unwrap();
    prompt.ok("type T struct { b string }");
    let second = prompt.lookup("T").unwrap();
    assert_ne!(first, second);
    assert!(prompt.env.decl(prompt.pkg, first).is_none());
    assert!(prompt.env.decl(prompt.pkg, second).is_some());
    prompt.ok("var v T\nv.b = \"x\"");
}

#[test]
fn test_failed_submission_rolls_back() {
    let mut prompt = Prompt::new();
    prompt.ok("a := 1");
    let message = prompt.type_error("z := 2\nvar w string = 1");
    assert!(message.contains("cannot use"), "{}", message);
    assert!(prompt.lookup("z").is_none());
    assert_eq!(prompt.type_of("a"), "int");
}

#[test]
fn test_untyped_constant_of_wrong_kind() {
    let mut prompt = Prompt::new();
    assert_eq!(
        prompt.type_error("var n int = \"s\""),
        "cannot use \"s\" (untyped string constant) as int value in variable declaration"
    );
    assert_eq!(
        prompt.type_error("var ok bool = 1"),
        "cannot use 1 (untyped int constant) as bool value in variable declaration"
    );
    prompt.ok("var f float64 = 1");
}

#[test]
fn test_single_variable_for_two_results() {
    let mut prompt = Prompt::new();
    prompt.ok("func two() (int, error) { return 1, nil }");
    assert_eq!(
        prompt.type_error("w := two()"),
        "assignment mismatch: 1 variable but two returns 2 values"
    );
    assert_eq!(
        prompt.type_error("var w = two()"),
        "assignment mismatch: 1 variable but two returns 2 values"
    );
    prompt.ok("n, err := two()");
    assert_eq!(prompt.type_of("n"), "int");
    assert_eq!(prompt.type_of("err"), "error");
}

#[test]
fn test_short_var_decl_reuses_variable_of_same_submission() {
    let mut prompt = Prompt::new();
    let info = prompt.ok("func two() (int, error) { return 1, nil }
a, err := two()
b, err := two()");
    let err = prompt.lookup("err").unwrap();
    assert_eq!(prompt.type_of("b"), "int");
    assert_eq!(prompt.type_of("err"), "error");

    let names: Vec<String> = info.new_code.iter().map(|def| prompt.env.obj(def.obj).name.clone()).collect();
    assert_eq!(names, vec!["two".to_string(), "a".to_string(), "err".to_string(), "b".to_string()]);
    assert!(info.new_code.iter().any(|def| def.obj == err));

    // the second initializer assigns to the first err
    let assigned: Vec<Vec<String>> = info
        .init_order
        .iter()
        .map(|init| init.lhs.iter().map(|obj| prompt.env.obj(*obj).name.clone()).collect())
        .collect();
    assert_eq!(
        assigned,
        vec![
            vec!["a".to_string(), "err".to_string()],
            vec!["b".to_string(), "err".to_string()]
        ]
    );
}

#[test]
fn test_short_var_decl_needs_a_new_variable() {
    let mut prompt = Prompt::new();
    assert_eq!(
        prompt.type_error("x := 1
x := 2"),
        "no new variables on left side of :="
    );
    assert_eq!(
        prompt.type_error("s := \"a\"\nt, s := 1, 2"),
        "cannot use 2 (untyped int constant) as string value in variable declaration"
    );
    prompt.ok("x := 1");
    prompt.ok("x := 2");
}

#[test]
fn test_undefined_name() {
    let mut prompt = Prompt::new();
    assert_eq!(prompt.type_error("q := nothere + 1"), "undefined: nothere");
}

#[test]
fn test_bare_expression_at_prompt() {
    let mut prompt = Prompt::new();
    prompt.ok("1 + 2");
}

#[test]
fn test_constant_value_recorded() {
    let mut prompt = Prompt::new();
    prompt.ok("const k = 1 << 10");
    let obj = prompt.lookup("k").unwrap();
    match &prompt.env.obj(obj).kind {
        ObjKind::Const(value) => assert_eq!(value, &ConstValue::Int(1024)),
        other => panic!("expected a constant, got {:?}", other),
    }
}

#[test]
fn test_methods_added_in_later_submission() {
    let mut prompt = Prompt::new();
    prompt.ok("type P struct{}\nfunc (p P) Name() string { return \"p\" }");
    prompt.ok("func (p P) Size() int { return 1 }");
    prompt.ok("var p P\nn := p.Name()\ns := p.Size()");
    assert_eq!(prompt.type_of("n"), "string");
    assert_eq!(prompt.type_of("s"), "int");
}

#[test]
fn test_init_order_follows_dependencies() {
    let mut prompt = Prompt::new();
    let info = prompt.ok("var a = b + 1\nvar b = 2");
    let order: Vec<String> = info
        .init_order
        .iter()
        .map(|init| prompt.env.obj(init.lhs[0]).name.clone())
        .collect();
    assert_eq!(order, vec!["b".to_string(), "a".to_string()]);
}

#[test]
fn test_mutual_dependency_rejected() {
    let mut prompt = Prompt::new();
    let message = prompt.type_error("var a = b\nvar b = a");
    assert!(message.starts_with("initialization cycle"), "{}", message);
}

#[test]
fn test_new_code_lists_submission_objects() {
    let mut prompt = Prompt::new();
    let info = prompt.ok("var u = 1\nfunc f() int { return u }");
    let names: Vec<String> = info.new_code.iter().map(|def| prompt.env.obj(def.obj).name.clone()).collect();
    assert_eq!(names, vec!["u".to_string(), "f".to_string()]);
    assert!(info.new_code.iter().all(|def| def.pkg_scope));
}

#[test]
fn test_unused_local_variable() {
    let message = package_error("package p\nfunc f() {\n\ty := 1\n}");
    assert_eq!(message, "y declared and not used");
}

#[test]
fn test_missing_return() {
    assert_eq!(package_error("package p\nfunc f() int {\n}"), "missing return");
}

#[test]
fn test_main_signature() {
    assert_eq!(
        package_error("package main\nfunc main(a int) {\n}"),
        "func main must have no arguments and no return values"
    );
    assert_eq!(
        package_error("package main\nfunc main() int {\n\treturn 1\n}"),
        "func main must have no arguments and no return values"
    );
    assert!(check_package("package p\nfunc main(a int) {\n}").is_ok());

    let mut prompt = Prompt::new();
    assert_eq!(
        prompt.type_error("func init() int { return 0 }"),
        "func init must have no arguments and no return values"
    );
    prompt.ok("func main() {}");
}

#[test]
fn test_statement_outside_function_in_package() {
    let message = package_error("package p\nx := 1");
    assert_eq!(message, "non-declaration statement outside function body");
}

#[test]
fn test_recursive_type() {
    let message = package_error("package p\ntype T struct { next T }");
    assert_eq!(message, "invalid recursive type T");
}

#[test]
fn test_mutual_recursion_is_legal() {
    let source = "package p\n\
                  func even(n int) bool { if n == 0 { return true }; return odd(n - 1) }\n\
                  func odd(n int) bool { if n == 0 { return false }; return even(n - 1) }";
    assert!(check_package(source).is_ok());
}

#[test]
fn test_package_complete_after_check() {
    let file = parse_source("package p\nconst C = 3").unwrap();
    let mut env = Env::new();
    let pkg = env.new_package("p", "p");
    let mut importer = NoImports;
    let conf = CheckConfig {
        full_package: true,
        ..Default::default()
    };
    Checker::new(&mut env, &mut importer, conf, pkg, 1, ".")
        .check_files(&[file])
        .unwrap();
    assert!(env.package(pkg).complete);
}

#[test]
fn test_failed_import_is_fatal() {
    let mut prompt = Prompt::new();
    match prompt.submit("import \"nowhere\"") {
        Err(err) => assert!(err.is_import_error()),
        Ok(_) => panic!("import of an unknown path succeeded"),
    }
}
