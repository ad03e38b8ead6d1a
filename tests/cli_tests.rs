//! Integration tests for the gilt CLI commands: check, compile, parse, lex

use std::fs;
use std::path::PathBuf;
use std::process::Command;

/// Runs the gilt binary and captures its output
fn run_gilt(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_gilt"))
        .args(args)
        .env_remove("GILT_CONFIG")
        .env_remove("GILT_LOG")
        .output()
        .expect("Failed to execute gilt");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn write_file(name: &str, text: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gilt-cli-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

const HELLO: &str = r#"package main

import "fmt"

var greeting = "hello"

func main() {
	fmt.Println(greeting)
}
"#;

// ============================================================================
// gilt check
// ============================================================================

#[test]
fn test_check_valid_file() {
    let path = write_file("hello.go", HELLO);
    let (stdout, stderr, code) = run_gilt(&["check", path.to_str().unwrap()]);
    assert_eq!(code, 0, "check should succeed: {}", stderr);
    assert!(stdout.contains("No errors found"));
}

#[test]
fn test_check_type_error() {
    let path = write_file("bad.go", "package main\n\nvar x int = \"s\"\n");
    let (_, stderr, code) = run_gilt(&["check", path.to_str().unwrap()]);
    assert_ne!(code, 0);
    assert!(stderr.contains("cannot use"), "{}", stderr);
}

#[test]
fn test_check_nonexistent_file() {
    let (_, _, code) = run_gilt(&["check", "/nonexistent/gilt/file.go"]);
    assert_ne!(code, 0, "check should fail for nonexistent file");
}

// ============================================================================
// gilt compile
// ============================================================================

#[test]
fn test_compile_prints_runtime_text() {
    let path = write_file("compile.go", HELLO);
    let (stdout, stderr, code) = run_gilt(&["compile", path.to_str().unwrap()]);
    assert_eq!(code, 0, "compile should succeed: {}", stderr);
    assert!(stdout.contains("fmt = __bridge[\"fmt\"]"), "{}", stdout);
    assert!(stdout.contains("function main.main()"), "{}", stdout);
    assert!(stdout.contains("main.greeting = \"hello\""), "{}", stdout);
}

// ============================================================================
// gilt parse / lex
// ============================================================================

#[test]
fn test_parse_json() {
    let path = write_file("parse.go", HELLO);
    let (stdout, _, code) = run_gilt(&["parse", path.to_str().unwrap(), "--json"]);
    assert_eq!(code, 0);

    let json: serde_json::Value = serde_json::from_str(&stdout).expect("parse --json should output valid JSON");
    assert_eq!(json["package"]["name"], "main");
    assert_eq!(json["imports"][0]["path"], "fmt");
}

#[test]
fn test_parse_syntax_error() {
    let path = write_file("syntax.go", "package main\n\nfunc {\n");
    let (_, stderr, code) = run_gilt(&["parse", path.to_str().unwrap()]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Parser error"), "{}", stderr);
}

#[test]
fn test_lex() {
    let path = write_file("lex.go", "x := 1\n");
    let (stdout, _, code) = run_gilt(&["lex", path.to_str().unwrap()]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Token"));
}
