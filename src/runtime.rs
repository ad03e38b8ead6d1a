//! The embedded runtime collaborator
//!
//! Checked programs are handed to a [`Runtime`] as program text. Bridge
//! packages additionally register tables of native functions that the
//! program text calls by name.

use std::collections::HashMap;
use std::fmt;

use crate::error::{GiltError, Result};

/// A runtime value crossing the native bridge
#[derive(Debug, Clone)]
pub enum Value {
    /// Lua `nil`; also a Go `nil` error
    Nil,

    /// Integer value
    Int(i64),

    /// Float value
    Float(f64),

    /// Boolean value
    Bool(bool),

    /// String value
    String(String),

    /// Slice value
    Array(Vec<Value>),

    /// The results of a call returning more than one value
    Tuple(Vec<Value>),

    /// A non-nil Go `error`
    Error(String),

    /// Native/built-in function
    NativeFunction {
        name: String,
        arity: usize,
        /// Accepts any number of arguments past `arity`
        variadic: bool,
        func: fn(&[Value]) -> Result<Value>,
    },
}

/// Native functions and values of one bridge package, by name
pub type NameTable = HashMap<String, Value>;

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::NativeFunction { name: a, .. }, Value::NativeFunction { name: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &str {
        match self {
            Value::Nil => "nil",
            Value::Int(_) => "int",
            Value::Float(_) => "float64",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Array(_) => "slice",
            Value::Tuple(_) => "tuple",
            Value::Error(_) => "error",
            Value::NativeFunction { .. } => "func",
        }
    }

    /// A native function entry for a name table
    pub fn native(name: &str, arity: usize, func: fn(&[Value]) -> Result<Value>) -> Value {
        Value::NativeFunction {
            name: name.to_string(),
            arity,
            variadic: false,
            func,
        }
    }

    /// A native function taking `arity` or more arguments
    pub fn variadic(name: &str, arity: usize, func: fn(&[Value]) -> Result<Value>) -> Value {
        Value::NativeFunction {
            name: name.to_string(),
            arity,
            variadic: true,
            func,
        }
    }

    /// `(value, nil)` or `(nil, err)`, the shape of Go's fallible calls
    pub fn ok(value: Value) -> Value {
        Value::Tuple(vec![value, Value::Nil])
    }

    pub fn fail(message: impl Into<String>) -> Value {
        Value::Tuple(vec![Value::Nil, Value::Error(message.into())])
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Invokes a native function value
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        match self {
            Value::NativeFunction {
                name,
                arity,
                variadic,
                func,
            } => {
                let accepted = if *variadic {
                    args.len() >= *arity
                } else {
                    args.len() == *arity
                };
                if !accepted {
                    return Err(GiltError::RuntimeError(format!(
                        "{}() expects {}{} arguments, got {}",
                        name,
                        if *variadic { "at least " } else { "" },
                        arity,
                        args.len()
                    )));
                }
                func(args)
            }
            other => Err(GiltError::RuntimeError(format!(
                "cannot call a {} value",
                other.type_name()
            ))),
        }
    }
}

/// Formats like Go's `%v`
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "<nil>"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.abs() < 1e21 {
                    write!(f, "{}", *x as i64)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::Bool(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Tuple(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Error(message) => write!(f, "{}", message),
            Value::NativeFunction { name, .. } => write!(f, "<native fn {}>", name),
        }
    }
}

/// The scripting runtime that executes translated programs
pub trait Runtime {
    /// Makes the natives of `table` reachable as `name.<entry>`
    fn register(&mut self, name: &str, table: NameTable) -> Result<()>;

    /// Runs a chunk of program text
    fn exec(&mut self, text: &str) -> Result<()>;

    /// Calls `table.name(args...)`
    fn call(&mut self, table: &str, name: &str, args: &[Value]) -> Result<Value>;
}

/// In-process runtime that keeps every executed chunk and answers native
/// calls from its registered tables
#[derive(Debug, Default)]
pub struct RecordingRuntime {
    tables: HashMap<String, NameTable>,
    executed: Vec<String>,
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every chunk run so far, oldest first
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// How many times exactly this chunk was run
    pub fn exec_count(&self, text: &str) -> usize {
        self.executed.iter().filter(|chunk| chunk.as_str() == text).count()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }
}

impl Runtime for RecordingRuntime {
    fn register(&mut self, name: &str, table: NameTable) -> Result<()> {
        tracing::trace!(table = %name, entries = table.len(), "registered native table");
        self.tables.insert(name.to_string(), table);
        Ok(())
    }

    fn exec(&mut self, text: &str) -> Result<()> {
        tracing::trace!(bytes = text.len(), "exec");
        self.executed.push(text.to_string());
        Ok(())
    }

    fn call(&mut self, table: &str, name: &str, args: &[Value]) -> Result<Value> {
        let entry = self
            .tables
            .get(table)
            .and_then(|t| t.get(name))
            .ok_or_else(|| GiltError::RuntimeError(format!("undefined: {}.{}", table, name)))?;
        entry.call(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn double(args: &[Value]) -> Result<Value> {
        match &args[0] {
            Value::Int(i) => Ok(Value::Int(i * 2)),
            other => Err(GiltError::RuntimeError(format!("not a number: {}", other))),
        }
    }

    #[test]
    fn test_call_registered_native() {
        let mut runtime = RecordingRuntime::new();
        let mut table = NameTable::new();
        table.insert("double".to_string(), Value::native("double", 1, double));
        runtime.register("demo", table).unwrap();

        assert!(runtime.is_registered("demo"));
        assert_eq!(runtime.call("demo", "double", &[Value::Int(21)]).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_arity_is_checked() {
        let mut runtime = RecordingRuntime::new();
        let mut table = NameTable::new();
        table.insert("double".to_string(), Value::native("double", 1, double));
        runtime.register("demo", table).unwrap();

        let err = runtime.call("demo", "double", &[]).unwrap_err();
        assert_eq!(err.to_string(), "Runtime error: double() expects 1 arguments, got 0");
    }

    #[test]
    fn test_unknown_native() {
        let mut runtime = RecordingRuntime::new();
        assert!(runtime.call("nowhere", "f", &[]).is_err());
    }

    #[test]
    fn test_exec_is_recorded() {
        let mut runtime = RecordingRuntime::new();
        runtime.exec("x = 1").unwrap();
        runtime.exec("x = 1").unwrap();
        assert_eq!(runtime.exec_count("x = 1"), 2);
        assert_eq!(runtime.executed().len(), 2);
    }

    #[test]
    fn test_display_matches_go_verbs() {
        assert_eq!(Value::Float(7.0).to_string(), "7");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Array(vec![Value::Int(1), Value::Int(2)]).to_string(), "[1 2]");
        assert_eq!(Value::Nil.to_string(), "<nil>");
    }
}
