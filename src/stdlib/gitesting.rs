//! gitesting bridge - a small stand-in for Go's testing.T
//!
//! Only importable in test mode. Every `*T` shares one failure count per
//! thread; `Fatalf` records a failure and stops the running test with a
//! runtime error. A few plain functions exercise array, variadic
//! and multi-parameter calls into natives.

use std::cell::Cell;

use crate::error::{GiltError, Result};
use crate::intrinsics::SigBuilder;
use crate::runtime::{NameTable, Value};
use crate::types::{BasicKind, StructType, Type};

use super::{arg_int, arg_str};
use super::fmt::sprintf;

thread_local! {
    static FAILURES: Cell<usize> = Cell::new(0);
}

fn record_failure() {
    FAILURES.with(|f| f.set(f.get() + 1));
}

pub fn declare(b: &mut SigBuilder<'_>) {
    let t = b.named("T", Type::Struct(std::rc::Rc::new(StructType::default())));
    let recv = Type::pointer(t);
    let any = Type::empty_interface();
    let string = Type::string();

    for name in ["Errorf", "Fatalf", "Logf"] {
        b.variadic_method(&recv, name, &[string.clone(), any.clone()], &[]);
    }
    b.method(&recv, "Fail", &[], &[]);
    b.method(&recv, "Failed", &[], &[Type::bool()]);
    b.method(&recv, "Name", &[], &[string]);

    let int = Type::int();
    let int64 = Type::Basic(BasicKind::Int64);
    b.func("SumArrayInt64", &[Type::Array(3, std::rc::Rc::new(int64.clone()))], &[int64]);
    b.func("Summer", &[int.clone(), int.clone()], &[int.clone()]);
    b.variadic("SummerAny", &[int.clone()], &[int.clone()]);
    b.func("Incr", &[int.clone()], &[int]);
}

/// Integer arguments, with a trailing slice or array spread in place
fn ints(args: &[Value], func: &str) -> Result<Vec<i64>> {
    let mut out = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        match arg {
            Value::Array(items) => out.extend(ints(items, func)?),
            _ => out.push(arg_int(args, i, func)?),
        }
    }
    Ok(out)
}

fn sum(args: &[Value], func: &str) -> Result<Value> {
    Ok(Value::Int(ints(args, func)?.into_iter().fold(0, i64::wrapping_add)))
}

/// Initialize the gitesting bridge
pub fn init() -> NameTable {
    let mut module = NameTable::new();

    // T.Errorf(format, args...); the receiver is the first argument
    module.insert(
        "T.Errorf".to_string(),
        Value::variadic("T.Errorf", 2, |args| {
            let format = arg_str(args, 1, "Errorf")?;
            eprintln!("    {}", sprintf(format, &args[2..]));
            record_failure();
            Ok(Value::Nil)
        }),
    );

    module.insert(
        "T.Fatalf".to_string(),
        Value::variadic("T.Fatalf", 2, |args| {
            let format = arg_str(args, 1, "Fatalf")?;
            record_failure();
            Err(GiltError::RuntimeError(sprintf(format, &args[2..])))
        }),
    );

    module.insert(
        "T.Logf".to_string(),
        Value::variadic("T.Logf", 2, |args| {
            let format = arg_str(args, 1, "Logf")?;
            println!("    {}", sprintf(format, &args[2..]));
            Ok(Value::Nil)
        }),
    );

    module.insert(
        "T.Fail".to_string(),
        Value::native("T.Fail", 1, |_| {
            record_failure();
            Ok(Value::Nil)
        }),
    );

    module.insert(
        "T.Failed".to_string(),
        Value::native("T.Failed", 1, |_| Ok(Value::Bool(FAILURES.with(Cell::get) > 0))),
    );

    module.insert(
        "T.Name".to_string(),
        Value::native("T.Name", 1, |_| Ok(Value::String("TestRepl".to_string()))),
    );

    module.insert(
        "SumArrayInt64".to_string(),
        Value::native("SumArrayInt64", 1, |args| sum(args, "SumArrayInt64")),
    );

    module.insert(
        "Summer".to_string(),
        Value::native("Summer", 2, |args| {
            Ok(Value::Int(arg_int(args, 0, "Summer")?.wrapping_add(arg_int(args, 1, "Summer")?)))
        }),
    );

    module.insert(
        "SummerAny".to_string(),
        Value::variadic("SummerAny", 0, |args| sum(args, "SummerAny")),
    );

    module.insert(
        "Incr".to_string(),
        Value::native("Incr", 1, |args| Ok(Value::Int(arg_int(args, 0, "Incr")?.wrapping_add(1)))),
    );

    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_failures_are_counted() {
        let table = init();
        let t = Value::Nil;
        assert_eq!(table["T.Failed"].call(&[t.clone()]).unwrap(), Value::Bool(false));
        table["T.Errorf"]
            .call(&[t.clone(), Value::String("got %d".to_string()), Value::Int(3)])
            .unwrap();
        assert_eq!(table["T.Failed"].call(&[t]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_summers() {
        let table = init();
        let three = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(table["SumArrayInt64"].call(&[three.clone()]).unwrap(), Value::Int(6));
        assert_eq!(table["Summer"].call(&[Value::Int(2), Value::Int(5)]).unwrap(), Value::Int(7));
        assert_eq!(table["SummerAny"].call(&[]).unwrap(), Value::Int(0));
        assert_eq!(table["SummerAny"].call(&[Value::Int(4), Value::Int(5)]).unwrap(), Value::Int(9));
        assert_eq!(table["SummerAny"].call(&[three]).unwrap(), Value::Int(6));
        assert_eq!(table["Incr"].call(&[Value::Int(41)]).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_fatalf_stops() {
        let table = init();
        let err = table["T.Fatalf"]
            .call(&[Value::Nil, Value::String("want %s".to_string()), Value::String("x".to_string())])
            .unwrap_err();
        assert_eq!(err, GiltError::RuntimeError("want x".to_string()));
    }
}
