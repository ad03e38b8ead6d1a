//! os bridge - process arguments, environment and exit

use crate::error::GiltError;
use crate::intrinsics::SigBuilder;
use crate::runtime::{NameTable, Value};
use crate::types::Type;

use super::{arg_int, arg_str};

pub fn declare(b: &mut SigBuilder<'_>) {
    let string = Type::string();
    let error = b.error();

    b.var("Args", Type::slice(string.clone()));
    b.func("Exit", &[Type::int()], &[]);
    b.func("Getenv", &[string.clone()], &[string.clone()]);
    b.func("LookupEnv", &[string.clone()], &[string.clone(), Type::bool()]);
    b.func("Hostname", &[], &[string, error]);
    b.func("Getpid", &[], &[Type::int()]);
}

/// Initialize the os bridge
pub fn init() -> NameTable {
    let mut module = NameTable::new();

    module.insert(
        "Args".to_string(),
        Value::Array(std::env::args().map(Value::String).collect()),
    );

    // the session outlives the program, so Exit ends the running chunk
    module.insert(
        "Exit".to_string(),
        Value::native("Exit", 1, |args| {
            let code = arg_int(args, 0, "Exit")?;
            Err(GiltError::RuntimeError(format!("exit status {}", code)))
        }),
    );

    module.insert(
        "Getenv".to_string(),
        Value::native("Getenv", 1, |args| {
            let key = arg_str(args, 0, "Getenv")?;
            Ok(Value::String(std::env::var(key).unwrap_or_default()))
        }),
    );

    module.insert(
        "LookupEnv".to_string(),
        Value::native("LookupEnv", 1, |args| {
            let key = arg_str(args, 0, "LookupEnv")?;
            Ok(match std::env::var(key) {
                Ok(value) => Value::Tuple(vec![Value::String(value), Value::Bool(true)]),
                Err(_) => Value::Tuple(vec![Value::String(String::new()), Value::Bool(false)]),
            })
        }),
    );

    module.insert(
        "Hostname".to_string(),
        Value::native("Hostname", 0, |_| {
            let name = std::env::var("HOSTNAME")
                .ok()
                .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty());
            Ok(match name {
                Some(name) => Value::ok(Value::String(name)),
                None => Value::Tuple(vec![
                    Value::String(String::new()),
                    Value::Error("os: hostname unavailable".to_string()),
                ]),
            })
        }),
    );

    module.insert(
        "Getpid".to_string(),
        Value::native("Getpid", 0, |_| Ok(Value::Int(std::process::id() as i64))),
    );

    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_environment() {
        let table = init();
        let path = std::env::var("PATH").unwrap_or_default();
        assert_eq!(
            table["Getenv"].call(&[Value::String("PATH".to_string())]).unwrap(),
            Value::String(path)
        );
        assert_eq!(
            table["LookupEnv"]
                .call(&[Value::String("GILT_SURELY_UNSET_VARIABLE".to_string())])
                .unwrap(),
            Value::Tuple(vec![Value::String(String::new()), Value::Bool(false)])
        );
        assert!(matches!(&table["Args"], Value::Array(args) if !args.is_empty()));
    }

    #[test]
    fn test_exit_stops_the_chunk() {
        let table = init();
        let err = table["Exit"].call(&[Value::Int(3)]).unwrap_err();
        assert_eq!(err, GiltError::RuntimeError("exit status 3".to_string()));
    }
}
