//! errors bridge

use crate::intrinsics::SigBuilder;
use crate::runtime::{NameTable, Value};
use crate::types::Type;

use super::arg_str;

pub fn declare(b: &mut SigBuilder<'_>) {
    let error = b.error();
    b.func("New", &[Type::string()], &[error.clone()]);
    b.func("Is", &[error.clone(), error.clone()], &[Type::bool()]);
    b.func("Unwrap", &[error.clone()], &[error]);
}

/// Initialize the errors bridge
pub fn init() -> NameTable {
    let mut module = NameTable::new();

    // New(text) -> error
    module.insert(
        "New".to_string(),
        Value::native("New", 1, |args| {
            let text = arg_str(args, 0, "New")?;
            Ok(Value::Error(text.to_string()))
        }),
    );

    // Is(err, target) -> bool
    module.insert(
        "Is".to_string(),
        Value::native("Is", 2, |args| Ok(Value::Bool(args[0] == args[1]))),
    );

    // bridged errors never wrap another
    module.insert(
        "Unwrap".to_string(),
        Value::native("Unwrap", 1, |_| Ok(Value::Nil)),
    );

    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_and_is() {
        let table = init();
        let err = table["New"].call(&[Value::String("boom".to_string())]).unwrap();
        assert_eq!(err, Value::Error("boom".to_string()));
        assert_eq!(table["Is"].call(&[err.clone(), err]).unwrap(), Value::Bool(true));
        assert_eq!(
            table["Is"].call(&[Value::Error("a".to_string()), Value::Nil]).unwrap(),
            Value::Bool(false)
        );
    }
}
