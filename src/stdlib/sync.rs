//! sync bridge - Mutex and WaitGroup
//!
//! Prompt code runs on one thread, so a `Mutex` only tracks whether it is
//! held and a `WaitGroup` counts outstanding `Done` calls. Every value of
//! a type shares that state per thread.

use std::cell::Cell;

use crate::error::{GiltError, Result};
use crate::intrinsics::SigBuilder;
use crate::runtime::{NameTable, Value};
use crate::types::{StructType, Type};

use super::arg_int;

thread_local! {
    static LOCKED: Cell<bool> = Cell::new(false);
    static WAITING: Cell<i64> = Cell::new(0);
}

pub fn declare(b: &mut SigBuilder<'_>) {
    let mutex = b.named("Mutex", Type::Struct(std::rc::Rc::new(StructType::default())));
    let mutex = Type::pointer(mutex);
    b.method(&mutex, "Lock", &[], &[]);
    b.method(&mutex, "Unlock", &[], &[]);
    b.method(&mutex, "TryLock", &[], &[Type::bool()]);

    let group = b.named("WaitGroup", Type::Struct(std::rc::Rc::new(StructType::default())));
    let group = Type::pointer(group);
    b.method(&group, "Add", &[Type::int()], &[]);
    b.method(&group, "Done", &[], &[]);
    b.method(&group, "Wait", &[], &[]);
}

fn add(delta: i64) -> Result<Value> {
    let count = WAITING.with(|w| w.get()) + delta;
    if count < 0 {
        return Err(GiltError::RuntimeError("sync: negative WaitGroup counter".to_string()));
    }
    WAITING.with(|w| w.set(count));
    Ok(Value::Nil)
}

/// Initialize the sync bridge
pub fn init() -> NameTable {
    let mut module = NameTable::new();

    // nothing else can release the lock, so a second Lock never returns
    module.insert(
        "Mutex.Lock".to_string(),
        Value::native("Mutex.Lock", 1, |_| {
            if LOCKED.with(|l| l.replace(true)) {
                return Err(GiltError::RuntimeError(
                    "fatal error: all goroutines are asleep - deadlock!".to_string(),
                ));
            }
            Ok(Value::Nil)
        }),
    );

    module.insert(
        "Mutex.Unlock".to_string(),
        Value::native("Mutex.Unlock", 1, |_| {
            if !LOCKED.with(|l| l.replace(false)) {
                return Err(GiltError::RuntimeError("sync: unlock of unlocked mutex".to_string()));
            }
            Ok(Value::Nil)
        }),
    );

    module.insert(
        "Mutex.TryLock".to_string(),
        Value::native("Mutex.TryLock", 1, |_| Ok(Value::Bool(!LOCKED.with(|l| l.replace(true))))),
    );

    module.insert(
        "WaitGroup.Add".to_string(),
        Value::native("WaitGroup.Add", 2, |args| add(arg_int(args, 1, "Add")?)),
    );

    module.insert(
        "WaitGroup.Done".to_string(),
        Value::native("WaitGroup.Done", 1, |_| add(-1)),
    );

    module.insert(
        "WaitGroup.Wait".to_string(),
        Value::native("WaitGroup.Wait", 1, |_| {
            if WAITING.with(Cell::get) > 0 {
                return Err(GiltError::RuntimeError(
                    "fatal error: all goroutines are asleep - deadlock!".to_string(),
                ));
            }
            Ok(Value::Nil)
        }),
    );

    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mutex() {
        let table = init();
        let m = Value::Nil;
        table["Mutex.Lock"].call(&[m.clone()]).unwrap();
        assert_eq!(table["Mutex.TryLock"].call(&[m.clone()]).unwrap(), Value::Bool(false));
        assert!(table["Mutex.Lock"].call(&[m.clone()]).is_err());
        table["Mutex.Unlock"].call(&[m.clone()]).unwrap();
        let err = table["Mutex.Unlock"].call(&[m]).unwrap_err();
        assert_eq!(err, GiltError::RuntimeError("sync: unlock of unlocked mutex".to_string()));
    }

    #[test]
    fn test_wait_group() {
        let table = init();
        let wg = Value::Nil;
        table["WaitGroup.Add"].call(&[wg.clone(), Value::Int(2)]).unwrap();
        table["WaitGroup.Done"].call(&[wg.clone()]).unwrap();
        assert!(table["WaitGroup.Wait"].call(&[wg.clone()]).is_err());
        table["WaitGroup.Done"].call(&[wg.clone()]).unwrap();
        table["WaitGroup.Wait"].call(&[wg.clone()]).unwrap();
        let err = table["WaitGroup.Done"].call(&[wg]).unwrap_err();
        assert_eq!(err, GiltError::RuntimeError("sync: negative WaitGroup counter".to_string()));
    }
}
