//! math/rand bridge - pseudo-random numbers

use std::cell::RefCell;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::GiltError;
use crate::intrinsics::SigBuilder;
use crate::runtime::{NameTable, Value};
use crate::types::{BasicKind, Type};

use super::arg_int;

thread_local! {
    /// The package-level source; replaced by Seed
    static SOURCE: RefCell<StdRng> = RefCell::new(StdRng::from_entropy());
}

fn with_source<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    SOURCE.with(|source| f(&mut source.borrow_mut()))
}

pub fn declare(b: &mut SigBuilder<'_>) {
    let int = Type::int();
    let int64 = Type::Basic(BasicKind::Int64);

    b.func("Seed", &[int64.clone()], &[]);
    b.func("Int", &[], &[int.clone()]);
    b.func("Intn", &[int.clone()], &[int.clone()]);
    b.func("Int63", &[], &[int64.clone()]);
    b.func("Int63n", &[int64.clone()], &[int64]);
    b.func("Float64", &[], &[Type::float64()]);
    b.func("Perm", &[int.clone()], &[Type::slice(int)]);
}

/// Initialize the math/rand bridge
pub fn init() -> NameTable {
    let mut module = NameTable::new();

    module.insert(
        "Seed".to_string(),
        Value::native("Seed", 1, |args| {
            let seed = arg_int(args, 0, "Seed")?;
            with_source(|source| *source = StdRng::seed_from_u64(seed as u64));
            Ok(Value::Nil)
        }),
    );

    module.insert(
        "Int".to_string(),
        Value::native("Int", 0, |_| Ok(Value::Int(with_source(|r| r.gen_range(0..=i64::MAX))))),
    );

    module.insert(
        "Int63".to_string(),
        Value::native("Int63", 0, |_| Ok(Value::Int(with_source(|r| r.gen_range(0..=i64::MAX))))),
    );

    // Intn(n) -> [0, n); panics in Go for n <= 0
    module.insert(
        "Intn".to_string(),
        Value::native("Intn", 1, |args| {
            let n = arg_int(args, 0, "Intn")?;
            if n <= 0 {
                return Err(GiltError::RuntimeError("invalid argument to Intn".to_string()));
            }
            Ok(Value::Int(with_source(|r| r.gen_range(0..n))))
        }),
    );

    module.insert(
        "Int63n".to_string(),
        Value::native("Int63n", 1, |args| {
            let n = arg_int(args, 0, "Int63n")?;
            if n <= 0 {
                return Err(GiltError::RuntimeError("invalid argument to Int63n".to_string()));
            }
            Ok(Value::Int(with_source(|r| r.gen_range(0..n))))
        }),
    );

    module.insert(
        "Float64".to_string(),
        Value::native("Float64", 0, |_| Ok(Value::Float(with_source(|r| r.gen::<f64>())))),
    );

    module.insert(
        "Perm".to_string(),
        Value::native("Perm", 1, |args| {
            let n = arg_int(args, 0, "Perm")?;
            if n < 0 {
                return Err(GiltError::RuntimeError("invalid argument to Perm".to_string()));
            }
            let mut perm: Vec<i64> = (0..n).collect();
            with_source(|r| perm.shuffle(r));
            Ok(Value::Array(perm.into_iter().map(Value::Int).collect()))
        }),
    );

    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_intn_in_range() {
        let table = init();
        for _ in 0..100 {
            let v = table["Intn"].call(&[Value::Int(10)]).unwrap().as_i64().unwrap();
            assert!((0..10).contains(&v));
        }
        assert!(table["Intn"].call(&[Value::Int(0)]).is_err());
    }

    #[test]
    fn test_seed_is_deterministic() {
        let table = init();
        table["Seed"].call(&[Value::Int(42)]).unwrap();
        let first = table["Int63"].call(&[]).unwrap();
        table["Seed"].call(&[Value::Int(42)]).unwrap();
        let second = table["Int63"].call(&[]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_perm_is_permutation() {
        let table = init();
        let Value::Array(items) = table["Perm"].call(&[Value::Int(5)]).unwrap() else {
            panic!("Perm did not return a slice");
        };
        let mut values: Vec<i64> = items.iter().filter_map(Value::as_i64).collect();
        values.sort();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }
}
