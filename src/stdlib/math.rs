//! math bridge - Mathematical functions and constants

use std::f64::consts;

use crate::constant::ConstValue;
use crate::error::{GiltError, Result};
use crate::intrinsics::SigBuilder;
use crate::runtime::{NameTable, Value};
use crate::types::{BasicKind, Type};

use super::{arg_f64, arg_int};

/// One-argument float functions
const UNARY: &[(&str, fn(f64) -> f64)] = &[
    ("Abs", f64::abs),
    ("Sqrt", f64::sqrt),
    ("Cbrt", f64::cbrt),
    ("Floor", f64::floor),
    ("Ceil", f64::ceil),
    ("Trunc", f64::trunc),
    ("Round", f64::round),
    ("Sin", f64::sin),
    ("Cos", f64::cos),
    ("Tan", f64::tan),
    ("Asin", f64::asin),
    ("Acos", f64::acos),
    ("Atan", f64::atan),
    ("Exp", f64::exp),
    ("Log", f64::ln),
    ("Log2", f64::log2),
    ("Log10", f64::log10),
];

pub fn declare(b: &mut SigBuilder<'_>) {
    let float = Type::float64();
    let untyped_float = Type::Basic(BasicKind::UntypedFloat);
    let untyped_int = Type::Basic(BasicKind::UntypedInt);

    b.constant("Pi", ConstValue::Float(consts::PI), untyped_float.clone());
    b.constant("E", ConstValue::Float(consts::E), untyped_float.clone());
    b.constant("Sqrt2", ConstValue::Float(consts::SQRT_2), untyped_float.clone());
    b.constant("Ln2", ConstValue::Float(consts::LN_2), untyped_float.clone());
    b.constant("MaxFloat64", ConstValue::Float(f64::MAX), untyped_float);
    b.constant("MaxInt64", ConstValue::Int(i64::MAX as i128), untyped_int.clone());
    b.constant("MinInt64", ConstValue::Int(i64::MIN as i128), untyped_int.clone());
    b.constant("MaxInt32", ConstValue::Int(i32::MAX as i128), untyped_int.clone());
    b.constant("MinInt32", ConstValue::Int(i32::MIN as i128), untyped_int);

    for (name, _) in UNARY {
        b.func(name, &[float.clone()], &[float.clone()]);
    }
    for name in ["Pow", "Max", "Min", "Mod", "Atan2", "Hypot"] {
        b.func(name, &[float.clone(), float.clone()], &[float.clone()]);
    }
    b.func("Inf", &[Type::int()], &[float.clone()]);
    b.func("NaN", &[], &[float.clone()]);
    b.func("IsNaN", &[float.clone()], &[Type::bool()]);
    b.func("IsInf", &[float, Type::int()], &[Type::bool()]);
}

/// Initialize the math bridge
pub fn init() -> NameTable {
    let mut module = NameTable::new();

    // natives are plain fn pointers, so each unary entry looks itself up by name
    module.insert("Abs".to_string(), Value::native("Abs", 1, |args| unary(args, "Abs")));
    module.insert("Sqrt".to_string(), Value::native("Sqrt", 1, |args| unary(args, "Sqrt")));
    module.insert("Cbrt".to_string(), Value::native("Cbrt", 1, |args| unary(args, "Cbrt")));
    module.insert("Floor".to_string(), Value::native("Floor", 1, |args| unary(args, "Floor")));
    module.insert("Ceil".to_string(), Value::native("Ceil", 1, |args| unary(args, "Ceil")));
    module.insert("Trunc".to_string(), Value::native("Trunc", 1, |args| unary(args, "Trunc")));
    module.insert("Round".to_string(), Value::native("Round", 1, |args| unary(args, "Round")));
    module.insert("Sin".to_string(), Value::native("Sin", 1, |args| unary(args, "Sin")));
    module.insert("Cos".to_string(), Value::native("Cos", 1, |args| unary(args, "Cos")));
    module.insert("Tan".to_string(), Value::native("Tan", 1, |args| unary(args, "Tan")));
    module.insert("Asin".to_string(), Value::native("Asin", 1, |args| unary(args, "Asin")));
    module.insert("Acos".to_string(), Value::native("Acos", 1, |args| unary(args, "Acos")));
    module.insert("Atan".to_string(), Value::native("Atan", 1, |args| unary(args, "Atan")));
    module.insert("Exp".to_string(), Value::native("Exp", 1, |args| unary(args, "Exp")));
    module.insert("Log".to_string(), Value::native("Log", 1, |args| unary(args, "Log")));
    module.insert("Log2".to_string(), Value::native("Log2", 1, |args| unary(args, "Log2")));
    module.insert("Log10".to_string(), Value::native("Log10", 1, |args| unary(args, "Log10")));

    // Pow(x, y) -> float64
    module.insert(
        "Pow".to_string(),
        Value::native("Pow", 2, |args| {
            Ok(Value::Float(arg_f64(args, 0, "Pow")?.powf(arg_f64(args, 1, "Pow")?)))
        }),
    );

    module.insert(
        "Max".to_string(),
        Value::native("Max", 2, |args| {
            let (x, y) = (arg_f64(args, 0, "Max")?, arg_f64(args, 1, "Max")?);
            Ok(Value::Float(if x.is_nan() || y.is_nan() { f64::NAN } else { x.max(y) }))
        }),
    );

    module.insert(
        "Min".to_string(),
        Value::native("Min", 2, |args| {
            let (x, y) = (arg_f64(args, 0, "Min")?, arg_f64(args, 1, "Min")?);
            Ok(Value::Float(if x.is_nan() || y.is_nan() { f64::NAN } else { x.min(y) }))
        }),
    );

    // Mod has the sign of x, like Rust's %
    module.insert(
        "Mod".to_string(),
        Value::native("Mod", 2, |args| {
            Ok(Value::Float(arg_f64(args, 0, "Mod")? % arg_f64(args, 1, "Mod")?))
        }),
    );

    module.insert(
        "Atan2".to_string(),
        Value::native("Atan2", 2, |args| {
            Ok(Value::Float(arg_f64(args, 0, "Atan2")?.atan2(arg_f64(args, 1, "Atan2")?)))
        }),
    );

    module.insert(
        "Hypot".to_string(),
        Value::native("Hypot", 2, |args| {
            Ok(Value::Float(arg_f64(args, 0, "Hypot")?.hypot(arg_f64(args, 1, "Hypot")?)))
        }),
    );

    // Inf(sign) -> +Inf for sign >= 0, -Inf otherwise
    module.insert(
        "Inf".to_string(),
        Value::native("Inf", 1, |args| {
            let sign = arg_int(args, 0, "Inf")?;
            Ok(Value::Float(if sign >= 0 { f64::INFINITY } else { f64::NEG_INFINITY }))
        }),
    );

    module.insert("NaN".to_string(), Value::native("NaN", 0, |_| Ok(Value::Float(f64::NAN))));

    module.insert(
        "IsNaN".to_string(),
        Value::native("IsNaN", 1, |args| Ok(Value::Bool(arg_f64(args, 0, "IsNaN")?.is_nan()))),
    );

    module.insert(
        "IsInf".to_string(),
        Value::native("IsInf", 2, |args| {
            let x = arg_f64(args, 0, "IsInf")?;
            let sign = arg_int(args, 1, "IsInf")?;
            Ok(Value::Bool(
                (sign >= 0 && x == f64::INFINITY) || (sign <= 0 && x == f64::NEG_INFINITY),
            ))
        }),
    );

    module
}

fn unary(args: &[Value], name: &str) -> Result<Value> {
    let x = arg_f64(args, 0, name)?;
    let f = UNARY
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, f)| *f)
        .ok_or_else(|| GiltError::RuntimeError(format!("math.{} takes two arguments", name)))?;
    Ok(Value::Float(f(x)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unary_functions() {
        let table = init();
        assert_eq!(table["Sqrt"].call(&[Value::Float(16.0)]).unwrap(), Value::Float(4.0));
        assert_eq!(table["Floor"].call(&[Value::Float(2.7)]).unwrap(), Value::Float(2.0));
        assert_eq!(table["Abs"].call(&[Value::Int(-3)]).unwrap(), Value::Float(3.0));
    }

    #[test]
    fn test_binary_functions() {
        let table = init();
        assert_eq!(
            table["Pow"].call(&[Value::Float(2.0), Value::Float(10.0)]).unwrap(),
            Value::Float(1024.0)
        );
        assert_eq!(
            table["Max"].call(&[Value::Float(1.0), Value::Float(5.0)]).unwrap(),
            Value::Float(5.0)
        );
    }

    #[test]
    fn test_inf() {
        let table = init();
        assert_eq!(
            table["IsInf"]
                .call(&[table["Inf"].call(&[Value::Int(-1)]).unwrap(), Value::Int(-1)])
                .unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_argument_type_checked() {
        let table = init();
        assert!(table["Sqrt"].call(&[Value::String("4".to_string())]).is_err());
    }
}
