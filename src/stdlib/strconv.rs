//! strconv bridge - conversions to and from strings
//!
//! Parse failures come back as the error result, worded like Go's
//! `*NumError`: `strconv.Atoi: parsing "x": invalid syntax`.

use std::num::IntErrorKind;

use crate::constant::ConstValue;
use crate::intrinsics::SigBuilder;
use crate::runtime::{NameTable, Value};
use crate::types::{BasicKind, Type};

use super::{arg_f64, arg_int, arg_str};

pub fn declare(b: &mut SigBuilder<'_>) {
    let int = Type::int();
    let int64 = Type::Basic(BasicKind::Int64);
    let string = Type::string();
    let error = b.error();

    b.constant("IntSize", ConstValue::Int(64), Type::Basic(BasicKind::UntypedInt));
    b.func("Itoa", &[int.clone()], &[string.clone()]);
    b.func("Atoi", &[string.clone()], &[int.clone(), error.clone()]);
    b.func("FormatInt", &[int64.clone(), int.clone()], &[string.clone()]);
    b.func("ParseInt", &[string.clone(), int.clone(), int.clone()], &[int64, error.clone()]);
    b.func("FormatFloat", &[Type::float64(), Type::Basic(BasicKind::Uint8), int.clone(), int.clone()], &[string.clone()]);
    b.func("ParseFloat", &[string.clone(), int], &[Type::float64(), error.clone()]);
    b.func("FormatBool", &[Type::bool()], &[string.clone()]);
    b.func("ParseBool", &[string.clone()], &[Type::bool(), error]);
    b.func("Quote", &[string.clone()], &[string]);
}

fn num_error(func: &str, input: &str, kind: &IntErrorKind) -> Value {
    let reason = match kind {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => "value out of range",
        _ => "invalid syntax",
    };
    Value::Tuple(vec![
        Value::Int(0),
        Value::Error(format!("strconv.{}: parsing {:?}: {}", func, input, reason)),
    ])
}

/// Initialize the strconv bridge
pub fn init() -> NameTable {
    let mut module = NameTable::new();

    module.insert(
        "Itoa".to_string(),
        Value::native("Itoa", 1, |args| Ok(Value::String(arg_int(args, 0, "Itoa")?.to_string()))),
    );

    module.insert(
        "Atoi".to_string(),
        Value::native("Atoi", 1, |args| {
            let s = arg_str(args, 0, "Atoi")?;
            Ok(match s.parse::<i64>() {
                Ok(i) => Value::ok(Value::Int(i)),
                Err(err) => num_error("Atoi", s, err.kind()),
            })
        }),
    );

    module.insert(
        "FormatInt".to_string(),
        Value::native("FormatInt", 2, |args| {
            let i = arg_int(args, 0, "FormatInt")?;
            let base = arg_int(args, 1, "FormatInt")?;
            if !(2..=36).contains(&base) {
                return Err(crate::error::GiltError::RuntimeError(
                    "strconv: illegal AppendInt/FormatInt base".to_string(),
                ));
            }
            Ok(Value::String(format_radix(i, base as u32)))
        }),
    );

    // ParseInt(s, base, bitSize); base 0 infers it from the prefix
    module.insert(
        "ParseInt".to_string(),
        Value::native("ParseInt", 3, |args| {
            let s = arg_str(args, 0, "ParseInt")?;
            let base = arg_int(args, 1, "ParseInt")?;
            let bits = arg_int(args, 2, "ParseInt")?;
            let (negative, digits) = match s.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, s.strip_prefix('+').unwrap_or(s)),
            };
            let (radix, digits) = match base {
                0 => {
                    let lower = digits.to_ascii_lowercase();
                    if lower.starts_with("0x") {
                        (16, &digits[2..])
                    } else if lower.starts_with("0b") {
                        (2, &digits[2..])
                    } else if lower.starts_with("0o") {
                        (8, &digits[2..])
                    } else if digits.len() > 1 && digits.starts_with('0') {
                        (8, &digits[1..])
                    } else {
                        (10, digits)
                    }
                }
                2..=36 => (base as u32, digits),
                _ => {
                    return Ok(Value::Tuple(vec![
                        Value::Int(0),
                        Value::Error(format!("strconv.ParseInt: parsing {:?}: invalid base {}", s, base)),
                    ]))
                }
            };
            let text = if negative { format!("-{}", digits) } else { digits.to_string() };
            let parsed = i64::from_str_radix(&text, radix);
            Ok(match parsed {
                Ok(i) => {
                    let bits = if bits == 0 { 64 } else { bits.clamp(1, 64) };
                    let (min, max) = if bits == 64 {
                        (i64::MIN, i64::MAX)
                    } else {
                        (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
                    };
                    if i < min || i > max {
                        num_error("ParseInt", s, &IntErrorKind::PosOverflow)
                    } else {
                        Value::ok(Value::Int(i))
                    }
                }
                Err(err) => num_error("ParseInt", s, err.kind()),
            })
        }),
    );

    // FormatFloat(f, fmt, prec, bitSize) for the 'f', 'e' and 'g' formats
    module.insert(
        "FormatFloat".to_string(),
        Value::native("FormatFloat", 4, |args| {
            let x = arg_f64(args, 0, "FormatFloat")?;
            let verb = arg_int(args, 1, "FormatFloat")?;
            let prec = arg_int(args, 2, "FormatFloat")?;
            let text = match (verb as u8 as char, usize::try_from(prec).ok()) {
                ('f', Some(p)) => format!("{:.*}", p, x),
                ('e', Some(p)) => format!("{:.*e}", p, x),
                _ => Value::Float(x).to_string(),
            };
            Ok(Value::String(text))
        }),
    );

    module.insert(
        "ParseFloat".to_string(),
        Value::native("ParseFloat", 2, |args| {
            let s = arg_str(args, 0, "ParseFloat")?;
            Ok(match s.trim().parse::<f64>() {
                Ok(x) if s.trim() == s => Value::ok(Value::Float(x)),
                _ => Value::Tuple(vec![
                    Value::Float(0.0),
                    Value::Error(format!("strconv.ParseFloat: parsing {:?}: invalid syntax", s)),
                ]),
            })
        }),
    );

    module.insert(
        "FormatBool".to_string(),
        Value::native("FormatBool", 1, |args| match &args[0] {
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(crate::error::GiltError::RuntimeError(format!(
                "FormatBool() requires a bool, got {}",
                other.type_name()
            ))),
        }),
    );

    module.insert(
        "ParseBool".to_string(),
        Value::native("ParseBool", 1, |args| {
            let s = arg_str(args, 0, "ParseBool")?;
            Ok(match s {
                "1" | "t" | "T" | "true" | "TRUE" | "True" => Value::ok(Value::Bool(true)),
                "0" | "f" | "F" | "false" | "FALSE" | "False" => Value::ok(Value::Bool(false)),
                _ => Value::Tuple(vec![
                    Value::Bool(false),
                    Value::Error(format!("strconv.ParseBool: parsing {:?}: invalid syntax", s)),
                ]),
            })
        }),
    );

    module.insert(
        "Quote".to_string(),
        Value::native("Quote", 1, |args| Ok(Value::String(format!("{:?}", arg_str(args, 0, "Quote")?)))),
    );

    module
}

fn format_radix(value: i64, radix: u32) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let negative = value < 0;
    let mut n = value.unsigned_abs();
    let mut digits = Vec::new();
    while n > 0 {
        let d = (n % radix as u64) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('?'));
        n /= radix as u64;
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn s(text: &str) -> Value {
        Value::String(text.to_string())
    }

    #[test]
    fn test_atoi() {
        let table = init();
        assert_eq!(table["Atoi"].call(&[s("42")]).unwrap(), Value::ok(Value::Int(42)));
        assert_eq!(
            table["Atoi"].call(&[s("4x")]).unwrap(),
            Value::Tuple(vec![
                Value::Int(0),
                Value::Error("strconv.Atoi: parsing \"4x\": invalid syntax".to_string())
            ])
        );
    }

    #[test]
    fn test_parse_int_bases() {
        let table = init();
        let parse = |text: &str, base: i64| table["ParseInt"].call(&[s(text), Value::Int(base), Value::Int(64)]).unwrap();
        assert_eq!(parse("ff", 16), Value::ok(Value::Int(255)));
        assert_eq!(parse("0x1f", 0), Value::ok(Value::Int(31)));
        assert_eq!(parse("-101", 2), Value::ok(Value::Int(-5)));
        let overflow = table["ParseInt"].call(&[s("300"), Value::Int(10), Value::Int(8)]).unwrap();
        assert_eq!(
            overflow,
            Value::Tuple(vec![
                Value::Int(0),
                Value::Error("strconv.ParseInt: parsing \"300\": value out of range".to_string())
            ])
        );
    }

    #[test]
    fn test_format_int() {
        assert_eq!(format_radix(255, 16), "ff");
        assert_eq!(format_radix(-8, 2), "-1000");
        assert_eq!(format_radix(0, 10), "0");
    }

    #[test]
    fn test_parse_bool() {
        let table = init();
        assert_eq!(table["ParseBool"].call(&[s("t")]).unwrap(), Value::ok(Value::Bool(true)));
        assert!(matches!(
            table["ParseBool"].call(&[s("yes")]).unwrap(),
            Value::Tuple(items) if matches!(items[1], Value::Error(_))
        ));
    }
}
