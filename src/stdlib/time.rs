//! time bridge - a subset of Go's time package
//!
//! A `Time` crosses the bridge as Unix nanoseconds (UTC) and a `Duration`
//! as nanoseconds, both in `Value::Int`.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Datelike, Utc};

use crate::constant::ConstValue;
use crate::error::{GiltError, Result};
use crate::intrinsics::SigBuilder;
use crate::runtime::{NameTable, Value};
use crate::types::{BasicKind, StructType, Type};

use super::{arg_int, arg_str};

const NANOSECOND: i64 = 1;
const MICROSECOND: i64 = 1_000 * NANOSECOND;
const MILLISECOND: i64 = 1_000 * MICROSECOND;
const SECOND: i64 = 1_000 * MILLISECOND;
const MINUTE: i64 = 60 * SECOND;
const HOUR: i64 = 60 * MINUTE;

pub fn declare(b: &mut SigBuilder<'_>) {
    let int64 = Type::Basic(BasicKind::Int64);
    let string = Type::string();

    let duration = b.named("Duration", int64.clone());
    for (name, value) in [
        ("Nanosecond", NANOSECOND),
        ("Microsecond", MICROSECOND),
        ("Millisecond", MILLISECOND),
        ("Second", SECOND),
        ("Minute", MINUTE),
        ("Hour", HOUR),
    ] {
        b.constant(name, ConstValue::Int(value as i128), duration.clone());
    }
    b.method(&duration, "Seconds", &[], &[Type::float64()]);
    b.method(&duration, "Milliseconds", &[], &[int64.clone()]);
    b.method(&duration, "String", &[], &[string.clone()]);

    let time = b.named("Time", Type::Struct(std::rc::Rc::new(StructType::default())));
    b.method(&time, "Unix", &[], &[int64.clone()]);
    b.method(&time, "UnixNano", &[], &[int64.clone()]);
    b.method(&time, "Year", &[], &[Type::int()]);
    b.method(&time, "Sub", &[time.clone()], &[duration.clone()]);
    b.method(&time, "Add", &[duration.clone()], &[time.clone()]);
    b.method(&time, "Format", &[string.clone()], &[string.clone()]);

    let untyped_string = Type::Basic(BasicKind::UntypedString);
    b.constant("RFC3339", ConstValue::String(RFC3339.to_string()), untyped_string.clone());
    b.constant("Kitchen", ConstValue::String("3:04PM".to_string()), untyped_string);

    b.func("Now", &[], &[time.clone()]);
    b.func("Unix", &[int64.clone(), int64], &[time.clone()]);
    b.func("Since", &[time], &[duration.clone()]);
    b.func("Sleep", &[duration], &[]);
}

const RFC3339: &str = "2006-01-02T15:04:05Z07:00";

fn now_nanos() -> Result<i64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| GiltError::RuntimeError(format!("system clock before 1970: {}", err)))?;
    i64::try_from(elapsed.as_nanos()).map_err(|_| GiltError::RuntimeError("time overflow".to_string()))
}

fn to_datetime(nanos: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(nanos.div_euclid(SECOND), nanos.rem_euclid(SECOND) as u32)
        .unwrap_or_default()
}

/// Go reference-time layout elements and their strftime equivalents,
/// longest first
const LAYOUT: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Monday", "%A"),
    ("Z07:00", "Z"),
    ("-0700", "%z"),
    ("2006", "%Y"),
    ("Jan", "%b"),
    ("Mon", "%a"),
    ("MST", "UTC"),
    ("01", "%m"),
    ("02", "%d"),
    ("15", "%H"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("PM", "%p"),
    ("06", "%y"),
    ("3", "%-I"),
    ("1", "%-m"),
    ("2", "%-d"),
];

/// Translates a Go layout such as `2006-01-02` into a strftime format
pub fn strftime(layout: &str) -> String {
    let mut out = String::new();
    let mut rest = layout;
    'scan: while !rest.is_empty() {
        for (go, fmt) in LAYOUT {
            if let Some(tail) = rest.strip_prefix(go) {
                out.push_str(fmt);
                rest = tail;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
        }
        rest = chars.as_str();
    }
    out
}

/// Formats like Go's `Duration.String`: `1h2m3.5s`, `1.5s`, `100ms`
pub fn duration_string(d: i64) -> String {
    if d == 0 {
        return "0s".to_string();
    }
    let sign = if d < 0 { "-" } else { "" };
    let u = d.unsigned_abs();
    if u < SECOND as u64 {
        let (unit, div) = if u < MICROSECOND as u64 {
            ("ns", 1.0)
        } else if u < MILLISECOND as u64 {
            ("µs", MICROSECOND as f64)
        } else {
            ("ms", MILLISECOND as f64)
        };
        return format!("{}{}{}", sign, trim_fraction(u as f64 / div), unit);
    }
    let hours = u / HOUR as u64;
    let minutes = (u / MINUTE as u64) % 60;
    let seconds = (u % MINUTE as u64) as f64 / SECOND as f64;
    let mut out = sign.to_string();
    if hours > 0 {
        out.push_str(&format!("{}h{}m", hours, minutes));
    } else if minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&format!("{}s", trim_fraction(seconds)));
    out
}

fn trim_fraction(x: f64) -> String {
    let text = format!("{:.9}", x);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Initialize the time bridge
pub fn init() -> NameTable {
    let mut module = NameTable::new();

    module.insert(
        "Now".to_string(),
        Value::native("Now", 0, |_| Ok(Value::Int(now_nanos()?))),
    );

    module.insert(
        "Unix".to_string(),
        Value::native("Unix", 2, |args| {
            let sec = arg_int(args, 0, "Unix")?;
            let nsec = arg_int(args, 1, "Unix")?;
            Ok(Value::Int(sec.saturating_mul(SECOND).saturating_add(nsec)))
        }),
    );

    module.insert(
        "Since".to_string(),
        Value::native("Since", 1, |args| {
            let t = arg_int(args, 0, "Since")?;
            Ok(Value::Int(now_nanos()? - t))
        }),
    );

    module.insert(
        "Sleep".to_string(),
        Value::native("Sleep", 1, |args| {
            let d = arg_int(args, 0, "Sleep")?;
            if d > 0 {
                std::thread::sleep(std::time::Duration::from_nanos(d as u64));
            }
            Ok(Value::Nil)
        }),
    );

    // Duration methods; the receiver is the first argument

    module.insert(
        "Duration.Seconds".to_string(),
        Value::native("Duration.Seconds", 1, |args| {
            Ok(Value::Float(arg_int(args, 0, "Seconds")? as f64 / SECOND as f64))
        }),
    );

    module.insert(
        "Duration.Milliseconds".to_string(),
        Value::native("Duration.Milliseconds", 1, |args| {
            Ok(Value::Int(arg_int(args, 0, "Milliseconds")? / MILLISECOND))
        }),
    );

    module.insert(
        "Duration.String".to_string(),
        Value::native("Duration.String", 1, |args| {
            Ok(Value::String(duration_string(arg_int(args, 0, "String")?)))
        }),
    );

    // Time methods

    module.insert(
        "Time.Unix".to_string(),
        Value::native("Time.Unix", 1, |args| {
            Ok(Value::Int(arg_int(args, 0, "Unix")?.div_euclid(SECOND)))
        }),
    );

    module.insert(
        "Time.UnixNano".to_string(),
        Value::native("Time.UnixNano", 1, |args| Ok(Value::Int(arg_int(args, 0, "UnixNano")?))),
    );

    module.insert(
        "Time.Year".to_string(),
        Value::native("Time.Year", 1, |args| {
            Ok(Value::Int(to_datetime(arg_int(args, 0, "Year")?).year() as i64))
        }),
    );

    module.insert(
        "Time.Sub".to_string(),
        Value::native("Time.Sub", 2, |args| {
            Ok(Value::Int(arg_int(args, 0, "Sub")? - arg_int(args, 1, "Sub")?))
        }),
    );

    module.insert(
        "Time.Add".to_string(),
        Value::native("Time.Add", 2, |args| {
            Ok(Value::Int(arg_int(args, 0, "Add")?.saturating_add(arg_int(args, 1, "Add")?)))
        }),
    );

    module.insert(
        "Time.Format".to_string(),
        Value::native("Time.Format", 2, |args| {
            let t = to_datetime(arg_int(args, 0, "Format")?);
            let layout = arg_str(args, 1, "Format")?;
            Ok(Value::String(t.format(&strftime(layout)).to_string()))
        }),
    );

    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_duration_string() {
        assert_eq!(duration_string(0), "0s");
        assert_eq!(duration_string(1500 * MILLISECOND), "1.5s");
        assert_eq!(duration_string(90 * SECOND), "1m30s");
        assert_eq!(duration_string(HOUR), "1h0m0s");
        assert_eq!(duration_string(100 * MILLISECOND), "100ms");
        assert_eq!(duration_string(-2 * SECOND), "-2s");
    }

    #[test]
    fn test_layout_translation() {
        assert_eq!(strftime("2006-01-02"), "%Y-%m-%d");
        assert_eq!(strftime(RFC3339), "%Y-%m-%dT%H:%M:%SZ");
        assert_eq!(strftime("3:04PM"), "%-I:%M%p");
    }

    #[test]
    fn test_format_fixed_time() {
        let table = init();
        // 2009-11-10 23:00:00 UTC
        let t = table["Unix"].call(&[Value::Int(1_257_894_000), Value::Int(0)]).unwrap();
        let formatted = table["Time.Format"]
            .call(&[t.clone(), Value::String("2006-01-02 15:04".to_string())])
            .unwrap();
        assert_eq!(formatted, Value::String("2009-11-10 23:00".to_string()));
        assert_eq!(table["Time.Year"].call(&[t]).unwrap(), Value::Int(2009));
    }
}
