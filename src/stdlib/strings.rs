//! strings bridge - String manipulation functions

use crate::error::{GiltError, Result};
use crate::intrinsics::SigBuilder;
use crate::runtime::{NameTable, Value};
use crate::types::Type;

use super::{arg_int, arg_str};

pub fn declare(b: &mut SigBuilder<'_>) {
    let s = Type::string();
    let strs = Type::slice(Type::string());
    let int = Type::int();
    let boolean = Type::bool();

    for name in ["Contains", "HasPrefix", "HasSuffix", "EqualFold", "ContainsAny"] {
        b.func(name, &[s.clone(), s.clone()], &[boolean.clone()]);
    }
    for name in ["Index", "LastIndex", "Count"] {
        b.func(name, &[s.clone(), s.clone()], &[int.clone()]);
    }
    for name in ["ToUpper", "ToLower", "TrimSpace", "Title"] {
        b.func(name, &[s.clone()], &[s.clone()]);
    }
    for name in ["Trim", "TrimLeft", "TrimRight", "TrimPrefix", "TrimSuffix"] {
        b.func(name, &[s.clone(), s.clone()], &[s.clone()]);
    }
    b.func("Split", &[s.clone(), s.clone()], &[strs.clone()]);
    b.func("Fields", &[s.clone()], &[strs.clone()]);
    b.func("Join", &[strs, s.clone()], &[s.clone()]);
    b.func("Repeat", &[s.clone(), int.clone()], &[s.clone()]);
    b.func("Replace", &[s.clone(), s.clone(), s.clone(), int], &[s.clone()]);
    b.func("ReplaceAll", &[s.clone(), s.clone(), s.clone()], &[s]);
}

fn two<'v>(args: &'v [Value], func: &str) -> Result<(&'v str, &'v str)> {
    Ok((arg_str(args, 0, func)?, arg_str(args, 1, func)?))
}

fn strings(items: impl Iterator<Item = String>) -> Value {
    Value::Array(items.map(Value::String).collect())
}

/// Byte offset as Go reports it, or -1
fn offset(found: Option<usize>) -> Value {
    Value::Int(found.map_or(-1, |i| i as i64))
}

/// Initialize the strings bridge
pub fn init() -> NameTable {
    let mut module = NameTable::new();

    module.insert(
        "Contains".to_string(),
        Value::native("Contains", 2, |args| {
            let (s, sub) = two(args, "Contains")?;
            Ok(Value::Bool(s.contains(sub)))
        }),
    );

    module.insert(
        "ContainsAny".to_string(),
        Value::native("ContainsAny", 2, |args| {
            let (s, chars) = two(args, "ContainsAny")?;
            Ok(Value::Bool(s.chars().any(|c| chars.contains(c))))
        }),
    );

    module.insert(
        "HasPrefix".to_string(),
        Value::native("HasPrefix", 2, |args| {
            let (s, prefix) = two(args, "HasPrefix")?;
            Ok(Value::Bool(s.starts_with(prefix)))
        }),
    );

    module.insert(
        "HasSuffix".to_string(),
        Value::native("HasSuffix", 2, |args| {
            let (s, suffix) = two(args, "HasSuffix")?;
            Ok(Value::Bool(s.ends_with(suffix)))
        }),
    );

    module.insert(
        "EqualFold".to_string(),
        Value::native("EqualFold", 2, |args| {
            let (a, b) = two(args, "EqualFold")?;
            Ok(Value::Bool(a.to_lowercase() == b.to_lowercase()))
        }),
    );

    module.insert(
        "Index".to_string(),
        Value::native("Index", 2, |args| {
            let (s, sub) = two(args, "Index")?;
            Ok(offset(s.find(sub)))
        }),
    );

    module.insert(
        "LastIndex".to_string(),
        Value::native("LastIndex", 2, |args| {
            let (s, sub) = two(args, "LastIndex")?;
            Ok(offset(s.rfind(sub)))
        }),
    );

    // Count("five", "") is 1 + the number of runes, as in Go
    module.insert(
        "Count".to_string(),
        Value::native("Count", 2, |args| {
            let (s, sub) = two(args, "Count")?;
            let n = if sub.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(sub).count()
            };
            Ok(Value::Int(n as i64))
        }),
    );

    module.insert(
        "ToUpper".to_string(),
        Value::native("ToUpper", 1, |args| Ok(Value::String(arg_str(args, 0, "ToUpper")?.to_uppercase()))),
    );

    module.insert(
        "ToLower".to_string(),
        Value::native("ToLower", 1, |args| Ok(Value::String(arg_str(args, 0, "ToLower")?.to_lowercase()))),
    );

    module.insert(
        "TrimSpace".to_string(),
        Value::native("TrimSpace", 1, |args| Ok(Value::String(arg_str(args, 0, "TrimSpace")?.trim().to_string()))),
    );

    module.insert(
        "Title".to_string(),
        Value::native("Title", 1, |args| {
            let s = arg_str(args, 0, "Title")?;
            let mut out = String::with_capacity(s.len());
            let mut at_word_start = true;
            for c in s.chars() {
                if at_word_start {
                    out.extend(c.to_uppercase());
                } else {
                    out.push(c);
                }
                at_word_start = c.is_whitespace();
            }
            Ok(Value::String(out))
        }),
    );

    module.insert(
        "Trim".to_string(),
        Value::native("Trim", 2, |args| {
            let (s, cutset) = two(args, "Trim")?;
            Ok(Value::String(s.trim_matches(|c: char| cutset.contains(c)).to_string()))
        }),
    );

    module.insert(
        "TrimLeft".to_string(),
        Value::native("TrimLeft", 2, |args| {
            let (s, cutset) = two(args, "TrimLeft")?;
            Ok(Value::String(s.trim_start_matches(|c: char| cutset.contains(c)).to_string()))
        }),
    );

    module.insert(
        "TrimRight".to_string(),
        Value::native("TrimRight", 2, |args| {
            let (s, cutset) = two(args, "TrimRight")?;
            Ok(Value::String(s.trim_end_matches(|c: char| cutset.contains(c)).to_string()))
        }),
    );

    module.insert(
        "TrimPrefix".to_string(),
        Value::native("TrimPrefix", 2, |args| {
            let (s, prefix) = two(args, "TrimPrefix")?;
            Ok(Value::String(s.strip_prefix(prefix).unwrap_or(s).to_string()))
        }),
    );

    module.insert(
        "TrimSuffix".to_string(),
        Value::native("TrimSuffix", 2, |args| {
            let (s, suffix) = two(args, "TrimSuffix")?;
            Ok(Value::String(s.strip_suffix(suffix).unwrap_or(s).to_string()))
        }),
    );

    // Split(s, "") splits after each rune
    module.insert(
        "Split".to_string(),
        Value::native("Split", 2, |args| {
            let (s, sep) = two(args, "Split")?;
            if sep.is_empty() {
                return Ok(strings(s.chars().map(|c| c.to_string())));
            }
            Ok(strings(s.split(sep).map(str::to_string)))
        }),
    );

    module.insert(
        "Fields".to_string(),
        Value::native("Fields", 1, |args| {
            let s = arg_str(args, 0, "Fields")?;
            Ok(strings(s.split_whitespace().map(str::to_string)))
        }),
    );

    module.insert(
        "Join".to_string(),
        Value::native("Join", 2, |args| match (&args[0], &args[1]) {
            (Value::Array(items), Value::String(sep)) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                Ok(Value::String(parts.join(sep)))
            }
            // a nil slice joins to ""
            (Value::Nil, Value::String(_)) => Ok(Value::String(String::new())),
            _ => Err(GiltError::RuntimeError("Join() requires a []string and a string".to_string())),
        }),
    );

    module.insert(
        "Repeat".to_string(),
        Value::native("Repeat", 2, |args| {
            let s = arg_str(args, 0, "Repeat")?;
            let count = arg_int(args, 1, "Repeat")?;
            if count < 0 {
                return Err(GiltError::RuntimeError("strings: negative Repeat count".to_string()));
            }
            Ok(Value::String(s.repeat(count as usize)))
        }),
    );

    // Replace(s, old, new, n); n < 0 replaces every match
    module.insert(
        "Replace".to_string(),
        Value::native("Replace", 4, |args| {
            let (s, old) = two(args, "Replace")?;
            let new = arg_str(args, 2, "Replace")?;
            let n = arg_int(args, 3, "Replace")?;
            let out = if n < 0 {
                s.replace(old, new)
            } else {
                s.replacen(old, new, n as usize)
            };
            Ok(Value::String(out))
        }),
    );

    module.insert(
        "ReplaceAll".to_string(),
        Value::native("ReplaceAll", 3, |args| {
            let (s, old) = two(args, "ReplaceAll")?;
            let new = arg_str(args, 2, "ReplaceAll")?;
            Ok(Value::String(s.replace(old, new)))
        }),
    );

    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn s(text: &str) -> Value {
        Value::String(text.to_string())
    }

    #[test]
    fn test_search() {
        let table = init();
        assert_eq!(table["Contains"].call(&[s("seafood"), s("foo")]).unwrap(), Value::Bool(true));
        assert_eq!(table["Index"].call(&[s("chicken"), s("dmr")]).unwrap(), Value::Int(-1));
        assert_eq!(table["Count"].call(&[s("cheese"), s("e")]).unwrap(), Value::Int(3));
        assert_eq!(table["Count"].call(&[s("five"), s("")]).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_split_and_join() {
        let table = init();
        let parts = table["Split"].call(&[s("a,b,c"), s(",")]).unwrap();
        assert_eq!(parts, Value::Array(vec![s("a"), s("b"), s("c")]));
        assert_eq!(table["Join"].call(&[parts, s("-")]).unwrap(), s("a-b-c"));
        assert_eq!(
            table["Fields"].call(&[s("  foo bar  baz   ")]).unwrap(),
            Value::Array(vec![s("foo"), s("bar"), s("baz")])
        );
    }

    #[test]
    fn test_replace() {
        let table = init();
        assert_eq!(
            table["Replace"].call(&[s("oink oink oink"), s("k"), s("ky"), Value::Int(2)]).unwrap(),
            s("oinky oinky oink")
        );
        assert_eq!(
            table["Replace"].call(&[s("oink oink oink"), s("oink"), s("moo"), Value::Int(-1)]).unwrap(),
            s("moo moo moo")
        );
    }

    #[test]
    fn test_trim() {
        let table = init();
        assert_eq!(table["Trim"].call(&[s("¡¡¡Hello, Gophers!!!"), s("!¡")]).unwrap(), s("Hello, Gophers"));
        assert_eq!(table["TrimSpace"].call(&[s(" \t hi \n")]).unwrap(), s("hi"));
        assert_eq!(table["TrimPrefix"].call(&[s("prefix-x"), s("prefix-")]).unwrap(), s("x"));
    }
}
