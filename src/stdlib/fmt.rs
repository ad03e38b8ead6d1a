//! fmt bridge - formatted printing with Go's verbs

use std::rc::Rc;

use crate::ast::Pos;
use crate::error::Result;
use crate::intrinsics::SigBuilder;
use crate::runtime::{NameTable, Value};
use crate::types::{InterfaceType, MethodSig, Param, Signature, Type};

use super::arg_str;

pub fn declare(b: &mut SigBuilder<'_>) {
    let any = Type::empty_interface();
    let error = b.error();
    let string = Type::string();
    let written = [Type::int(), error.clone()];

    b.variadic("Print", &[any.clone()], &written);
    b.variadic("Println", &[any.clone()], &written);
    b.variadic("Printf", &[string.clone(), any.clone()], &written);
    b.variadic("Sprint", &[any.clone()], &[string.clone()]);
    b.variadic("Sprintln", &[any.clone()], &[string.clone()]);
    b.variadic("Sprintf", &[string.clone(), any.clone()], &[string.clone()]);
    b.variadic("Errorf", &[string.clone(), any], &[error]);

    // type Stringer interface { String() string }
    let string_method = MethodSig {
        name: "String".to_string(),
        sig: Rc::new(Signature {
            results: vec![Param::unnamed(string)],
            ..Default::default()
        }),
        pos: Pos::default(),
    };
    b.named(
        "Stringer",
        Type::Interface(Rc::new(InterfaceType::with_methods(vec![string_method]))),
    );
}

/// Initialize the fmt bridge
pub fn init() -> NameTable {
    let mut module = NameTable::new();

    module.insert(
        "Print".to_string(),
        Value::variadic("Print", 0, |args| Ok(write_out(sprint(args)))),
    );

    module.insert(
        "Println".to_string(),
        Value::variadic("Println", 0, |args| Ok(write_out(sprintln(args)))),
    );

    module.insert(
        "Printf".to_string(),
        Value::variadic("Printf", 1, |args| {
            let format = arg_str(args, 0, "Printf")?;
            Ok(write_out(sprintf(format, &args[1..])))
        }),
    );

    module.insert(
        "Sprint".to_string(),
        Value::variadic("Sprint", 0, |args| Ok(Value::String(sprint(args)))),
    );

    module.insert(
        "Sprintln".to_string(),
        Value::variadic("Sprintln", 0, |args| Ok(Value::String(sprintln(args)))),
    );

    module.insert(
        "Sprintf".to_string(),
        Value::variadic("Sprintf", 1, |args| {
            let format = arg_str(args, 0, "Sprintf")?;
            Ok(Value::String(sprintf(format, &args[1..])))
        }),
    );

    module.insert(
        "Errorf".to_string(),
        Value::variadic("Errorf", 1, |args| -> Result<Value> {
            let format = arg_str(args, 0, "Errorf")?;
            Ok(Value::Error(sprintf(format, &args[1..])))
        }),
    );

    module
}

fn write_out(text: String) -> Value {
    print!("{}", text);
    Value::Tuple(vec![Value::Int(text.len() as i64), Value::Nil])
}

/// Operands separated by a space where neither side is a string
pub fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !matches!(arg, Value::String(_)) && !matches!(args[i - 1], Value::String(_)) {
            out.push(' ');
        }
        out.push_str(&arg.to_string());
    }
    out
}

pub fn sprintln(args: &[Value]) -> String {
    let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    format!("{}\n", parts.join(" "))
}

#[derive(Debug, Default)]
struct Spec {
    minus: bool,
    plus: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// Formats like Go's `fmt.Sprintf` for the verbs `v d s q f t x c T %`
pub fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::new();
    let mut chars = format.chars().peekable();
    let mut next_arg = 0;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.minus = true,
                '+' => spec.plus = true,
                '0' => spec.zero = true,
                '#' | ' ' => {}
                _ => break,
            }
            chars.next();
        }
        spec.width = digits(&mut chars);
        if chars.peek() == Some(&'.') {
            chars.next();
            spec.precision = Some(digits(&mut chars).unwrap_or(0));
        }
        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let Some(arg) = args.get(next_arg) else {
            out.push_str(&format!("%!{}(MISSING)", verb));
            continue;
        };
        next_arg += 1;
        let text = format_verb(verb, &spec, arg);
        out.push_str(&pad(text, &spec, matches!(arg, Value::Int(_) | Value::Float(_))));
    }

    if next_arg < args.len() {
        let extra: Vec<String> = args[next_arg..]
            .iter()
            .map(|a| format!("{}={}", go_type(a), a))
            .collect();
        out.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
    }
    out
}

fn digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut value: Option<usize> = None;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        value = Some(value.unwrap_or(0) * 10 + d as usize);
        chars.next();
    }
    value
}

fn go_type(value: &Value) -> &'static str {
    match value {
        Value::Nil => "<nil>",
        Value::Int(_) => "int",
        Value::Float(_) => "float64",
        Value::Bool(_) => "bool",
        Value::String(_) => "string",
        Value::Array(_) => "[]interface {}",
        Value::Tuple(_) => "tuple",
        Value::Error(_) => "*errors.errorString",
        Value::NativeFunction { .. } => "func",
    }
}

fn bad_verb(verb: char, value: &Value) -> String {
    format!("%!{}({}={})", verb, go_type(value), value)
}

fn format_verb(verb: char, spec: &Spec, value: &Value) -> String {
    match (verb, value) {
        ('v', _) | ('s', Value::String(_)) | ('s', Value::Error(_)) => value.to_string(),
        ('d', Value::Int(i)) => {
            if spec.plus && *i >= 0 {
                format!("+{}", i)
            } else {
                i.to_string()
            }
        }
        ('f', _) | ('F', _) => match value.as_f64() {
            Some(x) => format!("{:.*}", spec.precision.unwrap_or(6), x),
            None => bad_verb(verb, value),
        },
        ('t', Value::Bool(b)) => b.to_string(),
        ('q', Value::String(s)) => format!("{:?}", s),
        ('q', Value::Int(i)) => match u32::try_from(*i).ok().and_then(char::from_u32) {
            Some(c) => format!("{:?}", c),
            None => bad_verb(verb, value),
        },
        ('x', Value::Int(i)) => format!("{:x}", i),
        ('x', Value::String(s)) => s.bytes().map(|b| format!("{:02x}", b)).collect(),
        ('X', Value::Int(i)) => format!("{:X}", i),
        ('c', Value::Int(i)) => match u32::try_from(*i).ok().and_then(char::from_u32) {
            Some(c) => c.to_string(),
            None => bad_verb(verb, value),
        },
        ('T', _) => go_type(value).to_string(),
        _ => bad_verb(verb, value),
    }
}

fn pad(text: String, spec: &Spec, numeric: bool) -> String {
    let Some(width) = spec.width else {
        return text;
    };
    let len = text.chars().count();
    if len >= width {
        return text;
    }
    let fill = width - len;
    if spec.minus {
        format!("{}{}", text, " ".repeat(fill))
    } else if spec.zero && numeric {
        match text.strip_prefix('-') {
            Some(digits) => format!("-{}{}", "0".repeat(fill), digits),
            None => format!("{}{}", "0".repeat(fill), text),
        }
    } else {
        format!("{}{}", " ".repeat(fill), text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn s(text: &str) -> Value {
        Value::String(text.to_string())
    }

    #[test]
    fn test_sprintf_verbs() {
        assert_eq!(sprintf("%d apples", &[Value::Int(3)]), "3 apples");
        assert_eq!(sprintf("%s=%v", &[s("x"), Value::Float(1.5)]), "x=1.5");
        assert_eq!(sprintf("%q", &[s("hi")]), "\"hi\"");
        assert_eq!(sprintf("%.2f", &[Value::Float(3.14159)]), "3.14");
        assert_eq!(sprintf("%t", &[Value::Bool(true)]), "true");
        assert_eq!(sprintf("100%%", &[]), "100%");
        assert_eq!(sprintf("%x", &[Value::Int(255)]), "ff");
    }

    #[test]
    fn test_sprintf_width() {
        assert_eq!(sprintf("[%5d]", &[Value::Int(42)]), "[   42]");
        assert_eq!(sprintf("[%-5d]", &[Value::Int(42)]), "[42   ]");
        assert_eq!(sprintf("[%05d]", &[Value::Int(-42)]), "[-0042]");
    }

    #[test]
    fn test_sprintf_argument_mismatch() {
        assert_eq!(sprintf("%d", &[]), "%!d(MISSING)");
        assert_eq!(sprintf("%d", &[s("hi")]), "%!d(string=hi)");
        assert_eq!(sprintf("x", &[Value::Int(1)]), "x%!(EXTRA int=1)");
    }

    #[test]
    fn test_sprint_spacing() {
        assert_eq!(sprint(&[Value::Int(1), Value::Int(2)]), "1 2");
        assert_eq!(sprint(&[s("a"), Value::Int(1), s("b")]), "a1b");
        assert_eq!(sprintln(&[s("a"), Value::Int(1)]), "a 1\n");
    }

    #[test]
    fn test_errorf_returns_error_value() {
        let table = init();
        let errorf = table.get("Errorf").unwrap();
        let result = errorf.call(&[s("bad %d"), Value::Int(7)]).unwrap();
        assert_eq!(result, Value::Error("bad 7".to_string()));
    }
}
