//! The expression subset of the runtime's own language behind `__lua`:
//! numbers with LuaJIT `LL`/`ULL` suffixes, strings, `..`, arithmetic,
//! comparison and the logical operators

use crate::runtime::Value;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(Value),
    Str(String),
    Name(String),
    Op(&'static str),
}

#[derive(Debug)]
enum Node {
    Lit(Value),
    /// Unknown globals read as nil
    Global(String),
    Unary(&'static str, Box<Node>),
    Binary(&'static str, Box<Node>, Box<Node>),
}

const OPS: &[&str] = &[
    "...", "..", "==", "~=", "<=", ">=", "<", ">", "+", "-", "*", "/", "%", "^", "#", "(", ")",
];

const UNARY_PRIORITY: u8 = 8;

pub fn eval(text: &str) -> Result<Value, String> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let node = parser.subexpr(0)?;
    if let Some(tok) = parser.tokens.get(parser.pos) {
        return Err(format!("unexpected {:?} after expression", tok));
    }
    eval_node(&node)
}

fn tokenize(text: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).map_or(false, |d| d.is_ascii_digit())) {
            let (value, next) = number(&chars, i)?;
            tokens.push(Tok::Num(value));
            i = next;
        } else if c == '"' || c == '\'' {
            let (s, next) = quoted(&chars, i)?;
            tokens.push(Tok::Str(s));
            i = next;
        } else if c == '[' && chars.get(i + 1) == Some(&'[') {
            let rest: String = chars[i + 2..].iter().collect();
            let end = rest.find("]]").ok_or("unfinished long string")?;
            tokens.push(Tok::Str(rest[..end].to_string()));
            i += 2 + rest[..end].chars().count() + 2;
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Tok::Name(chars[start..i].iter().collect()));
        } else {
            let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
            let op = OPS
                .iter()
                .find(|op| rest.starts_with(**op))
                .ok_or_else(|| format!("unexpected symbol near '{}'", c))?;
            tokens.push(Tok::Op(*op));
            i += op.len();
        }
    }
    Ok(tokens)
}

/// A numeral starting at `start`; returns the value and the index after it
fn number(chars: &[char], start: usize) -> Result<(Value, usize), String> {
    let mut i = start;
    let hex = chars[i] == '0' && matches!(chars.get(i + 1), Some('x') | Some('X'));
    let mut is_float = false;
    if hex {
        i += 2;
        while i < chars.len() && chars[i].is_ascii_hexdigit() {
            i += 1;
        }
    } else {
        while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
            is_float |= chars[i] == '.';
            i += 1;
        }
        if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
            is_float = true;
            i += 1;
            if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                i += 1;
            }
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    let digits: String = chars[start..i].iter().collect();

    // LuaJIT 64-bit integer suffixes
    let mut boxed = false;
    for suffix in ["ULL", "LL"] {
        let end = i + suffix.len();
        if end <= chars.len() {
            let found: String = chars[i..end].iter().collect();
            if found.eq_ignore_ascii_case(suffix) {
                boxed = true;
                i = end;
                break;
            }
        }
    }
    if chars.get(i).map_or(false, |c| c.is_alphanumeric() || *c == '_') {
        let near: String = chars[start..=i].iter().collect();
        return Err(format!("malformed number near '{}'", near));
    }

    let malformed = || format!("malformed number near '{}'", digits);
    let value = if hex {
        let n = u64::from_str_radix(&digits[2..], 16).map_err(|_| malformed())?;
        Value::Int(n as i64)
    } else if is_float {
        if boxed {
            return Err(malformed());
        }
        Value::Float(digits.parse::<f64>().map_err(|_| malformed())?)
    } else {
        match digits.parse::<i64>() {
            Ok(n) => Value::Int(n),
            // ULL wraps into the signed range
            Err(_) if boxed => Value::Int(digits.parse::<u64>().map_err(|_| malformed())? as i64),
            Err(_) => Value::Float(digits.parse::<f64>().map_err(|_| malformed())?),
        }
    };
    Ok((value, i))
}

fn quoted(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut s = String::new();
    let mut i = start + 1;
    loop {
        match chars.get(i) {
            None | Some('\n') => return Err("unfinished string".to_string()),
            Some(c) if *c == quote => return Ok((s, i + 1)),
            Some('\\') => {
                let escaped = match chars.get(i + 1) {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some('0') => '\0',
                    Some(c @ ('\\' | '"' | '\'')) => *c,
                    _ => return Err("invalid escape sequence".to_string()),
                };
                s.push(escaped);
                i += 2;
            }
            Some(c) => {
                s.push(*c);
                i += 1;
            }
        }
    }
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    /// The binary operator at the cursor with its left and right priorities
    fn binary(&self) -> Option<(&'static str, u8, u8)> {
        let op = match self.peek()? {
            Tok::Op(op) => *op,
            Tok::Name(name) if name == "and" => "and",
            Tok::Name(name) if name == "or" => "or",
            _ => return None,
        };
        let (left, right) = match op {
            "or" => (1, 1),
            "and" => (2, 2),
            "==" | "~=" | "<" | "<=" | ">" | ">=" => (3, 3),
            ".." => (5, 4),
            "+" | "-" => (6, 6),
            "*" | "/" | "%" => (7, 7),
            "^" => (10, 9),
            _ => return None,
        };
        Some((op, left, right))
    }

    fn unary(&self) -> Option<&'static str> {
        match self.peek()? {
            Tok::Op("-") => Some("-"),
            Tok::Op("#") => Some("#"),
            Tok::Name(name) if name == "not" => Some("not"),
            _ => None,
        }
    }

    fn subexpr(&mut self, limit: u8) -> Result<Node, String> {
        let mut left = match self.unary() {
            Some(op) => {
                self.pos += 1;
                Node::Unary(op, Box::new(self.subexpr(UNARY_PRIORITY)?))
            }
            None => self.simple()?,
        };
        while let Some((op, lp, rp)) = self.binary() {
            if lp <= limit {
                break;
            }
            self.pos += 1;
            let right = self.subexpr(rp)?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn simple(&mut self) -> Result<Node, String> {
        let tok = self.peek().cloned().ok_or("unexpected end of expression")?;
        self.pos += 1;
        Ok(match tok {
            Tok::Num(v) => Node::Lit(v),
            Tok::Str(s) => Node::Lit(Value::String(s)),
            Tok::Name(name) => match name.as_str() {
                "nil" => Node::Lit(Value::Nil),
                "true" => Node::Lit(Value::Bool(true)),
                "false" => Node::Lit(Value::Bool(false)),
                _ => Node::Global(name),
            },
            Tok::Op("(") => {
                let inner = self.subexpr(0)?;
                if self.peek() != Some(&Tok::Op(")")) {
                    return Err("')' expected".to_string());
                }
                self.pos += 1;
                inner
            }
            Tok::Op(op) => return Err(format!("unexpected symbol near '{}'", op)),
        })
    }
}

fn truthy(v: &Value) -> bool {
    !matches!(v, Value::Nil | Value::Bool(false))
}

fn lua_type(v: &Value) -> &'static str {
    match v {
        Value::Nil => "nil",
        Value::Int(_) | Value::Float(_) => "number",
        Value::Bool(_) => "boolean",
        Value::String(_) => "string",
        _ => "userdata",
    }
}

/// Arithmetic operand; numeric strings are coerced
fn number_of(v: &Value) -> Option<Value> {
    match v {
        Value::Int(_) | Value::Float(_) => Some(v.clone()),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Value::Int)
                .or_else(|_| s.parse::<f64>().map(Value::Float))
                .ok()
        }
        _ => None,
    }
}

fn as_float(v: &Value) -> f64 {
    match v {
        Value::Int(i) => *i as f64,
        Value::Float(x) => *x,
        _ => f64::NAN,
    }
}

fn eval_node(node: &Node) -> Result<Value, String> {
    match node {
        Node::Lit(v) => Ok(v.clone()),
        Node::Global(_) => Ok(Value::Nil),
        Node::Unary(op, x) => {
            let x = eval_node(x)?;
            match *op {
                "not" => Ok(Value::Bool(!truthy(&x))),
                "#" => match &x {
                    Value::String(s) => Ok(Value::Int(s.len() as i64)),
                    other => Err(format!("attempt to get length of a {} value", lua_type(other))),
                },
                _ => match number_of(&x) {
                    Some(Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
                    Some(n) => Ok(Value::Float(-as_float(&n))),
                    None => Err(format!("attempt to perform arithmetic on a {} value", lua_type(&x))),
                },
            }
        }
        Node::Binary("and", x, y) => {
            let x = eval_node(x)?;
            if truthy(&x) {
                eval_node(y)
            } else {
                Ok(x)
            }
        }
        Node::Binary("or", x, y) => {
            let x = eval_node(x)?;
            if truthy(&x) {
                Ok(x)
            } else {
                eval_node(y)
            }
        }
        Node::Binary(op, x, y) => {
            let x = eval_node(x)?;
            let y = eval_node(y)?;
            binary(op, &x, &y)
        }
    }
}

fn binary(op: &str, x: &Value, y: &Value) -> Result<Value, String> {
    match op {
        ".." => {
            let piece = |v: &Value| match v {
                Value::String(s) => Ok(s.clone()),
                Value::Int(_) | Value::Float(_) => Ok(v.to_string()),
                other => Err(format!("attempt to concatenate a {} value", lua_type(other))),
            };
            Ok(Value::String(piece(x)? + &piece(y)?))
        }
        "==" => Ok(Value::Bool(x == y)),
        "~=" => Ok(Value::Bool(x != y)),
        "<" | "<=" | ">" | ">=" => {
            let ordering = match (x, y) {
                (Value::String(a), Value::String(b)) => a.partial_cmp(b),
                (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                    as_float(x).partial_cmp(&as_float(y))
                }
                _ => return Err(format!("attempt to compare {} with {}", lua_type(x), lua_type(y))),
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                "<" => ordering.is_lt(),
                "<=" => ordering.is_le(),
                ">" => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        _ => {
            let (Some(a), Some(b)) = (number_of(x), number_of(y)) else {
                let bad = if number_of(x).is_none() { x } else { y };
                return Err(format!("attempt to perform arithmetic on a {} value", lua_type(bad)));
            };
            arith(op, &a, &b)
        }
    }
}

fn arith(op: &str, a: &Value, b: &Value) -> Result<Value, String> {
    if let (Value::Int(a), Value::Int(b)) = (a, b) {
        let (a, b) = (*a, *b);
        match op {
            "+" => return Ok(Value::Int(a.wrapping_add(b))),
            "-" => return Ok(Value::Int(a.wrapping_sub(b))),
            "*" => return Ok(Value::Int(a.wrapping_mul(b))),
            "%" => {
                if b == 0 {
                    return Err("attempt to perform 'n%0'".to_string());
                }
                let m = a.wrapping_rem(b);
                return Ok(Value::Int(if m != 0 && (m ^ b) < 0 { m + b } else { m }));
            }
            _ => {}
        }
    }
    let (a, b) = (as_float(a), as_float(b));
    Ok(Value::Float(match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => a / b,
        "%" => a - (a / b).floor() * b,
        _ => a.powf(b),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_int64_suffixes() {
        assert_eq!(eval("3LL + 4LL").unwrap(), Value::Int(7));
        assert_eq!(eval("18446744073709551615ULL").unwrap(), Value::Int(-1));
        assert!(eval("3LX").is_err());
        assert!(eval("1.5LL").is_err());
    }

    #[test]
    fn test_concatenation() {
        assert_eq!(eval("\"hello \" .. \"world\"").unwrap(), Value::String("hello world".to_string()));
        assert_eq!(eval("'n=' .. 1 + 2").unwrap(), Value::String("n=3".to_string()));
        assert_eq!(eval("[[raw]] .. 'x'").unwrap(), Value::String("rawx".to_string()));
        assert_eq!(
            eval("\"a\" .. true").unwrap_err(),
            "attempt to concatenate a boolean value"
        );
    }

    #[test]
    fn test_expression_grammar() {
        assert_eq!(eval("(1 + 2) * 3").unwrap(), Value::Int(9));
        assert_eq!(eval("7 / 2").unwrap(), Value::Float(3.5));
        assert_eq!(eval("-7 % 3").unwrap(), Value::Int(2));
        assert_eq!(eval("2 ^ 3 ^ 2").unwrap(), Value::Float(512.0));
        assert_eq!(eval("\"10\" + 1").unwrap(), Value::Int(11));
        assert_eq!(eval("#\"abc\"").unwrap(), Value::Int(3));
        assert_eq!(eval("0x10").unwrap(), Value::Int(16));
        assert_eq!(eval("1 ~= 2 and not nil").unwrap(), Value::Bool(true));
        assert_eq!(eval("nil or 'x'").unwrap(), Value::String("x".to_string()));
        assert_eq!(eval("false and undefined + 1").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_errors() {
        assert_eq!(eval("nil + 1").unwrap_err(), "attempt to perform arithmetic on a nil value");
        assert_eq!(eval("1 < 'a'").unwrap_err(), "attempt to compare number with string");
        assert!(eval("(1 + 2").is_err());
        assert!(eval("'open").is_err());
    }
}
