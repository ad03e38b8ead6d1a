//! Exact values of constant expressions
//!
//! Integers are held as `i128`, wide enough for every sized integer type plus
//! the untyped intermediate results the prompt produces in practice.

use std::cmp::Ordering;
use std::fmt;

use crate::ast::{BinaryOp, UnaryOp};
use crate::types::BasicKind;

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    Int(i128),
    Float(f64),
    String(String),
}

/// Why a constant operation has no result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstError {
    Overflow,
    DivByZero,
    Mismatch,
    NegativeShift,
}

impl fmt::Display for ConstError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstError::Overflow => write!(f, "constant overflow"),
            ConstError::DivByZero => write!(f, "division by zero"),
            ConstError::Mismatch => write!(f, "mismatched constant operands"),
            ConstError::NegativeShift => write!(f, "negative shift count"),
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Bool(b) => write!(f, "{}", b),
            ConstValue::Int(i) => write!(f, "{}", i),
            ConstValue::Float(x) => {
                if x.fract() == 0.0 && x.abs() < 1e21 {
                    write!(f, "{}", *x as i128)
                } else {
                    write!(f, "{}", x)
                }
            }
            ConstValue::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl ConstValue {
    pub fn as_int(&self) -> Option<i128> {
        match self {
            ConstValue::Int(i) => Some(*i),
            ConstValue::Float(f) if f.fract() == 0.0 && f.abs() < 1.7e38 => Some(*f as i128),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConstValue::Int(i) => Some(*i as f64),
            ConstValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ConstValue::Int(_) | ConstValue::Float(_))
    }

    /// Brings two numeric operands to the same representation
    fn match_kinds(x: &ConstValue, y: &ConstValue) -> Result<(ConstValue, ConstValue), ConstError> {
        match (x, y) {
            (ConstValue::Int(_), ConstValue::Float(b)) => {
                Ok((ConstValue::Float(x.as_float().ok_or(ConstError::Mismatch)?), ConstValue::Float(*b)))
            }
            (ConstValue::Float(a), ConstValue::Int(_)) => {
                Ok((ConstValue::Float(*a), ConstValue::Float(y.as_float().ok_or(ConstError::Mismatch)?)))
            }
            _ => Ok((x.clone(), y.clone())),
        }
    }

    /// `x op y` for arithmetic, bitwise and logical operators.
    /// `int_div` selects truncated division for integer operands.
    pub fn binary_op(x: &ConstValue, op: BinaryOp, y: &ConstValue, int_div: bool) -> Result<ConstValue, ConstError> {
        let (x, y) = Self::match_kinds(x, y)?;
        match (&x, &y) {
            (ConstValue::Int(a), ConstValue::Int(b)) => {
                let (a, b) = (*a, *b);
                let value = match op {
                    BinaryOp::Add => a.checked_add(b),
                    BinaryOp::Sub => a.checked_sub(b),
                    BinaryOp::Mul => a.checked_mul(b),
                    BinaryOp::Div => {
                        if b == 0 {
                            return Err(ConstError::DivByZero);
                        }
                        if !int_div {
                            return Ok(ConstValue::Float(a as f64 / b as f64));
                        }
                        a.checked_div(b)
                    }
                    BinaryOp::Rem => {
                        if b == 0 {
                            return Err(ConstError::DivByZero);
                        }
                        a.checked_rem(b)
                    }
                    BinaryOp::And => Some(a & b),
                    BinaryOp::Or => Some(a | b),
                    BinaryOp::Xor => Some(a ^ b),
                    BinaryOp::AndNot => Some(a & !b),
                    _ => return Err(ConstError::Mismatch),
                };
                value.map(ConstValue::Int).ok_or(ConstError::Overflow)
            }
            (ConstValue::Float(a), ConstValue::Float(b)) => {
                let value = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => {
                        if *b == 0.0 {
                            return Err(ConstError::DivByZero);
                        }
                        a / b
                    }
                    _ => return Err(ConstError::Mismatch),
                };
                if value.is_finite() {
                    Ok(ConstValue::Float(value))
                } else {
                    Err(ConstError::Overflow)
                }
            }
            (ConstValue::String(a), ConstValue::String(b)) if op == BinaryOp::Add => {
                Ok(ConstValue::String(format!("{}{}", a, b)))
            }
            (ConstValue::Bool(a), ConstValue::Bool(b)) => match op {
                BinaryOp::LogAnd => Ok(ConstValue::Bool(*a && *b)),
                BinaryOp::LogOr => Ok(ConstValue::Bool(*a || *b)),
                _ => Err(ConstError::Mismatch),
            },
            _ => Err(ConstError::Mismatch),
        }
    }

    pub fn unary_op(op: UnaryOp, x: &ConstValue, unsigned_bits: Option<u32>) -> Result<ConstValue, ConstError> {
        match (op, x) {
            (UnaryOp::Plus, v) if v.is_numeric() => Ok(v.clone()),
            (UnaryOp::Neg, ConstValue::Int(i)) => i.checked_neg().map(ConstValue::Int).ok_or(ConstError::Overflow),
            (UnaryOp::Neg, ConstValue::Float(f)) => Ok(ConstValue::Float(-f)),
            (UnaryOp::Xor, ConstValue::Int(i)) => match unsigned_bits {
                // ^x for unsigned x flips only the bits of its size
                Some(bits) => {
                    let mask: i128 = if bits >= 127 { i128::MAX } else { (1i128 << bits) - 1 };
                    Ok(ConstValue::Int(!i & mask))
                }
                None => Ok(ConstValue::Int(!i)),
            },
            (UnaryOp::Not, ConstValue::Bool(b)) => Ok(ConstValue::Bool(!b)),
            _ => Err(ConstError::Mismatch),
        }
    }

    pub fn shift(x: &ConstValue, op: BinaryOp, count: u32) -> Result<ConstValue, ConstError> {
        let value = x.as_int().ok_or(ConstError::Mismatch)?;
        match op {
            BinaryOp::Shl => {
                if count >= 127 {
                    return if value == 0 { Ok(ConstValue::Int(0)) } else { Err(ConstError::Overflow) };
                }
                let shifted = value.checked_shl(count).ok_or(ConstError::Overflow)?;
                if shifted >> count != value {
                    return Err(ConstError::Overflow);
                }
                Ok(ConstValue::Int(shifted))
            }
            BinaryOp::Shr => {
                let count = count.min(127);
                Ok(ConstValue::Int(value >> count))
            }
            _ => Err(ConstError::Mismatch),
        }
    }

    pub fn compare(x: &ConstValue, op: BinaryOp, y: &ConstValue) -> Result<bool, ConstError> {
        let (x, y) = Self::match_kinds(x, y)?;
        let ordering = match (&x, &y) {
            (ConstValue::Int(a), ConstValue::Int(b)) => a.cmp(b),
            (ConstValue::Float(a), ConstValue::Float(b)) => a.partial_cmp(b).ok_or(ConstError::Mismatch)?,
            (ConstValue::String(a), ConstValue::String(b)) => a.cmp(b),
            (ConstValue::Bool(a), ConstValue::Bool(b)) => {
                return match op {
                    BinaryOp::Eq => Ok(a == b),
                    BinaryOp::Ne => Ok(a != b),
                    _ => Err(ConstError::Mismatch),
                }
            }
            _ => return Err(ConstError::Mismatch),
        };
        Ok(match op {
            BinaryOp::Eq => ordering == Ordering::Equal,
            BinaryOp::Ne => ordering != Ordering::Equal,
            BinaryOp::Lt => ordering == Ordering::Less,
            BinaryOp::Le => ordering != Ordering::Greater,
            BinaryOp::Gt => ordering == Ordering::Greater,
            BinaryOp::Ge => ordering != Ordering::Less,
            _ => return Err(ConstError::Mismatch),
        })
    }

    /// The value as it would be stored in a variable of `kind`, or None when
    /// it does not fit. Floats with no fractional part convert to integers.
    pub fn representable(&self, kind: BasicKind) -> Option<ConstValue> {
        use BasicKind::*;
        match kind {
            Bool | UntypedBool => matches!(self, ConstValue::Bool(_)).then(|| self.clone()),
            String | UntypedString => matches!(self, ConstValue::String(_)).then(|| self.clone()),
            Float32 | Float64 | UntypedFloat => {
                let f = self.as_float()?;
                if kind == Float32 && f.abs() > f32::MAX as f64 {
                    return None;
                }
                let f = if kind == Float32 { f as f32 as f64 } else { f };
                Some(ConstValue::Float(f))
            }
            UntypedInt | UntypedRune => {
                let i = self.as_int()?;
                Some(ConstValue::Int(i))
            }
            _ => {
                let i = self.as_int()?;
                let (min, max) = kind.int_range()?;
                (min..=max).contains(&i).then_some(ConstValue::Int(i))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_int_arithmetic() {
        let seven = ConstValue::binary_op(&ConstValue::Int(3), BinaryOp::Add, &ConstValue::Int(4), true);
        assert_eq!(seven, Ok(ConstValue::Int(7)));
        let trunc = ConstValue::binary_op(&ConstValue::Int(7), BinaryOp::Div, &ConstValue::Int(2), true);
        assert_eq!(trunc, Ok(ConstValue::Int(3)));
    }

    #[test]
    fn test_untyped_int_in_float_context() {
        let half = ConstValue::binary_op(&ConstValue::Int(1), BinaryOp::Div, &ConstValue::Float(2.0), true);
        assert_eq!(half, Ok(ConstValue::Float(0.5)));
    }

    #[test]
    fn test_division_by_zero() {
        let err = ConstValue::binary_op(&ConstValue::Int(1), BinaryOp::Div, &ConstValue::Int(0), true);
        assert_eq!(err, Err(ConstError::DivByZero));
    }

    #[test]
    fn test_overflow() {
        let err = ConstValue::binary_op(&ConstValue::Int(i128::MAX), BinaryOp::Add, &ConstValue::Int(1), true);
        assert_eq!(err, Err(ConstError::Overflow));
        assert_eq!(ConstValue::shift(&ConstValue::Int(1), BinaryOp::Shl, 200), Err(ConstError::Overflow));
    }

    #[test]
    fn test_representable() {
        assert_eq!(ConstValue::Int(300).representable(BasicKind::Uint8), None);
        assert_eq!(ConstValue::Int(255).representable(BasicKind::Uint8), Some(ConstValue::Int(255)));
        assert_eq!(ConstValue::Float(2.0).representable(BasicKind::Int), Some(ConstValue::Int(2)));
        assert_eq!(ConstValue::Float(2.5).representable(BasicKind::Int), None);
        assert_eq!(ConstValue::Int(-1).representable(BasicKind::Uint), None);
    }

    #[test]
    fn test_compare_and_complement() {
        assert_eq!(ConstValue::compare(&ConstValue::Int(1), BinaryOp::Lt, &ConstValue::Float(1.5)), Ok(true));
        assert_eq!(ConstValue::unary_op(UnaryOp::Xor, &ConstValue::Int(0), Some(8)), Ok(ConstValue::Int(255)));
        assert_eq!(ConstValue::unary_op(UnaryOp::Xor, &ConstValue::Int(0), None), Ok(ConstValue::Int(-1)));
    }
}
