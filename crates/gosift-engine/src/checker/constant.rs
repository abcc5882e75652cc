//! Compile-time constant values and arithmetic.

use std::fmt;

use crate::checker::types::BasicKind;
use crate::parser::ast::LitKind;
use crate::parser::literal::{unquote_char, unquote_string};
use crate::parser::TokenKind;

/// A constant value. Integers are exact within `i128`; floats use `f64`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    String(String),
    Int(i128),
    Float(f64),
    /// A value we cannot represent (complex numbers, overflowed arithmetic).
    Unknown,
}

/// Why a constant doesn't fit a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReprError {
    Overflows,
    Truncated,
    /// Wrong kind altogether (a string for an int, say).
    Mismatch,
}

impl ConstValue {
    /// Value of a literal token.
    pub fn from_literal(kind: LitKind, text: &str) -> ConstValue {
        match kind {
            LitKind::Int => parse_int(text).map_or(ConstValue::Unknown, ConstValue::Int),
            LitKind::Float => parse_float(text).map_or(ConstValue::Unknown, normalize_float),
            LitKind::Imag => ConstValue::Unknown,
            LitKind::Char => {
                unquote_char(text).map_or(ConstValue::Unknown, |c| ConstValue::Int(c as i128))
            }
            LitKind::String => unquote_string(text).map_or(ConstValue::Unknown, ConstValue::String),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ConstValue::Unknown)
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            ConstValue::Int(v) => Some(*v),
            ConstValue::Float(f) if f.fract() == 0.0 && f.abs() < 1e38 => Some(*f as i128),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConstValue::Int(v) => Some(*v as f64),
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

    pub fn is_zero(&self) -> bool {
        match self {
            ConstValue::Int(v) => *v == 0,
            ConstValue::Float(f) => *f == 0.0,
            _ => false,
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            ConstValue::Int(v) => *v < 0,
            ConstValue::Float(f) => *f < 0.0,
            _ => false,
        }
    }
}

fn parse_int(text: &str) -> Option<i128> {
    let clean: String = text.chars().filter(|c| *c != '_').collect();
    let lower = clean.to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (&lower[1..], 8)
    } else {
        (lower.as_str(), 10)
    };
    i128::from_str_radix(digits, radix).ok()
}

fn parse_float(text: &str) -> Option<f64> {
    let clean: String = text.chars().filter(|c| *c != '_').collect();
    let lower = clean.to_ascii_lowercase();
    match lower.strip_prefix("0x") {
        Some(hex) => parse_hex_float(hex),
        None => lower.parse().ok(),
    }
}

fn parse_hex_float(text: &str) -> Option<f64> {
    let (mantissa, exp) = match text.split_once('p') {
        Some((m, e)) => (m, e.parse::<i32>().ok()?),
        None => (text, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let mut value = 0f64;
    for c in int_part.chars() {
        value = value * 16.0 + c.to_digit(16)? as f64;
    }
    let mut scale = 1.0 / 16.0;
    for c in frac_part.chars() {
        value += c.to_digit(16)? as f64 * scale;
        scale /= 16.0;
    }
    Some(value * 2f64.powi(exp))
}

/// Integral float values are kept as integers, like exact constants.
fn normalize_float(f: f64) -> ConstValue {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e36 {
        ConstValue::Int(f as i128)
    } else if f.is_finite() {
        ConstValue::Float(f)
    } else {
        ConstValue::Unknown
    }
}

/// Apply a binary arithmetic or logical operator.
///
/// `integer` selects truncated integer division. Division by zero must be
/// rejected by the caller.
pub fn binary_op(x: &ConstValue, op: TokenKind, y: &ConstValue, integer: bool) -> ConstValue {
    use ConstValue::{Bool, Float, Int, String, Unknown};
    use TokenKind::{Add, And, AndNot, LAnd, LOr, Mul, Or, Quo, Rem, Sub, Xor};
    match (x, y) {
        (Bool(a), Bool(b)) => match op {
            LAnd => Bool(*a && *b),
            LOr => Bool(*a || *b),
            _ => Unknown,
        },
        (String(a), String(b)) if op == Add => String(format!("{a}{b}")),
        (Int(a), Int(b)) => {
            let (a, b) = (*a, *b);
            let value = match op {
                Add => a.checked_add(b),
                Sub => a.checked_sub(b),
                Mul => a.checked_mul(b),
                Quo if integer => a.checked_div(b),
                Quo => return normalize_float(a as f64 / b as f64),
                Rem => a.checked_rem(b),
                And => Some(a & b),
                Or => Some(a | b),
                Xor => Some(a ^ b),
                AndNot => Some(a & !b),
                _ => None,
            };
            value.map_or(Unknown, Int)
        }
        (Int(_) | Float(_), Int(_) | Float(_)) => {
            let (Some(a), Some(b)) = (x.as_float(), y.as_float()) else {
                return Unknown;
            };
            let value = match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Quo if integer => (a / b).trunc(),
                Quo => a / b,
                _ => return Unknown,
            };
            normalize_float(value)
        }
        _ => Unknown,
    }
}

/// Evaluate a comparison. `None` if the operands can't be compared.
pub fn compare(x: &ConstValue, op: TokenKind, y: &ConstValue) -> Option<bool> {
    use std::cmp::Ordering;
    use TokenKind::*;
    let ord = match (x, y) {
        (ConstValue::Bool(a), ConstValue::Bool(b)) => {
            return match op {
                Eql => Some(a == b),
                Neq => Some(a != b),
                _ => None,
            }
        }
        (ConstValue::String(a), ConstValue::String(b)) => a.cmp(b),
        (ConstValue::Int(a), ConstValue::Int(b)) => a.cmp(b),
        _ => x.as_float()?.partial_cmp(&y.as_float()?)?,
    };
    Some(match op {
        Eql => ord == Ordering::Equal,
        Neq => ord != Ordering::Equal,
        Lss => ord == Ordering::Less,
        Leq => ord != Ordering::Greater,
        Gtr => ord == Ordering::Greater,
        Geq => ord != Ordering::Less,
        _ => return None,
    })
}

/// Apply a unary operator. `unsigned_bits` is the width for `^x` on
/// unsigned types.
pub fn unary_op(op: TokenKind, x: &ConstValue, unsigned_bits: Option<u32>) -> ConstValue {
    use ConstValue::*;
    match (op, x) {
        (TokenKind::Add, Int(_) | Float(_)) => x.clone(),
        (TokenKind::Sub, Int(v)) => v.checked_neg().map_or(Unknown, Int),
        (TokenKind::Sub, Float(f)) => Float(-f),
        (TokenKind::Not, Bool(b)) => Bool(!b),
        (TokenKind::Xor, Int(v)) => match unsigned_bits {
            Some(bits) if bits < 128 => Int(!v & ((1i128 << bits) - 1)),
            _ => Int(!v),
        },
        _ => Unknown,
    }
}

/// Shift `x` by `s` bits.
pub fn shift(x: &ConstValue, op: TokenKind, s: u64) -> ConstValue {
    let Some(v) = x.as_int() else {
        return ConstValue::Unknown;
    };
    match op {
        TokenKind::Shl => {
            if s >= 127 {
                return if v == 0 { ConstValue::Int(0) } else { ConstValue::Unknown };
            }
            v.checked_mul(1i128 << s).map_or(ConstValue::Unknown, ConstValue::Int)
        }
        TokenKind::Shr if s >= 127 => ConstValue::Int(if v < 0 { -1 } else { 0 }),
        TokenKind::Shr => ConstValue::Int(v >> s),
        _ => ConstValue::Unknown,
    }
}

fn int_range(kind: BasicKind, word_bits: u32) -> Option<(i128, i128)> {
    use BasicKind::*;
    let signed = |bits: u32| (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1);
    let unsigned = |bits: u32| (0, (1i128 << bits) - 1);
    Some(match kind.canonical() {
        Int8 => signed(8),
        Int16 => signed(16),
        Int32 => signed(32),
        Int64 => signed(64),
        Int => signed(word_bits),
        Uint8 => unsigned(8),
        Uint16 => unsigned(16),
        Uint32 => unsigned(32),
        Uint64 => unsigned(64),
        Uint | Uintptr => unsigned(word_bits),
        UntypedInt | UntypedRune => (i128::MIN, i128::MAX),
        _ => return None,
    })
}

/// Check that `value` can be represented by `kind`, returning the value
/// converted to that kind.
pub fn representable(
    value: &ConstValue,
    kind: BasicKind,
    word_size: u64,
) -> Result<ConstValue, ReprError> {
    if value.is_unknown() {
        return Ok(ConstValue::Unknown);
    }
    let word_bits = (word_size * 8) as u32;
    if kind.is_integer() {
        let v = match value {
            ConstValue::Int(v) => *v,
            ConstValue::Float(f) => {
                if f.fract() != 0.0 {
                    return Err(ReprError::Truncated);
                }
                if f.abs() >= 1.7e38 {
                    return Err(ReprError::Overflows);
                }
                *f as i128
            }
            _ => return Err(ReprError::Mismatch),
        };
        let (min, max) = int_range(kind, word_bits).ok_or(ReprError::Mismatch)?;
        return if v < min || v > max {
            Err(ReprError::Overflows)
        } else {
            Ok(ConstValue::Int(v))
        };
    }
    if kind.is_float() || kind.is_complex() {
        let f = value.as_float().ok_or(ReprError::Mismatch)?;
        let limit = if matches!(kind, BasicKind::Float32 | BasicKind::Complex64) {
            f32::MAX as f64
        } else {
            f64::MAX
        };
        if f.abs() > limit {
            return Err(ReprError::Overflows);
        }
        return Ok(match value {
            ConstValue::Int(_) => value.clone(),
            _ if matches!(kind, BasicKind::Float32 | BasicKind::Complex64) => {
                normalize_float(f as f32 as f64)
            }
            _ => value.clone(),
        });
    }
    match (kind, value) {
        (k, ConstValue::Bool(_)) if k.is_boolean() => Ok(value.clone()),
        (k, ConstValue::String(_)) if k.is_string() => Ok(value.clone()),
        _ => Err(ReprError::Mismatch),
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Bool(b) => write!(f, "{b}"),
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Float(x) => f.write_str(&format_float(*x)),
            ConstValue::String(s) => f.write_str(&quote_short(s)),
            ConstValue::Unknown => f.write_str("unknown"),
        }
    }
}

/// Quote a string the way Go prints string constants, eliding long ones.
fn quote_short(s: &str) -> String {
    const MAX: usize = 72;
    let mut out = String::from("\"");
    for (count, c) in s.chars().enumerate() {
        if count >= MAX {
            out.push_str("...");
            break;
        }
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `%.6g` formatting.
fn format_float(x: f64) -> String {
    if x == 0.0 {
        return "0".to_string();
    }
    let sci = format!("{x:.5e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if !(-4..6).contains(&exp) {
        let mantissa = trim_zeros(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exp.abs());
    }
    let decimals = (5 - exp).max(0) as usize;
    trim_zeros(&format!("{x:.decimals$}")).to_string()
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals() {
        assert_eq!(ConstValue::from_literal(LitKind::Int, "0x1F"), ConstValue::Int(31));
        assert_eq!(ConstValue::from_literal(LitKind::Int, "0o17"), ConstValue::Int(15));
        assert_eq!(ConstValue::from_literal(LitKind::Int, "017"), ConstValue::Int(15));
        assert_eq!(ConstValue::from_literal(LitKind::Int, "1_000"), ConstValue::Int(1000));
        assert_eq!(ConstValue::from_literal(LitKind::Float, "2.0"), ConstValue::Int(2));
        assert_eq!(ConstValue::from_literal(LitKind::Float, "1.5"), ConstValue::Float(1.5));
        assert_eq!(ConstValue::from_literal(LitKind::Float, "0x1p4"), ConstValue::Int(16));
        assert_eq!(ConstValue::from_literal(LitKind::Char, "'a'"), ConstValue::Int(97));
        assert_eq!(
            ConstValue::from_literal(LitKind::String, "\"hi\""),
            ConstValue::String("hi".into())
        );
    }

    #[test]
    fn test_arithmetic() {
        let two = ConstValue::Int(2);
        let seven = ConstValue::Int(7);
        assert_eq!(binary_op(&seven, TokenKind::Quo, &two, true), ConstValue::Int(3));
        assert_eq!(binary_op(&seven, TokenKind::Quo, &two, false), ConstValue::Float(3.5));
        assert_eq!(binary_op(&seven, TokenKind::Rem, &two, true), ConstValue::Int(1));
        assert_eq!(shift(&ConstValue::Int(1), TokenKind::Shl, 10), ConstValue::Int(1024));
        assert_eq!(compare(&two, TokenKind::Lss, &seven), Some(true));
        assert_eq!(unary_op(TokenKind::Xor, &ConstValue::Int(0), Some(8)), ConstValue::Int(255));
    }

    #[test]
    fn test_representable() {
        let big = ConstValue::Int(300);
        assert_eq!(representable(&big, BasicKind::Int8, 8), Err(ReprError::Overflows));
        assert_eq!(representable(&big, BasicKind::Int, 8), Ok(ConstValue::Int(300)));
        let huge = ConstValue::Int(1 << 40);
        assert_eq!(representable(&huge, BasicKind::Int, 4), Err(ReprError::Overflows));
        let half = ConstValue::Float(1.5);
        assert_eq!(representable(&half, BasicKind::Int, 8), Err(ReprError::Truncated));
        assert_eq!(
            representable(&ConstValue::Int(-1), BasicKind::Uint, 8),
            Err(ReprError::Overflows)
        );
        assert_eq!(
            representable(&ConstValue::String("x".into()), BasicKind::Int, 8),
            Err(ReprError::Mismatch)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ConstValue::Float(1.5).to_string(), "1.5");
        assert_eq!(ConstValue::Float(3.14159265).to_string(), "3.14159");
        assert_eq!(ConstValue::Float(1e100).to_string(), "1e+100");
        assert_eq!(ConstValue::Float(0.0001).to_string(), "0.0001");
        assert_eq!(ConstValue::String("a\"b".into()).to_string(), "\"a\\\"b\"");
    }
}
