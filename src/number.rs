//! Exact decimal arithmetic for numeric keywords.
//!
//! Numeric assertions compare the decimal digits a number was written with,
//! not its binary floating-point image, so `0.3` is a multiple of `0.1` and
//! `1.0` is an integer. Digits are kept as arbitrary-length vectors; the
//! only operations needed are comparison and remainder.

use serde_json::{Number, Value};
use std::cmp::Ordering;

/// A normalized decimal: `digits * 10^exp`, most significant digit first,
/// no leading or trailing zeros. Zero is the empty digit string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decimal {
    negative: bool,
    digits: Vec<u8>,
    exp: i64,
}

impl Decimal {
    pub fn from_number(n: &Number) -> Decimal {
        Decimal::parse(&n.to_string())
            .expect("unreachable: serde_json numbers are valid decimal literals")
    }

    pub fn parse(s: &str) -> Option<Decimal> {
        let mut rest = s;
        let negative = if rest.starts_with('-') {
            rest = &rest[1..];
            true
        } else {
            if rest.starts_with('+') {
                rest = &rest[1..];
            }
            false
        };

        let mut digits = Vec::new();
        let mut exp: i64 = 0;
        let mut seen_digit = false;
        let mut seen_point = false;
        let mut chars = rest.char_indices();

        while let Some((at, c)) = chars.next() {
            match c {
                '0'..='9' => {
                    seen_digit = true;
                    digits.push(c as u8 - b'0');
                    if seen_point {
                        exp -= 1;
                    }
                }
                '.' if !seen_point => seen_point = true,
                'e' | 'E' => {
                    let e: i64 = rest[at + 1..].parse().ok()?;
                    exp = exp.checked_add(e)?;
                    if !seen_digit {
                        return None;
                    }
                    return Some(Decimal::normalized(negative, digits, exp));
                }
                _ => return None,
            }
        }

        if !seen_digit {
            return None;
        }

        Some(Decimal::normalized(negative, digits, exp))
    }

    fn normalized(negative: bool, mut digits: Vec<u8>, mut exp: i64) -> Decimal {
        let leading = digits.iter().take_while(|&&d| d == 0).count();
        digits.drain(..leading);

        while digits.last() == Some(&0) {
            digits.pop();
            exp += 1;
        }

        if digits.is_empty() {
            return Decimal {
                negative: false,
                digits,
                exp: 0,
            };
        }

        Decimal {
            negative,
            digits,
            exp,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn is_negative(&self) -> bool {
        self.negative && !self.is_zero()
    }

    /// Whether the value has no fractional part.
    pub fn is_integer(&self) -> bool {
        self.exp >= 0
    }

    /// Whether `self` is an exact integer multiple of `factor`.
    ///
    /// A zero factor never divides anything.
    pub fn is_multiple_of(&self, factor: &Decimal) -> bool {
        if factor.is_zero() {
            return false;
        }

        if self.is_zero() {
            return true;
        }

        // Scale both to integers sharing an exponent, then check divisibility.
        let shift = self.exp - factor.exp;
        let (mut dividend, mut divisor) = (self.digits.clone(), factor.digits.clone());
        if shift >= 0 {
            dividend.extend(std::iter::repeat(0).take(shift as usize));
        } else {
            divisor.extend(std::iter::repeat(0).take(-shift as usize));
        }

        remainder_is_zero(&dividend, &divisor)
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Decimal) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Decimal) -> Ordering {
        match (self.is_zero(), other.is_zero()) {
            (true, true) => return Ordering::Equal,
            (true, false) => {
                return if other.negative {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (false, true) => {
                return if self.negative {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (false, false) => {}
        }

        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.cmp_magnitude(other),
            (true, true) => other.cmp_magnitude(self),
        }
    }
}

impl Decimal {
    fn cmp_magnitude(&self, other: &Decimal) -> Ordering {
        // Position of the most significant digit; both are nonzero here.
        let msd_self = self.digits.len() as i64 + self.exp;
        let msd_other = other.digits.len() as i64 + other.exp;
        if msd_self != msd_other {
            return msd_self.cmp(&msd_other);
        }

        let len = self.digits.len().max(other.digits.len());
        for i in 0..len {
            let a = self.digits.get(i).copied().unwrap_or(0);
            let b = other.digits.get(i).copied().unwrap_or(0);
            if a != b {
                return a.cmp(&b);
            }
        }

        Ordering::Equal
    }
}

fn remainder_is_zero(dividend: &[u8], divisor: &[u8]) -> bool {
    let mut rem: Vec<u8> = Vec::with_capacity(divisor.len() + 1);
    for &digit in dividend {
        rem.push(digit);
        let leading = rem.iter().take_while(|&&d| d == 0).count();
        rem.drain(..leading);

        while digits_cmp(&rem, divisor) != Ordering::Less {
            digits_sub(&mut rem, divisor);
            let leading = rem.iter().take_while(|&&d| d == 0).count();
            rem.drain(..leading);
        }
    }

    rem.is_empty()
}

fn digits_cmp(a: &[u8], b: &[u8]) -> Ordering {
    let b_lead = b.iter().take_while(|&&d| d == 0).count();
    let b = &b[b_lead..];
    if a.len() != b.len() {
        return a.len().cmp(&b.len());
    }

    a.cmp(b)
}

fn digits_sub(a: &mut Vec<u8>, b: &[u8]) {
    let b_lead = b.iter().take_while(|&&d| d == 0).count();
    let b = &b[b_lead..];
    let offset = a.len() - b.len();

    let mut borrow = 0i8;
    for i in (0..a.len()).rev() {
        let sub = if i >= offset { b[i - offset] as i8 } else { 0 };
        let mut d = a[i] as i8 - sub - borrow;
        if d < 0 {
            d += 10;
            borrow = 1;
        } else {
            borrow = 0;
        }
        a[i] = d as u8;
    }
}

/// Structural equality with exact decimal comparison on numbers, so that
/// `1` and `1.0` are the same value.
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            Decimal::from_number(x).cmp(&Decimal::from_number(y)) == Ordering::Equal
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| json_eq(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map(|w| json_eq(v, w)).unwrap_or(false))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        Decimal::parse(s).unwrap()
    }

    #[test]
    fn parse_forms() {
        assert_eq!(dec("1.0"), dec("1"));
        assert_eq!(dec("0.10"), dec("1e-1"));
        assert_eq!(dec("-0"), dec("0"));
        assert_eq!(dec("12e2"), dec("1200"));
        assert_eq!(dec("2.5E-3"), dec("0.0025"));
        assert!(Decimal::parse("abc").is_none());
        assert!(Decimal::parse(".").is_none());
        assert!(Decimal::parse("1e").is_none());
    }

    #[test]
    fn integer_detection() {
        assert!(dec("1.0").is_integer());
        assert!(dec("100").is_integer());
        assert!(dec("1e25").is_integer());
        assert!(dec("0").is_integer());
        assert!(!dec("1.5").is_integer());
        assert!(!dec("1e-1").is_integer());
    }

    #[test]
    fn ordering() {
        assert!(dec("1.5") < dec("2"));
        assert!(dec("-1.5") > dec("-2"));
        assert!(dec("0.3") > dec("0.1"));
        assert!(dec("10") > dec("9.999"));
        assert!(dec("-0.1") < dec("0"));
        assert_eq!(dec("100").cmp(&dec("1e2")), Ordering::Equal);
    }

    #[test]
    fn multiples() {
        // The binary-float counterexample: 0.3 % 0.1 != 0 in f64.
        assert!(dec("0.3").is_multiple_of(&dec("0.1")));
        assert!(dec("9").is_multiple_of(&dec("3")));
        assert!(dec("4.5").is_multiple_of(&dec("1.5")));
        assert!(dec("0").is_multiple_of(&dec("7")));
        assert!(!dec("10").is_multiple_of(&dec("3")));
        assert!(!dec("0.31").is_multiple_of(&dec("0.1")));
        assert!(!dec("1").is_multiple_of(&dec("0")));
        assert!(dec("1e10").is_multiple_of(&dec("2500")));
    }

    #[test]
    fn value_equality() {
        assert!(json_eq(&json!(1), &json!(1.0)));
        assert!(json_eq(&json!([1, {"a": 2.0}]), &json!([1.0, {"a": 2}])));
        assert!(!json_eq(&json!(1), &json!("1")));
        assert!(!json_eq(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!json_eq(&json!(1.5), &json!(1)));
    }
}
