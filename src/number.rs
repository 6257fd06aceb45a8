//! Numeric literals.
//!
//! Forms are tried in a fixed order: binary `0b`, octal `0o` or a bare
//! leading zero, hexadecimal `0x`, decimal with fraction and/or
//! exponent, decimal integer. Underscores inside digit runs are dropped
//! before conversion.

use crate::cursor::Cursor;

/// Converted value of a numeric literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

/// Why a numeric literal could not be scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberError {
    /// Digits are followed by a word character, or a radix prefix has
    /// no digits.
    Shape,
    /// The value does not fit.
    Overflow,
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_digit_or_underscore(b: u8) -> bool {
    b.is_ascii_digit() || b == b'_'
}

fn strip_underscores(digits: &str) -> String {
    digits.chars().filter(|&c| c != '_').collect()
}

fn radix_value(digits: &str, radix: u32) -> Result<i64, NumberError> {
    let digits = strip_underscores(digits);
    if digits.is_empty() {
        return Ok(0);
    }
    i64::from_str_radix(&digits, radix).map_err(|_| NumberError::Overflow)
}

/// Scan a numeric literal at the cursor, which must sit on an ASCII
/// digit. On error the cursor position is unspecified.
pub fn scan_number(cursor: &mut Cursor<'_>) -> Result<Number, NumberError> {
    if cursor.peek() == Some(b'0') {
        match cursor.peek_at(1) {
            Some(b'b' | b'B') => {
                return scan_radix(cursor, 2, |b| matches!(b, b'0' | b'1' | b'_'));
            }
            Some(b'o' | b'O') => {
                return scan_radix(cursor, 8, |b| matches!(b, b'0'..=b'7' | b'_'));
            }
            Some(b'0'..=b'7' | b'_') => {
                cursor.advance(1);
                let digits = cursor.eat_while(|b| matches!(b, b'0'..=b'7' | b'_'));
                return radix_value(digits, 8).map(Number::Integer);
            }
            Some(b'x' | b'X') => {
                return scan_radix(cursor, 16, |b| b.is_ascii_hexdigit() || b == b'_');
            }
            _ => {}
        }
    }

    if let Some(len) = float_len(cursor) {
        let start = cursor.pos();
        cursor.advance(len);
        let text = strip_underscores(&cursor.source()[start..cursor.pos()]);
        return text
            .parse::<f64>()
            .map(Number::Float)
            .map_err(|_| NumberError::Shape);
    }

    let digits = cursor.eat_while(is_digit_or_underscore);
    if cursor.check(is_word) {
        return Err(NumberError::Shape);
    }
    radix_value(digits, 10).map(Number::Integer)
}

fn scan_radix(
    cursor: &mut Cursor<'_>,
    radix: u32,
    is_digit: impl Fn(u8) -> bool,
) -> Result<Number, NumberError> {
    cursor.advance(2);
    let digits = cursor.eat_while(is_digit);
    if digits.is_empty() {
        return Err(NumberError::Shape);
    }
    radix_value(digits, radix).map(Number::Integer)
}

/// Length of a float literal at the cursor, if one is there:
/// `D.D` or `D(.D)?[eE][+-]?D`, not followed by a word character.
fn float_len(cursor: &Cursor<'_>) -> Option<usize> {
    let mut len = cursor.run_len(0, is_digit_or_underscore);
    let mut is_float = false;

    if cursor.peek_at(len) == Some(b'.') {
        let frac = cursor.run_len(len + 1, is_digit_or_underscore);
        if frac > 0 {
            len += 1 + frac;
            is_float = true;
        }
    }

    if matches!(cursor.peek_at(len), Some(b'e' | b'E')) {
        let mut exp = len + 1;
        if matches!(cursor.peek_at(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let digits = cursor.run_len(exp, is_digit_or_underscore);
        if digits > 0 {
            len = exp + digits;
            is_float = true;
        }
    }

    let boundary = !cursor.peek_at(len).is_some_and(is_word);
    (is_float && boundary).then_some(len)
}
