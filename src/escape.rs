// Decode backslash escape sequences
//
// SPDX-License-Identifier: MIT
//
// This file is part of the sedr package.
// It is licensed under the MIT License.
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::script_cursor::ScriptCursor;
use std::char;

fn is_ascii_octal_digit(c: char) -> bool {
    matches!(c, '0'..='7')
}

/// Decode a numeric escape of up to `ndigits` digits in the given radix,
/// advancing the cursor past the digits consumed. `None`, with the
/// cursor restored, if no digit is present or the value is not a scalar.
fn decode_numeric(
    cursor: &mut ScriptCursor,
    is_digit: fn(char) -> bool,
    ndigits: u32,
    radix: u32,
) -> Option<char> {
    let start = cursor.pos();
    let mut digits = String::new();

    for _ in 0..ndigits {
        match cursor.peek() {
            Some(c) if is_digit(c) => {
                digits.push(c);
                cursor.bump();
            }
            _ => break,
        }
    }

    let decoded = if digits.is_empty() {
        None
    } else {
        u32::from_str_radix(&digits, radix).ok().and_then(char::from_u32)
    };
    if decoded.is_none() {
        cursor.rewind(start);
    }
    decoded
}

/// Map a character to its control-character counterpart: uppercase it,
/// then invert bit 6 of the ASCII value. `None` outside ASCII.
fn control_char(c: char) -> Option<char> {
    if !c.is_ascii() {
        return None;
    }
    char::from_u32((c.to_ascii_uppercase() as u32) ^ 0x40)
}

/// Decode the escape sequence under the cursor, which sits just past the
/// backslash. On success the cursor is advanced past the sequence;
/// `None` leaves it untouched for the caller to handle.
///
/// The sequences valid in every context (patterns, replacements,
/// transliterations, text arguments) are the C-style single letters, a
/// control escape \cX, numeric escapes \dnnn, \onnn, \xnn, and a code
/// point escape \uhhhh.
pub fn decode_escape(cursor: &mut ScriptCursor) -> Option<char> {
    match cursor.peek() {
        Some('a') => {
            cursor.bump();
            Some('\x07')
        }
        Some('b') => {
            cursor.bump();
            Some('\x08')
        }
        Some('f') => {
            cursor.bump();
            Some('\x0c')
        }
        Some('n') => {
            cursor.bump();
            Some('\n')
        }
        Some('r') => {
            cursor.bump();
            Some('\r')
        }
        Some('t') => {
            cursor.bump();
            Some('\t')
        }
        Some('v') => {
            cursor.bump();
            Some('\x0b')
        }

        Some('c') => {
            cursor.bump();
            match cursor.peek().and_then(control_char) {
                Some(decoded) => {
                    cursor.bump();
                    Some(decoded)
                }
                // A lone \c stands for itself.
                None => Some('c'),
            }
        }

        Some('d') => {
            cursor.bump();
            decode_numeric(cursor, |c| c.is_ascii_digit(), 3, 10).or(Some('d'))
        }

        Some('o') => {
            cursor.bump();
            decode_numeric(cursor, is_ascii_octal_digit, 3, 8).or(Some('o'))
        }

        Some('x') => {
            cursor.bump();
            decode_numeric(cursor, |c| c.is_ascii_hexdigit(), 2, 16).or(Some('x'))
        }

        Some('u') => {
            cursor.bump();
            decode_numeric(cursor, |c| c.is_ascii_hexdigit(), 4, 16).or(Some('u'))
        }

        _ => None,
    }
}
