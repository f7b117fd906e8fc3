//! JSON text handed to workflows as a string parameter.
//!
//! Items are separated by `", "` and keys by `": "`, every character outside
//! printable ASCII is written as a `\uXXXX` escape, and floats use the short
//! repr (`1e-05`, `1e+16`, `100.0`). Workflows written against the event
//! router's existing output compare this text directly.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Serializer, Value};

/// Floats leave fixed notation from this decimal exponent upwards.
const SCIENTIFIC_FROM: i32 = 16;
/// Floats leave fixed notation below this decimal exponent.
const SCIENTIFIC_BELOW: i32 = -4;

struct SpacedAscii;

impl Formatter for SpacedAscii {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        let mut start = 0;
        for (index, ch) in fragment.char_indices() {
            if ch.is_ascii() && ch != '\u{7f}' {
                continue;
            }
            writer.write_all(fragment[start..index].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = index + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn write_f32<W>(&mut self, writer: &mut W, value: f32) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.write_f64(writer, f64::from(value))
    }

    fn write_f64<W>(&mut self, writer: &mut W, value: f64) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(float_repr(value).as_bytes())
    }
}

/// Shortest round-trip digits, laid out in fixed or scientific notation
/// depending on the decimal exponent.
fn float_repr(value: f64) -> String {
    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => return scientific,
    };
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(mantissa) => ("-", mantissa),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    if (SCIENTIFIC_BELOW..SCIENTIFIC_FROM).contains(&exponent) {
        if exponent < 0 {
            let zeros = "0".repeat((-exponent - 1) as usize);
            return format!("{}0.{}{}", sign, zeros, digits);
        }
        let point = exponent as usize + 1;
        if digits.len() <= point {
            let zeros = "0".repeat(point - digits.len());
            return format!("{}{}{}.0", sign, digits, zeros);
        }
        return format!("{}{}.{}", sign, &digits[..point], &digits[point..]);
    }

    let (lead, rest) = digits.split_at(1);
    let exponent_sign = if exponent < 0 { '-' } else { '+' };
    if rest.is_empty() {
        format!("{}{}e{}{:02}", sign, lead, exponent_sign, exponent.abs())
    } else {
        format!("{}{}.{}e{}{:02}", sign, lead, rest, exponent_sign, exponent.abs())
    }
}

pub fn to_string(value: &Value) -> String {
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, SpacedAscii);
    if value.serialize(&mut serializer).is_err() {
        return value.to_string();
    }
    String::from_utf8(buffer).unwrap_or_else(|_| value.to_string())
}
