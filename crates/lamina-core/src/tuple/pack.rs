//! Element codecs for the tuple layer.
//!
//! Type codes and framing follow the ordered-tuple wire convention: one code
//! byte, then a value payload whose byte order matches value order. Variable
//! length payloads (bytes, strings, nested tuples) are 0x00-terminated with
//! 0x00 -> 0x00 0xFF escaping so embedded zero bytes stay ordered.

use crate::{
    error::Error,
    tuple::{Element, Tuple},
};

const NIL: u8 = 0x00;
const BYTES: u8 = 0x01;
const STRING: u8 = 0x02;
const NESTED: u8 = 0x05;
const INT_ZERO: u8 = 0x14;
const FLOAT: u8 = 0x20;
const DOUBLE: u8 = 0x21;
const FALSE: u8 = 0x26;
const TRUE: u8 = 0x27;
const ESCAPE: u8 = 0xFF;

pub(super) fn encode_element(element: &Element, out: &mut Vec<u8>, nested: bool) {
    match element {
        Element::Null => {
            out.push(NIL);
            // Inside a nested tuple a bare 0x00 would read as the
            // terminator, so nulls are escaped there.
            if nested {
                out.push(ESCAPE);
            }
        }
        Element::Bytes(bytes) => {
            out.push(BYTES);
            write_escaped(bytes, out);
            out.push(0x00);
        }
        Element::String(s) => {
            out.push(STRING);
            write_escaped(s.as_bytes(), out);
            out.push(0x00);
        }
        Element::Tuple(tuple) => {
            out.push(NESTED);
            for inner in tuple.elements() {
                encode_element(inner, out, true);
            }
            out.push(0x00);
        }
        Element::Int(i) => encode_int(*i, out),
        Element::Float(f) => {
            out.push(FLOAT);
            out.extend_from_slice(&order_f32_bits(*f).to_be_bytes());
        }
        Element::Double(d) => {
            out.push(DOUBLE);
            out.extend_from_slice(&order_f64_bits(*d).to_be_bytes());
        }
        Element::Bool(b) => out.push(if *b { TRUE } else { FALSE }),
    }
}

pub(super) fn decode_element(bytes: &[u8], pos: &mut usize) -> Result<Element, Error> {
    let code = *bytes
        .get(*pos)
        .ok_or_else(|| Error::InvalidSerializedData("truncated tuple".to_string()))?;
    *pos += 1;

    match code {
        NIL => Ok(Element::Null),
        BYTES => read_escaped(bytes, pos).map(Element::Bytes),
        STRING => {
            let raw = read_escaped(bytes, pos)?;
            String::from_utf8(raw)
                .map(Element::String)
                .map_err(|e| Error::InvalidSerializedData(format!("non-utf8 string column: {e}")))
        }
        NESTED => decode_nested(bytes, pos),
        FLOAT => {
            let raw = take(bytes, pos, 4)?;
            let bits = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
            Ok(Element::Float(f32::from_bits(unorder_f32_bits(bits))))
        }
        DOUBLE => {
            let raw = take(bytes, pos, 8)?;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(raw);
            Ok(Element::Double(f64::from_bits(unorder_f64_bits(
                u64::from_be_bytes(buf),
            ))))
        }
        FALSE => Ok(Element::Bool(false)),
        TRUE => Ok(Element::Bool(true)),
        code if is_int_code(code) => decode_int(code, bytes, pos),
        code => Err(Error::InvalidSerializedData(format!(
            "unknown tuple type code 0x{code:02x}"
        ))),
    }
}

// -- variable-length payloads

fn write_escaped(raw: &[u8], out: &mut Vec<u8>) {
    for &byte in raw {
        out.push(byte);
        if byte == 0x00 {
            out.push(ESCAPE);
        }
    }
}

fn read_escaped(bytes: &[u8], pos: &mut usize) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();

    loop {
        let byte = *bytes
            .get(*pos)
            .ok_or_else(|| Error::InvalidSerializedData("unterminated tuple segment".to_string()))?;
        *pos += 1;

        if byte == 0x00 {
            if bytes.get(*pos) == Some(&ESCAPE) {
                *pos += 1;
                out.push(0x00);
                continue;
            }
            return Ok(out);
        }
        out.push(byte);
    }
}

fn decode_nested(bytes: &[u8], pos: &mut usize) -> Result<Element, Error> {
    let mut elements = Vec::new();

    loop {
        let byte = *bytes
            .get(*pos)
            .ok_or_else(|| Error::InvalidSerializedData("unterminated nested tuple".to_string()))?;

        if byte == 0x00 {
            if bytes.get(*pos + 1) == Some(&ESCAPE) {
                *pos += 2;
                elements.push(Element::Null);
                continue;
            }
            *pos += 1;
            return Ok(Element::Tuple(Tuple::from_elements(elements)));
        }

        elements.push(decode_element(bytes, pos)?);
    }
}

fn take<'a>(bytes: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8], Error> {
    let end = pos
        .checked_add(n)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| Error::InvalidSerializedData("truncated tuple payload".to_string()))?;
    let out = &bytes[*pos..end];
    *pos = end;
    Ok(out)
}

// -- integers
//
// Code INT_ZERO +/- n where n is the minimal big-endian byte length.
// Negatives store `bound(n) - magnitude` so larger values sort later.

const fn is_int_code(code: u8) -> bool {
    code >= INT_ZERO - 8 && code <= INT_ZERO + 8
}

const fn int_bound(len: u32) -> u64 {
    if len >= 8 {
        u64::MAX
    } else {
        (1u64 << (8 * len)) - 1
    }
}

const fn minimal_len(magnitude: u64) -> u32 {
    let bits = 64 - magnitude.leading_zeros();
    if bits == 0 { 1 } else { bits.div_ceil(8) }
}

fn encode_int(value: i64, out: &mut Vec<u8>) {
    if value == 0 {
        out.push(INT_ZERO);
        return;
    }

    let magnitude = value.unsigned_abs();
    let len = minimal_len(magnitude);
    let be = if value > 0 {
        out.push(INT_ZERO + len as u8);
        magnitude.to_be_bytes()
    } else {
        out.push(INT_ZERO - len as u8);
        (int_bound(len) - magnitude).to_be_bytes()
    };
    out.extend_from_slice(&be[(8 - len as usize)..]);
}

fn decode_int(code: u8, bytes: &[u8], pos: &mut usize) -> Result<Element, Error> {
    if code == INT_ZERO {
        return Ok(Element::Int(0));
    }

    let positive = code > INT_ZERO;
    let len = code.abs_diff(INT_ZERO) as usize;
    let raw = take(bytes, pos, len)?;

    let mut buf = [0u8; 8];
    buf[(8 - len)..].copy_from_slice(raw);
    let word = u64::from_be_bytes(buf);

    let value: i128 = if positive {
        i128::from(word)
    } else {
        -i128::from(int_bound(len as u32) - word)
    };

    i64::try_from(value)
        .map(Element::Int)
        .map_err(|_| Error::InvalidSerializedData("integer column out of i64 range".to_string()))
}

// -- floats
//
// Sign-magnitude IEEE bits are remapped so that unsigned big-endian compare
// equals numeric compare: negatives invert all bits, positives flip the
// sign bit. NaN is undefined behavior for index scores; callers must not
// index it.

const fn order_f32_bits(f: f32) -> u32 {
    let bits = f.to_bits();
    if bits & 0x8000_0000 != 0 { !bits } else { bits ^ 0x8000_0000 }
}

const fn unorder_f32_bits(bits: u32) -> u32 {
    if bits & 0x8000_0000 != 0 { bits ^ 0x8000_0000 } else { !bits }
}

const fn order_f64_bits(f: f64) -> u64 {
    let bits = f.to_bits();
    if bits & 0x8000_0000_0000_0000 != 0 {
        !bits
    } else {
        bits ^ 0x8000_0000_0000_0000
    }
}

const fn unorder_f64_bits(bits: u64) -> u64 {
    if bits & 0x8000_0000_0000_0000 != 0 {
        bits ^ 0x8000_0000_0000_0000
    } else {
        !bits
    }
}
