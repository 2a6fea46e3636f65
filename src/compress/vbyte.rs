//! Variable-byte code
//!
//! Big-endian groups of 7 bits; the high bit is set on the last byte of
//! each number only. Zero is the single byte `0x80`.

use std::io::Write;

use serde::{Deserialize, Serialize};

use super::{CodecValue, Compressor};
use crate::error::{Error, Result};

const VALUE_MASK: u8 = 0x7F;
const STOP_BIT: u8 = 0x80;

/// Maximum number of 7-bit groups for a u64
const MAX_GROUPS: usize = 10;

/// Appends the encoding of `value` to `out`
pub fn encode_into(value: u64, out: &mut Vec<u8>) {
    let mut groups = [0u8; MAX_GROUPS];
    let mut count = 0;
    let mut rest = value;
    loop {
        groups[count] = (rest as u8) & VALUE_MASK;
        count += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }

    for ix in (1..count).rev() {
        out.push(groups[ix]);
    }
    out.push(groups[0] | STOP_BIT);
}

pub fn encode(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(2);
    encode_into(value, &mut out);
    out
}

/// Decodes a byte stream into values of the domain `T`
pub fn decode_as<T: CodecValue>(data: &[u8]) -> Result<Vec<T>> {
    let mut values = Vec::new();
    let mut acc: u64 = 0;
    let mut pending = false;

    for (position, &byte) in data.iter().enumerate() {
        acc = acc
            .checked_mul(128)
            .and_then(|x| x.checked_add((byte & VALUE_MASK) as u64))
            .filter(|&x| x <= T::MAX)
            .ok_or_else(|| {
                Error::Corrupted(format!("variable-byte overflow at byte {}", position))
            })?;
        pending = true;

        if byte & STOP_BIT != 0 {
            values.push(T::from_u64(acc));
            acc = 0;
            pending = false;
        }
    }

    if pending {
        return Err(Error::Corrupted(format!(
            "truncated variable-byte stream ({} bytes)",
            data.len()
        )));
    }
    Ok(values)
}

pub fn decode(data: &[u8]) -> Result<Vec<u64>> {
    decode_as::<u64>(data)
}

#[derive(Serialize, Deserialize, Clone, Copy)]
pub struct VariableByte {}

impl<T: CodecValue> Compressor<T> for VariableByte {
    fn write(&self, writer: &mut dyn Write, values: &[T]) -> std::io::Result<usize> {
        let mut buffer = Vec::with_capacity(values.len() * 2);
        for &value in values {
            encode_into(value.into(), &mut buffer);
        }
        writer.write_all(&buffer)?;
        Ok(buffer.len())
    }

    fn read(&self, data: &[u8]) -> Result<Vec<T>> {
        decode_as::<T>(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_encodings() {
        assert_eq!(encode(0), vec![0x80]);
        assert_eq!(encode(5), vec![0x85]);
        assert_eq!(encode(127), vec![0xFF]);
        assert_eq!(encode(128), vec![0x01, 0x80]);
        assert_eq!(encode(300), vec![0x02, 0xAC]);
        assert_eq!(encode(u64::MAX).len(), 10);
    }

    #[test]
    fn truncated_stream() {
        let mut data = encode(300);
        data.pop();
        assert!(matches!(decode(&data), Err(Error::Corrupted(_))));
    }

    #[test]
    fn frequency_overflow() {
        let data = encode(u32::MAX as u64 + 1);
        assert!(decode_as::<u32>(&data).is_err());
        assert_eq!(decode(&data).unwrap(), vec![u32::MAX as u64 + 1]);
        assert_eq!(
            decode_as::<u32>(&encode(u32::MAX as u64)).unwrap(),
            vec![u32::MAX]
        );
    }
}
