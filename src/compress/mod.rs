//! Methods for compressing the posting lists
//!
//! Document IDs and term frequencies are written either with a
//! variable-byte code or as raw big-endian integers.

use std::io::Write;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::base::{DocId, TermFrequency};
use crate::error::{Error, Result};

pub mod identity;
pub mod vbyte;

pub use identity::Identity;
pub use vbyte::VariableByte;

/// Integer domains stored in the posting streams
pub trait CodecValue: Copy + Into<u64> + Send + Sync + 'static {
    /// Largest value of the domain
    const MAX: u64;

    /// Width in bytes of the raw encoding
    const WIDTH: usize;

    /// Converts a decoded value (must be at most `Self::MAX`)
    fn from_u64(value: u64) -> Self;

    fn write_raw(self, writer: &mut dyn Write) -> std::io::Result<()>;

    fn read_raw(data: &[u8]) -> Self;
}

impl CodecValue for DocId {
    const MAX: u64 = u64::MAX;
    const WIDTH: usize = 8;

    fn from_u64(value: u64) -> Self {
        value
    }

    fn write_raw(self, writer: &mut dyn Write) -> std::io::Result<()> {
        writer.write_u64::<BigEndian>(self)
    }

    fn read_raw(data: &[u8]) -> Self {
        BigEndian::read_u64(data)
    }
}

impl CodecValue for TermFrequency {
    const MAX: u64 = u32::MAX as u64;
    const WIDTH: usize = 4;

    fn from_u64(value: u64) -> Self {
        value as u32
    }

    fn write_raw(self, writer: &mut dyn Write) -> std::io::Result<()> {
        writer.write_u32::<BigEndian>(self)
    }

    fn read_raw(data: &[u8]) -> Self {
        BigEndian::read_u32(data)
    }
}

pub trait Compressor<T: CodecValue>: Sync + Send {
    /// Writes the values and returns the number of bytes written
    fn write(&self, writer: &mut dyn Write, values: &[T]) -> std::io::Result<usize>;

    /// Decodes all the values contained in `data`
    fn read(&self, data: &[u8]) -> Result<Vec<T>>;
}

/// How posting streams are stored on disk
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    VariableByte,
    Identity,
}

impl Compression {
    pub fn from_flag(compressed: bool) -> Self {
        if compressed {
            Compression::VariableByte
        } else {
            Compression::Identity
        }
    }

    pub fn compressor<T: CodecValue>(&self) -> &'static dyn Compressor<T> {
        match self {
            Compression::VariableByte => &VariableByte {},
            Compression::Identity => &Identity {},
        }
    }

    pub fn write<T: CodecValue>(
        &self,
        writer: &mut dyn Write,
        values: &[T],
    ) -> std::io::Result<usize> {
        self.compressor::<T>().write(writer, values)
    }

    pub fn read<T: CodecValue>(&self, data: &[u8]) -> Result<Vec<T>> {
        self.compressor::<T>().read(data)
    }
}

/// Checks that a decoded sequence has the announced length
pub(crate) fn expect_length<T>(values: Vec<T>, expected: usize, what: &str) -> Result<Vec<T>> {
    if values.len() != expected {
        return Err(Error::Corrupted(format!(
            "expected {} {} but decoded {}",
            expected,
            what,
            values.len()
        )));
    }
    Ok(values)
}
