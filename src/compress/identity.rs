//! Raw (uncompressed) big-endian integers

use std::io::Write;

use serde::{Deserialize, Serialize};

use super::{CodecValue, Compressor};
use crate::error::{Error, Result};

#[derive(Serialize, Deserialize, Clone, Copy)]
pub struct Identity {}

impl<T: CodecValue> Compressor<T> for Identity {
    fn write(&self, writer: &mut dyn Write, values: &[T]) -> std::io::Result<usize> {
        for &x in values {
            x.write_raw(writer)?;
        }
        Ok(values.len() * T::WIDTH)
    }

    fn read(&self, data: &[u8]) -> Result<Vec<T>> {
        if data.len() % T::WIDTH != 0 {
            return Err(Error::Corrupted(format!(
                "raw stream of {} bytes is not a multiple of {}",
                data.len(),
                T::WIDTH
            )));
        }
        Ok(data.chunks_exact(T::WIDTH).map(T::read_raw).collect())
    }
}
