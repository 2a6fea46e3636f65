use std::fmt;
use std::io::{ErrorKind, Read};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type DocId = u64;
pub type TermFrequency = u32;

/// Width of the term and document name fields in every on-disk record
pub const TEXT_FIELD_LENGTH: usize = 48;

/// Marks object that have a length
pub trait Len {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Posting = document ID + term frequency
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Posting {
    pub docid: DocId,
    pub frequency: TermFrequency,
}

impl Posting {
    pub fn new(docid: DocId, frequency: TermFrequency) -> Self {
        Self { docid, frequency }
    }
}

impl std::fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.docid, self.frequency)
    }
}

/// Truncates a string to at most `TEXT_FIELD_LENGTH` bytes, without
/// splitting a UTF-8 character
pub fn truncate_text(text: &str) -> &str {
    if text.len() <= TEXT_FIELD_LENGTH {
        return text;
    }
    let mut end = TEXT_FIELD_LENGTH;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// A term as it is stored in a text field: truncated, without the
/// trailing spaces that the padding would hide
pub fn normalize_term(text: &str) -> &str {
    truncate_text(text).trim_end_matches(' ')
}

/// Encodes a text field: truncated then padded with spaces
pub fn encode_text(text: &str) -> [u8; TEXT_FIELD_LENGTH] {
    let mut field = [b' '; TEXT_FIELD_LENGTH];
    let bytes = truncate_text(text).as_bytes();
    field[..bytes.len()].copy_from_slice(bytes);
    field
}

/// Decodes a space padded text field
pub fn decode_text(field: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(field)
        .map_err(|e| Error::Corrupted(format!("text field is not valid UTF-8: {}", e)))?;
    Ok(text.trim_end_matches(' ').to_string())
}

/// Reads a fixed-length record.
///
/// Returns `Ok(false)` when the reader is exhausted before the first byte
/// (the normal end of a record file); a record cut in the middle is
/// reported as corruption.
pub fn read_record<R: Read + ?Sized>(reader: &mut R, buffer: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::io("reading record", e)),
        }
    }

    if filled == 0 {
        Ok(false)
    } else if filled < buffer.len() {
        Err(Error::Corrupted(format!(
            "truncated record ({} bytes out of {})",
            filled,
            buffer.len()
        )))
    } else {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_fields_are_padded_and_trimmed() {
        let field = encode_text("hello");
        assert_eq!(field.len(), TEXT_FIELD_LENGTH);
        assert_eq!(&field[..6], b"hello ");
        assert_eq!(decode_text(&field).unwrap(), "hello");
    }

    #[test]
    fn long_text_is_truncated_on_char_boundary() {
        let text = "é".repeat(30);
        let truncated = truncate_text(&text);
        assert_eq!(truncated.len(), 48);
        assert_eq!(decode_text(&encode_text(&text)).unwrap(), "é".repeat(24));

        let text = format!("a{}", "é".repeat(30));
        assert_eq!(truncate_text(&text).len(), 47);
    }

    #[test]
    fn normalized_terms_survive_encoding() {
        let text = format!("{} x", "a".repeat(47));
        assert_eq!(normalize_term(&text), "a".repeat(47));
        assert_eq!(normalize_term("a  "), "a");
        assert_eq!(
            decode_text(&encode_text(&text)).unwrap(),
            normalize_term(&text)
        );
    }

    #[test]
    fn partial_record_is_corruption() {
        let data = [0u8; 10];
        let mut buffer = [0u8; 8];
        let mut reader = &data[..];
        assert!(read_record(&mut reader, &mut buffer).unwrap());
        assert!(matches!(
            read_record(&mut reader, &mut buffer),
            Err(Error::Corrupted(_))
        ));
        assert!(!read_record(&mut reader, &mut buffer).unwrap());
    }
}
