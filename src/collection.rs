//! Reads the raw lines of a document collection

use std::fs::File;
use std::io::{BufRead, BufReader, Split};
use std::path::{Path, PathBuf};

use crate::error::{IoContext, Result};

/// Iterates over the lines of a collection file
///
/// Invalid UTF-8 sequences are replaced, leaving the parser to decide
/// whether the line is usable.
pub struct CollectionReader {
    path: PathBuf,
    lines: Split<BufReader<File>>,
}

impl CollectionReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).context(|| format!("opening collection {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).split(b'\n'),
        })
    }
}

impl Iterator for CollectionReader {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = &self.path;
        self.lines.next().map(|line| {
            let line = line.context(|| format!("reading collection {}", path.display()))?;
            let line = String::from_utf8_lossy(&line);
            Ok(line.trim_end_matches('\r').to_string())
        })
    }
}
