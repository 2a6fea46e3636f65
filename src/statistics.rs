//! Collection statistics written after indexing

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::{Error, IoContext, Result};

pub const STATISTICS_FILE: &str = "statistics.txt";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Statistics {
    /// Number of partial blocks flushed while indexing
    pub num_blocks: u64,
    pub num_documents: u64,
    /// Average document length (in terms, rounded down)
    pub average_document_length: u64,
}

impl Statistics {
    pub fn new(num_blocks: u64, num_documents: u64, total_length: u64) -> Self {
        Self {
            num_blocks,
            num_documents,
            average_document_length: if num_documents > 0 {
                total_length / num_documents
            } else {
                0
            },
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut file = File::options()
            .write(true)
            .truncate(true)
            .create(true)
            .open(path)
            .context(|| format!("creating {}", path.display()))?;
        write!(
            file,
            "{}\n{}\n{}\n",
            self.num_blocks, self.num_documents, self.average_document_length
        )
        .context(|| format!("writing {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).context(|| format!("reading {}", path.display()))?;
        let mut values = content.lines().map(|line| {
            line.trim().parse::<u64>().map_err(|e| {
                Error::Corrupted(format!("invalid statistics line {:?}: {}", line, e))
            })
        });

        let mut next = |name: &str| {
            values
                .next()
                .unwrap_or_else(|| Err(Error::Corrupted(format!("missing statistics: {}", name))))
        };

        Ok(Self {
            num_blocks: next("block count")?,
            num_documents: next("document count")?,
            average_document_length: next("average document length")?,
        })
    }
}
