//! Index configuration, persisted next to the index files

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compress::Compression;
use crate::error::{Error, IoContext, Result};
use crate::scoring::ScoringParameters;

pub const CONFIG_CBOR: &str = "config.cbor";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Stopwords are removed and terms stemmed, both at indexing and query time
    pub stemming_and_stopwords: bool,

    /// Posting streams use the variable-byte code
    pub compression: bool,

    /// Used for the score upper bounds computed when merging
    #[serde(default)]
    pub scoring: ScoringParameters,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stemming_and_stopwords: true,
            compression: true,
            scoring: ScoringParameters::default(),
        }
    }
}

impl Config {
    pub fn compression_scheme(&self) -> Compression {
        Compression::from_flag(self.compression)
    }

    pub fn save(&self, folder: &Path) -> Result<()> {
        let path = folder.join(CONFIG_CBOR);
        let file = File::options()
            .write(true)
            .truncate(true)
            .create(true)
            .open(&path)
            .context(|| format!("creating {}", path.display()))?;

        ciborium::ser::into_writer(self, file)
            .map_err(|e| Error::Config(format!("cannot save {}: {}", path.display(), e)))
    }

    /// Loads the configuration; a missing file means that no index was built
    pub fn load(folder: &Path) -> Result<Self> {
        let path = folder.join(CONFIG_CBOR);
        if !path.exists() {
            return Err(Error::IndexNotBuilt(folder.to_path_buf()));
        }

        let file = File::open(&path).context(|| format!("opening {}", path.display()))?;
        ciborium::de::from_reader(file)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))
    }
}
