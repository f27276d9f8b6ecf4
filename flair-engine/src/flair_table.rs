use flairbot_core::FlairError;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Classification key to optional flair display text, loaded from a
/// header-less CSV of `key[,display text]` rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlairTable {
    entries: HashMap<String, Option<String>>,
}

impl FlairTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FlairError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| FlairError::TableUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let table = Self::from_reader(file)?;
        info!("Loaded {} flair entries from {}", table.len(), path.display());
        Ok(table)
    }

    /// Later rows overwrite earlier rows with the same key.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, FlairError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut table = Self::new();
        for (index, result) in csv_reader.records().enumerate() {
            let row = index as u64 + 1;
            let record = result.map_err(|e| FlairError::MalformedRow {
                row: e.position().map(|p| p.line()).unwrap_or(row),
                reason: e.to_string(),
            })?;

            let key = match record.get(0) {
                Some(key) if !key.is_empty() => key,
                _ => {
                    debug!("Skipping flair table row {} without a key", row);
                    continue;
                }
            };
            if record.len() > 2 {
                warn!(
                    "Flair table row {} has {} columns, ignoring all but the first two",
                    row,
                    record.len()
                );
            }

            let text = record.get(1).map(str::to_string);
            if table.insert(key.to_string(), text).is_some() {
                warn!("Flair table row {} overrides earlier entry for '{}'", row, key);
            }
        }

        Ok(table)
    }

    /// Adds or replaces an entry, returning the previous display text if the
    /// key was already present. Empty text is stored as `None`.
    pub fn insert(&mut self, key: String, text: Option<String>) -> Option<Option<String>> {
        let text = text.filter(|t| !t.is_empty());
        self.entries.insert(key, text)
    }

    /// `None` when the key is unknown, `Some(None)` when it is known but has
    /// no display text.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries.get(key).map(|text| text.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
