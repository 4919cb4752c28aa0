use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use log::warn;

#[derive(Debug, thiserror::Error)]
pub enum LabelMapError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid label map JSON: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Lookup from classifier output index to display label.
///
/// Loaded from a JSON object keyed by the stringified class index,
/// e.g. `{"0": "zero", "1": "one"}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMap {
    labels: HashMap<usize, String>,
}

impl LabelMap {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelMapError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Parses a JSON object of index strings to labels.
    ///
    /// Only keys spelled exactly as a class index (`"1"`, not `"01"`, `" 1"` or `"+1"`)
    /// are used; anything else can never be looked up and is skipped.
    pub fn from_json_str(json: &str) -> Result<Self, LabelMapError> {
        let raw: HashMap<String, String> = serde_json::from_str(json)?;
        let mut labels = HashMap::with_capacity(raw.len());
        for (key, label) in raw {
            match canonical_index(&key) {
                Some(index) => {
                    labels.insert(index, label);
                }
                None => warn!("Ignoring label map entry with non-index key {:?}", key),
            }
        }
        Ok(Self { labels })
    }

    /// Returns the label for `index`, if the map has one. Callers decide the fallback.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(&index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn canonical_index(key: &str) -> Option<usize> {
    key.parse::<usize>().ok().filter(|index| index.to_string() == key)
}

impl FromIterator<(usize, String)> for LabelMap {
    fn from_iter<T: IntoIterator<Item = (usize, String)>>(iter: T) -> Self {
        Self { labels: iter.into_iter().collect() }
    }
}
