use std::collections::HashSet;
use std::sync::Arc;

/// Set of allowed reaction keys, loaded once at startup. Loading the
/// catalog's contents (e.g. from a bundled JSON file) is an out-of-scope
/// collaborator concern; this type only owns the in-memory lookup.
pub struct EmojiCatalog {
    keys: HashSet<String>,
}

impl EmojiCatalog {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        EmojiCatalog {
            keys: keys.into_iter().collect(),
        }
    }

    /// A minimal built-in catalog, standing in for the bundled emoji JSON
    /// the out-of-scope loader would otherwise populate.
    pub fn default_catalog() -> Self {
        Self::new(
            ["thumbsup", "heart", "laugh", "wow", "sad", "angry"]
                .iter()
                .map(|s| s.to_string()),
        )
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

pub type SharedEmojiCatalog = Arc<EmojiCatalog>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_known_key() {
        let catalog = EmojiCatalog::default_catalog();
        assert!(catalog.contains("heart"));
        assert!(!catalog.contains("not-an-emoji"));
    }
}
