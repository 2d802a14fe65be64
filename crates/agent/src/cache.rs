use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use solvent_core::CacheError;

/// Persistent exact-match answer cache.
///
/// The backing store is a single JSON object mapping question text to
/// answer text, rewritten in full on every `put`. Keys are stored
/// verbatim and matched exactly; callers trim the question text before
/// lookup, and no normalization happens beyond that. No fuzzy matching.
pub struct AnswerCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl AnswerCache {
    /// Loads the cache from `path`. A missing or corrupt file yields an
    /// empty cache rather than an error; corruption is logged and the
    /// file is overwritten on the next `put`.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => {
                    debug!(path = %path.display(), entries = entries.len(), "answer cache loaded");
                    entries
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "answer cache is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(error) if error.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => {
                warn!(path = %path.display(), %error, "answer cache is unreadable, starting empty");
                BTreeMap::new()
            }
        };

        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, question_text: &str) -> Option<&str> {
        self.entries.get(question_text).map(String::as_str)
    }

    /// Inserts or overwrites an entry and writes the whole cache file
    /// back out. The file stays consistent with memory after every put.
    pub fn put(
        &mut self,
        question_text: impl Into<String>,
        answer: impl Into<String>,
    ) -> Result<(), CacheError> {
        self.entries.insert(question_text.into(), answer.into());
        self.flush()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn flush(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| CacheError::Write {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }

        let payload = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, payload)
            .map_err(|source| CacheError::Write { path: self.path.clone(), source })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::AnswerCache;

    #[test]
    fn put_survives_a_fresh_load() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("answers.json");

        let mut cache = AnswerCache::load(&path);
        cache.put("What is 2+2?", "4").expect("write cache entry");

        let reloaded = AnswerCache::load(&path);
        assert_eq!(reloaded.get("What is 2+2?"), Some("4"));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn corrupt_file_resets_to_empty_and_recovers_on_put() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("answers.json");
        fs::write(&path, "{ not json").expect("write corrupt file");

        let mut cache = AnswerCache::load(&path);
        assert!(cache.is_empty());

        cache.put("q", "a").expect("write cache entry");
        let reloaded = AnswerCache::load(&path);
        assert_eq!(reloaded.get("q"), Some("a"));
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("state").join("deep").join("answers.json");

        let mut cache = AnswerCache::load(&path);
        cache.put("q", "a").expect("write cache entry");
        assert!(path.exists());
    }

    #[test]
    fn keys_are_exact_matches_only() {
        let dir = TempDir::new().expect("create temp dir");
        let mut cache = AnswerCache::load(dir.path().join("answers.json"));
        cache.put("What is 2+2?", "4").expect("write cache entry");

        // Trimming is the caller's job; the store itself never rewrites
        // keys and matches them byte for byte.
        assert_eq!(cache.get("what is 2+2?"), None);
        assert_eq!(cache.get("What is 2+2"), None);
        assert_eq!(cache.get("What is 2+2?"), Some("4"));
    }
}
