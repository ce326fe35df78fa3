//! Process-wide module metadata cache (§5, §6). Reworked from the teacher's
//! disk-based `IncrementalCache`/`CacheEntry` (hash-gated JSON files under
//! `.zenith/cache`) into an in-memory `DashMap`, since the data model here
//! specifies a process-local cross-file classification cache that
//! concurrent compilations share, not a disk-persisted build cache; hashing
//! is kept from the teacher's `compute_hash` (`sha2::Sha256`) so a cached
//! entry can still be invalidated when a module's source changes between
//! calls in the same process.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What one module contributes to cross-file classification: which of its
/// exported names are signals/memos, so an importing module can propagate
/// that knowledge into its own classification pass without re-parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub hash: String,
    pub exported_signals: Vec<String>,
    pub exported_memos: Vec<String>,
}

pub struct ModuleMetadataCache {
    entries: DashMap<String, ModuleMetadata>,
}

impl Default for ModuleMetadataCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleMetadataCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn compute_hash(source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Returns the cached metadata for `file_path` only if its stored hash
    /// still matches `source`'s current content.
    pub fn get(&self, file_path: &str, source: &str) -> Option<ModuleMetadata> {
        let entry = self.entries.get(file_path)?;
        if entry.hash == Self::compute_hash(source) {
            Some(entry.clone())
        } else {
            None
        }
    }

    pub fn set(&self, file_path: &str, source: &str, metadata: ModuleMetadata) {
        let mut metadata = metadata;
        metadata.hash = Self::compute_hash(source);
        self.entries.insert(file_path.to_string(), metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_hash_misses() {
        let cache = ModuleMetadataCache::new();
        cache.set(
            "a.tsx",
            "let c = $state(0);",
            ModuleMetadata {
                hash: String::new(),
                exported_signals: vec!["c".to_string()],
                exported_memos: vec![],
            },
        );
        assert!(cache.get("a.tsx", "let c = $state(0);").is_some());
        assert!(cache.get("a.tsx", "let c = $state(1);").is_none());
    }
}
