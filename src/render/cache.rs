//! Two-level equation memoization.
//!
//! Typeset output is keyed purely by source text, independent of color,
//! size, and scale. Finished artifacts are keyed by the full request shape.
//! Neither level is ever evicted or invalidated; the process lives for one
//! editor session, so the maps are bounded by what the user actually edits.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::protocol::RenderRequest;

/// Derived identity of a fully-rendered artifact. Two requests with the same
/// key are guaranteed the same path and dimensions without redoing work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: String,
    pub cell_width: u32,
    pub width: u32,
    pub cell_height: u32,
    pub height: u32,
    pub flags: u32,
    pub color: String,
}

impl CacheKey {
    pub fn for_request(request: &RenderRequest) -> Self {
        Self {
            source: request.source.clone(),
            cell_width: request.cell_width,
            width: request.width,
            cell_height: request.cell_height,
            height: request.height,
            flags: request.flags.bits(),
            color: request.color.clone(),
        }
    }
}

/// Memoized typeset result for one source text. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypesetEntry {
    Markup(String),
    /// Negative result: the typesetting collaborator rejected the equation.
    /// Cached so malformed equations don't re-invoke it on every redraw.
    Failed(String),
}

/// A persisted rendered image plus its logical (cell) dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub source: String,
    pub path: PathBuf,
    /// Footprint in terminal cells
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Default)]
pub struct EquationCache {
    typeset: HashMap<String, TypesetEntry>,
    artifacts: HashMap<CacheKey, Artifact>,
}

impl EquationCache {
    pub fn typeset_entry(&self, source: &str) -> Option<&TypesetEntry> {
        self.typeset.get(source)
    }

    pub fn record_typeset(&mut self, source: String, entry: TypesetEntry) {
        self.typeset.insert(source, entry);
    }

    pub fn artifact(&self, key: &CacheKey) -> Option<&Artifact> {
        self.artifacts.get(key)
    }

    pub fn record_artifact(&mut self, key: CacheKey, artifact: Artifact) {
        self.artifacts.insert(key, artifact);
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RenderFlags;

    fn request(source: &str, color: &str) -> RenderRequest {
        RenderRequest {
            identifier: "t".to_string(),
            source: source.to_string(),
            cell_width: 10,
            cell_height: 20,
            width: 4,
            height: 2,
            flags: RenderFlags::new(1),
            color: color.to_string(),
        }
    }

    #[test]
    fn keys_distinguish_color_and_source() {
        let a = CacheKey::for_request(&request("x^2", "#ffffff"));
        let b = CacheKey::for_request(&request("x^2", "#000000"));
        let c = CacheKey::for_request(&request("x^3", "#ffffff"));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, CacheKey::for_request(&request("x^2", "#ffffff")));
    }

    #[test]
    fn artifact_lookup_round_trips() {
        let mut cache = EquationCache::default();
        let key = CacheKey::for_request(&request("x^2", "#ffffff"));
        let artifact = Artifact {
            source: "x^2".to_string(),
            path: PathBuf::from("/tmp/mdmath-x/abc1234_100x40.png"),
            width: 4,
            height: 2,
        };
        assert!(cache.artifact(&key).is_none());
        cache.record_artifact(key.clone(), artifact.clone());
        assert_eq!(cache.artifact(&key), Some(&artifact));
        assert_eq!(cache.artifact_count(), 1);
    }

    #[test]
    fn negative_typeset_results_are_remembered() {
        let mut cache = EquationCache::default();
        cache.record_typeset(
            "\\bad{".to_string(),
            TypesetEntry::Failed("Missing close brace".to_string()),
        );
        assert_eq!(
            cache.typeset_entry("\\bad{"),
            Some(&TypesetEntry::Failed("Missing close brace".to_string()))
        );
        assert!(cache.typeset_entry("x").is_none());
    }
}
