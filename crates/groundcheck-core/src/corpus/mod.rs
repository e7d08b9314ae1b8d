//! Chunk corpus and workspace state
//!
//! Chunks are produced by an external chunking utility and are immutable
//! once indexed. A `Workspace` owns one corpus snapshot plus the keyword
//! index built over it; rebuilding publishes a fresh index instance, never
//! mutating the one in-flight searches may hold.

use crate::config::RetrievalConfig;
use crate::search::KeywordIndex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// A chunk of a source document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub tokens: usize,
    pub metadata: ChunkMetadata,
}

/// Chunk provenance and position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_file: String,
    pub filename: String,
    #[serde(default)]
    pub category: Option<String>,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub char_start: usize,
    pub char_end: usize,
    #[serde(default)]
    pub title: Option<String>,
}

/// Identity used for deduplication and fusion merging
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub filename: String,
    pub char_start: usize,
}

impl Chunk {
    /// Identity key: `(filename, char_start)`
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            filename: self.metadata.filename.clone(),
            char_start: self.metadata.char_start,
        }
    }
}

/// A workspace: one chunk corpus snapshot plus its keyword index
pub struct Workspace {
    name: String,
    chunks: Vec<Chunk>,
    /// Swapped wholesale on rebuild; readers clone the Arc and search
    /// against a consistent snapshot.
    index: RwLock<Arc<KeywordIndex>>,
}

impl Workspace {
    /// Create a workspace and build its keyword index
    pub fn new(name: impl Into<String>, chunks: Vec<Chunk>, retrieval: &RetrievalConfig) -> Self {
        let index = KeywordIndex::build(&chunks, retrieval.bm25_k1, retrieval.bm25_b);
        Self {
            name: name.into(),
            chunks,
            index: RwLock::new(Arc::new(index)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Get the current index snapshot
    pub fn index(&self) -> Arc<KeywordIndex> {
        self.index
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the corpus and publish a freshly built index
    ///
    /// Searches already holding the previous snapshot keep using it; new
    /// searches see the new index as soon as the swap completes.
    pub fn rebuild(&mut self, chunks: Vec<Chunk>, retrieval: &RetrievalConfig) {
        let new_index = Arc::new(KeywordIndex::build(
            &chunks,
            retrieval.bm25_k1,
            retrieval.bm25_b,
        ));
        self.chunks = chunks;
        let mut guard = self
            .index
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = new_index;
        tracing::info!(
            workspace = %self.name,
            chunks = self.chunks.len(),
            "rebuilt keyword index"
        );
    }

    /// Distinct source files in this workspace, in first-seen order
    pub fn source_files(&self) -> Vec<(String, String)> {
        let mut seen = std::collections::HashSet::new();
        let mut files = Vec::new();
        for chunk in &self.chunks {
            let key = chunk.metadata.filename.clone();
            if seen.insert(key.clone()) {
                files.push((key, chunk.metadata.source_file.clone()));
            }
        }
        files
    }

    /// Reassemble a source file's content from its chunks
    ///
    /// Chunks are concatenated in `chunk_index` order. Overlapping chunkers
    /// will duplicate the overlap; that is acceptable for lookup output.
    pub fn assemble_file(&self, filename: &str) -> Option<String> {
        let mut parts: Vec<&Chunk> = self
            .chunks
            .iter()
            .filter(|c| c.metadata.filename == filename)
            .collect();
        if parts.is_empty() {
            return None;
        }
        parts.sort_by_key(|c| c.metadata.chunk_index);
        let mut content = String::new();
        for (i, chunk) in parts.iter().enumerate() {
            if i > 0 {
                content.push('\n');
            }
            content.push_str(&chunk.text);
        }
        Some(content)
    }
}
