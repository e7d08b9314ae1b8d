//! In-memory Okapi BM25 keyword index

use crate::corpus::Chunk;
use crate::search::is_stop_word;
use std::collections::HashMap;

/// Tokenize text for indexing and querying
///
/// Lowercases, splits on non-alphanumerics, drops single characters and
/// stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|tok| tok.len() > 1 && !is_stop_word(tok))
        .map(|tok| tok.to_string())
        .collect()
}

struct IndexedDoc {
    chunk: Chunk,
    term_freq: HashMap<String, usize>,
    length: usize,
}

/// Inverted keyword index over one corpus snapshot
///
/// Read-only once built. A corpus change builds a fresh index which the
/// owning `Workspace` publishes atomically.
pub struct KeywordIndex {
    docs: Vec<IndexedDoc>,
    doc_freq: HashMap<String, usize>,
    avg_doc_len: f64,
    k1: f64,
    b: f64,
}

impl KeywordIndex {
    /// Build an index over a chunk corpus
    ///
    /// Filename and title are indexed alongside the chunk text so lookups
    /// by name rank the right file's chunks first.
    pub fn build(chunks: &[Chunk], k1: f64, b: f64) -> Self {
        let mut docs = Vec::with_capacity(chunks.len());
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_len = 0usize;

        for chunk in chunks {
            let mut indexed_text = chunk.text.clone();
            indexed_text.push(' ');
            indexed_text.push_str(&chunk.metadata.filename);
            if let Some(ref title) = chunk.metadata.title {
                indexed_text.push(' ');
                indexed_text.push_str(title);
            }

            let tokens = tokenize(&indexed_text);
            let length = tokens.len();
            total_len += length;

            let mut term_freq: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *term_freq.entry(token).or_insert(0) += 1;
            }
            for term in term_freq.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }

            docs.push(IndexedDoc {
                chunk: chunk.clone(),
                term_freq,
                length,
            });
        }

        let avg_doc_len = if docs.is_empty() {
            0.0
        } else {
            total_len as f64 / docs.len() as f64
        };

        tracing::debug!(
            docs = docs.len(),
            terms = doc_freq.len(),
            avg_doc_len,
            "built keyword index"
        );

        Self {
            docs,
            doc_freq,
            avg_doc_len,
            k1,
            b,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Rank chunks by Okapi BM25 against a query
    ///
    /// Returns at most `limit` `(chunk, score)` pairs, descending by score,
    /// ties broken by insertion order. Empty queries and queries with no
    /// matching terms return `[]`.
    pub fn search(&self, query: &str, limit: usize) -> Vec<(Chunk, f64)> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() || self.docs.is_empty() {
            return Vec::new();
        }

        let n = self.docs.len() as f64;
        let mut scored: Vec<(usize, f64)> = Vec::new();

        for (doc_idx, doc) in self.docs.iter().enumerate() {
            let mut score = 0.0;
            for term in &query_terms {
                let tf = match doc.term_freq.get(term) {
                    Some(&tf) => tf as f64,
                    None => continue,
                };
                let df = self.doc_freq.get(term).copied().unwrap_or(0) as f64;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                let norm = self.k1 * (1.0 - self.b + self.b * doc.length as f64 / self.avg_doc_len);
                score += idf * (tf * (self.k1 + 1.0)) / (tf + norm);
            }
            if score > 0.0 {
                scored.push((doc_idx, score));
            }
        }

        // stable sort keeps insertion order for equal scores
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(limit)
            .map(|(idx, score)| (self.docs[idx].chunk.clone(), score))
            .collect()
    }
}
