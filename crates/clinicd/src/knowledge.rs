//! Keyword knowledge base.
//!
//! Documents come from a JSON-lines file, one `{"content": .., "metadata": {..}}`
//! per line. Retrieval is an inverted index with BM25-lite scoring:
//! deterministic, no embeddings. Ties break on file order.

use crate::capabilities::Retriever;
use anyhow::{Context, Result};
use async_trait::async_trait;
use clinic_shared::Document;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Default number of documents returned per query
pub const DEFAULT_TOP_K: usize = 3;

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Lowercased word tokens, at least two characters long.
///
/// Works on characters, not bytes, so Arabic words are kept intact.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
        .filter(|s| s.chars().count() >= 2)
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Default)]
struct Posting {
    /// (document position, term frequency)
    entries: Vec<(usize, u32)>,
}

/// In-memory document store with a keyword index
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    documents: Vec<Document>,
    postings: HashMap<String, Posting>,
    lengths: Vec<u32>,
    avg_length: f32,
    top_k: usize,
}

impl KnowledgeBase {
    pub fn from_documents(documents: Vec<Document>, top_k: usize) -> Self {
        let mut postings: HashMap<String, Posting> = HashMap::new();
        let mut lengths = Vec::with_capacity(documents.len());

        for (pos, doc) in documents.iter().enumerate() {
            let tokens = tokenize(&doc.content);
            lengths.push(tokens.len() as u32);

            let mut counts: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *counts.entry(token).or_insert(0) += 1;
            }
            for (token, tf) in counts {
                postings.entry(token).or_default().entries.push((pos, tf));
            }
        }

        let total: u32 = lengths.iter().sum();
        let avg_length = if lengths.is_empty() {
            0.0
        } else {
            total as f32 / lengths.len() as f32
        };

        Self {
            documents,
            postings,
            lengths,
            avg_length,
            top_k,
        }
    }

    /// Load a JSON-lines file. Blank lines are skipped; documents without a
    /// `source` get the file name and their line number as metadata.
    pub fn load(path: &Path, top_k: usize) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read knowledge base {}", path.display()))?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let mut documents = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let mut doc: Document = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid document", path.display(), i + 1))?;
            if doc.content.trim().is_empty() {
                continue;
            }
            if doc.meta("source").is_none() {
                doc = doc
                    .with_metadata("source", source.clone())
                    .with_metadata("row", i.to_string());
            }
            documents.push(doc);
        }

        info!(
            "Loaded {} documents from {}",
            documents.len(),
            path.display()
        );
        Ok(Self::from_documents(documents, top_k))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Top-`limit` document positions with integer scores, best first
    pub fn search(&self, query: &str, limit: usize) -> Vec<(usize, i32)> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() || self.documents.is_empty() {
            return vec![];
        }

        let n_docs = self.documents.len() as f32;
        let mut scores: HashMap<usize, f32> = HashMap::new();

        for token in &query_tokens {
            let Some(posting) = self.postings.get(token) else {
                continue;
            };
            let n = posting.entries.len() as f32;
            let idf = ((n_docs - n + 0.5) / (n + 0.5) + 1.0).ln();

            for &(pos, tf) in &posting.entries {
                let len = self.lengths[pos] as f32;
                let norm = 1.0 - B + B * (len / self.avg_length.max(1.0));
                let tf = tf as f32;
                *scores.entry(pos).or_insert(0.0) += idf * (tf * (K1 + 1.0)) / (tf + K1 * norm);
            }
        }

        let mut results: Vec<(usize, i32)> = scores
            .into_iter()
            .map(|(pos, score)| (pos, (score * 1000.0) as i32))
            .collect();
        results.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        results.truncate(limit);
        results
    }

    /// Top-k documents for `query`, best first
    pub fn lookup(&self, query: &str) -> Vec<Document> {
        let hits = self.search(query, self.top_k);
        debug!("knowledge lookup: {} hits for {:?}", hits.len(), query);
        hits.into_iter()
            .map(|(pos, _)| self.documents[pos].clone())
            .collect()
    }
}

#[async_trait]
impl Retriever for KnowledgeBase {
    async fn retrieve(&self, question: &str) -> Result<Vec<Document>> {
        Ok(self.lookup(question))
    }
}
