//! Evidence documents produced by the retriever.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Context text used when a prompt has no evidence to show
pub const NO_SPECIFIC_CONTEXT: &str =
    "No specific context available - using comprehensive hospital knowledge base";

/// Opaque evidence unit. Immutable once retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Metadata value for `key`, if any
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .map(String::as_str)
    }
}

/// Render documents as a numbered evidence block for prompts.
///
/// Returns `None` for an empty set so callers choose their own marker.
pub fn render_documents(documents: &[Document]) -> Option<String> {
    if documents.is_empty() {
        return None;
    }

    let mut out = String::new();
    for (i, doc) in documents.iter().enumerate() {
        out.push_str(&format!("[{}] ", i + 1));
        if let Some(source) = doc.meta("source") {
            out.push_str(&format!("(source: {}) ", source));
        }
        out.push_str(doc.content.trim());
        out.push('\n');
    }
    Some(out)
}
