//! Retrieval augmentation over an uploaded text document.

pub mod chunking;
pub mod similarity;

pub use chunking::chunk_document;
pub use similarity::{ScoredChunk, cosine_similarity, top_chunks};

use serde::{Deserialize, Serialize};

/// Number of chunks added to the system prompt.
pub const CONTEXT_CHUNKS: usize = 3;

/// A document attached to a chatbox, with one embedding per chunk once
/// embedding has succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDocument {
    pub file_name: String,
    pub text: String,
    pub chunks: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
}

impl ResourceDocument {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Retrieval only runs when both chunks and embeddings are present.
    pub fn is_searchable(&self) -> bool {
        !self.chunks.is_empty() && !self.embeddings.is_empty()
    }
}
