//! Lexical retrieval-augmented generation: a TF-IDF document index, a top-k
//! retriever over it, and the pipeline that feeds retrieved passages to a
//! text generator.

use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod generation;
pub mod index;
pub mod persist;
pub mod pipeline;
pub mod retriever;
pub mod tokenizer;

pub use config::{IdfWeighting, IndexConfig, PipelineConfig, PromptConfig};
pub use error::{Error, GenerationError, Result, RetrievalError};
pub use generation::{GenerationPort, PromptBuilder};
pub use index::{DocumentIndex, QueryVector};
pub use pipeline::{DocumentRow, PipelineOutcome, PipelineResult, Presentation, RagPipeline, Timings};
pub use retriever::{DocumentRetriever, Retriever};

pub type TermId = u32;
/// Position of a document in the collection. Row `i` of the index is document `i`.
pub type DocId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
}

/// One ranked hit. `score` is the cosine similarity to the query, in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: String,
    pub content: String,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f32, // normalized tf-idf weight
}
