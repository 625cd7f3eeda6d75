use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How inverse document frequency is scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdfWeighting {
    /// ln((1 + N) / (1 + df)) + 1. Terms present in every document keep a nonzero weight.
    #[default]
    Smooth,
    /// ln(N / df)
    Plain,
}

impl IdfWeighting {
    pub fn idf(self, num_docs: u32, df: u32) -> f32 {
        let n = num_docs as f32;
        let df = df.max(1) as f32;
        match self {
            IdfWeighting::Smooth => ((1.0 + n) / (1.0 + df)).ln() + 1.0,
            IdfWeighting::Plain => (n / df).ln(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Keep only this many terms, ranked by total frequency across the corpus.
    pub max_features: Option<usize>,
    pub idf: IdfWeighting,
    /// Use 1 + ln(count) instead of the raw count.
    pub sublinear_tf: bool,
    pub stem: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { max_features: Some(5000), idf: IdfWeighting::Smooth, sublinear_tf: false, stem: true }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_features == Some(0) {
            return Err(Error::configuration("max_features must be at least 1"));
        }
        Ok(())
    }

    pub fn tf(&self, count: u32) -> f32 {
        if count == 0 {
            0.0
        } else if self.sublinear_tf {
            1.0 + (count as f32).ln()
        } else {
            count as f32
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// What the generator must say when the documents do not contain the answer.
    pub insufficient_context_phrase: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            insufficient_context_phrase: "Based on the provided documents, I cannot answer this question."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub rejection_message: String,
    pub no_documents_message: String,
    /// Prepended to the generator's error when generation fails.
    pub error_prefix: String,
    /// Content preview length, in characters, for the presentation view.
    pub preview_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rejection_message: "Please enter a question.".to_string(),
            no_documents_message: "no relevant documents found".to_string(),
            error_prefix: "processing error: ".to_string(),
            preview_chars: 200,
        }
    }
}
