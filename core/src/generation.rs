//! Contract with the external text generator, and the prompt it is given.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::PromptConfig;
use crate::error::GenerationError;
use crate::RetrievedDocument;

/// A text generator conditioned on retrieved documents.
///
/// Implementations must answer only from `context` and fall back to the
/// configured insufficient-context phrase; [`PromptBuilder::build_prompt`]
/// produces an instruction that says so. A call may take arbitrarily long and
/// is made once per request, without retry.
#[async_trait]
pub trait GenerationPort: Send + Sync {
    async fn generate(&self, question: &str, context: &[RetrievedDocument]) -> Result<String, GenerationError>;

    /// Model name for logging and system info
    fn model(&self) -> &str;
}

#[async_trait]
impl<T: GenerationPort + ?Sized> GenerationPort for Arc<T> {
    async fn generate(&self, question: &str, context: &[RetrievedDocument]) -> Result<String, GenerationError> {
        (**self).generate(question, context).await
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}

pub struct PromptBuilder;

impl PromptBuilder {
    /// One line per document, in ranked order.
    pub fn build_context(docs: &[RetrievedDocument]) -> String {
        docs.iter()
            .enumerate()
            .map(|(i, doc)| format!("[Document {}, ID: {}]: {}", i + 1, doc.id, doc.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn build_prompt(question: &str, docs: &[RetrievedDocument], config: &PromptConfig) -> String {
        format!(
            r#"You are a question answering assistant. Answer the user's question using only the documents below. Do not make anything up.

Relevant documents:
{context}

Question: {question}

Give an accurate, concise answer based on the documents above. If the documents do not contain the information, reply exactly "{sentinel}".

Answer:"#,
            context = Self::build_context(docs),
            question = question,
            sentinel = config.insufficient_context_phrase,
        )
    }
}
