//! Retrieve-then-generate orchestration.
//!
//! Every request ends in one of four states: rejected before any work,
//! no documents found (generation skipped), done, or failed in generation.
//! None of them surfaces as an error to the caller.

use serde::Serialize;
use std::time::{Duration, Instant};

use crate::config::PipelineConfig;
use crate::generation::GenerationPort;
use crate::retriever::DocumentRetriever;
use crate::RetrievedDocument;

/// Wall-clock milliseconds spent on one request's critical path.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Timings {
    pub retrieval_ms: f64,
    pub generation_ms: f64,
    pub total_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub answer: String,
    pub retrieved_docs: Vec<RetrievedDocument>,
    pub timings: Timings,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Blank question. Nothing was retrieved or generated.
    Rejected { message: String },
    /// The retriever returned nothing, so generation was skipped.
    NoDocumentsFound { answer: String, retrieval_ms: f64 },
    Done(PipelineResult),
    /// The generator failed. `answer` describes why.
    Failed { answer: String },
}

impl PipelineOutcome {
    pub fn answer(&self) -> &str {
        match self {
            PipelineOutcome::Rejected { message } => message,
            PipelineOutcome::NoDocumentsFound { answer, .. } => answer,
            PipelineOutcome::Done(result) => &result.answer,
            PipelineOutcome::Failed { answer } => answer,
        }
    }

    pub fn retrieved_docs(&self) -> &[RetrievedDocument] {
        match self {
            PipelineOutcome::Done(result) => result.retrieved_docs.as_slice(),
            _ => &[],
        }
    }

    pub fn timings(&self) -> Option<Timings> {
        match self {
            PipelineOutcome::Done(result) => Some(result.timings),
            _ => None,
        }
    }

    pub fn into_parts(self) -> (String, Vec<RetrievedDocument>) {
        match self {
            PipelineOutcome::Done(result) => (result.answer, result.retrieved_docs),
            other => (other.answer().to_string(), Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRow {
    pub label: String,
    pub detail: String,
}

/// The outcome shaped for display: answer text, one stats line, one row per document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Presentation {
    pub answer: String,
    pub stats: String,
    pub documents: Vec<DocumentRow>,
}

impl Presentation {
    pub fn from_outcome(outcome: &PipelineOutcome, preview_chars: usize) -> Self {
        let stats = match outcome {
            PipelineOutcome::Done(result) => format!(
                "total: {:.2}ms | retrieval: {:.2}ms | generation: {:.2}ms | documents: {}",
                result.timings.total_ms,
                result.timings.retrieval_ms,
                result.timings.generation_ms,
                result.retrieved_docs.len()
            ),
            PipelineOutcome::NoDocumentsFound { retrieval_ms, .. } => {
                format!("retrieval: {retrieval_ms:.2}ms | documents: 0")
            }
            PipelineOutcome::Rejected { .. } | PipelineOutcome::Failed { .. } => String::new(),
        };
        let documents = outcome
            .retrieved_docs()
            .iter()
            .enumerate()
            .map(|(i, doc)| DocumentRow {
                label: format!("Document {}", i + 1),
                detail: format!(
                    "ID: {}\nScore: {:.4}\nContent: {}",
                    doc.id,
                    doc.score,
                    preview(&doc.content, preview_chars)
                ),
            })
            .collect();
        Self { answer: outcome.answer().to_string(), stats, documents }
    }
}

/// First `max_chars` characters, with an ellipsis when something was cut.
fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Sequences retrieval and generation for one question at a time. Holds no
/// per-request state, so one pipeline can serve concurrent requests.
pub struct RagPipeline<R, G> {
    retriever: R,
    generator: G,
    config: PipelineConfig,
}

impl<R, G> RagPipeline<R, G>
where
    R: DocumentRetriever,
    G: GenerationPort,
{
    pub fn new(retriever: R, generator: G, config: PipelineConfig) -> Self {
        Self { retriever, generator, config }
    }

    pub fn retriever(&self) -> &R {
        &self.retriever
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, question: &str, top_k: usize) -> PipelineOutcome {
        if question.trim().is_empty() {
            return PipelineOutcome::Rejected { message: self.config.rejection_message.clone() };
        }

        let start = Instant::now();
        let docs = self.retriever.retrieve(question, top_k);
        let retrieval = start.elapsed();
        if docs.is_empty() {
            tracing::info!(top_k, "no documents retrieved, skipping generation");
            return PipelineOutcome::NoDocumentsFound {
                answer: self.config.no_documents_message.clone(),
                retrieval_ms: millis(retrieval),
            };
        }

        let generation_start = Instant::now();
        match self.generator.generate(question, &docs).await {
            Ok(answer) => {
                let timings = Timings {
                    retrieval_ms: millis(retrieval),
                    generation_ms: millis(generation_start.elapsed()),
                    total_ms: millis(start.elapsed()),
                };
                tracing::debug!(
                    docs = docs.len(),
                    retrieval_ms = timings.retrieval_ms,
                    generation_ms = timings.generation_ms,
                    total_ms = timings.total_ms,
                    "answered question"
                );
                PipelineOutcome::Done(PipelineResult { answer, retrieved_docs: docs, timings })
            }
            Err(err) => {
                tracing::warn!(error = %err, model = self.generator.model(), "generation failed");
                PipelineOutcome::Failed { answer: format!("{}{}", self.config.error_prefix, err) }
            }
        }
    }

    /// Answer and ranked documents, for programmatic callers.
    pub async fn answer(&self, question: &str, top_k: usize) -> (String, Vec<RetrievedDocument>) {
        self.run(question, top_k).await.into_parts()
    }

    pub async fn present(&self, question: &str, top_k: usize) -> Presentation {
        let outcome = self.run(question, top_k).await;
        Presentation::from_outcome(&outcome, self.config.preview_chars)
    }

    /// Answer each question in turn. One failed or rejected question does not
    /// stop the rest; results keep the input order.
    pub async fn answer_batch<S: AsRef<str>>(
        &self,
        questions: &[S],
        top_k: usize,
    ) -> Vec<(String, Vec<RetrievedDocument>)> {
        let mut answers = Vec::with_capacity(questions.len());
        for question in questions {
            answers.push(self.answer(question.as_ref(), top_k).await);
        }
        answers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, content: &str, score: f32) -> RetrievedDocument {
        RetrievedDocument { id: id.into(), content: content.into(), score }
    }

    #[test]
    fn preview_cuts_on_char_boundaries() {
        assert_eq!(preview("héllo wörld", 4), "héll...");
        assert_eq!(preview("short", 200), "short");
        assert_eq!(preview("exact", 5), "exact");
    }

    #[test]
    fn long_content_is_truncated_but_id_and_score_are_not() {
        let long_id = "x".repeat(300);
        let outcome = PipelineOutcome::Done(PipelineResult {
            answer: "a".into(),
            retrieved_docs: vec![doc(&long_id, &"y".repeat(500), 0.123456)],
            timings: Timings::default(),
        });
        let view = Presentation::from_outcome(&outcome, 200);
        let detail = &view.documents[0].detail;
        assert_eq!(view.documents[0].label, "Document 1");
        assert!(detail.contains(&format!("ID: {long_id}\n")));
        assert!(detail.contains("Score: 0.1235"));
        assert!(detail.ends_with(&format!("{}...", "y".repeat(200))));
    }

    #[test]
    fn failed_and_rejected_have_empty_stats() {
        let failed = Presentation::from_outcome(&PipelineOutcome::Failed { answer: "processing error: x".into() }, 200);
        assert!(failed.stats.is_empty());
        assert!(failed.documents.is_empty());
        let rejected = Presentation::from_outcome(&PipelineOutcome::Rejected { message: "ask".into() }, 200);
        assert_eq!(rejected.answer, "ask");
        assert!(rejected.stats.is_empty());
    }

    #[test]
    fn no_documents_reports_retrieval_time() {
        let outcome = PipelineOutcome::NoDocumentsFound { answer: "none".into(), retrieval_ms: 1.5 };
        let view = Presentation::from_outcome(&outcome, 200);
        assert_eq!(view.stats, "retrieval: 1.50ms | documents: 0");
        assert_eq!(outcome.into_parts(), ("none".to_string(), Vec::new()));
    }
}
