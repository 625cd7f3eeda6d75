use async_trait::async_trait;
use rag_core::{
    DocumentIndex, DocumentRetriever, GenerationError, GenerationPort, IndexConfig, PipelineConfig,
    PipelineOutcome, PromptBuilder, RagPipeline, RetrievedDocument, Retriever,
};
use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Answers with the rendered context, so tests can see what it was given.
#[derive(Default)]
struct EchoGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl GenerationPort for EchoGenerator {
    async fn generate(&self, _question: &str, context: &[RetrievedDocument]) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PromptBuilder::build_context(context))
    }

    fn model(&self) -> &str {
        "echo"
    }
}

struct FailingGenerator;

#[async_trait]
impl GenerationPort for FailingGenerator {
    async fn generate(&self, _question: &str, _context: &[RetrievedDocument]) -> Result<String, GenerationError> {
        Err(GenerationError::Failed("model crashed".into()))
    }

    fn model(&self) -> &str {
        "failing"
    }
}

struct SlowGenerator;

#[async_trait]
impl GenerationPort for SlowGenerator {
    async fn generate(&self, _question: &str, context: &[RetrievedDocument]) -> Result<String, GenerationError> {
        tokio::time::sleep(Duration::from_millis(25)).await;
        Ok(format!("{} documents", context.len()))
    }

    fn model(&self) -> &str {
        "slow"
    }
}

/// Stands in for a retriever wired to a corpus with nothing in it.
#[derive(Default)]
struct EmptyRetriever {
    calls: AtomicUsize,
}

impl DocumentRetriever for EmptyRetriever {
    fn retrieve(&self, _query: &str, _top_k: usize) -> Vec<RetrievedDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Vec::new()
    }
}

fn retriever(docs: &[(&str, &str)]) -> Retriever {
    let ids = docs.iter().map(|(id, _)| id.to_string()).collect();
    let contents = docs.iter().map(|(_, c)| c.to_string()).collect();
    Retriever::new(Arc::new(DocumentIndex::build(ids, contents, IndexConfig::default()).unwrap()))
}

fn cities() -> Retriever {
    retriever(&[
        ("tokyo", "Tokyo is the capital of Japan and its largest city."),
        ("paris", "Paris is the capital of France, on the river Seine."),
        ("berlin", "Berlin is the capital of Germany."),
    ])
}

#[tokio::test]
async fn answers_from_the_best_matching_document() {
    let generator = Arc::new(EchoGenerator::default());
    let pipeline = RagPipeline::new(cities(), Arc::clone(&generator), PipelineConfig::default());

    let outcome = pipeline.run("What is the capital of France?", 2).await;
    let docs = outcome.retrieved_docs();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].id, "paris");
    assert!(docs[0].score > 0.0);
    assert!(outcome.answer().contains("Paris"));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

    let view = pipeline.present("What is the capital of France?", 2).await;
    let timing = Regex::new(r"(\d+\.\d+)ms").unwrap();
    let values: Vec<f64> = timing.captures_iter(&view.stats).map(|c| c[1].parse().unwrap()).collect();
    assert_eq!(values.len(), 3);
    assert!(values.iter().all(|v| *v >= 0.0));
    assert!(view.stats.ends_with("documents: 2"));
    assert_eq!(view.documents.len(), 2);
    assert!(view.documents[0].detail.starts_with("ID: paris\nScore: "));
}

#[tokio::test]
async fn unrelated_corpus_still_yields_k_documents() {
    let generator = Arc::new(EchoGenerator::default());
    let unrelated = retriever(&[
        ("a", "Borrow checking prevents data races."),
        ("b", "Tokio schedules asynchronous tasks."),
        ("c", "Cargo resolves crate dependencies."),
        ("d", "Clippy suggests idiomatic rewrites."),
    ]);
    let pipeline = RagPipeline::new(unrelated, Arc::clone(&generator), PipelineConfig::default());

    let (answer, docs) = pipeline.answer("What is the capital of France?", 3).await;
    assert_eq!(docs.len(), 3);
    assert!(docs.iter().all(|d| d.score == 0.0));
    assert!(!answer.is_empty());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_retrieval_skips_generation() {
    let generator = Arc::new(EchoGenerator::default());
    let pipeline = RagPipeline::new(EmptyRetriever::default(), Arc::clone(&generator), PipelineConfig::default());

    let outcome = pipeline.run("What is the capital of France?", 5).await;
    assert!(matches!(outcome, PipelineOutcome::NoDocumentsFound { .. }));
    assert_eq!(outcome.answer(), "no relevant documents found");
    assert!(outcome.retrieved_docs().is_empty());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);

    let view = pipeline.present("What is the capital of France?", 5).await;
    assert!(view.stats.contains("documents: 0"));
    assert!(view.documents.is_empty());
}

#[tokio::test]
async fn degraded_retrieval_is_reported_as_no_documents() {
    let generator = Arc::new(EchoGenerator::default());
    let pipeline = RagPipeline::new(cities(), Arc::clone(&generator), PipelineConfig::default());

    let outcome = pipeline.run("capital", 0).await;
    assert!(matches!(outcome, PipelineOutcome::NoDocumentsFound { .. }));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn generator_failure_is_contained() {
    let pipeline = RagPipeline::new(cities(), FailingGenerator, PipelineConfig::default());

    let outcome = pipeline.run("What is the capital of France?", 2).await;
    assert!(matches!(outcome, PipelineOutcome::Failed { .. }));
    assert_eq!(outcome.answer(), "processing error: generation failed: model crashed");
    assert!(outcome.retrieved_docs().is_empty());
    assert!(outcome.timings().is_none());

    let view = pipeline.present("What is the capital of France?", 2).await;
    assert!(view.answer.starts_with("processing error"));
    assert!(view.stats.is_empty());
    assert!(view.documents.is_empty());

    // the pipeline stays usable
    let again = pipeline.run("capital of Germany", 1).await;
    assert!(again.answer().contains("processing error"));
}

#[tokio::test]
async fn blank_questions_are_rejected_without_work() {
    let retriever = Arc::new(EmptyRetriever::default());
    let generator = Arc::new(EchoGenerator::default());
    let config = PipelineConfig::default();
    let pipeline = RagPipeline::new(Arc::clone(&retriever), Arc::clone(&generator), config.clone());

    for question in ["", "   ", "\t\n"] {
        let outcome = pipeline.run(question, 3).await;
        assert_eq!(outcome, PipelineOutcome::Rejected { message: config.rejection_message.clone() });
        let view = pipeline.present(question, 3).await;
        assert_eq!(view.answer, "Please enter a question.");
        assert!(view.stats.is_empty());
    }
    assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn timings_stay_per_request_under_concurrency() {
    let pipeline = Arc::new(RagPipeline::new(cities(), SlowGenerator, PipelineConfig::default()));

    let handles: Vec<_> = (1..=4)
        .map(|k| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.run("capital city", k).await })
        })
        .collect();
    for (k, handle) in (1..=4).zip(handles) {
        let outcome = handle.await.unwrap();
        let timings = outcome.timings().expect("generation succeeded");
        assert!(timings.generation_ms >= 20.0);
        assert!(timings.total_ms >= timings.retrieval_ms + timings.generation_ms - 1e-6);
        assert_eq!(outcome.retrieved_docs().len(), k.min(3));
    }
}

#[tokio::test]
async fn batches_answer_every_question_in_order() {
    let generator = Arc::new(EchoGenerator::default());
    let pipeline = RagPipeline::new(cities(), Arc::clone(&generator), PipelineConfig::default());

    let answers = pipeline.answer_batch(&["capital of France", "  ", "Germany"], 1).await;
    assert_eq!(answers.len(), 3);
    assert_eq!(answers[0].1[0].id, "paris");
    assert_eq!(answers[1].0, "Please enter a question.");
    assert!(answers[1].1.is_empty());
    assert_eq!(answers[2].1[0].id, "berlin");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
}
