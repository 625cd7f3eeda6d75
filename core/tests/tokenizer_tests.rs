use rag_core::tokenizer::{tokenize, Analyzer};
use rag_core::{DocumentIndex, DocumentRetriever, IndexConfig, Retriever};
use std::sync::Arc;

#[test]
fn it_normalizes_and_stems() {
    let words = tokenize("Running Runners RUN! The café's menu.");
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // Unicode normalization keeps the accented letter but lowercases it
    assert!(words.iter().any(|w| w.starts_with("café")));
}

#[test]
fn it_filters_stopwords() {
    let words = Analyzer::new(false).terms("The quick brown fox and the lazy dog");
    assert_eq!(words, vec!["quick", "brown", "fox", "lazy", "dog"]);
}

#[test]
fn numeric_queries_rank_the_matching_document_first() {
    let index = DocumentIndex::build(
        vec!["other".into(), "fair".into()],
        vec!["The tower stands in the city.".into(), "The fair opened in 1889.".into()],
        IndexConfig::default(),
    )
    .unwrap();
    let docs = Retriever::new(Arc::new(index)).retrieve("1889", 2);
    assert_eq!(docs[0].id, "fair");
    assert!(docs[0].score > 0.0);
    assert_eq!(docs[1].score, 0.0);
}
