use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::tokenizer::Analyzer;
use crate::{DocId, Document, Posting, TermId};

/// Sparse TF-IDF matrix over a fixed document collection.
///
/// Rows are L2-normalized, so the cosine similarity between a query and a
/// document is the dot product of their vectors. Row `i` always belongs to
/// `documents[i]`; the collection cannot change after construction, a new
/// collection needs a new index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentIndex {
    config: IndexConfig,
    documents: Vec<Document>,
    id_map: HashMap<String, DocId>,
    dictionary: HashMap<String, TermId>,
    idf: Vec<f32>,
    rows: Vec<Vec<(TermId, f32)>>,
    postings: Vec<Vec<Posting>>, // per term, sorted by doc_id
}

/// A query projected into the index vocabulary. Empty when no query term is in
/// the vocabulary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryVector {
    weights: Vec<(TermId, f32)>,
}

impl QueryVector {
    pub fn is_zero(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> &[(TermId, f32)] {
        &self.weights
    }
}

impl DocumentIndex {
    /// Fit the vocabulary and term weights over `contents`. `ids[i]` names `contents[i]`.
    pub fn build(ids: Vec<String>, contents: Vec<String>, config: IndexConfig) -> Result<Self> {
        if ids.len() != contents.len() {
            return Err(Error::configuration(format!(
                "{} document ids but {} document contents",
                ids.len(),
                contents.len()
            )));
        }
        if ids.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        config.validate()?;

        let mut id_map: HashMap<String, DocId> = HashMap::with_capacity(ids.len());
        for (pos, id) in ids.iter().enumerate() {
            if id_map.insert(id.clone(), pos as DocId).is_some() {
                return Err(Error::configuration(format!("duplicate document id {id:?}")));
            }
        }

        let analyzer = Analyzer::new(config.stem);
        let counts: Vec<HashMap<String, u32>> = contents.iter().map(|c| term_counts(&analyzer, c)).collect();

        // term -> (total occurrences, document frequency)
        let mut corpus_freq: HashMap<&str, (u64, u32)> = HashMap::new();
        for doc in &counts {
            for (term, &count) in doc {
                let entry = corpus_freq.entry(term.as_str()).or_insert((0, 0));
                entry.0 += count as u64;
                entry.1 += 1;
            }
        }
        let mut ranked: Vec<(&str, u64, u32)> =
            corpus_freq.into_iter().map(|(term, (total, df))| (term, total, df)).collect();
        if let Some(cap) = config.max_features {
            if ranked.len() > cap {
                ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
                ranked.truncate(cap);
            }
        }
        ranked.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let num_docs = ids.len() as u32;
        let mut dictionary: HashMap<String, TermId> = HashMap::with_capacity(ranked.len());
        let mut idf: Vec<f32> = Vec::with_capacity(ranked.len());
        for (term_id, (term, _, df)) in ranked.iter().enumerate() {
            dictionary.insert((*term).to_string(), term_id as TermId);
            idf.push(config.idf.idf(num_docs, *df));
        }

        let mut postings: Vec<Vec<Posting>> = vec![Vec::new(); dictionary.len()];
        let mut rows = Vec::with_capacity(counts.len());
        for (doc_id, doc_counts) in counts.iter().enumerate() {
            let in_vocab = doc_counts
                .iter()
                .filter_map(|(term, &count)| dictionary.get(term).map(|&tid| (tid, count)));
            let row = weigh(in_vocab, &idf, &config);
            for &(tid, weight) in &row {
                postings[tid as usize].push(Posting { doc_id: doc_id as DocId, weight });
            }
            rows.push(row);
        }

        let documents = ids
            .into_iter()
            .zip(contents)
            .map(|(id, content)| Document { id, content })
            .collect();

        tracing::info!(num_docs, num_terms = dictionary.len(), "built document index");
        Ok(Self { config, documents, id_map, dictionary, idf, rows, postings })
    }

    pub fn from_documents(documents: Vec<Document>, config: IndexConfig) -> Result<Self> {
        let (ids, contents) = documents.into_iter().map(|d| (d.id, d.content)).unzip();
        Self::build(ids, contents, config)
    }

    /// Project `query` with the weighting fitted at construction. Terms outside
    /// the vocabulary contribute nothing.
    pub fn vectorize(&self, query: &str) -> QueryVector {
        let analyzer = Analyzer::new(self.config.stem);
        let mut counts: HashMap<TermId, u32> = HashMap::new();
        for term in analyzer.terms(query) {
            if let Some(&tid) = self.dictionary.get(&term) {
                *counts.entry(tid).or_insert(0) += 1;
            }
        }
        QueryVector { weights: weigh(counts.into_iter(), &self.idf, &self.config) }
    }

    /// Cosine similarity of `query` against every row, in row order.
    ///
    /// Allocates its own score buffer, so concurrent callers share nothing mutable.
    pub fn similarities(&self, query: &QueryVector) -> Vec<f32> {
        let mut scores = vec![0.0f32; self.documents.len()];
        for &(tid, q_w) in &query.weights {
            if let Some(plist) = self.postings.get(tid as usize) {
                for p in plist {
                    scores[p.doc_id as usize] += p.weight * q_w;
                }
            }
        }
        // rounding can push a perfect match just past 1
        for s in scores.iter_mut() {
            *s = s.min(1.0);
        }
        scores
    }

    /// Check the structural invariants of a deserialized index.
    pub fn validate(&self) -> Result<()> {
        if self.documents.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        if self.rows.len() != self.documents.len() || self.id_map.len() != self.documents.len() {
            return Err(Error::configuration(format!(
                "index has {} rows and {} ids for {} documents",
                self.rows.len(),
                self.id_map.len(),
                self.documents.len()
            )));
        }
        if self.idf.len() != self.dictionary.len() || self.postings.len() != self.dictionary.len() {
            return Err(Error::configuration("vocabulary, idf and postings are out of step"));
        }
        for (pos, doc) in self.documents.iter().enumerate() {
            if self.id_map.get(&doc.id) != Some(&(pos as DocId)) {
                return Err(Error::configuration(format!("document {:?} is not at position {pos}", doc.id)));
            }
        }
        let num_docs = self.documents.len();
        let num_terms = self.idf.len();
        if let Some(p) = self.postings.iter().flatten().find(|p| p.doc_id as usize >= num_docs) {
            return Err(Error::configuration(format!("posting for document {} out of {num_docs}", p.doc_id)));
        }
        if let Some(&(tid, _)) = self.rows.iter().flatten().find(|(tid, _)| *tid as usize >= num_terms) {
            return Err(Error::configuration(format!("row term {tid} outside a vocabulary of {num_terms}")));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.dictionary.len()
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document_at(&self, doc_id: DocId) -> Option<&Document> {
        self.documents.get(doc_id as usize)
    }

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.id_map.get(id).and_then(|&doc_id| self.document_at(doc_id))
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.dictionary.get(term).copied()
    }

    /// Normalized weights of one document, sorted by term id.
    pub fn row(&self, doc_id: DocId) -> Option<&[(TermId, f32)]> {
        self.rows.get(doc_id as usize).map(Vec::as_slice)
    }
}

fn term_counts(analyzer: &Analyzer, text: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for term in analyzer.terms(text) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}

/// tf * idf per term, L2-normalized. An all-zero vector stays empty.
fn weigh(counts: impl Iterator<Item = (TermId, u32)>, idf: &[f32], config: &IndexConfig) -> Vec<(TermId, f32)> {
    let mut row: Vec<(TermId, f32)> = counts
        .map(|(tid, count)| (tid, config.tf(count) * idf[tid as usize]))
        .filter(|(_, w)| *w > 0.0)
        .collect();
    row.sort_unstable_by_key(|(tid, _)| *tid);
    let norm = row.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        for (_, w) in row.iter_mut() {
            *w /= norm;
        }
    }
    row
}
