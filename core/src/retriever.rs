use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::RetrievalError;
use crate::index::DocumentIndex;
use crate::RetrievedDocument;

/// Anything that can rank a collection against a query.
///
/// Implementations never fail across this boundary: a query that cannot be
/// scored yields no documents.
pub trait DocumentRetriever: Send + Sync {
    fn retrieve(&self, query: &str, top_k: usize) -> Vec<RetrievedDocument>;
}

impl<T: DocumentRetriever + ?Sized> DocumentRetriever for Arc<T> {
    fn retrieve(&self, query: &str, top_k: usize) -> Vec<RetrievedDocument> {
        (**self).retrieve(query, top_k)
    }
}

/// Top-k cosine retrieval over a shared, read-only [`DocumentIndex`].
#[derive(Debug, Clone)]
pub struct Retriever {
    index: Arc<DocumentIndex>,
}

impl Retriever {
    pub fn new(index: Arc<DocumentIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    /// The `min(top_k, N)` best documents by descending score. Equal scores keep
    /// collection order. A query with no known terms scores 0 everywhere and
    /// still returns documents.
    pub fn try_retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        if top_k == 0 {
            return Err(RetrievalError::ZeroTopK);
        }
        let index = &*self.index;
        if index.num_rows() != index.len() {
            return Err(RetrievalError::Misaligned { rows: index.num_rows(), documents: index.len() });
        }

        let query_vec = index.vectorize(query);
        let scores = index.similarities(&query_vec);
        let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
        if let Some(&(pos, _)) = ranked.iter().find(|(_, s)| !s.is_finite()) {
            return Err(RetrievalError::NonFiniteScore { id: index.documents()[pos].id.clone() });
        }

        let k = top_k.min(ranked.len());
        if k < ranked.len() {
            ranked.select_nth_unstable_by(k - 1, by_score_then_position);
            ranked.truncate(k);
        }
        ranked.sort_unstable_by(by_score_then_position);

        Ok(ranked
            .into_iter()
            .map(|(pos, score)| {
                let doc = &index.documents()[pos];
                RetrievedDocument { id: doc.id.clone(), content: doc.content.clone(), score }
            })
            .collect())
    }
}

impl DocumentRetriever for Retriever {
    fn retrieve(&self, query: &str, top_k: usize) -> Vec<RetrievedDocument> {
        match self.try_retrieve(query, top_k) {
            Ok(docs) => docs,
            Err(err) => {
                tracing::warn!(error = %err, top_k, "retrieval degraded, returning no documents");
                Vec::new()
            }
        }
    }
}

fn by_score_then_position(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}
