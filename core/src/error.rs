use thiserror::Error;

/// Construction and persistence failures. None of these are raised per request.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cannot build an index over an empty corpus")]
    EmptyCorpus,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// True for malformed construction input, the empty corpus included.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::EmptyCorpus)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A single query could not be scored. The retriever recovers from these by
/// returning no documents.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetrievalError {
    #[error("top_k must be at least 1")]
    ZeroTopK,

    #[error("non-finite similarity for document {id}")]
    NonFiniteScore { id: String },

    #[error("index has {rows} rows but {documents} documents")]
    Misaligned { rows: usize, documents: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("generator unavailable: {0}")]
    Unavailable(String),

    #[error("generation failed: {0}")]
    Failed(String),

    #[error("generator returned an empty response")]
    EmptyResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_corpus_counts_as_configuration() {
        assert!(Error::EmptyCorpus.is_configuration());
        assert!(Error::configuration("ids and contents differ").is_configuration());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(!Error::from(io).is_configuration());
    }

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(RetrievalError::ZeroTopK.to_string(), "top_k must be at least 1");
        assert_eq!(
            GenerationError::Unavailable("connection refused".into()).to_string(),
            "generator unavailable: connection refused"
        );
    }
}
