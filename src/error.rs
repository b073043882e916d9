//! Error taxonomy for the ETL stages.

use std::fmt;
use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Loading,
    Cleaning,
    Mapping,
    Writing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetching => "fetching",
            Stage::Loading => "loading",
            Stage::Cleaning => "cleaning",
            Stage::Mapping => "mapping",
            Stage::Writing => "writing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort a pipeline run.
///
/// No stage recovers from these locally, they all propagate to the
/// orchestrator which logs them and stops the run.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("Authentication failed: {cause}")]
    Authentication { cause: String },

    #[error("Download failed: {cause}")]
    Download { cause: String },

    #[error("Archive extraction failed: {cause}")]
    Extraction { cause: String },

    #[error("Could not parse dataset: {cause}")]
    Parse { cause: String },

    #[error("Could not map records: {cause}")]
    Mapping { cause: String },

    #[error("Write to '{collection}' failed at chunk {chunk_index}: {cause}")]
    Write {
        collection: String,
        chunk_index: usize,
        cause: String,
    },

    #[error("Database error: {cause}")]
    Database { cause: String },
}

impl EtlError {
    pub fn authentication(cause: impl Into<String>) -> Self {
        EtlError::Authentication {
            cause: cause.into(),
        }
    }

    pub fn download(cause: impl Into<String>) -> Self {
        EtlError::Download {
            cause: cause.into(),
        }
    }

    pub fn extraction(cause: impl Into<String>) -> Self {
        EtlError::Extraction {
            cause: cause.into(),
        }
    }

    pub fn parse(cause: impl Into<String>) -> Self {
        EtlError::Parse {
            cause: cause.into(),
        }
    }

    pub fn mapping(cause: impl Into<String>) -> Self {
        EtlError::Mapping {
            cause: cause.into(),
        }
    }

    pub fn database(cause: impl Into<String>) -> Self {
        EtlError::Database {
            cause: cause.into(),
        }
    }

    /// The stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            EtlError::Authentication { .. }
            | EtlError::Download { .. }
            | EtlError::Extraction { .. } => Stage::Fetching,
            EtlError::Parse { .. } => Stage::Loading,
            EtlError::Mapping { .. } => Stage::Mapping,
            EtlError::Write { .. } | EtlError::Database { .. } => Stage::Writing,
        }
    }

    /// The taxonomy name of this error, as written in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EtlError::Authentication { .. } => "AuthenticationError",
            EtlError::Download { .. } => "DownloadError",
            EtlError::Extraction { .. } => "ExtractionError",
            EtlError::Parse { .. } => "ParseError",
            EtlError::Mapping { .. } => "MappingError",
            EtlError::Write { .. } => "WriteError",
            EtlError::Database { .. } => "DatabaseError",
        }
    }

    /// Chunk index for write failures, `None` for everything else.
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            EtlError::Write { chunk_index, .. } => Some(*chunk_index),
            _ => None,
        }
    }
}
