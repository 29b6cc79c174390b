use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result alias used throughout the pipeline and retrieval modules.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the indexing pipeline and retrieval engine.
#[derive(Debug)]
pub enum Error {
    /// Malformed page geometry, workspace, or index payload.
    Parse { message: String },
    /// Missing workspace or index file in file-based mode.
    NotFound { path: PathBuf },
    /// Index build attempted with zero qualifying blocks.
    NoEmbeddings,
    /// Zero-norm embedding vector; signals an embedding-function fault.
    DegenerateVector,
    /// Vector dimensionality disagrees with the index.
    DimensionMismatch { expected: usize, found: usize },
    /// External embedding collaborator failure.
    Embedding { message: String },
    /// File I/O failure outside the NotFound case.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse { message } => write!(f, "parse error: {message}"),
            Error::NotFound { path } => write!(f, "not found: {}", path.display()),
            Error::NoEmbeddings => write!(f, "no valid embeddings found in workspace"),
            Error::DegenerateVector => {
                write!(f, "zero-norm embedding vector cannot be normalized")
            }
            Error::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: index has {expected}, vector has {found}")
            }
            Error::Embedding { message } => write!(f, "embedding request failed: {message}"),
            Error::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse {
            message: err.to_string(),
        }
    }
}
