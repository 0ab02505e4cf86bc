use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable error tag carried in wire error envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    UnknownNode,
    InsufficientCapacity,
    UnrecoverableChunk,
    ChunkMissing,
    NetworkError,
    Internal,
}

/// Error type shared by every crate in the workspace. Each variant maps onto
/// one [`ErrorKind`] surfaced on the wire; `Remote` wraps an error envelope
/// received from a peer.
#[derive(Debug, Error)]
pub enum DfsError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("chunk server not registered: {0}")]
    UnknownNode(String),
    #[error("insufficient chunk servers: need {needed}, found {found}")]
    InsufficientCapacity { needed: usize, found: usize },
    #[error("no live replica for chunk {0}")]
    UnrecoverableChunk(u64),
    #[error("chunk not found: {0}")]
    ChunkMissing(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("{message}")]
    Remote { kind: ErrorKind, message: String },
    #[error("{0}")]
    Internal(String),
}

impl DfsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DfsError::NotFound(_) => ErrorKind::NotFound,
            DfsError::UnknownNode(_) => ErrorKind::UnknownNode,
            DfsError::InsufficientCapacity { .. } => ErrorKind::InsufficientCapacity,
            DfsError::UnrecoverableChunk(_) => ErrorKind::UnrecoverableChunk,
            DfsError::ChunkMissing(_) => ErrorKind::ChunkMissing,
            DfsError::Network(_) => ErrorKind::NetworkError,
            DfsError::Remote { kind, .. } => *kind,
            DfsError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Rebuild an error from a wire envelope. Peers that predate the `kind`
    /// field only send `message`.
    pub fn from_wire(kind: Option<ErrorKind>, message: String) -> Self {
        DfsError::Remote {
            kind: kind.unwrap_or(ErrorKind::Internal),
            message,
        }
    }
}

// timeouts, broken connections and malformed JSON all surface as NetworkError
impl From<std::io::Error> for DfsError {
    fn from(e: std::io::Error) -> Self {
        DfsError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for DfsError {
    fn from(e: serde_json::Error) -> Self {
        DfsError::Network(format!("malformed message: {e}"))
    }
}

impl From<tokio::time::error::Elapsed> for DfsError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        DfsError::Network("operation timed out".to_owned())
    }
}

impl From<String> for DfsError {
    fn from(message: String) -> Self {
        DfsError::Internal(message)
    }
}

impl From<&str> for DfsError {
    fn from(message: &str) -> Self {
        DfsError::Internal(message.to_owned())
    }
}

pub type Result<T> = std::result::Result<T, DfsError>;
