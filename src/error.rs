use std::path::PathBuf;

use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type for calls into the filesystem and search providers.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from local operations (terminal, log file, state file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal initialization or rendering errors.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(String),

    /// Persisted state could not be read or written.
    #[error("State store error: {0}")]
    Store(String),

    /// Logging could not be initialized.
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Failures reported by the filesystem or search provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Coarse classification used to decide how a failure is presented.
///
/// `NotFound` renders as an empty pane; everything else renders as an inline
/// message. Stale async responses are not errors and never reach this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Provider,
}

impl ProviderError {
    /// Map an I/O error on `path` to the matching provider error.
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => ProviderError::NotFound(path),
            std::io::ErrorKind::AlreadyExists => ProviderError::AlreadyExists(path),
            _ => ProviderError::Io { path, source: err },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Provider,
        }
    }
}

/// A recorded load failure, kept in the tree cache for the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ProviderError> for LoadError {
    fn from(err: &ProviderError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
