use serde::Serialize;

/// All errors that can surface from playground commands.
#[derive(Debug, thiserror::Error)]
pub enum PlaygroundError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// User input rejected before any state change (e.g. a blank project name).
    #[error("{0}")]
    Validation(String),

    /// A project id that no longer exists in the store.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Custom(String),
}

// Tauri requires error types to implement Serialize for IPC transport.
impl Serialize for PlaygroundError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlaygroundError>;
