use thiserror::Error;

/// Library error type for museum-wall operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Layout export payload could not be encoded or parsed.
    #[error("layout export: {0}")]
    Export(#[from] serde_json::Error),

    /// An image could not be probed or decoded.
    #[error("image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },

    /// An exported frame id has no counterpart in the wall being patched.
    #[error("unknown frame id in export: {0}")]
    UnknownFrame(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
