pub type CompositionResult<T> = Result<T, CompositionError>;

/// Fatal composition failures. Everything else degrades inside the renderer.
#[derive(thiserror::Error, Debug)]
pub enum CompositionError {
    #[error("failed to create a {width}x{height} drawing surface")]
    SurfaceCreationFailed { width: u32, height: u32 },

    #[error("failed to read artwork: {0}")]
    SourceDecodeFailed(String),
}

impl CompositionError {
    pub fn source_decode(msg: impl Into<String>) -> Self {
        Self::SourceDecodeFailed(msg.into())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    #[error("not a catalog identifier or link: {0}")]
    InvalidIdentifier(String),

    #[error("lookup request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no catalog entry for {0}")]
    NotFound(String),

    #[error("malformed lookup response: {0}")]
    Decode(String),
}
