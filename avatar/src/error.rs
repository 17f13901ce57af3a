use thiserror::Error;

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("motion clip '{key}' failed to load: {reason}")]
    ClipLoad { key: String, reason: String },

    #[error("motion clip could not be parsed: {0}")]
    ClipParse(#[from] serde_json::Error),

    #[error("unknown motion clip key '{0}'")]
    UnknownClip(String),

    #[error("motion clip '{0}' has no usable tracks")]
    EmptyClip(String),

    #[error("motion clip '{0}' did not load in time")]
    ClipTimeout(String),

    #[error("speech service error: {0}")]
    Speech(String),
}

pub type Result<T> = std::result::Result<T, AvatarError>;
