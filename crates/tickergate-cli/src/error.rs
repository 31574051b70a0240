use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] tickergate_core::ValidationError),

    #[error(transparent)]
    Route(#[from] tickergate_core::RouteError),

    #[error("unknown provider or query kind: {0}")]
    UnknownName(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) | Self::UnknownName(_) => 2,
            Self::Route(_) => 4,
            Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}
