use thiserror::Error;

use tickbridge_core::{SourceError, SourceErrorKind};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid argument: {0}")]
    Usage(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::Source(error) => match error.kind() {
                SourceErrorKind::InvalidConfig | SourceErrorKind::InvalidRange => 2,
                SourceErrorKind::Authentication => 3,
                SourceErrorKind::UnknownSymbol => 4,
                SourceErrorKind::SwitchFailed => 5,
                SourceErrorKind::Upstream | SourceErrorKind::RateLimited => 6,
            },
            Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}
