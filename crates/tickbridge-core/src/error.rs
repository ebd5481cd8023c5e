use thiserror::Error;
use time::Date;

use crate::provider::ProviderId;

/// Input-shape errors raised before any provider is consulted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("stock code cannot be empty")]
    EmptyCode,
    #[error("stock code must be exactly six ASCII digits: '{value}'")]
    MalformedCode { value: String },
    #[error("stock code '{value}' is outside the A-share boards (must start with 0, 3 or 6)")]
    UnsupportedBoard { value: String },
}

/// Coarse error classification used by callers to pick a response:
/// retry, back off, re-prompt for credentials, or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    InvalidConfig,
    Authentication,
    Upstream,
    RateLimited,
    UnknownSymbol,
    InvalidRange,
    SwitchFailed,
}

/// Error taxonomy for the source layer.
///
/// Provider-native failures (HTTP status codes, API error payloads, transport
/// errors) are translated into one of these before they leave an adapter;
/// no provider-specific error type crosses the `DataClient` boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("unsupported data source '{value}', expected one of akshare, tushare")]
    UnknownProvider { value: String },

    #[error("invalid configuration for '{provider}': {message}")]
    InvalidConfig {
        provider: ProviderId,
        message: String,
    },

    #[error("configuration store error: {message}")]
    ConfigStore { message: String },

    #[error("'{provider}' rejected the supplied credentials: {message}")]
    Authentication {
        provider: ProviderId,
        message: String,
    },

    #[error("upstream failure from '{provider}': {message}")]
    Upstream {
        provider: ProviderId,
        message: String,
    },

    #[error("'{provider}' rate budget exhausted: {message}")]
    RateLimited {
        provider: ProviderId,
        message: String,
    },

    #[error("instrument code '{code}' is not resolvable by '{provider}'")]
    UnknownSymbol { provider: ProviderId, code: String },

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: Date, end: Date },

    #[error("switch to '{provider}' failed: {cause}")]
    SwitchFailed {
        provider: ProviderId,
        #[source]
        cause: Box<SourceError>,
    },
}

impl SourceError {
    pub fn unknown_provider(value: impl Into<String>) -> Self {
        Self::UnknownProvider {
            value: value.into(),
        }
    }

    pub fn invalid_config(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            provider,
            message: message.into(),
        }
    }

    pub fn config_store(message: impl Into<String>) -> Self {
        Self::ConfigStore {
            message: message.into(),
        }
    }

    pub fn authentication(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::Authentication {
            provider,
            message: message.into(),
        }
    }

    pub fn upstream(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider,
            message: message.into(),
        }
    }

    pub fn rate_limited(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::RateLimited {
            provider,
            message: message.into(),
        }
    }

    pub fn unknown_symbol(provider: ProviderId, code: impl Into<String>) -> Self {
        Self::UnknownSymbol {
            provider,
            code: code.into(),
        }
    }

    pub fn switch_failed(provider: ProviderId, cause: SourceError) -> Self {
        Self::SwitchFailed {
            provider,
            cause: Box::new(cause),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        match self {
            Self::UnknownProvider { .. }
            | Self::InvalidConfig { .. }
            | Self::ConfigStore { .. } => SourceErrorKind::InvalidConfig,
            Self::Authentication { .. } => SourceErrorKind::Authentication,
            Self::Upstream { .. } => SourceErrorKind::Upstream,
            Self::RateLimited { .. } => SourceErrorKind::RateLimited,
            Self::UnknownSymbol { .. } => SourceErrorKind::UnknownSymbol,
            Self::InvalidRange { .. } => SourceErrorKind::InvalidRange,
            Self::SwitchFailed { .. } => SourceErrorKind::SwitchFailed,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self.kind() {
            SourceErrorKind::InvalidConfig => "source.invalid_config",
            SourceErrorKind::Authentication => "source.authentication",
            SourceErrorKind::Upstream => "source.upstream",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::UnknownSymbol => "source.unknown_symbol",
            SourceErrorKind::InvalidRange => "source.invalid_range",
            SourceErrorKind::SwitchFailed => "source.switch_failed",
        }
    }

    pub const fn retryable(&self) -> bool {
        matches!(
            self.kind(),
            SourceErrorKind::Upstream | SourceErrorKind::RateLimited
        )
    }
}
