use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Canonical identifiers for the supported upstream providers.
///
/// The set is closed: callers select one of these, never an arbitrary
/// plugin name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Akshare,
    Tushare,
}

impl ProviderId {
    pub const ALL: [Self; 2] = [Self::Akshare, Self::Tushare];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Akshare => "akshare",
            Self::Tushare => "tushare",
        }
    }

    /// Whether this provider needs a non-empty `token` credential before
    /// its client can ever report healthy.
    pub const fn requires_token(self) -> bool {
        match self {
            Self::Akshare => false,
            Self::Tushare => true,
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = SourceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "akshare" => Ok(Self::Akshare),
            "tushare" => Ok(Self::Tushare),
            other => Err(SourceError::unknown_provider(other)),
        }
    }
}

/// Cache-slot identity: provider name plus a fingerprint of the credential
/// map the client was built from. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderIdentity {
    pub provider: ProviderId,
    pub fingerprint: Option<String>,
}

impl ProviderIdentity {
    pub fn new(provider: ProviderId, fingerprint: Option<String>) -> Self {
        Self {
            provider,
            fingerprint,
        }
    }
}

impl Display for ProviderIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.fingerprint {
            Some(fingerprint) => write!(f, "{}#{fingerprint}", self.provider),
            None => f.write_str(self.provider.as_str()),
        }
    }
}
