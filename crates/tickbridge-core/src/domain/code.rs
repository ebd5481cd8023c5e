use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Validated six-digit A-share instrument code.
///
/// Shanghai codes start with 6, Shenzhen main-board/GEM codes with 0 or 3.
/// Whether a syntactically valid code actually exists is a provider concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockCode(String);

impl StockCode {
    pub fn parse(value: impl AsRef<str>) -> Result<Self, ValidationError> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(ValidationError::EmptyCode);
        }
        if value.len() != 6 || !value.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(ValidationError::MalformedCode {
                value: value.to_owned(),
            });
        }
        if !matches!(value.as_bytes()[0], b'0' | b'3' | b'6') {
            return Err(ValidationError::UnsupportedBoard {
                value: value.to_owned(),
            });
        }
        Ok(Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// TuShare-native form with the exchange suffix, e.g. `600519.SH`.
    pub fn to_ts_code(&self) -> String {
        if self.0.starts_with('6') {
            format!("{}.SH", self.0)
        } else {
            format!("{}.SZ", self.0)
        }
    }
}

impl Display for StockCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StockCode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_main_board_codes() {
        assert_eq!(StockCode::parse("600519").unwrap().as_str(), "600519");
        assert_eq!(StockCode::parse(" 000001 ").unwrap().as_str(), "000001");
        assert_eq!(StockCode::parse("300750").unwrap().as_str(), "300750");
    }

    #[test]
    fn rejects_malformed_codes() {
        assert_eq!(StockCode::parse(""), Err(ValidationError::EmptyCode));
        assert!(matches!(
            StockCode::parse("60051"),
            Err(ValidationError::MalformedCode { .. })
        ));
        assert!(matches!(
            StockCode::parse("AAPL"),
            Err(ValidationError::MalformedCode { .. })
        ));
        assert!(matches!(
            StockCode::parse("900901"),
            Err(ValidationError::UnsupportedBoard { .. })
        ));
    }

    #[test]
    fn ts_code_picks_the_exchange_suffix() {
        assert_eq!(StockCode::parse("600519").unwrap().to_ts_code(), "600519.SH");
        assert_eq!(StockCode::parse("000001").unwrap().to_ts_code(), "000001.SZ");
    }
}
