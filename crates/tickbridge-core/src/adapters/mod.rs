//! Provider adapters.
//!
//! Each adapter owns one upstream transport, normalizes that provider's
//! column aliases into the shared record types, and reports every outcome to
//! its health record. Adapters built on an offline transport serve
//! deterministic fixture data seeded from the instrument code.

mod akshare;
mod tushare;

pub use akshare::AkshareClient;
pub use tushare::TushareClient;

use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;

use crate::domain::StockCode;
use crate::error::SourceError;
use crate::provider::ProviderId;

const COMPACT_DATE: &[FormatItem<'static>] = format_description!("[year][month][day]");
const DASHED_DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Parses `YYYYMMDD`, the form used by TuShare and the Eastmoney listing
/// fields.
pub(crate) fn parse_compact_date(provider: ProviderId, value: &str) -> Result<Date, SourceError> {
    Date::parse(value.trim(), COMPACT_DATE)
        .map_err(|error| SourceError::upstream(provider, format!("bad date '{value}': {error}")))
}

/// Parses `YYYY-MM-DD`, the form used inside Eastmoney kline strings.
pub(crate) fn parse_dashed_date(provider: ProviderId, value: &str) -> Result<Date, SourceError> {
    Date::parse(value.trim(), DASHED_DATE)
        .map_err(|error| SourceError::upstream(provider, format!("bad date '{value}': {error}")))
}

pub(crate) fn format_compact_date(date: Date) -> String {
    date.format(COMPACT_DATE)
        .expect("compact date format is infallible for calendar dates")
}

/// Stable per-code seed for fixture data, so offline runs are reproducible.
pub(crate) fn code_seed(code: &StockCode) -> u64 {
    code.as_str().bytes().fold(0_u64, |acc, byte| {
        acc.wrapping_mul(33).wrapping_add(u64::from(byte))
    })
}

/// Fixture listing shared by the offline transports of both adapters.
///
/// `000000` is deliberately absent everywhere: the fixtures treat it as the
/// canonical never-listed code so unknown-symbol paths stay testable offline.
pub(crate) const FIXTURE_LISTING: [(&str, &str, &str, &str); 4] = [
    ("600519", "Kweichow Moutai", "SSE", "20010827"),
    ("601318", "Ping An Insurance", "SSE", "20070301"),
    ("000001", "Ping An Bank", "SZSE", "19910403"),
    ("300750", "CATL", "SZSE", "20180611"),
];

pub(crate) const FIXTURE_UNLISTED_CODE: &str = "000000";
