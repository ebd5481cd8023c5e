use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::StockCode;
use crate::provider::ProviderId;

/// Ordered, uniformly-typed result set shared by every retrieval operation.
///
/// Whatever the upstream called its columns, a `Frame<T>` carries the
/// provider-agnostic record type `T`; the producing provider is recorded so
/// the persistence sink can attribute rows without re-deriving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame<T> {
    pub provider: ProviderId,
    pub rows: Vec<T>,
}

impl<T> Frame<T> {
    pub fn new(provider: ProviderId, rows: Vec<T>) -> Self {
        Self { provider, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }
}

/// Static listing entry for one tradable instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockBasicInfo {
    pub code: StockCode,
    pub name: String,
    pub exchange: String,
    pub listing_date: Date,
}

/// One day of OHLCV history for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub code: StockCode,
    pub trade_date: Date,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
}

/// Latest fundamental snapshot for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialIndicator {
    pub code: StockCode,
    pub report_date: Date,
    pub eps: f64,
    pub roe: f64,
    pub gross_margin: f64,
    pub debt_ratio: f64,
}

/// Ranked sector/industry aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorRank {
    pub rank: u32,
    pub name: String,
    pub change_pct: f64,
    pub turnover: f64,
    pub leading_stock: String,
}

/// Market-wide capital-flow aggregate for one trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyFlow {
    pub trade_date: Date,
    pub main_inflow: f64,
    pub main_inflow_pct: f64,
    pub retail_inflow: f64,
}

/// One observation of a named macroeconomic series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroPoint {
    pub indicator: String,
    pub period: String,
    pub value: f64,
}
