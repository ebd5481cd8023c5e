use std::future::Future;
use std::pin::Pin;

use time::Date;

use crate::domain::{
    DailyBar, FinancialIndicator, Frame, MacroPoint, MoneyFlow, SectorRank, StockBasicInfo,
    StockCode,
};
use crate::error::SourceError;
use crate::health::HealthRecord;
use crate::provider::ProviderId;

pub type ClientFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Request payload for the daily OHLCV operation.
///
/// The date range is validated at construction, so an inverted range never
/// reaches an adapter or the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyDataRequest {
    pub code: StockCode,
    pub start: Date,
    pub end: Date,
}

impl DailyDataRequest {
    pub fn new(code: StockCode, start: Date, end: Date) -> Result<Self, SourceError> {
        if start > end {
            return Err(SourceError::InvalidRange { start, end });
        }
        Ok(Self { code, start, end })
    }
}

/// Capability contract every provider client implements.
///
/// All six retrieval operations return normalized frames with the shared
/// column set, translate provider-native failures into the `SourceError`
/// taxonomy, and update the owning health record as their last side effect.
/// None of them retries internally; backoff is a caller concern.
pub trait DataClient: std::fmt::Debug + Send + Sync {
    fn id(&self) -> ProviderId;

    /// Cheap probe used by the switch protocol. For credentialed providers
    /// this performs the lazy credential check without a full data fetch.
    fn validate<'a>(&'a self) -> ClientFuture<'a, ()>;

    fn stock_basic_info<'a>(&'a self) -> ClientFuture<'a, Frame<StockBasicInfo>>;

    fn stock_daily_data<'a>(&'a self, req: DailyDataRequest)
        -> ClientFuture<'a, Frame<DailyBar>>;

    fn financial_indicators<'a>(&'a self) -> ClientFuture<'a, Frame<FinancialIndicator>>;

    fn hot_sectors<'a>(&'a self) -> ClientFuture<'a, Frame<SectorRank>>;

    fn money_flow<'a>(&'a self) -> ClientFuture<'a, Frame<MoneyFlow>>;

    fn macro_economic_data<'a>(&'a self) -> ClientFuture<'a, Frame<MacroPoint>>;

    /// Snapshot of the record updated by the most recent operation.
    fn health(&self) -> HealthRecord;

    fn is_healthy(&self) -> bool {
        self.health().is_healthy()
    }

    fn last_error(&self) -> Option<String> {
        self.health().last_error
    }
}
