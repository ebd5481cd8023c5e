mod code;
mod models;

pub use code::StockCode;
pub use models::{
    DailyBar, FinancialIndicator, Frame, MacroPoint, MoneyFlow, SectorRank, StockBasicInfo,
};
