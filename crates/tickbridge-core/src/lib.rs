//! Core contracts for tickbridge.
//!
//! This crate contains:
//! - Provider identifiers and per-provider configuration
//! - Normalized domain records and frame types
//! - The `DataClient` capability trait and its two adapters
//! - Health tracking, rate gating, and the structured error taxonomy
//! - The `SourceFactory` with its client cache and switch protocol

pub mod adapters;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod factory;
pub mod health;
pub mod http_client;
pub mod provider;
pub mod throttling;

pub use adapters::{AkshareClient, TushareClient};
pub use client::{ClientFuture, DailyDataRequest, DataClient};
pub use config::{SourceConfig, SourceConfigStore, DEFAULT_SOURCE_ENV, TUSHARE_TOKEN_ENV};
pub use domain::{
    DailyBar, FinancialIndicator, Frame, MacroPoint, MoneyFlow, SectorRank, StockBasicInfo,
    StockCode,
};
pub use error::{SourceError, SourceErrorKind, ValidationError};
pub use factory::{SourceFactory, SourceFactoryBuilder};
pub use health::{HealthCell, HealthRecord, HealthState};
pub use http_client::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};
pub use provider::{ProviderId, ProviderIdentity};
pub use throttling::RateGate;
