//! The four list-shaped retrieval commands share one resolution path: pick
//! the client, run the operation, emit the frame as-is.

use serde_json::Value;

use tickbridge_core::SourceFactory;

use crate::cli::FetchArgs;
use crate::commands::resolve_client;
use crate::error::CliError;

pub async fn basics(factory: &SourceFactory, args: &FetchArgs) -> Result<Value, CliError> {
    let client = resolve_client(factory, args).await?;
    let frame = client.stock_basic_info().await?;
    Ok(serde_json::to_value(frame)?)
}

pub async fn financials(factory: &SourceFactory, args: &FetchArgs) -> Result<Value, CliError> {
    let client = resolve_client(factory, args).await?;
    let frame = client.financial_indicators().await?;
    Ok(serde_json::to_value(frame)?)
}

pub async fn sectors(factory: &SourceFactory, args: &FetchArgs) -> Result<Value, CliError> {
    let client = resolve_client(factory, args).await?;
    let frame = client.hot_sectors().await?;
    Ok(serde_json::to_value(frame)?)
}

pub async fn flows(factory: &SourceFactory, args: &FetchArgs) -> Result<Value, CliError> {
    let client = resolve_client(factory, args).await?;
    let frame = client.money_flow().await?;
    Ok(serde_json::to_value(frame)?)
}

pub async fn macro_economic(
    factory: &SourceFactory,
    args: &FetchArgs,
) -> Result<Value, CliError> {
    let client = resolve_client(factory, args).await?;
    let frame = client.macro_economic_data().await?;
    Ok(serde_json::to_value(frame)?)
}
