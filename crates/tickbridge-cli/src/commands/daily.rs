use serde_json::Value;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;

use tickbridge_core::{DailyDataRequest, SourceFactory, StockCode};

use crate::cli::DailyArgs;
use crate::commands::resolve_client;
use crate::error::CliError;

const ISO_DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub async fn run(factory: &SourceFactory, args: &DailyArgs) -> Result<Value, CliError> {
    let code = StockCode::parse(&args.code).map_err(|error| CliError::Usage(error.to_string()))?;
    let start = parse_date("--start", &args.start)?;
    let end = parse_date("--end", &args.end)?;

    // Range validation happens here, before any client is constructed.
    let request = DailyDataRequest::new(code, start, end)?;

    let client = resolve_client(factory, &args.fetch).await?;
    let frame = client.stock_daily_data(request).await?;
    Ok(serde_json::to_value(frame)?)
}

fn parse_date(flag: &str, value: &str) -> Result<Date, CliError> {
    Date::parse(value.trim(), ISO_DATE)
        .map_err(|_| CliError::Usage(format!("{flag} must be an ISO date (YYYY-MM-DD), got '{value}'")))
}
