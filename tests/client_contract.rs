//! Contract tests exercised against both provider clients through the
//! `DataClient` trait: normalized columns, error taxonomy, and health
//! propagation.

use std::sync::Arc;

use time::macros::date;

use tickbridge_core::{
    AkshareClient, DailyDataRequest, DataClient, HealthState, ProviderId, SourceError,
    SourceErrorKind, StockCode, TushareClient,
};

fn offline_clients() -> Vec<Arc<dyn DataClient>> {
    vec![
        Arc::new(AkshareClient::default()),
        Arc::new(TushareClient::with_token("fixture-token")),
    ]
}

#[tokio::test]
async fn every_operation_succeeds_offline_for_both_providers() {
    for client in offline_clients() {
        client.validate().await.expect("probe passes");

        let basics = client.stock_basic_info().await.expect("listing");
        assert_eq!(basics.provider, client.id());
        assert!(!basics.is_empty());

        let request = DailyDataRequest::new(
            StockCode::parse("600519").unwrap(),
            date!(2024 - 01 - 02),
            date!(2024 - 01 - 31),
        )
        .unwrap();
        let daily = client.stock_daily_data(request).await.expect("bars");
        assert!(!daily.is_empty());

        assert!(!client.financial_indicators().await.expect("financials").is_empty());
        assert!(!client.hot_sectors().await.expect("sectors").is_empty());
        assert!(!client.money_flow().await.expect("flows").is_empty());
        assert!(!client.macro_economic_data().await.expect("macro").is_empty());

        assert_eq!(client.health().state, HealthState::Healthy);
        assert!(client.last_error().is_none());
    }
}

#[tokio::test]
async fn listing_rows_use_identical_field_names_across_providers() {
    let mut field_sets = Vec::new();
    for client in offline_clients() {
        let frame = client.stock_basic_info().await.expect("listing");
        let row = serde_json::to_value(&frame.rows[0]).expect("serializable row");
        let mut keys: Vec<String> = row
            .as_object()
            .expect("row is an object")
            .keys()
            .cloned()
            .collect();
        keys.sort_unstable();
        field_sets.push(keys);
    }

    assert_eq!(field_sets[0], field_sets[1]);
    assert_eq!(field_sets[0], ["code", "exchange", "listing_date", "name"]);
}

#[tokio::test]
async fn daily_bars_are_ordered_oldest_first_for_both_providers() {
    for client in offline_clients() {
        let request = DailyDataRequest::new(
            StockCode::parse("000001").unwrap(),
            date!(2024 - 02 - 01),
            date!(2024 - 02 - 29),
        )
        .unwrap();
        let frame = client.stock_daily_data(request).await.expect("bars");
        for pair in frame.rows.windows(2) {
            assert!(pair[0].trade_date < pair[1].trade_date);
        }
    }
}

#[tokio::test]
async fn unknown_symbol_is_reported_without_touching_health() {
    for client in offline_clients() {
        client.validate().await.expect("warm up to Healthy");

        let request = DailyDataRequest::new(
            StockCode::parse("000000").unwrap(),
            date!(2024 - 01 - 02),
            date!(2024 - 01 - 31),
        )
        .unwrap();
        let error = client
            .stock_daily_data(request)
            .await
            .expect_err("never-listed code");

        assert_eq!(error.kind(), SourceErrorKind::UnknownSymbol);
        assert_eq!(client.health().state, HealthState::Healthy);
    }
}

#[test]
fn inverted_range_is_rejected_before_any_client_exists() {
    let error = DailyDataRequest::new(
        StockCode::parse("600519").unwrap(),
        date!(2024 - 06 - 01),
        date!(2024 - 01 - 01),
    )
    .expect_err("start after end");

    assert!(matches!(error, SourceError::InvalidRange { .. }));
    assert_eq!(error.kind(), SourceErrorKind::InvalidRange);
}

#[tokio::test]
async fn tushare_without_token_fails_fast_and_turns_unhealthy() {
    let client = TushareClient::default();

    let error = client.validate().await.expect_err("no token");
    assert_eq!(error.kind(), SourceErrorKind::Authentication);

    let record = client.health();
    assert_eq!(record.state, HealthState::Unhealthy);
    assert!(record.last_error.is_some());
    assert!(record.last_checked.is_some());
    assert!(!client.is_healthy());
}

#[tokio::test]
async fn akshare_needs_no_credentials_at_all() {
    let client = AkshareClient::default();
    client.validate().await.expect("credential-free provider");
    assert!(client.is_healthy());
}

#[tokio::test]
async fn health_recovers_on_the_next_successful_operation() {
    let client = TushareClient::default();
    client.validate().await.expect_err("no token");
    assert_eq!(client.health().state, HealthState::Unhealthy);

    // Same trait object, token now present through a fresh client; the old
    // record stays with the old instance.
    let replacement = TushareClient::with_token("fixture-token");
    replacement.validate().await.expect("probe passes");
    assert_eq!(replacement.health().state, HealthState::Healthy);
}

#[test]
fn stock_codes_validate_shape_and_board() {
    assert!(StockCode::parse("600519").is_ok());
    assert!(StockCode::parse("000001").is_ok());
    assert!(StockCode::parse("300750").is_ok());

    assert!(StockCode::parse("").is_err());
    assert!(StockCode::parse("60051").is_err());
    assert!(StockCode::parse("6005190").is_err());
    assert!(StockCode::parse("60051x").is_err());
    assert!(StockCode::parse("900901").is_err());

    assert_eq!(
        StockCode::parse("600519").unwrap().to_ts_code(),
        "600519.SH"
    );
    assert_eq!(
        StockCode::parse("000001").unwrap().to_ts_code(),
        "000001.SZ"
    );
}
