use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use time::Duration;

use crate::adapters::{
    code_seed, format_compact_date, parse_compact_date, parse_dashed_date, FIXTURE_LISTING,
    FIXTURE_UNLISTED_CODE,
};
use crate::client::{ClientFuture, DailyDataRequest, DataClient};
use crate::domain::{
    DailyBar, FinancialIndicator, Frame, MacroPoint, MoneyFlow, SectorRank, StockBasicInfo,
    StockCode,
};
use crate::error::SourceError;
use crate::health::{HealthCell, HealthRecord};
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::provider::ProviderId;
use crate::throttling::RateGate;

const PROVIDER: ProviderId = ProviderId::Akshare;

const LIST_URL: &str = "https://push2.eastmoney.com/api/qt/clist/get";
const KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";
const FFLOW_URL: &str = "https://push2his.eastmoney.com/api/qt/market/fflow/daykline/get";
const REPORT_URL: &str = "https://datacenter-web.eastmoney.com/api/data/v1/get";

/// Client for the credential-free provider, backed by Eastmoney's public
/// quote endpoints.
///
/// The upstream speaks two dialects: the push2 quote services wrap rows in a
/// `data` envelope (kline rows as comma-joined strings), while the datacenter
/// report service wraps them in `result.data`. Both are normalized into the
/// shared record types here.
pub struct AkshareClient {
    http_client: Arc<dyn HttpClient>,
    health: HealthCell,
    gate: RateGate,
    use_real_api: bool,
}

impl std::fmt::Debug for AkshareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AkshareClient")
            .field("health", &self.health)
            .field("gate", &self.gate)
            .field("use_real_api", &self.use_real_api)
            .finish_non_exhaustive()
    }
}

impl Default for AkshareClient {
    fn default() -> Self {
        Self::new(Arc::new(NoopHttpClient), RateGate::unlimited())
    }
}

impl AkshareClient {
    pub fn new(http_client: Arc<dyn HttpClient>, gate: RateGate) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            health: HealthCell::new(),
            gate,
            use_real_api,
        }
    }

    fn ensure_ready(&self) -> Result<(), SourceError> {
        if !self.gate.try_acquire() {
            return Err(SourceError::rate_limited(
                PROVIDER,
                "request budget exhausted for the current window",
            ));
        }
        Ok(())
    }

    async fn get_json(&self, url: String) -> Result<Value, SourceError> {
        tracing::debug!(url = url.as_str(), "eastmoney request");

        let response = self
            .http_client
            .execute(HttpRequest::get(url))
            .await
            .map_err(|error| SourceError::upstream(PROVIDER, error.message()))?;

        if !response.is_success() {
            return Err(SourceError::upstream(
                PROVIDER,
                format!("upstream returned status {}", response.status),
            ));
        }

        serde_json::from_str(&response.body).map_err(|error| {
            SourceError::upstream(PROVIDER, format!("malformed response: {error}"))
        })
    }

    async fn fetch_validate(&self) -> Result<(), SourceError> {
        self.ensure_ready()?;
        if !self.use_real_api {
            return Ok(());
        }

        // One-row listing request; enough to prove the endpoint is reachable.
        let url = format!(
            "{LIST_URL}?pn=1&pz=1&po=1&np=1&fltt=2&fid=f12&fs={}&fields=f12",
            urlencoding::encode("m:0 t:6,m:1 t:2")
        );
        let body = self.get_json(url).await?;
        let envelope: QuoteEnvelope<ListData> = decode(body)?;
        match envelope.data {
            Some(_) => Ok(()),
            None => Err(SourceError::upstream(PROVIDER, "listing probe returned no data")),
        }
    }

    async fn fetch_basic_info(&self) -> Result<Frame<StockBasicInfo>, SourceError> {
        self.ensure_ready()?;
        if !self.use_real_api {
            return Ok(fixture_basic_info());
        }

        let url = format!(
            "{LIST_URL}?pn=1&pz=10000&po=0&np=1&fltt=2&fid=f12&fs={}&fields=f12,f14,f26",
            urlencoding::encode("m:0 t:6,m:0 t:80,m:1 t:2,m:1 t:23")
        );
        let body = self.get_json(url).await?;
        let envelope: QuoteEnvelope<ListData> = decode(body)?;
        let diff = envelope
            .data
            .ok_or_else(|| SourceError::upstream(PROVIDER, "listing returned no data"))?
            .diff;

        let mut rows = Vec::with_capacity(diff.len());
        for entry in &diff {
            let code = match StockCode::parse(field_str(entry, "f12")) {
                Ok(code) => code,
                Err(_) => continue,
            };
            // f26 is the listing date as a bare yyyymmdd number.
            let listing = field_u64(entry, "f26");
            if listing == 0 {
                continue;
            }
            rows.push(StockBasicInfo {
                exchange: exchange_for(&code).to_owned(),
                name: field_str(entry, "f14").to_owned(),
                listing_date: parse_compact_date(PROVIDER, &listing.to_string())?,
                code,
            });
        }

        Ok(Frame::new(PROVIDER, rows))
    }

    async fn fetch_daily(&self, req: &DailyDataRequest) -> Result<Frame<DailyBar>, SourceError> {
        self.ensure_ready()?;
        if !self.use_real_api {
            return fixture_daily(req);
        }

        let url = format!(
            "{KLINE_URL}?secid={}&klt=101&fqt=1&beg={}&end={}\
             &fields1=f1,f2,f3,f4,f5,f6&fields2=f51,f52,f53,f54,f55,f56,f57",
            secid_for(&req.code),
            format_compact_date(req.start),
            format_compact_date(req.end),
        );
        let body = self.get_json(url).await?;
        let envelope: QuoteEnvelope<KlineData> = decode(body)?;

        // A null data section is how this endpoint reports an unknown secid.
        let data = envelope
            .data
            .ok_or_else(|| SourceError::unknown_symbol(PROVIDER, req.code.as_str()))?;

        let mut rows = Vec::with_capacity(data.klines.len());
        for line in &data.klines {
            rows.push(parse_kline(&req.code, line)?);
        }
        rows.sort_by_key(|bar| bar.trade_date);

        Ok(Frame::new(PROVIDER, rows))
    }

    async fn fetch_financial_indicators(
        &self,
    ) -> Result<Frame<FinancialIndicator>, SourceError> {
        self.ensure_ready()?;
        if !self.use_real_api {
            return Ok(fixture_financials());
        }

        let url = format!(
            "{REPORT_URL}?reportName=RPT_LICO_FN_CPD&pageSize=500&pageNumber=1\
             &sortColumns=REPORTDATE&sortTypes=-1\
             &columns=SECURITY_CODE,REPORTDATE,BASIC_EPS,WEIGHTAVG_ROE,XSMLL,ZCFZL"
        );
        let body = self.get_json(url).await?;
        let report: ReportEnvelope = decode(body)?;

        let mut rows = Vec::new();
        for entry in report.rows() {
            let code = match StockCode::parse(field_str(entry, "SECURITY_CODE")) {
                Ok(code) => code,
                Err(_) => continue,
            };
            let report_date = field_str(entry, "REPORTDATE");
            let report_date = report_date.split_whitespace().next().unwrap_or(report_date);
            rows.push(FinancialIndicator {
                code,
                report_date: parse_dashed_date(PROVIDER, report_date)?,
                eps: field_f64(entry, "BASIC_EPS"),
                roe: field_f64(entry, "WEIGHTAVG_ROE"),
                gross_margin: field_f64(entry, "XSMLL"),
                debt_ratio: field_f64(entry, "ZCFZL"),
            });
        }

        Ok(Frame::new(PROVIDER, rows))
    }

    async fn fetch_hot_sectors(&self) -> Result<Frame<SectorRank>, SourceError> {
        self.ensure_ready()?;
        if !self.use_real_api {
            return Ok(fixture_sectors());
        }

        let url = format!(
            "{LIST_URL}?pn=1&pz=100&po=1&np=1&fltt=2&fid=f3&fs={}&fields=f14,f3,f8,f128",
            urlencoding::encode("m:90 t:2 f:!50")
        );
        let body = self.get_json(url).await?;
        let envelope: QuoteEnvelope<ListData> = decode(body)?;
        let diff = envelope
            .data
            .ok_or_else(|| SourceError::upstream(PROVIDER, "sector board returned no data"))?
            .diff;

        let rows = diff
            .iter()
            .enumerate()
            .map(|(index, entry)| SectorRank {
                rank: index as u32 + 1,
                name: field_str(entry, "f14").to_owned(),
                change_pct: field_f64(entry, "f3"),
                turnover: field_f64(entry, "f8"),
                leading_stock: field_str(entry, "f128").to_owned(),
            })
            .collect();

        Ok(Frame::new(PROVIDER, rows))
    }

    async fn fetch_money_flow(&self) -> Result<Frame<MoneyFlow>, SourceError> {
        self.ensure_ready()?;
        if !self.use_real_api {
            return Ok(fixture_money_flow());
        }

        let url = format!(
            "{FFLOW_URL}?lmt=30&klt=101&secid=1.000001&secid2=0.399001\
             &fields1=f1,f2,f3,f7&fields2=f51,f52,f53,f62"
        );
        let body = self.get_json(url).await?;
        let envelope: QuoteEnvelope<KlineData> = decode(body)?;
        let data = envelope
            .data
            .ok_or_else(|| SourceError::upstream(PROVIDER, "money flow returned no data"))?;

        let mut rows = Vec::with_capacity(data.klines.len());
        for line in &data.klines {
            rows.push(parse_fflow(line)?);
        }
        rows.sort_by_key(|flow| flow.trade_date);

        Ok(Frame::new(PROVIDER, rows))
    }

    async fn fetch_macro(&self) -> Result<Frame<MacroPoint>, SourceError> {
        self.ensure_ready()?;
        if !self.use_real_api {
            return Ok(fixture_macro());
        }

        let url = format!(
            "{REPORT_URL}?reportName=RPT_ECONOMY_CPI&pageSize=60&pageNumber=1\
             &sortColumns=REPORT_DATE&sortTypes=-1&columns=REPORT_DATE,NATIONAL_SAME"
        );
        let body = self.get_json(url).await?;
        let report: ReportEnvelope = decode(body)?;

        let rows = report
            .rows()
            .iter()
            .map(|entry| {
                let period = field_str(entry, "REPORT_DATE");
                MacroPoint {
                    indicator: "cpi_yoy".to_owned(),
                    period: period.chars().take(7).collect(),
                    value: field_f64(entry, "NATIONAL_SAME"),
                }
            })
            .collect();

        Ok(Frame::new(PROVIDER, rows))
    }
}

impl DataClient for AkshareClient {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    fn validate<'a>(&'a self) -> ClientFuture<'a, ()> {
        Box::pin(async move { self.health.observe(self.fetch_validate().await) })
    }

    fn stock_basic_info<'a>(&'a self) -> ClientFuture<'a, Frame<StockBasicInfo>> {
        Box::pin(async move { self.health.observe(self.fetch_basic_info().await) })
    }

    fn stock_daily_data<'a>(
        &'a self,
        req: DailyDataRequest,
    ) -> ClientFuture<'a, Frame<DailyBar>> {
        Box::pin(async move { self.health.observe(self.fetch_daily(&req).await) })
    }

    fn financial_indicators<'a>(&'a self) -> ClientFuture<'a, Frame<FinancialIndicator>> {
        Box::pin(async move { self.health.observe(self.fetch_financial_indicators().await) })
    }

    fn hot_sectors<'a>(&'a self) -> ClientFuture<'a, Frame<SectorRank>> {
        Box::pin(async move { self.health.observe(self.fetch_hot_sectors().await) })
    }

    fn money_flow<'a>(&'a self) -> ClientFuture<'a, Frame<MoneyFlow>> {
        Box::pin(async move { self.health.observe(self.fetch_money_flow().await) })
    }

    fn macro_economic_data<'a>(&'a self) -> ClientFuture<'a, Frame<MacroPoint>> {
        Box::pin(async move { self.health.observe(self.fetch_macro().await) })
    }

    fn health(&self) -> HealthRecord {
        self.health.snapshot()
    }
}

fn exchange_for(code: &StockCode) -> &'static str {
    if code.as_str().starts_with('6') {
        "SSE"
    } else {
        "SZSE"
    }
}

fn secid_for(code: &StockCode) -> String {
    let market = if code.as_str().starts_with('6') { 1 } else { 0 };
    format!("{market}.{}", code.as_str())
}

/// Kline rows arrive as `date,open,close,high,low,volume,amount`.
fn parse_kline(code: &StockCode, line: &str) -> Result<DailyBar, SourceError> {
    let mut parts = line.split(',');
    let mut next = || {
        parts
            .next()
            .ok_or_else(|| SourceError::upstream(PROVIDER, format!("truncated kline '{line}'")))
    };

    let trade_date = parse_dashed_date(PROVIDER, next()?)?;
    let open = parse_f64(next()?)?;
    let close = parse_f64(next()?)?;
    let high = parse_f64(next()?)?;
    let low = parse_f64(next()?)?;
    let volume = parse_f64(next()?)?;
    let amount = parse_f64(next()?)?;

    Ok(DailyBar {
        code: code.clone(),
        trade_date,
        open,
        high,
        low,
        close,
        volume,
        amount,
    })
}

/// Flow rows arrive as `date,main net,retail net,main net pct`.
fn parse_fflow(line: &str) -> Result<MoneyFlow, SourceError> {
    let mut parts = line.split(',');
    let mut next = || {
        parts
            .next()
            .ok_or_else(|| SourceError::upstream(PROVIDER, format!("truncated flow row '{line}'")))
    };

    let trade_date = parse_dashed_date(PROVIDER, next()?)?;
    let main_inflow = parse_f64(next()?)?;
    let retail_inflow = parse_f64(next()?)?;
    let main_inflow_pct = parse_f64(next()?)?;

    Ok(MoneyFlow {
        trade_date,
        main_inflow,
        main_inflow_pct,
        retail_inflow,
    })
}

fn parse_f64(value: &str) -> Result<f64, SourceError> {
    value.trim().parse().map_err(|_| {
        SourceError::upstream(PROVIDER, format!("bad numeric field '{value}'"))
    })
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, SourceError> {
    serde_json::from_value(body).map_err(|error| {
        SourceError::upstream(PROVIDER, format!("unexpected response shape: {error}"))
    })
}

fn field_str<'a>(entry: &'a Value, key: &str) -> &'a str {
    entry.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn field_f64(entry: &Value, key: &str) -> f64 {
    entry.get(key).and_then(Value::as_f64).unwrap_or_default()
}

fn field_u64(entry: &Value, key: &str) -> u64 {
    entry.get(key).and_then(Value::as_u64).unwrap_or_default()
}

// Wire shapes. Row objects stay as raw values because Eastmoney substitutes
// "-" for missing numerics.

#[derive(Debug, Deserialize)]
struct QuoteEnvelope<T> {
    #[serde(default = "Option::default")]
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    diff: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReportEnvelope {
    #[serde(default)]
    result: Option<ReportResult>,
}

#[derive(Debug, Deserialize)]
struct ReportResult {
    #[serde(default)]
    data: Vec<Value>,
}

impl ReportEnvelope {
    fn rows(&self) -> &[Value] {
        self.result
            .as_ref()
            .map_or(&[], |result| result.data.as_slice())
    }
}

// Offline fixtures.

fn fixture_basic_info() -> Frame<StockBasicInfo> {
    let rows = FIXTURE_LISTING
        .iter()
        .map(|(code, name, exchange, list_date)| StockBasicInfo {
            code: StockCode::parse(code).expect("fixture codes are valid"),
            name: (*name).to_owned(),
            exchange: (*exchange).to_owned(),
            listing_date: parse_compact_date(PROVIDER, list_date)
                .expect("fixture dates are valid"),
        })
        .collect();
    Frame::new(PROVIDER, rows)
}

fn fixture_daily(req: &DailyDataRequest) -> Result<Frame<DailyBar>, SourceError> {
    if req.code.as_str() == FIXTURE_UNLISTED_CODE {
        return Err(SourceError::unknown_symbol(PROVIDER, req.code.as_str()));
    }

    let seed = code_seed(&req.code);
    let mut rows = Vec::new();
    let mut date = req.start;
    let mut index = 0_u64;
    while date <= req.end && rows.len() < 500 {
        if !matches!(date.weekday(), time::Weekday::Saturday | time::Weekday::Sunday) {
            let base = 20.0 + ((seed + index) % 800) as f64 / 10.0;
            rows.push(DailyBar {
                code: req.code.clone(),
                trade_date: date,
                open: base,
                high: base + 1.1,
                low: base - 0.9,
                close: base + 0.4,
                volume: 150_000.0 + (index as f64) * 1_000.0,
                amount: (150_000.0 + (index as f64) * 1_000.0) * base,
            });
            index += 1;
        }
        date = date
            .checked_add(Duration::days(1))
            .ok_or_else(|| SourceError::upstream(PROVIDER, "date overflow"))?;
    }
    Ok(Frame::new(PROVIDER, rows))
}

fn fixture_financials() -> Frame<FinancialIndicator> {
    let rows = FIXTURE_LISTING
        .iter()
        .map(|(code, ..)| {
            let code = StockCode::parse(code).expect("fixture codes are valid");
            let seed = code_seed(&code);
            FinancialIndicator {
                report_date: parse_compact_date(PROVIDER, "20240331")
                    .expect("fixture dates are valid"),
                eps: 0.5 + (seed % 400) as f64 / 100.0,
                roe: 5.0 + (seed % 200) as f64 / 10.0,
                gross_margin: 20.0 + (seed % 600) as f64 / 10.0,
                debt_ratio: 30.0 + (seed % 400) as f64 / 10.0,
                code,
            }
        })
        .collect();
    Frame::new(PROVIDER, rows)
}

fn fixture_sectors() -> Frame<SectorRank> {
    let sectors = [
        ("Semiconductors", 3.42, 5.8, "SMIC"),
        ("Liquor & Spirits", 1.87, 2.1, "Kweichow Moutai"),
        ("Power Equipment", 1.05, 3.4, "CATL"),
        ("Banking", -0.32, 0.9, "Ping An Bank"),
    ];
    let rows = sectors
        .iter()
        .enumerate()
        .map(|(index, (name, change_pct, turnover, leader))| SectorRank {
            rank: index as u32 + 1,
            name: (*name).to_owned(),
            change_pct: *change_pct,
            turnover: *turnover,
            leading_stock: (*leader).to_owned(),
        })
        .collect();
    Frame::new(PROVIDER, rows)
}

fn fixture_money_flow() -> Frame<MoneyFlow> {
    let days = [
        ("20240325", -120.5, -1.8, 95.2),
        ("20240326", 88.4, 1.2, -40.7),
        ("20240327", 15.9, 0.2, -3.1),
        ("20240328", -60.3, -0.9, 42.0),
        ("20240329", 132.7, 2.0, -77.5),
    ];
    let rows = days
        .iter()
        .map(|(date, main, pct, retail)| MoneyFlow {
            trade_date: parse_compact_date(PROVIDER, date).expect("fixture dates are valid"),
            main_inflow: *main,
            main_inflow_pct: *pct,
            retail_inflow: *retail,
        })
        .collect();
    Frame::new(PROVIDER, rows)
}

fn fixture_macro() -> Frame<MacroPoint> {
    let months = [("2024-01", 0.8), ("2024-02", 0.7), ("2024-03", 0.1)];
    let rows = months
        .iter()
        .map(|(period, value)| MacroPoint {
            indicator: "cpi_yoy".to_owned(),
            period: (*period).to_owned(),
            value: *value,
        })
        .collect();
    Frame::new(PROVIDER, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceErrorKind;
    use time::macros::date;

    #[tokio::test]
    async fn works_without_any_credentials() {
        let client = AkshareClient::default();
        client.validate().await.expect("no credentials required");

        let frame = client.stock_basic_info().await.expect("fixture data");
        assert_eq!(frame.provider, ProviderId::Akshare);
        assert!(!frame.is_empty());
        assert!(client.is_healthy());
    }

    #[tokio::test]
    async fn unlisted_fixture_code_is_unknown() {
        let client = AkshareClient::default();
        let request = DailyDataRequest::new(
            StockCode::parse(FIXTURE_UNLISTED_CODE).unwrap(),
            date!(2024 - 01 - 02),
            date!(2024 - 01 - 31),
        )
        .unwrap();

        let error = client.stock_daily_data(request).await.expect_err("never listed");
        assert_eq!(error.kind(), SourceErrorKind::UnknownSymbol);
        assert!(client.is_healthy());
    }

    #[test]
    fn secid_uses_shanghai_market_prefix_for_6xx() {
        assert_eq!(secid_for(&StockCode::parse("600519").unwrap()), "1.600519");
        assert_eq!(secid_for(&StockCode::parse("000001").unwrap()), "0.000001");
    }

    #[test]
    fn kline_row_reorders_close_and_high() {
        let code = StockCode::parse("600519").unwrap();
        let bar = parse_kline(&code, "2024-01-02,1688.0,1695.5,1700.2,1680.1,31000,52000000")
            .expect("well-formed row");

        assert_eq!(bar.trade_date, date!(2024 - 01 - 02));
        assert_eq!(bar.open, 1688.0);
        assert_eq!(bar.close, 1695.5);
        assert_eq!(bar.high, 1700.2);
        assert_eq!(bar.low, 1680.1);
    }

    #[test]
    fn truncated_kline_row_is_an_upstream_error() {
        let code = StockCode::parse("600519").unwrap();
        let error = parse_kline(&code, "2024-01-02,1688.0").expect_err("row too short");
        assert_eq!(error.kind(), SourceErrorKind::Upstream);
    }

    #[tokio::test]
    async fn fixture_frames_share_the_normalized_columns() {
        let client = AkshareClient::default();
        let frame = client.financial_indicators().await.expect("fixture data");
        let json = serde_json::to_value(&frame.rows[0]).expect("serializable row");

        let mut keys: Vec<&str> = json
            .as_object()
            .expect("row serializes to an object")
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["code", "debt_ratio", "eps", "gross_margin", "report_date", "roe"]
        );
    }
}
