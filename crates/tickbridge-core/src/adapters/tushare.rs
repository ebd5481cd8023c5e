use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use time::{Duration, OffsetDateTime};

use crate::adapters::{
    code_seed, format_compact_date, parse_compact_date, FIXTURE_LISTING, FIXTURE_UNLISTED_CODE,
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

const PROVIDER: ProviderId = ProviderId::Tushare;
const API_URL: &str = "https://api.tushare.pro";

/// Client for the TuShare Pro JSON-over-HTTP API.
///
/// Every call is a POST of `{api_name, token, params, fields}`; the token is
/// validated lazily on first use (or via `validate()` during a switch), so a
/// client can exist with a bad token and only turn unhealthy when exercised.
pub struct TushareClient {
    token: Option<String>,
    http_client: Arc<dyn HttpClient>,
    health: HealthCell,
    gate: RateGate,
    use_real_api: bool,
}

impl std::fmt::Debug for TushareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TushareClient")
            .field("health", &self.health)
            .field("gate", &self.gate)
            .field("use_real_api", &self.use_real_api)
            .finish_non_exhaustive()
    }
}

impl Default for TushareClient {
    fn default() -> Self {
        Self::new(None, Arc::new(NoopHttpClient), RateGate::unlimited())
    }
}

impl TushareClient {
    pub fn new(
        token: Option<String>,
        http_client: Arc<dyn HttpClient>,
        gate: RateGate,
    ) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            token,
            http_client,
            health: HealthCell::new(),
            gate,
            use_real_api,
        }
    }

    /// Offline client with a token, for deterministic fixture runs.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self::new(Some(token.into()), Arc::new(NoopHttpClient), RateGate::unlimited())
    }

    /// Gate and credential preconditions shared by every operation.
    fn ensure_ready(&self) -> Result<&str, SourceError> {
        if !self.gate.try_acquire() {
            return Err(SourceError::rate_limited(
                PROVIDER,
                "request budget exhausted for the current window",
            ));
        }
        match self.token.as_deref() {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(SourceError::authentication(
                PROVIDER,
                "token is not configured",
            )),
        }
    }

    async fn call(
        &self,
        token: &str,
        api_name: &str,
        params: Value,
        fields: &str,
    ) -> Result<TushareData, SourceError> {
        let body = json!({
            "api_name": api_name,
            "token": token,
            "params": params,
            "fields": fields,
        });
        tracing::debug!(api_name, "tushare request");

        let request = HttpRequest::post_json(API_URL, body.to_string());
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| SourceError::upstream(PROVIDER, error.message()))?;

        if !response.is_success() {
            return Err(SourceError::upstream(
                PROVIDER,
                format!("upstream returned status {}", response.status),
            ));
        }

        let parsed: TushareResponse = serde_json::from_str(&response.body).map_err(|error| {
            SourceError::upstream(PROVIDER, format!("malformed response: {error}"))
        })?;

        if parsed.code != 0 {
            let msg = parsed.msg.unwrap_or_else(|| "unspecified API error".to_owned());
            return Err(classify_api_error(&msg));
        }

        parsed
            .data
            .ok_or_else(|| SourceError::upstream(PROVIDER, "response carried no data section"))
    }

    async fn fetch_validate(&self) -> Result<(), SourceError> {
        let token = self.ensure_ready()?;
        if !self.use_real_api {
            return Ok(());
        }

        // Cheapest authenticated call: one day of the trading calendar.
        let today = format_compact_date(OffsetDateTime::now_utc().date());
        self.call(
            token,
            "trade_cal",
            json!({ "exchange": "SSE", "start_date": today, "end_date": today }),
            "cal_date,is_open",
        )
        .await
        .map(|_| ())
    }

    async fn fetch_basic_info(&self) -> Result<Frame<StockBasicInfo>, SourceError> {
        let token = self.ensure_ready()?;
        if !self.use_real_api {
            return Ok(fixture_basic_info());
        }

        let data = self
            .call(
                token,
                "stock_basic",
                json!({ "list_status": "L" }),
                "symbol,name,exchange,list_date",
            )
            .await?;

        let symbol = data.column("symbol")?;
        let name = data.column("name")?;
        let exchange = data.column("exchange")?;
        let list_date = data.column("list_date")?;

        let mut rows = Vec::with_capacity(data.items.len());
        for item in &data.items {
            let code = match StockCode::parse(str_at(item, symbol)) {
                Ok(code) => code,
                // B-shares and other boards fall outside the code domain.
                Err(_) => continue,
            };
            rows.push(StockBasicInfo {
                code,
                name: str_at(item, name).to_owned(),
                exchange: str_at(item, exchange).to_owned(),
                listing_date: parse_compact_date(PROVIDER, str_at(item, list_date))?,
            });
        }

        Ok(Frame::new(PROVIDER, rows))
    }

    async fn fetch_daily(&self, req: &DailyDataRequest) -> Result<Frame<DailyBar>, SourceError> {
        let token = self.ensure_ready()?;
        if !self.use_real_api {
            return fixture_daily(req);
        }

        let data = self
            .call(
                token,
                "daily",
                json!({
                    "ts_code": req.code.to_ts_code(),
                    "start_date": format_compact_date(req.start),
                    "end_date": format_compact_date(req.end),
                }),
                "trade_date,open,high,low,close,vol,amount",
            )
            .await?;

        if data.items.is_empty() && !self.resolve_code(token, &req.code).await? {
            return Err(SourceError::unknown_symbol(PROVIDER, req.code.as_str()));
        }

        let trade_date = data.column("trade_date")?;
        let open = data.column("open")?;
        let high = data.column("high")?;
        let low = data.column("low")?;
        let close = data.column("close")?;
        let vol = data.column("vol")?;
        let amount = data.column("amount")?;

        let mut rows = Vec::with_capacity(data.items.len());
        for item in &data.items {
            rows.push(DailyBar {
                code: req.code.clone(),
                trade_date: parse_compact_date(PROVIDER, str_at(item, trade_date))?,
                open: f64_at(item, open),
                high: f64_at(item, high),
                low: f64_at(item, low),
                close: f64_at(item, close),
                volume: f64_at(item, vol),
                amount: f64_at(item, amount),
            });
        }
        // TuShare returns newest first; the frame contract is oldest first.
        rows.sort_by_key(|bar| bar.trade_date);

        Ok(Frame::new(PROVIDER, rows))
    }

    /// Distinguishes "unknown instrument" from "known instrument, no trades".
    async fn resolve_code(&self, token: &str, code: &StockCode) -> Result<bool, SourceError> {
        let data = self
            .call(
                token,
                "stock_basic",
                json!({ "ts_code": code.to_ts_code() }),
                "symbol",
            )
            .await?;
        Ok(!data.items.is_empty())
    }

    async fn fetch_financial_indicators(
        &self,
    ) -> Result<Frame<FinancialIndicator>, SourceError> {
        let token = self.ensure_ready()?;
        if !self.use_real_api {
            return Ok(fixture_financials());
        }

        let data = self
            .call(
                token,
                "fina_indicator_vip",
                json!({}),
                "ts_code,end_date,eps,roe,grossprofit_margin,debt_to_assets",
            )
            .await?;

        let ts_code = data.column("ts_code")?;
        let end_date = data.column("end_date")?;
        let eps = data.column("eps")?;
        let roe = data.column("roe")?;
        let gross = data.column("grossprofit_margin")?;
        let debt = data.column("debt_to_assets")?;

        let mut rows = Vec::with_capacity(data.items.len());
        for item in &data.items {
            let bare = str_at(item, ts_code);
            let bare = bare.split('.').next().unwrap_or(bare);
            let code = match StockCode::parse(bare) {
                Ok(code) => code,
                Err(_) => continue,
            };
            rows.push(FinancialIndicator {
                code,
                report_date: parse_compact_date(PROVIDER, str_at(item, end_date))?,
                eps: f64_at(item, eps),
                roe: f64_at(item, roe),
                gross_margin: f64_at(item, gross),
                debt_ratio: f64_at(item, debt),
            });
        }

        Ok(Frame::new(PROVIDER, rows))
    }

    async fn fetch_hot_sectors(&self) -> Result<Frame<SectorRank>, SourceError> {
        let token = self.ensure_ready()?;
        if !self.use_real_api {
            return Ok(fixture_sectors());
        }

        let data = self
            .call(
                token,
                "moneyflow_ind_dc",
                json!({}),
                "industry,pct_change,turnover_rate,leader",
            )
            .await?;

        let industry = data.column("industry")?;
        let pct_change = data.column("pct_change")?;
        let turnover = data.column("turnover_rate")?;
        let leader = data.column("leader")?;

        let rows = data
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| SectorRank {
                rank: index as u32 + 1,
                name: str_at(item, industry).to_owned(),
                change_pct: f64_at(item, pct_change),
                turnover: f64_at(item, turnover),
                leading_stock: str_at(item, leader).to_owned(),
            })
            .collect();

        Ok(Frame::new(PROVIDER, rows))
    }

    async fn fetch_money_flow(&self) -> Result<Frame<MoneyFlow>, SourceError> {
        let token = self.ensure_ready()?;
        if !self.use_real_api {
            return Ok(fixture_money_flow());
        }

        let data = self
            .call(
                token,
                "moneyflow_mkt_dc",
                json!({}),
                "trade_date,net_amount,net_amount_rate,sm_amount",
            )
            .await?;

        let trade_date = data.column("trade_date")?;
        let net_amount = data.column("net_amount")?;
        let net_rate = data.column("net_amount_rate")?;
        let sm_amount = data.column("sm_amount")?;

        let mut rows = Vec::with_capacity(data.items.len());
        for item in &data.items {
            rows.push(MoneyFlow {
                trade_date: parse_compact_date(PROVIDER, str_at(item, trade_date))?,
                main_inflow: f64_at(item, net_amount),
                main_inflow_pct: f64_at(item, net_rate),
                retail_inflow: f64_at(item, sm_amount),
            });
        }
        rows.sort_by_key(|flow| flow.trade_date);

        Ok(Frame::new(PROVIDER, rows))
    }

    async fn fetch_macro(&self) -> Result<Frame<MacroPoint>, SourceError> {
        let token = self.ensure_ready()?;
        if !self.use_real_api {
            return Ok(fixture_macro());
        }

        let data = self
            .call(token, "cn_cpi", json!({}), "month,nt_yoy")
            .await?;

        let month = data.column("month")?;
        let nt_yoy = data.column("nt_yoy")?;

        let rows = data
            .items
            .iter()
            .map(|item| MacroPoint {
                indicator: "cpi_yoy".to_owned(),
                period: str_at(item, month).to_owned(),
                value: f64_at(item, nt_yoy),
            })
            .collect();

        Ok(Frame::new(PROVIDER, rows))
    }
}

impl DataClient for TushareClient {
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

fn classify_api_error(msg: &str) -> SourceError {
    let lower = msg.to_lowercase();
    if lower.contains("token") {
        SourceError::authentication(PROVIDER, msg)
    } else if lower.contains("每分钟") || lower.contains("频率") || lower.contains("limit") {
        SourceError::rate_limited(PROVIDER, msg)
    } else {
        SourceError::upstream(PROVIDER, msg)
    }
}

// Wire shapes for the TuShare Pro envelope.

#[derive(Debug, Deserialize)]
struct TushareResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<TushareData>,
}

#[derive(Debug, Deserialize)]
struct TushareData {
    fields: Vec<String>,
    items: Vec<Vec<Value>>,
}

impl TushareData {
    fn column(&self, name: &str) -> Result<usize, SourceError> {
        self.fields
            .iter()
            .position(|field| field == name)
            .ok_or_else(|| {
                SourceError::upstream(PROVIDER, format!("response is missing column '{name}'"))
            })
    }
}

fn str_at(item: &[Value], index: usize) -> &str {
    item.get(index).and_then(Value::as_str).unwrap_or_default()
}

fn f64_at(item: &[Value], index: usize) -> f64 {
    item.get(index).and_then(Value::as_f64).unwrap_or_default()
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
