use std::sync::Arc;

use serde::Deserialize;
use time::{Date, Duration, OffsetDateTime, Weekday};

use super::{
    classify_status, is_placeholder_body, symbol_seed, transport_to_error, validation_to_error,
};
use crate::data_source::{CapabilitySet, DataProvider, FetchError, FetchFuture};
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::query::{FactsQuery, InsiderTradesQuery, MetricsQuery, NewsQuery, PricesQuery};
use crate::throttle::{RateGate, RatePolicy};
use crate::{
    CompanyFacts, FinancialMetrics, InsiderTrade, NewsArticle, Period, PriceBar, ProviderId,
    Symbol,
};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const SUMMARY_URL: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";

/// Keyless Yahoo Finance adapter: prices, fundamentals, and profiles.
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Arc<dyn HttpClient>,
    rate_gate: RateGate,
    timeout_ms: u64,
}

impl Default for YahooAdapter {
    fn default() -> Self {
        Self::new(Arc::new(NoopHttpClient))
    }
}

impl YahooAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            rate_gate: RateGate::new(RatePolicy::new(
                std::time::Duration::from_secs(60),
                120,
            )),
            timeout_ms: 5_000,
        }
    }

    pub fn with_rate_policy(mut self, policy: RatePolicy) -> Self {
        self.rate_gate = RateGate::new(policy);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    async fn call(&self, url: String) -> Result<String, FetchError> {
        if let Err(wait) = self.rate_gate.acquire() {
            return Err(FetchError::rate_limited(
                "yahoo: local rate budget exhausted",
                Some(wait),
            ));
        }

        let request = HttpRequest::get(url).with_timeout_ms(self.timeout_ms);
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| transport_to_error(ProviderId::Yahoo, error))?;

        if let Some(error) = classify_status(ProviderId::Yahoo, &response) {
            return Err(error);
        }
        Ok(response.body)
    }
}

impl DataProvider for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(true, true, true, false, false)
    }

    fn prices<'a>(&'a self, query: &'a PricesQuery) -> FetchFuture<'a, Vec<PriceBar>> {
        Box::pin(async move {
            let url = format!(
                "{CHART_URL}/{}?period1={}&period2={}&interval=1d",
                query.symbol,
                midnight_unix(query.range.start()),
                midnight_unix(query.range.end()) + 86_400,
            );
            let body = self.call(url).await?;

            if is_placeholder_body(&body) {
                return Ok(synth_bars(&query.symbol, query.range.start(), query.range.end()));
            }

            let parsed: ChartResponse = serde_json::from_str(&body).map_err(|error| {
                FetchError::malformed(format!("yahoo: unparseable chart payload: {error}"))
            })?;
            normalize_chart(parsed)
        })
    }

    fn financial_metrics<'a>(
        &'a self,
        query: &'a MetricsQuery,
    ) -> FetchFuture<'a, Vec<FinancialMetrics>> {
        Box::pin(async move {
            let url = format!(
                "{SUMMARY_URL}/{}?modules=summaryDetail,defaultKeyStatistics,financialData",
                query.symbol
            );
            let body = self.call(url).await?;

            if is_placeholder_body(&body) {
                return synth_metrics(&query.symbol, query.end_date, query.period, query.limit);
            }

            let parsed: SummaryResponse = serde_json::from_str(&body).map_err(|error| {
                FetchError::malformed(format!("yahoo: unparseable summary payload: {error}"))
            })?;
            let modules = parsed.into_modules()?;

            let snapshot = FinancialMetrics::new(
                query.symbol.clone(),
                query.end_date,
                query.period,
                modules.summary_detail.as_ref().and_then(|m| m.market_cap.value()),
                modules.summary_detail.as_ref().and_then(|m| m.trailing_pe.value()),
                modules
                    .key_statistics
                    .as_ref()
                    .and_then(|m| m.price_to_book.value()),
                modules
                    .financial_data
                    .as_ref()
                    .and_then(|m| m.total_revenue.value()),
                modules
                    .financial_data
                    .as_ref()
                    .and_then(|m| m.net_income.value()),
                modules
                    .summary_detail
                    .as_ref()
                    .and_then(|m| m.dividend_yield.value()),
            )
            .map_err(|error| validation_to_error(ProviderId::Yahoo, error))?;

            // Yahoo only exposes the latest snapshot, not a period history.
            Ok(vec![snapshot])
        })
    }

    fn company_facts<'a>(&'a self, query: &'a FactsQuery) -> FetchFuture<'a, CompanyFacts> {
        Box::pin(async move {
            let url = format!(
                "{SUMMARY_URL}/{}?modules=assetProfile,price",
                query.symbol
            );
            let body = self.call(url).await?;

            if is_placeholder_body(&body) {
                return synth_facts(&query.symbol);
            }

            let parsed: SummaryResponse = serde_json::from_str(&body).map_err(|error| {
                FetchError::malformed(format!("yahoo: unparseable profile payload: {error}"))
            })?;
            let modules = parsed.into_modules()?;
            let profile = modules.asset_profile.unwrap_or_default();
            let price = modules.price.unwrap_or_default();

            let name = price
                .long_name
                .or(price.short_name)
                .unwrap_or_else(|| query.symbol.as_str().to_owned());

            CompanyFacts::new(
                query.symbol.clone(),
                name,
                profile.sector,
                profile.industry,
                price.exchange_name,
                profile.full_time_employees,
                price.market_cap.value(),
            )
            .map_err(|error| validation_to_error(ProviderId::Yahoo, error))
        })
    }

    fn news<'a>(&'a self, query: &'a NewsQuery) -> FetchFuture<'a, Vec<NewsArticle>> {
        let _ = query;
        Box::pin(async move { Err(FetchError::not_found("yahoo: news is not served here")) })
    }

    fn insider_trades<'a>(
        &'a self,
        query: &'a InsiderTradesQuery,
    ) -> FetchFuture<'a, Vec<InsiderTrade>> {
        let _ = query;
        Box::pin(async move {
            Err(FetchError::not_found("yahoo: insider trades are not served here"))
        })
    }
}

fn midnight_unix(date: Date) -> i64 {
    date.midnight().assume_utc().unix_timestamp()
}

/// Deterministic weekday bars for offline mode.
fn synth_bars(symbol: &Symbol, start: Date, end: Date) -> Vec<PriceBar> {
    let seed = symbol_seed(symbol);
    let mut bars = Vec::new();
    let mut day = start;
    let mut index = 0_u64;

    while day <= end {
        if !matches!(day.weekday(), Weekday::Saturday | Weekday::Sunday) {
            let base = 90.0 + ((seed + index) % 350) as f64 / 10.0;
            if let Ok(bar) = PriceBar::new(
                day,
                base,
                base + 1.20,
                base - 0.80,
                base + 0.30,
                20_000 + index * 25,
            ) {
                bars.push(bar);
            }
            index += 1;
        }
        match day.next_day() {
            Some(next) => day = next,
            None => break,
        }
    }

    bars
}

/// Deterministic fundamentals history for offline mode, newest first.
fn synth_metrics(
    symbol: &Symbol,
    end_date: Date,
    period: Period,
    limit: usize,
) -> Result<Vec<FinancialMetrics>, FetchError> {
    let seed = symbol_seed(symbol);
    let step = match period {
        Period::Annual => Duration::days(365),
        Period::Ttm | Period::Quarterly => Duration::days(91),
    };

    (0..limit)
        .map(|index| {
            let report_period = end_date - step * index as i32;
            FinancialMetrics::new(
                symbol.clone(),
                report_period,
                period,
                Some(500_000_000_000.0 + (seed % 300_000) as f64 * 1_000_000.0),
                Some(14.0 + ((seed + index as u64) % 200) as f64 / 10.0),
                Some(2.0 + (seed % 80) as f64 / 10.0),
                Some(90_000_000_000.0 + (seed % 40_000) as f64 * 1_000_000.0),
                Some(20_000_000_000.0 + (seed % 9_000) as f64 * 1_000_000.0),
                Some(0.005 + (seed % 50) as f64 / 10_000.0),
            )
            .map_err(|error| validation_to_error(ProviderId::Yahoo, error))
        })
        .collect()
}

fn synth_facts(symbol: &Symbol) -> Result<CompanyFacts, FetchError> {
    let seed = symbol_seed(symbol);
    let sectors = ["Technology", "Healthcare", "Financial Services", "Energy"];
    let industries = ["Software", "Semiconductors", "Banks", "Oil & Gas"];

    CompanyFacts::new(
        symbol.clone(),
        format!("{} Inc.", symbol.as_str()),
        Some(String::from(sectors[(seed % sectors.len() as u64) as usize])),
        Some(String::from(
            industries[(seed % industries.len() as u64) as usize],
        )),
        Some(String::from("NASDAQ")),
        Some(10_000 + seed % 150_000),
        Some(500_000_000_000.0 + (seed % 300_000) as f64 * 1_000_000.0),
    )
    .map_err(|error| validation_to_error(ProviderId::Yahoo, error))
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartNode,
}

#[derive(Debug, Deserialize)]
struct ChartNode {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuoteBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuoteBlock {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

fn normalize_chart(parsed: ChartResponse) -> Result<Vec<PriceBar>, FetchError> {
    let result = parsed
        .chart
        .result
        .and_then(|mut results| {
            if results.is_empty() {
                None
            } else {
                Some(results.remove(0))
            }
        })
        .ok_or_else(|| FetchError::not_found("yahoo: chart payload has no result"))?;

    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .unwrap_or_default();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (index, unix) in result.timestamp.iter().enumerate() {
        let fields = (
            quote.open.get(index).copied().flatten(),
            quote.high.get(index).copied().flatten(),
            quote.low.get(index).copied().flatten(),
            quote.close.get(index).copied().flatten(),
            quote.volume.get(index).copied().flatten(),
        );
        // Yahoo pads holiday slots with nulls; skip incomplete rows.
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = fields else {
            continue;
        };

        let date = OffsetDateTime::from_unix_timestamp(*unix)
            .map_err(|_| FetchError::malformed("yahoo: chart timestamp out of range"))?
            .date();
        let bar = PriceBar::new(date, open, high, low, close, volume)
            .map_err(|error| validation_to_error(ProviderId::Yahoo, error))?;
        bars.push(bar);
    }

    Ok(bars)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    quote_summary: SummaryNode,
}

#[derive(Debug, Deserialize)]
struct SummaryNode {
    result: Option<Vec<SummaryModules>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryModules {
    summary_detail: Option<SummaryDetail>,
    #[serde(rename = "defaultKeyStatistics")]
    key_statistics: Option<KeyStatistics>,
    financial_data: Option<FinancialData>,
    asset_profile: Option<AssetProfile>,
    price: Option<PriceModule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    #[serde(default)]
    market_cap: RawValue,
    #[serde(default, rename = "trailingPE")]
    trailing_pe: RawValue,
    #[serde(default)]
    dividend_yield: RawValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    #[serde(default)]
    price_to_book: RawValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    #[serde(default)]
    total_revenue: RawValue,
    #[serde(default, rename = "netIncomeToCommon")]
    net_income: RawValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetProfile {
    sector: Option<String>,
    industry: Option<String>,
    full_time_employees: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
    exchange_name: Option<String>,
    #[serde(default)]
    market_cap: RawValue,
}

/// Yahoo wraps numbers as `{"raw": 1.23, "fmt": "1.23"}`.
#[derive(Debug, Default, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

impl RawValue {
    fn value(&self) -> Option<f64> {
        self.raw
    }
}

impl SummaryResponse {
    fn into_modules(self) -> Result<SummaryModules, FetchError> {
        self.quote_summary
            .result
            .and_then(|mut results| {
                if results.is_empty() {
                    None
                } else {
                    Some(results.remove(0))
                }
            })
            .ok_or_else(|| FetchError::not_found("yahoo: summary payload has no result"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DateRange;
    use time::macros::date;

    fn symbol(value: &str) -> Symbol {
        Symbol::parse(value).expect("valid symbol")
    }

    #[tokio::test]
    async fn offline_prices_cover_weekdays_only() {
        let adapter = YahooAdapter::default();
        let query = PricesQuery::new(
            symbol("AAPL"),
            DateRange::parse("2024-01-01", "2024-01-07").expect("valid range"),
        );

        let bars = adapter.prices(&query).await.expect("offline fetch succeeds");
        // Mon Jan 1 through Sun Jan 7 has five weekdays.
        assert_eq!(bars.len(), 5);
        assert!(bars.iter().all(|bar| bar.high >= bar.low));
    }

    #[tokio::test]
    async fn offline_prices_are_deterministic() {
        let adapter = YahooAdapter::default();
        let query = PricesQuery::new(
            symbol("MSFT"),
            DateRange::parse("2024-03-04", "2024-03-08").expect("valid range"),
        );

        let first = adapter.prices(&query).await.expect("fetch succeeds");
        let second = adapter.prices(&query).await.expect("fetch succeeds");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn offline_metrics_honor_limit_and_order() {
        let adapter = YahooAdapter::default();
        let query = MetricsQuery::new(symbol("AAPL"), date!(2024 - 06 - 30), Period::Quarterly, 3)
            .expect("valid query");

        let metrics = adapter
            .financial_metrics(&query)
            .await
            .expect("offline fetch succeeds");
        assert_eq!(metrics.len(), 3);
        assert!(metrics
            .windows(2)
            .all(|pair| pair[0].report_period > pair[1].report_period));
    }

    #[tokio::test]
    async fn chart_payload_rows_with_nulls_are_skipped() {
        let body = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704240000, 1704326400],
                    "indicators": {
                        "quote": [{
                            "open": [100.0, null],
                            "high": [101.5, null],
                            "low": [99.0, null],
                            "close": [101.0, null],
                            "volume": [10000, null]
                        }]
                    }
                }]
            }
        }"#;

        let parsed: ChartResponse = serde_json::from_str(body).expect("payload parses");
        let bars = normalize_chart(parsed).expect("normalization succeeds");
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, date!(2024 - 01 - 03));
    }

    #[tokio::test]
    async fn news_is_declared_unsupported() {
        let adapter = YahooAdapter::default();
        assert!(!adapter.capabilities().supports(crate::QueryKind::News));
    }
}
