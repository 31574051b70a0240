use std::sync::Arc;

use serde::Deserialize;
use time::{Date, Duration, Weekday};

use super::{
    classify_status, is_placeholder_body, symbol_seed, transport_to_error, validation_to_error,
};
use crate::data_source::{CapabilitySet, DataProvider, FetchError, FetchFuture};
use crate::domain::parse_date;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, NoopHttpClient};
use crate::query::{FactsQuery, InsiderTradesQuery, MetricsQuery, NewsQuery, PricesQuery};
use crate::throttle::{RateGate, RatePolicy};
use crate::{
    CompanyFacts, FinancialMetrics, InsiderTrade, NewsArticle, Period, PriceBar, ProviderId,
    Symbol, UtcDateTime,
};

const BASE_URL: &str = "https://api.financialdatasets.ai";

/// Credentialed FinancialDatasets adapter. The only source that serves
/// every query kind, so it usually sits last in the fallback order as the
/// paid backstop.
#[derive(Clone)]
pub struct FinancialDatasetsAdapter {
    http_client: Arc<dyn HttpClient>,
    auth: HttpAuth,
    rate_gate: RateGate,
    timeout_ms: u64,
}

impl Default for FinancialDatasetsAdapter {
    fn default() -> Self {
        Self::new(Arc::new(NoopHttpClient), "demo")
    }
}

impl FinancialDatasetsAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            auth: HttpAuth::Header {
                name: String::from("x-api-key"),
                value: api_key.into(),
            },
            rate_gate: RateGate::new(RatePolicy::new(std::time::Duration::from_secs(60), 60)),
            timeout_ms: 8_000,
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
                "financialdatasets: local rate budget exhausted",
                Some(wait),
            ));
        }

        let request = HttpRequest::get(url)
            .with_auth(&self.auth)
            .with_timeout_ms(self.timeout_ms);
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| transport_to_error(ProviderId::FinancialDatasets, error))?;

        if let Some(error) = classify_status(ProviderId::FinancialDatasets, &response) {
            return Err(error);
        }
        Ok(response.body)
    }
}

impl DataProvider for FinancialDatasetsAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::FinancialDatasets
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn prices<'a>(&'a self, query: &'a PricesQuery) -> FetchFuture<'a, Vec<PriceBar>> {
        Box::pin(async move {
            let url = format!(
                "{BASE_URL}/prices/?ticker={}&interval=day&interval_multiplier=1&start_date={}&end_date={}",
                query.symbol,
                query.range.start(),
                query.range.end(),
            );
            let body = self.call(url).await?;

            if is_placeholder_body(&body) {
                return Ok(synth_bars(&query.symbol, query.range.start(), query.range.end()));
            }

            let parsed: PricesPayload = serde_json::from_str(&body)
                .map_err(|error| malformed_payload("prices", error))?;
            parsed
                .prices
                .into_iter()
                .map(normalize_price)
                .collect::<Result<Vec<_>, _>>()
        })
    }

    fn financial_metrics<'a>(
        &'a self,
        query: &'a MetricsQuery,
    ) -> FetchFuture<'a, Vec<FinancialMetrics>> {
        Box::pin(async move {
            let url = format!(
                "{BASE_URL}/financial-metrics/?ticker={}&report_period_lte={}&period={}&limit={}",
                query.symbol, query.end_date, query.period, query.limit,
            );
            let body = self.call(url).await?;

            if is_placeholder_body(&body) {
                return synth_metrics(&query.symbol, query.end_date, query.period, query.limit);
            }

            let parsed: MetricsPayload = serde_json::from_str(&body)
                .map_err(|error| malformed_payload("financial-metrics", error))?;
            parsed
                .financial_metrics
                .into_iter()
                .map(|raw| normalize_metrics(&query.symbol, raw))
                .collect::<Result<Vec<_>, _>>()
        })
    }

    fn company_facts<'a>(&'a self, query: &'a FactsQuery) -> FetchFuture<'a, CompanyFacts> {
        Box::pin(async move {
            let url = format!("{BASE_URL}/company/facts/?ticker={}", query.symbol);
            let body = self.call(url).await?;

            if is_placeholder_body(&body) {
                return synth_facts(&query.symbol);
            }

            let parsed: FactsPayload = serde_json::from_str(&body)
                .map_err(|error| malformed_payload("company facts", error))?;
            normalize_facts(&query.symbol, parsed.company_facts)
        })
    }

    fn news<'a>(&'a self, query: &'a NewsQuery) -> FetchFuture<'a, Vec<NewsArticle>> {
        Box::pin(async move {
            let mut url = format!(
                "{BASE_URL}/news/?ticker={}&end_date={}&limit={}",
                query.symbol, query.end_date, query.limit,
            );
            if let Some(start) = query.start_date {
                url.push_str(&format!("&start_date={start}"));
            }
            let body = self.call(url).await?;

            if is_placeholder_body(&body) {
                return synth_news(&query.symbol, query.end_date, query.limit);
            }

            let parsed: NewsPayload =
                serde_json::from_str(&body).map_err(|error| malformed_payload("news", error))?;
            parsed
                .news
                .into_iter()
                .map(|raw| normalize_news(&query.symbol, raw))
                .collect::<Result<Vec<_>, _>>()
        })
    }

    fn insider_trades<'a>(
        &'a self,
        query: &'a InsiderTradesQuery,
    ) -> FetchFuture<'a, Vec<InsiderTrade>> {
        Box::pin(async move {
            let mut url = format!(
                "{BASE_URL}/insider-trades/?ticker={}&filing_date_lte={}&limit={}",
                query.symbol, query.end_date, query.limit,
            );
            if let Some(start) = query.start_date {
                url.push_str(&format!("&filing_date_gte={start}"));
            }
            let body = self.call(url).await?;

            if is_placeholder_body(&body) {
                return synth_trades(&query.symbol, query.end_date, query.limit);
            }

            let parsed: TradesPayload = serde_json::from_str(&body)
                .map_err(|error| malformed_payload("insider trades", error))?;
            parsed
                .insider_trades
                .into_iter()
                .map(|raw| normalize_trade(&query.symbol, raw))
                .collect::<Result<Vec<_>, _>>()
        })
    }
}

fn malformed_payload(endpoint: &str, error: serde_json::Error) -> FetchError {
    FetchError::malformed(format!(
        "financialdatasets: unparseable {endpoint} payload: {error}"
    ))
}

#[derive(Debug, Deserialize)]
struct PricesPayload {
    #[serde(default)]
    prices: Vec<RawPrice>,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

fn normalize_price(raw: RawPrice) -> Result<PriceBar, FetchError> {
    // The time field carries a full timestamp; the date part is the bar key.
    let date_part = raw.time.split('T').next().unwrap_or(raw.time.as_str());
    let date = parse_date(date_part)
        .map_err(|error| validation_to_error(ProviderId::FinancialDatasets, error))?;
    PriceBar::new(date, raw.open, raw.high, raw.low, raw.close, raw.volume)
        .map_err(|error| validation_to_error(ProviderId::FinancialDatasets, error))
}

#[derive(Debug, Deserialize)]
struct MetricsPayload {
    #[serde(default)]
    financial_metrics: Vec<RawMetrics>,
}

#[derive(Debug, Deserialize)]
struct RawMetrics {
    report_period: String,
    period: String,
    market_cap: Option<f64>,
    price_to_earnings_ratio: Option<f64>,
    price_to_book_ratio: Option<f64>,
    revenue: Option<f64>,
    net_income: Option<f64>,
    dividend_yield: Option<f64>,
}

fn normalize_metrics(symbol: &Symbol, raw: RawMetrics) -> Result<FinancialMetrics, FetchError> {
    let report_period = parse_date(&raw.report_period)
        .map_err(|error| validation_to_error(ProviderId::FinancialDatasets, error))?;
    let period: Period = raw
        .period
        .parse()
        .map_err(|error| validation_to_error(ProviderId::FinancialDatasets, error))?;

    FinancialMetrics::new(
        symbol.clone(),
        report_period,
        period,
        raw.market_cap,
        raw.price_to_earnings_ratio,
        raw.price_to_book_ratio,
        raw.revenue,
        raw.net_income,
        raw.dividend_yield,
    )
    .map_err(|error| validation_to_error(ProviderId::FinancialDatasets, error))
}

#[derive(Debug, Deserialize)]
struct FactsPayload {
    company_facts: RawFacts,
}

#[derive(Debug, Deserialize)]
struct RawFacts {
    name: String,
    sector: Option<String>,
    industry: Option<String>,
    exchange: Option<String>,
    #[serde(rename = "number_of_employees")]
    employees: Option<u64>,
    market_cap: Option<f64>,
}

fn normalize_facts(symbol: &Symbol, raw: RawFacts) -> Result<CompanyFacts, FetchError> {
    CompanyFacts::new(
        symbol.clone(),
        raw.name,
        raw.sector,
        raw.industry,
        raw.exchange,
        raw.employees,
        raw.market_cap,
    )
    .map_err(|error| validation_to_error(ProviderId::FinancialDatasets, error))
}

#[derive(Debug, Deserialize)]
struct NewsPayload {
    #[serde(default)]
    news: Vec<RawNews>,
}

#[derive(Debug, Deserialize)]
struct RawNews {
    title: String,
    source: Option<String>,
    url: Option<String>,
    date: String,
}

fn normalize_news(symbol: &Symbol, raw: RawNews) -> Result<NewsArticle, FetchError> {
    let published_at = UtcDateTime::parse(&raw.date)
        .map_err(|error| validation_to_error(ProviderId::FinancialDatasets, error))?;
    NewsArticle::new(
        symbol.clone(),
        raw.title,
        raw.source.unwrap_or_else(|| String::from("unknown")),
        raw.url,
        published_at,
    )
    .map_err(|error| validation_to_error(ProviderId::FinancialDatasets, error))
}

#[derive(Debug, Deserialize)]
struct TradesPayload {
    #[serde(default)]
    insider_trades: Vec<RawTrade>,
}

#[derive(Debug, Deserialize)]
struct RawTrade {
    name: String,
    title: Option<String>,
    transaction_date: String,
    transaction_shares: i64,
    transaction_price_per_share: Option<f64>,
}

fn normalize_trade(symbol: &Symbol, raw: RawTrade) -> Result<InsiderTrade, FetchError> {
    let transaction_date = parse_date(&raw.transaction_date)
        .map_err(|error| validation_to_error(ProviderId::FinancialDatasets, error))?;
    InsiderTrade::new(
        symbol.clone(),
        raw.name,
        raw.title,
        transaction_date,
        raw.transaction_shares,
        raw.transaction_price_per_share,
    )
    .map_err(|error| validation_to_error(ProviderId::FinancialDatasets, error))
}

fn synth_bars(symbol: &Symbol, start: Date, end: Date) -> Vec<PriceBar> {
    let seed = symbol_seed(symbol).wrapping_add(13);
    let mut bars = Vec::new();
    let mut day = start;
    let mut index = 0_u64;

    while day <= end {
        if !matches!(day.weekday(), Weekday::Saturday | Weekday::Sunday) {
            let base = 92.0 + ((seed + index) % 340) as f64 / 10.0;
            if let Ok(bar) = PriceBar::new(
                day,
                base,
                base + 1.40,
                base - 0.70,
                base + 0.45,
                25_000 + index * 30,
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

fn synth_metrics(
    symbol: &Symbol,
    end_date: Date,
    period: Period,
    limit: usize,
) -> Result<Vec<FinancialMetrics>, FetchError> {
    let seed = symbol_seed(symbol).wrapping_add(13);
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
                Some(480_000_000_000.0 + (seed % 280_000) as f64 * 1_000_000.0),
                Some(13.5 + ((seed + index as u64) % 180) as f64 / 10.0),
                Some(1.8 + (seed % 90) as f64 / 10.0),
                Some(85_000_000_000.0 + (seed % 45_000) as f64 * 1_000_000.0),
                Some(18_000_000_000.0 + (seed % 8_000) as f64 * 1_000_000.0),
                Some(0.004 + (seed % 60) as f64 / 10_000.0),
            )
            .map_err(|error| validation_to_error(ProviderId::FinancialDatasets, error))
        })
        .collect()
}

fn synth_facts(symbol: &Symbol) -> Result<CompanyFacts, FetchError> {
    let seed = symbol_seed(symbol).wrapping_add(13);
    let sectors = ["Technology", "Consumer Cyclical", "Industrials", "Utilities"];

    CompanyFacts::new(
        symbol.clone(),
        format!("{} Corporation", symbol.as_str()),
        Some(String::from(sectors[(seed % sectors.len() as u64) as usize])),
        None,
        Some(String::from("NYSE")),
        Some(5_000 + seed % 200_000),
        Some(480_000_000_000.0 + (seed % 280_000) as f64 * 1_000_000.0),
    )
    .map_err(|error| validation_to_error(ProviderId::FinancialDatasets, error))
}

fn synth_news(
    symbol: &Symbol,
    end_date: Date,
    limit: usize,
) -> Result<Vec<NewsArticle>, FetchError> {
    let count = limit.min(10);
    (0..count)
        .map(|index| {
            let date = end_date - Duration::days(index as i64);
            let published_at = UtcDateTime::parse(&format!("{date}T12:00:00Z"))
                .map_err(|error| validation_to_error(ProviderId::FinancialDatasets, error))?;
            NewsArticle::new(
                symbol.clone(),
                format!("{} update #{index}", symbol.as_str()),
                "FinancialDatasets Wire",
                Some(format!(
                    "https://news.example.com/{}/{}",
                    symbol.as_str().to_ascii_lowercase(),
                    index
                )),
                published_at,
            )
            .map_err(|error| validation_to_error(ProviderId::FinancialDatasets, error))
        })
        .collect()
}

fn synth_trades(
    symbol: &Symbol,
    end_date: Date,
    limit: usize,
) -> Result<Vec<InsiderTrade>, FetchError> {
    let seed = symbol_seed(symbol).wrapping_add(13);
    let count = limit.min(10);

    (0..count)
        .map(|index| {
            let transaction_date = end_date - Duration::days(7 * index as i64);
            let shares = 1_000 + (seed + index as u64) % 4_000;
            // Alternate buys and sells so downstream math sees both signs.
            let signed_shares = if index % 2 == 0 {
                shares as i64
            } else {
                -(shares as i64)
            };
            InsiderTrade::new(
                symbol.clone(),
                format!("Insider {}", index + 1),
                Some(String::from(if index == 0 { "CEO" } else { "Director" })),
                transaction_date,
                signed_shares,
                Some(95.0 + (seed % 200) as f64 / 10.0),
            )
            .map_err(|error| validation_to_error(ProviderId::FinancialDatasets, error))
        })
        .collect()
}
