use std::sync::Arc;

use time::{Date, Weekday};

use super::{classify_status, is_placeholder_body, symbol_seed, transport_to_error, validation_to_error};
use crate::data_source::{CapabilitySet, DataProvider, FetchError, FetchFuture};
use crate::domain::parse_date;
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::query::{FactsQuery, InsiderTradesQuery, MetricsQuery, NewsQuery, PricesQuery};
use crate::throttle::{RateGate, RatePolicy};
use crate::{
    CompanyFacts, FinancialMetrics, InsiderTrade, NewsArticle, PriceBar, ProviderId, Symbol,
};

const DOWNLOAD_URL: &str = "https://stooq.com/q/d/l/";

/// Keyless Stooq adapter. Daily price history only, served as CSV.
#[derive(Clone)]
pub struct StooqAdapter {
    http_client: Arc<dyn HttpClient>,
    rate_gate: RateGate,
    timeout_ms: u64,
}

impl Default for StooqAdapter {
    fn default() -> Self {
        Self::new(Arc::new(NoopHttpClient))
    }
}

impl StooqAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            rate_gate: RateGate::new(RatePolicy::new(std::time::Duration::from_secs(60), 60)),
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
}

impl DataProvider for StooqAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Stooq
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(true, false, false, false, false)
    }

    fn prices<'a>(&'a self, query: &'a PricesQuery) -> FetchFuture<'a, Vec<PriceBar>> {
        Box::pin(async move {
            if let Err(wait) = self.rate_gate.acquire() {
                return Err(FetchError::rate_limited(
                    "stooq: local rate budget exhausted",
                    Some(wait),
                ));
            }

            let url = format!(
                "{DOWNLOAD_URL}?s={}.us&d1={}&d2={}&i=d",
                query.symbol.as_str().to_ascii_lowercase(),
                compact_date(query.range.start()),
                compact_date(query.range.end()),
            );
            let request = HttpRequest::get(url).with_timeout_ms(self.timeout_ms);
            let response = self
                .http_client
                .execute(request)
                .await
                .map_err(|error| transport_to_error(ProviderId::Stooq, error))?;

            if let Some(error) = classify_status(ProviderId::Stooq, &response) {
                return Err(error);
            }

            if is_placeholder_body(&response.body) {
                return Ok(synth_bars(&query.symbol, query.range.start(), query.range.end()));
            }

            parse_csv(&response.body)
        })
    }

    fn financial_metrics<'a>(
        &'a self,
        query: &'a MetricsQuery,
    ) -> FetchFuture<'a, Vec<FinancialMetrics>> {
        let _ = query;
        Box::pin(async move {
            Err(FetchError::not_found("stooq: fundamentals are not served here"))
        })
    }

    fn company_facts<'a>(&'a self, query: &'a FactsQuery) -> FetchFuture<'a, CompanyFacts> {
        let _ = query;
        Box::pin(async move {
            Err(FetchError::not_found("stooq: company facts are not served here"))
        })
    }

    fn news<'a>(&'a self, query: &'a NewsQuery) -> FetchFuture<'a, Vec<NewsArticle>> {
        let _ = query;
        Box::pin(async move { Err(FetchError::not_found("stooq: news is not served here")) })
    }

    fn insider_trades<'a>(
        &'a self,
        query: &'a InsiderTradesQuery,
    ) -> FetchFuture<'a, Vec<InsiderTrade>> {
        let _ = query;
        Box::pin(async move {
            Err(FetchError::not_found("stooq: insider trades are not served here"))
        })
    }
}

fn compact_date(date: Date) -> String {
    format!("{:04}{:02}{:02}", date.year(), u8::from(date.month()), date.day())
}

/// Stooq serves `Date,Open,High,Low,Close,Volume` rows, oldest first.
/// An unknown symbol comes back as a header-only body (or a bare
/// "No data" line), which is a miss rather than a provider fault.
fn parse_csv(body: &str) -> Result<Vec<PriceBar>, FetchError> {
    let mut lines = body.lines().filter(|line| !line.trim().is_empty());

    let header = lines
        .next()
        .ok_or_else(|| FetchError::malformed("stooq: empty response body"))?;
    if !header.to_ascii_lowercase().starts_with("date,") {
        if header.to_ascii_lowercase().contains("no data") {
            return Err(FetchError::not_found("stooq: no data for symbol"));
        }
        return Err(FetchError::malformed("stooq: unexpected CSV header"));
    }

    let mut bars = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 6 {
            return Err(FetchError::malformed(format!(
                "stooq: short CSV row: {line}"
            )));
        }

        let date = parse_date(fields[0])
            .map_err(|error| validation_to_error(ProviderId::Stooq, error))?;
        let open = parse_field(fields[1], "open")?;
        let high = parse_field(fields[2], "high")?;
        let low = parse_field(fields[3], "low")?;
        let close = parse_field(fields[4], "close")?;
        let volume = fields[5]
            .parse::<f64>()
            .map_err(|_| FetchError::malformed("stooq: unparseable volume field"))?
            as u64;

        let bar = PriceBar::new(date, open, high, low, close, volume)
            .map_err(|error| validation_to_error(ProviderId::Stooq, error))?;
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(FetchError::not_found("stooq: no data for symbol"));
    }
    Ok(bars)
}

fn parse_field(raw: &str, field: &str) -> Result<f64, FetchError> {
    raw.parse::<f64>()
        .map_err(|_| FetchError::malformed(format!("stooq: unparseable {field} field")))
}

fn synth_bars(symbol: &Symbol, start: Date, end: Date) -> Vec<PriceBar> {
    let seed = symbol_seed(symbol).wrapping_add(7);
    let mut bars = Vec::new();
    let mut day = start;
    let mut index = 0_u64;

    while day <= end {
        if !matches!(day.weekday(), Weekday::Saturday | Weekday::Sunday) {
            let base = 88.0 + ((seed + index) % 360) as f64 / 10.0;
            if let Ok(bar) = PriceBar::new(
                day,
                base,
                base + 1.10,
                base - 0.90,
                base + 0.25,
                18_000 + index * 40,
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
