use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use super::{classify_status, is_placeholder_body, transport_to_error, validation_to_error};
use crate::data_source::{CapabilitySet, DataProvider, FetchError, FetchFuture};
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::query::{FactsQuery, InsiderTradesQuery, MetricsQuery, NewsQuery, PricesQuery};
use crate::throttle::{RateGate, RatePolicy};
use crate::{
    CompanyFacts, FinancialMetrics, InsiderTrade, NewsArticle, PriceBar, ProviderId, Symbol,
};

const TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";

/// Keyless SEC EDGAR adapter. Serves company facts from the public filer
/// registry; EDGAR rejects anonymous clients, so every request declares a
/// contactable user agent.
#[derive(Clone)]
pub struct SecEdgarAdapter {
    http_client: Arc<dyn HttpClient>,
    user_agent: String,
    rate_gate: RateGate,
    timeout_ms: u64,
}

impl Default for SecEdgarAdapter {
    fn default() -> Self {
        Self::new(Arc::new(NoopHttpClient))
    }
}

impl SecEdgarAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            user_agent: String::from("tickergate/0.1.0 ops@tickergate.dev"),
            // EDGAR enforces 10 requests per second per client.
            rate_gate: RateGate::new(RatePolicy::new(std::time::Duration::from_secs(1), 10)),
            timeout_ms: 5_000,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
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

impl DataProvider for SecEdgarAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::SecEdgar
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(false, false, true, false, false)
    }

    fn prices<'a>(&'a self, query: &'a PricesQuery) -> FetchFuture<'a, Vec<PriceBar>> {
        let _ = query;
        Box::pin(async move { Err(FetchError::not_found("sec_edgar: prices are not served here")) })
    }

    fn financial_metrics<'a>(
        &'a self,
        query: &'a MetricsQuery,
    ) -> FetchFuture<'a, Vec<FinancialMetrics>> {
        let _ = query;
        Box::pin(async move {
            Err(FetchError::not_found("sec_edgar: fundamentals are not served here"))
        })
    }

    fn company_facts<'a>(&'a self, query: &'a FactsQuery) -> FetchFuture<'a, CompanyFacts> {
        Box::pin(async move {
            if let Err(wait) = self.rate_gate.acquire() {
                return Err(FetchError::rate_limited(
                    "sec_edgar: local rate budget exhausted",
                    Some(wait),
                ));
            }

            let request = HttpRequest::get(TICKERS_URL)
                .with_header("user-agent", &self.user_agent)
                .with_timeout_ms(self.timeout_ms);
            let response = self
                .http_client
                .execute(request)
                .await
                .map_err(|error| transport_to_error(ProviderId::SecEdgar, error))?;

            if let Some(error) = classify_status(ProviderId::SecEdgar, &response) {
                return Err(error);
            }

            if is_placeholder_body(&response.body) {
                return synth_facts(&query.symbol);
            }

            let registry: HashMap<String, FilerEntry> = serde_json::from_str(&response.body)
                .map_err(|error| {
                    FetchError::malformed(format!(
                        "sec_edgar: unparseable filer registry: {error}"
                    ))
                })?;
            lookup_facts(&query.symbol, registry.into_values())
        })
    }

    fn news<'a>(&'a self, query: &'a NewsQuery) -> FetchFuture<'a, Vec<NewsArticle>> {
        let _ = query;
        Box::pin(async move { Err(FetchError::not_found("sec_edgar: news is not served here")) })
    }

    fn insider_trades<'a>(
        &'a self,
        query: &'a InsiderTradesQuery,
    ) -> FetchFuture<'a, Vec<InsiderTrade>> {
        let _ = query;
        Box::pin(async move {
            Err(FetchError::not_found("sec_edgar: insider trades are not served here"))
        })
    }
}

/// One row of the `company_tickers.json` registry.
#[derive(Debug, Clone, Deserialize)]
struct FilerEntry {
    ticker: String,
    title: String,
}

/// The registry carries name and ticker only, so the remaining profile
/// fields stay unset and a lower-priority source can still enrich a miss.
fn lookup_facts(
    symbol: &Symbol,
    registry: impl IntoIterator<Item = FilerEntry>,
) -> Result<CompanyFacts, FetchError> {
    let entry = registry
        .into_iter()
        .find(|entry| entry.ticker.eq_ignore_ascii_case(symbol.as_str()))
        .ok_or_else(|| {
            FetchError::not_found(format!("sec_edgar: {symbol} is not a registered filer"))
        })?;

    CompanyFacts::new(symbol.clone(), entry.title, None, None, None, None, None)
        .map_err(|error| validation_to_error(ProviderId::SecEdgar, error))
}

fn synth_facts(symbol: &Symbol) -> Result<CompanyFacts, FetchError> {
    CompanyFacts::new(
        symbol.clone(),
        format!("{} Incorporated", symbol.as_str()),
        None,
        None,
        None,
        None,
        None,
    )
    .map_err(|error| validation_to_error(ProviderId::SecEdgar, error))
}
