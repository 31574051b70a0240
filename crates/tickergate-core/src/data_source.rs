//! Provider adapter contract and failure taxonomy.
//!
//! Every upstream source implements [`DataProvider`]: a capability matrix
//! plus one fetch method per query kind, all returning normalized records
//! or a classified [`FetchError`]. The router is written against this
//! trait only, never against a concrete adapter.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::query::{FactsQuery, InsiderTradesQuery, MetricsQuery, NewsQuery, PricesQuery};
use crate::{
    CompanyFacts, FinancialMetrics, InsiderTrade, NewsArticle, PriceBar, ProviderId, QueryKind,
};

/// Query kinds a provider can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub prices: bool,
    pub financial_metrics: bool,
    pub company_facts: bool,
    pub news: bool,
    pub insider_trades: bool,
}

impl CapabilitySet {
    pub const fn new(
        prices: bool,
        financial_metrics: bool,
        company_facts: bool,
        news: bool,
        insider_trades: bool,
    ) -> Self {
        Self {
            prices,
            financial_metrics,
            company_facts,
            news,
            insider_trades,
        }
    }

    pub const fn full() -> Self {
        Self::new(true, true, true, true, true)
    }

    pub const fn none() -> Self {
        Self::new(false, false, false, false, false)
    }

    pub const fn supports(self, kind: QueryKind) -> bool {
        match kind {
            QueryKind::Prices => self.prices,
            QueryKind::FinancialMetrics => self.financial_metrics,
            QueryKind::CompanyFacts => self.company_facts,
            QueryKind::News => self.news,
            QueryKind::InsiderTrades => self.insider_trades,
        }
    }

    pub fn supported_kinds(self) -> Vec<QueryKind> {
        QueryKind::ALL
            .into_iter()
            .filter(|kind| self.supports(*kind))
            .collect()
    }
}

/// Adapter-level failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Timeout,
    RateLimited,
    NotFound,
    Unauthorized,
    Malformed,
}

impl FetchErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Malformed => "malformed",
        }
    }
}

impl Display for FetchErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured adapter failure consumed by the router and breakers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
    /// Provider-advertised back-off hint for rate-limit responses.
    retry_after: Option<Duration>,
}

impl FetchError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Timeout,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            kind: FetchErrorKind::RateLimited,
            message: message.into(),
            retry_after,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::NotFound,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Unauthorized,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Malformed,
            message: message.into(),
            retry_after: None,
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Whether this failure erodes the provider's breaker health.
    ///
    /// A symbol unknown to one provider is correct behavior of a working
    /// upstream, so `NotFound` never counts.
    pub const fn counts_toward_breaker(&self) -> bool {
        !matches!(self.kind, FetchErrorKind::NotFound)
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl std::error::Error for FetchError {}

pub type FetchFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'a>>;

/// Upstream source contract.
///
/// Implementations must be `Send + Sync`; the router shares them across
/// concurrent query paths. The router never calls a fetch method for a
/// kind the capability set does not declare.
pub trait DataProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> CapabilitySet;

    fn prices<'a>(&'a self, query: &'a PricesQuery) -> FetchFuture<'a, Vec<PriceBar>>;

    fn financial_metrics<'a>(
        &'a self,
        query: &'a MetricsQuery,
    ) -> FetchFuture<'a, Vec<FinancialMetrics>>;

    fn company_facts<'a>(&'a self, query: &'a FactsQuery) -> FetchFuture<'a, CompanyFacts>;

    fn news<'a>(&'a self, query: &'a NewsQuery) -> FetchFuture<'a, Vec<NewsArticle>>;

    fn insider_trades<'a>(
        &'a self,
        query: &'a InsiderTradesQuery,
    ) -> FetchFuture<'a, Vec<InsiderTrade>>;
}

/// Normalized payload stored in the cache and returned by the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "records")]
pub enum RecordSet {
    Prices(Vec<PriceBar>),
    FinancialMetrics(Vec<FinancialMetrics>),
    CompanyFacts(CompanyFacts),
    News(Vec<NewsArticle>),
    InsiderTrades(Vec<InsiderTrade>),
}

impl RecordSet {
    pub fn kind(&self) -> QueryKind {
        match self {
            Self::Prices(_) => QueryKind::Prices,
            Self::FinancialMetrics(_) => QueryKind::FinancialMetrics,
            Self::CompanyFacts(_) => QueryKind::CompanyFacts,
            Self::News(_) => QueryKind::News,
            Self::InsiderTrades(_) => QueryKind::InsiderTrades,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Prices(records) => records.len(),
            Self::FinancialMetrics(records) => records.len(),
            Self::CompanyFacts(_) => 1,
            Self::News(records) => records.len(),
            Self::InsiderTrades(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_not_a_breaker_failure() {
        assert!(!FetchError::not_found("no such symbol").counts_toward_breaker());
        assert!(FetchError::timeout("deadline exceeded").counts_toward_breaker());
        assert!(FetchError::rate_limited("slow down", None).counts_toward_breaker());
        assert!(FetchError::malformed("bad json").counts_toward_breaker());
    }

    #[test]
    fn capability_set_filters_kinds() {
        let prices_only = CapabilitySet::new(true, false, false, false, false);
        assert!(prices_only.supports(QueryKind::Prices));
        assert!(!prices_only.supports(QueryKind::News));
        assert_eq!(prices_only.supported_kinds(), vec![QueryKind::Prices]);
    }
}
