//! Typed queries and canonical cache keys.
//!
//! A query is immutable once constructed and doubles as cache-key material:
//! `cache_key()` renders `kind/symbol/param=value/...` with normalized date
//! bounds and a fixed parameter order, so one symbol's entries share a
//! common `kind/symbol` prefix for targeted invalidation.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{DateRange, Period, Symbol, ValidationError};

/// Data category served by the access layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Prices,
    FinancialMetrics,
    CompanyFacts,
    News,
    InsiderTrades,
}

impl QueryKind {
    pub const ALL: [Self; 5] = [
        Self::Prices,
        Self::FinancialMetrics,
        Self::CompanyFacts,
        Self::News,
        Self::InsiderTrades,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prices => "prices",
            Self::FinancialMetrics => "financial_metrics",
            Self::CompanyFacts => "company_facts",
            Self::News => "news",
            Self::InsiderTrades => "insider_trades",
        }
    }
}

impl Display for QueryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "prices" => Ok(Self::Prices),
            "financial_metrics" | "metrics" => Ok(Self::FinancialMetrics),
            "company_facts" | "facts" => Ok(Self::CompanyFacts),
            "news" => Ok(Self::News),
            "insider_trades" => Ok(Self::InsiderTrades),
            other => Err(ValidationError::InvalidQueryKind {
                value: other.to_owned(),
            }),
        }
    }
}

/// Price history for a symbol over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricesQuery {
    pub symbol: Symbol,
    pub range: DateRange,
}

impl PricesQuery {
    pub fn new(symbol: Symbol, range: DateRange) -> Self {
        Self { symbol, range }
    }
}

/// Fundamentals as of an end date, newest first, up to `limit` periods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsQuery {
    pub symbol: Symbol,
    pub end_date: Date,
    pub period: Period,
    pub limit: usize,
}

impl MetricsQuery {
    pub fn new(
        symbol: Symbol,
        end_date: Date,
        period: Period,
        limit: usize,
    ) -> Result<Self, ValidationError> {
        if limit == 0 {
            return Err(ValidationError::ZeroLimit);
        }
        Ok(Self {
            symbol,
            end_date,
            period,
            limit,
        })
    }
}

/// Company profile lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactsQuery {
    pub symbol: Symbol,
}

impl FactsQuery {
    pub fn new(symbol: Symbol) -> Self {
        Self { symbol }
    }
}

/// News up to an end date, optionally bounded below, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub symbol: Symbol,
    pub end_date: Date,
    pub start_date: Option<Date>,
    pub limit: usize,
}

impl NewsQuery {
    pub fn new(
        symbol: Symbol,
        end_date: Date,
        start_date: Option<Date>,
        limit: usize,
    ) -> Result<Self, ValidationError> {
        if limit == 0 {
            return Err(ValidationError::ZeroLimit);
        }
        if let Some(start) = start_date {
            if start > end_date {
                return Err(ValidationError::InvertedDateRange {
                    start: start.to_string(),
                    end: end_date.to_string(),
                });
            }
        }
        Ok(Self {
            symbol,
            end_date,
            start_date,
            limit,
        })
    }
}

/// Insider transactions up to an end date, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsiderTradesQuery {
    pub symbol: Symbol,
    pub end_date: Date,
    pub start_date: Option<Date>,
    pub limit: usize,
}

impl InsiderTradesQuery {
    pub fn new(
        symbol: Symbol,
        end_date: Date,
        start_date: Option<Date>,
        limit: usize,
    ) -> Result<Self, ValidationError> {
        if limit == 0 {
            return Err(ValidationError::ZeroLimit);
        }
        if let Some(start) = start_date {
            if start > end_date {
                return Err(ValidationError::InvertedDateRange {
                    start: start.to_string(),
                    end: end_date.to_string(),
                });
            }
        }
        Ok(Self {
            symbol,
            end_date,
            start_date,
            limit,
        })
    }
}

/// Any query the router can resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Prices(PricesQuery),
    FinancialMetrics(MetricsQuery),
    CompanyFacts(FactsQuery),
    News(NewsQuery),
    InsiderTrades(InsiderTradesQuery),
}

impl Query {
    pub fn kind(&self) -> QueryKind {
        match self {
            Self::Prices(_) => QueryKind::Prices,
            Self::FinancialMetrics(_) => QueryKind::FinancialMetrics,
            Self::CompanyFacts(_) => QueryKind::CompanyFacts,
            Self::News(_) => QueryKind::News,
            Self::InsiderTrades(_) => QueryKind::InsiderTrades,
        }
    }

    /// Canonical cache key for this query.
    pub fn cache_key(&self) -> String {
        match self {
            Self::Prices(query) => format!(
                "{}/{}/start={}/end={}",
                QueryKind::Prices,
                query.symbol,
                query.range.start(),
                query.range.end()
            ),
            Self::FinancialMetrics(query) => format!(
                "{}/{}/end={}/limit={}/period={}",
                QueryKind::FinancialMetrics,
                query.symbol,
                query.end_date,
                query.limit,
                query.period
            ),
            Self::CompanyFacts(query) => {
                format!("{}/{}/all", QueryKind::CompanyFacts, query.symbol)
            }
            Self::News(query) => format!(
                "{}/{}/end={}/limit={}/start={}",
                QueryKind::News,
                query.symbol,
                query.end_date,
                query.limit,
                optional_date(query.start_date)
            ),
            Self::InsiderTrades(query) => format!(
                "{}/{}/end={}/limit={}/start={}",
                QueryKind::InsiderTrades,
                query.symbol,
                query.end_date,
                query.limit,
                optional_date(query.start_date)
            ),
        }
    }

    /// Key prefix shared by every query for one symbol and kind.
    ///
    /// Ends with '/' so "AAPL" never matches "AAPLX" entries.
    pub fn symbol_prefix(kind: QueryKind, symbol: &Symbol) -> String {
        format!("{kind}/{symbol}/")
    }
}

fn optional_date(date: Option<Date>) -> String {
    date.map(|value| value.to_string())
        .unwrap_or_else(|| String::from("-"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn symbol(value: &str) -> Symbol {
        Symbol::parse(value).expect("valid symbol")
    }

    #[test]
    fn equivalent_queries_share_a_cache_key() {
        let range = DateRange::parse("2024-01-01", "2024-01-05").expect("valid range");
        let left = Query::Prices(PricesQuery::new(symbol("aapl"), range));
        let right = Query::Prices(PricesQuery::new(symbol(" AAPL "), range));

        assert_eq!(left.cache_key(), right.cache_key());
        assert_eq!(
            left.cache_key(),
            "prices/AAPL/start=2024-01-01/end=2024-01-05"
        );
    }

    #[test]
    fn symbol_prefix_covers_all_parameterizations() {
        let a = Query::FinancialMetrics(
            MetricsQuery::new(symbol("MSFT"), date!(2024 - 06 - 30), Period::Ttm, 4)
                .expect("valid query"),
        );
        let b = Query::FinancialMetrics(
            MetricsQuery::new(symbol("MSFT"), date!(2024 - 03 - 31), Period::Annual, 1)
                .expect("valid query"),
        );

        let prefix = Query::symbol_prefix(QueryKind::FinancialMetrics, &symbol("MSFT"));
        assert!(a.cache_key().starts_with(&prefix));
        assert!(b.cache_key().starts_with(&prefix));
    }

    #[test]
    fn news_query_rejects_zero_limit() {
        let err = NewsQuery::new(symbol("AAPL"), date!(2024 - 01 - 05), None, 0)
            .expect_err("must fail");
        assert!(matches!(err, ValidationError::ZeroLimit));
    }
}
