//! String-in, bare-records-out compatibility facade.
//!
//! Older call sites pass raw strings and expect an empty collection (or
//! `None`) on any failure instead of an error. This facade validates,
//! routes, and swallows failures into a warning log so those callers keep
//! working unchanged. New code should use [`DataRouter`] directly and
//! handle [`crate::RouteError`].

use std::str::FromStr;
use std::sync::Arc;

use crate::query::{FactsQuery, InsiderTradesQuery, MetricsQuery, NewsQuery, PricesQuery};
use crate::routing::DataRouter;
use crate::{
    CompanyFacts, DateRange, FinancialMetrics, InsiderTrade, NewsArticle, Period, PriceBar,
    Symbol,
};

/// Drop-in replacement surface for the pre-router API.
#[derive(Clone)]
pub struct LegacyApi {
    router: Arc<DataRouter>,
}

impl LegacyApi {
    pub fn new(router: Arc<DataRouter>) -> Self {
        Self { router }
    }

    /// Daily bars for an inclusive `YYYY-MM-DD` range. Empty on any failure.
    pub async fn get_prices(&self, ticker: &str, start_date: &str, end_date: &str) -> Vec<PriceBar> {
        let query = match parse_prices(ticker, start_date, end_date) {
            Ok(query) => query,
            Err(reason) => return swallowed("get_prices", ticker, &reason),
        };

        match self.router.prices(&query).await {
            Ok(routed) => routed.data,
            Err(error) => swallowed("get_prices", ticker, &error.to_string()),
        }
    }

    /// Fundamentals as of `end_date`, newest first. Empty on any failure.
    pub async fn get_financial_metrics(
        &self,
        ticker: &str,
        end_date: &str,
        period: &str,
        limit: usize,
    ) -> Vec<FinancialMetrics> {
        let query = match parse_metrics(ticker, end_date, period, limit) {
            Ok(query) => query,
            Err(reason) => return swallowed("get_financial_metrics", ticker, &reason),
        };

        match self.router.financial_metrics(&query).await {
            Ok(routed) => routed.data,
            Err(error) => swallowed("get_financial_metrics", ticker, &error.to_string()),
        }
    }

    /// Company profile, or `None` on any failure.
    pub async fn get_company_facts(&self, ticker: &str) -> Option<CompanyFacts> {
        let symbol = match Symbol::parse(ticker) {
            Ok(symbol) => symbol,
            Err(error) => {
                tracing::warn!(call = "get_company_facts", ticker, reason = %error, "legacy call swallowed a failure");
                return None;
            }
        };

        match self.router.company_facts(&FactsQuery::new(symbol)).await {
            Ok(routed) => Some(routed.data),
            Err(error) => {
                tracing::warn!(call = "get_company_facts", ticker, reason = %error, "legacy call swallowed a failure");
                None
            }
        }
    }

    /// Market capitalization as of `end_date`, or `None` on any failure.
    ///
    /// Company facts usually carry a current cap; fundamentals as of the
    /// requested date back them up when they do not.
    pub async fn get_market_cap(&self, ticker: &str, end_date: &str) -> Option<f64> {
        let query = match parse_metrics(ticker, end_date, "ttm", 1) {
            Ok(query) => query,
            Err(reason) => {
                tracing::warn!(call = "get_market_cap", ticker, reason = %reason, "legacy call swallowed a failure");
                return None;
            }
        };

        if let Ok(routed) = self
            .router
            .company_facts(&FactsQuery::new(query.symbol.clone()))
            .await
        {
            if let Some(cap) = routed.data.market_cap {
                return Some(cap);
            }
        }

        match self.router.financial_metrics(&query).await {
            Ok(routed) => routed.data.first().and_then(|metrics| metrics.market_cap),
            Err(error) => {
                tracing::warn!(call = "get_market_cap", ticker, reason = %error, "legacy call swallowed a failure");
                None
            }
        }
    }

    /// News up to `end_date`, newest first. Empty on any failure.
    pub async fn get_company_news(
        &self,
        ticker: &str,
        end_date: &str,
        start_date: Option<&str>,
        limit: usize,
    ) -> Vec<NewsArticle> {
        let query = match parse_news(ticker, end_date, start_date, limit) {
            Ok(query) => query,
            Err(reason) => return swallowed("get_company_news", ticker, &reason),
        };

        match self.router.news(&query).await {
            Ok(routed) => routed.data,
            Err(error) => swallowed("get_company_news", ticker, &error.to_string()),
        }
    }

    /// Insider transactions up to `end_date`. Empty on any failure.
    pub async fn get_insider_trades(
        &self,
        ticker: &str,
        end_date: &str,
        start_date: Option<&str>,
        limit: usize,
    ) -> Vec<InsiderTrade> {
        let query = match parse_trades(ticker, end_date, start_date, limit) {
            Ok(query) => query,
            Err(reason) => return swallowed("get_insider_trades", ticker, &reason),
        };

        match self.router.insider_trades(&query).await {
            Ok(routed) => routed.data,
            Err(error) => swallowed("get_insider_trades", ticker, &error.to_string()),
        }
    }
}

fn swallowed<T>(call: &'static str, ticker: &str, reason: &str) -> Vec<T> {
    tracing::warn!(call, ticker, reason, "legacy call swallowed a failure");
    Vec::new()
}

fn parse_prices(ticker: &str, start: &str, end: &str) -> Result<PricesQuery, String> {
    let symbol = Symbol::parse(ticker).map_err(|error| error.to_string())?;
    let range = DateRange::parse(start, end).map_err(|error| error.to_string())?;
    Ok(PricesQuery::new(symbol, range))
}

fn parse_metrics(
    ticker: &str,
    end: &str,
    period: &str,
    limit: usize,
) -> Result<MetricsQuery, String> {
    let symbol = Symbol::parse(ticker).map_err(|error| error.to_string())?;
    let end_date = crate::domain::parse_date(end).map_err(|error| error.to_string())?;
    let period = Period::from_str(period).map_err(|error| error.to_string())?;
    MetricsQuery::new(symbol, end_date, period, limit).map_err(|error| error.to_string())
}

fn parse_news(
    ticker: &str,
    end: &str,
    start: Option<&str>,
    limit: usize,
) -> Result<NewsQuery, String> {
    let symbol = Symbol::parse(ticker).map_err(|error| error.to_string())?;
    let end_date = crate::domain::parse_date(end).map_err(|error| error.to_string())?;
    let start_date = match start {
        Some(raw) => Some(crate::domain::parse_date(raw).map_err(|error| error.to_string())?),
        None => None,
    };
    NewsQuery::new(symbol, end_date, start_date, limit).map_err(|error| error.to_string())
}

fn parse_trades(
    ticker: &str,
    end: &str,
    start: Option<&str>,
    limit: usize,
) -> Result<InsiderTradesQuery, String> {
    let symbol = Symbol::parse(ticker).map_err(|error| error.to_string())?;
    let end_date = crate::domain::parse_date(end).map_err(|error| error.to_string())?;
    let start_date = match start {
        Some(raw) => Some(crate::domain::parse_date(raw).map_err(|error| error.to_string())?),
        None => None,
    };
    InsiderTradesQuery::new(symbol, end_date, start_date, limit).map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouterBuilder;

    fn api() -> LegacyApi {
        LegacyApi::new(Arc::new(RouterBuilder::offline().build()))
    }

    #[tokio::test]
    async fn prices_round_trip_through_the_router() {
        let api = api();
        let bars = api.get_prices("AAPL", "2024-01-01", "2024-01-05").await;
        assert_eq!(bars.len(), 5);
    }

    #[tokio::test]
    async fn lowercase_ticker_is_normalized_not_rejected() {
        let api = api();
        let facts = api.get_company_facts("aapl").await.expect("facts resolve");
        assert_eq!(facts.symbol.as_str(), "AAPL");
    }

    #[tokio::test]
    async fn invalid_input_becomes_an_empty_result() {
        let api = api();
        assert!(api.get_prices("", "2024-01-01", "2024-01-05").await.is_empty());
        assert!(api
            .get_prices("AAPL", "2024-02-01", "2024-01-01")
            .await
            .is_empty());
        assert!(api
            .get_financial_metrics("AAPL", "2024-06-30", "weekly", 4)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn routing_failure_becomes_an_empty_result() {
        // No credential means no news provider, which legacy callers see
        // as "no news today".
        let api = api();
        let news = api
            .get_company_news("AAPL", "2024-06-28", None, 10)
            .await;
        assert!(news.is_empty());
    }
}
