//! Operational surface: aggregated health, cache maintenance, and warming.

use serde::Serialize;
use time::Duration;

use crate::cache::CacheStats;
use crate::query::{
    FactsQuery, InsiderTradesQuery, MetricsQuery, NewsQuery, PricesQuery, Query, QueryKind,
};
use crate::routing::{DataRouter, ProviderStatus};
use crate::{DateRange, Period, Symbol, UtcDateTime, ValidationError};

/// Point-in-time view of every provider plus the cache.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub generated_at: UtcDateTime,
    pub providers: Vec<ProviderStatus>,
    pub cache: CacheStats,
}

/// What a cache-clear operation should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheScope {
    All,
    /// Every kind for one symbol.
    Symbol(Symbol),
    /// One kind for one symbol.
    SymbolKind(Symbol, QueryKind),
}

/// Outcome of a warming sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WarmReport {
    pub requested: usize,
    pub succeeded: usize,
    pub failures: Vec<WarmFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WarmFailure {
    pub symbol: Symbol,
    pub kind: QueryKind,
    pub error: String,
}

impl DataRouter {
    pub async fn health_report(&self) -> HealthReport {
        let providers = self
            .registered_providers()
            .into_iter()
            .filter_map(|id| self.provider_status(id))
            .collect();

        HealthReport {
            generated_at: UtcDateTime::now(),
            providers,
            cache: self.cache().stats().await,
        }
    }

    /// Drop cached entries in the given scope; returns how many went.
    pub async fn clear_cache(&self, scope: CacheScope) -> usize {
        match scope {
            CacheScope::All => self.cache().clear().await,
            CacheScope::Symbol(symbol) => {
                let mut removed = 0;
                for kind in QueryKind::ALL {
                    let prefix = Query::symbol_prefix(kind, &symbol);
                    removed += self.cache().invalidate_prefix(&prefix).await;
                }
                removed
            }
            CacheScope::SymbolKind(symbol, kind) => {
                let prefix = Query::symbol_prefix(kind, &symbol);
                self.cache().invalidate_prefix(&prefix).await
            }
        }
    }

    /// Pre-fill the cache for a set of symbols and kinds using canonical
    /// warming queries (trailing month of prices, four TTM periods, ten
    /// most recent news items and trades).
    ///
    /// Failures are collected, not propagated: a warming sweep is best
    /// effort and one cold provider must not abort the rest.
    pub async fn warm(&self, symbols: &[Symbol], kinds: &[QueryKind]) -> WarmReport {
        let mut report = WarmReport::default();
        let today = UtcDateTime::now().date();

        for symbol in symbols {
            for kind in kinds {
                report.requested += 1;
                let query = match warming_query(symbol.clone(), *kind, today) {
                    Ok(query) => query,
                    Err(error) => {
                        report.failures.push(WarmFailure {
                            symbol: symbol.clone(),
                            kind: *kind,
                            error: error.to_string(),
                        });
                        continue;
                    }
                };

                match self.execute(&query).await {
                    Ok(_) => report.succeeded += 1,
                    Err(error) => {
                        tracing::debug!(
                            symbol = %symbol,
                            kind = %kind,
                            error = %error,
                            "warming query failed"
                        );
                        report.failures.push(WarmFailure {
                            symbol: symbol.clone(),
                            kind: *kind,
                            error: error.to_string(),
                        });
                    }
                }
            }
        }

        report
    }
}

fn warming_query(
    symbol: Symbol,
    kind: QueryKind,
    today: time::Date,
) -> Result<Query, ValidationError> {
    match kind {
        QueryKind::Prices => {
            let start = today - Duration::days(30);
            Ok(Query::Prices(PricesQuery::new(
                symbol,
                DateRange::new(start, today)?,
            )))
        }
        QueryKind::FinancialMetrics => Ok(Query::FinancialMetrics(MetricsQuery::new(
            symbol,
            today,
            Period::Ttm,
            4,
        )?)),
        QueryKind::CompanyFacts => Ok(Query::CompanyFacts(FactsQuery::new(symbol))),
        QueryKind::News => Ok(Query::News(NewsQuery::new(symbol, today, None, 10)?)),
        QueryKind::InsiderTrades => Ok(Query::InsiderTrades(InsiderTradesQuery::new(
            symbol, today, None, 10,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouterBuilder;
    use crate::ProviderId;

    fn symbol(value: &str) -> Symbol {
        Symbol::parse(value).expect("valid symbol")
    }

    #[tokio::test]
    async fn health_report_covers_all_registered_providers() {
        let router = RouterBuilder::offline().build();
        let report = router.health_report().await;

        assert_eq!(report.providers.len(), 3);
        assert!(report
            .providers
            .iter()
            .any(|status| status.provider == ProviderId::Yahoo));
        assert_eq!(report.cache.entries, 0);
    }

    #[tokio::test]
    async fn warming_fills_the_cache() {
        let router = RouterBuilder::offline().build();
        let report = router
            .warm(
                &[symbol("AAPL"), symbol("MSFT")],
                &[QueryKind::Prices, QueryKind::CompanyFacts],
            )
            .await;

        assert_eq!(report.requested, 4);
        assert_eq!(report.succeeded, 4);
        assert!(report.failures.is_empty());
        assert_eq!(router.cache().len().await, 4);
    }

    #[tokio::test]
    async fn warming_collects_failures_without_aborting() {
        // News has no configured provider without a credential.
        let router = RouterBuilder::offline().build();
        let report = router
            .warm(&[symbol("AAPL")], &[QueryKind::Prices, QueryKind::News])
            .await;

        assert_eq!(report.requested, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, QueryKind::News);
    }

    #[tokio::test]
    async fn scoped_clear_only_touches_the_target_symbol() {
        let router = RouterBuilder::offline().build();
        router
            .warm(
                &[symbol("AAPL"), symbol("MSFT")],
                &[QueryKind::CompanyFacts],
            )
            .await;
        assert_eq!(router.cache().len().await, 2);

        let removed = router
            .clear_cache(CacheScope::Symbol(symbol("AAPL")))
            .await;
        assert_eq!(removed, 1);
        assert_eq!(router.cache().len().await, 1);

        let removed = router.clear_cache(CacheScope::All).await;
        assert_eq!(removed, 1);
    }
}
