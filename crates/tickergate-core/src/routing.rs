//! Priority-ordered fallback routing.
//!
//! One query walks its configured provider chain strictly in order: cache
//! first, then each candidate gated by its circuit breaker, each attempt
//! bounded by a per-provider deadline. The first success fills the cache
//! and wins; there is no parallel fan-out, so a healthy primary provider
//! is the only one that ever sees traffic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::QueryCache;
use crate::circuit_breaker::{BreakerSnapshot, CallPermit, CircuitBreaker};
use crate::clock::{Clock, SystemClock};
use crate::config::RouterConfig;
use crate::data_source::{
    CapabilitySet, DataProvider, FetchError, FetchErrorKind, FetchFuture, RecordSet,
};
use crate::http_client::{HttpClient, NoopHttpClient, ReqwestHttpClient};
use crate::query::{
    FactsQuery, InsiderTradesQuery, MetricsQuery, NewsQuery, PricesQuery, Query, QueryKind,
};
use crate::adapters::{FinancialDatasetsAdapter, SecEdgarAdapter, StooqAdapter, YahooAdapter};
use crate::{CompanyFacts, FinancialMetrics, InsiderTrade, NewsArticle, PriceBar, ProviderId};

/// Why a candidate did not produce the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AttemptOutcome {
    /// Breaker rejected the call; the provider was never contacted.
    SkippedOpenBreaker,
    /// The provider was contacted and failed.
    Failed { kind: FetchErrorKind },
}

/// One entry of the fallback trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub provider: ProviderId,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
    pub detail: String,
}

impl Attempt {
    fn skipped(provider: ProviderId) -> Self {
        Self {
            provider,
            outcome: AttemptOutcome::SkippedOpenBreaker,
            detail: String::from("circuit breaker is open"),
        }
    }

    fn failed(provider: ProviderId, error: &FetchError) -> Self {
        Self {
            provider,
            outcome: AttemptOutcome::Failed { kind: error.kind() },
            detail: error.message().to_owned(),
        }
    }
}

/// Terminal routing failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("no provider is configured to serve {kind} queries")]
    NoProviderConfigured { kind: QueryKind },
    #[error("all providers exhausted for {kind} query ({} attempted)", attempts.len())]
    AllProvidersExhausted {
        kind: QueryKind,
        attempts: Vec<Attempt>,
    },
}

impl RouteError {
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            Self::NoProviderConfigured { .. } => &[],
            Self::AllProvidersExhausted { attempts, .. } => attempts,
        }
    }
}

/// Successful routed answer plus how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed<T> {
    pub data: T,
    pub source: ProviderId,
    pub cache_hit: bool,
    /// Candidates consumed before the winning one, in chain order.
    pub attempts: Vec<Attempt>,
    pub latency_ms: u64,
}

impl<T> Routed<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Routed<U> {
        Routed {
            data: f(self.data),
            source: self.source,
            cache_hit: self.cache_hit,
            attempts: self.attempts,
            latency_ms: self.latency_ms,
        }
    }
}

/// Registry entry pairing an adapter with its health gate.
struct ProviderHandle {
    adapter: Arc<dyn DataProvider>,
    breaker: Arc<CircuitBreaker>,
    timeout: Duration,
}

/// Provider entry for the health surface.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub provider: ProviderId,
    pub capabilities: CapabilitySet,
    pub breaker: BreakerSnapshot,
}

/// The resilient access layer: cache, breakers, and fallback chains over a
/// set of provider adapters.
pub struct DataRouter {
    config: RouterConfig,
    cache: QueryCache,
    clock: Arc<dyn Clock>,
    providers: HashMap<ProviderId, ProviderHandle>,
}

impl DataRouter {
    pub fn new(
        config: RouterConfig,
        adapters: Vec<Arc<dyn DataProvider>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = QueryCache::new(config.cache, Arc::clone(&clock));
        let providers = adapters
            .into_iter()
            .map(|adapter| {
                let id = adapter.id();
                let settings = config.settings_for(id);
                let handle = ProviderHandle {
                    adapter,
                    breaker: Arc::new(CircuitBreaker::new(settings.breaker, Arc::clone(&clock))),
                    timeout: settings.timeout,
                };
                (id, handle)
            })
            .collect();

        Self {
            config,
            cache,
            clock,
            providers,
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn registered_providers(&self) -> Vec<ProviderId> {
        let mut ids: Vec<ProviderId> = self.providers.keys().copied().collect();
        ids.sort_by_key(|id| id.as_str());
        ids
    }

    pub fn provider_status(&self, provider: ProviderId) -> Option<ProviderStatus> {
        let handle = self.providers.get(&provider)?;
        Some(ProviderStatus {
            provider,
            capabilities: handle.adapter.capabilities(),
            breaker: handle.breaker.snapshot(),
        })
    }

    /// Forget a provider's breaker history (operator reset).
    pub fn reset_provider(&self, provider: ProviderId) -> bool {
        match self.providers.get(&provider) {
            Some(handle) => {
                handle.breaker.reset();
                tracing::info!(provider = %provider, "circuit breaker reset");
                true
            }
            None => false,
        }
    }

    pub async fn prices(&self, query: &PricesQuery) -> Result<Routed<Vec<PriceBar>>, RouteError> {
        let routed = self.execute(&Query::Prices(query.clone())).await?;
        Ok(routed.map(|records| match records {
            RecordSet::Prices(bars) => bars,
            _ => unreachable!("prices cache key resolves to price records"),
        }))
    }

    pub async fn financial_metrics(
        &self,
        query: &MetricsQuery,
    ) -> Result<Routed<Vec<FinancialMetrics>>, RouteError> {
        let routed = self
            .execute(&Query::FinancialMetrics(query.clone()))
            .await?;
        Ok(routed.map(|records| match records {
            RecordSet::FinancialMetrics(metrics) => metrics,
            _ => unreachable!("metrics cache key resolves to metrics records"),
        }))
    }

    pub async fn company_facts(
        &self,
        query: &FactsQuery,
    ) -> Result<Routed<CompanyFacts>, RouteError> {
        let routed = self.execute(&Query::CompanyFacts(query.clone())).await?;
        Ok(routed.map(|records| match records {
            RecordSet::CompanyFacts(facts) => facts,
            _ => unreachable!("facts cache key resolves to a facts record"),
        }))
    }

    pub async fn news(&self, query: &NewsQuery) -> Result<Routed<Vec<NewsArticle>>, RouteError> {
        let routed = self.execute(&Query::News(query.clone())).await?;
        Ok(routed.map(|records| match records {
            RecordSet::News(articles) => articles,
            _ => unreachable!("news cache key resolves to news records"),
        }))
    }

    pub async fn insider_trades(
        &self,
        query: &InsiderTradesQuery,
    ) -> Result<Routed<Vec<InsiderTrade>>, RouteError> {
        let routed = self.execute(&Query::InsiderTrades(query.clone())).await?;
        Ok(routed.map(|records| match records {
            RecordSet::InsiderTrades(trades) => trades,
            _ => unreachable!("trades cache key resolves to trade records"),
        }))
    }

    /// Resolve any query through cache, breakers, and the fallback chain.
    pub async fn execute(&self, query: &Query) -> Result<Routed<RecordSet>, RouteError> {
        let started = self.clock.now();
        let kind = query.kind();
        let key = query.cache_key();

        if let Some((records, source)) = self.cache.get(&key).await {
            tracing::debug!(key = %key, source = %source, "cache hit");
            return Ok(Routed {
                data: records,
                source,
                cache_hit: true,
                attempts: Vec::new(),
                latency_ms: self.elapsed_ms(started),
            });
        }

        let chain: Vec<ProviderId> = self
            .config
            .configured_chain(kind)
            .into_iter()
            .filter(|provider| {
                self.providers
                    .get(provider)
                    .is_some_and(|handle| handle.adapter.capabilities().supports(kind))
            })
            .collect();

        if chain.is_empty() {
            return Err(RouteError::NoProviderConfigured { kind });
        }

        let mut attempts = Vec::new();
        for provider in chain {
            let handle = self
                .providers
                .get(&provider)
                .expect("chain is filtered to registered providers");

            let permit = handle.breaker.acquire();
            if permit == CallPermit::Rejected {
                tracing::debug!(provider = %provider, "skipping provider with open breaker");
                attempts.push(Attempt::skipped(provider));
                continue;
            }

            // If this future is dropped mid-call, the guard hands the trial
            // slot back so the breaker cannot wedge in HalfOpen.
            let mut guard = TrialGuard::new(&handle.breaker, permit);
            let outcome = self
                .invoke_with_deadline(handle, query, provider)
                .await;
            guard.disarm();

            match outcome {
                Ok(records) => {
                    handle.breaker.record_success();
                    let ttl = self.cache.ttl_for(kind);
                    self.cache
                        .put(key.clone(), records.clone(), provider, ttl)
                        .await;
                    tracing::info!(
                        provider = %provider,
                        kind = %kind,
                        records = records.len(),
                        fallbacks = attempts.len(),
                        "query resolved"
                    );
                    return Ok(Routed {
                        data: records,
                        source: provider,
                        cache_hit: false,
                        attempts,
                        latency_ms: self.elapsed_ms(started),
                    });
                }
                Err(error) => {
                    if error.counts_toward_breaker() {
                        if error.kind() == FetchErrorKind::RateLimited {
                            handle.breaker.record_rate_limited(error.retry_after());
                        } else {
                            handle.breaker.record_failure(None);
                        }
                    } else if permit == CallPermit::Trial {
                        // A responsive miss proves the upstream recovered,
                        // which is what the trial was probing for.
                        handle.breaker.record_success();
                    }
                    tracing::warn!(
                        provider = %provider,
                        kind = %kind,
                        error_kind = %error.kind(),
                        "provider attempt failed"
                    );
                    attempts.push(Attempt::failed(provider, &error));
                }
            }
        }

        Err(RouteError::AllProvidersExhausted { kind, attempts })
    }

    async fn invoke_with_deadline(
        &self,
        handle: &ProviderHandle,
        query: &Query,
        provider: ProviderId,
    ) -> Result<RecordSet, FetchError> {
        let fetch = invoke(handle.adapter.as_ref(), query);
        match tokio::time::timeout(handle.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::timeout(format!(
                "{provider}: attempt exceeded {}ms deadline",
                handle.timeout.as_millis()
            ))),
        }
    }

    fn elapsed_ms(&self, started: std::time::Instant) -> u64 {
        let elapsed = self.clock.now().saturating_duration_since(started);
        elapsed.as_millis().min(u128::from(u64::MAX)) as u64
    }
}

fn invoke<'a>(adapter: &'a dyn DataProvider, query: &'a Query) -> FetchFuture<'a, RecordSet> {
    match query {
        Query::Prices(query) => Box::pin(async move {
            adapter.prices(query).await.map(RecordSet::Prices)
        }),
        Query::FinancialMetrics(query) => Box::pin(async move {
            adapter
                .financial_metrics(query)
                .await
                .map(RecordSet::FinancialMetrics)
        }),
        Query::CompanyFacts(query) => Box::pin(async move {
            adapter
                .company_facts(query)
                .await
                .map(RecordSet::CompanyFacts)
        }),
        Query::News(query) => {
            Box::pin(async move { adapter.news(query).await.map(RecordSet::News) })
        }
        Query::InsiderTrades(query) => Box::pin(async move {
            adapter
                .insider_trades(query)
                .await
                .map(RecordSet::InsiderTrades)
        }),
    }
}

/// Releases a claimed trial slot if the attempt never reports back.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl<'a> TrialGuard<'a> {
    fn new(breaker: &'a CircuitBreaker, permit: CallPermit) -> Self {
        Self {
            breaker,
            armed: permit == CallPermit::Trial,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon_trial();
        }
    }
}

/// Assembles a [`DataRouter`] from configuration, wiring each adapter to
/// the shared transport.
///
/// Offline mode keeps every adapter on the no-op transport so the whole
/// stack runs deterministically without credentials or network access.
pub struct RouterBuilder {
    config: RouterConfig,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
}

impl RouterBuilder {
    /// Deterministic offline wiring.
    pub fn offline() -> Self {
        Self {
            config: RouterConfig::default(),
            http_client: Arc::new(NoopHttpClient),
            clock: Arc::new(SystemClock),
        }
    }

    /// Production wiring: real transport, credentials from the environment.
    pub fn from_env() -> Self {
        Self {
            config: RouterConfig::from_env(),
            http_client: Arc::new(ReqwestHttpClient::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> DataRouter {
        let mut adapters: Vec<Arc<dyn DataProvider>> = vec![
            Arc::new(
                YahooAdapter::new(Arc::clone(&self.http_client))
                    .with_rate_policy(self.config.settings_for(ProviderId::Yahoo).rate_policy),
            ),
            Arc::new(
                StooqAdapter::new(Arc::clone(&self.http_client))
                    .with_rate_policy(self.config.settings_for(ProviderId::Stooq).rate_policy),
            ),
        ];

        let mut sec_edgar = SecEdgarAdapter::new(Arc::clone(&self.http_client))
            .with_rate_policy(self.config.settings_for(ProviderId::SecEdgar).rate_policy);
        if let Some(agent) = &self.config.sec_user_agent {
            sec_edgar = sec_edgar.with_user_agent(agent);
        }
        adapters.push(Arc::new(sec_edgar));

        if let Some(key) = &self.config.financial_datasets_api_key {
            adapters.push(Arc::new(
                FinancialDatasetsAdapter::new(Arc::clone(&self.http_client), key).with_rate_policy(
                    self.config
                        .settings_for(ProviderId::FinancialDatasets)
                        .rate_policy,
                ),
            ));
        }

        DataRouter::new(self.config, adapters, self.clock)
    }
}
