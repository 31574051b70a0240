//! Router-level cache behavior: repeat queries served from cache, TTL
//! expiry per kind, and scoped invalidation.

use std::sync::Arc;
use std::time::Duration;

use tickergate_core::{CacheScope, FactsQuery};
use tickergate_tests::*;

fn default_breaker() -> BreakerConfig {
    BreakerConfig::default()
}

fn single_provider_router(
    provider: &Arc<ScriptedProvider>,
    clock: &ManualClock,
) -> DataRouter {
    router_with(
        chain_config(&[ProviderId::Yahoo], default_breaker()),
        vec![Arc::clone(provider)],
        clock,
    )
}

fn facts_record(sym: &str) -> RecordSet {
    RecordSet::CompanyFacts(
        CompanyFacts::new(symbol(sym), "Test Co", None, None, None, None, None)
            .expect("valid facts"),
    )
}

#[tokio::test]
async fn repeat_query_is_served_from_cache() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    provider.enqueue_prices(sample_bars());

    let clock = ManualClock::new();
    let router = single_provider_router(&provider, &clock);
    let query = prices_query("AAPL");

    let first = router.prices(&query).await.expect("resolves");
    assert!(!first.cache_hit);

    let second = router.prices(&query).await.expect("resolves");
    assert!(second.cache_hit);
    assert_eq!(second.source, ProviderId::Yahoo);
    assert_eq!(second.data, first.data);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn expired_prices_entry_triggers_a_refetch() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    provider.enqueue_prices(sample_bars());
    provider.enqueue_prices(sample_bars());

    let clock = ManualClock::new();
    let router = single_provider_router(&provider, &clock);
    let query = prices_query("AAPL");

    router.prices(&query).await.expect("resolves");

    // Past the 300s prices TTL.
    clock.advance(Duration::from_secs(301));
    let refetched = router.prices(&query).await.expect("resolves");
    assert!(!refetched.cache_hit);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn company_facts_outlive_the_prices_ttl() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    provider.enqueue_prices(sample_bars());
    provider.enqueue(Ok(facts_record("AAPL")));

    let clock = ManualClock::new();
    let router = single_provider_router(&provider, &clock);

    router.prices(&prices_query("AAPL")).await.expect("resolves");
    router
        .company_facts(&FactsQuery::new(symbol("AAPL")))
        .await
        .expect("resolves");

    // Prices are stale after an hour; the facts entry is still fresh.
    clock.advance(Duration::from_secs(3_600));

    provider.enqueue_prices(sample_bars());
    let prices = router.prices(&prices_query("AAPL")).await.expect("resolves");
    assert!(!prices.cache_hit);

    let facts = router
        .company_facts(&FactsQuery::new(symbol("AAPL")))
        .await
        .expect("resolves");
    assert!(facts.cache_hit);
}

#[tokio::test]
async fn symbol_kind_scope_clears_only_that_slice() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    provider.enqueue_prices(sample_bars());
    provider.enqueue(Ok(facts_record("AAPL")));

    let clock = ManualClock::new();
    let router = single_provider_router(&provider, &clock);

    router.prices(&prices_query("AAPL")).await.expect("resolves");
    router
        .company_facts(&FactsQuery::new(symbol("AAPL")))
        .await
        .expect("resolves");
    assert_eq!(router.cache().len().await, 2);

    let removed = router
        .clear_cache(CacheScope::SymbolKind(symbol("AAPL"), QueryKind::Prices))
        .await;
    assert_eq!(removed, 1);

    // Facts entry survived the scoped clear.
    let facts = router
        .company_facts(&FactsQuery::new(symbol("AAPL")))
        .await
        .expect("resolves");
    assert!(facts.cache_hit);
}

#[tokio::test]
async fn symbol_scope_clears_every_kind_but_only_that_symbol() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    provider.enqueue_prices(sample_bars());
    provider.enqueue(Ok(facts_record("AAPL")));
    provider.enqueue_prices(sample_bars());

    let clock = ManualClock::new();
    let router = single_provider_router(&provider, &clock);

    router.prices(&prices_query("AAPL")).await.expect("resolves");
    router
        .company_facts(&FactsQuery::new(symbol("AAPL")))
        .await
        .expect("resolves");
    router.prices(&prices_query("MSFT")).await.expect("resolves");
    assert_eq!(router.cache().len().await, 3);

    let removed = router.clear_cache(CacheScope::Symbol(symbol("AAPL"))).await;
    assert_eq!(removed, 2);

    let msft = router.prices(&prices_query("MSFT")).await.expect("resolves");
    assert!(msft.cache_hit);
}

#[tokio::test]
async fn all_scope_empties_the_cache() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    provider.enqueue_prices(sample_bars());
    provider.enqueue_prices(sample_bars());

    let clock = ManualClock::new();
    let router = single_provider_router(&provider, &clock);

    router.prices(&prices_query("AAPL")).await.expect("resolves");
    router.prices(&prices_query("MSFT")).await.expect("resolves");

    let removed = router.clear_cache(CacheScope::All).await;
    assert_eq!(removed, 2);
    assert!(router.cache().is_empty().await);
}

#[tokio::test]
async fn failures_are_never_cached() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    provider.enqueue_failure(FetchError::timeout("upstream stalled"));
    provider.enqueue_prices(sample_bars());

    let clock = ManualClock::new();
    let router = single_provider_router(&provider, &clock);
    let query = prices_query("AAPL");

    router.prices(&query).await.expect_err("scripted failure");
    assert!(router.cache().is_empty().await);

    // The next call goes back to the provider and succeeds.
    let routed = router.prices(&query).await.expect("resolves");
    assert!(!routed.cache_hit);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn stats_reflect_router_traffic() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    provider.enqueue_prices(sample_bars());

    let clock = ManualClock::new();
    let router = single_provider_router(&provider, &clock);
    let query = prices_query("AAPL");

    router.prices(&query).await.expect("resolves");
    router.prices(&query).await.expect("resolves");
    router.prices(&query).await.expect("resolves");

    let stats = router.cache().stats().await;
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
}
