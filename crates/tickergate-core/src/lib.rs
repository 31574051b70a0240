//! Core engine for tickergate.
//!
//! This crate contains:
//! - Canonical domain models and validation
//! - Typed queries with canonical cache keys
//! - The bounded TTL/LRU result cache
//! - Per-provider circuit breakers and rate gates
//! - Provider adapters and priority-ordered fallback routing
//! - The operational health surface and the legacy string facade

pub mod adapters;
pub mod cache;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod health;
pub mod http_client;
pub mod legacy;
pub mod provider;
pub mod query;
pub mod routing;
pub mod throttle;

pub use adapters::{FinancialDatasetsAdapter, SecEdgarAdapter, StooqAdapter, YahooAdapter};
pub use cache::{CacheConfig, CacheStats, QueryCache, TtlTable};
pub use circuit_breaker::{
    BreakerConfig, BreakerSnapshot, BreakerState, CallPermit, CircuitBreaker,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PriorityTable, ProviderSettings, RouterConfig};
pub use data_source::{
    CapabilitySet, DataProvider, FetchError, FetchErrorKind, FetchFuture, RecordSet,
};
pub use domain::{
    parse_date, CompanyFacts, DateRange, FinancialMetrics, InsiderTrade, NewsArticle, Period,
    PriceBar, Symbol, UtcDateTime,
};
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta};
pub use error::{CoreError, ValidationError};
pub use health::{CacheScope, HealthReport, WarmFailure, WarmReport};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient,
};
pub use legacy::LegacyApi;
pub use provider::ProviderId;
pub use query::{
    FactsQuery, InsiderTradesQuery, MetricsQuery, NewsQuery, PricesQuery, Query, QueryKind,
};
pub use routing::{
    Attempt, AttemptOutcome, DataRouter, ProviderStatus, RouteError, Routed, RouterBuilder,
};
pub use throttle::{RateGate, RatePolicy};
