//! Router configuration: fallback priorities, per-provider tuning, and
//! credential discovery.
//!
//! Priority defaults put free keyless sources first and the paid backstop
//! last, so a healthy free tier never spends credits. A provider whose
//! credential is missing is dropped from every chain at plan time rather
//! than failing at call time.
//!
//! # Environment Variables
//!
//! | Setting | Primary Env Var | Fallback Env Var |
//! |---------|-----------------|------------------|
//! | FinancialDatasets key | `TICKERGATE_FINANCIAL_DATASETS_API_KEY` | `FINANCIAL_DATASETS_API_KEY` |
//! | SEC EDGAR user agent | `TICKERGATE_SEC_USER_AGENT` | (built-in default) |
//! | Cache entry budget | `TICKERGATE_CACHE_MAX_ENTRIES` | (4096) |

use std::env;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::circuit_breaker::BreakerConfig;
use crate::throttle::RatePolicy;
use crate::{ProviderId, QueryKind};

/// Fallback order per query kind, best candidate first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityTable {
    pub prices: Vec<ProviderId>,
    pub financial_metrics: Vec<ProviderId>,
    pub company_facts: Vec<ProviderId>,
    pub news: Vec<ProviderId>,
    pub insider_trades: Vec<ProviderId>,
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self {
            prices: vec![
                ProviderId::Yahoo,
                ProviderId::Stooq,
                ProviderId::FinancialDatasets,
            ],
            financial_metrics: vec![ProviderId::Yahoo, ProviderId::FinancialDatasets],
            company_facts: vec![
                ProviderId::Yahoo,
                ProviderId::SecEdgar,
                ProviderId::FinancialDatasets,
            ],
            news: vec![ProviderId::FinancialDatasets],
            insider_trades: vec![ProviderId::FinancialDatasets],
        }
    }
}

impl PriorityTable {
    pub fn for_kind(&self, kind: QueryKind) -> &[ProviderId] {
        match kind {
            QueryKind::Prices => &self.prices,
            QueryKind::FinancialMetrics => &self.financial_metrics,
            QueryKind::CompanyFacts => &self.company_facts,
            QueryKind::News => &self.news,
            QueryKind::InsiderTrades => &self.insider_trades,
        }
    }

    pub fn set_for_kind(&mut self, kind: QueryKind, chain: Vec<ProviderId>) {
        match kind {
            QueryKind::Prices => self.prices = chain,
            QueryKind::FinancialMetrics => self.financial_metrics = chain,
            QueryKind::CompanyFacts => self.company_facts = chain,
            QueryKind::News => self.news = chain,
            QueryKind::InsiderTrades => self.insider_trades = chain,
        }
    }
}

/// Per-provider tuning applied at router assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Per-attempt deadline enforced by the router.
    pub timeout: Duration,
    pub breaker: BreakerConfig,
    pub rate_policy: RatePolicy,
}

impl ProviderSettings {
    pub fn defaults_for(provider: ProviderId) -> Self {
        let breaker = BreakerConfig {
            failure_threshold: 3,
            failure_window: Duration::from_secs(120),
            cool_down: Duration::from_secs(300),
        };

        match provider {
            ProviderId::Yahoo => Self {
                timeout: Duration::from_secs(5),
                breaker,
                rate_policy: RatePolicy::new(Duration::from_secs(60), 120),
            },
            ProviderId::Stooq => Self {
                timeout: Duration::from_secs(5),
                breaker,
                rate_policy: RatePolicy::new(Duration::from_secs(60), 60),
            },
            ProviderId::FinancialDatasets => Self {
                timeout: Duration::from_secs(8),
                breaker,
                rate_policy: RatePolicy::new(Duration::from_secs(60), 60),
            },
            ProviderId::SecEdgar => Self {
                timeout: Duration::from_secs(5),
                breaker,
                rate_policy: RatePolicy::new(Duration::from_secs(1), 10),
            },
        }
    }
}

/// Complete router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub priorities: PriorityTable,
    pub cache: CacheConfig,
    pub financial_datasets_api_key: Option<String>,
    pub sec_user_agent: Option<String>,
    pub provider_overrides: Vec<(ProviderId, ProviderSettings)>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            priorities: PriorityTable::default(),
            cache: CacheConfig::default(),
            financial_datasets_api_key: None,
            sec_user_agent: None,
            provider_overrides: Vec::new(),
        }
    }
}

impl RouterConfig {
    /// Read credentials and tuning from the environment.
    pub fn from_env() -> Self {
        let mut config = Self {
            financial_datasets_api_key: env::var("TICKERGATE_FINANCIAL_DATASETS_API_KEY")
                .or_else(|_| env::var("FINANCIAL_DATASETS_API_KEY"))
                .ok()
                .filter(|key| !key.trim().is_empty()),
            sec_user_agent: env::var("TICKERGATE_SEC_USER_AGENT")
                .ok()
                .filter(|agent| !agent.trim().is_empty()),
            ..Self::default()
        };

        if let Some(max_entries) = env::var("TICKERGATE_CACHE_MAX_ENTRIES")
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
        {
            config.cache.max_entries = max_entries;
        }

        config
    }

    pub fn with_financial_datasets_key(mut self, key: impl Into<String>) -> Self {
        self.financial_datasets_api_key = Some(key.into());
        self
    }

    pub fn with_provider_settings(
        mut self,
        provider: ProviderId,
        settings: ProviderSettings,
    ) -> Self {
        self.provider_overrides.retain(|(id, _)| *id != provider);
        self.provider_overrides.push((provider, settings));
        self
    }

    pub fn settings_for(&self, provider: ProviderId) -> ProviderSettings {
        self.provider_overrides
            .iter()
            .find(|(id, _)| *id == provider)
            .map(|(_, settings)| *settings)
            .unwrap_or_else(|| ProviderSettings::defaults_for(provider))
    }

    /// Whether a provider's credential requirements are satisfied.
    pub fn is_configured(&self, provider: ProviderId) -> bool {
        match provider {
            ProviderId::Yahoo | ProviderId::Stooq | ProviderId::SecEdgar => true,
            ProviderId::FinancialDatasets => self.financial_datasets_api_key.is_some(),
        }
    }

    /// Priority chain for a kind with unconfigured providers removed.
    pub fn configured_chain(&self, kind: QueryKind) -> Vec<ProviderId> {
        self.priorities
            .for_kind(kind)
            .iter()
            .copied()
            .filter(|provider| self.is_configured(*provider))
            .collect()
    }
}
