//! Machine-readable response envelope for CLI and service surfaces.

use serde::{Deserialize, Serialize};

use crate::routing::{Attempt, AttemptOutcome, RouteError, Routed};
use crate::{ProviderId, UtcDateTime};

/// Standard envelope wrapping routed data or a terminal failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub meta: EnvelopeMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<EnvelopeError>,
}

/// Metadata attached to every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    pub request_id: String,
    pub generated_at: UtcDateTime,
    /// Provider that produced the data, absent on terminal failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ProviderId>,
    /// Every provider consulted, in attempt order, winner last.
    pub source_chain: Vec<ProviderId>,
    pub cache_hit: bool,
    pub latency_ms: u64,
}

/// One failed or skipped provider attempt, in envelope form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ProviderId>,
}

impl<T> Envelope<T> {
    pub fn from_routed(request_id: impl Into<String>, routed: Routed<T>) -> Self {
        let mut source_chain: Vec<ProviderId> = routed
            .attempts
            .iter()
            .map(|attempt| attempt.provider)
            .collect();
        source_chain.push(routed.source);

        Self {
            meta: EnvelopeMeta {
                request_id: request_id.into(),
                generated_at: UtcDateTime::now(),
                source: Some(routed.source),
                source_chain,
                cache_hit: routed.cache_hit,
                latency_ms: routed.latency_ms,
            },
            data: Some(routed.data),
            errors: routed.attempts.iter().map(attempt_to_error).collect(),
        }
    }

    pub fn from_route_error(request_id: impl Into<String>, error: &RouteError) -> Self {
        let attempts = error.attempts();
        let mut errors: Vec<EnvelopeError> = attempts.iter().map(attempt_to_error).collect();
        errors.push(EnvelopeError {
            code: match error {
                RouteError::NoProviderConfigured { .. } => String::from("route.no_provider"),
                RouteError::AllProvidersExhausted { .. } => String::from("route.exhausted"),
            },
            message: error.to_string(),
            source: None,
        });

        Self {
            meta: EnvelopeMeta {
                request_id: request_id.into(),
                generated_at: UtcDateTime::now(),
                source: None,
                source_chain: attempts.iter().map(|attempt| attempt.provider).collect(),
                cache_hit: false,
                latency_ms: 0,
            },
            data: None,
            errors,
        }
    }

    pub fn is_success(&self) -> bool {
        self.data.is_some()
    }
}

fn attempt_to_error(attempt: &Attempt) -> EnvelopeError {
    let code = match &attempt.outcome {
        AttemptOutcome::SkippedOpenBreaker => String::from("provider.breaker_open"),
        AttemptOutcome::Failed { kind } => format!("provider.{kind}"),
    };

    EnvelopeError {
        code,
        message: attempt.detail.clone(),
        source: Some(attempt.provider),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::FetchError;
    use crate::QueryKind;

    fn failed_attempt() -> Attempt {
        let error = FetchError::timeout("yahoo: deadline exceeded");
        Attempt {
            provider: ProviderId::Yahoo,
            outcome: AttemptOutcome::Failed { kind: error.kind() },
            detail: error.message().to_owned(),
        }
    }

    #[test]
    fn success_chain_ends_with_the_winner() {
        let routed = Routed {
            data: vec![1, 2, 3],
            source: ProviderId::Stooq,
            cache_hit: false,
            attempts: vec![failed_attempt()],
            latency_ms: 12,
        };

        let envelope = Envelope::from_routed("req-123", routed);
        assert!(envelope.is_success());
        assert_eq!(
            envelope.meta.source_chain,
            vec![ProviderId::Yahoo, ProviderId::Stooq]
        );
        assert_eq!(envelope.errors.len(), 1);
        assert_eq!(envelope.errors[0].code, "provider.timeout");
    }

    #[test]
    fn terminal_failure_keeps_the_attempt_trail() {
        let error = RouteError::AllProvidersExhausted {
            kind: QueryKind::Prices,
            attempts: vec![failed_attempt()],
        };

        let envelope = Envelope::<Vec<u8>>::from_route_error("req-456", &error);
        assert!(!envelope.is_success());
        assert_eq!(envelope.errors.len(), 2);
        assert_eq!(envelope.errors.last().map(|e| e.code.as_str()), Some("route.exhausted"));
    }

    #[test]
    fn no_provider_failure_has_an_empty_chain() {
        let error = RouteError::NoProviderConfigured {
            kind: QueryKind::News,
        };
        let envelope = Envelope::<Vec<u8>>::from_route_error("req-789", &error);
        assert!(envelope.meta.source_chain.is_empty());
        assert_eq!(envelope.errors[0].code, "route.no_provider");
    }
}
