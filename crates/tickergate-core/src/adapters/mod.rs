//! One adapter per upstream source.
//!
//! Each adapter owns its wire format: it builds the upstream request,
//! classifies the response status into the shared failure taxonomy, and
//! maps the raw payload into normalized records. With the offline
//! transport ([`crate::NoopHttpClient`]) adapters synthesize deterministic
//! payloads seeded by the symbol, so the full routing stack runs without
//! credentials or network access.

mod financialdatasets;
mod sec_edgar;
mod stooq;
mod yahoo;

pub use financialdatasets::FinancialDatasetsAdapter;
pub use sec_edgar::SecEdgarAdapter;
pub use stooq::StooqAdapter;
pub use yahoo::YahooAdapter;

use std::time::Duration;

use crate::data_source::FetchError;
use crate::http_client::{HttpError, HttpResponse};
use crate::{ProviderId, Symbol, ValidationError};

/// Map a transport error into the adapter failure taxonomy.
pub(crate) fn transport_to_error(provider: ProviderId, error: HttpError) -> FetchError {
    if error.is_timeout() {
        FetchError::timeout(format!("{provider}: {}", error.message()))
    } else {
        FetchError::malformed(format!("{provider}: {}", error.message()))
    }
}

/// Map a non-success HTTP status into the adapter failure taxonomy.
pub(crate) fn classify_status(provider: ProviderId, response: &HttpResponse) -> Option<FetchError> {
    match response.status {
        status if (200..300).contains(&status) => None,
        404 => Some(FetchError::not_found(format!(
            "{provider}: upstream returned 404"
        ))),
        401 | 403 => Some(FetchError::unauthorized(format!(
            "{provider}: upstream refused credentials ({})",
            response.status
        ))),
        408 | 504 => Some(FetchError::timeout(format!(
            "{provider}: upstream timed out ({})",
            response.status
        ))),
        429 => Some(FetchError::rate_limited(
            format!("{provider}: upstream rate limit"),
            response.retry_after_secs.map(Duration::from_secs),
        )),
        status => Some(FetchError::malformed(format!(
            "{provider}: unexpected status {status}"
        ))),
    }
}

/// Whether the transport handed back a placeholder body (offline mode).
pub(crate) fn is_placeholder_body(body: &str) -> bool {
    let trimmed = body.trim();
    trimmed.is_empty() || trimmed == "{}"
}

/// Deterministic per-symbol seed used by offline payload synthesis.
pub(crate) fn symbol_seed(symbol: &Symbol) -> u64 {
    symbol.as_str().bytes().fold(0_u64, |acc, byte| {
        acc.wrapping_mul(33).wrapping_add(u64::from(byte))
    })
}

pub(crate) fn validation_to_error(provider: ProviderId, error: ValidationError) -> FetchError {
    FetchError::malformed(format!("{provider}: invalid upstream record: {error}"))
}
