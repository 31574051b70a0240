use serde_json::Value;
use tickergate_core::{DataRouter, Envelope, QueryKind};

use super::local_envelope;
use crate::error::CliError;

pub async fn run(router: &DataRouter, request_id: String) -> Result<Envelope<Value>, CliError> {
    let report = router.health_report().await;

    let chains: Vec<Value> = QueryKind::ALL
        .into_iter()
        .map(|kind| {
            serde_json::json!({
                "kind": kind,
                "chain": router.config().configured_chain(kind),
            })
        })
        .collect();

    let data = serde_json::json!({
        "providers": report.providers,
        "cache": report.cache,
        "fallback_chains": chains,
    });

    Ok(local_envelope(request_id, data))
}
