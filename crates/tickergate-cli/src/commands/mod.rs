mod cache;
mod facts;
mod insider_trades;
mod metrics;
mod news;
mod prices;
mod sources;

use serde_json::Value;
use tickergate_core::{DataRouter, Envelope, EnvelopeMeta, Query, UtcDateTime};
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli, router: &DataRouter) -> Result<Envelope<Value>, CliError> {
    let request_id = Uuid::new_v4().to_string();

    match &cli.command {
        Command::Prices(args) => {
            route_to_envelope(router, request_id, prices::to_query(args)?).await
        }
        Command::Metrics(args) => {
            route_to_envelope(router, request_id, metrics::to_query(args)?).await
        }
        Command::Facts(args) => {
            route_to_envelope(router, request_id, facts::to_query(args)?).await
        }
        Command::News(args) => route_to_envelope(router, request_id, news::to_query(args)?).await,
        Command::InsiderTrades(args) => {
            route_to_envelope(router, request_id, insider_trades::to_query(args)?).await
        }
        Command::Sources => sources::run(router, request_id).await,
        Command::Cache(command) => cache::run(command, router, request_id).await,
    }
}

/// Resolve a query and wrap the outcome; terminal routing failures become
/// an error envelope rather than an early exit so the attempt trail is
/// still printed.
async fn route_to_envelope(
    router: &DataRouter,
    request_id: String,
    query: Query,
) -> Result<Envelope<Value>, CliError> {
    match router.execute(&query).await {
        Ok(routed) => {
            let data = serde_json::to_value(&routed.data)?;
            Ok(Envelope::from_routed(request_id, routed.map(|_| data)))
        }
        Err(error) => Ok(Envelope::from_route_error(request_id, &error)),
    }
}

/// Envelope for commands that answer locally, without routing.
fn local_envelope(request_id: String, data: Value) -> Envelope<Value> {
    Envelope {
        meta: EnvelopeMeta {
            request_id,
            generated_at: UtcDateTime::now(),
            source: None,
            source_chain: Vec::new(),
            cache_hit: false,
            latency_ms: 0,
        },
        data: Some(data),
        errors: Vec::new(),
    }
}
