use std::str::FromStr;

use serde_json::Value;
use tickergate_core::{CacheScope, DataRouter, Envelope, QueryKind, Symbol};

use super::local_envelope;
use crate::cli::{CacheClearArgs, CacheCommand, CacheWarmArgs};
use crate::error::CliError;

pub async fn run(
    command: &CacheCommand,
    router: &DataRouter,
    request_id: String,
) -> Result<Envelope<Value>, CliError> {
    let data = match command {
        CacheCommand::Stats => serde_json::to_value(router.cache().stats().await)?,
        CacheCommand::Clear(args) => clear(args, router).await?,
        CacheCommand::Warm(args) => warm(args, router).await?,
    };

    Ok(local_envelope(request_id, data))
}

async fn clear(args: &CacheClearArgs, router: &DataRouter) -> Result<Value, CliError> {
    let scope = match (&args.symbol, &args.kind) {
        (None, _) => CacheScope::All,
        (Some(symbol), None) => CacheScope::Symbol(Symbol::parse(symbol)?),
        (Some(symbol), Some(kind)) => {
            CacheScope::SymbolKind(Symbol::parse(symbol)?, parse_kind(kind)?)
        }
    };

    let removed = router.clear_cache(scope).await;
    Ok(serde_json::json!({ "removed": removed }))
}

async fn warm(args: &CacheWarmArgs, router: &DataRouter) -> Result<Value, CliError> {
    let symbols = args
        .symbols
        .iter()
        .map(|raw| Symbol::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let kinds = if args.kinds.is_empty() {
        QueryKind::ALL.to_vec()
    } else {
        args.kinds
            .iter()
            .map(|raw| parse_kind(raw))
            .collect::<Result<Vec<_>, _>>()?
    };

    let report = router.warm(&symbols, &kinds).await;
    Ok(serde_json::to_value(report)?)
}

fn parse_kind(raw: &str) -> Result<QueryKind, CliError> {
    QueryKind::from_str(raw).map_err(|_| CliError::UnknownName(raw.to_owned()))
}
