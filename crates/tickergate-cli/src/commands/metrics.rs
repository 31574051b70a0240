use std::str::FromStr;

use tickergate_core::{parse_date, MetricsQuery, Period, Query, Symbol};

use crate::cli::MetricsArgs;
use crate::error::CliError;

pub fn to_query(args: &MetricsArgs) -> Result<Query, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let end_date = parse_date(&args.end)?;
    let period = Period::from_str(&args.period)?;
    Ok(Query::FinancialMetrics(MetricsQuery::new(
        symbol, end_date, period, args.limit,
    )?))
}
