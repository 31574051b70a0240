use tickergate_core::{parse_date, InsiderTradesQuery, Query, Symbol};

use crate::cli::InsiderTradesArgs;
use crate::error::CliError;

pub fn to_query(args: &InsiderTradesArgs) -> Result<Query, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let end_date = parse_date(&args.end)?;
    let start_date = args.start.as_deref().map(parse_date).transpose()?;
    Ok(Query::InsiderTrades(InsiderTradesQuery::new(
        symbol, end_date, start_date, args.limit,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_an_insider_trades_query() {
        let args = InsiderTradesArgs {
            symbol: String::from("NVDA"),
            end: String::from("2024-06-28"),
            start: Some(String::from("2024-01-01")),
            limit: 25,
        };

        let query = to_query(&args).expect("valid arguments");
        assert_eq!(
            query.cache_key(),
            "insider_trades/NVDA/end=2024-06-28/limit=25/start=2024-01-01"
        );
    }
}
