use tickergate_core::{DateRange, PricesQuery, Query, Symbol};

use crate::cli::PricesArgs;
use crate::error::CliError;

pub fn to_query(args: &PricesArgs) -> Result<Query, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let range = DateRange::parse(&args.start, &args.end)?;
    Ok(Query::Prices(PricesQuery::new(symbol, range)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_prices_query() {
        let args = PricesArgs {
            symbol: String::from("aapl"),
            start: String::from("2024-01-01"),
            end: String::from("2024-01-05"),
        };

        let query = to_query(&args).expect("valid arguments");
        assert_eq!(query.cache_key(), "prices/AAPL/start=2024-01-01/end=2024-01-05");
    }

    #[test]
    fn inverted_range_is_a_validation_error() {
        let args = PricesArgs {
            symbol: String::from("AAPL"),
            start: String::from("2024-02-01"),
            end: String::from("2024-01-01"),
        };

        let error = to_query(&args).expect_err("must fail");
        assert_eq!(error.exit_code(), 2);
    }
}
