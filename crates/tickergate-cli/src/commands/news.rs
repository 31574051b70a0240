use tickergate_core::{parse_date, NewsQuery, Query, Symbol};

use crate::cli::NewsArgs;
use crate::error::CliError;

pub fn to_query(args: &NewsArgs) -> Result<Query, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let end_date = parse_date(&args.end)?;
    let start_date = args.start.as_deref().map(parse_date).transpose()?;
    Ok(Query::News(NewsQuery::new(
        symbol, end_date, start_date, args.limit,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_news_query_with_open_start() {
        let args = NewsArgs {
            symbol: String::from("AAPL"),
            end: String::from("2024-06-28"),
            start: None,
            limit: 10,
        };

        let query = to_query(&args).expect("valid arguments");
        assert_eq!(query.cache_key(), "news/AAPL/end=2024-06-28/limit=10/start=-");
    }

    #[test]
    fn start_after_end_is_rejected() {
        let args = NewsArgs {
            symbol: String::from("AAPL"),
            end: String::from("2024-06-28"),
            start: Some(String::from("2024-07-01")),
            limit: 10,
        };

        assert!(to_query(&args).is_err());
    }
}
