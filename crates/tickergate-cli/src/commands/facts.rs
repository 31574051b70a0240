use tickergate_core::{FactsQuery, Query, Symbol};

use crate::cli::FactsArgs;
use crate::error::CliError;

pub fn to_query(args: &FactsArgs) -> Result<Query, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    Ok(Query::CompanyFacts(FactsQuery::new(symbol)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_facts_query() {
        let args = FactsArgs {
            symbol: String::from(" brk.b "),
        };

        let query = to_query(&args).expect("valid arguments");
        assert_eq!(query.cache_key(), "company_facts/BRK.B/all");
    }
}
