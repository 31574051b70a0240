use clap::{Args, Parser, Subcommand, ValueEnum};

/// Resilient multi-provider market data fetcher.
#[derive(Debug, Parser)]
#[command(name = "tickergate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Run against deterministic offline data instead of live upstreams.
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Daily price bars for a symbol over a date range.
    Prices(PricesArgs),
    /// Fundamental metrics for a symbol, newest first.
    Metrics(MetricsArgs),
    /// Company profile for a symbol.
    Facts(FactsArgs),
    /// Company news up to an end date, newest first.
    News(NewsArgs),
    /// Insider transactions up to an end date, newest first.
    InsiderTrades(InsiderTradesArgs),
    /// Provider registry, capabilities, and breaker health.
    Sources,
    /// Cache maintenance.
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Debug, Args)]
pub struct PricesArgs {
    /// Ticker symbol, e.g. AAPL.
    pub symbol: String,

    /// Inclusive range start, YYYY-MM-DD.
    #[arg(long)]
    pub start: String,

    /// Inclusive range end, YYYY-MM-DD.
    #[arg(long)]
    pub end: String,
}

#[derive(Debug, Args)]
pub struct MetricsArgs {
    pub symbol: String,

    /// Report periods on or before this date, YYYY-MM-DD.
    #[arg(long)]
    pub end: String,

    /// Reporting period: ttm, annual, or quarterly.
    #[arg(long, default_value = "ttm")]
    pub period: String,

    /// Maximum number of periods to return.
    #[arg(long, default_value_t = 4)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct FactsArgs {
    pub symbol: String,
}

#[derive(Debug, Args)]
pub struct NewsArgs {
    pub symbol: String,

    /// Articles published on or before this date, YYYY-MM-DD.
    #[arg(long)]
    pub end: String,

    /// Optional lower bound, YYYY-MM-DD.
    #[arg(long)]
    pub start: Option<String>,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct InsiderTradesArgs {
    pub symbol: String,

    /// Transactions filed on or before this date, YYYY-MM-DD.
    #[arg(long)]
    pub end: String,

    /// Optional lower bound, YYYY-MM-DD.
    #[arg(long)]
    pub start: Option<String>,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Cache hit/miss/eviction counters.
    Stats,
    /// Drop cached entries, optionally scoped to one symbol or kind.
    Clear(CacheClearArgs),
    /// Pre-fill the cache for a set of symbols and kinds.
    Warm(CacheWarmArgs),
}

#[derive(Debug, Args)]
pub struct CacheClearArgs {
    /// Restrict the clear to one symbol.
    #[arg(long)]
    pub symbol: Option<String>,

    /// Restrict the clear to one query kind (requires --symbol).
    #[arg(long, requires = "symbol")]
    pub kind: Option<String>,
}

#[derive(Debug, Args)]
pub struct CacheWarmArgs {
    /// Comma-separated symbols to warm.
    #[arg(long, value_delimiter = ',', required = true)]
    pub symbols: Vec<String>,

    /// Comma-separated query kinds to warm (defaults to all).
    #[arg(long, value_delimiter = ',')]
    pub kinds: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prices_command() {
        let cli = Cli::try_parse_from([
            "tickergate",
            "prices",
            "AAPL",
            "--start",
            "2024-01-01",
            "--end",
            "2024-01-05",
            "--offline",
        ])
        .expect("arguments parse");

        assert!(cli.offline);
        match cli.command {
            Command::Prices(args) => {
                assert_eq!(args.symbol, "AAPL");
                assert_eq!(args.start, "2024-01-01");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cache_kind_requires_symbol() {
        let result = Cli::try_parse_from(["tickergate", "cache", "clear", "--kind", "prices"]);
        assert!(result.is_err());
    }

    #[test]
    fn warm_splits_comma_lists() {
        let cli = Cli::try_parse_from([
            "tickergate",
            "cache",
            "warm",
            "--symbols",
            "AAPL,MSFT",
            "--kinds",
            "prices,facts",
        ])
        .expect("arguments parse");

        match cli.command {
            Command::Cache(CacheCommand::Warm(args)) => {
                assert_eq!(args.symbols, vec!["AAPL", "MSFT"]);
                assert_eq!(args.kinds, vec!["prices", "facts"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
