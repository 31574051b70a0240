use thiserror::Error;

/// Validation and contract errors exposed by `tickergate-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid provider '{value}', expected one of yahoo, stooq, financialdatasets, sec_edgar")]
    InvalidProvider { value: String },
    #[error("invalid period '{value}', expected one of ttm, annual, quarterly")]
    InvalidPeriod { value: String },
    #[error("invalid query kind '{value}'")]
    InvalidQueryKind { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("date must be YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },
    #[error("date range start {start} is after end {end}")]
    InvertedDateRange { start: String, end: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("price bar high must be >= low")]
    InvalidBarRange,
    #[error("price bar open/close must be within high/low range")]
    InvalidBarBounds,

    #[error("limit must be greater than zero")]
    ZeroLimit,
    #[error("field '{field}' cannot be empty")]
    EmptyField { field: &'static str },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
