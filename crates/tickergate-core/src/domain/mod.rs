mod date_range;
mod models;
mod symbol;
mod timestamp;

pub use date_range::{parse_date, DateRange};
pub use models::{
    CompanyFacts, FinancialMetrics, InsiderTrade, NewsArticle, Period, PriceBar,
};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
