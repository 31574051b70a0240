use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Symbol, UtcDateTime, ValidationError};

/// Reporting period for fundamentals queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Ttm,
    Annual,
    Quarterly,
}

impl Period {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ttm => "ttm",
            Self::Annual => "annual",
            Self::Quarterly => "quarterly",
        }
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ttm" => Ok(Self::Ttm),
            "annual" => Ok(Self::Annual),
            "quarterly" => Ok(Self::Quarterly),
            other => Err(ValidationError::InvalidPeriod {
                value: other.to_owned(),
            }),
        }
    }
}

/// Daily OHLCV bar, the normalized price record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: Date,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    pub fn new(
        date: Date,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }
        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Normalized fundamentals snapshot for one reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub symbol: Symbol,
    pub report_period: Date,
    pub period: Period,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub price_to_book: Option<f64>,
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub dividend_yield: Option<f64>,
}

impl FinancialMetrics {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        report_period: Date,
        period: Period,
        market_cap: Option<f64>,
        pe_ratio: Option<f64>,
        price_to_book: Option<f64>,
        revenue: Option<f64>,
        net_income: Option<f64>,
        dividend_yield: Option<f64>,
    ) -> Result<Self, ValidationError> {
        validate_optional_non_negative("market_cap", market_cap)?;
        validate_optional_finite("pe_ratio", pe_ratio)?;
        validate_optional_finite("price_to_book", price_to_book)?;
        validate_optional_finite("revenue", revenue)?;
        validate_optional_finite("net_income", net_income)?;
        validate_optional_non_negative("dividend_yield", dividend_yield)?;

        Ok(Self {
            symbol,
            report_period,
            period,
            market_cap,
            pe_ratio,
            price_to_book,
            revenue,
            net_income,
            dividend_yield,
        })
    }
}

/// Normalized company profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyFacts {
    pub symbol: Symbol,
    pub name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub exchange: Option<String>,
    pub employees: Option<u64>,
    pub market_cap: Option<f64>,
}

impl CompanyFacts {
    pub fn new(
        symbol: Symbol,
        name: impl Into<String>,
        sector: Option<String>,
        industry: Option<String>,
        exchange: Option<String>,
        employees: Option<u64>,
        market_cap: Option<f64>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "name" });
        }
        validate_optional_non_negative("market_cap", market_cap)?;

        Ok(Self {
            symbol,
            name,
            sector,
            industry,
            exchange,
            employees,
            market_cap,
        })
    }
}

/// Normalized news item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub symbol: Symbol,
    pub title: String,
    pub publisher: String,
    pub url: Option<String>,
    pub published_at: UtcDateTime,
}

impl NewsArticle {
    pub fn new(
        symbol: Symbol,
        title: impl Into<String>,
        publisher: impl Into<String>,
        url: Option<String>,
        published_at: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "title" });
        }

        Ok(Self {
            symbol,
            title,
            publisher: publisher.into(),
            url,
            published_at,
        })
    }
}

/// Normalized insider transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsiderTrade {
    pub symbol: Symbol,
    pub insider_name: String,
    pub insider_title: Option<String>,
    pub transaction_date: Date,
    /// Positive for buys, negative for sells.
    pub shares: i64,
    pub share_price: Option<f64>,
}

impl InsiderTrade {
    pub fn new(
        symbol: Symbol,
        insider_name: impl Into<String>,
        insider_title: Option<String>,
        transaction_date: Date,
        shares: i64,
        share_price: Option<f64>,
    ) -> Result<Self, ValidationError> {
        let insider_name = insider_name.into();
        if insider_name.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "insider_name",
            });
        }
        validate_optional_non_negative("share_price", share_price)?;

        Ok(Self {
            symbol,
            insider_name,
            insider_title,
            transaction_date,
            shares,
            share_price,
        })
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    match value {
        Some(value) => validate_non_negative(field, value),
        None => Ok(()),
    }
}

fn validate_optional_finite(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    match value {
        Some(value) if !value.is_finite() => Err(ValidationError::NonFiniteValue { field }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn price_bar_enforces_ohlc_bounds() {
        let err = PriceBar::new(date!(2024 - 01 - 02), 101.0, 100.0, 99.0, 99.5, 1_000)
            .expect_err("open above high must fail");
        assert!(matches!(err, ValidationError::InvalidBarBounds));
    }

    #[test]
    fn price_bar_rejects_inverted_range() {
        let err = PriceBar::new(date!(2024 - 01 - 02), 100.0, 98.0, 99.0, 98.5, 1_000)
            .expect_err("high below low must fail");
        assert!(matches!(err, ValidationError::InvalidBarRange));
    }

    #[test]
    fn period_round_trips_via_from_str() {
        assert_eq!("ttm".parse::<Period>().expect("valid"), Period::Ttm);
        assert_eq!(
            "Quarterly".parse::<Period>().expect("valid"),
            Period::Quarterly
        );
        assert!("monthly".parse::<Period>().is_err());
    }

    #[test]
    fn company_facts_rejects_blank_name() {
        let symbol = Symbol::parse("AAPL").expect("valid symbol");
        let err = CompanyFacts::new(symbol, "  ", None, None, None, None, None)
            .expect_err("blank name must fail");
        assert!(matches!(err, ValidationError::EmptyField { field: "name" }));
    }
}
