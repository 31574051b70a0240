use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical provider identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Yahoo,
    Stooq,
    FinancialDatasets,
    SecEdgar,
}

impl ProviderId {
    pub const ALL: [Self; 4] = [
        Self::Yahoo,
        Self::Stooq,
        Self::FinancialDatasets,
        Self::SecEdgar,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yahoo => "yahoo",
            Self::Stooq => "stooq",
            Self::FinancialDatasets => "financialdatasets",
            Self::SecEdgar => "sec_edgar",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(Self::Yahoo),
            "stooq" => Ok(Self::Stooq),
            "financialdatasets" => Ok(Self::FinancialDatasets),
            "sec_edgar" | "sec-edgar" => Ok(Self::SecEdgar),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_providers() {
        assert_eq!(
            "Yahoo".parse::<ProviderId>().expect("valid"),
            ProviderId::Yahoo
        );
        assert_eq!(
            "sec-edgar".parse::<ProviderId>().expect("valid"),
            ProviderId::SecEdgar
        );
        assert!("bloomberg".parse::<ProviderId>().is_err());
    }
}
