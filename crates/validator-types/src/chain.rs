use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of chains this validator knows how to stake-query.
///
/// Extensible: adding a chain means adding a variant here plus an adapter
/// impl in `validator-chains`, not touching the scoring pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainTag {
    Solana,
    Ethereum,
    Base,
}

impl ChainTag {
    pub const ALL: [ChainTag; 3] = [ChainTag::Solana, ChainTag::Ethereum, ChainTag::Base];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainTag::Solana => "solana",
            ChainTag::Ethereum => "ethereum",
            ChainTag::Base => "base",
        }
    }
}

impl fmt::Display for ChainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainTag {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solana" => Ok(ChainTag::Solana),
            "ethereum" | "eth" => Ok(ChainTag::Ethereum),
            "base" => Ok(ChainTag::Base),
            other => Err(TypesError::UnknownChain(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        for chain in ChainTag::ALL {
            assert_eq!(ChainTag::from_str(&chain.to_string()).unwrap(), chain);
        }
    }

    #[test]
    fn rejects_unknown_chain() {
        assert!(ChainTag::from_str("dogechain").is_err());
    }
}
