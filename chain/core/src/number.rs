use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;

/// Selects a block by height or by a symbolic position relative to the local head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockNumber {
    Latest,
    /// Light clients have no pending block, so this resolves to the head as well
    Pending,
    Earliest,
    Number(u64),
}

impl BlockNumber {
    /// Resolves the selector against the current head height
    pub fn resolve(self, head_number: u64) -> u64 {
        match self {
            BlockNumber::Latest | BlockNumber::Pending => head_number,
            BlockNumber::Earliest => 0,
            BlockNumber::Number(n) => n,
        }
    }

    pub fn is_head(self) -> bool {
        matches!(self, BlockNumber::Latest | BlockNumber::Pending)
    }
}

impl From<u64> for BlockNumber {
    fn from(value: u64) -> Self {
        BlockNumber::Number(value)
    }
}

impl Display for BlockNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockNumber::Latest => f.write_str("latest"),
            BlockNumber::Pending => f.write_str("pending"),
            BlockNumber::Earliest => f.write_str("earliest"),
            BlockNumber::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid block number selector '{0}'")]
pub struct ParseBlockNumberError(String);

impl FromStr for BlockNumber {
    type Err = ParseBlockNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(BlockNumber::Latest),
            "pending" => Ok(BlockNumber::Pending),
            "earliest" => Ok(BlockNumber::Earliest),
            _ => {
                let parsed = match s.strip_prefix("0x") {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => s.parse::<u64>(),
                };
                parsed.map(BlockNumber::Number).map_err(|_| ParseBlockNumberError(s.to_owned()))
            }
        }
    }
}
