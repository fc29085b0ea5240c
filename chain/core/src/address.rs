use serde::{Deserialize, Serialize};
use std::{
    fmt::{Debug, Display, Formatter},
    str::FromStr,
};

pub const ADDRESS_SIZE: usize = 20;

/// A 20-byte account address
#[derive(PartialEq, Eq, Clone, Copy, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub const ZERO: Address = Address([0; ADDRESS_SIZE]);

    pub const fn from_bytes(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Address(bytes)
    }

    pub const fn as_bytes(&self) -> [u8; ADDRESS_SIZE] {
        self.0
    }

    /// Returns an address filled with `byte`. Handy for building fixtures.
    pub const fn repeat_byte(byte: u8) -> Self {
        Address([byte; ADDRESS_SIZE])
    }
}

impl From<[u8; ADDRESS_SIZE]> for Address {
    fn from(value: [u8; ADDRESS_SIZE]) -> Self {
        Address(value)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", faster_hex::hex_string(&self.0))
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = faster_hex::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != ADDRESS_SIZE * 2 {
            return Err(faster_hex::Error::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; ADDRESS_SIZE];
        faster_hex::hex_decode(s.as_bytes(), &mut bytes)?;
        Ok(Address(bytes))
    }
}
