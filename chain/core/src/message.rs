use crate::Address;
use serde::{Deserialize, Serialize};

/// A call message executed against a state snapshot without being included in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Message {
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: u64,
    pub value: u128,
    /// Zero means "unspecified", to be defaulted by the context builder
    pub gas: u64,
    pub gas_price: u128,
    pub data: Vec<u8>,
    pub check_nonce: bool,
}

impl Message {
    pub fn new(from: Address, to: Option<Address>, value: u128, gas: u64, gas_price: u128, data: Vec<u8>) -> Self {
        Self { from, to, nonce: 0, value, gas, gas_price, data, check_nonce: false }
    }

    pub fn with_gas(self, gas: u64) -> Self {
        Self { gas, ..self }
    }
}
