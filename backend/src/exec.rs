use lds_chain_core::{Address, Difficulty, Header, Message};
use lds_core::trace;
use lds_hashes::Hash;
use lds_light::{
    chain::{ChainError, LightChain},
    odr::OdrError,
    state::LightState,
};
use std::sync::Arc;
use thiserror::Error;

/// Number of ancestors whose hash is reachable from an execution context
pub const BLOCK_HASH_WINDOW: u64 = 256;

/// A state retrieval failure observed while executing against a light state snapshot
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("state access failed: {0}")]
pub struct StateAccessError(#[from] pub OdrError);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockContext {
    pub number: u64,
    pub hash: Hash,
    pub parent_hash: Hash,
    pub timestamp: u64,
    pub coinbase: Address,
    pub gas_limit: u64,
    pub difficulty: Difficulty,
}

impl From<&Header> for BlockContext {
    fn from(header: &Header) -> Self {
        Self {
            number: header.number,
            hash: header.hash,
            parent_hash: header.parent_hash,
            timestamp: header.timestamp,
            coinbase: header.coinbase,
            gas_limit: header.gas_limit,
            difficulty: header.difficulty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxContext {
    pub origin: Address,
    pub gas_price: u128,
}

/// Everything a read-only call executes against. Lives for the duration of one query.
pub struct ExecutionContext {
    pub block: BlockContext,
    pub tx: TxContext,
    pub message: Message,
    state: Arc<LightState>,
    chain: Arc<LightChain>,
}

impl ExecutionContext {
    pub fn state(&self) -> &Arc<LightState> {
        &self.state
    }

    /// The hash of ancestor `number` within the [`BLOCK_HASH_WINDOW`] most recent ancestors of the
    /// context block, [`Hash::ZERO`] outside of it. Retrieval failures are recorded on the state
    /// snapshot, surfacing through the [`StateErrorAccessor`].
    pub async fn block_hash(&self, number: u64) -> Hash {
        if number >= self.block.number || self.block.number - number > BLOCK_HASH_WINDOW {
            return Hash::ZERO;
        }
        let cancel = self.state.cancel_signal();
        let canonical = matches!(self.chain.store().canonical_hash(self.block.number), Ok(Some(hash)) if hash == self.block.hash);
        if canonical {
            return match self.chain.header_by_number_odr(number, cancel).await {
                Ok(Some(header)) => header.hash,
                Ok(None) => Hash::ZERO,
                Err(err) => self.record(err),
            };
        }

        // Off the canonical chain, follow the parent links
        let mut hash = self.block.parent_hash;
        for _ in number + 1..self.block.number {
            match self.chain.header_by_hash_odr(hash, cancel).await {
                Ok(header) => hash = header.parent_hash,
                Err(err) => return self.record(err),
            }
        }
        hash
    }

    fn record(&self, err: ChainError) -> Hash {
        self.state.record_error(err.into());
        Hash::ZERO
    }
}

/// Reports the first state retrieval failure of an execution, which reads themselves never fail on
pub struct StateErrorAccessor {
    state: Arc<LightState>,
}

impl StateErrorAccessor {
    pub fn check(&self) -> Result<(), StateAccessError> {
        match self.state.error() {
            Some(err) => Err(StateAccessError(err)),
            None => Ok(()),
        }
    }
}

/// Builds execution contexts for read-only calls
#[derive(Clone)]
pub struct ExecutionContextBuilder {
    chain: Arc<LightChain>,
    gas_cap: Option<u64>,
}

impl ExecutionContextBuilder {
    pub fn new(chain: Arc<LightChain>, gas_cap: Option<u64>) -> Self {
        Self { chain, gas_cap }
    }

    /// Prepares `message` for execution against `state` at `header`.
    ///
    /// The sender balance is raised to the maximum in the snapshot overlay. The message gas is
    /// capped, and an unspecified gas is set to the cap or, without a cap, to the block gas limit.
    pub async fn build(&self, message: Message, state: Arc<LightState>, header: &Header) -> (ExecutionContext, StateErrorAccessor) {
        state.set_balance(message.from, u128::MAX).await;

        let gas = match (message.gas, self.gas_cap) {
            (0, Some(cap)) => cap,
            (0, None) => header.gas_limit,
            (gas, Some(cap)) if gas > cap => {
                trace!("Capping call gas {gas} to {cap}");
                cap
            }
            (gas, _) => gas,
        };
        let message = message.with_gas(gas);
        let tx = TxContext { origin: message.from, gas_price: message.gas_price };
        let context = ExecutionContext { block: header.into(), tx, message, state: state.clone(), chain: self.chain.clone() };
        (context, StateErrorAccessor { state })
    }
}
