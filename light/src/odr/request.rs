use crate::bloombits::BloomSection;
use lds_chain_core::{Account, Address, BlockBody, Header, Receipt};
use lds_hashes::{Hash, Hasher, KeccakHasher};
use lds_utils::mem_size::MemSizeEstimator;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};

/// A retrieval request. Requests are immutable values and identical requests are coalesced
/// into a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetrievalRequest {
    /// The canonical header at a height
    HeaderByNumber(u64),
    HeaderByHash(Hash),
    Body { hash: Hash, number: u64, transactions_root: Hash },
    Receipts { hash: Hash, number: u64, receipts_root: Hash },
    /// An account entry when `slot` is `None`, a storage slot of the account otherwise
    State { block_hash: Hash, state_root: Hash, address: Address, slot: Option<Hash> },
    BloomSection { index: u64 },
}

impl RetrievalRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            RetrievalRequest::HeaderByNumber(_) => "header-by-number",
            RetrievalRequest::HeaderByHash(_) => "header-by-hash",
            RetrievalRequest::Body { .. } => "body",
            RetrievalRequest::Receipts { .. } => "receipts",
            RetrievalRequest::State { .. } => "state",
            RetrievalRequest::BloomSection { .. } => "bloom-section",
        }
    }

    pub fn body(header: &Header) -> Self {
        RetrievalRequest::Body { hash: header.hash, number: header.number, transactions_root: header.transactions_root }
    }

    pub fn receipts(header: &Header) -> Self {
        RetrievalRequest::Receipts { hash: header.hash, number: header.number, receipts_root: header.receipts_root }
    }

    pub fn account(header: &Header, address: Address) -> Self {
        RetrievalRequest::State { block_hash: header.hash, state_root: header.state_root, address, slot: None }
    }

    pub fn storage(header: &Header, address: Address, slot: Hash) -> Self {
        RetrievalRequest::State { block_hash: header.hash, state_root: header.state_root, address, slot: Some(slot) }
    }
}

impl Display for RetrievalRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrievalRequest::HeaderByNumber(number) => write!(f, "{} #{number}", self.kind()),
            RetrievalRequest::HeaderByHash(hash) => write!(f, "{} {hash}", self.kind()),
            RetrievalRequest::Body { hash, number, .. } | RetrievalRequest::Receipts { hash, number, .. } => {
                write!(f, "{} #{number} {hash}", self.kind())
            }
            RetrievalRequest::State { state_root, address, slot: None, .. } => write!(f, "{} {address} @ {state_root}", self.kind()),
            RetrievalRequest::State { state_root, address, slot: Some(slot), .. } => {
                write!(f, "{} {address}[{slot}] @ {state_root}", self.kind())
            }
            RetrievalRequest::BloomSection { index } => write!(f, "{} {index}", self.kind()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateValue {
    /// `None` when the account does not exist in the state
    Account(Option<Account>),
    Storage(Hash),
}

impl MemSizeEstimator for StateValue {
    fn estimate_mem_units(&self) -> usize {
        1
    }
}

/// A state entry as served by peers. The entry echoes the root, address and slot it was read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub state_root: Hash,
    pub address: Address,
    pub slot: Option<Hash>,
    pub value: StateValue,
}

/// Store key of a state entry
pub fn state_key(state_root: Hash, address: Address, slot: Option<Hash>) -> Hash {
    let mut hasher = KeccakHasher::new();
    hasher.update(state_root).update(address);
    match slot {
        Some(slot) => hasher.update([1u8]).update(slot),
        None => hasher.update([0u8]),
    };
    hasher.finalize()
}

/// A validated retrieval result
#[derive(Debug, Clone)]
pub enum RetrievalPayload {
    Header(Arc<Header>),
    Body(Arc<BlockBody>),
    Receipts(Arc<Vec<Receipt>>),
    State(StateValue),
    BloomSection(Arc<BloomSection>),
}

macro_rules! payload_accessor {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name(self) -> Option<$ty> {
            match self {
                RetrievalPayload::$variant(value) => Some(value),
                _ => None,
            }
        }
    };
}

impl RetrievalPayload {
    payload_accessor!(into_header, Header, Arc<Header>);
    payload_accessor!(into_body, Body, Arc<BlockBody>);
    payload_accessor!(into_receipts, Receipts, Arc<Vec<Receipt>>);
    payload_accessor!(into_state, State, StateValue);
    payload_accessor!(into_bloom_section, BloomSection, Arc<BloomSection>);
}
