use crate::odr::{OdrDispatcher, OdrError, RetrievalRequest, StateValue};
use lds_chain_core::{Account, Address, Header};
use lds_core::debug;
use lds_hashes::Hash;
use lds_utils::triggers::CancelSignal;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

#[derive(Default)]
struct Overlay {
    accounts: HashMap<Address, Account>,
    storage: HashMap<(Address, Hash), Hash>,
}

/// An account and storage view of the state at one header.
///
/// Reads go through on-demand retrieval. Retrieval failures do not fail the read: the first
/// failure is recorded, see [`LightState::error`], and the read returns a zero value. Writes
/// land in a private overlay visible only through this snapshot and never reach the store.
pub struct LightState {
    odr: Arc<OdrDispatcher>,
    header: Arc<Header>,
    cancel: CancelSignal,
    overlay: Mutex<Overlay>,
    error: Mutex<Option<OdrError>>,
}

impl LightState {
    pub fn new(odr: Arc<OdrDispatcher>, header: Arc<Header>, cancel: CancelSignal) -> Self {
        Self { odr, header, cancel, overlay: Default::default(), error: Default::default() }
    }

    pub fn header(&self) -> &Arc<Header> {
        &self.header
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// The first retrieval failure observed by this snapshot, if any
    pub fn error(&self) -> Option<OdrError> {
        self.error.lock().clone()
    }

    /// Records a retrieval failure observed on behalf of this snapshot. Only the first one is kept.
    pub fn record_error(&self, err: OdrError) {
        let mut error = self.error.lock();
        if error.is_none() {
            debug!("State access at #{} failed: {err}", self.header.number);
            *error = Some(err);
        }
    }

    pub async fn account(&self, address: Address) -> Account {
        if let Some(account) = self.overlay.lock().accounts.get(&address) {
            return *account;
        }
        match self.odr.resolve(RetrievalRequest::account(&self.header, address), &self.cancel).await {
            Ok(payload) => match payload.into_state() {
                Some(StateValue::Account(account)) => account.unwrap_or_default(),
                _ => {
                    self.record_error(OdrError::PeerError("unexpected state payload for an account".to_owned()));
                    Default::default()
                }
            },
            Err(err) => {
                self.record_error(err);
                Default::default()
            }
        }
    }

    pub async fn balance(&self, address: Address) -> u128 {
        self.account(address).await.balance
    }

    pub async fn nonce(&self, address: Address) -> u64 {
        self.account(address).await.nonce
    }

    pub async fn storage(&self, address: Address, slot: Hash) -> Hash {
        if let Some(value) = self.overlay.lock().storage.get(&(address, slot)) {
            return *value;
        }
        match self.odr.resolve(RetrievalRequest::storage(&self.header, address, slot), &self.cancel).await {
            Ok(payload) => match payload.into_state() {
                Some(StateValue::Storage(value)) => value,
                _ => {
                    self.record_error(OdrError::PeerError("unexpected state payload for a storage slot".to_owned()));
                    Hash::ZERO
                }
            },
            Err(err) => {
                self.record_error(err);
                Hash::ZERO
            }
        }
    }

    /// Overrides the balance of `address` in this snapshot only
    pub async fn set_balance(&self, address: Address, balance: u128) {
        let account = self.account(address).await;
        self.overlay.lock().accounts.insert(address, Account { balance, ..account });
    }

    pub async fn set_nonce(&self, address: Address, nonce: u64) {
        let account = self.account(address).await;
        self.overlay.lock().accounts.insert(address, Account { nonce, ..account });
    }

    pub fn set_storage(&self, address: Address, slot: Hash, value: Hash) {
        self.overlay.lock().storage.insert((address, slot), value);
    }
}
