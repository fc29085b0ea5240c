use crate::{
    odr::{OdrDispatcher, OdrError, RetrievalRequest},
    store::{ChainStore, HeadSnapshot},
};
use lds_chain_core::{receipt::derive_log_fields, Block, BlockNumber, ChainHead, Difficulty, Header, Log, Receipt};
use lds_core::{debug, info};
use lds_database::prelude::StoreError;
use lds_hashes::Hash;
use lds_notify::{notification::Notification, notifier::Notifier};
use lds_utils::triggers::{CancelSignal, Listener, SingleTrigger};
use parking_lot::RwLock;
use rocksdb::WriteBatch;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Odr(#[from] OdrError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("block #{0} is not a known canonical block")]
    UnknownCanonical(u64),

    #[error("unknown parent {1} of header #{0}")]
    UnknownParent(u64, Hash),

    #[error("invalid header #{0}: {1}")]
    InvalidHeader(u64, String),
}

pub type ChainResult<T> = std::result::Result<T, ChainError>;

impl From<ChainError> for OdrError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Odr(err) => err,
            other => OdrError::Store(other.to_string()),
        }
    }
}

/// Outcome of [`LightChain::insert_header`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertStatus {
    /// The header was already known and does not outweigh the head
    Known,
    /// The header extends or reorganizes the canonical chain and is the new head
    Canonical,
    /// The header was stored on a side branch
    SideChain,
}

/// The local view of the light chain.
///
/// Head reads are lock-free loads of an immutable [`HeadSnapshot`]. Head changes are serialized
/// by the store writer lock and published by swapping the snapshot, so readers never observe a
/// header paired with the head data of another block.
pub struct LightChain {
    store: Arc<ChainStore>,
    odr: Arc<OdrDispatcher>,
    notifier: Notifier,
    /// Fired on every rollback, stopping the scans started against the previous head
    halt: RwLock<SingleTrigger>,
}

impl LightChain {
    pub fn new(odr: Arc<OdrDispatcher>, notifier: Notifier) -> Self {
        Self { store: odr.store().clone(), odr, notifier, halt: RwLock::new(SingleTrigger::new()) }
    }

    pub fn store(&self) -> &Arc<ChainStore> {
        &self.store
    }

    pub fn odr(&self) -> &Arc<OdrDispatcher> {
        &self.odr
    }

    pub fn head_snapshot(&self) -> Arc<HeadSnapshot> {
        self.store.head()
    }

    pub fn head_header(&self) -> Arc<Header> {
        self.store.head().header.clone()
    }

    pub fn chain_head(&self) -> ChainHead {
        self.store.head().head
    }

    /// The current head together with a listener of the halt trigger guarding it. The listener
    /// fires once this head is rolled back by [`Self::set_head`].
    pub fn head_with_halt_listener(&self) -> (ChainHead, Listener) {
        let halt = self.halt.read();
        (self.store.head().head, halt.listener.clone())
    }

    /// The canonical header at `number`, from local data only
    pub fn header_by_number(&self, number: u64) -> ChainResult<Option<Arc<Header>>> {
        Ok(self.store.canonical_header(number)?)
    }

    /// A header by hash, from local data only
    pub fn header_by_hash(&self, hash: Hash) -> ChainResult<Option<Arc<Header>>> {
        Ok(self.store.header(hash)?)
    }

    /// Resolves a block selector locally. `latest` and `pending` always answer the current head.
    pub fn header_at(&self, number: BlockNumber) -> ChainResult<Option<Arc<Header>>> {
        let snapshot = self.store.head();
        match number {
            BlockNumber::Latest | BlockNumber::Pending => Ok(Some(snapshot.header.clone())),
            _ => self.header_by_number(number.resolve(snapshot.head.number)),
        }
    }

    /// The canonical header at `number`, retrieved from peers on a local miss. Heights above
    /// the head yield `None`.
    ///
    /// A header served by number is only accepted as the parent of a locally known canonical
    /// header, so a miss inside a checkpoint gap retrieves every header from the lowest known
    /// canonical header above `number` down to `number`.
    pub async fn header_by_number_odr(&self, number: u64, cancel: &CancelSignal) -> ChainResult<Option<Arc<Header>>> {
        let head = self.store.head().head.number;
        if number > head {
            return Ok(None);
        }
        if let Some(header) = self.store.canonical_header(number)? {
            return Ok(Some(header));
        }
        // The head is always canonical, so `number` is below it here
        let mut anchor = number + 1;
        while anchor < head && self.store.canonical_hash(anchor)?.is_none() {
            anchor += 1;
        }
        let mut header = None;
        for height in (number..anchor).rev() {
            let payload = self.odr.resolve(RetrievalRequest::HeaderByNumber(height), cancel).await?;
            header = Some(payload.into_header().ok_or_else(|| mismatched_payload("header"))?);
        }
        Ok(header)
    }

    /// Makes the canonical headers covered by bloom section `index` known locally, which a
    /// retrieved section is verified against.
    pub async fn section_headers(&self, index: u64, cancel: &CancelSignal) -> ChainResult<()> {
        let section_size = self.store.section_size();
        let first = index * section_size;
        // Top down, so that the first call walks the gap and every following one is a single step
        for number in (first..first + section_size).rev() {
            if self.header_by_number_odr(number, cancel).await?.is_none() {
                return Err(ChainError::UnknownCanonical(number));
            }
        }
        Ok(())
    }

    pub async fn header_by_hash_odr(&self, hash: Hash, cancel: &CancelSignal) -> ChainResult<Arc<Header>> {
        let payload = self.odr.resolve(RetrievalRequest::HeaderByHash(hash), cancel).await?;
        payload.into_header().ok_or_else(|| mismatched_payload("header"))
    }

    pub async fn block_by_hash(&self, hash: Hash, cancel: &CancelSignal) -> ChainResult<Block> {
        let header = self.header_by_hash_odr(hash, cancel).await?;
        self.block_of(header, cancel).await
    }

    /// Completes `header` with its body
    pub async fn block_of(&self, header: Arc<Header>, cancel: &CancelSignal) -> ChainResult<Block> {
        let payload = self.odr.resolve(RetrievalRequest::body(&header), cancel).await?;
        let body = payload.into_body().ok_or_else(|| mismatched_payload("body"))?;
        Ok(Block::new(header, body.as_ref().clone()))
    }

    /// The receipts of block `hash`, with all block-derived log fields filled
    pub async fn block_receipts(&self, hash: Hash, cancel: &CancelSignal) -> ChainResult<Vec<Receipt>> {
        let header = self.header_by_hash_odr(hash, cancel).await?;
        self.receipts_of(&header, cancel).await
    }

    pub async fn receipts_of(&self, header: &Header, cancel: &CancelSignal) -> ChainResult<Vec<Receipt>> {
        let payload = self.odr.resolve(RetrievalRequest::receipts(header), cancel).await?;
        let mut receipts = payload.into_receipts().ok_or_else(|| mismatched_payload("receipts"))?.as_ref().clone();
        derive_log_fields(&mut receipts, header.hash, header.number);
        Ok(receipts)
    }

    /// The logs of block `hash` grouped by transaction
    pub async fn block_logs(&self, hash: Hash, cancel: &CancelSignal) -> ChainResult<Vec<Vec<Log>>> {
        let receipts = self.block_receipts(hash, cancel).await?;
        Ok(receipts.into_iter().map(|receipt| receipt.logs).collect())
    }

    pub fn td_by_hash(&self, hash: Hash) -> ChainResult<Option<Difficulty>> {
        Ok(self.store.td(hash)?)
    }

    /// Imports a header whose parent is known locally. The header becomes the new head if its
    /// branch is heavier than the current one, reorganizing the canonical index as needed.
    pub fn insert_header(&self, header: Header) -> ChainResult<InsertStatus> {
        if !header.is_sealed() {
            return Err(ChainError::InvalidHeader(header.number, "hash does not match content".to_owned()));
        }
        let header = Arc::new(header);
        let guard = self.store.write_guard();
        // A known header may still become canonical again, e.g. when re-extending after a rollback
        let known = self.store.td(header.hash)?.is_some();
        let parent = self.store.header(header.parent_hash)?.ok_or(ChainError::UnknownParent(header.number, header.parent_hash))?;
        if parent.number + 1 != header.number {
            return Err(ChainError::InvalidHeader(header.number, format!("parent is at #{}", parent.number)));
        }

        let mut batch = WriteBatch::default();
        let td = self.store.write_header(&mut batch, &header)?.ok_or(ChainError::UnknownParent(header.number, header.parent_hash))?;
        let current = self.store.head();
        if td <= current.head.td {
            if known {
                return Ok(InsertStatus::Known);
            }
            self.store.commit_batch(batch)?;
            drop(guard);
            debug!("Inserted side chain header #{} {}", header.number, header.hash);
            self.notifier.notify(Notification::ChainSide(header));
            return Ok(InsertStatus::SideChain);
        }

        // Rewrite the canonical index down to the common ancestor of both branches
        let mut enacted = vec![header.clone()];
        let mut cursor = parent;
        while self.store.raw_canonical_hash(cursor.number)? != Some(cursor.hash) {
            enacted.push(cursor.clone());
            cursor = self.store.header(cursor.parent_hash)?.ok_or(ChainError::UnknownParent(cursor.number, cursor.parent_hash))?;
        }
        let mut retracted = Vec::new();
        for number in (cursor.number + 1..=current.head.number).rev() {
            if let Some(hash) = self.store.raw_canonical_hash(number)? {
                if let Some(old) = self.store.header(hash)? {
                    retracted.push(old);
                }
            }
            if number > header.number {
                self.store.delete_canonical(&mut batch, number)?;
            }
        }
        for enacted_header in enacted.iter() {
            self.store.set_canonical(&mut batch, enacted_header.number, enacted_header.hash)?;
        }
        self.store.commit_head(batch, header.clone(), td)?;
        drop(guard);

        if !retracted.is_empty() {
            info!("Chain reorganized at #{}: {} block(s) retracted, {} enacted", cursor.number, retracted.len(), enacted.len());
        }
        self.publish_reorg(&retracted, &enacted);
        Ok(InsertStatus::Canonical)
    }

    /// Moves the head forward to a trusted checkpoint header whose ancestry is not known locally.
    ///
    /// Heights between the previous head and the checkpoint stay unknown locally and are
    /// retrieved on demand, each served header being checked to link to its canonical child.
    pub fn import_checkpoint(&self, header: Header, td: Difficulty) -> ChainResult<()> {
        if !header.is_sealed() {
            return Err(ChainError::InvalidHeader(header.number, "hash does not match content".to_owned()));
        }
        let header = Arc::new(header);
        let guard = self.store.write_guard();
        let current = self.store.head();
        if header.number <= current.head.number || td <= current.head.td {
            return Err(ChainError::InvalidHeader(header.number, format!("checkpoint is not ahead of head #{}", current.head.number)));
        }
        let mut batch = WriteBatch::default();
        self.store.write_trusted_header(&mut batch, &header, td)?;
        self.store.set_canonical(&mut batch, header.number, header.hash)?;
        self.store.commit_head(batch, header.clone(), td)?;
        drop(guard);

        info!("Chain head moved to checkpoint #{} {}", header.number, header.hash);
        self.publish_reorg(&[], &[header]);
        Ok(())
    }

    /// Publishes the events of a head change. Logs are only published for blocks whose receipts
    /// are known locally.
    fn publish_reorg(&self, retracted: &[Arc<Header>], enacted: &[Arc<Header>]) {
        let local_logs = |header: &Arc<Header>, removed: bool| -> Vec<Log> {
            let Ok(Some(receipts)) = self.store.receipts(header.hash) else { return vec![] };
            let mut receipts = receipts.as_ref().clone();
            derive_log_fields(&mut receipts, header.hash, header.number);
            receipts.into_iter().flat_map(|receipt| receipt.logs).map(|log| Log { removed, ..log }).collect()
        };

        let removed = retracted.iter().flat_map(|header| local_logs(header, true)).collect::<Vec<_>>();
        if !removed.is_empty() {
            self.notifier.notify(Notification::RemovedLogs(Arc::new(removed)));
        }
        for header in retracted.iter() {
            self.notifier.notify(Notification::ChainSide(header.clone()));
        }
        // Enacted headers are collected from the head downwards
        for header in enacted.iter().rev() {
            self.notifier.notify(Notification::Chain(header.clone()));
            let logs = local_logs(header, false);
            if !logs.is_empty() {
                self.notifier.notify(Notification::Logs(Arc::new(logs)));
            }
        }
        if let Some(head) = enacted.first() {
            self.notifier.notify(Notification::NewHeads(head.clone()));
        }
    }

    /// Rolls the head back to the canonical block `number`.
    ///
    /// The halt trigger fires first so that scans running against the old head stop. The
    /// canonical index above `number` is then removed and the head swapped in one step.
    /// The halt lock is held until the new head is published, so a head read together with
    /// its halt listener is either the old head with the fired listener or the new head with
    /// a fresh one.
    pub fn set_head(&self, number: u64) -> ChainResult<()> {
        let _guard = self.store.write_guard();
        let current = self.store.head();
        let header = self.store.canonical_header(number)?.ok_or(ChainError::UnknownCanonical(number))?;
        let td = self.store.td(header.hash)?.ok_or(ChainError::UnknownCanonical(number))?;

        let mut batch = WriteBatch::default();
        for n in number + 1..=current.head.number {
            self.store.delete_canonical(&mut batch, n)?;
        }

        let mut halt = self.halt.write();
        halt.trigger.trigger();
        *halt = SingleTrigger::new();
        self.store.commit_head(batch, header, td)?;
        drop(halt);

        info!("Chain head set to #{} (was #{})", number, current.head.number);
        Ok(())
    }
}

fn mismatched_payload(kind: &str) -> ChainError {
    ChainError::Odr(OdrError::PeerError(format!("unexpected payload kind for a {kind} request")))
}
