use crate::{
    bloombits::BloomSection,
    config::Config,
    odr::{state_key, RetrievalPayload, RetrievalRequest, StateValue},
};
use arc_swap::ArcSwap;
use lds_chain_core::{BlockBody, ChainHead, Difficulty, Header, Receipt};
use lds_core::debug;
use lds_database::{
    prelude::{
        BatchDbWriter, CachePolicy, CachedDbAccess, CachedDbItem, DirectDbWriter, StoreError, StoreResult, StoreResultExt, DB,
    },
    registry::DatabaseStorePrefixes,
};
use lds_hashes::Hash;
use parking_lot::{Mutex, MutexGuard};
use rocksdb::WriteBatch;
use std::sync::Arc;

/// Big-endian height key, so that keys of a prefix iterate in height order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct NumberKey([u8; 8]);

impl From<u64> for NumberKey {
    fn from(value: u64) -> Self {
        Self(value.to_be_bytes())
    }
}

impl AsRef<[u8]> for NumberKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// An immutable view of the canonical head. Readers always observe the header together with
/// the matching [`ChainHead`].
#[derive(Debug, Clone)]
pub struct HeadSnapshot {
    pub header: Arc<Header>,
    pub head: ChainHead,
}

impl HeadSnapshot {
    pub fn new(header: Arc<Header>, td: Difficulty) -> Self {
        let head = ChainHead::new(header.hash, header.number, td);
        Self { header, head }
    }
}

/// The local store of a light client: headers and their canonical index, retrieved bodies,
/// receipts, state entries and bloom sections, plus the current head.
pub struct ChainStore {
    db: Arc<DB>,
    headers: CachedDbAccess<Hash, Arc<Header>>,
    header_numbers: CachedDbAccess<Hash, u64>,
    canonical_hashes: CachedDbAccess<NumberKey, Hash>,
    total_difficulties: CachedDbAccess<Hash, Difficulty>,
    bodies: CachedDbAccess<Hash, Arc<BlockBody>>,
    receipts: CachedDbAccess<Hash, Arc<Vec<Receipt>>>,
    state: CachedDbAccess<Hash, StateValue>,
    sections: CachedDbAccess<NumberKey, Arc<BloomSection>>,
    head_hash: CachedDbItem<Hash>,

    head: ArcSwap<HeadSnapshot>,
    writer: Mutex<()>,
    section_size: u64,
}

impl ChainStore {
    /// Opens the store over `db`. An empty store is initialized with `genesis` as its head,
    /// otherwise the persisted head is loaded.
    pub fn new(db: Arc<DB>, config: &Config, genesis: Header) -> StoreResult<Self> {
        let headers = CachedDbAccess::new(db.clone(), CachePolicy::Count(config.header_cache_size), DatabaseStorePrefixes::Headers.into());
        let header_numbers =
            CachedDbAccess::new(db.clone(), CachePolicy::Count(config.header_cache_size), DatabaseStorePrefixes::HeaderNumbers.into());
        let canonical_hashes =
            CachedDbAccess::new(db.clone(), CachePolicy::Count(config.header_cache_size), DatabaseStorePrefixes::CanonicalHashes.into());
        let total_difficulties =
            CachedDbAccess::new(db.clone(), CachePolicy::Count(config.header_cache_size), DatabaseStorePrefixes::TotalDifficulties.into());
        let bodies = CachedDbAccess::new(db.clone(), CachePolicy::Count(config.receipt_cache_size), DatabaseStorePrefixes::BlockBodies.into());
        let receipts = CachedDbAccess::new(db.clone(), CachePolicy::Count(config.receipt_cache_size), DatabaseStorePrefixes::Receipts.into());
        let state = CachedDbAccess::new(db.clone(), CachePolicy::Count(config.state_cache_size), DatabaseStorePrefixes::StateEntries.into());
        // Sections are small in number and immutable, so a modest count bound suffices
        let sections = CachedDbAccess::new(db.clone(), CachePolicy::Count(64), DatabaseStorePrefixes::BloomSections.into());
        let head_hash = CachedDbItem::new(db.clone(), DatabaseStorePrefixes::HeadHash.into());

        let snapshot = match head_hash.read().optional()? {
            Some(hash) => {
                let header: Arc<Header> = headers.read(hash)?;
                let td = total_difficulties.read(hash)?;
                debug!("Chain store loaded head #{} {}", header.number, header.hash);
                HeadSnapshot::new(header, td)
            }
            None => {
                if genesis.number != 0 || !genesis.is_sealed() {
                    return Err(StoreError::DataInconsistency(format!("invalid genesis header #{} {}", genesis.number, genesis.hash)));
                }
                let genesis = Arc::new(genesis);
                let td = genesis.difficulty;
                let mut batch = WriteBatch::default();
                headers.write(BatchDbWriter::new(&mut batch), genesis.hash, genesis.clone())?;
                header_numbers.write(BatchDbWriter::new(&mut batch), genesis.hash, 0)?;
                total_difficulties.write(BatchDbWriter::new(&mut batch), genesis.hash, td)?;
                canonical_hashes.write(BatchDbWriter::new(&mut batch), NumberKey::from(0), genesis.hash)?;
                head_hash.write(BatchDbWriter::new(&mut batch), &genesis.hash)?;
                db.write(batch)?;
                debug!("Chain store initialized with genesis {}", genesis.hash);
                HeadSnapshot::new(genesis, td)
            }
        };

        Ok(Self {
            db,
            headers,
            header_numbers,
            canonical_hashes,
            total_difficulties,
            bodies,
            receipts,
            state,
            sections,
            head_hash,
            head: ArcSwap::from_pointee(snapshot),
            writer: Mutex::new(()),
            section_size: config.bloom_section_size,
        })
    }

    pub fn head(&self) -> Arc<HeadSnapshot> {
        self.head.load_full()
    }

    pub fn section_size(&self) -> u64 {
        self.section_size
    }

    /// Number of bloom sections entirely at or below the current head
    pub fn complete_sections(&self) -> u64 {
        (self.head().head.number + 1) / self.section_size
    }

    pub fn header(&self, hash: Hash) -> StoreResult<Option<Arc<Header>>> {
        self.headers.read(hash).optional()
    }

    pub fn has_header(&self, hash: Hash) -> StoreResult<bool> {
        self.headers.has(hash)
    }

    pub fn number_by_hash(&self, hash: Hash) -> StoreResult<Option<u64>> {
        self.header_numbers.read(hash).optional()
    }

    pub fn td(&self, hash: Hash) -> StoreResult<Option<Difficulty>> {
        self.total_difficulties.read(hash).optional()
    }

    /// The canonical hash at `number`, if `number` is at or below the head and known locally
    pub fn canonical_hash(&self, number: u64) -> StoreResult<Option<Hash>> {
        if number > self.head().head.number {
            return Ok(None);
        }
        self.canonical_hashes.read(number.into()).optional()
    }

    pub fn canonical_header(&self, number: u64) -> StoreResult<Option<Arc<Header>>> {
        match self.canonical_hash(number)? {
            Some(hash) => self.header(hash),
            None => Ok(None),
        }
    }

    pub fn body(&self, hash: Hash) -> StoreResult<Option<Arc<BlockBody>>> {
        self.bodies.read(hash).optional()
    }

    pub fn receipts(&self, hash: Hash) -> StoreResult<Option<Arc<Vec<Receipt>>>> {
        self.receipts.read(hash).optional()
    }

    pub fn section(&self, index: u64) -> StoreResult<Option<Arc<BloomSection>>> {
        self.sections.read(index.into()).optional()
    }

    /// Answers a request from local data only
    pub fn lookup(&self, request: &RetrievalRequest) -> StoreResult<Option<RetrievalPayload>> {
        Ok(match request {
            RetrievalRequest::HeaderByNumber(number) => self.canonical_header(*number)?.map(RetrievalPayload::Header),
            RetrievalRequest::HeaderByHash(hash) => self.header(*hash)?.map(RetrievalPayload::Header),
            RetrievalRequest::Body { hash, .. } => self.body(*hash)?.map(RetrievalPayload::Body),
            RetrievalRequest::Receipts { hash, .. } => self.receipts(*hash)?.map(RetrievalPayload::Receipts),
            RetrievalRequest::State { state_root, address, slot, .. } => {
                self.state.read(state_key(*state_root, *address, *slot)).optional()?.map(RetrievalPayload::State)
            }
            RetrievalRequest::BloomSection { index } => self.section(*index)?.map(RetrievalPayload::BloomSection),
        })
    }

    /// Persists a validated retrieval result so that later lookups of `request` are local hits
    pub fn commit(&self, request: &RetrievalRequest, payload: &RetrievalPayload) -> StoreResult<()> {
        match (request, payload) {
            (RetrievalRequest::HeaderByNumber(number), RetrievalPayload::Header(header)) => {
                let _guard = self.writer.lock();
                let mut batch = WriteBatch::default();
                self.write_header(&mut batch, header)?;
                // The head may have changed since the header was validated. A late answer is only
                // canonicalized while it still links to the canonical chain at or below the head.
                if self.links_to_canonical(header)? {
                    self.canonical_hashes.write(BatchDbWriter::new(&mut batch), (*number).into(), header.hash)?;
                }
                self.db.write(batch)?;
            }
            (RetrievalRequest::HeaderByHash(_), RetrievalPayload::Header(header)) => {
                let _guard = self.writer.lock();
                let mut batch = WriteBatch::default();
                self.write_header(&mut batch, header)?;
                self.db.write(batch)?;
            }
            (RetrievalRequest::Body { hash, .. }, RetrievalPayload::Body(body)) => {
                self.bodies.write(DirectDbWriter::new(&self.db), *hash, body.clone())?;
            }
            (RetrievalRequest::Receipts { hash, .. }, RetrievalPayload::Receipts(receipts)) => {
                self.receipts.write(DirectDbWriter::new(&self.db), *hash, receipts.clone())?;
            }
            (RetrievalRequest::State { state_root, address, slot, .. }, RetrievalPayload::State(value)) => {
                self.state.write(DirectDbWriter::new(&self.db), state_key(*state_root, *address, *slot), *value)?;
            }
            (RetrievalRequest::BloomSection { index }, RetrievalPayload::BloomSection(section)) => {
                let _guard = self.writer.lock();
                if !self.sections.has((*index).into())? {
                    self.sections.write(DirectDbWriter::new(&self.db), (*index).into(), section.clone())?;
                }
            }
            _ => return Err(StoreError::DataInconsistency(format!("payload kind does not match request {request}"))),
        }
        Ok(())
    }

    /// Whether `header` is the head or the parent of the canonical header one height above it
    fn links_to_canonical(&self, header: &Header) -> StoreResult<bool> {
        let head = self.head();
        if header.number >= head.head.number {
            return Ok(header.hash == head.head.hash);
        }
        Ok(self.canonical_header(header.number + 1)?.is_some_and(|child| child.parent_hash == header.hash))
    }

    /// Locks out other head and canonical index writers for the guard lifetime
    pub(crate) fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.writer.lock()
    }

    /// Writes a header, its number and, if the parent total difficulty is known, its own total difficulty.
    /// Returns the total difficulty, if known.
    pub(crate) fn write_header(&self, batch: &mut WriteBatch, header: &Arc<Header>) -> StoreResult<Option<Difficulty>> {
        let td = match self.td(header.hash)? {
            Some(td) => Some(td),
            None => self.td(header.parent_hash)?.map(|parent_td| parent_td + header.difficulty),
        };
        self.headers.write(BatchDbWriter::new(batch), header.hash, header.clone())?;
        self.header_numbers.write(BatchDbWriter::new(batch), header.hash, header.number)?;
        if let Some(td) = td {
            self.total_difficulties.write(BatchDbWriter::new(batch), header.hash, td)?;
        }
        Ok(td)
    }

    /// Writes a header together with a total difficulty taken on trust rather than derived from its parent
    pub(crate) fn write_trusted_header(&self, batch: &mut WriteBatch, header: &Arc<Header>, td: Difficulty) -> StoreResult<()> {
        self.headers.write(BatchDbWriter::new(batch), header.hash, header.clone())?;
        self.header_numbers.write(BatchDbWriter::new(batch), header.hash, header.number)?;
        self.total_difficulties.write(BatchDbWriter::new(batch), header.hash, td)
    }

    pub(crate) fn set_canonical(&self, batch: &mut WriteBatch, number: u64, hash: Hash) -> StoreResult<()> {
        self.canonical_hashes.write(BatchDbWriter::new(batch), number.into(), hash)
    }

    pub(crate) fn delete_canonical(&self, batch: &mut WriteBatch, number: u64) -> StoreResult<()> {
        self.canonical_hashes.delete(BatchDbWriter::new(batch), number.into())
    }

    /// Reads the canonical index regardless of the current head
    pub(crate) fn raw_canonical_hash(&self, number: u64) -> StoreResult<Option<Hash>> {
        self.canonical_hashes.read(number.into()).optional()
    }

    pub(crate) fn commit_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        Ok(self.db.write(batch)?)
    }

    /// Applies `batch` together with the new head hash and then publishes the new head snapshot.
    /// Callers must hold the [`Self::write_guard`].
    pub(crate) fn commit_head(&self, mut batch: WriteBatch, header: Arc<Header>, td: Difficulty) -> StoreResult<Arc<HeadSnapshot>> {
        self.head_hash.write(BatchDbWriter::new(&mut batch), &header.hash)?;
        self.db.write(batch)?;
        let snapshot = Arc::new(HeadSnapshot::new(header, td));
        self.head.store(snapshot.clone());
        Ok(snapshot)
    }
}
