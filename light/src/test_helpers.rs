//! Fixtures for exercising the light client against a scripted peer layer

use crate::{
    bloombits::BloomSection,
    chain::LightChain,
    config::Config,
    odr::{OdrDispatcher, ProviderError, RetrievalProvider, RetrievalRequest},
    store::ChainStore,
};
use async_trait::async_trait;
use lds_chain_core::{
    receipt::receipts_root, tx::transactions_root, Address, BlockBody, Bloom, Difficulty, Header, Log, Receipt, Transaction,
};
use lds_database::{create_temp_db, prelude::ConnBuilder, utils::DbLifetime};
use lds_hashes::Hash;
use lds_notify::notifier::Notifier;
use parking_lot::Mutex;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc, time::Duration};

type DelayFn = Arc<dyn Fn(&RetrievalRequest, usize) -> Duration + Send + Sync>;

/// A peer layer answering from a fixed response table. Unknown requests are answered with
/// [`ProviderError::NotFound`].
pub struct ScriptedProvider {
    responses: Mutex<HashMap<RetrievalRequest, Result<Vec<u8>, ProviderError>>>,
    fetches: Mutex<HashMap<RetrievalRequest, usize>>,
    delay: Mutex<DelayFn>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self { responses: Default::default(), fetches: Default::default(), delay: Mutex::new(Arc::new(|_, _| Duration::ZERO)) }
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve<T: Serialize>(&self, request: RetrievalRequest, value: &T) {
        let bytes = bincode::serialize(value).expect("fixture values are serializable");
        self.serve_raw(request, bytes);
    }

    pub fn serve_raw(&self, request: RetrievalRequest, bytes: Vec<u8>) {
        self.responses.lock().insert(request, Ok(bytes));
    }

    pub fn fail(&self, request: RetrievalRequest, error: ProviderError) {
        self.responses.lock().insert(request, Err(error));
    }

    pub fn forget(&self, request: &RetrievalRequest) {
        self.responses.lock().remove(request);
    }

    /// Sets the response latency as a function of the request and of its fetch attempt, counted from zero
    pub fn set_delay(&self, delay: impl Fn(&RetrievalRequest, usize) -> Duration + Send + Sync + 'static) {
        *self.delay.lock() = Arc::new(delay);
    }

    pub fn fetch_count(&self, request: &RetrievalRequest) -> usize {
        self.fetches.lock().get(request).copied().unwrap_or_default()
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().values().sum()
    }
}

#[async_trait]
impl RetrievalProvider for ScriptedProvider {
    async fn fetch(&self, request: &RetrievalRequest) -> Result<Vec<u8>, ProviderError> {
        let attempt = {
            let mut fetches = self.fetches.lock();
            let count = fetches.entry(request.clone()).or_default();
            *count += 1;
            *count - 1
        };
        let delay = (self.delay.lock().clone())(request, attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.responses.lock().get(request).cloned().unwrap_or(Err(ProviderError::NotFound))
    }
}

/// A block with everything needed to serve it
#[derive(Debug, Clone)]
pub struct FixtureBlock {
    pub header: Arc<Header>,
    pub body: BlockBody,
    pub receipts: Vec<Receipt>,
}

impl FixtureBlock {
    /// Builds the child of `parent` holding a single transaction emitting `logs`. `salt` tells
    /// apart siblings and `noise` is accrued into the header bloom only, producing bloom false positives.
    pub fn child_of(parent: &Header, salt: u64, difficulty: Difficulty, logs: Vec<Log>, noise: Option<Bloom>) -> Self {
        let number = parent.number + 1;
        let tx = Transaction::new(number, Address::repeat_byte(0xaa), Some(Address::repeat_byte(0xbb)), 1, 21_000, 1, salt.to_le_bytes().to_vec());
        let receipts = vec![Receipt::new(tx.hash, true, 21_000, logs)];
        let mut bloom = Bloom::from_receipts(&receipts);
        if let Some(noise) = noise {
            bloom.accrue_bloom(&noise);
        }
        let transactions = vec![tx];
        let header = Header::new_finalized(
            parent.hash,
            number,
            parent.timestamp + 10,
            Address::repeat_byte(salt as u8),
            Hash::from_u64_word(number ^ (salt << 32)),
            transactions_root(&transactions),
            receipts_root(&receipts),
            bloom,
            difficulty,
            30_000_000,
            21_000,
            vec![],
        );
        Self { header: Arc::new(header), body: BlockBody::new(transactions), receipts }
    }

    /// Serves the block through its hash-addressed requests
    pub fn serve_by_hash(&self, provider: &ScriptedProvider) {
        provider.serve(RetrievalRequest::HeaderByHash(self.header.hash), self.header.as_ref());
        provider.serve(RetrievalRequest::body(&self.header), &self.body);
        provider.serve(RetrievalRequest::receipts(&self.header), &self.receipts);
    }
}

pub fn genesis_header() -> Header {
    Header::new_finalized(
        Hash::ZERO,
        0,
        1_600_000_000,
        Address::ZERO,
        Hash::from_u64_word(0),
        transactions_root(&[]),
        receipts_root(&[]),
        Bloom::EMPTY,
        1,
        30_000_000,
        0,
        vec![],
    )
}

/// A canonical chain of blocks `0..length`
pub struct ChainFixture {
    pub blocks: Vec<FixtureBlock>,
}

impl ChainFixture {
    pub fn build(length: u64, logs: impl Fn(u64) -> Vec<Log>, noise: impl Fn(u64) -> Option<Bloom>) -> Self {
        let genesis = genesis_header();
        let mut blocks = vec![FixtureBlock { header: Arc::new(genesis), body: BlockBody::default(), receipts: vec![] }];
        for number in 1..length {
            let block = FixtureBlock::child_of(&blocks[number as usize - 1].header, 0, 1, logs(number), noise(number));
            blocks.push(block);
        }
        Self { blocks }
    }

    pub fn linear(length: u64) -> Self {
        Self::build(length, |_| vec![], |_| None)
    }

    pub fn genesis(&self) -> Header {
        self.blocks[0].header.as_ref().clone()
    }

    pub fn header(&self, number: u64) -> &Arc<Header> {
        &self.blocks[number as usize].header
    }

    pub fn tip(&self) -> &Arc<Header> {
        &self.blocks[self.blocks.len() - 1].header
    }

    /// Builds `length` blocks forking off the canonical block `fork`, each weighing `difficulty`
    pub fn branch(&self, fork: u64, length: u64, salt: u64, difficulty: Difficulty, logs: impl Fn(u64) -> Vec<Log>) -> Vec<FixtureBlock> {
        let mut branch: Vec<FixtureBlock> = Vec::with_capacity(length as usize);
        for _ in 0..length {
            let parent = branch.last().map(|block| block.header.clone()).unwrap_or_else(|| self.header(fork).clone());
            branch.push(FixtureBlock::child_of(&parent, salt, difficulty, logs(parent.number + 1), None));
        }
        branch
    }

    /// The bloom section `index`, if the chain covers it entirely
    pub fn section(&self, index: u64, section_size: u64) -> Option<BloomSection> {
        let first = (index * section_size) as usize;
        let blocks = self.blocks.get(first..first + section_size as usize)?;
        Some(BloomSection::new(index, blocks.iter().map(|block| block.header.logs_bloom).collect()))
    }

    /// Serves every block of the chain, by height and by hash, and every complete bloom section
    pub fn serve_all(&self, provider: &ScriptedProvider, section_size: u64) {
        for block in self.blocks.iter() {
            provider.serve(RetrievalRequest::HeaderByNumber(block.header.number), block.header.as_ref());
            block.serve_by_hash(provider);
        }
        for index in 0..self.blocks.len() as u64 / section_size {
            if let Some(section) = self.section(index, section_size) {
                provider.serve(RetrievalRequest::BloomSection { index }, &section);
            }
        }
    }
}

/// A light chain over a temporary database and a scripted peer layer
pub struct TestEnv {
    pub config: Config,
    pub provider: Arc<ScriptedProvider>,
    pub notifier: Notifier,
    pub chain: Arc<LightChain>,
    // Dropped last, once nothing refers to the DB anymore
    pub lifetime: DbLifetime,
}

impl TestEnv {
    pub fn new(config: Config, genesis: Header) -> Self {
        let (lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(64));
        let store = Arc::new(ChainStore::new(db, &config, genesis).expect("a fresh store accepts a valid genesis"));
        let provider = Arc::new(ScriptedProvider::new());
        let odr = Arc::new(OdrDispatcher::new(store, provider.clone(), config.odr_timeout()));
        let notifier = Notifier::new(config.subscription_capacity);
        let chain = Arc::new(LightChain::new(odr, notifier.clone()));
        Self { config, provider, notifier, chain, lifetime }
    }

    /// Builds an environment over `fixture` whose head is the fixture tip and whose peers serve the whole fixture
    pub fn with_fixture(config: Config, fixture: &ChainFixture) -> Self {
        let env = Self::new(config, fixture.genesis());
        fixture.serve_all(&env.provider, env.config.bloom_section_size);
        for block in fixture.blocks.iter().skip(1) {
            env.chain.insert_header(block.header.as_ref().clone()).expect("fixture headers link");
        }
        env
    }

    /// Builds an environment holding the fixture headers up to `local_tip` and whose head is a checkpoint
    /// at the fixture tip. Heights in between are only known to the peers.
    pub fn with_checkpoint(config: Config, fixture: &ChainFixture, local_tip: u64) -> Self {
        let env = Self::new(config, fixture.genesis());
        fixture.serve_all(&env.provider, env.config.bloom_section_size);
        for block in fixture.blocks.iter().skip(1).take(local_tip as usize) {
            env.chain.insert_header(block.header.as_ref().clone()).expect("fixture headers link");
        }
        let tip = fixture.tip();
        // Every fixture block weighs one, genesis included
        env.chain.import_checkpoint(tip.as_ref().clone(), tip.number as Difficulty + 1).expect("the checkpoint is ahead");
        env
    }

    pub fn odr(&self) -> &Arc<OdrDispatcher> {
        self.chain.odr()
    }

    pub fn store(&self) -> &Arc<ChainStore> {
        self.chain.store()
    }
}
