use crate::{
    error::{BackendError, BackendResult},
    exec::{ExecutionContext, ExecutionContextBuilder, StateErrorAccessor},
    txpool::{DynTxPool, TxPoolContent, TxPoolStats},
};
use lds_chain_core::{Address, Block, BlockNumber, Difficulty, Header, Log, LogFilter, Message, Receipt, Transaction};
use lds_core::{debug, info};
use lds_hashes::Hash;
use lds_light::{
    bloombits::{BloomStatus, Matcher, MatcherSession},
    chain::{ChainError, LightChain},
    config::Config,
    state::LightState,
};
use lds_notify::{events::EventType, notification::Notification, notifier::Notifier, subscription::Subscription};
use lds_utils::triggers::CancelSignal;
use std::sync::Arc;

/// The single entry point of the light client data access.
///
/// Composes the local chain view and its on-demand retrieval, the log matcher, the transaction
/// pool and the event notifier. Every query taking a [`CancelSignal`] stops waiting on peers once
/// the signal fires.
pub struct LightBackend {
    config: Arc<Config>,
    chain: Arc<LightChain>,
    matcher: Matcher,
    exec: ExecutionContextBuilder,
    txpool: DynTxPool,
    notifier: Notifier,
}

impl LightBackend {
    pub fn new(config: Arc<Config>, chain: Arc<LightChain>, txpool: DynTxPool, notifier: Notifier) -> Self {
        let matcher = Matcher::new(chain.clone(), &config);
        let exec = ExecutionContextBuilder::new(chain.clone(), config.gas_cap());
        Self { config, chain, matcher, exec, txpool, notifier }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn chain(&self) -> &Arc<LightChain> {
        &self.chain
    }

    /// The head block, holding the head header only
    pub fn current_block(&self) -> Block {
        Block::from_header(self.chain.head_header())
    }

    /// Rolls the head back to `number`, halting the log searches running against the previous head
    pub fn set_head(&self, number: u64) -> BackendResult<()> {
        info!("Backend rolling head back to #{number}");
        Ok(self.chain.set_head(number)?)
    }

    pub async fn header_by_number(&self, number: BlockNumber, cancel: &CancelSignal) -> BackendResult<Option<Arc<Header>>> {
        let snapshot = self.chain.head_snapshot();
        match number {
            BlockNumber::Latest | BlockNumber::Pending => Ok(Some(snapshot.header.clone())),
            _ => Ok(self.chain.header_by_number_odr(number.resolve(snapshot.head.number), cancel).await?),
        }
    }

    /// Looks a header up locally first, then through the peers. Headers unknown to the peers yield `None`.
    pub async fn header_by_hash(&self, hash: Hash, cancel: &CancelSignal) -> BackendResult<Option<Arc<Header>>> {
        if let Some(header) = self.chain.header_by_hash(hash)? {
            return Ok(Some(header));
        }
        match self.chain.header_by_hash_odr(hash, cancel).await {
            Ok(header) => Ok(Some(header)),
            Err(err) => not_found_as_none(err.into()),
        }
    }

    pub async fn block_by_number(&self, number: BlockNumber, cancel: &CancelSignal) -> BackendResult<Option<Block>> {
        match self.header_by_number(number, cancel).await? {
            Some(header) => Ok(Some(self.chain.block_of(header, cancel).await?)),
            None => Ok(None),
        }
    }

    pub async fn block_by_hash(&self, hash: Hash, cancel: &CancelSignal) -> BackendResult<Option<Block>> {
        match self.header_by_hash(hash, cancel).await? {
            Some(header) => Ok(Some(self.chain.block_of(header, cancel).await?)),
            None => Ok(None),
        }
    }

    /// A state snapshot at the selected block, bound to `cancel`
    pub async fn state_and_header_by_number(
        &self,
        number: BlockNumber,
        cancel: &CancelSignal,
    ) -> BackendResult<Option<(Arc<LightState>, Arc<Header>)>> {
        let Some(header) = self.header_by_number(number, cancel).await? else { return Ok(None) };
        let state = Arc::new(LightState::new(self.chain.odr().clone(), header.clone(), cancel.clone()));
        Ok(Some((state, header)))
    }

    /// The receipts of block `hash`, `None` when the block number is not known locally
    pub async fn receipts(&self, hash: Hash, cancel: &CancelSignal) -> BackendResult<Option<Vec<Receipt>>> {
        let Some(header) = self.local_header(hash)? else { return Ok(None) };
        Ok(Some(self.chain.receipts_of(&header, cancel).await?))
    }

    /// The logs of block `hash` grouped by transaction, `None` when the block number is not known locally
    pub async fn logs(&self, hash: Hash, cancel: &CancelSignal) -> BackendResult<Option<Vec<Vec<Log>>>> {
        let receipts = self.receipts(hash, cancel).await?;
        Ok(receipts.map(|receipts| receipts.into_iter().map(|receipt| receipt.logs).collect()))
    }

    fn local_header(&self, hash: Hash) -> BackendResult<Option<Arc<Header>>> {
        let store = self.chain.store();
        if store.number_by_hash(hash).map_err(ChainError::from)?.is_none() {
            return Ok(None);
        }
        Ok(self.chain.header_by_hash(hash)?)
    }

    pub fn td(&self, hash: Hash) -> BackendResult<Option<Difficulty>> {
        Ok(self.chain.td_by_hash(hash)?)
    }

    /// Builds the execution context of a read-only call. Retrieval failures met during execution
    /// surface through the returned accessor.
    pub async fn execution_context(
        &self,
        message: Message,
        state: Arc<LightState>,
        header: &Header,
    ) -> (ExecutionContext, StateErrorAccessor) {
        self.exec.build(message, state, header).await
    }

    pub async fn send_tx(&self, transaction: Transaction) -> BackendResult<()> {
        let hash = transaction.hash;
        self.txpool.add(transaction).await?;
        debug!("Backend accepted transaction {hash}");
        self.notify(Notification::NewPendingTxs(Arc::new(vec![hash])));
        Ok(())
    }

    /// Adds a batch of transactions, returning one result per transaction
    pub async fn send_txs(&self, transactions: Vec<Transaction>) -> Vec<BackendResult<()>> {
        let hashes = transactions.iter().map(|tx| tx.hash).collect::<Vec<_>>();
        let results = self.txpool.add_batch(transactions).await;
        let accepted = hashes.into_iter().zip(results.iter()).filter(|(_, result)| result.is_ok()).map(|(hash, _)| hash).collect::<Vec<_>>();
        if !accepted.is_empty() {
            self.notify(Notification::NewPendingTxs(Arc::new(accepted)));
        }
        results.into_iter().map(|result| result.map_err(BackendError::from)).collect()
    }

    pub async fn remove_tx(&self, hash: Hash) -> bool {
        self.txpool.remove(hash).await
    }

    pub async fn pool_transactions(&self) -> Vec<Arc<Transaction>> {
        self.txpool.transactions().await
    }

    pub async fn pool_transaction(&self, hash: Hash) -> Option<Arc<Transaction>> {
        self.txpool.transaction(hash).await
    }

    pub async fn pool_nonce(&self, address: Address) -> BackendResult<u64> {
        Ok(self.txpool.nonce(address).await?)
    }

    /// Pool statistics. The light pool holds no queued transactions.
    pub async fn stats(&self) -> TxPoolStats {
        TxPoolStats { pending: self.txpool.stats().await, queued: 0 }
    }

    pub async fn txpool_content(&self) -> TxPoolContent {
        self.txpool.content().await
    }

    pub fn subscribe(&self, event: EventType, filter: Option<LogFilter>) -> Subscription {
        self.notifier.subscribe(event, filter)
    }

    pub fn notify(&self, notification: Notification) {
        self.notifier.notify(notification)
    }

    pub fn bloom_status(&self) -> BloomStatus {
        self.matcher.bloom_status()
    }

    /// Starts a log search over `[from, to]`, both selectors being resolved against the current head
    pub fn start_log_search(&self, filter: LogFilter, from: BlockNumber, to: BlockNumber) -> BackendResult<MatcherSession> {
        let head = self.chain.chain_head().number;
        let (from, to) = (from.resolve(head), to.resolve(head));
        if from > to || to > head {
            return Err(BackendError::InvalidRange(from, to));
        }
        Ok(self.matcher.start_session(filter, from, to)?)
    }
}

fn not_found_as_none<T>(err: BackendError) -> BackendResult<Option<T>> {
    match err.is_not_found() {
        true => Ok(None),
        false => Err(err),
    }
}
