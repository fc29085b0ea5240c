use super::{
    error::{OdrError, OdrResult},
    provider::{DynRetrievalProvider, ProviderError},
    request::{RetrievalPayload, RetrievalRequest},
    validate::decode_and_validate,
};
use crate::store::ChainStore;
use futures::future::{BoxFuture, FutureExt, Shared};
use lds_core::{debug, trace, warn};
use lds_utils::triggers::CancelSignal;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

type SharedDispatch = Shared<BoxFuture<'static, OdrResult<RetrievalPayload>>>;

struct InFlight {
    id: u64,
    dispatch: SharedDispatch,
}

type InFlightTable = Arc<Mutex<HashMap<RetrievalRequest, InFlight>>>;

/// Removes the in-flight entry of a dispatch when the dispatch task ends, however it ends.
/// The entry is only removed if it still belongs to this dispatch.
struct DispatchScope {
    table: InFlightTable,
    request: RetrievalRequest,
    id: u64,
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        let mut table = self.table.lock();
        if table.get(&self.request).is_some_and(|entry| entry.id == self.id) {
            table.remove(&self.request);
        }
    }
}

/// Resolves retrieval requests from the local store or, on a miss, from remote peers.
///
/// Concurrent misses of an identical request share a single dispatch. Every dispatch runs as an
/// independent task bounded by the retrieval timeout; its validated result is committed to the
/// store before being handed to the attached callers. A caller whose cancel signal fires detaches
/// with [`OdrError::Cancelled`] while the dispatch itself keeps running for the others and for
/// the store.
pub struct OdrDispatcher {
    store: Arc<ChainStore>,
    provider: DynRetrievalProvider,
    timeout: Duration,
    in_flight: InFlightTable,
    next_id: AtomicU64,
}

impl OdrDispatcher {
    pub fn new(store: Arc<ChainStore>, provider: DynRetrievalProvider, timeout: Duration) -> Self {
        Self { store, provider, timeout, in_flight: Default::default(), next_id: AtomicU64::new(1) }
    }

    pub fn store(&self) -> &Arc<ChainStore> {
        &self.store
    }

    /// Number of dispatches currently in flight
    pub fn pending(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub async fn resolve(self: &Arc<Self>, request: RetrievalRequest, cancel: &CancelSignal) -> OdrResult<RetrievalPayload> {
        if cancel.is_cancelled() {
            return Err(OdrError::Cancelled);
        }
        if let Some(payload) = self.store.lookup(&request)? {
            return Ok(payload);
        }

        let dispatch = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(&request) {
                Some(entry) => {
                    trace!("ODR attaching to in-flight {request}");
                    entry.dispatch.clone()
                }
                None => {
                    // A dispatch of this request may have completed and left the table since the
                    // first lookup. Its result is committed before the entry is removed.
                    if let Some(payload) = self.store.lookup(&request)? {
                        return Ok(payload);
                    }
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    // The spawned task cannot remove its entry before it is inserted below since
                    // the table lock is held.
                    let task = tokio::spawn(self.clone().dispatch(id, request.clone()));
                    let dispatch = async move {
                        task.await.unwrap_or_else(|err| Err(OdrError::PeerError(format!("dispatch task failed: {err}"))))
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(request.clone(), InFlight { id, dispatch: dispatch.clone() });
                    dispatch
                }
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                trace!("ODR caller detached from {request}");
                Err(OdrError::Cancelled)
            }
            result = dispatch => result,
        }
    }

    async fn dispatch(self: Arc<Self>, id: u64, request: RetrievalRequest) -> OdrResult<RetrievalPayload> {
        let _scope = DispatchScope { table: self.in_flight.clone(), request: request.clone(), id };
        trace!("ODR dispatch {id} started for {request}");

        let bytes = match tokio::time::timeout(self.timeout, self.provider.fetch(&request)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(ProviderError::NotFound)) => {
                debug!("ODR dispatch {id}: {request} not found");
                return Err(OdrError::NotFound);
            }
            Ok(Err(ProviderError::Peer(reason))) => {
                debug!("ODR dispatch {id}: peer failure on {request}: {reason}");
                return Err(OdrError::PeerError(reason));
            }
            Err(_) => {
                debug!("ODR dispatch {id}: {request} timed out after {:?}", self.timeout);
                return Err(OdrError::Timeout);
            }
        };

        let payload = decode_and_validate(&request, &bytes, &self.store).inspect_err(|err| {
            warn!("ODR dispatch {id}: {err}");
        })?;
        self.store.commit(&request, &payload)?;
        trace!("ODR dispatch {id} completed for {request}");
        Ok(payload)
    }
}
