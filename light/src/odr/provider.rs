use super::request::RetrievalRequest;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// No peer could serve the request
    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Peer(String),
}

/// The peer retrieval layer. Responses are opaque serialized payloads, decoded and
/// validated by the dispatcher against the request.
#[async_trait]
pub trait RetrievalProvider: Send + Sync {
    async fn fetch(&self, request: &RetrievalRequest) -> Result<Vec<u8>, ProviderError>;
}

pub type DynRetrievalProvider = Arc<dyn RetrievalProvider>;
