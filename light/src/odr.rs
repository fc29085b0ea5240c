//! On-demand retrieval (ODR) of chain data from remote full-node peers

mod dispatcher;
mod error;
mod provider;
mod request;
mod validate;

pub use dispatcher::OdrDispatcher;
pub use error::{OdrError, OdrResult};
pub use provider::{DynRetrievalProvider, ProviderError, RetrievalProvider};
pub use request::{state_key, RetrievalPayload, RetrievalRequest, StateEntry, StateValue};
