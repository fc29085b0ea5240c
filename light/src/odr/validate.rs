use super::{
    error::{OdrError, OdrResult},
    request::{RetrievalPayload, RetrievalRequest, StateEntry, StateValue},
};
use crate::{bloombits::BloomSection, store::ChainStore};
use lds_chain_core::{receipt::receipts_root, tx::transactions_root, BlockBody, Header, Receipt};
use serde::de::DeserializeOwned;
use std::sync::Arc;

fn decode<T: DeserializeOwned>(request: &RetrievalRequest, bytes: &[u8]) -> OdrResult<T> {
    bincode::deserialize(bytes).map_err(|err| OdrError::PeerError(format!("malformed {} response: {err}", request.kind())))
}

fn reject(request: &RetrievalRequest, reason: impl std::fmt::Display) -> OdrError {
    OdrError::PeerError(format!("invalid response to {request}: {reason}"))
}

/// Decodes a raw peer response and validates it against the request and the local chain
pub(crate) fn decode_and_validate(request: &RetrievalRequest, bytes: &[u8], store: &ChainStore) -> OdrResult<RetrievalPayload> {
    match request {
        RetrievalRequest::HeaderByNumber(number) => {
            // No canonical header exists above the head, whatever the peer served
            if *number > store.head().head.number {
                return Err(OdrError::NotFound);
            }
            let header: Header = decode(request, bytes)?;
            if header.number != *number {
                return Err(reject(request, format_args!("got header #{}", header.number)));
            }
            validate_seal(request, &header)?;
            validate_canonical_link(request, &header, store)?;
            Ok(RetrievalPayload::Header(Arc::new(header)))
        }
        RetrievalRequest::HeaderByHash(hash) => {
            let header: Header = decode(request, bytes)?;
            if header.hash != *hash {
                return Err(reject(request, format_args!("got header {}", header.hash)));
            }
            validate_seal(request, &header)?;
            Ok(RetrievalPayload::Header(Arc::new(header)))
        }
        RetrievalRequest::Body { transactions_root: expected, .. } => {
            let body: BlockBody = decode(request, bytes)?;
            if transactions_root(&body.transactions) != *expected {
                return Err(reject(request, "transactions root mismatch"));
            }
            Ok(RetrievalPayload::Body(Arc::new(body)))
        }
        RetrievalRequest::Receipts { receipts_root: expected, .. } => {
            let receipts: Vec<Receipt> = decode(request, bytes)?;
            if receipts_root(&receipts) != *expected {
                return Err(reject(request, "receipts root mismatch"));
            }
            Ok(RetrievalPayload::Receipts(Arc::new(receipts)))
        }
        RetrievalRequest::State { state_root, address, slot, .. } => {
            let entry: StateEntry = decode(request, bytes)?;
            if entry.state_root != *state_root || entry.address != *address || entry.slot != *slot {
                return Err(reject(request, "state entry does not echo the requested key"));
            }
            match (slot, entry.value) {
                (None, StateValue::Account(_)) | (Some(_), StateValue::Storage(_)) => Ok(RetrievalPayload::State(entry.value)),
                _ => Err(reject(request, "state entry kind mismatch")),
            }
        }
        RetrievalRequest::BloomSection { index } => {
            let section: BloomSection = decode(request, bytes)?;
            let section_size = store.section_size();
            if section.index != *index {
                return Err(reject(request, format_args!("got section {}", section.index)));
            }
            if section.blooms.len() as u64 != section_size {
                return Err(reject(request, format_args!("expected {} blooms, got {}", section_size, section.blooms.len())));
            }
            let first = index * section_size;
            // Every bloom is checked against the canonical header it covers, which must be known locally
            for (offset, bloom) in section.blooms.iter().enumerate() {
                let number = first + offset as u64;
                let Some(header) = store.canonical_header(number)? else {
                    return Err(reject(request, format_args!("block #{number} is not known locally, section cannot be verified")));
                };
                if header.logs_bloom != *bloom {
                    return Err(reject(request, format_args!("bloom of block #{number} does not match its header")));
                }
            }
            Ok(RetrievalPayload::BloomSection(Arc::new(section)))
        }
    }
}

/// A header served by number is accepted only when it is the parent of the canonical header one
/// height above, or is the head itself. Heights above the head have no canonical header at all.
fn validate_canonical_link(request: &RetrievalRequest, header: &Header, store: &ChainStore) -> OdrResult<()> {
    let head = store.head();
    if header.number > head.head.number {
        return Err(OdrError::NotFound);
    }
    if header.number == head.head.number {
        return match header.hash == head.head.hash {
            true => Ok(()),
            false => Err(reject(request, "header is not the local head")),
        };
    }
    let child = match header.number.checked_add(1) {
        Some(number) => store.canonical_header(number)?,
        None => None,
    };
    match child {
        Some(child) if child.parent_hash == header.hash => Ok(()),
        Some(_) => Err(reject(request, "header does not link to the local canonical chain")),
        None => Err(reject(request, "no canonical child is known locally to link the header to")),
    }
}

fn validate_seal(request: &RetrievalRequest, header: &Header) -> OdrResult<()> {
    match header.is_sealed() {
        true => Ok(()),
        false => Err(reject(request, "header hash does not match its content")),
    }
}
