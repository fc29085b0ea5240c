use crate::odr::OdrError;
use async_channel::Receiver;
use lds_chain_core::Log;
use lds_utils::triggers::SingleTrigger;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Why a log search stopped before covering its whole range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterruptReason {
    Retrieval(OdrError),
    /// The chain head was rolled back while searching
    Halted,
}

impl Display for InterruptReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InterruptReason::Retrieval(err) => write!(f, "{err}"),
            InterruptReason::Halted => f.write_str("chain head rolled back"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatcherError {
    #[error("invalid block range [{0}, {1}]")]
    InvalidRange(u64, u64),

    /// `last_block` is the last block whose matches were all emitted before the interruption
    #[error("log search interrupted ({reason}), last complete block: {last_block:?}")]
    Interrupted { last_block: Option<u64>, reason: InterruptReason },
}

impl MatcherError {
    pub fn last_block(&self) -> Option<u64> {
        match self {
            MatcherError::InvalidRange(..) => None,
            MatcherError::Interrupted { last_block, .. } => *last_block,
        }
    }
}

/// Cancels a running log search session
#[derive(Debug, Clone)]
pub struct CancelHandle {
    trigger: SingleTrigger,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.trigger.trigger.trigger();
    }

    pub fn is_cancelled(&self) -> bool {
        self.trigger.is_triggered()
    }
}

/// The ordered matches of a log search, ascending by block number and log index.
///
/// The stream ends cleanly once the range is covered or after yielding a single [`MatcherError`].
/// Nothing is yielded once the session is cancelled. Dropping the stream cancels the session.
pub struct LogStream {
    receiver: Receiver<Result<Log, MatcherError>>,
    cancel: SingleTrigger,
    done: bool,
}

impl LogStream {
    pub async fn next(&mut self) -> Option<Result<Log, MatcherError>> {
        if self.done || self.cancel.is_triggered() {
            self.done = true;
            return None;
        }
        let item = tokio::select! {
            biased;
            _ = self.cancel.listener.clone() => None,
            item = self.receiver.recv() => item.ok(),
        };
        if self.cancel.is_triggered() {
            self.done = true;
            return None;
        }
        match item {
            Some(Ok(log)) => Some(Ok(log)),
            Some(Err(err)) => {
                self.done = true;
                Some(Err(err))
            }
            None => {
                self.done = true;
                None
            }
        }
    }

    /// Drains the stream, returning all matches and the terminating error, if any
    pub async fn collect(mut self) -> (Vec<Log>, Option<MatcherError>) {
        let mut logs = Vec::new();
        while let Some(item) = self.next().await {
            match item {
                Ok(log) => logs.push(log),
                Err(err) => return (logs, Some(err)),
            }
        }
        (logs, None)
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        self.cancel.trigger.trigger();
    }
}

/// A running log search: its result stream and the handle cancelling it
pub struct MatcherSession {
    stream: LogStream,
    cancel: CancelHandle,
}

impl MatcherSession {
    pub(crate) fn new(receiver: Receiver<Result<Log, MatcherError>>, cancel: SingleTrigger) -> Self {
        Self { stream: LogStream { receiver, cancel: cancel.clone(), done: false }, cancel: CancelHandle { trigger: cancel } }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel()
    }

    pub async fn next(&mut self) -> Option<Result<Log, MatcherError>> {
        self.stream.next().await
    }

    pub fn into_parts(self) -> (LogStream, CancelHandle) {
        (self.stream, self.cancel)
    }
}
