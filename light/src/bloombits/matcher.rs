use super::session::{InterruptReason, MatcherError, MatcherSession};
use crate::{
    chain::LightChain,
    config::Config,
    odr::{OdrError, OdrResult, RetrievalRequest},
};
use lds_chain_core::{filter::BloomPattern, receipt::derive_log_fields, Header, Log, LogFilter};
use lds_core::{debug, trace};
use lds_utils::triggers::{CancelSignal, SingleTrigger};
use std::{collections::BTreeMap, sync::Arc};

/// Bloom index availability: the section size and the number of complete sections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomStatus {
    pub section_size: u64,
    pub sections: u64,
}

/// A section-aligned slice of a search range
#[derive(Debug, Clone, Copy)]
struct SectionTask {
    seq: u64,
    section: u64,
    from: u64,
    to: u64,
    /// Whether the section is complete and searched through the bloom index, or searched
    /// block by block against header blooms
    indexed: bool,
}

struct TaskOutcome {
    seq: u64,
    to: u64,
    result: OdrResult<Vec<Log>>,
}

fn plan(from: u64, to: u64, section_size: u64, complete_sections: u64) -> impl Iterator<Item = SectionTask> {
    (from / section_size..=to / section_size).enumerate().map(move |(seq, section)| SectionTask {
        seq: seq as u64,
        section,
        from: from.max(section * section_size),
        to: to.min(section * section_size + section_size - 1),
        indexed: section < complete_sections,
    })
}

/// Runs log searches over the bloom index.
///
/// Every session splits its range into section tasks, fed by a producer through a bounded
/// queue to a pool of workers. Workers test the filter's bloom pattern against the blooms of
/// a section, confirm candidates against the actual receipts and hand the matches to a merger
/// which releases them in range order.
pub struct Matcher {
    chain: Arc<LightChain>,
    threads: usize,
    queue_capacity: usize,
    stream_capacity: usize,
}

impl Matcher {
    pub fn new(chain: Arc<LightChain>, config: &Config) -> Self {
        Self {
            chain,
            threads: config.bloom_filter_threads.max(1),
            queue_capacity: config.bloom_queue_capacity.max(1),
            stream_capacity: config.result_stream_capacity.max(1),
        }
    }

    pub fn with_threads(self, threads: usize) -> Self {
        Self { threads: threads.max(1), ..self }
    }

    pub fn bloom_status(&self) -> BloomStatus {
        let store = self.chain.store();
        BloomStatus { section_size: store.section_size(), sections: store.complete_sections() }
    }

    /// Starts searching `[from, to]` for logs matching `filter`. The range must be non-empty and
    /// end at or below the current head.
    pub fn start_session(&self, filter: LogFilter, from: u64, to: u64) -> Result<MatcherSession, MatcherError> {
        // The halt listener guards exactly the head the range is checked against
        let (head, halt) = self.chain.head_with_halt_listener();
        if from > to || to > head.number {
            return Err(MatcherError::InvalidRange(from, to));
        }
        let section_size = self.chain.store().section_size();
        let complete_sections = (head.number + 1) / section_size;

        let user = SingleTrigger::new();
        let stop = SingleTrigger::new();
        let signal = CancelSignal::from(&user).with(stop.listener.clone()).with(halt.clone());
        let filter = Arc::new(filter);
        let pattern = Arc::new(filter.bloom_pattern());

        let (task_sender, task_receiver) = async_channel::bounded::<SectionTask>(self.queue_capacity);
        let (outcome_sender, outcome_receiver) = async_channel::bounded::<TaskOutcome>(self.threads);
        let (stream_sender, stream_receiver) = async_channel::bounded(self.stream_capacity);
        debug!("Log search session started over [{from}, {to}] with {} workers", self.threads);

        // Producer
        {
            let signal = signal.clone();
            tokio::spawn(async move {
                for task in plan(from, to, section_size, complete_sections) {
                    tokio::select! {
                        biased;
                        _ = signal.cancelled() => break,
                        sent = task_sender.send(task) => if sent.is_err() { break },
                    }
                }
            });
        }

        // Workers
        for worker in 0..self.threads {
            let (chain, filter, pattern, signal) = (self.chain.clone(), filter.clone(), pattern.clone(), signal.clone());
            let (task_receiver, outcome_sender) = (task_receiver.clone(), outcome_sender.clone());
            tokio::spawn(async move {
                loop {
                    let task = tokio::select! {
                        biased;
                        _ = signal.cancelled() => break,
                        task = task_receiver.recv() => match task {
                            Ok(task) => task,
                            Err(_) => break,
                        },
                    };
                    trace!("Log search worker {worker} scanning section {} [{}, {}]", task.section, task.from, task.to);
                    let result = scan(&chain, &filter, &pattern, task, &signal).await;
                    let outcome = TaskOutcome { seq: task.seq, to: task.to, result };
                    tokio::select! {
                        biased;
                        _ = signal.cancelled() => break,
                        sent = outcome_sender.send(outcome) => if sent.is_err() { break },
                    }
                }
            });
        }
        drop(outcome_sender);

        // Merger
        {
            let user_signal = CancelSignal::from(&user);
            tokio::spawn(async move {
                let mut buffer: BTreeMap<u64, TaskOutcome> = BTreeMap::new();
                let mut next_seq = 0u64;
                let mut last_block: Option<u64> = None;
                let mut failure: Option<OdrError> = None;
                'merge: loop {
                    let outcome = tokio::select! {
                        biased;
                        _ = signal.cancelled() => break,
                        outcome = outcome_receiver.recv() => match outcome {
                            Ok(outcome) => outcome,
                            Err(_) => break,
                        },
                    };
                    buffer.insert(outcome.seq, outcome);
                    while let Some(outcome) = buffer.remove(&next_seq) {
                        match outcome.result {
                            Ok(logs) => {
                                for log in logs {
                                    tokio::select! {
                                        biased;
                                        _ = signal.cancelled() => break 'merge,
                                        sent = stream_sender.send(Ok(log)) => if sent.is_err() { break 'merge },
                                    }
                                }
                                last_block = Some(outcome.to);
                                next_seq += 1;
                            }
                            Err(err) => {
                                failure = Some(err);
                                break 'merge;
                            }
                        }
                    }
                }
                // Stop the producer and the workers in any case
                stop.trigger.trigger();

                if !user_signal.is_cancelled() {
                    if let Some(reason) = interrupt_reason(last_block == Some(to), halt.is_triggered(), failure) {
                        debug!("Log search session interrupted after block {last_block:?}: {reason}");
                        let marker = Err(MatcherError::Interrupted { last_block, reason });
                        tokio::select! {
                            biased;
                            _ = user_signal.cancelled() => {}
                            _ = stream_sender.send(marker) => {}
                        }
                    } else {
                        debug!("Log search session completed, last block {last_block:?}");
                    }
                }
            });
        }

        Ok(MatcherSession::new(stream_receiver, user))
    }
}

/// Why a session ended before delivering its whole range, if it did. A fully drained range
/// completes normally even if the head was rolled back meanwhile.
fn interrupt_reason(complete: bool, halted: bool, failure: Option<OdrError>) -> Option<InterruptReason> {
    match failure {
        _ if complete => None,
        _ if halted => Some(InterruptReason::Halted),
        Some(err) => Some(InterruptReason::Retrieval(err)),
        None => None,
    }
}

/// Searches one section task, returning its confirmed matches in block and log order
async fn scan(chain: &LightChain, filter: &LogFilter, pattern: &BloomPattern, task: SectionTask, signal: &CancelSignal) -> OdrResult<Vec<Log>> {
    let odr = chain.odr();
    let section_size = chain.store().section_size();
    let mut logs = Vec::new();
    if task.indexed {
        if chain.store().section(task.section)?.is_none() {
            chain.section_headers(task.section, signal).await?;
        }
        let section = odr
            .resolve(RetrievalRequest::BloomSection { index: task.section }, signal)
            .await?
            .into_bloom_section()
            .ok_or_else(|| OdrError::PeerError("unexpected payload for a bloom section".to_owned()))?;
        for number in task.from..=task.to {
            if section.bloom_of(number, section_size).is_some_and(|bloom| pattern.matches(bloom)) {
                let header = canonical_header(chain, number, signal).await?;
                // The section bloom may be a false positive, which the header bloom tells early
                if pattern.matches(&header.logs_bloom) {
                    confirm(chain, filter, &header, signal, &mut logs).await?;
                }
            }
        }
    } else {
        for number in task.from..=task.to {
            let header = canonical_header(chain, number, signal).await?;
            if pattern.matches(&header.logs_bloom) {
                confirm(chain, filter, &header, signal, &mut logs).await?;
            }
        }
    }
    Ok(logs)
}

async fn canonical_header(chain: &LightChain, number: u64, signal: &CancelSignal) -> OdrResult<Arc<Header>> {
    // Planned ranges end at or below the head it was checked against, so a miss means a rollback
    chain.header_by_number_odr(number, signal).await?.ok_or(OdrError::NotFound)
}

/// Matches the actual logs of a candidate block, dropping bloom false positives
async fn confirm(chain: &LightChain, filter: &LogFilter, header: &Header, signal: &CancelSignal, logs: &mut Vec<Log>) -> OdrResult<()> {
    let receipts = chain
        .odr()
        .resolve(RetrievalRequest::receipts(header), signal)
        .await?
        .into_receipts()
        .ok_or_else(|| OdrError::PeerError("unexpected payload for receipts".to_owned()))?;
    let mut receipts = receipts.as_ref().clone();
    derive_log_fields(&mut receipts, header.hash, header.number);
    let before = logs.len();
    logs.extend(receipts.into_iter().flat_map(|receipt| receipt.logs).filter(|log| filter.matches(log)));
    if logs.len() == before {
        trace!("Block #{} was a bloom false positive", header.number);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_is_section_aligned() {
        let tasks = plan(95, 123, 10, 12).collect::<Vec<_>>();
        let ranges = tasks.iter().map(|t| (t.seq, t.section, t.from, t.to, t.indexed)).collect::<Vec<_>>();
        assert_eq!(
            ranges,
            vec![
                (0, 9, 95, 99, true),
                (1, 10, 100, 109, true),
                (2, 11, 110, 119, true),
                (3, 12, 120, 123, false)
            ]
        );
        assert_eq!(plan(7, 7, 10, 0).count(), 1);
    }

    #[test]
    fn test_interrupt_reason_after_drain() {
        // A halt racing the last outcome does not turn a complete search into an interrupted one
        assert!(interrupt_reason(true, true, None).is_none());
        assert!(interrupt_reason(true, false, None).is_none());
        assert!(matches!(interrupt_reason(false, true, None), Some(InterruptReason::Halted)));
        assert!(matches!(interrupt_reason(false, true, Some(OdrError::Cancelled)), Some(InterruptReason::Halted)));
        assert!(matches!(interrupt_reason(false, false, Some(OdrError::Timeout)), Some(InterruptReason::Retrieval(OdrError::Timeout))));
        assert!(interrupt_reason(false, false, None).is_none());
    }
}
