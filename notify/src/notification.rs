use crate::events::EventType;
use lds_chain_core::{Header, Log, LogFilter};
use lds_hashes::Hash;
use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// A new canonical head
    NewHeads(Arc<Header>),
    /// Hashes of transactions entering the pool
    NewPendingTxs(Arc<Vec<Hash>>),
    Logs(Arc<Vec<Log>>),
    /// Logs reverted by a reorganization, all flagged as removed
    RemovedLogs(Arc<Vec<Log>>),
    /// A header imported on a non-canonical branch
    ChainSide(Arc<Header>),
    /// A header that became part of the canonical chain
    Chain(Arc<Header>),
}

impl Notification {
    pub fn event_type(&self) -> EventType {
        match self {
            Notification::NewHeads(_) => EventType::NewHeads,
            Notification::NewPendingTxs(_) => EventType::NewPendingTxs,
            Notification::Logs(_) => EventType::Logs,
            Notification::RemovedLogs(_) => EventType::RemovedLogs,
            Notification::ChainSide(_) => EventType::ChainSide,
            Notification::Chain(_) => EventType::Chain,
        }
    }

    /// Applies a subscription filter. Only log notifications are affected; `None` means nothing
    /// is left to deliver.
    pub fn apply_filter(&self, filter: &LogFilter) -> Option<Notification> {
        let filter_logs = |logs: &Arc<Vec<Log>>| -> Option<Arc<Vec<Log>>> {
            if logs.iter().all(|log| filter.matches(log)) {
                return (!logs.is_empty()).then(|| logs.clone());
            }
            let filtered = logs.iter().filter(|log| filter.matches(log)).cloned().collect::<Vec<_>>();
            (!filtered.is_empty()).then(|| Arc::new(filtered))
        };
        match self {
            Notification::Logs(logs) => filter_logs(logs).map(Notification::Logs),
            Notification::RemovedLogs(logs) => filter_logs(logs).map(Notification::RemovedLogs),
            _ => Some(self.clone()),
        }
    }
}

impl Display for Notification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Notification::NewHeads(header) | Notification::ChainSide(header) | Notification::Chain(header) => {
                write!(f, "{} #{} {}", self.event_type(), header.number, header.hash)
            }
            Notification::NewPendingTxs(hashes) => write!(f, "{} ({} txs)", self.event_type(), hashes.len()),
            Notification::Logs(logs) | Notification::RemovedLogs(logs) => write!(f, "{} ({} logs)", self.event_type(), logs.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lds_chain_core::Address;

    #[test]
    fn test_log_filtering() {
        let logs = Arc::new(vec![
            Log::new(Address::repeat_byte(1), vec![], vec![]),
            Log::new(Address::repeat_byte(2), vec![], vec![]),
            Log::new(Address::repeat_byte(1), vec![], vec![1]),
        ]);
        let notification = Notification::Logs(logs.clone());

        let filtered = notification.apply_filter(&LogFilter::with_address(Address::repeat_byte(1))).unwrap();
        let Notification::Logs(filtered) = filtered else { panic!("unexpected notification kind") };
        assert_eq!(filtered.len(), 2);

        // A filter matching everything shares the original payload
        let Some(Notification::Logs(all)) = notification.apply_filter(&LogFilter::default()) else { panic!() };
        assert!(Arc::ptr_eq(&all, &logs));

        assert!(notification.apply_filter(&LogFilter::with_address(Address::repeat_byte(3))).is_none());
        assert!(Notification::NewPendingTxs(Default::default()).apply_filter(&LogFilter::with_address(Address::ZERO)).is_some());
    }
}
