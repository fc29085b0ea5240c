use crate::{
    events::{EventArray, EventType, EVENT_TYPE_ARRAY},
    notification::Notification,
    subscription::{Subscription, SubscriptionId},
};
use lds_chain_core::LogFilter;
use lds_core::{debug, trace};
use lds_utils::channel::{ring, RingSendStatus, RingSender};
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

struct Subscriber {
    sender: RingSender<Notification>,
    filter: Option<LogFilter>,
    lagged: Arc<AtomicU64>,
}

pub(crate) struct Inner {
    subscribers: RwLock<EventArray<HashMap<SubscriptionId, Subscriber>>>,
    next_id: AtomicU64,
    capacity: usize,
    closed: AtomicBool,
}

impl Inner {
    pub(crate) fn remove(&self, event: EventType, id: SubscriptionId) -> bool {
        let removed = self.subscribers.write()[event].remove(&id);
        if let Some(subscriber) = removed.as_ref() {
            subscriber.sender.close();
            debug!("Notifier removed subscription {id} to {event}");
        }
        removed.is_some()
    }
}

/// Fans out chain and pool events to subscribers.
///
/// Every subscription owns a bounded channel of `capacity` notifications. Notifying never
/// blocks: when a subscriber falls behind, its oldest queued notifications are dropped and
/// counted as lagged on the subscription.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: Default::default(),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Registers a new subscription to `event`. The optional filter applies to log events only.
    pub fn subscribe(&self, event: EventType, filter: Option<LogFilter>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = ring(self.inner.capacity);
        let lagged = Arc::new(AtomicU64::new(0));
        if self.inner.closed.load(Ordering::Acquire) {
            sender.close();
        } else {
            let subscriber = Subscriber { sender, filter: filter.filter(|_| event.carries_logs()), lagged: lagged.clone() };
            self.inner.subscribers.write()[event].insert(id, subscriber);
            debug!("Notifier registered subscription {id} to {event}");
        }
        Subscription::new(id, event, receiver, lagged, Arc::downgrade(&self.inner))
    }

    /// Removes a subscription, closing its channel. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, event: EventType, id: SubscriptionId) -> bool {
        self.inner.remove(event, id)
    }

    /// Delivers `notification` to every subscriber of its event type without blocking
    pub fn notify(&self, notification: Notification) {
        let event = notification.event_type();
        let mut purge: Vec<SubscriptionId> = Vec::new();
        {
            let subscribers = self.inner.subscribers.read();
            for (id, subscriber) in subscribers[event].iter() {
                let item = match subscriber.filter.as_ref() {
                    Some(filter) => match notification.apply_filter(filter) {
                        Some(item) => item,
                        None => continue,
                    },
                    None => notification.clone(),
                };
                match subscriber.sender.send(item) {
                    Ok(RingSendStatus::Sent) => {}
                    Ok(RingSendStatus::Evicted(count)) => {
                        subscriber.lagged.fetch_add(count as u64, Ordering::Relaxed);
                        debug!("Notifier dropped {count} queued notification(s) of lagging subscription {id} to {event}");
                    }
                    Err(_) => {
                        trace!("Notifier could not send {notification} to subscription {id} because its channel is closed - removing it");
                        purge.push(*id);
                    }
                }
            }
        }
        if !purge.is_empty() {
            let mut subscribers = self.inner.subscribers.write();
            purge.drain(..).for_each(|id| {
                subscribers[event].remove(&id);
            });
        }
    }

    pub fn subscriber_count(&self, event: EventType) -> usize {
        self.inner.subscribers.read()[event].len()
    }

    /// Closes all subscriptions. Later subscriptions are created closed.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let mut subscribers = self.inner.subscribers.write();
        for event in EVENT_TYPE_ARRAY {
            subscribers[event].drain().for_each(|(_, subscriber)| {
                subscriber.sender.close();
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use lds_chain_core::{Address, Header, Log};
    use lds_hashes::Hash;

    fn header(number: u64) -> Arc<Header> {
        let mut header = Header { number, ..dummy_header() };
        header.finalize();
        Arc::new(header)
    }

    fn dummy_header() -> Header {
        Header::new_finalized(
            Hash::ZERO,
            0,
            0,
            Address::ZERO,
            Hash::ZERO,
            Hash::ZERO,
            Hash::ZERO,
            Default::default(),
            0,
            0,
            0,
            vec![],
        )
    }

    #[tokio::test]
    async fn test_fan_out() {
        let notifier = Notifier::new(8);
        let heads_a = notifier.subscribe(EventType::NewHeads, None);
        let heads_b = notifier.subscribe(EventType::NewHeads, None);
        let side = notifier.subscribe(EventType::ChainSide, None);
        assert_eq!(notifier.subscriber_count(EventType::NewHeads), 2);

        notifier.notify(Notification::NewHeads(header(1)));
        for sub in [&heads_a, &heads_b] {
            let Notification::NewHeads(h) = sub.recv().await.unwrap() else { panic!("unexpected notification kind") };
            assert_eq!(h.number, 1);
        }
        assert!(side.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_log_subscription_filter() {
        let notifier = Notifier::new(8);
        let sub = notifier.subscribe(EventType::Logs, Some(LogFilter::with_address(Address::repeat_byte(7))));
        notifier.notify(Notification::Logs(Arc::new(vec![Log::new(Address::repeat_byte(1), vec![], vec![])])));
        notifier.notify(Notification::Logs(Arc::new(vec![
            Log::new(Address::repeat_byte(1), vec![], vec![]),
            Log::new(Address::repeat_byte(7), vec![], vec![]),
        ])));
        let Notification::Logs(logs) = sub.recv().await.unwrap() else { panic!("unexpected notification kind") };
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].address, Address::repeat_byte(7));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let notifier = Notifier::new(2);
        let sub = notifier.subscribe(EventType::NewHeads, None);
        (1..=5).for_each(|n| notifier.notify(Notification::NewHeads(header(n))));
        assert_eq!(sub.lagged(), 3);
        let received = std::iter::from_fn(|| sub.try_recv())
            .map(|n| match n {
                Notification::NewHeads(h) => h.number,
                _ => unreachable!(),
            })
            .collect::<Vec<_>>();
        assert_eq!(received, vec![4, 5]);
    }

    #[tokio::test]
    async fn test_unsubscribe_and_purge() {
        let notifier = Notifier::new(2);
        let dropped = notifier.subscribe(EventType::Chain, None);
        let closed = notifier.subscribe(EventType::Chain, None);
        let kept = notifier.subscribe(EventType::Chain, None);
        assert_eq!(notifier.subscriber_count(EventType::Chain), 3);

        drop(dropped);
        assert_eq!(notifier.subscriber_count(EventType::Chain), 2);

        // A subscriber closing its own end is purged on the next fan-out
        closed.receiver().close();
        notifier.notify(Notification::Chain(header(3)));
        assert_eq!(notifier.subscriber_count(EventType::Chain), 1);
        assert!(kept.try_recv().is_some());

        let id = kept.id();
        assert!(notifier.unsubscribe(EventType::Chain, id));
        assert!(!notifier.unsubscribe(EventType::Chain, id));
        assert_eq!(kept.recv().await, Err(Error::ChannelRecvError));

        notifier.close();
        let late = notifier.subscribe(EventType::Chain, None);
        assert_eq!(notifier.subscriber_count(EventType::Chain), 0);
        assert!(late.recv().await.is_err());
    }
}
