use crate::{error::Result, events::EventType, notification::Notification, notifier::Inner};
use lds_utils::channel::RingReceiver;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

pub type SubscriptionId = u64;

/// The receiving end of a subscription to one [`EventType`].
///
/// The subscription deregisters from its notifier when dropped or explicitly unsubscribed.
pub struct Subscription {
    id: SubscriptionId,
    event: EventType,
    receiver: RingReceiver<Notification>,
    lagged: Arc<AtomicU64>,
    notifier: Weak<Inner>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        event: EventType,
        receiver: RingReceiver<Notification>,
        lagged: Arc<AtomicU64>,
        notifier: Weak<Inner>,
    ) -> Self {
        Self { id, event, receiver, lagged, notifier }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn event_type(&self) -> EventType {
        self.event
    }

    /// Waits for the next notification. Fails once the subscription is closed and drained.
    pub async fn recv(&self) -> Result<Notification> {
        Ok(self.receiver.recv().await?)
    }

    pub fn try_recv(&self) -> Option<Notification> {
        self.receiver.try_recv().ok()
    }

    pub fn receiver(&self) -> &RingReceiver<Notification> {
        &self.receiver
    }

    /// Number of notifications dropped so far because this subscriber fell behind
    pub fn lagged(&self) -> u64 {
        self.lagged.load(Ordering::Relaxed)
    }

    pub fn unsubscribe(self) {
        drop(self)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(notifier) = self.notifier.upgrade() {
            notifier.remove(self.event, self.id);
        }
    }
}
