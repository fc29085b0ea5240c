use std::{
    future::{poll_fn, Future},
    pin::Pin,
    task::Poll,
};
pub use triggered::{Listener, Trigger};

/// Wrapper containing a single Trigger instance
#[derive(Debug, Clone)]
pub struct SingleTrigger {
    pub trigger: Trigger,
    pub listener: Listener,
}

impl SingleTrigger {
    pub fn new() -> SingleTrigger {
        let (trigger, listener) = triggered::trigger();
        SingleTrigger { trigger, listener }
    }

    pub fn is_triggered(&self) -> bool {
        self.listener.is_triggered()
    }
}

impl Default for SingleTrigger {
    fn default() -> Self {
        Self::new()
    }
}

/// A cancellation signal observed by long running queries.
///
/// Fires when any of its listeners fires. A query is usually bound to its own trigger plus
/// a shared one (e.g. a node shutdown or a chain head rollback).
#[derive(Debug, Clone)]
pub struct CancelSignal {
    listeners: Vec<Listener>,
}

impl CancelSignal {
    pub fn new(listener: Listener) -> Self {
        Self { listeners: vec![listener] }
    }

    /// A signal that never fires, for callers with no cancellation scope
    pub fn never() -> Self {
        Self { listeners: vec![] }
    }

    /// Returns a signal firing on either this signal or `listener`
    pub fn with(mut self, listener: Listener) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.listeners.iter().any(|x| x.is_triggered())
    }

    /// Completes once the signal fires. Pends forever for [`CancelSignal::never`].
    pub async fn cancelled(&self) {
        match self.listeners.len() {
            0 => std::future::pending().await,
            1 => self.listeners[0].clone().await,
            _ => {
                let mut listeners = self.listeners.iter().cloned().map(Box::pin).collect::<Vec<Pin<Box<Listener>>>>();
                poll_fn(|cx| match listeners.iter_mut().any(|x| x.as_mut().poll(cx).is_ready()) {
                    true => Poll::Ready(()),
                    false => Poll::Pending,
                })
                .await
            }
        }
    }
}

impl From<Listener> for CancelSignal {
    fn from(listener: Listener) -> Self {
        Self::new(listener)
    }
}

impl From<&SingleTrigger> for CancelSignal {
    fn from(trigger: &SingleTrigger) -> Self {
        Self::new(trigger.listener.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_signal() {
        let a = SingleTrigger::new();
        let b = SingleTrigger::new();
        let signal = CancelSignal::from(&a).with(b.listener.clone());
        assert!(!signal.is_cancelled());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        b.trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(signal.is_cancelled());
        assert!(!a.is_triggered());
    }

    #[tokio::test]
    async fn test_never_signal() {
        let signal = CancelSignal::never();
        assert!(!signal.is_cancelled());
        assert!(tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await.is_err());
    }
}
