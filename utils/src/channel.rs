use async_channel::{bounded, Receiver, Sender, TrySendError, WeakReceiver};

/// Creates a bounded `ring` channel. When the channel is full, the sender evicts the oldest
/// pending message not consumed yet by the receiver in order to make room for the new one.
/// See [`RingSender::send`].
pub fn ring<T>(capacity: usize) -> (RingSender<T>, RingReceiver<T>) {
    let (send, recv) = bounded(capacity.max(1));
    (RingSender { sender: send, receiver: recv.downgrade() }, recv)
}

pub type RingReceiver<T> = Receiver<T>;

/// Outcome of a successful [`RingSender::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingSendStatus {
    Sent,
    /// The message was queued after evicting this many older messages
    Evicted(usize),
}

/// The sending side of a [`ring`] channel.
#[derive(Clone, Debug)]
pub struct RingSender<T> {
    sender: Sender<T>,
    receiver: WeakReceiver<T>, // Avoid holding a strong receiver so that the channel will close when all actual receivers drop
}

impl<T> RingSender<T> {
    /// Sends `msg` without ever blocking. If the channel is full, the oldest queued messages are
    /// dropped until the new one fits.
    ///
    /// Returns the message back if the channel is closed.
    pub fn send(&self, mut msg: T) -> Result<RingSendStatus, T> {
        let mut evicted = 0;
        loop {
            match self.sender.try_send(msg) {
                Ok(()) if evicted == 0 => return Ok(RingSendStatus::Sent),
                Ok(()) => return Ok(RingSendStatus::Evicted(evicted)),
                Err(TrySendError::Closed(msg)) => return Err(msg),
                Err(TrySendError::Full(returned)) => {
                    msg = returned;
                    let Some(receiver) = self.receiver.upgrade() else { return Err(msg) };
                    if receiver.try_recv().is_ok() {
                        evicted += 1;
                    }
                }
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn close(&self) -> bool {
        self.sender.close()
    }

    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}
