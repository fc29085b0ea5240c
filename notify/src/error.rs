use async_channel::RecvError;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("channel receive error")]
    ChannelRecvError,

    #[error("notifier is closed")]
    NotifierClosed,

    #[error("Invalid event type: {0}")]
    InvalidEventType(String),
}

impl From<RecvError> for Error {
    fn from(_: RecvError) -> Self {
        Error::ChannelRecvError
    }
}

pub type Result<T> = std::result::Result<T, Error>;
