use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};
use std::str::FromStr;

macro_rules! event_type_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident {
        $($(#[$variant_meta:meta])* $variant_name:ident $(= $val:expr)?,)*
    }) => {
        $(#[$meta])* $vis enum $name {
            $($(#[$variant_meta])* $variant_name $(= $val)?,)*
        }
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $($name::$variant_name => write!(f, stringify!($variant_name))),*
                }
            }
        }
        pub const EVENT_TYPE_ARRAY: [EventType; EVENT_COUNT] = [
            $($name::$variant_name),*
        ];
    }
}

event_type_enum! {
    /// Event type classifying subscriptions and notifications (see [`crate::notification::Notification`])
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum EventType {
        NewHeads = 0,
        NewPendingTxs,
        Logs,
        RemovedLogs,
        ChainSide,
        Chain,
    }
}

pub const EVENT_COUNT: usize = 6;

impl EventType {
    /// Returns `true` for event types carrying logs, which subscriptions may filter
    pub fn carries_logs(self) -> bool {
        matches!(self, EventType::Logs | EventType::RemovedLogs)
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new-heads" => Ok(EventType::NewHeads),
            "new-pending-txs" => Ok(EventType::NewPendingTxs),
            "logs" => Ok(EventType::Logs),
            "removed-logs" => Ok(EventType::RemovedLogs),
            "chain-side" => Ok(EventType::ChainSide),
            "chain" => Ok(EventType::Chain),
            _ => Err(Error::InvalidEventType(s.to_string())),
        }
    }
}

/// Generic array with [`EventType`] strongly-typed index
#[derive(Default, Clone, Copy, Debug)]
pub struct EventArray<T>([T; EVENT_COUNT]);

impl<T> EventArray<T> {
    pub fn from_fn<F>(cb: F) -> Self
    where
        F: FnMut(usize) -> T,
    {
        let array: [T; EVENT_COUNT] = core::array::from_fn(cb);
        Self(array)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventType, &T)> {
        EVENT_TYPE_ARRAY.iter().map(move |event| (*event, &self[*event]))
    }
}

impl<T> Index<EventType> for EventArray<T> {
    type Output = T;

    fn index(&self, index: EventType) -> &Self::Output {
        let idx = index as usize;
        &self.0[idx]
    }
}

impl<T> IndexMut<EventType> for EventArray<T> {
    fn index_mut(&mut self, index: EventType) -> &mut Self::Output {
        let idx = index as usize;
        &mut self.0[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_indexing() {
        assert_eq!(EVENT_TYPE_ARRAY.len(), EVENT_COUNT);
        let mut counters: EventArray<usize> = EventArray::default();
        counters[EventType::Logs] += 2;
        counters[EventType::Chain] += 1;
        assert_eq!(counters.iter().map(|(_, c)| *c).sum::<usize>(), 3);
        assert_eq!(counters.iter().find(|(_, c)| **c == 2).map(|(e, _)| e), Some(EventType::Logs));

        for event in EVENT_TYPE_ARRAY {
            let kebab = serde_kebab(event);
            assert_eq!(EventType::from_str(&kebab).unwrap(), event);
        }
        assert!(EventType::from_str("block-added").is_err());
    }

    fn serde_kebab(event: EventType) -> String {
        event.to_string().chars().fold(String::new(), |mut s, c| {
            if c.is_uppercase() && !s.is_empty() {
                s.push('-');
            }
            s.push(c.to_ascii_lowercase());
            s
        })
    }
}
