//! Message pack: the unit of transmission.
//!
//! A [`MsgPack`] is an ordered batch of envelopes delivered atomically — a
//! receiver always observes a whole pack, never a partial one. The pack-level
//! timestamps bracket the logical time span of the envelopes inside.

use super::envelope::{MsgEnvelope, Timestamp};

/// Ordered, indivisible batch of message envelopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgPack {
    /// Logical timestamp at which this pack's span begins.
    pub begin_ts: Timestamp,
    /// Logical timestamp at which this pack's span ends.
    pub end_ts: Timestamp,
    /// Envelopes in delivery order.
    pub msgs: Vec<MsgEnvelope>,
}

impl MsgPack {
    /// Creates an empty pack with zeroed timestamps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty pack spanning the given logical time range.
    pub fn with_span(begin: Timestamp, end: Timestamp) -> Self {
        Self {
            begin_ts: begin,
            end_ts: end,
            msgs: Vec::new(),
        }
    }

    /// Appends an envelope, preserving insertion order.
    #[inline]
    pub fn push(&mut self, msg: MsgEnvelope) {
        self.msgs.push(msg);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.msgs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.msgs.is_empty()
    }

    /// Iterates the envelopes in delivery order.
    pub fn iter(&self) -> impl Iterator<Item = &MsgEnvelope> {
        self.msgs.iter()
    }
}

impl From<Vec<MsgEnvelope>> for MsgPack {
    fn from(msgs: Vec<MsgEnvelope>) -> Self {
        Self {
            begin_ts: 0,
            end_ts: 0,
            msgs,
        }
    }
}
