//! # Message envelope and payload sum type.
//!
//! A [`MsgEnvelope`] carries begin/end logical timestamps, a set of partition
//! hash values, and a kind-specific [`Payload`]. Payloads form a tagged union
//! matched exhaustively wherever kind-specific behavior is needed; the bus
//! itself only ever reads [`MsgEnvelope::kind`] and the hash values.
//!
//! ## Example
//! ```
//! use membus::{MsgEnvelope, MsgKind, Payload, SearchRequest};
//!
//! let env = MsgEnvelope::new(Payload::SearchRequest(SearchRequest {
//!     request_id: 1,
//!     query: Vec::new(),
//!     result_channel: "0".into(),
//! }))
//! .with_timestamps(10, 20)
//! .with_hash(2);
//!
//! assert_eq!(env.kind(), MsgKind::SearchRequest);
//! assert_eq!(env.partition_key(), Some(2));
//! ```

/// Monotonic logical clock value.
pub type Timestamp = u64;

/// Message kind discriminant.
///
/// The capability set grows with the platform; matches on this enum live next
/// to payload-specific behavior, never inside the bus routing path.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgKind {
    /// A search request traveling toward query nodes.
    SearchRequest,
    /// A search result traveling back on a result channel.
    SearchResult,
}

/// Result status carried by result-kind payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Operation succeeded.
    Success,
    /// Operation failed with a numeric error code.
    Error(u32),
}

impl Status {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }
}

/// Search request payload. Opaque to the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Request identifier assigned by the originating node.
    pub request_id: u64,
    /// Serialized query plan; never inspected here.
    pub query: Vec<u8>,
    /// Channel the results should come back on. Interpreted by payload
    /// collaborators only.
    pub result_channel: String,
}

/// Search result payload. Opaque to the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Identifier of the request this result answers.
    pub request_id: u64,
    /// Outcome of the search.
    pub status: Status,
    /// Channel this result is addressed to.
    pub result_channel: String,
}

/// Kind-specific payload, one variant per message kind.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    SearchRequest(SearchRequest),
    SearchResult(SearchResult),
}

impl Payload {
    /// Returns the kind discriminant for this payload.
    pub fn kind(&self) -> MsgKind {
        match self {
            Payload::SearchRequest(_) => MsgKind::SearchRequest,
            Payload::SearchResult(_) => MsgKind::SearchResult,
        }
    }
}

/// One logical message: timestamps, partition hash values, payload.
///
/// The hash value set is non-empty by contract; an envelope without hash
/// values cannot be partition-routed and is dropped by multi-channel produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgEnvelope {
    /// Logical timestamp at which the message's span begins.
    pub begin_ts: Timestamp,
    /// Logical timestamp at which the message's span ends.
    pub end_ts: Timestamp,
    /// Partition hash values; the first one drives routing.
    pub hash_values: Vec<u32>,
    /// Kind-specific payload.
    pub payload: Payload,
}

impl MsgEnvelope {
    /// Creates an envelope with zeroed timestamps and no hash values.
    pub fn new(payload: Payload) -> Self {
        Self {
            begin_ts: 0,
            end_ts: 0,
            hash_values: Vec::new(),
            payload,
        }
    }

    /// Sets the begin/end logical timestamps.
    #[inline]
    pub fn with_timestamps(mut self, begin: Timestamp, end: Timestamp) -> Self {
        self.begin_ts = begin;
        self.end_ts = end;
        self
    }

    /// Appends one partition hash value.
    #[inline]
    pub fn with_hash(mut self, hash: u32) -> Self {
        self.hash_values.push(hash);
        self
    }

    /// Replaces the partition hash value set.
    #[inline]
    pub fn with_hash_values(mut self, hashes: Vec<u32>) -> Self {
        self.hash_values = hashes;
        self
    }

    /// Returns the kind discriminant of the payload.
    #[inline]
    pub fn kind(&self) -> MsgKind {
        self.payload.kind()
    }

    /// Returns the hash value that drives partition routing, if any.
    #[inline]
    pub fn partition_key(&self) -> Option<u32> {
        self.hash_values.first().copied()
    }
}
