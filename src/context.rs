// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Transaction Context
//!
//! This module provides the value that is threaded through every call a transaction makes to the
//! server, and the algorithm used to fold server responses back into it.
//!
//! - **[`TxnContext`]**: The accumulated state of one logical transaction. It carries the read
//!   snapshot (`start_ts`), the conflict keys and predicate tokens touched so far, the
//!   per-partition linearizable read markers, and the opaque consistency `hash` handed out by
//!   the server.
//!
//! - **[`LinRead`]**: A map from partition (group) id to the highest read index observed in that
//!   partition. Reads issued later in the same transaction must never observe an older index,
//!   so markers only ever move forward.
//!
//! - **[`merge`]**: The context merger. Every query, mutation or combined request returns a
//!   context delta which is joined into the local context with [`TxnContext::merge_from`]:
//!   token sets are united, read markers take the per-partition maximum, and the start
//!   timestamp is adopted once and then pinned.
//!
//! Merging forms a join-semilattice on contexts that agree on `start_ts`: it is commutative,
//! associative and idempotent, so the order in which responses are folded in does not matter.
use crate::TxnRandomState;
use std::{
    collections::{BTreeMap, HashSet, btree_map::Entry},
    fmt,
};
use tracing::error;

/// A set of opaque tokens (conflict keys or predicate names) returned by the server.
pub type TokenSet = HashSet<String, TxnRandomState>;

/// Error returned when a server-provided context cannot be joined into the local one.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum MergeError {
    /// Both contexts carry a start timestamp, and they disagree.
    ///
    /// This indicates a context was reused across transactions, which is a logic error in the
    /// caller or the transport.
    StartTsMismatch { local: u64, incoming: u64 },
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::StartTsMismatch { local, incoming } => {
                write!(f, "start timestamp mismatch: local {local}, incoming {incoming}")
            }
        }
    }
}

impl std::error::Error for MergeError {}

/// Per-partition linearizable read markers.
///
/// Keys are partition (group) ids, values are the highest read index observed for that group.
///
/// ```rust
/// # use graphtxn::LinRead;
/// let mut lin_read = LinRead::from_iter([(1, 10), (2, 4)]);
/// lin_read.merge(&LinRead::from_iter([(1, 7), (3, 2)]));
///
/// assert_eq!(lin_read.get(1), Some(10));
/// assert_eq!(lin_read.get(2), Some(4));
/// assert_eq!(lin_read.get(3), Some(2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct LinRead {
    ids: BTreeMap<u32, u64>,
}

impl LinRead {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the read marker recorded for `group`, if any.
    pub fn get(&self, group: u32) -> Option<u64> {
        self.ids.get(&group).copied()
    }

    /// Records that `group` has been read at `index`.
    ///
    /// The marker for `group` is only raised, never lowered.
    pub fn observe(&mut self, group: u32, index: u64) {
        match self.ids.entry(group) {
            Entry::Vacant(v) => {
                v.insert(index);
            }
            Entry::Occupied(mut o) => {
                if *o.get() < index {
                    o.insert(index);
                }
            }
        }
    }

    /// Joins `other` into `self` by taking the per-partition maximum.
    ///
    /// Partitions present on only one side are kept as they are.
    pub fn merge(&mut self, other: &LinRead) {
        for (&group, &index) in &other.ids {
            self.observe(group, index);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Iterates over `(group, index)` pairs in ascending group order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.ids.iter().map(|(&g, &i)| (g, i))
    }

    /// Returns true if every marker in `self` is covered by an equal or higher marker in `other`.
    pub fn is_covered_by(&self, other: &LinRead) -> bool {
        self.ids
            .iter()
            .all(|(group, index)| other.ids.get(group).is_some_and(|o| o >= index))
    }
}

impl FromIterator<(u32, u64)> for LinRead {
    fn from_iter<T: IntoIterator<Item = (u32, u64)>>(iter: T) -> Self {
        let mut lin_read = LinRead::default();
        lin_read.extend(iter);
        lin_read
    }
}

impl Extend<(u32, u64)> for LinRead {
    fn extend<T: IntoIterator<Item = (u32, u64)>>(&mut self, iter: T) {
        for (group, index) in iter {
            self.observe(group, index);
        }
    }
}

/// The state a transaction accumulates across calls, and hands back to the server at commit.
///
/// A context starts out empty (`start_ts == 0`). The first response from the server assigns the
/// start timestamp, after which it is pinned for the lifetime of the transaction.
///
/// Callers normally never build one by hand; it is owned by a
/// [`Transaction`](crate::Transaction) and exposed read-only through
/// [`Transaction::context`](crate::Transaction::context).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TxnContext {
    /// Logical timestamp marking the read snapshot. Zero means unassigned.
    pub start_ts: u64,
    /// Commit timestamp reported by the server once the transaction has committed.
    pub commit_ts: u64,
    /// Set by the server in a terminal response if the transaction did not commit.
    pub aborted: bool,
    /// Conflict-detection keys accumulated from mutations.
    pub keys: TokenSet,
    /// Predicate/partition tokens accumulated from queries and mutations.
    pub preds: TokenSet,
    /// Linearizable read markers, merged by per-partition maximum.
    pub lin_read: LinRead,
    /// Opaque server-assigned consistency token.
    pub hash: String,
}

impl TxnContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context whose read snapshot is already fixed.
    ///
    /// Used for read-only transactions that reuse a known snapshot.
    pub fn with_start_ts(start_ts: u64) -> Self {
        Self {
            start_ts,
            ..Self::default()
        }
    }

    /// Returns true if no server response has been folded in yet.
    pub fn is_empty(&self) -> bool {
        self.start_ts == 0
            && self.keys.is_empty()
            && self.preds.is_empty()
            && self.lin_read.is_empty()
            && self.hash.is_empty()
    }

    /// Joins a server-returned context into `self`.
    ///
    /// On error, `self` is left untouched.
    ///
    /// ```rust
    /// # use graphtxn::{TxnContext, context::MergeError};
    /// let mut local = TxnContext::with_start_ts(7);
    /// let mut incoming = TxnContext::with_start_ts(7);
    /// incoming.keys.insert("k1".into());
    /// incoming.lin_read.observe(1, 3);
    ///
    /// local.merge_from(&incoming).unwrap();
    /// assert!(local.keys.contains("k1"));
    /// assert_eq!(local.lin_read.get(1), Some(3));
    ///
    /// let stale = TxnContext::with_start_ts(8);
    /// assert_eq!(
    ///     local.merge_from(&stale),
    ///     Err(MergeError::StartTsMismatch { local: 7, incoming: 8 })
    /// );
    /// ```
    pub fn merge_from(&mut self, incoming: &TxnContext) -> Result<(), MergeError> {
        // an incoming zero carries no timestamp information, so it never conflicts
        if self.start_ts != 0 && incoming.start_ts != 0 && self.start_ts != incoming.start_ts {
            error!(
                local = self.start_ts,
                incoming = incoming.start_ts,
                "refusing to merge contexts from different transactions"
            );
            return Err(MergeError::StartTsMismatch {
                local: self.start_ts,
                incoming: incoming.start_ts,
            });
        }

        if self.start_ts == 0 {
            self.start_ts = incoming.start_ts;
        }
        if incoming.commit_ts != 0 {
            self.commit_ts = incoming.commit_ts;
        }
        self.keys.extend(incoming.keys.iter().cloned());
        self.preds.extend(incoming.preds.iter().cloned());
        self.lin_read.merge(&incoming.lin_read);
        if !incoming.hash.is_empty() {
            self.hash.clone_from(&incoming.hash);
        }
        Ok(())
    }

    /// Builds the context sent with a commit or abort call.
    ///
    /// Only the fields the server needs to decide the outcome are carried over.
    pub fn for_commit(&self) -> TxnContext {
        TxnContext {
            start_ts: self.start_ts,
            keys: self.keys.clone(),
            preds: self.preds.clone(),
            hash: self.hash.clone(),
            ..TxnContext::default()
        }
    }

    /// Returns the conflict keys in a stable order.
    pub fn sorted_keys(&self) -> Vec<&str> {
        let mut keys: Vec<_> = self.keys.iter().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Returns the predicate tokens in a stable order.
    pub fn sorted_preds(&self) -> Vec<&str> {
        let mut preds: Vec<_> = self.preds.iter().map(String::as_str).collect();
        preds.sort_unstable();
        preds
    }
}

/// Joins `incoming` into a copy of `local`, returning the merged context.
///
/// This is the pure form of [`TxnContext::merge_from`].
pub fn merge(local: &TxnContext, incoming: &TxnContext) -> Result<TxnContext, MergeError> {
    let mut merged = local.clone();
    merged.merge_from(incoming)?;
    Ok(merged)
}
