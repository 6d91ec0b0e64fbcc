// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Errors surfaced by transactions.
//!
//! Every failure is reported through [`TxnError`]. Only [`TxnError::Aborted`] is worth retrying,
//! and the retry is always the caller's decision: start a new transaction and replay the work.
use crate::{TxnState, context::MergeError, transport::TransportError};
use std::fmt;

/// Result type for transaction operations.
pub type Result<T, E = TxnError> = std::result::Result<T, E>;

/// Illegal combination of transaction options, detected at construction.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ConfigError {
    /// Best-effort reads skip the consensus read path, which is only sound without writes.
    BestEffortRequiresReadOnly,
    /// Pinning a start timestamp is only sound when the transaction never writes.
    SnapshotRequiresReadOnly,
    /// Timestamp zero means "not assigned yet" and cannot pin a snapshot.
    ZeroSnapshot,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BestEffortRequiresReadOnly => {
                write!(f, "best-effort transactions must also be read-only")
            }
            ConfigError::SnapshotRequiresReadOnly => {
                write!(f, "only read-only transactions can start at a fixed snapshot")
            }
            ConfigError::ZeroSnapshot => write!(f, "snapshot timestamp must be non-zero"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Operation rejected locally, before any network call.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum IllegalState {
    /// The transaction already reached the given terminal state.
    Finished(TxnState),
    /// Mutations are not allowed on read-only transactions.
    ReadOnlyMutation,
    /// A mutation was submitted without any set or delete payload.
    EmptyMutation,
}

impl fmt::Display for IllegalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IllegalState::Finished(state) => {
                write!(f, "transaction has already been {state}")
            }
            IllegalState::ReadOnlyMutation => {
                write!(f, "mutations are not allowed in a read-only transaction")
            }
            IllegalState::EmptyMutation => write!(f, "mutation has no set or delete payload"),
        }
    }
}

impl std::error::Error for IllegalState {}

/// Errors returned by [`Transaction`](crate::Transaction) and [`Client`](crate::Client).
#[derive(Debug)]
pub enum TxnError {
    /// The transaction options are inconsistent.
    Configuration(ConfigError),
    /// The operation is not allowed in the transaction's current state or mode.
    IllegalState(IllegalState),
    /// The server rejected the commit because of a conflicting concurrent writer.
    ///
    /// The transaction is finished. Retrying means starting a new one.
    Aborted,
    /// The server returned a context that cannot belong to this transaction.
    Merge(MergeError),
    /// The transport failed; nothing was applied locally.
    Transport(TransportError),
}

impl TxnError {
    /// Returns true if replaying the work in a fresh transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TxnError::Aborted)
    }
}

impl fmt::Display for TxnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxnError::Configuration(err) => write!(f, "invalid transaction options: {err}"),
            TxnError::IllegalState(err) => write!(f, "illegal operation: {err}"),
            TxnError::Aborted => write!(f, "transaction has been aborted, please retry"),
            TxnError::Merge(err) => write!(f, "corrupt transaction context: {err}"),
            TxnError::Transport(err) => write!(f, "transport error: {err}"),
        }
    }
}

impl std::error::Error for TxnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TxnError::Configuration(err) => Some(err),
            TxnError::IllegalState(err) => Some(err),
            TxnError::Aborted => None,
            TxnError::Merge(err) => Some(err),
            TxnError::Transport(err) => Some(err),
        }
    }
}

impl From<ConfigError> for TxnError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value)
    }
}

impl From<IllegalState> for TxnError {
    fn from(value: IllegalState) -> Self {
        Self::IllegalState(value)
    }
}

impl From<MergeError> for TxnError {
    fn from(value: MergeError) -> Self {
        Self::Merge(value)
    }
}

impl From<TransportError> for TxnError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}
