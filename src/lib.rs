// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # graphtxn: Client-Side Transactions for an OCC Graph Database
//!
//! This crate drives logical transactions against a distributed graph database that exposes an
//! optimistic-concurrency-control (OCC) protocol over a remote procedure interface. It owns the
//! part of a client that has real invariants: the transaction state machine, and the algorithm
//! that folds server-returned context into the transaction so that reads stay linearizable and
//! the commit carries every conflict key the server needs to see.
//!
//! ## Core Concepts
//!
//! - [`Transaction`]: a single-use unit of work. It sequences queries, mutations and the final
//!   commit or discard, and refuses operations that are illegal in its current state.
//! - [`TxnContext`]: the value passed back and forth with every call. It holds the read
//!   snapshot (`start_ts`), the conflict keys and predicates touched so far, the per-partition
//!   read markers ([`LinRead`]) and an opaque consistency hash.
//! - [`context::merge`]: the context merger. Token sets grow by union, read markers by
//!   per-partition maximum, and the start timestamp is adopted once and then pinned.
//! - [`Transport`]: the seam to the network. This crate never opens a connection itself; you
//!   implement the four remote operations (query, mutate, commit-or-abort, login) on top of
//!   whatever RPC stack you use.
//!
//! ## Lifecycle
//!
//! ```text
//!            query / mutate / do_request
//!              ┌──────────┐
//!              ▼          │
//!         ┌─────────┐─────┘   commit (ok)       ┌───────────┐
//!  new ──▶│ ACTIVE  │────────────────────────▶ │ COMMITTED │
//!         └─────────┘                           └───────────┘
//!           │     │   commit (conflict)         ┌───────────┐
//!           │     └───────────────────────────▶ │  ABORTED  │
//!           │                                   └───────────┘
//!           │         discard                   ┌───────────┐
//!           └─────────────────────────────────▶ │ DISCARDED │
//!                                               └───────────┘
//! ```
//!
//! Terminal states are final. Every operation other than [`Transaction::discard`] fails with
//! an [`IllegalState`] error once the transaction has finished, and `discard` itself becomes a
//! no-op, so it is always safe to call from a cleanup path.
//!
//! ## Getting Started
//!
//! ```rust
//! use graphtxn::{
//!     CallOptions, Client, Credentials, Jwt, Mutation, Request, Response, Transport,
//!     TransportError, TxnContext, txn_context,
//! };
//!
//! // A transport that acknowledges everything, standing in for a real RPC client.
//! struct Loopback;
//!
//! impl Transport for Loopback {
//!     fn query(&self, _req: Request, _opts: &CallOptions) -> Result<Response, TransportError> {
//!         Ok(Response {
//!             txn: txn_context!(start_ts: 5, keys: ["0x1-name"], preds: ["1-name"], lin_read: {1 => 3}),
//!             ..Response::default()
//!         })
//!     }
//!
//!     fn commit_or_abort(
//!         &self,
//!         ctx: TxnContext,
//!         _opts: &CallOptions,
//!     ) -> Result<TxnContext, TransportError> {
//!         Ok(ctx)
//!     }
//!
//!     fn login(&self, _creds: &Credentials, _opts: &CallOptions) -> Result<Jwt, TransportError> {
//!         Ok(Jwt::default())
//!     }
//! }
//!
//! let client = Client::new(Loopback);
//! let mut txn = client.new_txn();
//!
//! let mutation = Mutation::new().set_nquads(r#"_:alice <name> "Alice" ."#);
//! txn.mutate(mutation)?;
//! txn.commit()?;
//!
//! // Discarding after commit is a no-op, so it can live in a cleanup path.
//! txn.discard();
//! # Ok::<(), graphtxn::TxnError>(())
//! ```
//!
//! ## Retries
//!
//! A commit that loses a write-write conflict fails with [`TxnError::Aborted`]. The transaction
//! is then finished; the caller decides whether to start a new transaction and replay the work.
//! This crate never retries on your behalf.
//!
//! ## Concurrency
//!
//! A [`Transaction`] is driven by one owner, one call at a time: every call both consumes and
//! produces the context, and the `&mut self` receivers make interleaving impossible without
//! an explicit lock. Independent transactions created from the same [`Client`] carry disjoint
//! contexts and can run in parallel; the server resolves conflicts between them at commit.
//!
//! ## Features
//!
//! - `json`: Enables typed JSON payloads (`Mutation::set_json_value`, `Response::json`) via
//!   `serde_json`. This feature is enabled by default.
//! - `serde`: Provides `serde` support for contexts and wire types.
//! - `arbitrary`: Implements `quickcheck::Arbitrary` for contexts, useful for property-based testing.
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

use ahash::RandomState;
use std::{
    hash::BuildHasher,
    sync::atomic::{AtomicBool, Ordering},
};

// Use a constant seed for hashing so that token iteration order is reproducible in tests.
pub(crate) const DETERMINISTIC_HASHER: RandomState = RandomState::with_seeds(48, 1516, 23, 42);

pub mod client;
pub use client::Client;
pub mod context;
pub use context::{LinRead, TokenSet, TxnContext};
pub mod error;
pub use error::{ConfigError, IllegalState, Result, TxnError};
/// Macros usable for tests and mock transports
pub mod macros;
pub mod mutation;
pub use mutation::{Mutation, MutationPart};
pub mod request;
pub use request::{Latency, Request, Response, Variables};
#[cfg(any(test, feature = "arbitrary"))]
mod test_util;
pub mod transport;
pub use transport::{
    CallOptions, Credentials, Jwt, Metadata, Transport, TransportError, TransportErrorKind,
};
pub mod txn;
pub use txn::{Transaction, TxnOptions, TxnState};

static ENABLE_DETERMINISM: AtomicBool = AtomicBool::new(false);

/// Makes all hash-based collections iterate deterministically.
///
/// This should only be enabled for testing, as it increases the odds of DoS
/// scenarios.
#[doc(hidden)]
pub fn enable_determinism() {
    ENABLE_DETERMINISM.store(true, Ordering::Release);
}

/// Checks if determinism is enabled.
///
/// Should be used internally and for testing.
#[doc(hidden)]
pub fn determinism_enabled() -> bool {
    ENABLE_DETERMINISM.load(Ordering::Acquire)
}

/// Create a random state for a hash set.
/// If `enable_determinism` has been used, this will return a deterministic
/// decidedly non-random RandomState, useful in tests.
#[inline]
fn make_random_state() -> RandomState {
    if determinism_enabled() {
        DETERMINISTIC_HASHER
    } else {
        RandomState::new()
    }
}

/// This is a small wrapper around the ahash RandomState.
/// This allows us to easily switch to a non-random RandomState for use in tests.
#[derive(Clone, Debug)]
pub struct TxnRandomState {
    inner: RandomState,
}

// Falls back on regular ahash::RandomState except when 'enable_determinism'
// has been called, in which case a static only-for-test RandomState is used.
impl Default for TxnRandomState {
    #[inline]
    fn default() -> Self {
        Self {
            inner: make_random_state(),
        }
    }
}

impl BuildHasher for TxnRandomState {
    type Hasher = <RandomState as BuildHasher>::Hasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        self.inner.build_hasher()
    }
}
