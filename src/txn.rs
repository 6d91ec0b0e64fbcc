// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The transaction state machine.
//!
//! A [`Transaction`] is created `Active` and finishes in exactly one of `Committed`, `Aborted` or
//! `Discarded`. While active it forwards queries and mutations to the [`Transport`] together with
//! its current [`TxnContext`], and joins every returned context back in (see
//! [`TxnContext::merge_from`]).
//!
//! # Failure Semantics
//!
//! - Local rule violations (finished transaction, mutation on a read-only transaction, empty
//!   mutation) are rejected before anything is sent.
//! - A failed transport call leaves both the context and the state untouched, so the caller can
//!   still [`discard`](Transaction::discard). The one exception is a conflict signal on a call
//!   that writes: the server has already given up on the transaction, so it moves to `Aborted`.
//! - [`discard`](Transaction::discard) never fails. It is a no-op once the transaction finished.
//!
//! # Example
//!
//! ```rust
//! # use graphtxn::{Client, Mutation, Transport, TxnError};
//! # fn transfer<T: Transport>(client: &Client<T>) -> Result<(), TxnError> {
//! let mut txn = client.new_txn();
//! let result = (|| {
//!     let balances = txn.query_with_vars(
//!         "query q($a: string) { q(func: eq(account, $a)) { uid balance } }",
//!         [("$a".to_string(), "alice".to_string())].into(),
//!     )?;
//!     txn.mutate(Mutation::new().set_json(balances.json))?;
//!     txn.commit()
//! })();
//! // always safe, whether or not the commit happened
//! txn.discard();
//! result
//! # }
//! ```
use crate::{
    CallOptions, Mutation, Request, Response, Transport, TxnContext, Variables,
    error::{ConfigError, IllegalState, Result, TxnError},
};
use std::fmt;
use tracing::{debug, instrument, warn};

/// Lifecycle state of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnState {
    Active,
    Committed,
    Aborted,
    Discarded,
}

impl TxnState {
    /// Returns true for every state except [`TxnState::Active`].
    pub fn is_terminal(self) -> bool {
        self != TxnState::Active
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxnState::Active => "active",
            TxnState::Committed => "committed",
            TxnState::Aborted => "aborted",
            TxnState::Discarded => "discarded",
        };
        f.write_str(name)
    }
}

/// Options fixed at transaction construction.
///
/// ```rust
/// # use graphtxn::{TxnOptions, ConfigError};
/// assert!(TxnOptions::new().read_only().best_effort().validate().is_ok());
/// assert_eq!(
///     TxnOptions::new().best_effort().validate(),
///     Err(ConfigError::BestEffortRequiresReadOnly)
/// );
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TxnOptions {
    /// Reject mutations locally.
    pub read_only: bool,
    /// Let the server answer reads without going through consensus. Requires `read_only`.
    pub best_effort: bool,
    /// Read at this snapshot instead of one assigned by the server. Requires `read_only` and a
    /// non-zero timestamp.
    pub start_ts: Option<u64>,
}

impl TxnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    pub fn at_snapshot(mut self, start_ts: u64) -> Self {
        self.start_ts = Some(start_ts);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.best_effort && !self.read_only {
            return Err(ConfigError::BestEffortRequiresReadOnly);
        }
        if self.start_ts.is_some() && !self.read_only {
            return Err(ConfigError::SnapshotRequiresReadOnly);
        }
        if self.start_ts == Some(0) {
            return Err(ConfigError::ZeroSnapshot);
        }
        Ok(())
    }
}

/// One logical unit of work against the database.
///
/// Transactions are single-use: once committed, aborted or discarded they reject all further
/// work. They are usually created through [`Client`](crate::Client), which hands out
/// transactions borrowing its transport.
pub struct Transaction<T>
where
    T: Transport,
{
    transport: T,
    options: TxnOptions,
    call_opts: CallOptions,
    ctx: TxnContext,
    state: TxnState,
    // whether any request carrying mutations reached the server
    mutated: bool,
}

impl<T> Transaction<T>
where
    T: Transport,
{
    /// Creates a transaction, rejecting inconsistent options up front.
    pub fn new(transport: T, options: TxnOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::from_valid_options(transport, options))
    }

    pub(crate) fn from_valid_options(transport: T, options: TxnOptions) -> Self {
        let ctx = options
            .start_ts
            .map(TxnContext::with_start_ts)
            .unwrap_or_default();
        Self {
            transport,
            options,
            call_opts: CallOptions::default(),
            ctx,
            state: TxnState::Active,
            mutated: false,
        }
    }

    /// Replaces the options forwarded with every transport call.
    pub fn with_call_options(mut self, call_opts: CallOptions) -> Self {
        self.call_opts = call_opts;
        self
    }

    pub fn state(&self) -> TxnState {
        self.state
    }

    pub fn options(&self) -> TxnOptions {
        self.options
    }

    pub fn is_read_only(&self) -> bool {
        self.options.read_only
    }

    pub fn is_best_effort(&self) -> bool {
        self.options.best_effort
    }

    /// The context accumulated so far.
    pub fn context(&self) -> &TxnContext {
        &self.ctx
    }

    /// The commit timestamp, once the server has reported one.
    pub fn commit_ts(&self) -> Option<u64> {
        (self.ctx.commit_ts != 0).then_some(self.ctx.commit_ts)
    }

    /// Returns true if a request carrying mutations has been applied by the server.
    pub fn has_mutated(&self) -> bool {
        self.mutated
    }

    /// Runs a query without variables.
    pub fn query(&mut self, query: impl Into<String>) -> Result<Response> {
        self.query_with_vars(query, Variables::new())
    }

    /// Runs a parameterized query.
    pub fn query_with_vars(&mut self, query: impl Into<String>, vars: Variables) -> Result<Response> {
        self.do_request(Request::new().query(query).vars(vars))
    }

    /// Applies a single mutation.
    ///
    /// The response carries the uids assigned to blank nodes in [`Response::uids`]. If the
    /// mutation asked to [`commit_now`](Mutation::commit_now), the transaction is committed by
    /// the same call.
    pub fn mutate(&mut self, mutation: Mutation) -> Result<Response> {
        self.do_request(Request::new().mutation(mutation))
    }

    /// Sends a combined query and mutations request.
    ///
    /// All mutations are forwarded in one call, in order. The context fields of `request` are
    /// overwritten with the transaction's own. The request commits the transaction if it, or any
    /// of its mutations, asks to [`commit_now`](Request::commit_now()).
    #[instrument(
        level = "debug",
        skip_all,
        fields(
            start_ts = self.ctx.start_ts,
            read_only = self.options.read_only,
            best_effort = self.options.best_effort,
            mutations = request.mutations.len(),
            commit_now = request.commit_now,
        )
    )]
    pub fn do_request(&mut self, mut request: Request) -> Result<Response> {
        self.ensure_active()?;

        let writes = request.has_mutations();
        if writes {
            if self.options.read_only {
                return Err(IllegalState::ReadOnlyMutation.into());
            }
            if request.mutations.iter().any(Mutation::is_empty) {
                return Err(IllegalState::EmptyMutation.into());
            }
        }

        let commit_now = request.commit_now || request.mutations.iter().any(Mutation::is_commit_now);
        request.commit_now = commit_now;
        request.read_only = self.options.read_only;
        request.best_effort = self.options.best_effort;
        request.txn = self.ctx.clone();

        let result = if writes {
            self.transport.mutate(request, &self.call_opts)
        } else {
            self.transport.query(request, &self.call_opts)
        };

        let response = match result {
            Ok(response) => response,
            Err(err) if writes && err.is_aborted() => {
                self.finish(TxnState::Aborted);
                return Err(TxnError::Aborted);
            }
            Err(err) => return Err(err.into()),
        };

        if writes {
            self.mutated = true;
        }
        if commit_now && response.txn.aborted {
            self.finish(TxnState::Aborted);
            return Err(TxnError::Aborted);
        }

        let merged = self.ctx.merge_from(&response.txn);
        if commit_now {
            // the server's verdict stands even if its context is unusable
            self.finish(TxnState::Committed);
        }
        merged?;
        Ok(response)
    }

    /// Commits the transaction.
    ///
    /// A transaction that never wrote anything commits locally without a network call. On a
    /// conflict the transaction moves to [`TxnState::Aborted`] and [`TxnError::Aborted`] is
    /// returned; on any other transport failure it stays active so it can be discarded.
    #[instrument(
        level = "debug",
        skip_all,
        fields(start_ts = self.ctx.start_ts, keys = self.ctx.keys.len())
    )]
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_active()?;

        if !self.mutated {
            self.finish(TxnState::Committed);
            return Ok(());
        }

        match self
            .transport
            .commit_or_abort(self.ctx.for_commit(), &self.call_opts)
        {
            Ok(outcome) if outcome.aborted => {
                self.finish(TxnState::Aborted);
                Err(TxnError::Aborted)
            }
            Ok(outcome) => {
                if outcome.commit_ts != 0 {
                    self.ctx.commit_ts = outcome.commit_ts;
                }
                self.finish(TxnState::Committed);
                Ok(())
            }
            Err(err) if err.is_aborted() => {
                self.finish(TxnState::Aborted);
                Err(TxnError::Aborted)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Abandons the transaction.
    ///
    /// If the transaction is active and has written anything, the server is asked to abort it.
    /// Failures of that request are logged and otherwise ignored. Calling this on a finished
    /// transaction does nothing.
    #[instrument(level = "debug", skip_all, fields(start_ts = self.ctx.start_ts, state = %self.state))]
    pub fn discard(&mut self) {
        if self.state.is_terminal() {
            return;
        }

        if self.mutated {
            let mut ctx = self.ctx.for_commit();
            ctx.aborted = true;
            if let Err(err) = self.transport.commit_or_abort(ctx, &self.call_opts) {
                warn!(%err, "failed to abort transaction, ignoring");
            }
        }
        self.finish(TxnState::Discarded);
    }

    fn ensure_active(&self) -> Result<(), IllegalState> {
        match self.state {
            TxnState::Active => Ok(()),
            finished => Err(IllegalState::Finished(finished)),
        }
    }

    fn finish(&mut self, state: TxnState) {
        debug_assert!(state.is_terminal());
        debug!(start_ts = self.ctx.start_ts, %state, "transaction finished");
        self.state = state;
    }
}

impl<T> fmt::Debug for Transaction<T>
where
    T: Transport,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("mutated", &self.mutated)
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

impl<T> Drop for Transaction<T>
where
    T: Transport,
{
    fn drop(&mut self) {
        if self.state == TxnState::Active && self.mutated {
            debug!(
                start_ts = self.ctx.start_ts,
                "transaction with writes dropped without commit or discard"
            );
        }
    }
}
