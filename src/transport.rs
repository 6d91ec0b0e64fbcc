// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The seam between transactions and the network.
//!
//! Implement [`Transport`] on top of your RPC stack. The transaction logic calls it
//! synchronously, one call at a time per transaction, and expects every failure to be reported
//! as a [`TransportError`]. A failed call must not have been applied by the server in any way
//! the client could observe; the transaction relies on that to keep its context unchanged.
//!
//! Deadlines, cancellation and request metadata (such as access tokens) travel in
//! [`CallOptions`], which the transaction forwards untouched.
use crate::{Request, Response, TxnContext};
use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

/// Request headers forwarded verbatim with every call.
pub type Metadata = BTreeMap<String, String>;

/// Metadata key under which the access token obtained by login is sent.
pub const ACCESS_TOKEN_KEY: &str = "accessJwt";

/// Per-call settings the transport is expected to honour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Give up on the call after this long, reporting [`TransportErrorKind::DeadlineExceeded`].
    pub timeout: Option<Duration>,
    pub metadata: Metadata,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn access_token(&self) -> Option<&str> {
        self.metadata.get(ACCESS_TOKEN_KEY).map(String::as_str)
    }
}

/// Login credentials.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub password: String,
    /// Namespace (tenant) to log into. Zero is the default namespace.
    pub namespace: u64,
    /// Refresh token to exchange for a new access token instead of using the password.
    pub refresh_token: Option<String>,
}

// keep secrets out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// Tokens returned by a successful login.
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct Jwt {
    pub access_jwt: String,
    pub refresh_jwt: String,
}

impl fmt::Debug for Jwt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jwt").finish_non_exhaustive()
    }
}

/// Broad classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The server could not be reached.
    Unavailable,
    /// The call's deadline passed before it completed.
    DeadlineExceeded,
    /// The call was cancelled by the caller.
    Cancelled,
    /// The server aborted the transaction because of a conflict.
    Aborted,
    Unauthenticated,
    PermissionDenied,
    /// The server rejected the request as malformed (for example, a query syntax error).
    InvalidArgument,
    Internal,
    Unknown,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Unavailable => "unavailable",
            TransportErrorKind::DeadlineExceeded => "deadline exceeded",
            TransportErrorKind::Cancelled => "cancelled",
            TransportErrorKind::Aborted => "aborted",
            TransportErrorKind::Unauthenticated => "unauthenticated",
            TransportErrorKind::PermissionDenied => "permission denied",
            TransportErrorKind::InvalidArgument => "invalid argument",
            TransportErrorKind::Internal => "internal",
            TransportErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Error returned by a [`Transport`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if the server signalled a transaction conflict.
    pub fn is_aborted(&self) -> bool {
        self.kind == TransportErrorKind::Aborted
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TransportError {}

/// The remote operations a transaction needs.
///
/// Every method blocks until the server has answered or the call failed.
pub trait Transport {
    /// Runs a request. The request may carry mutations; the server treats it as a combined
    /// query-and-mutate call in that case.
    fn query(&self, req: Request, opts: &CallOptions) -> Result<Response, TransportError>;

    /// Applies the mutations in `req`.
    ///
    /// Servers that accept mutations through the query endpoint need not override this.
    fn mutate(&self, req: Request, opts: &CallOptions) -> Result<Response, TransportError> {
        self.query(req, opts)
    }

    /// Commits (`ctx.aborted == false`) or aborts (`ctx.aborted == true`) the transaction
    /// identified by `ctx`.
    ///
    /// On commit, the returned context has `aborted` set if the server rejected the commit.
    /// Servers may instead report the conflict as a [`TransportErrorKind::Aborted`] error.
    fn commit_or_abort(
        &self,
        ctx: TxnContext,
        opts: &CallOptions,
    ) -> Result<TxnContext, TransportError>;

    /// Exchanges credentials for access tokens.
    fn login(&self, creds: &Credentials, opts: &CallOptions) -> Result<Jwt, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn query(&self, req: Request, opts: &CallOptions) -> Result<Response, TransportError> {
        (**self).query(req, opts)
    }

    fn mutate(&self, req: Request, opts: &CallOptions) -> Result<Response, TransportError> {
        (**self).mutate(req, opts)
    }

    fn commit_or_abort(
        &self,
        ctx: TxnContext,
        opts: &CallOptions,
    ) -> Result<TxnContext, TransportError> {
        (**self).commit_or_abort(ctx, opts)
    }

    fn login(&self, creds: &Credentials, opts: &CallOptions) -> Result<Jwt, TransportError> {
        (**self).login(creds, opts)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn query(&self, req: Request, opts: &CallOptions) -> Result<Response, TransportError> {
        (**self).query(req, opts)
    }

    fn mutate(&self, req: Request, opts: &CallOptions) -> Result<Response, TransportError> {
        (**self).mutate(req, opts)
    }

    fn commit_or_abort(
        &self,
        ctx: TxnContext,
        opts: &CallOptions,
    ) -> Result<TxnContext, TransportError> {
        (**self).commit_or_abort(ctx, opts)
    }

    fn login(&self, creds: &Credentials, opts: &CallOptions) -> Result<Jwt, TransportError> {
        (**self).login(creds, opts)
    }
}
