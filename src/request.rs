// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Wire-shaped values exchanged with a [`Transport`](crate::Transport).
//!
//! These types stay close to what the server sends and receives. Encoding them for an actual
//! RPC stack is the transport's job.
use crate::{Mutation, TxnContext};
use std::{collections::BTreeMap, time::Duration};

/// Variable bindings for a parameterized query, e.g. `$name -> "Alice"`.
pub type Variables = BTreeMap<String, String>;

/// A query, a set of mutations, or both, sent as one call.
///
/// Combining a query with conditional mutations gives upsert semantics: the query binds
/// variables that the mutations and their conditions refer to.
///
/// ```rust
/// # use graphtxn::{Mutation, Request};
/// let request = Request::new()
///     .query(r#"{ u as var(func: eq(email, "alice@example.com")) }"#)
///     .mutation(
///         Mutation::new()
///             .set_nquads(r#"uid(u) <name> "Alice" ."#)
///             .cond("@if(eq(len(u), 1))"),
///     )
///     .commit_now();
///
/// assert!(request.has_mutations());
/// assert!(request.commit_now);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[must_use = "requests do nothing until passed to a transaction"]
pub struct Request {
    /// Query text. Empty when the request only mutates.
    pub query: String,
    pub vars: Variables,
    pub mutations: Vec<Mutation>,
    /// Commit the transaction once the mutations are applied.
    pub commit_now: bool,
    pub read_only: bool,
    pub best_effort: bool,
    /// The transaction's context at the time of the call. Filled in by the transaction.
    pub txn: TxnContext,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Binds a single query variable.
    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Replaces all query variables.
    pub fn vars(mut self, vars: Variables) -> Self {
        self.vars = vars;
        self
    }

    pub fn mutation(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    pub fn mutations(mut self, mutations: impl IntoIterator<Item = Mutation>) -> Self {
        self.mutations.extend(mutations);
        self
    }

    pub fn commit_now(mut self) -> Self {
        self.commit_now = true;
        self
    }

    pub fn has_mutations(&self) -> bool {
        !self.mutations.is_empty()
    }
}

/// Server-side timings reported with a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Latency {
    pub parsing_ns: u64,
    pub processing_ns: u64,
    pub encoding_ns: u64,
    pub assign_timestamp_ns: u64,
    pub total_ns: u64,
}

impl Latency {
    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.total_ns)
    }
}

/// The result of a query, mutation or combined request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Response {
    /// JSON-encoded query result.
    pub json: Vec<u8>,
    /// Context delta to merge into the transaction.
    pub txn: TxnContext,
    pub latency: Latency,
    /// Uids assigned to blank nodes, keyed by blank node name without the `_:` prefix.
    pub uids: BTreeMap<String, String>,
}

impl Response {
    /// Decodes the query result.
    ///
    /// ```rust
    /// # use graphtxn::Response;
    /// #[derive(serde::Deserialize)]
    /// struct People {
    ///     people: Vec<Person>,
    /// }
    /// #[derive(serde::Deserialize)]
    /// struct Person {
    ///     name: String,
    /// }
    ///
    /// let response = Response {
    ///     json: br#"{"people":[{"name":"Alice"}]}"#.to_vec(),
    ///     ..Response::default()
    /// };
    /// let people: People = response.json().unwrap();
    /// assert_eq!(people.people[0].name, "Alice");
    /// ```
    #[cfg(feature = "json")]
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: ::serde::de::DeserializeOwned,
    {
        serde_json::from_slice(&self.json)
    }

    /// Returns the uid assigned to the blank node `name` (with or without the `_:` prefix).
    pub fn uid(&self, name: &str) -> Option<&str> {
        let name = name.strip_prefix("_:").unwrap_or(name);
        self.uids.get(name).map(String::as_str)
    }
}
