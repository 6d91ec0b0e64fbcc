// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Mutation payloads.
//!
//! A [`Mutation`] is a combination of [`MutationPart`]s: JSON-shaped set/delete documents,
//! triple-shaped (N-Quad) set/delete blocks, and at most one condition expression that gates
//! the whole mutation in upsert-style requests. Parts are forwarded to the server exactly in
//! the order they were added.
use smallvec::SmallVec;

/// One component of a [`Mutation`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MutationPart {
    /// JSON document whose fields are set.
    SetJson(Vec<u8>),
    /// JSON document whose fields are deleted.
    DeleteJson(Vec<u8>),
    /// N-Quad triples to add.
    SetNquads(String),
    /// N-Quad triples to delete.
    DeleteNquads(String),
    /// Condition that must hold for the mutation to apply, e.g. `@if(eq(len(u), 0))`.
    Cond(String),
}

impl MutationPart {
    /// Returns true for parts that write or delete data, as opposed to conditions.
    pub fn is_write(&self) -> bool {
        !matches!(self, MutationPart::Cond(_))
    }
}

/// A set of writes submitted in one call.
///
/// ```rust
/// # use graphtxn::{Mutation, MutationPart};
/// let mutation = Mutation::new()
///     .set_nquads(r#"uid(u) <email> "alice@example.com" ."#)
///     .cond("@if(eq(len(u), 1))")
///     .commit_now();
///
/// assert_eq!(mutation.parts().len(), 2);
/// assert_eq!(mutation.condition(), Some("@if(eq(len(u), 1))"));
/// assert!(mutation.is_commit_now());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[must_use = "mutations do nothing until passed to a transaction"]
pub struct Mutation {
    parts: SmallVec<[MutationPart; 2]>,
    commit_now: bool,
}

impl Mutation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a JSON document (already encoded) whose fields are set.
    pub fn set_json(mut self, json: impl Into<Vec<u8>>) -> Self {
        self.parts.push(MutationPart::SetJson(json.into()));
        self
    }

    /// Adds a JSON document (already encoded) whose fields are deleted.
    pub fn delete_json(mut self, json: impl Into<Vec<u8>>) -> Self {
        self.parts.push(MutationPart::DeleteJson(json.into()));
        self
    }

    /// Adds N-Quad triples to set.
    pub fn set_nquads(mut self, nquads: impl Into<String>) -> Self {
        self.parts.push(MutationPart::SetNquads(nquads.into()));
        self
    }

    /// Adds N-Quad triples to delete.
    pub fn delete_nquads(mut self, nquads: impl Into<String>) -> Self {
        self.parts.push(MutationPart::DeleteNquads(nquads.into()));
        self
    }

    /// Gates the mutation on a condition. A later call replaces an earlier condition.
    pub fn cond(mut self, cond: impl Into<String>) -> Self {
        self.parts.retain(|part| part.is_write());
        self.parts.push(MutationPart::Cond(cond.into()));
        self
    }

    /// Asks the server to commit the transaction as part of applying this mutation.
    pub fn commit_now(mut self) -> Self {
        self.commit_now = true;
        self
    }

    /// Serializes `value` as JSON and adds it as a set document.
    #[cfg(feature = "json")]
    pub fn set_json_value<T>(self, value: &T) -> Result<Self, serde_json::Error>
    where
        T: ::serde::Serialize + ?Sized,
    {
        Ok(self.set_json(serde_json::to_vec(value)?))
    }

    /// Serializes `value` as JSON and adds it as a delete document.
    #[cfg(feature = "json")]
    pub fn delete_json_value<T>(self, value: &T) -> Result<Self, serde_json::Error>
    where
        T: ::serde::Serialize + ?Sized,
    {
        Ok(self.delete_json(serde_json::to_vec(value)?))
    }

    pub fn parts(&self) -> &[MutationPart] {
        &self.parts
    }

    pub fn is_commit_now(&self) -> bool {
        self.commit_now
    }

    /// Returns the condition gating this mutation, if any.
    pub fn condition(&self) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            MutationPart::Cond(cond) => Some(cond.as_str()),
            _ => None,
        })
    }

    /// Returns true if the mutation carries no set or delete payload.
    ///
    /// A mutation holding only a condition has nothing to apply and is considered empty.
    pub fn is_empty(&self) -> bool {
        !self.parts.iter().any(MutationPart::is_write)
    }
}
