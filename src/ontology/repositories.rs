use std::collections::BTreeSet;

use async_trait::async_trait;
use oxrdf::Graph;
use tokio_util::sync::CancellationToken;

use super::entities::Ontology;
use super::value_objects::{Iri, LiteralValue};

/// Contract describing the read/write protocol of a remote triple store.
#[async_trait]
pub trait GraphStore {
    /// Associated error type allowing infrastructure specific failures.
    type Error;

    /// Returns every triple currently held by the store.
    ///
    /// Implementors must not truncate: when the store pages its answers the
    /// whole result set is collected before returning.
    async fn fetch_all(&self) -> Result<Graph, Self::Error>;

    /// Appends every triple of `graph` to the store.
    ///
    /// The operation is additive only. Inserting a triple that is already
    /// present is a no-op, never an error.
    async fn persist(&self, graph: &Graph) -> Result<(), Self::Error>;

    /// Identifies the store location (endpoint and graph) for logs and locks.
    fn location(&self) -> &str;
}

/// Factory binding a reasoning engine to one ontology snapshot.
pub trait Reasoner {
    /// Associated error type allowing infrastructure specific failures.
    type Error;

    /// Short engine name used in logs.
    fn name(&self) -> &str;

    /// Opens a session over a snapshot of `ontology`.
    ///
    /// The session never observes later mutations of `ontology`. Engines that
    /// check satisfiability while loading fail here with an inconsistency
    /// error; others report it from [`ReasonerSession::precompute`].
    fn load(
        &self,
        ontology: &Ontology,
    ) -> Result<Box<dyn ReasonerSession<Error = Self::Error>>, Self::Error>;
}

/// Derived facts of one loaded ontology.
///
/// Queries are only meaningful after a successful
/// [`precompute`](ReasonerSession::precompute).
pub trait ReasonerSession: Send {
    /// Associated error type allowing infrastructure specific failures.
    type Error;

    /// Eagerly computes class hierarchy, types and property values.
    ///
    /// The call is blocking and CPU bound. Implementations poll `cancel` and
    /// give up with a cancellation error once it fires.
    fn precompute(&mut self, cancel: &CancellationToken) -> Result<(), Self::Error>;

    /// Returns the subclasses of `class`, only the immediate ones when `direct`.
    fn subclasses_of(&self, class: &Iri, direct: bool) -> Result<BTreeSet<Iri>, Self::Error>;

    /// Returns the classes of `individual`, only the most specific when `direct`.
    fn types_of(&self, individual: &Iri, direct: bool) -> Result<BTreeSet<Iri>, Self::Error>;

    /// Returns every individual related to `individual` through `property`.
    fn object_property_values(
        &self,
        individual: &Iri,
        property: &Iri,
    ) -> Result<BTreeSet<Iri>, Self::Error>;

    /// Returns every literal attached to `individual` through `property`.
    fn data_property_values(
        &self,
        individual: &Iri,
        property: &Iri,
    ) -> Result<BTreeSet<LiteralValue>, Self::Error>;

    /// Releases the engine resources held by the session.
    fn dispose(self: Box<Self>) -> Result<(), Self::Error>;
}
