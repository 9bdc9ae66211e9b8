//! Final step of a run: answer a query or write back to the store.
use std::{
    collections::BTreeMap,
    sync::Arc,
};

use async_trait::async_trait;
use dashmap::DashMap;
use oxigraph::{
    model::{GraphNameRef, Term},
    sparql::{QueryResults, SparqlEvaluator},
    store::Store,
};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::ontology::{
    entities::Ontology,
    service::{GraphStoreHandle, StoreError},
};

/// One solution of the Serve query: variable name to lexical value.
pub type Row = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Publication {
    Rows { rows: Vec<Row> },
    Persisted { location: String, triples: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Query(String),
    #[error("{0}")]
    Storage(String),
}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, ontology: &Ontology) -> Result<Publication, PublishError>;
}

/// Answers a fixed `SELECT` query over the materialized graph.
#[derive(Clone, Debug)]
pub struct ServePublisher {
    query: String,
}

impl ServePublisher {
    /// # Errors
    ///
    /// Returns [`PublishError::Query`] when the query does not parse.
    pub fn new(query: impl Into<String>) -> Result<Self, PublishError> {
        let query = query.into();
        SparqlEvaluator::new()
            .parse_query(&query)
            .map_err(|err| PublishError::Query(err.to_string()))?;
        Ok(Self { query })
    }

    fn evaluate(query: &str, ontology: &Ontology) -> Result<Vec<Row>, PublishError> {
        let graph = ontology.to_graph();
        let store = Store::new().map_err(|err| PublishError::Storage(err.to_string()))?;
        store
            .extend(
                graph
                    .iter()
                    .map(|triple| triple.in_graph(GraphNameRef::DefaultGraph)),
            )
            .map_err(|err| PublishError::Storage(err.to_string()))?;

        let results = SparqlEvaluator::new()
            .parse_query(query)
            .map_err(|err| PublishError::Query(err.to_string()))?
            .on_store(&store)
            .execute()
            .map_err(|err| PublishError::Query(err.to_string()))?;
        let QueryResults::Solutions(solutions) = results else {
            return Err(PublishError::Query(
                "serve query must be a SELECT query".to_string(),
            ));
        };

        let mut rows = Vec::new();
        for solution in solutions {
            let solution = solution.map_err(|err| PublishError::Query(err.to_string()))?;
            rows.push(
                solution
                    .iter()
                    .map(|(variable, term)| (variable.as_str().to_string(), lexical(term)))
                    .collect(),
            );
        }
        Ok(rows)
    }
}

fn lexical(term: &Term) -> String {
    match term {
        Term::NamedNode(node) => node.as_str().to_string(),
        Term::BlankNode(node) => node.as_str().to_string(),
        Term::Literal(literal) => literal.value().to_string(),
        #[allow(unreachable_patterns)]
        other => other.to_string(),
    }
}

#[async_trait]
impl Publisher for ServePublisher {
    fn name(&self) -> &'static str {
        "serve"
    }

    async fn publish(&self, ontology: &Ontology) -> Result<Publication, PublishError> {
        let query = self.query.clone();
        let ontology = ontology.clone();
        let rows = tokio::task::spawn_blocking(move || Self::evaluate(&query, &ontology))
            .await
            .map_err(|err| PublishError::Storage(err.to_string()))??;
        tracing::debug!(rows = rows.len(), "serve query answered");
        Ok(Publication::Rows { rows })
    }
}

/// Advisory locks keyed by store location.
#[derive(Clone, Debug, Default)]
pub struct PersistLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl PersistLocks {
    fn lock_for(&self, location: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(location.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Writes the materialized entailments back to the store.
///
/// Only the axioms added since the ontology was read are sent. Everything
/// else came from the store, and re-inserting its blank nodes would mint
/// fresh copies of them.
pub struct PersistPublisher {
    store: Arc<GraphStoreHandle>,
    locks: Option<PersistLocks>,
}

impl PersistPublisher {
    #[must_use]
    pub fn new(store: Arc<GraphStoreHandle>) -> Self {
        Self { store, locks: None }
    }

    /// Serializes publications that target the same store location.
    #[must_use]
    pub fn exclusive(mut self, locks: PersistLocks) -> Self {
        self.locks = Some(locks);
        self
    }
}

#[async_trait]
impl Publisher for PersistPublisher {
    fn name(&self) -> &'static str {
        "persist"
    }

    async fn publish(&self, ontology: &Ontology) -> Result<Publication, PublishError> {
        let graph = ontology.additions_graph();
        let location = self.store.location().to_string();

        let lock = self.locks.as_ref().map(|locks| locks.lock_for(&location));
        let _guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        self.store.persist(&graph).await?;
        tracing::debug!(location = %location, triples = graph.len(), "entailments persisted");
        Ok(Publication::Persisted {
            location,
            triples: graph.len(),
        })
    }
}
