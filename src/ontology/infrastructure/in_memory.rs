use std::{
    path::PathBuf,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use oxrdf::Graph;

use crate::ontology::{
    exchange::{self, ExchangeFormat},
    repositories::GraphStore,
    service::{OntologyServiceError, StoreError},
};

const LOCATION: &str = "memory://default";

/// Process-local graph store.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    graph: Mutex<Graph>,
}

impl InMemoryGraphStore {
    #[must_use]
    pub fn new(graph: Graph) -> Self {
        Self {
            graph: Mutex::new(graph),
        }
    }

    /// Builds a store holding the union of the given RDF files.
    ///
    /// # Errors
    ///
    /// Returns an error when a file cannot be read or parsed.
    pub fn from_seeds(seeds: &[PathBuf]) -> Result<Self, OntologyServiceError> {
        let mut graph = Graph::new();
        for path in seeds {
            let format = ExchangeFormat::from_path(path).unwrap_or_default();
            let seed = exchange::load_from_file(path, format).map_err(|source| {
                OntologyServiceError::Seed {
                    path: path.clone(),
                    source,
                }
            })?;
            tracing::debug!(seed = %path.display(), triples = seed.len(), "graph seed loaded");
            graph.extend(seed.iter());
        }
        Ok(Self::new(graph))
    }

    /// Returns a copy of the current content.
    #[must_use]
    pub fn snapshot(&self) -> Graph {
        self.guard().clone()
    }

    fn guard(&self) -> MutexGuard<'_, Graph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    type Error = StoreError;

    async fn fetch_all(&self) -> Result<Graph, Self::Error> {
        Ok(self.snapshot())
    }

    async fn persist(&self, graph: &Graph) -> Result<(), Self::Error> {
        self.guard().extend(graph.iter());
        Ok(())
    }

    fn location(&self) -> &str {
        LOCATION
    }
}
