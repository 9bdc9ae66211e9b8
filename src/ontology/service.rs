use std::{path::PathBuf, sync::Arc};

use crate::{
    config::{ReasonerSettings, ScratchSettings, StoreSettings},
    ontology::{
        exchange::ExchangeError,
        infrastructure::{
            in_memory::InMemoryGraphStore, process_reasoner::ProcessReasoner,
            sparql_http::SparqlGraphStore, structural_reasoner::StructuralReasoner,
        },
        repositories::{GraphStore, Reasoner, ReasonerSession},
    },
};

/// Type alias simplifying graph store trait object usage inside the service.
pub type GraphStoreHandle = dyn GraphStore<Error = StoreError> + Send + Sync + 'static;
/// Type alias simplifying reasoner trait object usage inside the service.
pub type ReasonerHandle = dyn Reasoner<Error = ReasonerError> + Send + Sync + 'static;
/// Type alias for the sessions opened by a [`ReasonerHandle`].
pub type SessionHandle = dyn ReasonerSession<Error = ReasonerError>;

/// High level ontology service wiring the graph store and reasoner adapters together.
#[derive(Clone)]
pub struct OntologyService {
    store: Arc<GraphStoreHandle>,
    reasoner: Arc<ReasonerHandle>,
}

impl OntologyService {
    /// Creates a new [`OntologyService`] from trait object handles.
    pub fn new(store: Arc<GraphStoreHandle>, reasoner: Arc<ReasonerHandle>) -> Self {
        Self { store, reasoner }
    }

    /// Builds a service instance from configuration settings.
    ///
    /// A directory scratch root also hosts the working directories of an
    /// external reasoner.
    pub fn from_config(
        store: &StoreSettings,
        reasoner: &ReasonerSettings,
        scratch: &ScratchSettings,
    ) -> Result<Self, OntologyServiceError> {
        let store: Arc<GraphStoreHandle> = match store {
            StoreSettings::Sparql(settings) => Arc::new(SparqlGraphStore::new(settings)?),
            StoreSettings::InMemory(settings) => {
                Arc::new(InMemoryGraphStore::from_seeds(&settings.seeds)?)
            }
        };

        let reasoner: Arc<ReasonerHandle> = match reasoner {
            ReasonerSettings::Structural => Arc::new(StructuralReasoner),
            ReasonerSettings::Process(settings) => {
                let reasoner = ProcessReasoner::new(settings)?;
                match scratch {
                    ScratchSettings::Directory { root } => Arc::new(reasoner.with_scratch_root(root)),
                    ScratchSettings::Memory => Arc::new(reasoner),
                }
            }
        };

        Ok(Self::new(store, reasoner))
    }

    /// Returns a clone of the graph store handle.
    pub fn store(&self) -> Arc<GraphStoreHandle> {
        Arc::clone(&self.store)
    }

    /// Returns a clone of the reasoner handle.
    pub fn reasoner(&self) -> Arc<ReasonerHandle> {
        Arc::clone(&self.reasoner)
    }
}

/// Errors raised while wiring ontology infrastructure components.
#[derive(Debug, thiserror::Error)]
pub enum OntologyServiceError {
    /// A configured seed file could not be loaded.
    #[error("failed to load graph seed `{path}`: {source}")]
    Seed {
        path: PathBuf,
        source: ExchangeError,
    },
    /// Settings are present but unusable.
    #[error("invalid {component} configuration: {message}")]
    Configuration {
        component: &'static str,
        message: String,
    },
}

impl OntologyServiceError {
    pub(crate) fn configuration(component: &'static str, message: impl ToString) -> Self {
        Self::Configuration {
            component,
            message: message.to_string(),
        }
    }
}

/// Failures of the graph store protocol.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or did not answer in time.
    #[error("store `{location}` is unreachable: {message}")]
    Connectivity { location: String, message: String },
    /// The store answered with an error status or an unreadable payload.
    #[error("store `{location}` answered unexpectedly: {message}")]
    Protocol { location: String, message: String },
}

impl StoreError {
    pub(crate) fn connectivity(location: &str, message: impl ToString) -> Self {
        Self::Connectivity {
            location: location.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn protocol(location: &str, message: impl ToString) -> Self {
        Self::Protocol {
            location: location.to_string(),
            message: message.to_string(),
        }
    }
}

/// Failures reported by reasoning engines.
#[derive(Debug, thiserror::Error)]
pub enum ReasonerError {
    /// The ontology is unsatisfiable.
    #[error("ontology is inconsistent: {reason}")]
    Inconsistent { reason: String },
    /// Precomputation was interrupted by the caller.
    #[error("reasoning was cancelled")]
    Cancelled,
    /// Any other engine failure.
    #[error("reasoner failure: {0}")]
    Engine(String),
    /// Session resources could not be released.
    #[error("failed to dispose reasoner session: {0}")]
    Disposal(String),
}
