//! Shared application state handed to controllers and CLI commands.

use crate::{
    config::Config,
    environment::Environment,
    ontology::service::OntologyService,
    pipeline::{Pipeline, PersistLocks},
};

/// Application context built once at boot and cloned into every request.
#[derive(Clone)]
pub struct AppContext {
    /// The environment in which the application is running.
    pub environment: Environment,
    /// Configuration settings for the application.
    pub config: Config,
    /// Graph store and reasoner adapters selected by configuration.
    pub ontology: OntologyService,
    /// Advisory locks serializing Persist publications per store location.
    pub persist_locks: PersistLocks,
}

impl AppContext {
    /// Builds a pipeline bound to this context.
    #[must_use]
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::from(self)
    }
}
