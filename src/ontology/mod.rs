//! Core ontology domain primitives and contracts.
//!
//! The module defines the axiom model and the mapping between RDF graphs and
//! ontologies. It follows a hexagonal layout: [`repositories`] holds the ports
//! the pipeline depends on and [`infrastructure`] the adapters behind them.

pub mod entities;
pub mod exchange;
pub mod infrastructure;
pub mod mapping;
pub mod repositories;
pub mod service;
pub mod value_objects;
pub mod vocabulary;

pub use entities::{Axiom, Entity, Ontology, Signature};
pub use exchange::{ExchangeError, ExchangeFormat};
pub use repositories::{GraphStore, Reasoner, ReasonerSession};
pub use service::{
    GraphStoreHandle, OntologyService, OntologyServiceError, ReasonerError, ReasonerHandle,
    SessionHandle, StoreError,
};
pub use value_objects::{Iri, IriError, LiteralValue};
