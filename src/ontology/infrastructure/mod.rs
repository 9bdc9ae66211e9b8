//! Adapters implementing the ontology ports.

pub mod in_memory;
pub mod process_reasoner;
pub mod sparql_http;
pub mod structural_reasoner;
