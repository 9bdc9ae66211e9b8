#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]
//! # inference-endpoint
//!
//! Materializes the entailed closure of a knowledge graph. A run fetches the
//! graph from a triple store, strips top-property artifacts, asks a reasoner
//! for subclass, type and property entailments, folds them back into the
//! working copy and either answers a fixed query over it or writes it back.
//!
//! The building blocks live in [`ontology`] (model, ports and adapters) and
//! [`pipeline`] (sanitizer, materializer, publishers, orchestrator).
//! [`controller`] and the `inference-endpoint` binary are thin adapters over
//! [`pipeline::Pipeline`].

pub use self::errors::Error;

pub mod app;
pub mod boot;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod controller;
pub mod environment;
pub mod errors;
pub mod logger;
pub mod ontology;
pub mod pipeline;

/// Application results options list
pub type Result<T, E = Error> = std::result::Result<T, E>;
