//! The inference pipeline: export, sanitize, reason, materialize, publish.

pub mod error;
pub mod materializer;
pub mod orchestrator;
pub mod publisher;
pub mod sanitizer;
pub mod scratch;

pub use error::{ErrorKind, PipelineError, Stage};
pub use materializer::{MaterializationReport, Materializer};
pub use orchestrator::{ExportedGraph, Pipeline, PipelineReport, PipelineState};
pub use publisher::{
    PersistLocks, PersistPublisher, Publication, PublishError, Publisher, Row, ServePublisher,
};
pub use sanitizer::{SanitizeReport, Sanitizer};
