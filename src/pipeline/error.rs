use std::fmt;

use serde::Serialize;

use super::publisher::PublishError;
use crate::ontology::service::{ReasonerError, StoreError};

/// Pipeline step in which a failure was detected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Export,
    Load,
    Sanitize,
    Reason,
    Materialize,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Export => "export",
            Self::Load => "load",
            Self::Sanitize => "sanitize",
            Self::Reason => "reason",
            Self::Materialize => "materialize",
            Self::Publish => "publish",
        };
        f.write_str(stage)
    }
}

/// Fieldless view of [`PipelineError`] for callers that branch on cause.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connectivity,
    Protocol,
    InconsistentOntology,
    Resource,
    Cancelled,
    Reasoner,
    Query,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Connectivity => "connectivity",
            Self::Protocol => "protocol",
            Self::InconsistentOntology => "inconsistent_ontology",
            Self::Resource => "resource",
            Self::Cancelled => "cancelled",
            Self::Reasoner => "reasoner",
            Self::Query => "query",
        };
        f.write_str(kind)
    }
}

/// Outcome of a failed pipeline invocation.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("[{stage}] store unreachable: {message}")]
    Connectivity { stage: Stage, message: String },

    #[error("[{stage}] malformed data: {message}")]
    Protocol { stage: Stage, message: String },

    #[error("[{stage}] inconsistent ontology: {reason}")]
    InconsistentOntology { stage: Stage, reason: String },

    #[error("[{stage}] resource failure: {message}")]
    Resource { stage: Stage, message: String },

    #[error("[{stage}] invocation cancelled")]
    Cancelled { stage: Stage },

    #[error("[{stage}] reasoner failure: {message}")]
    Reasoner { stage: Stage, message: String },

    #[error("[{stage}] query failure: {message}")]
    Query { stage: Stage, message: String },
}

impl PipelineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connectivity { .. } => ErrorKind::Connectivity,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::InconsistentOntology { .. } => ErrorKind::InconsistentOntology,
            Self::Resource { .. } => ErrorKind::Resource,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Reasoner { .. } => ErrorKind::Reasoner,
            Self::Query { .. } => ErrorKind::Query,
        }
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Connectivity { stage, .. }
            | Self::Protocol { stage, .. }
            | Self::InconsistentOntology { stage, .. }
            | Self::Resource { stage, .. }
            | Self::Cancelled { stage }
            | Self::Reasoner { stage, .. }
            | Self::Query { stage, .. } => *stage,
        }
    }

    pub(crate) fn protocol(stage: Stage, message: impl ToString) -> Self {
        Self::Protocol {
            stage,
            message: message.to_string(),
        }
    }

    pub(crate) fn resource(stage: Stage, message: impl ToString) -> Self {
        Self::Resource {
            stage,
            message: message.to_string(),
        }
    }

    pub(crate) fn from_store(stage: Stage, err: StoreError) -> Self {
        match err {
            StoreError::Connectivity { .. } => Self::Connectivity {
                stage,
                message: err.to_string(),
            },
            StoreError::Protocol { .. } => Self::protocol(stage, err),
        }
    }

    pub(crate) fn from_reasoner(stage: Stage, err: ReasonerError) -> Self {
        match err {
            ReasonerError::Inconsistent { reason } => Self::InconsistentOntology { stage, reason },
            ReasonerError::Cancelled => Self::Cancelled { stage },
            ReasonerError::Disposal(message) => Self::Resource { stage, message },
            ReasonerError::Engine(_) => Self::Reasoner {
                stage,
                message: err.to_string(),
            },
        }
    }

    pub(crate) fn from_publish(err: PublishError) -> Self {
        let stage = Stage::Publish;
        match err {
            PublishError::Store(err) => Self::from_store(stage, err),
            PublishError::Query(message) => Self::Query { stage, message },
            PublishError::Storage(message) => Self::Resource { stage, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{ErrorKind, PipelineError, Stage};
    use crate::ontology::service::{ReasonerError, StoreError};

    #[rstest]
    #[case(ReasonerError::Inconsistent { reason: "x".into() }, ErrorKind::InconsistentOntology)]
    #[case(ReasonerError::Cancelled, ErrorKind::Cancelled)]
    #[case(ReasonerError::Engine("boom".into()), ErrorKind::Reasoner)]
    #[case(ReasonerError::Disposal("busy".into()), ErrorKind::Resource)]
    fn reasoner_failures_keep_their_cause(#[case] err: ReasonerError, #[case] kind: ErrorKind) {
        let err = PipelineError::from_reasoner(Stage::Reason, err);
        assert_eq!(err.kind(), kind);
        assert_eq!(err.stage(), Stage::Reason);
    }

    #[test]
    fn store_failures_keep_their_cause() {
        let err = PipelineError::from_store(
            Stage::Export,
            StoreError::connectivity("http://localhost:1", "connection refused"),
        );
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert_eq!(err.stage(), Stage::Export);
        assert!(err.to_string().starts_with("[export]"));

        let err = PipelineError::from_store(
            Stage::Publish,
            StoreError::protocol("http://localhost:1", "500"),
        );
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn kinds_serialize_in_snake_case() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::InconsistentOntology).expect("json"),
            "\"inconsistent_ontology\""
        );
        assert_eq!(ErrorKind::InconsistentOntology.to_string(), "inconsistent_ontology");
    }
}
