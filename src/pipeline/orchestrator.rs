//! Sequencing of one inference invocation.
//!
//! `Idle -> Exported -> Loaded -> Sanitized -> Reasoned -> Materialized ->
//! Published -> Done`, with `Failed` reachable from every state. The
//! publisher is only called from `Materialized`, so a failed run never
//! publishes a partial closure.
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::{
    error::{PipelineError, Stage},
    materializer::{MaterializationReport, Materializer},
    publisher::{Publication, Publisher},
    sanitizer::{SanitizeReport, Sanitizer},
    scratch::{self, Scratch},
};
use crate::{
    app::AppContext,
    config::{InferenceSettings, PipelineSettings},
    ontology::{
        entities::Ontology,
        exchange::{self, ExchangeFormat},
        service::{OntologyService, ReasonerError, SessionHandle},
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Exported,
    Loaded,
    Sanitized,
    Reasoned,
    Materialized,
    Published,
    Done,
    Failed,
}

/// Summary of a successful invocation.
#[derive(Clone, Debug, Serialize)]
pub struct PipelineReport {
    pub invocation: Uuid,
    pub states: Vec<PipelineState>,
    pub exported_triples: usize,
    pub sanitize: SanitizeReport,
    pub materialization: MaterializationReport,
    pub publication: Publication,
}

/// Raw store content offered for download.
#[derive(Clone, Debug)]
pub struct ExportedGraph {
    pub filename: &'static str,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Owns an open session and disposes it on every exit path.
struct SessionGuard(Option<Box<SessionHandle>>);

impl SessionGuard {
    fn session(&self) -> Result<&SessionHandle, PipelineError> {
        self.0.as_deref().ok_or_else(|| PipelineError::Resource {
            stage: Stage::Materialize,
            message: "reasoner session already disposed".to_string(),
        })
    }

    fn dispose(&mut self) {
        if let Some(session) = self.0.take() {
            dispose(session);
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn dispose(session: Box<SessionHandle>) {
    if let Err(err) = session.dispose() {
        tracing::warn!(err.msg = %err, err.detail = ?err, "failed to dispose reasoner session");
    }
}

struct History(Vec<PipelineState>);

impl History {
    fn enter(&mut self, state: PipelineState) {
        tracing::debug!(?state, "pipeline transition");
        self.0.push(state);
    }
}

#[derive(Clone)]
pub struct Pipeline {
    service: OntologyService,
    sanitizer: Sanitizer,
    materializer: Materializer,
    settings: PipelineSettings,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        service: OntologyService,
        inference: &InferenceSettings,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            service,
            sanitizer: Sanitizer::default(),
            materializer: Materializer::new(inference),
            settings,
        }
    }

    /// Runs export, sanitize, reason and materialize, then hands the
    /// ontology to `publisher`.
    ///
    /// # Errors
    ///
    /// Returns the first failure with the stage it was detected in.
    pub async fn run(
        &self,
        publisher: &dyn Publisher,
        cancel: CancellationToken,
    ) -> Result<PipelineReport, PipelineError> {
        let invocation = Uuid::new_v4();
        let span = tracing::info_span!("pipeline", %invocation, publisher = publisher.name());
        let mut history = History(vec![PipelineState::Idle]);

        let outcome = self
            .execute(invocation, publisher, &cancel, &mut history)
            .instrument(span.clone())
            .await;

        let _entered = span.enter();
        match outcome {
            Ok(mut report) => {
                history.enter(PipelineState::Done);
                report.states = history.0;
                tracing::info!(
                    exported = report.exported_triples,
                    inferred = report.materialization.total(),
                    "pipeline completed"
                );
                Ok(report)
            }
            Err(err) => {
                history.enter(PipelineState::Failed);
                tracing::error!(
                    err.msg = %err,
                    err.detail = ?err,
                    kind = %err.kind(),
                    stage = %err.stage(),
                    "pipeline failed"
                );
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        invocation: Uuid,
        publisher: &dyn Publisher,
        cancel: &CancellationToken,
        history: &mut History,
    ) -> Result<PipelineReport, PipelineError> {
        let mut scratch = Scratch::open(&self.settings.scratch, invocation, self.settings.keep_scratch)
            .map_err(|err| PipelineError::resource(Stage::Export, err))?;

        let graph = self.fetch(cancel).await?;
        let exported_triples = graph.len();
        scratch
            .write(scratch::EXPORTED, &graph)
            .map_err(|err| PipelineError::resource(Stage::Export, err))?;
        drop(graph);
        history.enter(PipelineState::Exported);

        let graph = scratch
            .read(scratch::EXPORTED)
            .map_err(|err| PipelineError::protocol(Stage::Load, err))?;
        let mut ontology = Ontology::from_graph(&graph);
        history.enter(PipelineState::Loaded);

        let sanitize = self.sanitizer.sanitize(&mut ontology);
        history.enter(PipelineState::Sanitized);

        let mut guard = SessionGuard(Some(self.reason(&ontology, cancel).await?));
        history.enter(PipelineState::Reasoned);

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                stage: Stage::Materialize,
            });
        }
        let materialization = self
            .materializer
            .materialize(&mut ontology, guard.session()?)
            .map_err(|err| PipelineError::from_reasoner(Stage::Materialize, err))?;
        guard.dispose();
        scratch
            .write(scratch::INFERRED, &ontology.to_graph())
            .map_err(|err| PipelineError::resource(Stage::Materialize, err))?;
        history.enter(PipelineState::Materialized);

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                stage: Stage::Publish,
            });
        }
        let publication = publisher
            .publish(&ontology)
            .await
            .map_err(PipelineError::from_publish)?;
        history.enter(PipelineState::Published);

        Ok(PipelineReport {
            invocation,
            states: Vec::new(),
            exported_triples,
            sanitize,
            materialization,
            publication,
        })
    }

    async fn fetch(&self, cancel: &CancellationToken) -> Result<oxrdf::Graph, PipelineError> {
        let store = self.service.store();
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(PipelineError::Cancelled { stage: Stage::Export }),
            fetched = store.fetch_all() => fetched.map_err(|err| PipelineError::from_store(Stage::Export, err)),
        }
    }

    /// Loads and precomputes a session on the blocking pool.
    ///
    /// The session is disposed inside the worker whenever precompute fails,
    /// which covers cancellation and timeouts.
    async fn reason(
        &self,
        ontology: &Ontology,
        cancel: &CancellationToken,
    ) -> Result<Box<SessionHandle>, PipelineError> {
        let reasoner = self.service.reasoner();
        let snapshot = ontology.clone();
        let token = cancel.child_token();
        let worker_token = token.clone();
        let _cancel_on_drop = token.clone().drop_guard();

        tracing::debug!(reasoner = reasoner.name(), "reasoning started");
        let mut task = tokio::task::spawn_blocking(move || -> Result<Box<SessionHandle>, ReasonerError> {
            let mut session = reasoner.load(&snapshot)?;
            match session.precompute(&worker_token) {
                Ok(()) => Ok(session),
                Err(err) => {
                    dispose(session);
                    Err(err)
                }
            }
        });

        let joined = match self.settings.reasoning_timeout_ms {
            Some(timeout) => {
                tokio::select! {
                    joined = &mut task => joined,
                    () = tokio::time::sleep(Duration::from_millis(timeout)) => {
                        tracing::warn!(timeout_ms = timeout, "reasoning timed out");
                        token.cancel();
                        task.await
                    }
                }
            }
            None => task.await,
        };

        joined
            .map_err(|err| PipelineError::Reasoner {
                stage: Stage::Reason,
                message: err.to_string(),
            })?
            .map_err(|err| PipelineError::from_reasoner(Stage::Reason, err))
    }

    /// Fetches the store content as an RDF/XML attachment.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be read.
    pub async fn export(&self) -> Result<ExportedGraph, PipelineError> {
        let graph = self
            .service
            .store()
            .fetch_all()
            .await
            .map_err(|err| PipelineError::from_store(Stage::Export, err))?;
        let format = ExchangeFormat::RdfXml;
        let bytes = exchange::to_bytes(&graph, format)
            .map_err(|err| PipelineError::resource(Stage::Export, err))?;
        tracing::debug!(triples = graph.len(), bytes = bytes.len(), "graph exported");
        Ok(ExportedGraph {
            filename: scratch::EXPORTED,
            media_type: format.media_type(),
            bytes,
        })
    }

    #[must_use]
    pub fn service(&self) -> &OntologyService {
        &self.service
    }
}

impl From<&AppContext> for Pipeline {
    fn from(ctx: &AppContext) -> Self {
        Self::new(
            ctx.ontology.clone(),
            &ctx.config.inference,
            ctx.config.pipeline.clone(),
        )
    }
}
