//! Entry points of the pipeline over HTTP.
//!
//! Dropping a request cancels its run: the cancellation token is guarded for
//! the lifetime of the handler future.

use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;

use crate::{
    app::AppContext,
    controller::{format, Routes},
    pipeline::{PersistPublisher, Pipeline, PipelineError, Publication, Publisher, ServePublisher},
    Result,
};

async fn run_with(pipeline: &Pipeline, publisher: &dyn Publisher) -> Result<Publication> {
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let report = pipeline.run(publisher, cancel).await?;
    Ok(report.publication)
}

/// Runs the pipeline and answers the serve query as a JSON array of rows.
///
/// # Errors
///
/// Returns the pipeline failure, rendered with its kind and stage.
pub async fn run(State(ctx): State<AppContext>) -> Result<Response> {
    let publisher = ServePublisher::new(ctx.config.pipeline.serve_query.clone())
        .map_err(PipelineError::from_publish)?;
    match run_with(&ctx.pipeline(), &publisher).await? {
        Publication::Rows { rows } => format::json(rows),
        other => format::json(other),
    }
}

/// Runs the pipeline and writes the materialized graph back to the store.
///
/// # Errors
///
/// Returns the pipeline failure, rendered with its kind and stage.
pub async fn persist(State(ctx): State<AppContext>) -> Result<Response> {
    let mut publisher = PersistPublisher::new(ctx.ontology.store());
    if ctx.config.pipeline.exclusive_persist {
        publisher = publisher.exclusive(ctx.persist_locks.clone());
    }
    format::json(run_with(&ctx.pipeline(), &publisher).await?)
}

/// Streams the current store content as an RDF/XML attachment.
///
/// # Errors
///
/// Returns an error when the store cannot be read.
pub async fn export(State(ctx): State<AppContext>) -> Result<Response> {
    let exported = ctx.pipeline().export().await?;
    format::attachment(exported.media_type, exported.filename, exported.bytes)
}

pub fn routes() -> Routes {
    Routes::new()
        .prefix("/api/inference")
        .add("/run", get(run))
        .add("/persist", post(persist))
        .add("/export", get(export))
}
