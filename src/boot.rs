//! Process boot: context creation, HTTP serving and one-shot CLI runs.

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    app::AppContext,
    config::Config,
    controller::AppRoutes,
    environment::Environment,
    logger,
    ontology::service::OntologyService,
    pipeline::{
        ExportedGraph, PersistLocks, PersistPublisher, PipelineReport, Publisher, ServePublisher,
    },
    Result,
};

/// Wires the configured adapters into an [`AppContext`].
///
/// # Errors
///
/// Returns an error when the store or reasoner settings are unusable.
pub async fn create_context(environment: &Environment, config: Config) -> Result<AppContext> {
    let ontology = OntologyService::from_config(
        &config.store,
        &config.reasoner,
        &config.pipeline.scratch,
    )?;
    info!(
        environment = %environment,
        store = ontology.store().location(),
        reasoner = ontology.reasoner().name(),
        "context created"
    );
    Ok(AppContext {
        environment: environment.clone(),
        config,
        ontology,
        persist_locks: PersistLocks::default(),
    })
}

/// Loads the environment's configuration, installs logging and creates the
/// context.
///
/// # Errors
///
/// Returns an error when configuration cannot be loaded or the context cannot
/// be created.
pub async fn bootstrap(environment: &Environment) -> Result<AppContext> {
    let config = environment.load()?;
    logger::init(&config.logger);
    create_context(environment, config).await
}

/// Builds the HTTP router of the application.
///
/// # Errors
///
/// Returns an error when the CORS allow-list is invalid.
pub fn create_app(ctx: &AppContext) -> Result<Router> {
    AppRoutes::with_default_routes().to_router(ctx.clone())
}

/// Serves the HTTP adapter until ctrl-c.
///
/// # Errors
///
/// Returns an error when the listener cannot be bound or the server fails.
pub async fn start(ctx: AppContext) -> Result<()> {
    let router = create_app(&ctx)?;
    let address = format!("{}:{}", ctx.config.server.binding, ctx.config.server.port);
    let listener = TcpListener::bind(&address).await?;
    info!(url = %ctx.config.server.full_url(), "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Runs one pipeline invocation from the command line.
///
/// Ctrl-c cancels the run and disposes the reasoner session.
///
/// # Errors
///
/// Returns the pipeline failure.
pub async fn run_once(ctx: &AppContext, persist: bool) -> Result<PipelineReport> {
    let publisher: Box<dyn Publisher> = if persist {
        Box::new(PersistPublisher::new(ctx.ontology.store()).exclusive(ctx.persist_locks.clone()))
    } else {
        Box::new(
            ServePublisher::new(ctx.config.pipeline.serve_query.clone())
                .map_err(crate::pipeline::PipelineError::from_publish)?,
        )
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let watcher = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("interrupt received, cancelling the run");
        on_signal.cancel();
    });

    let outcome = ctx.pipeline().run(publisher.as_ref(), cancel).await;
    watcher.abort();
    Ok(outcome?)
}

/// Fetches the store content for the `export` command.
///
/// # Errors
///
/// Returns the store failure.
pub async fn export(ctx: &AppContext) -> Result<ExportedGraph> {
    Ok(ctx.pipeline().export().await?)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(err.msg = %err, err.detail = ?err, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

