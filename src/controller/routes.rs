use axum::{
    http::{HeaderValue, Method},
    routing::MethodRouter,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use super::{inference, monitoring};
use crate::{app::AppContext, Error, Result};

#[derive(Clone, Debug)]
pub struct Handler {
    pub uri: String,
    pub method: MethodRouter<AppContext>,
}

/// Group of handlers sharing an optional prefix.
#[derive(Clone, Default, Debug)]
pub struct Routes {
    pub prefix: Option<String>,
    pub handlers: Vec<Handler>,
}

impl Routes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn prefix(mut self, uri: &str) -> Self {
        self.prefix = Some(uri.to_owned());
        self
    }

    #[must_use]
    pub fn add(mut self, uri: &str, method: MethodRouter<AppContext>) -> Self {
        self.handlers.push(Handler {
            uri: uri.to_owned(),
            method,
        });
        self
    }
}

/// Every route group of the application.
#[derive(Clone, Default, Debug)]
pub struct AppRoutes {
    routes: Vec<Routes>,
}

impl AppRoutes {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_default_routes() -> Self {
        Self::empty()
            .add_route(monitoring::routes())
            .add_route(inference::routes())
    }

    #[must_use]
    pub fn add_route(mut self, routes: Routes) -> Self {
        self.routes.push(routes);
        self
    }

    /// Returns the full URI of every handler.
    #[must_use]
    pub fn collect(&self) -> Vec<String> {
        self.routes
            .iter()
            .flat_map(|routes| {
                routes.handlers.iter().map(|handler| {
                    format!(
                        "{}{}",
                        routes.prefix.as_deref().unwrap_or_default(),
                        handler.uri
                    )
                })
            })
            .collect()
    }

    /// Builds the router with tracing and the configured CORS allow-list.
    ///
    /// # Errors
    ///
    /// Returns an error when a configured origin is not a valid header value.
    pub fn to_router(&self, ctx: AppContext) -> Result<Router> {
        let mut router = Router::new();
        for routes in &self.routes {
            for handler in &routes.handlers {
                let uri = format!(
                    "{}{}",
                    routes.prefix.as_deref().unwrap_or_default(),
                    handler.uri
                );
                tracing::debug!(%uri, "registering route");
                router = router.route(&uri, handler.method.clone());
            }
        }

        if !ctx.config.server.cors_origins.is_empty() {
            router = router.layer(cors_layer(&ctx.config.server.cors_origins)?);
        }

        Ok(router.layer(TraceLayer::new_for_http()).with_state(ctx))
    }
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|err| Error::Message(format!("invalid CORS origin `{origin}`: {err}")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST]))
}
