//! Runner route table
//!
//! Every configured runner is exposed under its path prefix. Requests are
//! matched by literal prefix in registration order and the first match wins;
//! anything unmatched is answered with `404 Not Found`.

use crate::auth::Authorize;
use crate::config::RunnerSettings;
use crate::proxy::types::{RunnerName, RunnerPath, NOT_FOUND_BODY};
use crate::proxy::Forward;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Handler type shared by the authorizer and the forwarder
pub type RequestHandler = axum::routing::MethodRouter;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("duplicate runner path detected in settings: {path} (runner: {runner})")]
    DuplicatePath { path: RunnerPath, runner: RunnerName },
}

/// A registered runner: authorization wrapped around forwarding
pub struct Route {
    pub path: RunnerPath,
    pub runner: RunnerName,
    handler: RequestHandler,
}

pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Build one authorized forwarding route per runner, in configuration order
    pub fn register<A, F>(
        runners: &[RunnerSettings],
        authorizer: &A,
        forwarder: &F,
    ) -> Result<Self, RouteError>
    where
        A: Authorize,
        F: Forward,
    {
        let mut seen = HashSet::with_capacity(runners.len());
        let mut routes = Vec::with_capacity(runners.len());

        for runner in runners {
            if !seen.insert(runner.path.as_ref()) {
                return Err(RouteError::DuplicatePath {
                    path: runner.path.clone(),
                    runner: runner.name.clone(),
                });
            }

            let handler = authorizer.authorize_request(forwarder.forward_request(
                &runner.host,
                &runner.path,
                runner.scheme,
            ));

            info!(
                runner = %runner.name,
                path = %runner.path,
                host = %runner.host,
                scheme = %runner.scheme,
                "Registered runner"
            );

            routes.push(Route {
                path: runner.path.clone(),
                runner: runner.name.clone(),
                handler,
            });
        }

        Ok(Self { routes })
    }

    /// First route whose prefix the path starts with
    pub fn find(&self, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| path.starts_with(route.path.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn into_router(self) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(Arc::new(self))
            .layer(TraceLayer::new_for_http())
    }
}

async fn dispatch(State(table): State<Arc<RouteTable>>, request: Request) -> Response {
    let Some(route) = table.find(request.uri().path()) else {
        warn!(method = %request.method(), path = %request.uri().path(), "No runner matches path");
        return (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response();
    };

    debug!(runner = %route.runner, path = %request.uri().path(), "Dispatching request");
    route
        .handler
        .clone()
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {})
}

/// Register every runner and produce the gateway router
pub fn register<A, F>(
    runners: &[RunnerSettings],
    authorizer: &A,
    forwarder: &F,
) -> Result<Router, RouteError>
where
    A: Authorize,
    F: Forward,
{
    Ok(RouteTable::register(runners, authorizer, forwarder)?.into_router())
}
