//! HTTP adapter: JSON command arrays in, JSON line arrays out.
//!
//! The endpoint accepts a POSTed JSON array of strings. If the first element
//! is a well-formed header token it rides along verbatim; otherwise the
//! backing client's parse function generates one. The response body is a
//! JSON array of the collected lines.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};

use crate::client::Client;
use crate::error::SockError;

/// Serves a wrapper's command endpoint over HTTP.
pub struct ApiServer {
    client: Arc<Client>,
    path: String,
}

impl ApiServer {
    /// Adapter around the given client, serving at `path` (`"/"` when
    /// empty).
    pub fn new(client: Client, path: impl Into<String>) -> Self {
        let mut path = path.into();
        if path.is_empty() {
            path = "/".to_string();
        }
        Self {
            client: Arc::new(client),
            path,
        }
    }

    /// The router for the command endpoint, for mounting into a larger API.
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.path, post(command_endpoint))
            .with_state(self.client.clone())
    }

    /// Bind `addr` and serve the command endpoint, blocking the calling
    /// thread.
    pub fn listen(&self, addr: &str) -> Result<(), SockError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let router = self.router();
        let addr = addr.to_string();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, router).await?;
            Ok(())
        })
    }
}

async fn command_endpoint(
    State(client): State<Arc<Client>>,
    payload: Result<Json<Vec<String>>, JsonRejection>,
) -> Response {
    let Json(args) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            return (StatusCode::BAD_REQUEST, format!("{}\n", rejection)).into_response();
        }
    };

    let send_args = args.clone();
    let result = tokio::task::spawn_blocking(move || client.send(&send_args)).await;

    match result {
        Ok(Ok(lines)) => Json(lines).into_response(),
        Ok(Err(err)) => {
            if matches!(err, SockError::CommandForbidden) {
                eprintln!("socketcmd: attempted forbidden command: {:?}", args);
            } else {
                eprintln!("socketcmd: {}", err);
            }
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", err)).into_response()
        }
        Err(err) => {
            eprintln!("socketcmd: command task failed: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error\n".to_string()).into_response()
        }
    }
}
