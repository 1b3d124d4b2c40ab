//! HTTP and WebSocket surface.
//!
//! Thin request/response wrappers around [`TestOrchestrator`]; every decision
//! is made by the orchestrator. JSON replies use the envelope
//! `{ "success": bool, "data"?: ..., "error"?: "..." }`.

mod ws;


use std::convert::Infallible;
use std::net::SocketAddr;

use serde::Serialize;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reply::Json;
use warp::reply::WithStatus;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::metrics::gather_text;
use crate::metrics::init_metrics;
use crate::utils::time::timestamp_millis;
use crate::ConnectionSettings;
use crate::Error;
use crate::Result;
use crate::TestOrchestrator;

/// Origins of the bundled front end during development and when served here
const ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://localhost:3001"];

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    timestamp: u64,
}

fn reply_ok<T: Serialize>(data: T) -> WithStatus<Json> {
    let body = ApiResponse {
        success: true,
        data: Some(data),
        error: None,
    };
    warp::reply::with_status(warp::reply::json(&body), StatusCode::OK)
}

fn reply_error(
    status: StatusCode,
    message: impl Into<String>,
) -> WithStatus<Json> {
    let body = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(message.into()),
    };
    warp::reply::with_status(warp::reply::json(&body), status)
}

fn with_orchestrator(orchestrator: TestOrchestrator) -> impl Filter<Extract = (TestOrchestrator,), Error = Infallible> + Clone {
    warp::any().map(move || orchestrator.clone())
}

/// Every route served by the process
pub fn routes(orchestrator: TestOrchestrator) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path!("api" / "health").and(warp::get()).map(|| {
        reply_ok(HealthReport {
            status: "healthy",
            timestamp: timestamp_millis(),
        })
    });

    let profiles = warp::path!("api" / "profiles")
        .and(warp::get())
        .and(with_orchestrator(orchestrator.clone()))
        .map(|orchestrator: TestOrchestrator| reply_ok(orchestrator.profiles().list()));

    let update_custom = warp::path!("api" / "profiles" / "custom")
        .and(warp::put())
        .and(warp::body::json())
        .and(with_orchestrator(orchestrator.clone()))
        .map(|settings: ConnectionSettings, orchestrator: TestOrchestrator| {
            info!("custom profile updated: {}", settings.uri_options());
            reply_ok(orchestrator.profiles().update_custom(settings))
        });

    let cluster_status = warp::path!("api" / "cluster" / "status")
        .and(warp::get())
        .and(with_orchestrator(orchestrator.clone()))
        .and_then(cluster_status_handler);

    let cluster_processes = warp::path!("api" / "cluster" / "processes")
        .and(warp::get())
        .and(with_orchestrator(orchestrator.clone()))
        .and_then(cluster_processes_handler);

    let test_status = warp::path!("api" / "test" / "status")
        .and(warp::get())
        .and(with_orchestrator(orchestrator.clone()))
        .map(|orchestrator: TestOrchestrator| reply_ok(orchestrator.state()));

    let metrics = warp::path!("metrics").and(warp::get()).map(gather_text);

    let events = warp::path!("ws")
        .and(warp::ws())
        .and(with_orchestrator(orchestrator))
        .map(|socket: warp::ws::Ws, orchestrator: TestOrchestrator| {
            socket.on_upgrade(move |websocket| ws::client_connected(websocket, orchestrator))
        });

    let cors = warp::cors()
        .allow_origins(ALLOWED_ORIGINS)
        .allow_credentials(true)
        .allow_methods(vec!["GET", "POST", "PUT"])
        .allow_headers(vec!["content-type"]);

    health
        .or(profiles)
        .or(update_custom)
        .or(cluster_status)
        .or(cluster_processes)
        .or(test_status)
        .or(metrics)
        .or(events)
        .with(cors)
        .recover(handle_rejection)
}

async fn cluster_status_handler(orchestrator: TestOrchestrator) -> std::result::Result<WithStatus<Json>, Rejection> {
    Ok(match orchestrator.control_plane().cluster_status().await {
        Ok(status) => reply_ok(status),
        Err(e) => {
            error!("error getting cluster status: {}", e);
            reply_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    })
}

async fn cluster_processes_handler(orchestrator: TestOrchestrator) -> std::result::Result<WithStatus<Json>, Rejection> {
    Ok(match orchestrator.control_plane().cluster_processes().await {
        Ok(processes) => reply_ok(processes),
        Err(e) => {
            error!("error listing cluster processes: {}", e);
            reply_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    })
}

async fn handle_rejection(rejection: Rejection) -> std::result::Result<WithStatus<Json>, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = rejection.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else if rejection.find::<warp::cors::CorsForbidden>().is_some() {
        (StatusCode::FORBIDDEN, "Origin not allowed".to_string())
    } else {
        error!("unhandled rejection: {:?}", rejection);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };
    Ok(reply_error(status, message))
}

/// Serve until `shutdown` fires
pub async fn serve(
    orchestrator: TestOrchestrator,
    addr: SocketAddr,
    mut shutdown: watch::Receiver<()>,
) -> Result<()> {
    init_metrics();

    let (bound, server) = warp::serve(routes(orchestrator))
        .try_bind_with_graceful_shutdown(addr, async move {
            let _ = shutdown.changed().await;
        })
        .map_err(|e| Error::Fatal(format!("failed to bind {}: {}", addr, e)))?;

    info!("listening on http://{}", bound);
    server.await;
    info!("server stopped");
    Ok(())
}
