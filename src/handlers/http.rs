//! HTTP routes served next to the WebSocket endpoint

use log::info;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

use crate::config::ServerConfig;
use crate::constants::{SERVICE_VERSION, WS_PATH, WS_PATH_PREFIX};
use crate::core::server::SyncServer;
use crate::handlers::websocket::handle_ws_client;

/// Every route of the server, wrapped in CORS
pub fn routes(
    server: Arc<SyncServer>,
    config: &ServerConfig,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let ws_route = warp::path(WS_PATH_PREFIX)
        .and(warp::path(WS_PATH))
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_server(server.clone()))
        .map(|ws: warp::ws::Ws, server: Arc<SyncServer>| {
            info!("New websocket connection");
            ws.on_upgrade(move |socket| handle_ws_client(socket, server))
        });

    let root_route = warp::path::end().and(warp::get()).map(|| {
        warp::reply::json(&json!({
            "message": "Agent Sync Server",
            "version": SERVICE_VERSION,
            "endpoints": {
                "websocket": format!("/{}/{}", WS_PATH_PREFIX, WS_PATH),
                "health": "/health",
                "state": "/state",
            },
        }))
    });

    let health_route = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "status": "healthy" })));

    let state_route = warp::path("state")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_server(server.clone()))
        .and_then(get_state);

    let reset_route = warp::path!("state" / "reset")
        .and(warp::post())
        .and(with_server(server))
        .and_then(reset_state);

    ws_route
        .or(root_route)
        .or(health_route)
        .or(state_route)
        .or(reset_route)
        .with(cors(config))
}

fn cors(config: &ServerConfig) -> warp::cors::Builder {
    let builder = warp::cors()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type", "authorization"])
        .allow_credentials(true);

    if config.allows_any_origin() {
        builder.allow_any_origin()
    } else {
        builder.allow_origins(config.cors_origins.iter().map(String::as_str))
    }
}

async fn get_state(server: Arc<SyncServer>) -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&server.state().await))
}

async fn reset_state(server: Arc<SyncServer>) -> Result<impl Reply, Infallible> {
    let (state, stats) = server.reset().await;
    info!("Reset broadcast to {} clients", stats.delivered);
    Ok(warp::reply::json(&state))
}

// Helper function to include the server in request handlers
fn with_server(
    server: Arc<SyncServer>,
) -> impl Filter<Extract = (Arc<SyncServer>,), Error = Infallible> + Clone {
    warp::any().map(move || server.clone())
}
