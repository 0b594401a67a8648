use std::{convert::Infallible, net::SocketAddr};

use axum::{
    extract::Path,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Extension, Json, Router,
};
use futures::{Stream, StreamExt};
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::{
    actions::CommandReply,
    bridge::BridgeHandle,
    command::{Command, Rejection},
    config::Config,
    error::Error,
    serial::FeedbackLine,
    websocket,
};

/// The port used when nothing else is configured.
pub const DEFAULT_PORT: u16 = 5000;

fn reply(result: Result<Command, Rejection>) -> (StatusCode, Json<CommandReply>) {
    let status = if result.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    (status, Json(CommandReply::from(result)))
}

async fn command_for_fan(
    Path((fan, key)): Path<(String, String)>,
    Extension(bridge): Extension<BridgeHandle>,
) -> impl IntoResponse {
    reply(bridge.submit(Some(&fan), &key).await)
}

async fn command(
    Path(key): Path<String>,
    Extension(bridge): Extension<BridgeHandle>,
) -> impl IntoResponse {
    reply(bridge.submit(None, &key).await)
}

fn event(line: FeedbackLine) -> Event {
    // Lines never hold a newline, but may hold a lone carriage return
    // which would end the event early.
    Event::default().data(line.as_str().replace('\r', ""))
}

async fn stream(
    Extension(bridge): Extension<BridgeHandle>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Feedback stream opened");

    Sse::new(bridge.subscribe().map(|line| Ok(event(line)))).keep_alive(KeepAlive::default())
}

async fn feedback(Extension(bridge): Extension<BridgeHandle>) -> Json<Vec<FeedbackLine>> {
    Json(bridge.history())
}

async fn config(Extension(config): Extension<Config>) -> Json<Config> {
    Json(config)
}

async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// All routes, ready to be served.
pub fn router(config: Config, bridge: BridgeHandle) -> Router {
    Router::new()
        .route("/cmd/:fan/:key", get(command_for_fan))
        // Shares the parameter name with the route above, the router insists.
        .route("/cmd/:fan", get(command))
        .route("/stream", get(stream))
        .route("/feedback", get(feedback))
        .route("/ws", get(websocket::ws_handler))
        .route("/config", get(self::config))
        .route("/version", get(version))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(bridge))
                .layer(Extension(config)),
        )
}

async fn run(
    config: Config,
    bridge: BridgeHandle,
    addr: SocketAddr,
    allocated_port: Option<oneshot::Sender<u16>>,
) -> Result<(), Error> {
    let app = router(config, bridge);

    let server = axum::Server::try_bind(&addr)
        .map_err(|e| Error::Server(format!("Could not bind to {addr}: {e}")))?
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());
    let addr = server.local_addr();

    if let Some(port_reply) = allocated_port {
        if port_reply.send(addr.port()).is_err() {
            warn!("Nobody wanted to know the allocated port");
        }
    }

    info!("Listening on http://{addr}");

    server.await.map_err(|e| Error::Server(e.to_string()))
}

/// Start the server on an arbitrary available port on localhost.
/// The port allocated will be sent on the provided channel.
pub async fn run_any_port(
    config: Config,
    bridge: BridgeHandle,
    allocated_port: oneshot::Sender<u16>,
) -> Result<(), Error> {
    let addr = SocketAddr::from(([127, 0, 0, 1], 0));

    run(config, bridge, addr, Some(allocated_port)).await
}

/// Start the server on the configured address and port.
pub async fn run_configured(config: Config, bridge: BridgeHandle) -> Result<(), Error> {
    let addr = SocketAddr::new(config.server.address, config.server.port);

    run(config, bridge, addr, None).await
}
