use crate::routes;
use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use friendgraph_core::engine::Engine;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/isprivateprofile/:steamid", get(routes::is_private_profile))
        .route("/api/hasbeencrawledbefore", post(routes::has_been_crawled_before))
        .route("/crawl", post(routes::crawl))
        .route("/api/getcrawlingstatus/:crawlid", get(routes::get_crawling_status))
        .route(
            "/api/getfinishedcrawlsaftertimestamp",
            get(routes::get_finished_crawls_after_timestamp),
        )
        .route(
            "/api/getfinishedshortestdistancecrawlsaftertimestamp",
            get(routes::get_finished_shortest_distance_crawls_after_timestamp),
        )
        .route(
            "/api/doesprocessedgraphdataexist/:crawlid",
            post(routes::does_processed_graph_data_exist),
        )
        .route(
            "/api/getprocessedgraphdata/:crawlid",
            post(routes::get_processed_graph_data),
        )
        .route("/creategraph/:crawlid", post(routes::create_graph))
        .route(
            "/api/calculateshortestdistanceinfo",
            post(routes::calculate_shortest_distance_info),
        )
        .route(
            "/api/getshortestdistanceinfo",
            post(routes::get_shortest_distance_info),
        )
        .route("/api/getcrawlinguser/:crawlid", get(routes::get_crawling_user))
        .route("/getgamedetails/:appid", get(routes::get_game_details))
        .route("/api/getdetailsforgames", post(routes::get_details_for_games))
        .route("/ws/newuserstream", get(routes::new_user_stream))
        .route("/status", post(routes::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

/// Serves the API until ctrl-c or SIGTERM.
pub async fn serve(engine: Arc<Engine>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(engine);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
