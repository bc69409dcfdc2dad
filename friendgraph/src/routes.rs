use crate::error::ApiError;
use crate::models::{
    CrawlIdsInput, CrawlInput, CrawlResponse, CrawlingStatusResponse, ExistsResponse,
    FinishedCrawlsResponse, FinishedDistancesResponse, GameDetailsResponse, GameIdsInput,
    GamesDetailsResponse, GraphDataResponse, HealthResponse, LevelSteamIdInput, MessageResponse,
    SUCCESS, ShortestDistanceResponse, TimestampQuery, UserResponse,
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use friendgraph_core::CoreError;
use friendgraph_core::engine::Engine;
use friendgraph_core::model::{Depth, NewUserEvent};
use friendgraph_core::validate::ProfileVisibility;
use serde_json::value::RawValue;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn is_private_profile(
    State(engine): State<Arc<Engine>>,
    Path(steam_id): Path<String>,
) -> ApiResult<MessageResponse> {
    match engine.check_visibility(&steam_id).await? {
        ProfileVisibility::Unknown => Err(CoreError::UpstreamUnavailable(format!(
            "could not check the visibility of {}",
            steam_id.trim()
        ))
        .into()),
        visibility => Ok(Json(MessageResponse::success(visibility.as_str()))),
    }
}

pub async fn has_been_crawled_before(
    State(engine): State<Arc<Engine>>,
    payload: Result<Json<LevelSteamIdInput>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let Json(input) = payload?;
    let depth = Depth::from_level(input.level)?;
    let crawl_id = engine.find_existing(&input.steamid, depth)?;
    Ok(Json(MessageResponse::success(crawl_id.unwrap_or_default())))
}

pub async fn crawl(
    State(engine): State<Arc<Engine>>,
    payload: Result<Json<CrawlInput>, JsonRejection>,
) -> ApiResult<CrawlResponse> {
    let Json(input) = payload?;
    let depth = Depth::from_level(input.level)?;
    let crawlids = engine.submit(&input.steamids, depth).await?;
    info!("Crawl request for {:?} at level {} -> {:?}", input.steamids, input.level, crawlids);

    Ok(Json(CrawlResponse {
        status: SUCCESS.to_string(),
        crawlids,
    }))
}

pub async fn get_crawling_status(
    State(engine): State<Arc<Engine>>,
    Path(crawl_id): Path<String>,
) -> ApiResult<CrawlingStatusResponse> {
    let job = engine.status(&crawl_id)?;
    Ok(Json(CrawlingStatusResponse {
        status: SUCCESS.to_string(),
        crawlingstatus: job.into(),
    }))
}

pub async fn get_finished_crawls_after_timestamp(
    State(engine): State<Arc<Engine>>,
    query: Result<Query<TimestampQuery>, QueryRejection>,
) -> ApiResult<FinishedCrawlsResponse> {
    let Query(query) = query?;
    let crawls = engine
        .finished_since(query.timestamp)?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(FinishedCrawlsResponse {
        status: SUCCESS.to_string(),
        crawls,
    }))
}

pub async fn get_finished_shortest_distance_crawls_after_timestamp(
    State(engine): State<Arc<Engine>>,
    query: Result<Query<TimestampQuery>, QueryRejection>,
) -> ApiResult<FinishedDistancesResponse> {
    let Query(query) = query?;
    Ok(Json(FinishedDistancesResponse {
        status: SUCCESS.to_string(),
        crawlingstatus: engine.distances_since(query.timestamp)?,
    }))
}

pub async fn does_processed_graph_data_exist(
    State(engine): State<Arc<Engine>>,
    Path(crawl_id): Path<String>,
) -> ApiResult<ExistsResponse> {
    Ok(Json(ExistsResponse::new(engine.graph_exists(&crawl_id)?)))
}

pub async fn get_processed_graph_data(
    State(engine): State<Arc<Engine>>,
    Path(crawl_id): Path<String>,
) -> ApiResult<GraphDataResponse> {
    let payload = engine.graph(&crawl_id)?;
    Ok(Json(GraphDataResponse {
        status: SUCCESS.to_string(),
        usergraphdata: RawValue::from_string(payload)?,
    }))
}

pub async fn create_graph(
    State(engine): State<Arc<Engine>>,
    Path(crawl_id): Path<String>,
) -> ApiResult<MessageResponse> {
    engine.graph(&crawl_id)?;
    Ok(Json(MessageResponse::success(crawl_id)))
}

pub async fn calculate_shortest_distance_info(
    State(engine): State<Arc<Engine>>,
    payload: Result<Json<CrawlIdsInput>, JsonRejection>,
) -> ApiResult<ShortestDistanceResponse> {
    let Json(input) = payload?;
    Ok(Json(ShortestDistanceResponse {
        status: SUCCESS.to_string(),
        shortestdistanceinfo: engine.compute_distance(&input.crawlids)?,
    }))
}

pub async fn get_shortest_distance_info(
    State(engine): State<Arc<Engine>>,
    payload: Result<Json<CrawlIdsInput>, JsonRejection>,
) -> ApiResult<ShortestDistanceResponse> {
    let Json(input) = payload?;
    Ok(Json(ShortestDistanceResponse {
        status: SUCCESS.to_string(),
        shortestdistanceinfo: engine.get_distance(&input.crawlids)?,
    }))
}

pub async fn get_crawling_user(
    State(engine): State<Arc<Engine>>,
    Path(crawl_id): Path<String>,
) -> ApiResult<UserResponse> {
    Ok(Json(UserResponse {
        status: SUCCESS.to_string(),
        user: engine.crawling_user(&crawl_id)?,
    }))
}

pub async fn get_game_details(
    State(engine): State<Arc<Engine>>,
    Path(appid): Path<String>,
) -> ApiResult<GameDetailsResponse> {
    let appid = appid
        .parse::<u32>()
        .map_err(|_| CoreError::InvalidInput(format!("'{}' is not a game id", appid)))?;
    Ok(Json(GameDetailsResponse {
        status: SUCCESS.to_string(),
        game: engine.game_details(appid)?,
    }))
}

pub async fn get_details_for_games(
    State(engine): State<Arc<Engine>>,
    payload: Result<Json<GameIdsInput>, JsonRejection>,
) -> ApiResult<GamesDetailsResponse> {
    let Json(input) = payload?;
    Ok(Json(GamesDetailsResponse {
        status: SUCCESS.to_string(),
        games: engine.games_details(&input.gameids)?,
    }))
}

/// Pushes every newly stored profile to the socket as a JSON text frame.
pub async fn new_user_stream(
    State(engine): State<Arc<Engine>>,
    ws: WebSocketUpgrade,
) -> Response {
    let events = engine.subscribe_new_users();
    ws.on_upgrade(move |socket| stream_new_users(socket, events))
}

async fn stream_new_users(mut socket: WebSocket, mut events: broadcast::Receiver<NewUserEvent>) {
    debug!("New user stream opened");
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("Could not serialize new user event: {}", e);
                            continue;
                        }
                    };
                    if socket.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("New user stream fell behind, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("New user stream closed");
}

pub async fn health(State(engine): State<Arc<Engine>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "operational".to_string(),
        uptime: engine.uptime().as_secs(),
    })
}
