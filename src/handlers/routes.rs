//! HTTP routes
//!
//! Each handler resolves the caller, calls into `GameServer` and renders the
//! result. Errors render through `ArenaError`'s reply so every failure has the
//! same JSON shape.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::constants::WS_PATH;
use crate::core::matchmaker::MatchStatus;
use crate::core::message::MoveRequest;
use crate::core::server::SharedGameServer;
use crate::error::Result;
use crate::handlers::websocket::{handle_ws_client, GatewayQuery};

/// Body of the register and login requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Every route the server exposes
pub fn routes(
    server: SharedGameServer,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    ws_route(server.clone())
        .or(account_routes(server.clone()))
        .or(game_routes(server.clone()))
        .or(matchmaking_routes(server.clone()))
        .or(leaderboard_route(server))
        .or(health_route())
        .recover(handle_rejection)
}

/// `GET /ws?gameId=..`
pub fn ws_route(
    server: SharedGameServer,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path(WS_PATH)
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::query::<GatewayQuery>())
        .and(authorization())
        .and(with_server(server))
        .map(
            |ws: warp::ws::Ws, query: GatewayQuery, auth: Option<String>, server: SharedGameServer| {
                ws.on_upgrade(move |socket| handle_ws_client(socket, query, auth, server))
            },
        )
}

fn account_routes(
    server: SharedGameServer,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let register = warp::path!("register")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_server(server.clone()))
        .and_then(register_handler);

    let login = warp::path!("login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_server(server))
        .and_then(login_handler);

    register.or(login)
}

fn game_routes(
    server: SharedGameServer,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let create = warp::path!("games")
        .and(warp::post())
        .and(authorization())
        .and(with_server(server.clone()))
        .and_then(create_game_handler);

    let get = warp::path!("games" / String)
        .and(warp::get())
        .and(authorization())
        .and(with_server(server.clone()))
        .and_then(get_game_handler);

    let join = warp::path!("games" / String / "join")
        .and(warp::post())
        .and(authorization())
        .and(with_server(server.clone()))
        .and_then(join_game_handler);

    let play = warp::path!("games" / String / "move")
        .and(warp::post())
        .and(authorization())
        .and(warp::body::json())
        .and(with_server(server))
        .and_then(move_handler);

    create.or(get).or(join).or(play)
}

fn matchmaking_routes(
    server: SharedGameServer,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let base = warp::path!("matchmaking").and(authorization());

    let find = base
        .clone()
        .and(warp::post())
        .and(with_server(server.clone()))
        .and_then(find_match_handler);

    let status = base
        .clone()
        .and(warp::get())
        .and(with_server(server.clone()))
        .and_then(match_status_handler);

    let cancel = base
        .and(warp::delete())
        .and(with_server(server))
        .and_then(cancel_match_handler);

    find.or(status).or(cancel)
}

fn leaderboard_route(
    server: SharedGameServer,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("leaderboard")
        .and(warp::get())
        .and(with_server(server))
        .and_then(leaderboard_handler)
}

fn health_route() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("health").and(warp::get()).map(|| "OK")
}

// Helper function to include the game server in a request
fn with_server(
    server: SharedGameServer,
) -> impl Filter<Extract = (SharedGameServer,), Error = Infallible> + Clone {
    warp::any().map(move || server.clone())
}

fn authorization() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
}

// Render a handler result with `status` on success
fn respond<T: Serialize>(result: Result<T>, status: StatusCode) -> Response {
    match result {
        Ok(body) => warp::reply::with_status(warp::reply::json(&body), status).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn register_handler(
    credentials: Credentials,
    server: SharedGameServer,
) -> std::result::Result<Response, Infallible> {
    let result = server
        .register(&credentials.username, &credentials.password)
        .await
        .map(|()| json!({"status": "ok", "message": "User registered successfully"}));
    Ok(respond(result, StatusCode::CREATED))
}

async fn login_handler(
    credentials: Credentials,
    server: SharedGameServer,
) -> std::result::Result<Response, Infallible> {
    let result = server
        .login(&credentials.username, &credentials.password)
        .await
        .map(|token| json!({"status": "ok", "token": token}));
    Ok(respond(result, StatusCode::OK))
}

async fn create_game_handler(
    auth: Option<String>,
    server: SharedGameServer,
) -> std::result::Result<Response, Infallible> {
    let result = match server.authenticate(auth.as_deref()) {
        Ok(user) => server.create_game(&user).await,
        Err(e) => Err(e),
    };
    Ok(respond(result, StatusCode::CREATED))
}

async fn get_game_handler(
    game_id: String,
    auth: Option<String>,
    server: SharedGameServer,
) -> std::result::Result<Response, Infallible> {
    let result = match server.authenticate(auth.as_deref()) {
        Ok(user) => server.get_game(&game_id, &user).await,
        Err(e) => Err(e),
    };
    Ok(respond(result, StatusCode::OK))
}

async fn join_game_handler(
    game_id: String,
    auth: Option<String>,
    server: SharedGameServer,
) -> std::result::Result<Response, Infallible> {
    let result = match server.authenticate(auth.as_deref()) {
        Ok(user) => server.join_game(&game_id, &user).await,
        Err(e) => Err(e),
    };
    Ok(respond(result, StatusCode::OK))
}

async fn move_handler(
    game_id: String,
    auth: Option<String>,
    request: MoveRequest,
    server: SharedGameServer,
) -> std::result::Result<Response, Infallible> {
    let result = match server.authenticate(auth.as_deref()) {
        Ok(user) => server.submit_move(&game_id, &user, &request.token).await,
        Err(e) => Err(e),
    };
    Ok(respond(result, StatusCode::OK))
}

async fn find_match_handler(
    auth: Option<String>,
    server: SharedGameServer,
) -> std::result::Result<Response, Infallible> {
    let result = match server.authenticate(auth.as_deref()) {
        Ok(user) => server.find_match(&user).await,
        Err(e) => Err(e),
    };
    let status = match &result {
        Ok(MatchStatus::Searching) => StatusCode::ACCEPTED,
        _ => StatusCode::OK,
    };
    Ok(respond(result, status))
}

async fn match_status_handler(
    auth: Option<String>,
    server: SharedGameServer,
) -> std::result::Result<Response, Infallible> {
    let result = match server.authenticate(auth.as_deref()) {
        Ok(user) => server.match_status(&user).await,
        Err(e) => Err(e),
    };
    Ok(respond(result, StatusCode::OK))
}

async fn cancel_match_handler(
    auth: Option<String>,
    server: SharedGameServer,
) -> std::result::Result<Response, Infallible> {
    let result = match server.authenticate(auth.as_deref()) {
        Ok(user) => Ok(json!({
            "status": "ok",
            "cancelled": server.cancel_match(&user).await,
        })),
        Err(e) => Err(e),
    };
    Ok(respond(result, StatusCode::OK))
}

async fn leaderboard_handler(server: SharedGameServer) -> std::result::Result<Response, Infallible> {
    Ok(respond(server.leaderboard().await, StatusCode::OK))
}

/// Render warp's own rejections in the error JSON shape
pub async fn handle_rejection(rejection: Rejection) -> std::result::Result<Response, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if rejection.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid request")
    } else if rejection.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query")
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        log::warn!("Unhandled rejection: {:?}", rejection);
        (StatusCode::BAD_REQUEST, "Bad request")
    };

    let body = json!({"status": "error", "message": message});
    Ok(warp::reply::with_status(warp::reply::json(&body), status).into_response())
}
