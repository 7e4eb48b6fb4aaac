//! HTTP route definitions

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::account::AccountInfo;
use crate::app::AppState;
use crate::game::{GameError, Symbol};
use crate::service::{GameInfo, ServiceError};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

const API: &str = "/api/v1";

/// JSON body extractor whose rejections render as `AppError`
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
struct ApiJson<T>(T);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let api_routes = Router::new()
        .route("/accounts", post(register_handler))
        .route("/accounts/:account_id", get(account_handler))
        .route("/accounts/:account_id/login", post(login_handler))
        .route(
            "/user-sessions/:session_id/create-game",
            post(create_game_handler),
        )
        .route("/user-sessions/:session_id/join-game", post(join_game_handler))
        .route("/games/:game_id", get(game_handler))
        .route("/games/:game_id/:player_session_id/move", post(move_handler))
        .route("/events", get(ws_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest(API, api_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_games: usize,
    user_sessions: usize,
    player_sessions: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_games: state.service.active_games(),
        user_sessions: state.service.user_session_count(),
        player_sessions: state.service.player_session_count(),
    })
}

// ============================================================================
// Account endpoints
// ============================================================================

#[derive(Deserialize)]
struct RegisterRequest {
    user_name: String,
    password: String,
}

#[derive(Serialize)]
struct AccountLinks {
    account: String,
    login: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    result: &'static str,
    account: AccountInfo,
    links: AccountLinks,
}

async fn register_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let account = state.service.register_user(&req.user_name, &req.password)?;
    let base = format!("{}/accounts/{}", API, account.user_name);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            result: "ok",
            links: AccountLinks {
                login: format!("{}/login", base),
                account: base,
            },
            account,
        }),
    ))
}

async fn account_handler(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<AccountInfo>, AppError> {
    Ok(Json(state.service.account_info(&account_id)?))
}

#[derive(Deserialize)]
struct LoginRequest {
    password: String,
}

#[derive(Serialize)]
struct UserSessionLinks {
    create_game: String,
    join_game: String,
}

#[derive(Serialize)]
struct LoginResponse {
    result: &'static str,
    session_id: String,
    links: UserSessionLinks,
}

async fn login_handler(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let session = state.service.login(&account_id, &req.password)?;
    let base = format!("{}/user-sessions/{}", API, session.session_id());

    Ok(Json(LoginResponse {
        result: "ok",
        session_id: session.session_id().to_string(),
        links: UserSessionLinks {
            create_game: format!("{}/create-game", base),
            join_game: format!("{}/join-game", base),
        },
    }))
}

// ============================================================================
// Game endpoints
// ============================================================================

#[derive(Deserialize)]
struct CreateGameRequest {
    game_id: String,
}

#[derive(Serialize)]
struct CreateGameResponse {
    result: &'static str,
    game_id: String,
    game: String,
}

async fn create_game_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ApiJson(req): ApiJson<CreateGameRequest>,
) -> Result<(StatusCode, Json<CreateGameResponse>), AppError> {
    let session = state.service.user_session(&session_id)?;
    session.create_new_game(&state.service, &req.game_id)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateGameResponse {
            result: "ok",
            game: format!("{}/games/{}", API, req.game_id),
            game_id: req.game_id,
        }),
    ))
}

#[derive(Deserialize)]
struct JoinGameRequest {
    game_id: String,
    symbol: Symbol,
}

#[derive(Serialize)]
struct PlayerSessionLinks {
    make_move: String,
    events: String,
}

#[derive(Serialize)]
struct JoinGameResponse {
    result: &'static str,
    player_session_id: String,
    symbol: Symbol,
    links: PlayerSessionLinks,
}

async fn join_game_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ApiJson(req): ApiJson<JoinGameRequest>,
) -> Result<Json<JoinGameResponse>, AppError> {
    let session = state.service.user_session(&session_id)?;
    let player = state.join_game(&session, &req.game_id, req.symbol)?;

    info!(
        user_session_id = %session_id,
        user_id = %session.user_id(),
        player_session_id = %player.id(),
        game_id = %req.game_id,
        "Joined game"
    );

    Ok(Json(JoinGameResponse {
        result: "ok",
        player_session_id: player.id().to_string(),
        symbol: player.symbol(),
        links: PlayerSessionLinks {
            make_move: format!("{}/games/{}/{}/move", API, req.game_id, player.id()),
            events: format!("{}/events", API),
        },
    }))
}

async fn game_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<Json<GameInfo>, AppError> {
    Ok(Json(state.service.game_info(&game_id)?))
}

/// Signed so that a negative coordinate is reported as a bad move
#[derive(Deserialize)]
struct MoveRequest {
    x: i64,
    y: i64,
}

#[derive(Serialize)]
struct MoveResponse {
    result: &'static str,
}

async fn move_handler(
    State(state): State<AppState>,
    Path((game_id, player_session_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<MoveRequest>,
) -> Result<Json<MoveResponse>, AppError> {
    let (Ok(x), Ok(y)) = (usize::try_from(req.x), usize::try_from(req.y)) else {
        return Err(AppError::OffBoard { x: req.x, y: req.y });
    };

    let player = state.service.player_session(&player_session_id)?;
    if player.game_id() != game_id {
        return Err(ServiceError::PlayerSessionNotFound.into());
    }

    state
        .service
        .make_move(&player_session_id, x, y)?;

    Ok(Json(MoveResponse { result: "accepted" }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A coordinate no board position can have
    #[error("Position ({x}, {y}) is outside the board")]
    OffBoard { x: i64, y: i64 },

    #[error(transparent)]
    BadRequest(#[from] JsonRejection),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Service(e) => match e {
                ServiceError::AccountAlreadyPresent | ServiceError::GameAlreadyPresent => {
                    StatusCode::CONFLICT
                }
                ServiceError::AccountNotFound
                | ServiceError::GameNotFound
                | ServiceError::UserSessionNotFound
                | ServiceError::PlayerSessionNotFound => StatusCode::NOT_FOUND,
                ServiceError::LoginFailed => StatusCode::UNAUTHORIZED,
                ServiceError::Game(GameError::InvalidMove(_)) => StatusCode::BAD_REQUEST,
                ServiceError::Game(GameError::NotAPlayer) => StatusCode::FORBIDDEN,
                ServiceError::Game(_) => StatusCode::CONFLICT,
            },
            AppError::OffBoard { .. } => StatusCode::BAD_REQUEST,
            AppError::BadRequest(rejection) => rejection.status(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Service(e) => e.code(),
            AppError::OffBoard { .. } => "invalid-move",
            AppError::BadRequest(_) => "bad-request",
        }
    }

    /// Value of the `result` field in the error body
    fn result(&self) -> &'static str {
        match self {
            AppError::Service(ServiceError::LoginFailed) => "login-failed",
            AppError::Service(ServiceError::Game(GameError::InvalidMove(_)))
            | AppError::OffBoard { .. } => "invalid-move",
            _ => "error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let message = match &self {
            AppError::BadRequest(rejection) => rejection.body_text(),
            other => other.to_string(),
        };
        let body = serde_json::json!({
            "result": self.result(),
            "code": self.code(),
            "message": message,
        });

        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Config;

    async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register_and_login(router: &Router, user: &str) -> String {
        let (status, _) = call(
            router,
            Method::POST,
            "/api/v1/accounts",
            Some(json!({ "user_name": user, "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(
            router,
            Method::POST,
            &format!("/api/v1/accounts/{}/login", user),
            Some(json!({ "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let router = build_router(AppState::new(Config::default()));
        let (status, body) = call(&router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["active_games"], 0);
    }

    #[tokio::test]
    async fn test_duplicate_account_and_bad_login() {
        let router = build_router(AppState::new(Config::default()));
        register_and_login(&router, "alice").await;

        let (status, body) = call(
            &router,
            Method::POST,
            "/api/v1/accounts",
            Some(json!({ "user_name": "alice", "password": "other" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "account-already-present");

        let (status, body) = call(
            &router,
            Method::POST,
            "/api/v1/accounts/alice/login",
            Some(json!({ "password": "wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["result"], "login-failed");

        let (status, body) = call(
            &router,
            Method::POST,
            "/api/v1/accounts/nobody/login",
            Some(json!({ "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["result"], "login-failed");

        let (status, body) = call(&router, Method::GET, "/api/v1/accounts/alice", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_name"], "alice");
    }

    #[tokio::test]
    async fn test_full_round_trip() {
        let state = AppState::new(Config::default());
        let router = build_router(state.clone());

        let alice = register_and_login(&router, "alice").await;
        let bob = register_and_login(&router, "bob").await;

        let (status, _) = call(
            &router,
            Method::POST,
            &format!("/api/v1/user-sessions/{}/create-game", alice),
            Some(json!({ "game_id": "g1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, x) = call(
            &router,
            Method::POST,
            &format!("/api/v1/user-sessions/{}/join-game", alice),
            Some(json!({ "game_id": "g1", "symbol": "X" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, o) = call(
            &router,
            Method::POST,
            &format!("/api/v1/user-sessions/{}/join-game", bob),
            Some(json!({ "game_id": "g1", "symbol": "O" })),
        )
        .await;

        let x_session = x["player_session_id"].as_str().unwrap().to_string();
        let o_session = o["player_session_id"].as_str().unwrap().to_string();
        assert_ne!(x_session, o_session);

        let (_, game) = call(&router, Method::GET, "/api/v1/games/g1", None).await;
        assert_eq!(game["game_state"], "in-progress");
        assert_eq!(game["turn"], "X");

        let move_uri = x["links"]["make_move"].as_str().unwrap().to_string();
        let (status, body) =
            call(&router, Method::POST, &move_uri, Some(json!({ "x": 0, "y": 0 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "accepted");

        let (status, body) =
            call(&router, Method::POST, &move_uri, Some(json!({ "x": 1, "y": 0 }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "not-your-turn");

        let o_move = format!("/api/v1/games/g1/{}/move", o_session);
        let (status, body) =
            call(&router, Method::POST, &o_move, Some(json!({ "x": 0, "y": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["result"], "invalid-move");

        // Not yet subscribed: GameStarted and NewMove wait in the buffer
        let notifier = state.notifiers.get(&x_session).unwrap().value().clone();
        assert_eq!(notifier.pending_len(), 2);
        assert!(!notifier.is_armed());
    }

    #[tokio::test]
    async fn test_negative_coordinate_is_invalid_move() {
        let router = build_router(AppState::new(Config::default()));
        let alice = register_and_login(&router, "alice").await;
        let bob = register_and_login(&router, "bob").await;
        call(
            &router,
            Method::POST,
            &format!("/api/v1/user-sessions/{}/create-game", alice),
            Some(json!({ "game_id": "g1" })),
        )
        .await;
        let (_, x) = call(
            &router,
            Method::POST,
            &format!("/api/v1/user-sessions/{}/join-game", alice),
            Some(json!({ "game_id": "g1", "symbol": "X" })),
        )
        .await;
        call(
            &router,
            Method::POST,
            &format!("/api/v1/user-sessions/{}/join-game", bob),
            Some(json!({ "game_id": "g1", "symbol": "O" })),
        )
        .await;

        let move_uri = x["links"]["make_move"].as_str().unwrap().to_string();
        for body in [json!({ "x": -1, "y": 0 }), json!({ "x": 0, "y": 3 })] {
            let (status, body) = call(&router, Method::POST, &move_uri, Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["result"], "invalid-move");
            assert_eq!(body["code"], "invalid-move");
        }

        let (_, game) = call(&router, Method::GET, "/api/v1/games/g1", None).await;
        assert_eq!(game["turn"], "X");
        assert!(game["board_state"]
            .as_array()
            .unwrap()
            .iter()
            .all(|cell| cell == ""));
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error() {
        let router = build_router(AppState::new(Config::default()));
        let (status, body) = call(
            &router,
            Method::POST,
            "/api/v1/accounts",
            Some(json!({ "user_name": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["result"], "error");
        assert_eq!(body["code"], "bad-request");
        assert!(body["message"].as_str().unwrap().contains("password"));
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let router = build_router(AppState::new(Config::default()));
        let (status, body) = call(&router, Method::GET, "/api/v1/games/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "game-not-present");

        let (status, body) = call(
            &router,
            Method::POST,
            "/api/v1/user-sessions/user-session-99/create-game",
            Some(json!({ "game_id": "g1" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "user-session-not-present");

        let (status, _) = call(
            &router,
            Method::POST,
            "/api/v1/games/g1/player-session-1/move",
            Some(json!({ "x": 0, "y": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
