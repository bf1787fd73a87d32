//! HTTP routes
//!
//! - `POST /api/v1/conversation/turn`: one conversational turn
//! - `GET /api/v1/actions`: the action registry
//! - `GET /healthz`: liveness
//!
//! The caller's identity comes from `x-tenant-id` and `x-user-id`, set by
//! the authentication layer in front of this service.

use parley_core::{CallerIdentity, EngineError, ResolutionEngine, TurnRequest};
use parley_schema::ActionSchema;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Largest accepted turn body, in bytes
pub const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Message for server-side failures
const INTERNAL_MESSAGE: &str = "Something went wrong on our side. Please try again.";

#[derive(Debug)]
enum ApiRejection {
    Unauthenticated,
}

impl warp::reject::Reject for ApiRejection {}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct ActionsBody<'a> {
    actions: Vec<&'a ActionSchema>,
}

/// All routes with rejection handling
pub fn routes(
    engine: Arc<ResolutionEngine>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    turn(engine.clone())
        .or(actions(engine))
        .or(health())
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn with_engine(
    engine: Arc<ResolutionEngine>,
) -> impl Filter<Extract = (Arc<ResolutionEngine>,), Error = Infallible> + Clone {
    warp::any().map(move || engine.clone())
}

fn caller() -> impl Filter<Extract = (CallerIdentity,), Error = Rejection> + Clone {
    warp::header::optional::<String>("x-tenant-id")
        .and(warp::header::optional::<String>("x-user-id"))
        .and_then(|tenant: Option<String>, user: Option<String>| async move {
            match (tenant, user) {
                (Some(tenant), Some(user)) if !tenant.trim().is_empty() && !user.trim().is_empty() => {
                    Ok(CallerIdentity::new(tenant, user))
                }
                _ => Err(warp::reject::custom(ApiRejection::Unauthenticated)),
            }
        })
}

fn turn(
    engine: Arc<ResolutionEngine>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("api" / "v1" / "conversation" / "turn")
        .and(warp::post())
        .and(caller())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json::<TurnRequest>())
        .and(with_engine(engine))
        .and_then(handle_turn)
}

fn actions(
    engine: Arc<ResolutionEngine>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("api" / "v1" / "actions")
        .and(warp::get())
        .and(with_engine(engine))
        .map(|engine: Arc<ResolutionEngine>| {
            warp::reply::json(&ActionsBody {
                actions: engine.registry().schemas().collect(),
            })
        })
}

fn health() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("healthz")
        .and(warp::get())
        .map(|| warp::reply::json(&json!({"status": "ok"})))
}

async fn handle_turn(
    caller: CallerIdentity,
    request: TurnRequest,
    engine: Arc<ResolutionEngine>,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Infallible> {
    match engine.handle_turn(&caller, request).await {
        Ok(response) => Ok(warp::reply::with_status(
            warp::reply::json(&response),
            StatusCode::OK,
        )),
        Err(err) => Ok(engine_error(&err)),
    }
}

fn engine_error(err: &EngineError) -> warp::reply::WithStatus<warp::reply::Json> {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let detail = err.to_string();
    let message = if status.is_server_error() {
        tracing::error!(error = %err, "turn failed");
        INTERNAL_MESSAGE
    } else {
        tracing::debug!(error = %err, status = status.as_u16(), "turn rejected");
        detail.as_str()
    };
    error_reply(status, message)
}

fn error_reply(status: StatusCode, message: &str) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&ErrorBody { message }), status)
}

async fn handle_rejection(
    err: Rejection,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Infallible> {
    let reply = if err.is_not_found() {
        error_reply(StatusCode::NOT_FOUND, "Not found.")
    } else if let Some(ApiRejection::Unauthenticated) = err.find() {
        error_reply(
            StatusCode::UNAUTHORIZED,
            "Missing x-tenant-id or x-user-id header.",
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        error_reply(StatusCode::PAYLOAD_TOO_LARGE, "Request body is too large.")
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        error_reply(StatusCode::BAD_REQUEST, &e.to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        error_reply(StatusCode::LENGTH_REQUIRED, "Content-Length is required.")
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        error_reply(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Send the turn as application/json.",
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.")
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        error_reply(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
    };
    Ok(reply)
}
