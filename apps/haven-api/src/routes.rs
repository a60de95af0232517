use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{AppState, unix_now};
use haven_engine::TurnInput;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/turn", post(turn))
		.route("/v1/turn_audio", post(turn_audio))
		.route("/v1/end", post(end))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new().route("/v1/admin/stats", get(stats)).with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
	pub session_id: Option<Uuid>,
	pub user_id: String,
	pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
	pub session_id: Uuid,
	pub intent: String,
	pub confidence: f32,
	pub route_reason: String,
	pub reply: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub audio: Option<Vec<u8>>,
}

async fn turn(
	State(state): State<AppState>,
	Json(payload): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
	validate_user_id(&payload.user_id)?;

	let input = TurnInput::text(payload.message, unix_now());

	run_turn(&state, payload.session_id, &payload.user_id, input).await
}

#[derive(Debug, Deserialize)]
pub struct AudioParams {
	pub session_id: Option<Uuid>,
	pub user_id: String,
	#[serde(default = "default_sample_rate")]
	pub sample_rate: u32,
}

fn default_sample_rate() -> u32 {
	16_000
}

async fn turn_audio(
	State(state): State<AppState>,
	Query(params): Query<AudioParams>,
	body: Bytes,
) -> Result<Json<TurnResponse>, ApiError> {
	validate_user_id(&params.user_id)?;

	if body.is_empty() {
		return Err(json_error(
			StatusCode::BAD_REQUEST,
			"empty_audio",
			"Audio body must be non-empty.",
			None,
		));
	}

	let input = TurnInput::audio(body.to_vec(), params.sample_rate, unix_now());

	run_turn(&state, params.session_id, &params.user_id, input).await
}

async fn run_turn(
	state: &AppState,
	session_id: Option<Uuid>,
	user_id: &str,
	input: TurnInput,
) -> Result<Json<TurnResponse>, ApiError> {
	let now = input.now;
	let (id, handle) = state.sessions.resolve(session_id, user_id, now).await;
	let mut session = handle.lock().await;
	let outcome = state.engine.run_turn(&mut session, input).await;

	Ok(Json(TurnResponse {
		session_id: id,
		intent: outcome.intent.as_str().to_owned(),
		confidence: outcome.confidence,
		route_reason: outcome.route_reason,
		reply: outcome.reply,
		audio: outcome.audio,
	}))
}

#[derive(Debug, Deserialize)]
pub struct EndRequest {
	pub session_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct EndResponse {
	pub artifact_ref: String,
}

async fn end(
	State(state): State<AppState>,
	Json(payload): Json<EndRequest>,
) -> Result<Json<EndResponse>, ApiError> {
	match state.sessions.end(payload.session_id, unix_now()).await {
		Some(artifact) => Ok(Json(EndResponse { artifact_ref: artifact.uri() })),
		None => Err(json_error(
			StatusCode::NOT_FOUND,
			"unknown_session",
			"No active session with that id.",
			None,
		)),
	}
}

async fn stats(State(state): State<AppState>) -> Json<haven_session::Stats> {
	Json(state.sessions.stats().await)
}

fn validate_user_id(user_id: &str) -> Result<(), ApiError> {
	if user_id.trim().is_empty() {
		return Err(json_error(
			StatusCode::BAD_REQUEST,
			"invalid_request",
			"user_id must be non-empty.",
			Some(vec!["user_id".to_string()]),
		));
	}

	Ok(())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self {
			status,
			error_code: error_code.into(),
			message: message.into(),
			fields,
		}
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody {
			error_code: self.error_code,
			message: self.message,
			fields: self.fields,
		};
		(self.status, Json(body)).into_response()
	}
}
