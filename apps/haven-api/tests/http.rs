use std::sync::Arc;

use axum::{
	body::{self, Body},
	http::{Request, StatusCode},
};
use tower::util::ServiceExt;

use haven_api::{routes, state::AppState};
use haven_config::{Config, Providers, Retrieval, Service, Session, Storage};
use haven_providers::Providers as ProviderHandles;
use haven_testkit::{
	CountingEmbedder, ScriptedLlm, SilentSpeech, dummy_embedding_config, dummy_llm_config,
	dummy_speech_config,
};

fn test_config() -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			admin_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		session: Session {
			idle_secs: 300,
			sweep_interval_secs: 60,
			history_window: 10,
			max_steps_per_turn: 12,
			review_max_retries: 1,
		},
		providers: Providers {
			llm: dummy_llm_config(),
			embedding: dummy_embedding_config(8),
			speech: dummy_speech_config(),
		},
		retrieval: Retrieval {
			short_query_words: 6,
			long_query_words: 40,
			snippet_max_chars: 2_000,
			snippet_prefix_window: 40,
			indices: Vec::new(),
		},
		storage: Storage { user_memory_path: None },
	}
}

fn test_state(llm: Arc<ScriptedLlm>, speech: Arc<SilentSpeech>) -> AppState {
	let providers = ProviderHandles::new(llm, Arc::new(CountingEmbedder::new()), speech);

	AppState::with_providers(test_config(), providers)
		.expect("Failed to initialize app state.")
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
	let body = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");

	serde_json::from_slice(&body).expect("Failed to parse response.")
}

fn post_json(uri: &str, payload: serde_json::Value) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri(uri)
		.header("content-type", "application/json")
		.body(Body::from(payload.to_string()))
		.expect("Failed to build request.")
}

#[tokio::test]
async fn health_ok() {
	let state = test_state(Arc::new(ScriptedLlm::new()), Arc::new(SilentSpeech::new()));
	let app = routes::router(state);
	let response = app
		.oneshot(
			Request::builder()
				.uri("/health")
				.body(Body::empty())
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call /health.");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn turn_round_trip_keeps_the_session() {
	let llm = Arc::new(ScriptedLlm::new());

	llm.push_json(serde_json::json!({
		"intent": "therapist",
		"confidence": 0.85,
		"reason": "support request",
	}));
	llm.push_text("You are not alone in this.");
	llm.push_json(serde_json::json!({ "verdict": "APPROVE", "reason": "safe" }));
	llm.push_json(serde_json::json!({ "relevant": false }));

	let state = test_state(llm, Arc::new(SilentSpeech::new()));
	let app = routes::router(state);
	let response = app
		.clone()
		.oneshot(post_json(
			"/v1/turn",
			serde_json::json!({ "user_id": "u1", "message": "I need someone to talk to" }),
		))
		.await
		.expect("Failed to call /v1/turn.");

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert_eq!(json["intent"], "support");
	assert_eq!(json["reply"], "You are not alone in this.");

	let session_id = json["session_id"].as_str().expect("session id").to_owned();
	let response = app
		.oneshot(post_json(
			"/v1/turn",
			serde_json::json!({
				"session_id": session_id,
				"user_id": "u1",
				"message": "thank you",
			}),
		))
		.await
		.expect("Failed to call /v1/turn again.");
	let json = json_body(response).await;

	assert_eq!(json["session_id"], session_id.as_str());
}

#[tokio::test]
async fn blank_user_id_is_rejected() {
	let state = test_state(Arc::new(ScriptedLlm::new()), Arc::new(SilentSpeech::new()));
	let app = routes::router(state);
	let response = app
		.oneshot(post_json(
			"/v1/turn",
			serde_json::json!({ "user_id": "  ", "message": "hello" }),
		))
		.await
		.expect("Failed to call /v1/turn.");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let json = json_body(response).await;

	assert_eq!(json["error_code"], "invalid_request");
	assert_eq!(json["fields"][0], "user_id");
}

#[tokio::test]
async fn internal_degradation_never_surfaces_as_an_error() {
	// No scripted replies at all: every model call is degraded.
	let state = test_state(Arc::new(ScriptedLlm::new()), Arc::new(SilentSpeech::new()));
	let app = routes::router(state);
	let response = app
		.oneshot(post_json(
			"/v1/turn",
			serde_json::json!({ "user_id": "u1", "message": "I do not know where to start" }),
		))
		.await
		.expect("Failed to call /v1/turn.");

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert_eq!(json["route_reason"], "llm_failure");
	assert!(!json["reply"].as_str().expect("reply").is_empty());
}

#[tokio::test]
async fn audio_turn_enters_through_transcription() {
	let state = test_state(
		Arc::new(ScriptedLlm::new()),
		Arc::new(SilentSpeech::with_transcript("I need help")),
	);
	let app = routes::router(state);
	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/v1/turn_audio?user_id=u1&sample_rate=16000")
				.header("content-type", "application/octet-stream")
				.body(Body::from(vec![0_u8; 64]))
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call /v1/turn_audio.");

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert!(!json["reply"].as_str().expect("reply").is_empty());
}

#[tokio::test]
async fn explicit_end_returns_an_artifact_and_404s_after() {
	let state = test_state(Arc::new(ScriptedLlm::new()), Arc::new(SilentSpeech::new()));
	let app = routes::router(state.clone());
	let response = app
		.clone()
		.oneshot(post_json(
			"/v1/turn",
			serde_json::json!({ "user_id": "u1", "message": "hello" }),
		))
		.await
		.expect("Failed to call /v1/turn.");
	let session_id =
		json_body(response).await["session_id"].as_str().expect("session id").to_owned();
	let response = app
		.clone()
		.oneshot(post_json("/v1/end", serde_json::json!({ "session_id": session_id })))
		.await
		.expect("Failed to call /v1/end.");

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert_eq!(json["artifact_ref"], "memory://u1/archives/0");

	let response = app
		.oneshot(post_json("/v1/end", serde_json::json!({ "session_id": session_id })))
		.await
		.expect("Failed to call /v1/end again.");

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_stats_counts_sessions() {
	let state = test_state(Arc::new(ScriptedLlm::new()), Arc::new(SilentSpeech::new()));
	let app = routes::router(state.clone());
	let admin = routes::admin_router(state);

	app.oneshot(post_json(
		"/v1/turn",
		serde_json::json!({ "user_id": "u1", "message": "hello" }),
	))
	.await
	.expect("Failed to call /v1/turn.");

	let response = admin
		.oneshot(
			Request::builder()
				.uri("/v1/admin/stats")
				.body(Body::empty())
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call /v1/admin/stats.");

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert_eq!(json["active_sessions"], 1);
	assert_eq!(json["known_users"], 0);
	assert_eq!(json["archived_sessions"], 0);
}
