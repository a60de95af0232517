use std::sync::Arc;

use haven_config::Config;
use haven_engine::{Capabilities, Engine};
use haven_providers::Providers;
use haven_retrieval::RetrievalService;
use haven_session::SessionManager;

#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<Engine>,
	pub sessions: Arc<SessionManager>,
}
impl AppState {
	pub fn new(config: Config) -> color_eyre::Result<Self> {
		Self::with_providers(config, Providers::default())
	}

	/// Builds the state with explicit provider handles; tests pass fakes.
	pub fn with_providers(config: Config, providers: Providers) -> color_eyre::Result<Self> {
		let retrieval = Arc::new(RetrievalService::new(&config, providers.embedding.clone()));
		let sessions = Arc::new(SessionManager::new(&config)?);
		let caps =
			Capabilities { llm: providers.llm, speech: providers.speech, retrieval };
		let engine = Arc::new(Engine::new(config, caps)?);

		Ok(Self { engine, sessions })
	}
}

pub fn unix_now() -> i64 {
	time::OffsetDateTime::now_utc().unix_timestamp()
}
