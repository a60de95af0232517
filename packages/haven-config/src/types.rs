use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub session: Session,
	pub providers: Providers,
	pub retrieval: Retrieval,
	pub storage: Storage,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Session {
	pub idle_secs: u64,
	pub sweep_interval_secs: u64,
	pub history_window: usize,
	pub max_steps_per_turn: u32,
	pub review_max_retries: u8,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub llm: LlmProviderConfig,
	pub embedding: EmbeddingProviderConfig,
	pub speech: SpeechProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	pub max_retries: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SpeechProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub transcribe_path: String,
	pub synthesize_path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Retrieval {
	#[serde(default = "default_short_query_words")]
	pub short_query_words: usize,
	#[serde(default = "default_long_query_words")]
	pub long_query_words: usize,
	#[serde(default = "default_snippet_max_chars")]
	pub snippet_max_chars: usize,
	#[serde(default = "default_snippet_prefix_window")]
	pub snippet_prefix_window: usize,
	#[serde(default, rename = "index")]
	pub indices: Vec<IndexConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IndexConfig {
	pub name: String,
	pub data_path: String,
	pub metric: String,
	pub relevance_threshold: f32,
	pub default_k: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	#[serde(default)]
	pub user_memory_path: Option<String>,
}

fn default_short_query_words() -> usize {
	6
}

fn default_long_query_words() -> usize {
	40
}

fn default_snippet_max_chars() -> usize {
	2_000
}

fn default_snippet_prefix_window() -> usize {
	40
}
