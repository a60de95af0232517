//! Deterministic provider fakes for exercising the turn pipeline without a
//! network.

use std::sync::{
	Mutex,
	atomic::{AtomicUsize, Ordering},
};

use color_eyre::Result;

use haven_config::{EmbeddingProviderConfig, LlmProviderConfig, SpeechProviderConfig};
use haven_providers::{
	BoxFuture, EmbeddingCapability, LlmCapability, LlmReply, SpeechCapability, Transcript,
};

/// Replays a queue of scripted replies in order; once the script runs dry
/// every further call yields a neutral reply, mirroring a degraded provider.
/// Prompts are logged for assertions.
#[derive(Default)]
pub struct ScriptedLlm {
	script: Mutex<Vec<LlmReply>>,
	calls: Mutex<Vec<String>>,
}

impl ScriptedLlm {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push_text(&self, text: &str) {
		self.script
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.push(LlmReply { text: text.to_owned(), json: None });
	}

	pub fn push_json(&self, value: serde_json::Value) {
		self.script
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.push(LlmReply { text: value.to_string(), json: Some(value) });
	}

	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn call_count(&self) -> usize {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).len()
	}
}

impl LlmCapability for ScriptedLlm {
	fn generate<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		system: &'a str,
		user: &'a str,
		_temperature: f32,
		_structured: bool,
	) -> BoxFuture<'a, Result<LlmReply>> {
		Box::pin(async move {
			self.calls
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.push(format!("{system}\n---\n{user}"));

			let mut script = self.script.lock().unwrap_or_else(|err| err.into_inner());

			if script.is_empty() { Ok(LlmReply::neutral()) } else { Ok(script.remove(0)) }
		})
	}
}

/// Derives a stable unit vector from each text's hash and counts provider
/// calls, so tests can assert how many embeddings a turn actually required.
#[derive(Default)]
pub struct CountingEmbedder {
	calls: AtomicUsize,
}

impl CountingEmbedder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn call_count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn vector_for(text: &str, dimensions: usize) -> Vec<f32> {
		let hash = blake3::hash(text.as_bytes());
		let bytes = hash.as_bytes();
		let mut vector: Vec<f32> =
			(0..dimensions).map(|i| f32::from(bytes[i % bytes.len()]) - 128.).collect();
		let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();

		if norm > f32::EPSILON {
			for v in &mut vector {
				*v /= norm;
			}
		}

		vector
	}
}

impl EmbeddingCapability for CountingEmbedder {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Ok(texts
				.iter()
				.map(|text| Self::vector_for(text, cfg.dimensions as usize))
				.collect())
		})
	}
}

/// Transcribes every clip to a fixed phrase and synthesizes silence.
#[derive(Default)]
pub struct SilentSpeech {
	pub transcript: Mutex<String>,
}

impl SilentSpeech {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_transcript(text: &str) -> Self {
		Self { transcript: Mutex::new(text.to_owned()) }
	}
}

impl SpeechCapability for SilentSpeech {
	fn transcribe<'a>(
		&'a self,
		_cfg: &'a SpeechProviderConfig,
		_audio: &'a [u8],
		_sample_rate: u32,
	) -> BoxFuture<'a, Result<Transcript>> {
		Box::pin(async move {
			let text = self.transcript.lock().unwrap_or_else(|err| err.into_inner()).clone();

			Ok(Transcript { text, confidence: 1. })
		})
	}

	fn synthesize<'a>(
		&'a self,
		_cfg: &'a SpeechProviderConfig,
		_text: &'a str,
		_lang: &'a str,
	) -> BoxFuture<'a, Result<Vec<u8>>> {
		Box::pin(async move { Ok(Vec::new()) })
	}
}

/// Minimal provider configs for tests that never hit the network.
pub fn dummy_llm_config() -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "test".to_owned(),
		api_base: "http://localhost".to_owned(),
		api_key: "key".to_owned(),
		path: "/v1/chat/completions".to_owned(),
		model: "test-model".to_owned(),
		temperature: 0.,
		timeout_ms: 1_000,
		max_retries: 0,
		default_headers: serde_json::Map::new(),
	}
}

pub fn dummy_embedding_config(dimensions: u32) -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "test".to_owned(),
		api_base: "http://localhost".to_owned(),
		api_key: "key".to_owned(),
		path: "/v1/embeddings".to_owned(),
		model: "test-embed".to_owned(),
		dimensions,
		timeout_ms: 1_000,
		default_headers: serde_json::Map::new(),
	}
}

pub fn dummy_speech_config() -> SpeechProviderConfig {
	SpeechProviderConfig {
		provider_id: "test".to_owned(),
		api_base: "http://localhost".to_owned(),
		api_key: "key".to_owned(),
		transcribe_path: "/v1/transcribe".to_owned(),
		synthesize_path: "/v1/synthesize".to_owned(),
		timeout_ms: 1_000,
		default_headers: serde_json::Map::new(),
	}
}
