pub mod embedding;
pub mod llm;
pub mod speech;

use std::{pin::Pin, sync::Arc};

use color_eyre::{Result, eyre};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde_json::{Map, Value};

use haven_config::{EmbeddingProviderConfig, LlmProviderConfig, SpeechProviderConfig};
pub use llm::LlmReply;
pub use speech::Transcript;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();
	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(eyre::eyre!("Default header values must be strings."));
		};
		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}
	Ok(headers)
}

pub trait LlmCapability
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system: &'a str,
		user: &'a str,
		temperature: f32,
		structured: bool,
	) -> BoxFuture<'a, Result<LlmReply>>;
}

pub trait EmbeddingCapability
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait SpeechCapability
where
	Self: Send + Sync,
{
	fn transcribe<'a>(
		&'a self,
		cfg: &'a SpeechProviderConfig,
		audio: &'a [u8],
		sample_rate: u32,
	) -> BoxFuture<'a, Result<Transcript>>;

	fn synthesize<'a>(
		&'a self,
		cfg: &'a SpeechProviderConfig,
		text: &'a str,
		lang: &'a str,
	) -> BoxFuture<'a, Result<Vec<u8>>>;
}

pub struct HttpLlm;
pub struct HttpEmbedding;
pub struct HttpSpeech;

impl LlmCapability for HttpLlm {
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system: &'a str,
		user: &'a str,
		temperature: f32,
		structured: bool,
	) -> BoxFuture<'a, Result<LlmReply>> {
		Box::pin(llm::generate(cfg, system, user, temperature, structured))
	}
}

impl EmbeddingCapability for HttpEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl SpeechCapability for HttpSpeech {
	fn transcribe<'a>(
		&'a self,
		cfg: &'a SpeechProviderConfig,
		audio: &'a [u8],
		sample_rate: u32,
	) -> BoxFuture<'a, Result<Transcript>> {
		Box::pin(speech::transcribe(cfg, audio, sample_rate))
	}

	fn synthesize<'a>(
		&'a self,
		cfg: &'a SpeechProviderConfig,
		text: &'a str,
		lang: &'a str,
	) -> BoxFuture<'a, Result<Vec<u8>>> {
		Box::pin(speech::synthesize(cfg, text, lang))
	}
}

/// Bundle of provider handles shared across sessions. [`Default`] wires the
/// HTTP implementations; tests substitute fakes.
#[derive(Clone)]
pub struct Providers {
	pub llm: Arc<dyn LlmCapability>,
	pub embedding: Arc<dyn EmbeddingCapability>,
	pub speech: Arc<dyn SpeechCapability>,
}

impl Providers {
	pub fn new(
		llm: Arc<dyn LlmCapability>,
		embedding: Arc<dyn EmbeddingCapability>,
		speech: Arc<dyn SpeechCapability>,
	) -> Self {
		Self { llm, embedding, speech }
	}
}

impl Default for Providers {
	fn default() -> Self {
		Self { llm: Arc::new(HttpLlm), embedding: Arc::new(HttpEmbedding), speech: Arc::new(HttpSpeech) }
	}
}
