use std::time::Duration;

use color_eyre::Result;
use reqwest::Client;
use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Transcript {
	pub text: String,
	#[serde(default)]
	pub confidence: f32,
}

/// Speech is a convenience surface, not part of the safety path. Either
/// direction failing yields an empty result so the turn keeps moving on text.
pub async fn transcribe(
	cfg: &haven_config::SpeechProviderConfig,
	audio: &[u8],
	sample_rate: u32,
) -> Result<Transcript> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.transcribe_path);
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.query(&[("sample_rate", sample_rate)])
		.header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
		.body(audio.to_vec())
		.send()
		.await;

	match res {
		Ok(res) if res.status().is_success() => Ok(res.json().await.unwrap_or_default()),
		Ok(res) => {
			tracing::warn!(status = %res.status(), "Transcription failed, continuing with empty text.");

			Ok(Transcript::default())
		},
		Err(err) => {
			tracing::warn!("Transcription request failed, continuing with empty text: {err}");

			Ok(Transcript::default())
		},
	}
}

pub async fn synthesize(
	cfg: &haven_config::SpeechProviderConfig,
	text: &str,
	lang: &str,
) -> Result<Vec<u8>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.synthesize_path);
	let body = serde_json::json!({ "text": text, "lang": lang });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await;

	match res {
		Ok(res) if res.status().is_success() =>
			Ok(res.bytes().await.map(|b| b.to_vec()).unwrap_or_default()),
		Ok(res) => {
			tracing::warn!(status = %res.status(), "Synthesis failed, reply stays text-only.");

			Ok(Vec::new())
		},
		Err(err) => {
			tracing::warn!("Synthesis request failed, reply stays text-only: {err}");

			Ok(Vec::new())
		},
	}
}
