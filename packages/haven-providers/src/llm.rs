use std::time::Duration;

use color_eyre::Result;
use reqwest::{Client, StatusCode};
use serde_json::Value;

/// One chat-completion round trip. Quota exhaustion and content-safety blocks
/// resolve to [`LlmReply::neutral`] rather than an error, so callers downstream
/// can always degrade instead of aborting a turn.
#[derive(Clone, Debug, Default)]
pub struct LlmReply {
	pub text: String,
	pub json: Option<Value>,
}

impl LlmReply {
	pub fn neutral() -> Self {
		Self::default()
	}

	pub fn is_neutral(&self) -> bool {
		self.text.is_empty() && self.json.is_none()
	}
}

pub async fn generate(
	cfg: &haven_config::LlmProviderConfig,
	system: &str,
	user: &str,
	temperature: f32,
	structured: bool,
) -> Result<LlmReply> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": temperature,
		"messages": [
			{ "role": "system", "content": system },
			{ "role": "user", "content": user },
		],
	});

	for attempt in 0..=cfg.max_retries {
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await;
		let res = match res {
			Ok(res) => res,
			Err(err) if attempt < cfg.max_retries => {
				tracing::warn!(attempt, "LLM request failed, retrying: {err}");
				tokio::time::sleep(backoff_for_attempt(attempt)).await;

				continue;
			},
			Err(err) => return Err(err.into()),
		};
		let status = res.status();

		if status == StatusCode::TOO_MANY_REQUESTS {
			if attempt < cfg.max_retries {
				tokio::time::sleep(backoff_for_attempt(attempt)).await;

				continue;
			}

			tracing::warn!("LLM quota exhausted, degrading to a neutral reply.");

			return Ok(LlmReply::neutral());
		}
		if status.is_server_error() && attempt < cfg.max_retries {
			tokio::time::sleep(backoff_for_attempt(attempt)).await;

			continue;
		}

		let json: Value = res.error_for_status()?.json().await?;

		return Ok(parse_chat_response(json, structured));
	}

	Ok(LlmReply::neutral())
}

pub(crate) fn backoff_for_attempt(attempt: u32) -> Duration {
	Duration::from_millis(250_u64.saturating_mul(1 << attempt.min(6)))
}

fn parse_chat_response(json: Value, structured: bool) -> LlmReply {
	let choice = json.get("choices").and_then(|v| v.as_array()).and_then(|arr| arr.first());
	let Some(choice) = choice else {
		return LlmReply::neutral();
	};

	if choice.get("finish_reason").and_then(|v| v.as_str()) == Some("content_filter") {
		tracing::warn!("LLM reply blocked by the provider safety layer.");

		return LlmReply::neutral();
	}

	let text = choice
		.get("message")
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.unwrap_or_default()
		.trim()
		.to_owned();
	let json = if structured { first_json_object(&text) } else { None };

	LlmReply { text, json }
}

/// Extracts the first balanced `{..}` object from free-form model output.
/// Models wrap JSON in prose or code fences often enough that a plain
/// `from_str` on the whole content is not reliable.
fn first_json_object(text: &str) -> Option<Value> {
	let start = text.find('{')?;
	let mut depth = 0_u32;
	let mut in_string = false;
	let mut escaped = false;

	for (offset, c) in text[start..].char_indices() {
		if in_string {
			match c {
				'\\' if !escaped => escaped = true,
				'"' if !escaped => in_string = false,
				_ => escaped = false,
			}

			continue;
		}

		match c {
			'"' => in_string = true,
			'{' => depth += 1,
			'}' => {
				depth -= 1;

				if depth == 0 {
					return serde_json::from_str(&text[start..=start + offset]).ok();
				}
			},
			_ => {},
		}
	}

	None
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_plain_chat_content() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": " You are not alone in this. " } }
			]
		});
		let reply = parse_chat_response(json, false);
		assert_eq!(reply.text, "You are not alone in this.");
		assert!(reply.json.is_none());
	}

	#[test]
	fn structured_mode_finds_fenced_json() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "```json\n{\"intent\": \"risk_assessment\", \"confidence\": 0.9}\n```" } }
			]
		});
		let reply = parse_chat_response(json, true);
		let obj = reply.json.expect("expected json");
		assert_eq!(obj["intent"], "risk_assessment");
	}

	#[test]
	fn content_filter_degrades_to_neutral() {
		let json = serde_json::json!({
			"choices": [
				{ "finish_reason": "content_filter", "message": { "content": "" } }
			]
		});
		assert!(parse_chat_response(json, false).is_neutral());
	}

	#[test]
	fn nested_braces_inside_strings_do_not_confuse_the_scanner() {
		let value = first_json_object("prefix {\"a\": \"b } c\", \"n\": {\"x\": 1}} suffix")
			.expect("expected object");
		assert_eq!(value["n"]["x"], 1);
	}

	#[test]
	fn backoff_doubles_per_attempt() {
		assert_eq!(backoff_for_attempt(0), Duration::from_millis(250));
		assert_eq!(backoff_for_attempt(2), Duration::from_millis(1_000));
	}
}
