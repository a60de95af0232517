mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, IndexConfig, LlmProviderConfig, Providers, Retrieval, Service,
	Session, SpeechProviderConfig, Storage,
};

use std::{collections::HashSet, fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.admin_bind must be non-empty.".to_string(),
		});
	}
	if cfg.session.idle_secs == 0 {
		return Err(Error::Validation {
			message: "session.idle_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.session.sweep_interval_secs == 0 {
		return Err(Error::Validation {
			message: "session.sweep_interval_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.session.history_window == 0 {
		return Err(Error::Validation {
			message: "session.history_window must be greater than zero.".to_string(),
		});
	}
	if cfg.session.max_steps_per_turn < 6 {
		return Err(Error::Validation {
			message: "session.max_steps_per_turn must be at least 6.".to_string(),
		});
	}
	if cfg.session.review_max_retries == 0 {
		return Err(Error::Validation {
			message: "session.review_max_retries must be at least 1.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if !cfg.providers.llm.temperature.is_finite() || cfg.providers.llm.temperature < 0.0 {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a non-negative finite number.".to_string(),
		});
	}

	let mut names = HashSet::new();

	for index in &cfg.retrieval.indices {
		if index.name.trim().is_empty() {
			return Err(Error::Validation {
				message: "retrieval.index.name must be non-empty.".to_string(),
			});
		}
		if !names.insert(index.name.as_str()) {
			return Err(Error::Validation {
				message: format!("Retrieval index name {:?} is declared twice.", index.name),
			});
		}
		if !matches!(index.metric.as_str(), "cosine" | "euclidean") {
			return Err(Error::Validation {
				message: format!(
					"retrieval.index.metric for {:?} must be cosine or euclidean.",
					index.name
				),
			});
		}
		if !index.relevance_threshold.is_finite() {
			return Err(Error::Validation {
				message: format!(
					"retrieval.index.relevance_threshold for {:?} must be a finite number.",
					index.name
				),
			});
		}
		if index.default_k == 0 {
			return Err(Error::Validation {
				message: format!(
					"retrieval.index.default_k for {:?} must be greater than zero.",
					index.name
				),
			});
		}
	}

	if cfg.retrieval.short_query_words >= cfg.retrieval.long_query_words {
		return Err(Error::Validation {
			message: "retrieval.short_query_words must be less than retrieval.long_query_words."
				.to_string(),
		});
	}
	if cfg.retrieval.snippet_max_chars == 0 {
		return Err(Error::Validation {
			message: "retrieval.snippet_max_chars must be greater than zero.".to_string(),
		});
	}

	for (label, key) in [
		("llm", &cfg.providers.llm.api_key),
		("embedding", &cfg.providers.embedding.api_key),
		("speech", &cfg.providers.speech.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.storage
		.user_memory_path
		.as_deref()
		.map(|path| path.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.storage.user_memory_path = None;
	}
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
