pub mod cache;
pub mod error;
pub mod index;

use std::{collections::HashMap, sync::Arc};

use tokio::task::JoinSet;
use unicode_segmentation::UnicodeSegmentation;

pub use cache::TurnEmbedCache;
pub use error::{Error, Result};
pub use index::{Hit, Metric, SemanticIndex, SnippetMeta};

use haven_config::{Config, EmbeddingProviderConfig, Retrieval};
use haven_domain::RiskBand;
use haven_providers::EmbeddingCapability;

/// Read-only handle over the configured indices plus the embedding provider.
/// Built once at startup and shared across sessions.
pub struct RetrievalService {
	indices: HashMap<String, Arc<SemanticIndex>>,
	embedder: Arc<dyn EmbeddingCapability>,
	embedding_cfg: EmbeddingProviderConfig,
	cfg: Retrieval,
}

impl RetrievalService {
	/// Loads every configured index. An index whose data file fails to load is
	/// left out, degrading its queries to empty results while the others keep
	/// working.
	pub fn new(cfg: &Config, embedder: Arc<dyn EmbeddingCapability>) -> Self {
		let mut indices = HashMap::new();

		for index_cfg in &cfg.retrieval.indices {
			match SemanticIndex::load(index_cfg) {
				Ok(index) => {
					tracing::info!(name = %index_cfg.name, entries = index.len(), "Loaded semantic index.");
					indices.insert(index_cfg.name.clone(), Arc::new(index));
				},
				Err(err) => {
					tracing::warn!(name = %index_cfg.name, "Semantic index unavailable, its queries degrade to empty: {err}");
				},
			}
		}

		Self {
			indices,
			embedder,
			embedding_cfg: cfg.providers.embedding.clone(),
			cfg: cfg.retrieval.clone(),
		}
	}

	pub fn default_k(&self, index_name: &str) -> usize {
		self.indices.get(index_name).map(|i| i.default_k()).unwrap_or(5)
	}

	pub fn index_names(&self) -> Vec<String> {
		self.indices.keys().cloned().collect()
	}

	/// Widest configured per-index take; the starting point for `dynamic_k`.
	pub fn base_k(&self) -> usize {
		self.indices.values().map(|i| i.default_k()).max().unwrap_or(5)
	}

	/// Embeds the query once via the per-turn cache, then fans out one search
	/// task per named index and merges the results by relevance. Unknown index
	/// names are skipped with a warning.
	pub async fn search_combined(
		&self,
		cache: &TurnEmbedCache,
		query: &str,
		index_names: &[String],
		k_per_index: usize,
	) -> Result<Vec<Hit>> {
		if query.trim().is_empty() || k_per_index == 0 {
			return Ok(Vec::new());
		}

		let query_vec = cache.embed_once(self.embedder.as_ref(), &self.embedding_cfg, query).await?;
		let mut tasks = JoinSet::new();

		for name in index_names {
			let Some(index) = self.indices.get(name) else {
				tracing::warn!(name = %name, "Unknown index name in search, skipping.");

				continue;
			};
			let index = index.clone();
			let query_vec = query_vec.clone();

			tasks.spawn(async move { index.search(&query_vec, k_per_index) });
		}

		let mut merged = Vec::new();

		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok(hits) => merged.extend(hits),
				Err(err) => tracing::warn!("Index search task failed: {err}"),
			}
		}

		merged.sort_by(|a, b| b.score.total_cmp(&a.score));

		Ok(merged)
	}

	/// Widens or narrows `base_k` from message length and assessed severity.
	/// Long messages and elevated risk double the take; short low-risk
	/// messages halve it, never below one.
	pub fn dynamic_k(&self, text: &str, band: RiskBand, base_k: usize) -> usize {
		let words = text.unicode_words().count();
		let elevated = matches!(band, RiskBand::Critical | RiskBand::Medium);

		if words >= self.cfg.long_query_words || elevated {
			base_k * 2
		} else if words < self.cfg.short_query_words {
			(base_k / 2).max(1)
		} else {
			base_k
		}
	}

	/// Drops near-duplicate snippets and enforces the prompt character budget.
	/// Two snippets whose normalized prefixes coincide within the configured
	/// window count as duplicates.
	pub fn deduplicate_snippets(&self, hits: &[Hit]) -> Vec<String> {
		deduplicate_snippets(hits, self.cfg.snippet_max_chars, self.cfg.snippet_prefix_window)
	}
}

pub fn deduplicate_snippets(hits: &[Hit], max_chars: usize, prefix_window: usize) -> Vec<String> {
	let mut kept: Vec<String> = Vec::new();
	let mut prefixes: Vec<String> = Vec::new();
	let mut budget = max_chars;

	for hit in hits {
		let text = hit.text.trim();

		if text.is_empty() {
			continue;
		}

		let prefix = normalized_prefix(text, prefix_window);

		if prefixes.iter().any(|p| *p == prefix) {
			continue;
		}
		if text.chars().count() > budget {
			break;
		}

		budget -= text.chars().count();
		prefixes.push(prefix);
		kept.push(text.to_owned());
	}

	kept
}

fn normalized_prefix(text: &str, window: usize) -> String {
	text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ").chars().take(window).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn hit(text: &str) -> Hit {
		Hit { index: "t".to_owned(), tag: "tag".to_owned(), text: text.to_owned(), score: 1. }
	}

	#[test]
	fn near_duplicate_prefixes_collapse() {
		let hits = [
			hit("Safety planning starts with an exit bag."),
			hit("SAFETY   planning starts with an exit bag, ideally packed early."),
			hit("Document every incident with dates."),
		];
		let kept = deduplicate_snippets(&hits, 500, 30);

		assert_eq!(kept.len(), 2);
	}

	#[test]
	fn character_budget_bounds_output() {
		let hits = [hit("aaaa aaaa"), hit("bbbb bbbb"), hit("cccc cccc")];
		let kept = deduplicate_snippets(&hits, 20, 40);

		assert_eq!(kept.len(), 2);
	}

	#[test]
	fn blank_snippets_are_ignored() {
		let hits = [hit("   "), hit("real content")];

		assert_eq!(deduplicate_snippets(&hits, 100, 40), vec!["real content".to_owned()]);
	}
}
