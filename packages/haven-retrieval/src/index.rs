use std::fs;

use serde::Deserialize;

use crate::{Error, Result};
use haven_config::IndexConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
	Cosine,
	Euclidean,
}

impl Metric {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"cosine" => Some(Self::Cosine),
			"euclidean" => Some(Self::Euclidean),
			_ => None,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
struct IndexFile {
	dim: usize,
	entries: Vec<IndexEntry>,
}

#[derive(Clone, Debug, Deserialize)]
struct IndexEntry {
	tag: String,
	text: String,
	vector: Vec<f32>,
}

#[derive(Clone, Debug)]
pub struct SnippetMeta {
	pub tag: String,
	pub text: String,
}

/// One scored snippet. `score` is relevance, higher is better; euclidean
/// distances are negated so merged result sets sort uniformly.
#[derive(Clone, Debug)]
pub struct Hit {
	pub index: String,
	pub tag: String,
	pub text: String,
	pub score: f32,
}

/// An immutable in-process vector index. Loaded once from its JSON data file;
/// never mutated afterwards, so concurrent searches share it without locking.
#[derive(Debug)]
pub struct SemanticIndex {
	name: String,
	dim: usize,
	metric: Metric,
	relevance_threshold: f32,
	default_k: usize,
	vectors: Vec<Vec<f32>>,
	meta: Vec<SnippetMeta>,
}

impl SemanticIndex {
	pub fn load(cfg: &IndexConfig) -> Result<Self> {
		let raw = fs::read_to_string(&cfg.data_path)
			.map_err(|source| Error::ReadIndex { path: cfg.data_path.clone(), source })?;
		let file: IndexFile = serde_json::from_str(&raw)
			.map_err(|source| Error::ParseIndex { path: cfg.data_path.clone(), source })?;
		// Validated by config loading.
		let metric = Metric::parse(&cfg.metric).unwrap_or(Metric::Cosine);
		let mut vectors = Vec::with_capacity(file.entries.len());
		let mut meta = Vec::with_capacity(file.entries.len());

		for (entry, item) in file.entries.into_iter().enumerate() {
			if item.vector.len() != file.dim {
				return Err(Error::DimensionMismatch {
					path: cfg.data_path.clone(),
					entry,
					got: item.vector.len(),
					expected: file.dim,
				});
			}

			let mut vector = item.vector;

			if metric == Metric::Cosine {
				normalize(&mut vector);
			}

			vectors.push(vector);
			meta.push(SnippetMeta { tag: item.tag, text: item.text });
		}

		Ok(Self {
			name: cfg.name.clone(),
			dim: file.dim,
			metric,
			relevance_threshold: cfg.relevance_threshold,
			default_k: cfg.default_k,
			vectors,
			meta,
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn dim(&self) -> usize {
		self.dim
	}

	pub fn default_k(&self) -> usize {
		self.default_k
	}

	pub fn len(&self) -> usize {
		self.vectors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.vectors.is_empty()
	}

	/// Scores every entry, drops those outside the relevance threshold, then
	/// returns the best `k`. The threshold applies before truncation, so a
	/// small `k` never resurrects irrelevant material.
	pub fn search(&self, query: &[f32], k: usize) -> Vec<Hit> {
		if query.len() != self.dim || k == 0 {
			return Vec::new();
		}

		let query = match self.metric {
			Metric::Cosine => {
				let mut q = query.to_vec();

				normalize(&mut q);

				q
			},
			Metric::Euclidean => query.to_vec(),
		};
		let mut hits: Vec<Hit> = self
			.vectors
			.iter()
			.zip(&self.meta)
			.filter_map(|(vector, meta)| {
				let score = match self.metric {
					Metric::Cosine => {
						let score = dot(&query, vector);

						(score >= self.relevance_threshold).then_some(score)
					},
					Metric::Euclidean => {
						let distance = euclidean(&query, vector);

						(distance <= self.relevance_threshold).then_some(-distance)
					},
				};

				score.map(|score| Hit {
					index: self.name.clone(),
					tag: meta.tag.clone(),
					text: meta.text.clone(),
					score,
				})
			})
			.collect();

		hits.sort_by(|a, b| b.score.total_cmp(&a.score));
		hits.truncate(k);

		hits
	}
}

fn normalize(vector: &mut [f32]) {
	let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();

	if norm > f32::EPSILON {
		for v in vector.iter_mut() {
			*v /= norm;
		}
	}
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn index_with(entries: &[(&str, &str, Vec<f32>)], metric: Metric, threshold: f32) -> SemanticIndex {
		let mut vectors = Vec::new();
		let mut meta = Vec::new();

		for (tag, text, vector) in entries {
			let mut vector = vector.clone();

			if metric == Metric::Cosine {
				normalize(&mut vector);
			}

			vectors.push(vector);
			meta.push(SnippetMeta { tag: (*tag).to_owned(), text: (*text).to_owned() });
		}

		SemanticIndex {
			name: "t".to_owned(),
			dim: 2,
			metric,
			relevance_threshold: threshold,
			default_k: 5,
			vectors,
			meta,
		}
	}

	#[test]
	fn threshold_applies_before_truncation() {
		let index = index_with(
			&[
				("a", "close", vec![1., 0.]),
				("b", "far", vec![0., 1.]),
				("c", "middling", vec![0.8, 0.2]),
			],
			Metric::Cosine,
			0.9,
		);
		let hits = index.search(&[1., 0.], 3);

		assert_eq!(hits.len(), 2);
		assert_eq!(hits[0].tag, "a");
	}

	#[test]
	fn euclidean_threshold_is_a_maximum_distance() {
		let index = index_with(
			&[("a", "near", vec![0.1, 0.]), ("b", "far", vec![5., 5.])],
			Metric::Euclidean,
			1.0,
		);
		let hits = index.search(&[0., 0.], 5);

		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].tag, "a");
	}

	#[test]
	fn mismatched_query_dimension_returns_nothing() {
		let index = index_with(&[("a", "x", vec![1., 0.])], Metric::Cosine, 0.);

		assert!(index.search(&[1., 0., 0.], 5).is_empty());
	}
}
