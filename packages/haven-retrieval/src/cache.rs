use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OnceCell};

use crate::{Error, Result};
use haven_config::EmbeddingProviderConfig;
use haven_providers::EmbeddingCapability;

/// Per-turn embedding memo. A turn may query several indices with the same
/// text concurrently; each unique text is embedded exactly once, with
/// concurrent callers parking on the cell rather than issuing duplicates.
#[derive(Default)]
pub struct TurnEmbedCache {
	slots: Mutex<HashMap<blake3::Hash, Arc<OnceCell<Arc<Vec<f32>>>>>>,
}

impl TurnEmbedCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn embed_once(
		&self,
		embedder: &dyn EmbeddingCapability,
		cfg: &EmbeddingProviderConfig,
		text: &str,
	) -> Result<Arc<Vec<f32>>> {
		let key = blake3::hash(text.as_bytes());
		let cell = {
			let mut slots = self.slots.lock().await;

			slots.entry(key).or_default().clone()
		};
		let vector = cell
			.get_or_try_init(|| async {
				let texts = [text.to_owned()];
				let mut vectors = embedder
					.embed(cfg, &texts)
					.await
					.map_err(|err| Error::Embedding { message: err.to_string() })?;

				if vectors.is_empty() {
					return Err(Error::Embedding {
						message: "Provider returned no vectors.".to_owned(),
					});
				}

				Ok(Arc::new(vectors.swap_remove(0)))
			})
			.await?;

		Ok(vector.clone())
	}
}
