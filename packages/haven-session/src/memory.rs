use std::{collections::HashMap, fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{Error, Result};
use haven_domain::{CaseNotes, SessionState, Turn, history_window};

/// Durable per-user memory. Survives session expiry; new sessions for the
/// same user are seeded from it.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct UserMemory {
	pub notes: CaseNotes,
	pub history: Vec<Turn>,
	pub archives: Vec<SessionArchive>,
}

/// One finished session's report, appended on archive and never rewritten.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SessionArchive {
	pub session_id: Uuid,
	pub ended_at: i64,
	pub report: String,
}

/// User memory map with optional JSON file persistence: loaded once at
/// startup, written through on every archive.
pub struct MemoryStore {
	users: RwLock<HashMap<String, UserMemory>>,
	path: Option<PathBuf>,
}

impl MemoryStore {
	pub fn open(path: Option<&str>) -> Result<Self> {
		let path = path.map(PathBuf::from);
		let users = match &path {
			Some(path) if path.exists() => {
				let raw = fs::read_to_string(path).map_err(|source| Error::ReadMemory {
					path: path.display().to_string(),
					source,
				})?;

				serde_json::from_str(&raw).map_err(|source| Error::ParseMemory {
					path: path.display().to_string(),
					source,
				})?
			},
			_ => HashMap::new(),
		};

		Ok(Self { users: RwLock::new(users), path })
	}

	pub async fn get(&self, user_id: &str) -> UserMemory {
		self.users.read().await.get(user_id).cloned().unwrap_or_default()
	}

	/// Folds a finished session into the user's memory: the session's notes are
	/// merged into the stored ones (two sessions for the same user may close in
	/// any order, so neither may overwrite the other's entries), the history
	/// keeps only the trailing window, and the report is appended to the
	/// archive log.
	pub async fn archive(
		&self,
		state: &SessionState,
		report: String,
		window: usize,
		now: i64,
	) -> Result<()> {
		{
			let mut users = self.users.write().await;
			let memory = users.entry(state.user_id.clone()).or_default();

			memory.notes.merge(&state.notes.categories);

			for event in &state.notes.timeline {
				if !memory.notes.timeline.contains(event) {
					memory.notes.timeline.push(event.clone());
				}
			}

			memory.history = history_window(&state.history, window).to_vec();
			memory.archives.push(SessionArchive {
				session_id: state.session_id,
				ended_at: now,
				report,
			});
		}

		self.persist().await
	}

	pub async fn known_users(&self) -> usize {
		self.users.read().await.len()
	}

	pub async fn archived_sessions(&self) -> usize {
		self.users.read().await.values().map(|m| m.archives.len()).sum()
	}

	async fn persist(&self) -> Result<()> {
		let Some(path) = &self.path else {
			return Ok(());
		};
		let users = self.users.read().await;
		let raw = serde_json::to_string_pretty(&*users).map_err(|source| Error::ParseMemory {
			path: path.display().to_string(),
			source,
		})?;

		fs::write(path, raw).map_err(|source| Error::WriteMemory {
			path: path.display().to_string(),
			source,
		})
	}
}
