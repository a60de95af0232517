//! Session lifecycle: per-session isolation, transparent idle-expiry
//! reseeding, archival into durable user memory, and the background idle
//! sweep.

mod error;
pub mod memory;

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

pub use error::{Error, Result};
pub use memory::{MemoryStore, SessionArchive, UserMemory};

use haven_config::Config;
use haven_domain::{RetryPolicy, SessionState};
use haven_engine::report;

/// Pointer to an archived session report inside user memory.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ArtifactRef {
	pub user_id: String,
	pub session_id: Uuid,
	pub archive_index: usize,
}

impl ArtifactRef {
	pub fn uri(&self) -> String {
		format!("memory://{}/archives/{}", self.user_id, self.archive_index)
	}
}

#[derive(Clone, Copy, Debug, serde::Serialize)]
pub struct Stats {
	pub active_sessions: usize,
	pub known_users: usize,
	pub archived_sessions: usize,
}

/// Active sessions plus the durable memory behind them. Each session lives
/// behind its own mutex, so a turn holds exactly one logical thread of
/// control without blocking other sessions.
pub struct SessionManager {
	sessions: RwLock<HashMap<Uuid, Arc<Mutex<SessionState>>>>,
	memory: MemoryStore,
	idle_secs: u64,
	history_window: usize,
	retry_policy: RetryPolicy,
}

impl SessionManager {
	pub fn new(cfg: &Config) -> Result<Self> {
		let memory = MemoryStore::open(cfg.storage.user_memory_path.as_deref())?;

		Ok(Self {
			sessions: RwLock::new(HashMap::new()),
			memory,
			idle_secs: cfg.session.idle_secs,
			history_window: cfg.session.history_window,
			retry_policy: RetryPolicy::new(cfg.session.review_max_retries),
		})
	}

	pub fn memory(&self) -> &MemoryStore {
		&self.memory
	}

	/// Finds the caller's session, or transparently replaces it. An unknown or
	/// idle-expired id is not an error: the stale session (if any) is archived
	/// and a fresh one is seeded from the user's durable memory under a new
	/// server-assigned id.
	pub async fn resolve(
		&self,
		session_id: Option<Uuid>,
		user_id: &str,
		now: i64,
	) -> (Uuid, Arc<Mutex<SessionState>>) {
		if let Some(id) = session_id {
			let existing = self.sessions.read().await.get(&id).cloned();

			if let Some(handle) = existing {
				let (owned, idle) = {
					let state = handle.lock().await;

					(state.user_id == user_id, state.is_idle(now, self.idle_secs))
				};

				// A foreign id never resumes someone else's session; the
				// caller just gets a fresh one of their own.
				if owned {
					if !idle {
						return (id, handle);
					}

					tracing::info!(session = %id, "Session expired, reseeding from user memory.");
					self.archive_and_remove(id, now).await;
				}
			}
		}

		let id = Uuid::new_v4();
		let mut state = SessionState::new(id, user_id, self.retry_policy, now);
		let memory = self.memory.get(user_id).await;

		state.notes = memory.notes;
		state.history = memory.history;

		let handle = Arc::new(Mutex::new(state));

		self.sessions.write().await.insert(id, handle.clone());

		(id, handle)
	}

	/// Explicit session end. Returns `None` for an unknown id; expiry is
	/// transparent everywhere else, but an explicit end of nothing is a
	/// caller error worth surfacing.
	pub async fn end(&self, session_id: Uuid, now: i64) -> Option<ArtifactRef> {
		let handle = self.sessions.write().await.remove(&session_id)?;
		let state = handle.lock().await;
		let rendered = report::render(&state);

		if let Err(err) = self.memory.archive(&state, rendered, self.history_window, now).await {
			tracing::error!(session = %session_id, "Failed to persist session archive: {err}");
		}

		let archive_index = self.memory.get(&state.user_id).await.archives.len().saturating_sub(1);

		Some(ArtifactRef { user_id: state.user_id.clone(), session_id, archive_index })
	}

	/// Archives every session idle beyond the configured horizon. Runs from a
	/// background task. A session whose mutex is held is mid-turn and by
	/// definition not idle, so the sweep never waits on one; blocking here
	/// would stall the map lock and with it every unrelated caller.
	pub async fn sweep_idle(&self, now: i64) -> usize {
		let idle_ids: Vec<Uuid> = {
			let sessions = self.sessions.read().await;

			sessions
				.iter()
				.filter_map(|(id, handle)| {
					let state = handle.try_lock().ok()?;

					state.is_idle(now, self.idle_secs).then_some(*id)
				})
				.collect()
		};
		let mut swept = 0;

		for id in idle_ids {
			if self.archive_and_remove(id, now).await {
				swept += 1;
			}
		}

		if swept > 0 {
			tracing::info!(swept, "Idle sweep archived sessions.");
		}

		swept
	}

	pub async fn stats(&self) -> Stats {
		Stats {
			active_sessions: self.sessions.read().await.len(),
			known_users: self.memory.known_users().await,
			archived_sessions: self.memory.archived_sessions().await,
		}
	}

	async fn archive_and_remove(&self, session_id: Uuid, now: i64) -> bool {
		let Some(handle) = self.sessions.write().await.remove(&session_id) else {
			return false;
		};
		let state = handle.lock().await;
		let rendered = report::render(&state);

		if let Err(err) = self.memory.archive(&state, rendered, self.history_window, now).await {
			tracing::error!(session = %session_id, "Failed to persist session archive: {err}");
		}

		true
	}
}
