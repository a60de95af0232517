//! The turn pipeline: a closed step table walked under a recursion guard,
//! with per-step typed updates folded into the session state by explicit
//! reducers. Step failures degrade; only transport-level failures ever
//! surface to the caller.

mod localize;
pub mod merge;
pub mod prompt;
pub mod report;
mod steps;
pub mod update;

use std::sync::Arc;

use color_eyre::Result;

pub use update::StepUpdate;

use haven_config::Config;
use haven_domain::{
	Intent, LangHint, Role, SessionState, StepId, Tripwire, entry_step, fingerprint, transition,
};
use haven_providers::{LlmCapability, SpeechCapability};
use haven_retrieval::{RetrievalService, TurnEmbedCache};

/// Read-only provider handles shared by every session. Injected, never
/// global.
#[derive(Clone)]
pub struct Capabilities {
	pub llm: Arc<dyn LlmCapability>,
	pub speech: Arc<dyn SpeechCapability>,
	pub retrieval: Arc<RetrievalService>,
}

/// One inbound message, text or audio.
#[derive(Clone, Debug, Default)]
pub struct TurnInput {
	pub text: Option<String>,
	pub audio: Option<Vec<u8>>,
	pub sample_rate: u32,
	pub voice_reply: bool,
	pub now: i64,
}

impl TurnInput {
	pub fn text(text: impl Into<String>, now: i64) -> Self {
		Self { text: Some(text.into()), now, ..Self::default() }
	}

	pub fn audio(audio: Vec<u8>, sample_rate: u32, now: i64) -> Self {
		Self {
			audio: Some(audio),
			sample_rate,
			voice_reply: true,
			now,
			..Self::default()
		}
	}
}

#[derive(Clone, Debug)]
pub struct TurnOutcome {
	pub intent: Intent,
	pub confidence: f32,
	pub route_reason: String,
	pub reply: String,
	pub audio: Option<Vec<u8>>,
}

pub struct Engine {
	cfg: Config,
	caps: Capabilities,
	tripwire: Tripwire,
	localizer: localize::Localizer,
}

impl Engine {
	pub fn new(cfg: Config, caps: Capabilities) -> Result<Self> {
		let tripwire = Tripwire::new()?;
		let localizer = localize::Localizer::new()?;

		Ok(Self { cfg, caps, tripwire, localizer })
	}

	pub fn cfg(&self) -> &Config {
		&self.cfg
	}

	/// Runs one full turn against the locked session state. Never fails: every
	/// step has a degradation path and the step budget forces finalization.
	pub async fn run_turn(&self, state: &mut SessionState, input: TurnInput) -> TurnOutcome {
		let now = input.now;

		state.begin_turn(now);

		state.voice_output = input.voice_reply;

		if let Some(text) = input.text.as_deref()
			&& !text.trim().is_empty()
		{
			state.lang = LangHint::detect(text);
			state.push_turn(Role::User, text, now);
			// An unchanged message keeps the analysis flags; a new one
			// invalidates them.
			state.observe_fingerprint(&fingerprint(text.as_bytes()));
		}

		let cache = TurnEmbedCache::new();
		let mut step = entry_step(input.audio.is_some());
		let mut audio_out = None;
		let mut steps_taken: u32 = 0;

		while step != StepId::End {
			steps_taken += 1;

			let (update, requested) = self.run_step(step, state, &input, &cache).await;

			match &update {
				StepUpdate::Transcribe(t) => {
					if !t.text.trim().is_empty() {
						state.lang = LangHint::detect(&t.text);
						state.observe_fingerprint(&fingerprint(t.text.as_bytes()));
					}

					state.push_turn(Role::User, t.text.clone(), now);
				},
				StepUpdate::Synthesize(s) if !s.audio.is_empty() => {
					audio_out = Some(s.audio.clone());
				},
				_ => {},
			}

			merge::apply(state, update, now);

			let next = transition(step, requested, &state.flags());

			step = if steps_taken >= self.cfg.session.max_steps_per_turn
				&& !matches!(next, StepId::Finalize | StepId::Synthesize | StepId::End)
			{
				tracing::warn!(
					session = %state.session_id,
					steps_taken,
					"Step budget exhausted, forcing finalization.",
				);

				StepId::Finalize
			} else {
				next
			};
		}

		let reply = state
			.final_reply
			.clone()
			.unwrap_or_else(|| prompt::fallback_reply(state.lang));

		state.push_turn(Role::Assistant, reply.clone(), now);

		TurnOutcome {
			intent: state.intent,
			confidence: state.confidence,
			route_reason: state.route_reason.clone(),
			reply,
			audio: audio_out,
		}
	}

	async fn run_step(
		&self,
		step: StepId,
		state: &SessionState,
		input: &TurnInput,
		cache: &TurnEmbedCache,
	) -> (StepUpdate, StepId) {
		match step {
			StepId::Transcribe => self.step_transcribe(input).await,
			StepId::Router => self.step_router(state).await,
			StepId::Risk => self.step_risk(state, cache).await,
			StepId::Style => self.step_style(state).await,
			StepId::Draft => self.step_draft(state, cache).await,
			StepId::Review => self.step_review(state, cache).await,
			StepId::Commit => self.step_commit(state).await,
			StepId::Finalize => self.step_finalize(state).await,
			StepId::Synthesize => self.step_synthesize(state).await,
			StepId::End => (StepUpdate::None, StepId::End),
		}
	}
}
