//! The pipeline steps. Every step degrades on failure instead of erroring:
//! analysis steps fall through to drafting, review approves as-is, drafting
//! falls back to a canned supportive reply. A turn always produces an answer.

use serde_json::Value;

use crate::{
	Engine, TurnInput,
	prompt,
	update::{
		CommitUpdate, DraftUpdate, FinalizeUpdate, ReviewUpdate, RiskUpdate, RouterUpdate,
		StepUpdate, StyleUpdate, SynthesizeUpdate, TranscribeUpdate,
	},
};
use haven_domain::{
	CaseNotesPatch, Intent, NoteCategory, RiskBand, StepId, StyleLabel, StyleState, last_user_text,
	tripwire::TRIPWIRE_CONFIDENCE,
};
use haven_retrieval::TurnEmbedCache;

/// Fallback confidence for an empty message, routed without any model call.
const EMPTY_INPUT_CONFIDENCE: f32 = 0.50;
/// Fallback confidence when classification itself is degraded.
const DEGRADED_CONFIDENCE: f32 = 0.55;
/// Ceiling applied when the classifier picks a route the loop guard bans.
const BANNED_ROUTE_CEILING: f32 = 0.60;
/// Take used for the reviewer's targeted fact lookup.
const REVIEW_LOOKUP_K: usize = 8;

impl Engine {
	pub(crate) async fn step_transcribe(&self, input: &TurnInput) -> (StepUpdate, StepId) {
		let audio = input.audio.as_deref().unwrap_or_default();
		let text = match self
			.caps
			.speech
			.transcribe(&self.cfg.providers.speech, audio, input.sample_rate)
			.await
		{
			Ok(transcript) => transcript.text,
			Err(err) => {
				tracing::warn!("Transcription degraded to empty text: {err}");

				String::new()
			},
		};

		(StepUpdate::Transcribe(TranscribeUpdate { text }), StepId::Router)
	}

	pub(crate) async fn step_router(
		&self,
		state: &haven_domain::SessionState,
	) -> (StepUpdate, StepId) {
		let text = last_user_text(&state.history).unwrap_or_default().to_owned();

		if text.trim().is_empty() {
			let update = RouterUpdate {
				intent: Intent::Support,
				confidence: EMPTY_INPUT_CONFIDENCE,
				route_reason: "empty_input".to_owned(),
				tripwire: false,
			};

			return (StepUpdate::Router(update), StepId::Draft);
		}
		if self.tripwire.fires(&text) {
			let update = RouterUpdate {
				intent: Intent::Risk,
				confidence: TRIPWIRE_CONFIDENCE,
				route_reason: "tripwire".to_owned(),
				tripwire: true,
			};

			return (StepUpdate::Router(update), StepId::Risk);
		}

		let user = format!(
			"{}\nLatest message: {text}",
			prompt::analysis_context(state, self.cfg.session.history_window),
		);
		let reply = self
			.caps
			.llm
			.generate(&self.cfg.providers.llm, prompt::ROUTER_SYSTEM, &user, 0., true)
			.await;
		let parsed = match reply {
			Ok(reply) if !reply.is_neutral() => reply.json,
			Ok(_) => None,
			Err(err) => {
				tracing::warn!("Router classification failed: {err}");

				None
			},
		};
		let Some(parsed) = parsed else {
			let update = RouterUpdate {
				intent: Intent::Support,
				confidence: DEGRADED_CONFIDENCE,
				route_reason: "llm_failure".to_owned(),
				tripwire: false,
			};

			return (StepUpdate::Router(update), StepId::Draft);
		};
		let intent = parsed
			.get("intent")
			.and_then(Value::as_str)
			.and_then(Intent::parse);
		let Some(mut intent) = intent else {
			let update = RouterUpdate {
				intent: Intent::Support,
				confidence: DEGRADED_CONFIDENCE,
				route_reason: "unparseable_intent".to_owned(),
				tripwire: false,
			};

			return (StepUpdate::Router(update), StepId::Draft);
		};
		let mut confidence =
			parsed.get("confidence").and_then(Value::as_f64).unwrap_or(0.5) as f32;
		let mut route_reason = parsed
			.get("reason")
			.and_then(Value::as_str)
			.unwrap_or("classified")
			.to_owned();
		confidence = confidence.clamp(0., 1.);

		let banned = (intent == Intent::Risk && state.risk_seen)
			|| (intent == Intent::Style && state.style_seen);

		if banned {
			route_reason = format!("banned_route:{}", intent.as_str());
			intent = Intent::Support;
			confidence = confidence.min(BANNED_ROUTE_CEILING);
		}

		let requested = match intent {
			Intent::Risk => StepId::Risk,
			Intent::Style => StepId::Style,
			Intent::Support => StepId::Draft,
		};
		let update = RouterUpdate { intent, confidence, route_reason, tripwire: false };

		(StepUpdate::Router(update), requested)
	}

	pub(crate) async fn step_risk(
		&self,
		state: &haven_domain::SessionState,
		cache: &TurnEmbedCache,
	) -> (StepUpdate, StepId) {
		let text = last_user_text(&state.history).unwrap_or_default().to_owned();
		let snippets = self.gather_snippets(cache, &text, state.risk.band).await;
		let mut user = format!(
			"{}\nLatest message: {text}",
			prompt::analysis_context(state, self.cfg.session.history_window),
		);

		if !snippets.is_empty() {
			user.push_str("\nReference:\n");

			for snippet in &snippets {
				user.push_str("- ");
				user.push_str(snippet);
				user.push('\n');
			}
		}

		let reply = self
			.caps
			.llm
			.generate(&self.cfg.providers.llm, prompt::RISK_SYSTEM, &user, 0., true)
			.await;
		let update = match reply {
			Ok(reply) =>
				if let Some(parsed) = reply.json {
					let score = parsed
						.get("score")
						.and_then(Value::as_f64)
						.map(|s| (s as f32).clamp(0.1, 1.));
					let escalation =
						parsed.get("escalation").and_then(Value::as_bool).unwrap_or(false);
					let reasons = string_list(parsed.get("reasons"));

					RiskUpdate { score, band: RiskBand::from_score(score), escalation, reasons }
				} else {
					self.degraded_risk(state)
				},
			Err(err) => {
				tracing::warn!("Risk assessment failed, keeping the prior state: {err}");

				self.degraded_risk(state)
			},
		};

		(StepUpdate::Risk(update), StepId::Draft)
	}

	fn degraded_risk(&self, state: &haven_domain::SessionState) -> RiskUpdate {
		RiskUpdate {
			score: state.risk.score,
			band: state.risk.band,
			escalation: state.risk.escalation,
			reasons: state.risk.reasons.clone(),
		}
	}

	pub(crate) async fn step_style(
		&self,
		state: &haven_domain::SessionState,
	) -> (StepUpdate, StepId) {
		let text = last_user_text(&state.history).unwrap_or_default().to_owned();
		let user = format!(
			"{}\nLatest message: {text}\nLabels: {}",
			prompt::analysis_context(state, self.cfg.session.history_window),
			prompt::style_labels(),
		);
		let reply = self
			.caps
			.llm
			.generate(&self.cfg.providers.llm, prompt::STYLE_SYSTEM, &user, 0.1, true)
			.await;
		let style = match reply {
			Ok(reply) =>
				if let Some(parsed) = reply.json {
					let label = parsed
						.get("label")
						.and_then(Value::as_str)
						.map(StyleLabel::from_label)
						.unwrap_or_default();
					let confidence =
						parsed.get("confidence").and_then(Value::as_f64).unwrap_or(0.5) as f32;
					let strategy = parsed
						.get("strategy")
						.and_then(Value::as_str)
						.unwrap_or("Ask clarifying questions.")
						.to_owned();
					let state = StyleState::classified(label, confidence, None);
					let strategy = if state.label == StyleLabel::Uncertain {
						"Ambiguity detected: ask a gentle clarifying question.".to_owned()
					} else {
						strategy
					};
					let hint = format!(
						"Style: {} (conf {confidence:.2}). Advice: {strategy}",
						state.label.as_str(),
					);

					StyleState { hint: Some(hint), ..state }
				} else {
					StyleState::default()
				},
			Err(err) => {
				tracing::warn!("Style classification failed: {err}");

				StyleState::default()
			},
		};

		(StepUpdate::Style(StyleUpdate { style }), StepId::Draft)
	}

	pub(crate) async fn step_draft(
		&self,
		state: &haven_domain::SessionState,
		cache: &TurnEmbedCache,
	) -> (StepUpdate, StepId) {
		let text = last_user_text(&state.history).unwrap_or_default().to_owned();
		let snippets = self.gather_snippets(cache, &text, state.risk.band).await;
		let user = prompt::draft_user_prompt(
			state,
			self.cfg.session.history_window,
			&snippets,
			state.reviewer_feedback.as_deref(),
		);
		let reply = self
			.caps
			.llm
			.generate(&self.cfg.providers.llm, prompt::DRAFT_SYSTEM, &user, 0.6, false)
			.await;
		let mut draft = match reply {
			Ok(reply) if !reply.text.trim().is_empty() => reply.text,
			Ok(_) => prompt::fallback_reply(state.lang),
			Err(err) => {
				tracing::warn!("Drafting failed, using the fallback reply: {err}");

				prompt::fallback_reply(state.lang)
			},
		};
		let critical = state.risk.escalation || state.risk.band == RiskBand::Critical;

		if critical {
			let nudge = prompt::safety_nudge(state.lang);

			if !draft.contains(&nudge) {
				draft.push_str("\n\n");
				draft.push_str(&nudge);
			}
		}

		(StepUpdate::Draft(DraftUpdate { draft }), StepId::Review)
	}

	pub(crate) async fn step_review(
		&self,
		state: &haven_domain::SessionState,
		cache: &TurnEmbedCache,
	) -> (StepUpdate, StepId) {
		if state.review_retries.exhausted() {
			tracing::info!("Review retry budget spent, force-approving the current draft.");

			return (approve("approved (retry)"), StepId::Commit);
		}

		let text = last_user_text(&state.history).unwrap_or_default().to_owned();
		let draft = state.draft.as_deref().unwrap_or_default();
		let user = format!("User message:\n{text}\n\nDraft reply:\n{draft}");
		let reply = self
			.caps
			.llm
			.generate(&self.cfg.providers.llm, prompt::REVIEW_SYSTEM, &user, 0., true)
			.await;
		let parsed = match reply {
			Ok(reply) => reply.json,
			Err(err) => {
				tracing::warn!("Gatekeeper unavailable, approving as-is: {err}");

				None
			},
		};
		let Some(parsed) = parsed else {
			return (approve("approved (degraded)"), StepId::Commit);
		};
		let verdict = parsed.get("verdict").and_then(Value::as_str).unwrap_or("APPROVE");
		let reason =
			parsed.get("reason").and_then(Value::as_str).unwrap_or("unspecified").to_owned();

		if verdict != "REJECT" {
			return (approve("approved"), StepId::Commit);
		}

		// A rejection only sticks when targeted reference material actually
		// supports a better draft; otherwise the draft ships as-is.
		let lookup = format!("{reason} {text}");
		let hits = match self
			.caps
			.retrieval
			.search_combined(cache, &lookup, &self.caps.retrieval.index_names(), REVIEW_LOOKUP_K)
			.await
		{
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!("Reviewer lookup failed, approving as-is: {err}");

				return (approve("approved (degraded)"), StepId::Commit);
			},
		};
		let material = self.caps.retrieval.deduplicate_snippets(&hits);

		if material.is_empty() {
			return (approve("approved (no grounds)"), StepId::Commit);
		}

		let selector_user = format!(
			"Rejection reason: {reason}\n\nCandidate material:\n{}",
			material
				.iter()
				.map(|m| format!("- {m}"))
				.collect::<Vec<_>>()
				.join("\n"),
		);
		let selected = self
			.caps
			.llm
			.generate(&self.cfg.providers.llm, prompt::SELECTOR_SYSTEM, &selector_user, 0., true)
			.await;
		let facts = match selected {
			Ok(reply) => reply.json.and_then(|parsed| {
				let relevant =
					parsed.get("relevant").and_then(Value::as_bool).unwrap_or(false);
				let facts = string_list(parsed.get("facts"));

				(relevant && !facts.is_empty()).then_some(facts)
			}),
			Err(err) => {
				tracing::warn!("Fact selection failed, approving as-is: {err}");

				None
			},
		};
		let Some(facts) = facts else {
			return (approve("approved (irrelevant grounds)"), StepId::Commit);
		};
		let feedback = format!(
			"{reason}\nGround the revision in these facts:\n{}",
			facts.iter().map(|f| format!("- {f}")).collect::<Vec<_>>().join("\n"),
		);
		let update = ReviewUpdate {
			approved: false,
			verdict_reason: reason,
			feedback: Some(feedback),
		};

		(StepUpdate::Review(update), StepId::Draft)
	}

	pub(crate) async fn step_commit(
		&self,
		state: &haven_domain::SessionState,
	) -> (StepUpdate, StepId) {
		let text = last_user_text(&state.history).unwrap_or_default().to_owned();
		let user = format!(
			"{}\nLatest message: {text}",
			prompt::analysis_context(state, self.cfg.session.history_window),
		);
		let reply = self
			.caps
			.llm
			.generate(&self.cfg.providers.llm, prompt::SCRIBE_SYSTEM, &user, 0., true)
			.await;
		let parsed = match reply {
			Ok(reply) => reply.json,
			Err(err) => {
				tracing::warn!("Scribe failed, case notes unchanged this turn: {err}");

				None
			},
		};
		let update = match parsed {
			Some(parsed) => {
				let relevant = parsed.get("relevant").and_then(Value::as_bool).unwrap_or(false);

				if relevant {
					CommitUpdate {
						patch: parse_patch(parsed.get("notes")),
						timeline_event: parsed
							.get("timeline_event")
							.and_then(Value::as_str)
							.map(str::to_owned),
						skipped: false,
					}
				} else {
					self.not_relevant_commit(state, &text)
				}
			},
			None => self.not_relevant_commit(state, &text),
		};

		(StepUpdate::Commit(update), StepId::Finalize)
	}

	/// A message judged not clinically relevant is normally skipped, but
	/// critical-band risk evidence is never allowed to slip past the notes.
	fn not_relevant_commit(
		&self,
		state: &haven_domain::SessionState,
		text: &str,
	) -> CommitUpdate {
		if state.risk.band != RiskBand::Critical {
			return CommitUpdate { patch: CaseNotesPatch::new(), timeline_event: None, skipped: true };
		}

		let entries = if state.risk.reasons.is_empty() {
			vec![text.to_owned()]
		} else {
			state.risk.reasons.clone()
		};
		let mut patch = CaseNotesPatch::new();

		patch.insert(NoteCategory::Risk, entries);

		CommitUpdate { patch, timeline_event: None, skipped: false }
	}

	pub(crate) async fn step_finalize(
		&self,
		state: &haven_domain::SessionState,
	) -> (StepUpdate, StepId) {
		let source = match state.draft.as_deref() {
			Some(draft) if !draft.trim().is_empty() => draft.to_owned(),
			_ => prompt::fallback_reply(state.lang),
		};
		let final_reply = self.localize_reply(state, &source).await;
		let requested = if state.voice_output { StepId::Synthesize } else { StepId::End };

		(StepUpdate::Finalize(FinalizeUpdate { final_reply }), requested)
	}

	/// Humanizes the approved draft for the reply language. The rewrite never
	/// gets to change meaning: dropped markers are restored, the glossary is
	/// enforced, a wrong-script answer is retried once at zero temperature,
	/// and any remaining failure ships the source untouched.
	async fn localize_reply(&self, state: &haven_domain::SessionState, source: &str) -> String {
		let user =
			prompt::localize_user_prompt(state, self.cfg.session.history_window, source);
		let reply = self
			.caps
			.llm
			.generate(&self.cfg.providers.llm, prompt::LOCALIZE_SYSTEM, &user, 0.3, true)
			.await;
		let Some(mut polished) = localized_reply_text(reply) else {
			return source.to_owned();
		};

		if self.localizer.language_mismatch(&polished, state.lang) {
			let retry = self
				.caps
				.llm
				.generate(
					&self.cfg.providers.llm,
					prompt::LOCALIZE_SYSTEM,
					&prompt::localize_retry_prompt(state, source),
					0.,
					true,
				)
				.await;

			match localized_reply_text(retry) {
				Some(retried) if !self.localizer.language_mismatch(&retried, state.lang) =>
					polished = retried,
				_ => return source.to_owned(),
			}
		}

		let polished = self.localizer.apply_glossary(&polished);
		let polished = self.localizer.ensure_markers(&polished, source);

		self.localizer.finish(&polished, state.lang)
	}

	pub(crate) async fn step_synthesize(
		&self,
		state: &haven_domain::SessionState,
	) -> (StepUpdate, StepId) {
		let reply = state.final_reply.as_deref().unwrap_or_default();
		let audio = match self
			.caps
			.speech
			.synthesize(&self.cfg.providers.speech, reply, state.lang.as_str())
			.await
		{
			Ok(audio) => audio,
			Err(err) => {
				tracing::warn!("Synthesis failed, reply stays text-only: {err}");

				Vec::new()
			},
		};

		(StepUpdate::Synthesize(SynthesizeUpdate { audio }), StepId::End)
	}

	async fn gather_snippets(
		&self,
		cache: &TurnEmbedCache,
		text: &str,
		band: RiskBand,
	) -> Vec<String> {
		let k = self.caps.retrieval.dynamic_k(text, band, self.caps.retrieval.base_k());
		let hits = match self
			.caps
			.retrieval
			.search_combined(cache, text, &self.caps.retrieval.index_names(), k)
			.await
		{
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!("Retrieval degraded to no snippets: {err}");

				Vec::new()
			},
		};

		self.caps.retrieval.deduplicate_snippets(&hits)
	}
}

fn localized_reply_text(reply: color_eyre::Result<haven_providers::LlmReply>) -> Option<String> {
	let reply = match reply {
		Ok(reply) => reply,
		Err(err) => {
			tracing::warn!("Localization failed, shipping the draft as-is: {err}");

			return None;
		},
	};
	let text = reply.json?.get("reply")?.as_str()?.trim().to_owned();

	(!text.is_empty()).then_some(text)
}

fn approve(reason: &str) -> StepUpdate {
	StepUpdate::Review(ReviewUpdate {
		approved: true,
		verdict_reason: reason.to_owned(),
		feedback: None,
	})
}

fn string_list(value: Option<&Value>) -> Vec<String> {
	value
		.and_then(Value::as_array)
		.map(|items| {
			items
				.iter()
				.filter_map(Value::as_str)
				.map(str::to_owned)
				.collect()
		})
		.unwrap_or_default()
}

fn parse_patch(value: Option<&Value>) -> CaseNotesPatch {
	let mut patch = CaseNotesPatch::new();
	let Some(map) = value.and_then(Value::as_object) else {
		return patch;
	};

	for (key, entries) in map {
		let Ok(category) =
			serde_json::from_value::<NoteCategory>(Value::String(key.clone()))
		else {
			tracing::debug!(category = %key, "Dropping unknown note category from the scribe.");

			continue;
		};
		let entries = string_list(Some(entries));

		if !entries.is_empty() {
			patch.insert(category, entries);
		}
	}

	patch
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unknown_patch_categories_are_dropped() {
		let value = serde_json::json!({
			"fear": ["afraid at night"],
			"invented_category": ["noise"],
		});
		let patch = parse_patch(Some(&value));

		assert_eq!(patch.len(), 1);
		assert!(patch.contains_key(&NoteCategory::Fear));
	}

	#[test]
	fn string_lists_skip_non_strings() {
		let value = serde_json::json!(["keep", 7, null, "also keep"]);

		assert_eq!(string_list(Some(&value)), vec!["keep".to_owned(), "also keep".to_owned()]);
	}
}
