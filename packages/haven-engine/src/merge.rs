use haven_domain::SessionState;

use crate::update::StepUpdate;

/// Folds one step's update into the session state. Reduction policies are
/// fixed per field: analysis flags only latch on (except the tripwire reset),
/// case notes merge append-dedupe, scalar turn fields overwrite.
pub fn apply(state: &mut SessionState, update: StepUpdate, now: i64) {
	match update {
		StepUpdate::Router(u) => {
			state.intent = u.intent;
			state.confidence = u.confidence.clamp(0., 1.);
			state.route_reason = u.route_reason;

			if u.tripwire {
				// Re-arm risk analysis: a tripwire hit outranks the
				// per-snapshot loop guard.
				state.risk_seen = false;
			}
		},
		StepUpdate::Risk(u) => {
			state.risk.score = u.score;
			state.risk.band = u.band;
			state.risk.escalation = u.escalation;
			state.risk.reasons = u.reasons;
			state.risk_seen = true;
		},
		StepUpdate::Style(u) => {
			state.style = u.style;
			state.style_seen = true;
		},
		StepUpdate::Draft(u) => {
			state.draft = Some(u.draft);
			// A fresh draft invalidates stale feedback.
			state.reviewer_feedback = None;
		},
		StepUpdate::Review(u) =>
			if u.approved {
				state.review_retries.reset();
				state.reviewer_feedback = None;
			} else {
				// One corrective cycle spends one unit of the retry budget.
				let _ = state.review_retries.try_consume();
				state.reviewer_feedback = u.feedback;
			},
		StepUpdate::Commit(u) => {
			if !u.skipped {
				state.notes.merge(&u.patch);
			}
			if let Some(event) = u.timeline_event {
				state.notes.push_timeline(event, now);
			}
		},
		StepUpdate::Finalize(u) => {
			state.final_reply = Some(u.final_reply);
		},
		// Transcripts and audio are handled by the turn loop itself; they
		// carry no durable session state.
		StepUpdate::Transcribe(_) | StepUpdate::Synthesize(_) | StepUpdate::None => {},
	}
}

#[cfg(test)]
mod tests {
	use uuid::Uuid;

	use super::*;
	use crate::update::{ReviewUpdate, RiskUpdate, RouterUpdate};
	use haven_domain::{Intent, RetryPolicy, RiskBand};

	fn state() -> SessionState {
		SessionState::new(Uuid::new_v4(), "u", RetryPolicy::new(1), 0)
	}

	#[test]
	fn tripwire_rearms_risk_analysis() {
		let mut state = state();

		state.risk_seen = true;

		apply(
			&mut state,
			StepUpdate::Router(RouterUpdate {
				intent: Intent::Risk,
				confidence: 0.95,
				route_reason: "tripwire".to_owned(),
				tripwire: true,
			}),
			0,
		);

		assert!(!state.risk_seen);
	}

	#[test]
	fn confidence_is_clamped() {
		let mut state = state();

		apply(
			&mut state,
			StepUpdate::Router(RouterUpdate { confidence: 1.7, ..RouterUpdate::default() }),
			0,
		);

		assert_eq!(state.confidence, 1.);
	}

	#[test]
	fn approval_resets_the_retry_counter() {
		let mut state = state();

		assert!(state.review_retries.try_consume());

		apply(
			&mut state,
			StepUpdate::Review(ReviewUpdate {
				approved: true,
				verdict_reason: "approved".to_owned(),
				feedback: None,
			}),
			0,
		);

		assert_eq!(state.review_retries.used(), 0);
	}

	#[test]
	fn risk_update_latches_the_seen_flag() {
		let mut state = state();

		apply(
			&mut state,
			StepUpdate::Risk(RiskUpdate {
				score: Some(0.9),
				band: RiskBand::from_score(Some(0.9)),
				escalation: true,
				reasons: vec!["explicit threat".to_owned()],
			}),
			0,
		);

		assert!(state.risk_seen);
		assert_eq!(state.risk.band, RiskBand::Critical);
	}
}
