use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CaseNotes, Intent, LangHint, RetryCounter, RetryPolicy, TurnFlags};

/// Below this confidence a style classification collapses to
/// [`StyleLabel::Uncertain`].
pub const MIN_STYLE_CONFIDENCE: f32 = 0.60;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	User,
	Assistant,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Turn {
	pub role: Role,
	pub text: String,
	pub ts: i64,
}

/// Risk severity bands. `NeedsInfo` is the pre-assessment state, not a
/// severity level of its own.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
	Low,
	Medium,
	Critical,
	#[default]
	NeedsInfo,
}

impl RiskBand {
	/// Band cut points. `None` means the assessor could not score the
	/// situation yet.
	pub fn from_score(score: Option<f32>) -> Self {
		match score {
			None => Self::NeedsInfo,
			Some(s) if s >= 0.8 => Self::Critical,
			Some(s) if s >= 0.5 => Self::Medium,
			Some(_) => Self::Low,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Low => "low",
			Self::Medium => "medium",
			Self::Critical => "critical",
			Self::NeedsInfo => "needs_info",
		}
	}
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RiskState {
	pub score: Option<f32>,
	pub band: RiskBand,
	pub escalation: bool,
	pub reasons: Vec<String>,
}

/// Closed set of interaction-style labels. Unknown or low-confidence
/// classifications always collapse to `Uncertain`.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleLabel {
	Cooperative,
	Defensive,
	Stonewalling,
	Contempt,
	Distressed,
	Anger,
	Depressed,
	DeflectionHumor,
	Neutral,
	Euphoric,
	Dissociative,
	#[default]
	Uncertain,
}

impl StyleLabel {
	pub fn from_label(raw: &str) -> Self {
		match raw.trim() {
			"STYLE_COOPERATIVE" => Self::Cooperative,
			"STYLE_DEFENSIVE" => Self::Defensive,
			"STYLE_STONEWALLING" => Self::Stonewalling,
			"STYLE_CONTEMPT" => Self::Contempt,
			"STYLE_DISTRESSED" => Self::Distressed,
			"STYLE_ANGER" => Self::Anger,
			"STYLE_DEPRESSED" => Self::Depressed,
			"STYLE_DEFLECTION_HUMOR" => Self::DeflectionHumor,
			"STYLE_NEUTRAL" => Self::Neutral,
			"STYLE_EUPHORIC" => Self::Euphoric,
			"STYLE_DISSOCIATIVE" => Self::Dissociative,
			_ => Self::Uncertain,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Cooperative => "STYLE_COOPERATIVE",
			Self::Defensive => "STYLE_DEFENSIVE",
			Self::Stonewalling => "STYLE_STONEWALLING",
			Self::Contempt => "STYLE_CONTEMPT",
			Self::Distressed => "STYLE_DISTRESSED",
			Self::Anger => "STYLE_ANGER",
			Self::Depressed => "STYLE_DEPRESSED",
			Self::DeflectionHumor => "STYLE_DEFLECTION_HUMOR",
			Self::Neutral => "STYLE_NEUTRAL",
			Self::Euphoric => "STYLE_EUPHORIC",
			Self::Dissociative => "STYLE_DISSOCIATIVE",
			Self::Uncertain => "STYLE_UNCERTAIN",
		}
	}
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StyleState {
	pub label: StyleLabel,
	pub confidence: f32,
	pub hint: Option<String>,
}

impl StyleState {
	/// Applies the minimum-confidence clamp before storing a classification.
	pub fn classified(label: StyleLabel, confidence: f32, hint: Option<String>) -> Self {
		let label = if confidence < MIN_STYLE_CONFIDENCE { StyleLabel::Uncertain } else { label };

		Self { label, confidence, hint }
	}
}

/// Mutable per-session state threaded through a turn. One instance is owned by
/// the session store and locked for the duration of each turn.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SessionState {
	pub session_id: Uuid,
	pub user_id: String,
	pub lang: LangHint,
	pub history: Vec<Turn>,
	/// Fingerprint of the user message the analysis flags apply to. A changed
	/// fingerprint invalidates those flags.
	pub message_fingerprint: String,
	pub risk_seen: bool,
	pub style_seen: bool,
	pub risk: RiskState,
	pub style: StyleState,
	pub notes: CaseNotes,
	pub review_retries: RetryCounter,
	pub intent: Intent,
	pub confidence: f32,
	pub route_reason: String,
	pub draft: Option<String>,
	pub reviewer_feedback: Option<String>,
	pub final_reply: Option<String>,
	pub voice_output: bool,
	pub started_at: i64,
	pub last_activity_at: i64,
}

impl SessionState {
	pub fn new(session_id: Uuid, user_id: impl Into<String>, policy: RetryPolicy, now: i64) -> Self {
		Self {
			session_id,
			user_id: user_id.into(),
			lang: LangHint::default(),
			history: Vec::new(),
			message_fingerprint: String::new(),
			risk_seen: false,
			style_seen: false,
			risk: RiskState::default(),
			style: StyleState::default(),
			notes: CaseNotes::default(),
			review_retries: policy.counter(),
			intent: Intent::default(),
			confidence: 0.,
			route_reason: String::new(),
			draft: None,
			reviewer_feedback: None,
			final_reply: None,
			voice_output: false,
			started_at: now,
			last_activity_at: now,
		}
	}

	/// Records the fingerprint of the message being processed. If it differs
	/// from the last one, the analysis flags belong to an older message and
	/// get cleared. Returns `true` when the fingerprint changed.
	pub fn observe_fingerprint(&mut self, fp: &str) -> bool {
		if self.message_fingerprint == fp {
			return false;
		}

		self.message_fingerprint = fp.to_owned();
		self.risk_seen = false;
		self.style_seen = false;

		true
	}

	/// Clears per-turn scratch fields and restores the review retry budget.
	pub fn begin_turn(&mut self, now: i64) {
		self.intent = Intent::default();
		self.confidence = 0.;
		self.route_reason.clear();
		self.draft = None;
		self.reviewer_feedback = None;
		self.final_reply = None;
		self.voice_output = false;
		self.review_retries.reset();
		self.last_activity_at = now;
	}

	pub fn push_turn(&mut self, role: Role, text: impl Into<String>, now: i64) {
		self.history.push(Turn { role, text: text.into(), ts: now });
		self.last_activity_at = now;
	}

	pub fn is_idle(&self, now: i64, idle_secs: u64) -> bool {
		now.saturating_sub(self.last_activity_at) >= idle_secs as i64
	}

	pub fn flags(&self) -> TurnFlags {
		TurnFlags {
			risk_seen: self.risk_seen,
			style_seen: self.style_seen,
			voice_output: self.voice_output,
		}
	}
}

/// Short content fingerprint: the first 12 hex characters of the BLAKE3 hash.
pub fn fingerprint(bytes: &[u8]) -> String {
	blake3::hash(bytes).to_hex()[..12].to_owned()
}

/// Trailing window of the conversation used for prompt context.
pub fn history_window(history: &[Turn], window: usize) -> &[Turn] {
	let start = history.len().saturating_sub(window);

	&history[start..]
}

pub fn last_user_text(history: &[Turn]) -> Option<&str> {
	history.iter().rev().find(|t| t.role == Role::User).map(|t| t.text.as_str())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn band_cut_points() {
		assert_eq!(RiskBand::from_score(None), RiskBand::NeedsInfo);
		assert_eq!(RiskBand::from_score(Some(0.2)), RiskBand::Low);
		assert_eq!(RiskBand::from_score(Some(0.5)), RiskBand::Medium);
		assert_eq!(RiskBand::from_score(Some(0.79)), RiskBand::Medium);
		assert_eq!(RiskBand::from_score(Some(0.8)), RiskBand::Critical);
	}

	#[test]
	fn low_confidence_style_collapses_to_uncertain() {
		let state = StyleState::classified(StyleLabel::Cooperative, 0.4, None);

		assert_eq!(state.label, StyleLabel::Uncertain);

		let state = StyleState::classified(StyleLabel::Cooperative, 0.9, None);

		assert_eq!(state.label, StyleLabel::Cooperative);
	}

	#[test]
	fn unknown_labels_map_to_uncertain() {
		assert_eq!(StyleLabel::from_label("STYLE_COOPERATIVE"), StyleLabel::Cooperative);
		assert_eq!(StyleLabel::from_label("STYLE_SOMETHING_NEW"), StyleLabel::Uncertain);
	}

	#[test]
	fn fingerprint_change_clears_analysis_flags() {
		let mut state = SessionState::new(Uuid::new_v4(), "u1", RetryPolicy::new(1), 100);

		assert!(state.observe_fingerprint("abc"));

		state.risk_seen = true;
		state.style_seen = true;

		assert!(!state.observe_fingerprint("abc"));
		assert!(state.risk_seen);
		assert!(state.observe_fingerprint("def"));
		assert!(!state.risk_seen);
		assert!(!state.style_seen);
	}

	#[test]
	fn history_window_and_last_user_text() {
		let mut state = SessionState::new(Uuid::new_v4(), "u1", RetryPolicy::new(1), 100);

		for i in 0..6 {
			state.push_turn(Role::User, format!("user {i}"), 100 + i);
			state.push_turn(Role::Assistant, format!("bot {i}"), 100 + i);
		}

		let window = history_window(&state.history, 4);

		assert_eq!(window.len(), 4);
		assert_eq!(window[0].text, "user 4");
		assert_eq!(last_user_text(&state.history), Some("user 5"));
	}

	#[test]
	fn fingerprint_is_twelve_hex_chars() {
		let fp = fingerprint(b"{}");

		assert_eq!(fp.len(), 12);
		assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
	}
}
