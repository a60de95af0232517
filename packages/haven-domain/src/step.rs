use serde::{Deserialize, Serialize};

/// Step identifiers for the turn pipeline. `End` is the only terminal state.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
	Transcribe,
	Router,
	Risk,
	Style,
	Draft,
	Review,
	Commit,
	Finalize,
	Synthesize,
	End,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
	#[default]
	Support,
	Risk,
	Style,
}

impl Intent {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"support" | "therapist" => Some(Self::Support),
			"risk" | "risk_assessment" => Some(Self::Risk),
			"style" | "personality" => Some(Self::Style),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Support => "support",
			Self::Risk => "risk",
			Self::Style => "style",
		}
	}
}

/// Per-turn routing flags consulted by the transition table.
#[derive(Clone, Copy, Debug, Default)]
pub struct TurnFlags {
	pub risk_seen: bool,
	pub style_seen: bool,
	pub voice_output: bool,
}

pub fn entry_step(has_audio: bool) -> StepId {
	if has_audio { StepId::Transcribe } else { StepId::Router }
}

/// Total transition function over the step table. A requested next step that is
/// not a legal edge from `current` coerces to the default edge instead of
/// failing, so a misbehaving step can never wedge a turn.
pub fn transition(current: StepId, requested: StepId, flags: &TurnFlags) -> StepId {
	match current {
		StepId::Transcribe => StepId::Router,
		StepId::Router => match requested {
			StepId::Risk if !flags.risk_seen => StepId::Risk,
			StepId::Style if !flags.style_seen => StepId::Style,
			// Loop guard: a category already analyzed for this message falls
			// through straight to drafting.
			StepId::Risk | StepId::Style => StepId::Draft,
			_ => StepId::Draft,
		},
		StepId::Risk | StepId::Style => StepId::Draft,
		StepId::Draft => StepId::Review,
		StepId::Review => match requested {
			StepId::Draft => StepId::Draft,
			_ => StepId::Commit,
		},
		StepId::Commit => StepId::Finalize,
		StepId::Finalize =>
			if flags.voice_output && requested == StepId::Synthesize {
				StepId::Synthesize
			} else {
				StepId::End
			},
		StepId::Synthesize | StepId::End => StepId::End,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn router_honors_loop_guard() {
		let fresh = TurnFlags::default();
		let seen = TurnFlags { risk_seen: true, style_seen: true, voice_output: false };

		assert_eq!(transition(StepId::Router, StepId::Risk, &fresh), StepId::Risk);
		assert_eq!(transition(StepId::Router, StepId::Risk, &seen), StepId::Draft);
		assert_eq!(transition(StepId::Router, StepId::Style, &seen), StepId::Draft);
	}

	#[test]
	fn review_only_branches_to_draft_or_commit() {
		let flags = TurnFlags::default();

		assert_eq!(transition(StepId::Review, StepId::Draft, &flags), StepId::Draft);
		assert_eq!(transition(StepId::Review, StepId::Commit, &flags), StepId::Commit);
		assert_eq!(transition(StepId::Review, StepId::Risk, &flags), StepId::Commit);
	}

	#[test]
	fn finalize_gates_audio_on_voice_output() {
		let text = TurnFlags::default();
		let voice = TurnFlags { voice_output: true, ..TurnFlags::default() };

		assert_eq!(transition(StepId::Finalize, StepId::Synthesize, &text), StepId::End);
		assert_eq!(transition(StepId::Finalize, StepId::Synthesize, &voice), StepId::Synthesize);
		assert_eq!(transition(StepId::Finalize, StepId::End, &voice), StepId::End);
	}

	#[test]
	fn voice_entry_goes_through_transcription() {
		assert_eq!(entry_step(true), StepId::Transcribe);
		assert_eq!(entry_step(false), StepId::Router);
		assert_eq!(transition(StepId::Transcribe, StepId::End, &TurnFlags::default()), StepId::Router);
	}
}
