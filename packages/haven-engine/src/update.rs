use haven_domain::{CaseNotesPatch, Intent, RiskBand, StyleState};

/// Typed output of the router step.
#[derive(Clone, Debug, Default)]
pub struct RouterUpdate {
	pub intent: Intent,
	pub confidence: f32,
	pub route_reason: String,
	/// A tripwire hit forces risk re-analysis even when the loop guard would
	/// normally suppress it for this memory snapshot.
	pub tripwire: bool,
}

#[derive(Clone, Debug, Default)]
pub struct RiskUpdate {
	pub score: Option<f32>,
	pub band: RiskBand,
	pub escalation: bool,
	pub reasons: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct StyleUpdate {
	pub style: StyleState,
}

#[derive(Clone, Debug, Default)]
pub struct DraftUpdate {
	pub draft: String,
}

#[derive(Clone, Debug, Default)]
pub struct ReviewUpdate {
	pub approved: bool,
	pub verdict_reason: String,
	pub feedback: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct CommitUpdate {
	pub patch: CaseNotesPatch,
	pub timeline_event: Option<String>,
	pub skipped: bool,
}

#[derive(Clone, Debug, Default)]
pub struct FinalizeUpdate {
	pub final_reply: String,
}

#[derive(Clone, Debug, Default)]
pub struct TranscribeUpdate {
	pub text: String,
}

#[derive(Clone, Debug, Default)]
pub struct SynthesizeUpdate {
	pub audio: Vec<u8>,
}

/// One step's contribution to the turn. Each variant is folded into the
/// session state by exactly one reducer in [`crate::merge`]; steps never
/// mutate the state directly.
#[derive(Clone, Debug)]
pub enum StepUpdate {
	Router(RouterUpdate),
	Risk(RiskUpdate),
	Style(StyleUpdate),
	Draft(DraftUpdate),
	Review(ReviewUpdate),
	Commit(CommitUpdate),
	Finalize(FinalizeUpdate),
	Transcribe(TranscribeUpdate),
	Synthesize(SynthesizeUpdate),
	None,
}
