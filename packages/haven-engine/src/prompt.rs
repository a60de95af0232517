//! Prompt assembly for the pipeline steps. Every structured prompt pins the
//! exact JSON shape expected back; parsing is defensive regardless.

use haven_domain::{LangHint, SessionState, Turn, history_window};

pub const ROUTER_SYSTEM: &str = "You are the intake router for a domestic-abuse support service. \
Classify the user's latest message into exactly one intent: \
\"therapist\" (emotional support and guidance), \
\"risk_assessment\" (signs of danger, threats, escalation), or \
\"personality\" (interaction style needs reading before support lands). \
Respond with JSON only: {\"intent\": \"...\", \"confidence\": 0.0, \"reason\": \"...\"}.";

pub const RISK_SYSTEM: &str = "You assess immediate danger in a domestic-abuse support conversation. \
Weigh the latest message against the history and case notes. \
Respond with JSON only: \
{\"score\": 0.0 or null, \"escalation\": false, \"reasons\": [\"...\"]}. \
Score 0.1 to 1.0; use null when there is not enough information yet.";

pub const STYLE_SYSTEM: &str = "You read the user's interaction style so support can be phrased to land. \
Pick one label from the provided list. \
Respond with JSON only: \
{\"label\": \"STYLE_...\", \"confidence\": 0.0, \"strategy\": \"...\"}.";

pub const DRAFT_SYSTEM: &str = "You are a trauma-informed support companion. \
Write a short, warm reply in the user's language. Validate feelings first, \
never blame, never instruct the user to confront their abuser, and weave in \
at most one concrete suggestion drawn from the reference snippets when one \
fits. End with a gentle follow-up question.";

pub const REVIEW_SYSTEM: &str = "You are the compliance gatekeeper for a support service. \
Check the draft reply for unsafe advice, victim blaming, legal claims stated \
as fact, and promises the service cannot keep. \
Respond with JSON only: {\"verdict\": \"APPROVE\" or \"REJECT\", \"reason\": \"...\"}.";

pub const SELECTOR_SYSTEM: &str = "You validate whether reference material actually supports fixing a \
rejected draft. Keep only facts that directly address the rejection reason. \
Respond with JSON only: {\"relevant\": false, \"facts\": [\"...\"]}.";

pub const LOCALIZE_SYSTEM: &str = "You rewrite a support reply so it reads like a warm, natural human \
therapist, in the target language. English replies use plain, friendly \
everyday wording. Arabic replies use natural Saudi dialect, never formal \
Fusha. Keep the meaning exactly: add no facts, soften no warnings, and keep \
every number, link, and citation as written. \
Respond with JSON only: {\"reply\": \"...\"}.";

pub const SCRIBE_SYSTEM: &str = "You maintain structured case notes for a support conversation. \
Decide whether the latest user message contains clinically relevant \
information. Respond with JSON only: \
{\"relevant\": false, \"notes\": {\"category\": [\"entry\"]}, \"timeline_event\": null}. \
Valid categories: physical_abuse, verbal_abuse, threat, control, fear, \
emotion, risk, context, patterns. Note entries are short factual phrases.";

pub fn render_history(turns: &[Turn], window: usize) -> String {
	let mut out = String::new();

	for turn in history_window(turns, window) {
		let role = match turn.role {
			haven_domain::Role::User => "user",
			haven_domain::Role::Assistant => "assistant",
		};

		out.push_str(role);
		out.push_str(": ");
		out.push_str(&turn.text);
		out.push('\n');
	}

	out
}

pub fn analysis_context(state: &SessionState, window: usize) -> String {
	let mut out = String::new();

	out.push_str("History:\n");
	out.push_str(&render_history(&state.history, window));

	if !state.notes.is_empty() {
		out.push_str("\nCase notes:\n");
		out.push_str(&state.notes.prompt_summary(5));
	}

	out
}

pub fn style_labels() -> String {
	[
		"STYLE_COOPERATIVE",
		"STYLE_DEFENSIVE",
		"STYLE_STONEWALLING",
		"STYLE_CONTEMPT",
		"STYLE_DISTRESSED",
		"STYLE_ANGER",
		"STYLE_DEPRESSED",
		"STYLE_DEFLECTION_HUMOR",
		"STYLE_NEUTRAL",
		"STYLE_EUPHORIC",
		"STYLE_DISSOCIATIVE",
		"STYLE_UNCERTAIN",
	]
	.join(", ")
}

pub fn draft_user_prompt(
	state: &SessionState,
	window: usize,
	snippets: &[String],
	feedback: Option<&str>,
) -> String {
	let mut out = analysis_context(state, window);

	if state.style.label != haven_domain::StyleLabel::Uncertain {
		out.push_str("\nInteraction style: ");
		out.push_str(state.style.label.as_str());

		if let Some(hint) = &state.style.hint {
			out.push_str(" (");
			out.push_str(hint);
			out.push(')');
		}

		out.push('\n');
	}
	if !snippets.is_empty() {
		out.push_str("\nReference snippets:\n");

		for snippet in snippets {
			out.push_str("- ");
			out.push_str(snippet);
			out.push('\n');
		}
	}
	if let Some(feedback) = feedback {
		out.push_str("\nA compliance reviewer rejected your previous draft. Address this:\n");
		out.push_str(feedback);
		out.push('\n');
	}

	out
}

pub fn localize_user_prompt(state: &SessionState, window: usize, source: &str) -> String {
	let mut out = String::new();

	out.push_str("Target language: ");
	out.push_str(state.lang.as_str());
	out.push_str("\nRisk band: ");
	out.push_str(state.risk.band.as_str());

	if state.style.label != haven_domain::StyleLabel::Uncertain {
		out.push_str("\nInteraction style: ");
		out.push_str(state.style.label.as_str());
	}

	out.push_str("\n\nRecent conversation:\n");
	out.push_str(&render_history(&state.history, window));
	out.push_str("\nReply to rewrite:\n");
	out.push_str(source);

	out
}

/// Retry prompt when the rewrite came back in the wrong script.
pub fn localize_retry_prompt(state: &SessionState, source: &str) -> String {
	format!(
		"Your previous rewrite was not in the target language ({}). Rewrite \
		this reply again, strictly in that language:\n{source}",
		state.lang.as_str(),
	)
}

/// Canned fallback when drafting itself is degraded. Never empty; the service
/// must always answer with something supportive.
pub fn fallback_reply(lang: LangHint) -> String {
	match lang {
		LangHint::Arabic =>
			"أنا هنا معك وأسمعك. خذ وقتك، وأخبرني بما تستطيع عندما تكون مستعداً.".to_owned(),
		_ => "I'm here with you and I'm listening. Take your time, and share \
			what you can when you're ready."
			.to_owned(),
	}
}

/// Appended to critical or escalating replies when the draft carries no
/// safety language of its own.
pub fn safety_nudge(lang: LangHint) -> String {
	match lang {
		LangHint::Arabic =>
			"إذا كنت في خطر الآن، فالرجاء الاتصال بخدمات الطوارئ المحلية فوراً.".to_owned(),
		_ => "If you are in immediate danger right now, please contact your \
			local emergency services."
			.to_owned(),
	}
}
