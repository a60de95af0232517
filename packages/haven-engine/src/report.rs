//! Pure rendering of the end-of-session report. No clocks, no providers; the
//! session layer decides when to call it and where the artifact goes.

use haven_domain::{NoteCategory, SessionState};

pub fn render(state: &SessionState) -> String {
	let mut out = String::new();

	out.push_str(&format!("# Session report {}\n\n", state.session_id));
	out.push_str(&format!("User: {}\n", state.user_id));
	out.push_str(&format!("Turns: {}\n", state.history.len()));
	out.push_str(&format!("Risk band: {}\n", state.risk.band.as_str()));

	if let Some(score) = state.risk.score {
		out.push_str(&format!("Risk score: {score:.2}\n"));
	}
	if state.risk.escalation {
		out.push_str("Escalation observed.\n");
	}

	out.push_str(&format!("Interaction style: {}\n", state.style.label.as_str()));

	let has_notes = NoteCategory::ALL.iter().any(|c| !state.notes.entries(*c).is_empty());

	if has_notes {
		out.push_str("\n## Case notes\n");

		for category in NoteCategory::ALL {
			let entries = state.notes.entries(category);

			if entries.is_empty() {
				continue;
			}

			out.push_str(&format!("\n### {}\n", category.as_str()));

			for entry in entries {
				out.push_str(&format!("- {entry}\n"));
			}
		}
	}
	if !state.notes.timeline.is_empty() {
		out.push_str("\n## Timeline\n");

		for event in &state.notes.timeline {
			out.push_str(&format!("- [{}] {}\n", event.ts, event.event));
		}
	}

	out
}
