use std::collections::BTreeMap;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// Closed set of clinical note categories.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteCategory {
	PhysicalAbuse,
	VerbalAbuse,
	Threat,
	Control,
	Fear,
	Emotion,
	Risk,
	Context,
	Patterns,
}

impl NoteCategory {
	pub const ALL: [Self; 9] = [
		Self::PhysicalAbuse,
		Self::VerbalAbuse,
		Self::Threat,
		Self::Control,
		Self::Fear,
		Self::Emotion,
		Self::Risk,
		Self::Context,
		Self::Patterns,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::PhysicalAbuse => "physical_abuse",
			Self::VerbalAbuse => "verbal_abuse",
			Self::Threat => "threat",
			Self::Control => "control",
			Self::Fear => "fear",
			Self::Emotion => "emotion",
			Self::Risk => "risk",
			Self::Context => "context",
			Self::Patterns => "patterns",
		}
	}
}

/// One append-only timeline entry. The timestamp is always server-assigned.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TimelineEvent {
	pub event: String,
	pub ts: i64,
}

pub type CaseNotesPatch = BTreeMap<NoteCategory, Vec<String>>;

/// Accumulated case notes for one user. Category lists only ever grow through
/// [`CaseNotes::merge`]; [`CaseNotes::refine`] is the single operation allowed
/// to replace entries. The timeline is append-only.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CaseNotes {
	#[serde(default)]
	pub categories: BTreeMap<NoteCategory, Vec<String>>,
	#[serde(default)]
	pub timeline: Vec<TimelineEvent>,
}

impl CaseNotes {
	pub fn is_empty(&self) -> bool {
		self.categories.values().all(Vec::is_empty) && self.timeline.is_empty()
	}

	pub fn entries(&self, category: NoteCategory) -> &[String] {
		self.categories.get(&category).map(Vec::as_slice).unwrap_or_default()
	}

	/// Unions `patch` into the existing notes, deduplicating by exact string
	/// equality and preserving first-seen order.
	pub fn merge(&mut self, patch: &CaseNotesPatch) {
		for (category, additions) in patch {
			let entries = self.categories.entry(*category).or_default();
			let mut seen: AHashSet<String> = entries.iter().cloned().collect();

			for addition in additions {
				let trimmed = addition.trim();

				if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
					continue;
				}

				entries.push(trimmed.to_string());
			}
		}
	}

	/// Replaces one category wholesale. This is the only path that may shrink
	/// a list, used when an earlier entry is being corrected.
	pub fn refine(&mut self, category: NoteCategory, entries: Vec<String>) {
		let cleaned: Vec<String> = dedupe_in_order(entries);

		self.categories.insert(category, cleaned);
	}

	pub fn push_timeline(&mut self, event: impl Into<String>, now: i64) {
		let event = event.into();

		if event.trim().is_empty() {
			return;
		}

		self.timeline.push(TimelineEvent { event, ts: now });
	}

	/// Compact text rendering for prompt context. The canonical store is never
	/// truncated; only this view limits the timeline tail.
	pub fn prompt_summary(&self, timeline_tail: usize) -> String {
		let mut lines = Vec::new();

		for category in NoteCategory::ALL {
			let entries = self.entries(category);

			if entries.is_empty() {
				continue;
			}

			lines.push(format!("{}: {}", category.as_str(), entries.join("; ")));
		}

		let tail_start = self.timeline.len().saturating_sub(timeline_tail);

		for event in &self.timeline[tail_start..] {
			lines.push(format!("timeline: {}", event.event));
		}

		lines.join("\n")
	}
}

fn dedupe_in_order(entries: Vec<String>) -> Vec<String> {
	let mut seen = AHashSet::new();
	let mut out = Vec::with_capacity(entries.len());

	for entry in entries {
		let trimmed = entry.trim().to_string();

		if trimmed.is_empty() || !seen.insert(trimmed.clone()) {
			continue;
		}

		out.push(trimmed);
	}

	out
}
