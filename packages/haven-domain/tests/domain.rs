use std::collections::BTreeMap;

use uuid::Uuid;

use haven_domain::{
	CaseNotes, Intent, LangHint, NoteCategory, RetryPolicy, RiskBand, Role, SessionState, StepId,
	StyleLabel, Tripwire, fingerprint, last_user_text, transition,
};

fn fresh_session() -> SessionState {
	SessionState::new(Uuid::new_v4(), "user-1", RetryPolicy::new(1), 1_700_000_000)
}

#[test]
fn tripwire_fires_regardless_of_language() {
	let tripwire = Tripwire::new().expect("patterns compile");

	assert!(tripwire.fires("I want to end my life tonight"));
	assert!(tripwire.fires("هو عند الباب الآن"));
	assert!(!tripwire.fires("can you explain what a restraining order is"));
}

#[test]
fn arabic_detection_survives_mixed_input() {
	assert_eq!(LangHint::detect("help me الآن"), LangHint::Arabic);
	assert_eq!(LangHint::detect("help me right now please"), LangHint::English);
}

#[test]
fn a_full_turn_walks_the_happy_path() {
	let mut session = fresh_session();

	session.observe_fingerprint(&fingerprint(b"{}"));
	session.begin_turn(1_700_000_010);
	session.push_turn(Role::User, "he keeps checking my phone", 1_700_000_010);

	let mut step = StepId::Router;
	let mut visited = vec![step];

	// Router wants risk analysis on a fresh fingerprint.
	loop {
		let requested = match step {
			StepId::Router => StepId::Risk,
			StepId::Review => StepId::Commit,
			_ => StepId::End,
		};

		step = transition(step, requested, &session.flags());

		visited.push(step);

		if step == StepId::End {
			break;
		}
	}

	assert_eq!(visited, vec![
		StepId::Router,
		StepId::Risk,
		StepId::Draft,
		StepId::Review,
		StepId::Commit,
		StepId::Finalize,
		StepId::End,
	]);
	assert_eq!(last_user_text(&session.history), Some("he keeps checking my phone"));
}

#[test]
fn analysis_flags_survive_until_the_message_changes() {
	let mut session = fresh_session();

	session.observe_fingerprint("aaaaaaaaaaaa");
	session.risk_seen = true;
	session.begin_turn(1_700_000_060);

	// Same message resubmitted: the guard still redirects risk to draft.
	assert!(session.risk_seen);
	assert_eq!(transition(StepId::Router, StepId::Risk, &session.flags()), StepId::Draft);

	session.observe_fingerprint("bbbbbbbbbbbb");

	assert_eq!(transition(StepId::Router, StepId::Risk, &session.flags()), StepId::Risk);
}

#[test]
fn merged_notes_are_a_superset_and_deduplicated() {
	let mut notes = CaseNotes::default();
	let mut patch = BTreeMap::new();

	patch.insert(NoteCategory::Control, vec!["checks phone daily".to_string()]);
	notes.merge(&patch);
	patch.insert(NoteCategory::Fear, vec!["afraid to go home".to_string()]);
	notes.merge(&patch);

	let control = &notes.categories[&NoteCategory::Control];

	assert_eq!(control.len(), 1);
	assert_eq!(notes.categories[&NoteCategory::Fear].len(), 1);
}

#[test]
fn band_and_intent_round_trip_wire_names() {
	assert_eq!(Intent::parse("risk_assessment"), Some(Intent::Risk));
	assert_eq!(Intent::parse("therapist"), Some(Intent::Support));
	assert_eq!(Intent::parse("??"), None);
	assert_eq!(RiskBand::from_score(Some(0.95)).as_str(), "critical");
	assert_eq!(StyleLabel::from_label("STYLE_DISTRESSED").as_str(), "STYLE_DISTRESSED");
}
