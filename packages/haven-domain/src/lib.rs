pub mod lang;
pub mod notes;
pub mod retry;
pub mod session;
pub mod step;
pub mod tripwire;

pub use lang::LangHint;
pub use notes::{CaseNotes, CaseNotesPatch, NoteCategory, TimelineEvent};
pub use retry::{RetryCounter, RetryPolicy};
pub use session::{
	RiskBand, RiskState, Role, SessionState, StyleLabel, StyleState, Turn, fingerprint,
	history_window, last_user_text,
};
pub use step::{Intent, StepId, TurnFlags, entry_step, transition};
pub use tripwire::Tripwire;
