//! Reply localization. The finalize step asks the model to rewrite the
//! approved draft in a natural human register for the reply language; this
//! module holds the deterministic guards around that rewrite: marker
//! preservation, the service glossary, script checking, and output bounds.

use regex::{Regex, RegexBuilder};

use haven_domain::LangHint;

const MAX_SENTENCES: usize = 7;
const MAX_CHARS: usize = 900;

/// Terms the service never lets a reply use, regardless of what the model
/// writes. Matching is case-insensitive; replacements keep the survivor-first
/// register in both languages.
const GLOSSARY: &[(&str, &str)] = &[
	("domestic violence", "domestic abuse"),
	("victim", "survivor"),
	("why did you", "it makes sense that you"),
	("العنف المنزلي", "العنف الأسري"),
	("ضحية", "ناجية"),
];

pub(crate) struct Localizer {
	url: Regex,
	citation: Regex,
	number: Regex,
	glossary: Vec<(Regex, &'static str)>,
}

impl Localizer {
	pub(crate) fn new() -> Result<Self, regex::Error> {
		let glossary = GLOSSARY
			.iter()
			.map(|(from, to)| {
				RegexBuilder::new(&regex::escape(from))
					.case_insensitive(true)
					.build()
					.map(|re| (re, *to))
			})
			.collect::<Result<_, _>>()?;

		Ok(Self {
			url: Regex::new(r"https?://[^\s)\]]+")?,
			citation: Regex::new(r"\[\d+\]")?,
			number: Regex::new(r"\d(?:[\d,.:]*\d)?")?,
			glossary,
		})
	}

	/// Any URL, citation, or number present in the source but dropped by the
	/// rewrite is appended to the tail, so a friendlier phrasing never loses
	/// a hotline number or a cited reference.
	pub(crate) fn ensure_markers(&self, localized: &str, source: &str) -> String {
		let mut out = localized.to_owned();

		for regex in [&self.url, &self.citation, &self.number] {
			for marker in regex.find_iter(source) {
				if !out.contains(marker.as_str()) {
					if !out.ends_with(char::is_whitespace) {
						out.push(' ');
					}

					out.push_str(marker.as_str());
				}
			}
		}

		out
	}

	pub(crate) fn apply_glossary(&self, text: &str) -> String {
		self.glossary
			.iter()
			.fold(text.to_owned(), |acc, (regex, replacement)| {
				regex.replace_all(&acc, *replacement).into_owned()
			})
	}

	/// An Arabic reply must carry Arabic script and an English one must not;
	/// a mismatch means the model answered in the wrong language.
	pub(crate) fn language_mismatch(&self, text: &str, lang: LangHint) -> bool {
		match lang {
			LangHint::Arabic => !has_arabic_script(text),
			LangHint::English => has_arabic_script(text),
			LangHint::Other => false,
		}
	}

	/// Collapses whitespace, bounds the reply to [`MAX_SENTENCES`] sentences
	/// and [`MAX_CHARS`] characters, and prefixes the direction mark for the
	/// reply language so mixed-script tails render correctly.
	pub(crate) fn finish(&self, text: &str, lang: LangHint) -> String {
		let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
		let clipped = clip(&collapsed);
		let mark = match lang {
			LangHint::Arabic => '\u{200F}',
			_ => '\u{200E}',
		};

		format!("{mark}{clipped}")
	}
}

fn has_arabic_script(text: &str) -> bool {
	text.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c))
}

fn is_sentence_end(c: char) -> bool {
	matches!(c, '.' | '!' | '?' | '؟')
}

/// Hard clip. Sentence boundaries are scanned by hand because the ender set
/// includes the Arabic question mark; past the bounds the text is cut at a
/// character boundary with an ellipsis.
fn clip(text: &str) -> String {
	let mut sentences = 0;
	let mut end = text.len();

	for (idx, c) in text.char_indices() {
		if is_sentence_end(c) {
			sentences += 1;

			if sentences == MAX_SENTENCES {
				end = idx + c.len_utf8();

				break;
			}
		}
	}

	let mut out = text[..end].trim_end().to_owned();

	if out.chars().count() > MAX_CHARS {
		out = out.chars().take(MAX_CHARS).collect();
		out.push('…');
	} else if end < text.len() {
		out.push('…');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn localizer() -> Localizer {
		Localizer::new().expect("patterns compile")
	}

	#[test]
	fn dropped_markers_are_restored_at_the_tail() {
		let source = "Call 1800 737 732 or see https://respect.org.au [1].";
		let rewrite = "You can reach out to the helpline whenever you feel ready.";
		let restored = localizer().ensure_markers(rewrite, source);

		assert!(restored.contains("https://respect.org.au"));
		assert!(restored.contains("[1]"));
		assert!(restored.contains("1800"));
		assert!(restored.starts_with(rewrite));
	}

	#[test]
	fn markers_already_present_are_not_duplicated() {
		let source = "See https://example.org for more.";
		let rewrite = "There is more at https://example.org whenever you want it.";
		let restored = localizer().ensure_markers(rewrite, source);

		assert_eq!(restored.matches("https://example.org").count(), 1);
	}

	#[test]
	fn glossary_replaces_case_insensitively() {
		let localizer = localizer();

		assert_eq!(
			localizer.apply_glossary("You are not a Victim of domestic violence."),
			"You are not a survivor of domestic abuse.",
		);
		assert_eq!(localizer.apply_glossary("لست ضحية"), "لست ناجية");
	}

	#[test]
	fn script_mismatch_is_detected_per_language() {
		let localizer = localizer();

		assert!(localizer.language_mismatch("I hear you.", LangHint::Arabic));
		assert!(localizer.language_mismatch("أنا أسمعك.", LangHint::English));
		assert!(!localizer.language_mismatch("أنا أسمعك.", LangHint::Arabic));
	}

	#[test]
	fn finish_bounds_sentences_and_marks_direction() {
		let long = "One. Two. Three. Four. Five. Six. Seven. Eight. Nine.";
		let finished = localizer().finish(long, LangHint::English);

		assert!(finished.starts_with('\u{200E}'));
		assert!(finished.ends_with("Seven.…"));

		let arabic = localizer().finish("أنا هنا.", LangHint::Arabic);

		assert!(arabic.starts_with('\u{200F}'));
	}

	#[test]
	fn finish_collapses_whitespace_and_caps_length() {
		let long = "a".repeat(1_200);
		let finished = localizer().finish(&long, LangHint::English);

		// Direction mark, then the cap, then the ellipsis.
		assert_eq!(finished.chars().count(), 1 + MAX_CHARS + 1);
		assert_eq!(
			localizer().finish("too   many\n\nspaces", LangHint::English),
			"\u{200E}too many spaces",
		);
	}
}
