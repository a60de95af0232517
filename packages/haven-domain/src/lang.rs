use serde::{Deserialize, Serialize};

/// Coarse language hint attached to each user turn. Drives prompt language
/// selection and regex tier ordering; it never gates routing on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LangHint {
	Arabic,
	#[default]
	English,
	Other,
}

impl LangHint {
	/// Detects the dominant language of `text`. Short or mixed inputs confuse
	/// statistical detection, so any Arabic-script codepoint forces
	/// [`LangHint::Arabic`] first.
	pub fn detect(text: &str) -> Self {
		if text.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c)) {
			return Self::Arabic;
		}

		match whatlang::detect_lang(text) {
			Some(whatlang::Lang::Ara) => Self::Arabic,
			Some(whatlang::Lang::Eng) | None => Self::English,
			Some(_) => Self::Other,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Arabic => "ar",
			Self::English => "en",
			Self::Other => "other",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn arabic_script_wins_over_detection() {
		assert_eq!(LangHint::detect("ساعدني من فضلك"), LangHint::Arabic);
	}

	#[test]
	fn plain_english_detected() {
		assert_eq!(
			LangHint::detect("I need help with my situation at home tonight."),
			LangHint::English
		);
	}

	#[test]
	fn empty_defaults_to_english() {
		assert_eq!(LangHint::detect(""), LangHint::English);
	}
}
