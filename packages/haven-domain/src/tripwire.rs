use regex::Regex;

/// Tier-1 deterministic crisis detector. A match bypasses intent
/// classification entirely and routes straight to the risk path; the caller's
/// ban list cannot suppress it.
#[derive(Debug)]
pub struct Tripwire {
	english: Regex,
	arabic: Regex,
}

/// Fixed confidence attached to a tripwire hit.
pub const TRIPWIRE_CONFIDENCE: f32 = 0.95;

const ENGLISH_PATTERNS: &[&str] = &[
	r"(?i)\b(kill myself|suicide|end my life|take my life|i don'?t want to live)\b",
	r"(?i)\b(overdose|took\s+\d+\s*(pills?|tablets?)|cut myself|self[-\s]?harm)\b",
	r"(?i)\b(kill|hurt)\s+(him|her|them|someone|people)\b",
	r"(?i)\b(i am in danger right now|he is outside my door|she is outside my door)\b",
];

const ARABIC_PATTERN: &str = "(انتحار|أنتحر|اقتُل نفسي|اقتل نفسي|أقتل نفسي|\
ما ?أبغى أعيش|لا أريد العيش|أنهي حياتي|\
أؤذي نفسي|جرحت نفسي|قطعت نفسي|\
سأقتل|بقتله|بقتلها|أقتله|أقتلها|أؤذيه|أؤذيها|\
هو عند الباب|واقف عند الباب|برا الباب|خارج الباب|\
يضربني( الآن| الحين)?)";

impl Tripwire {
	pub fn new() -> Result<Self, regex::Error> {
		let english = Regex::new(&ENGLISH_PATTERNS.join("|"))?;
		let arabic = Regex::new(ARABIC_PATTERN)?;

		Ok(Self { english, arabic })
	}

	pub fn fires(&self, text: &str) -> bool {
		if text.trim().is_empty() {
			return false;
		}

		self.english.is_match(text) || self.arabic.is_match(text)
	}
}
