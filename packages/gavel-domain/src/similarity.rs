//! Fuzzy name similarity: Jaro-Winkler blended with token-set Jaccard, plus a
//! small bonus when a Soundex check agrees.

use ahash::AHashSet;

use crate::normalize::{self, normalize};

const EDIT_WEIGHT: f64 = 0.7;
const JACCARD_WEIGHT: f64 = 0.3;
const PHONETIC_BONUS: f64 = 0.10;

/// Similarity of two display names in [0, 1]. Exact match of normalized forms
/// is always 1.0, regardless of the blended components.
pub fn similarity(a: &str, b: &str) -> f64 {
	similarity_normalized(&normalize(a), &normalize(b))
}

/// Same as [`similarity`] but for inputs already in normalized form.
pub fn similarity_normalized(a: &str, b: &str) -> f64 {
	if a == b {
		return 1.0;
	}

	let edit = strsim::jaro_winkler(a, b);
	let jaccard = token_jaccard(a, b);
	let blended = EDIT_WEIGHT * edit + JACCARD_WEIGHT * jaccard;

	if phonetic_agrees(a, b) { (blended + PHONETIC_BONUS).min(1.0) } else { blended }
}

/// Order-independent token-set overlap.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
	let ta: AHashSet<&str> = normalize::tokens(a).collect();
	let tb: AHashSet<&str> = normalize::tokens(b).collect();

	if ta.is_empty() && tb.is_empty() {
		return 1.0;
	}

	let intersection = ta.intersection(&tb).count();
	let union = ta.union(&tb).count();

	intersection as f64 / union as f64
}

/// True iff every normalized token of `input` longer than 2 characters also
/// appears among `candidate`'s normalized tokens. Inputs with no qualifying
/// token never count as contained.
pub fn all_tokens_present(input: &str, candidate: &str) -> bool {
	let candidate_tokens: AHashSet<&str> = normalize::tokens(candidate).collect();
	let mut qualifying = normalize::tokens(input).filter(|t| t.len() > 2).peekable();

	if qualifying.peek().is_none() {
		return false;
	}

	qualifying.all(|t| candidate_tokens.contains(t))
}

fn phonetic_agrees(a: &str, b: &str) -> bool {
	let ca: Vec<String> = normalize::tokens(a).map(soundex).collect();
	let cb: Vec<String> = normalize::tokens(b).map(soundex).collect();

	!ca.is_empty() && ca == cb
}

/// American Soundex over a single token: first letter plus three digits.
pub fn soundex(token: &str) -> String {
	let mut chars = token.chars().filter(char::is_ascii_alphabetic);
	let Some(first) = chars.next() else {
		return String::new();
	};
	let mut code = String::with_capacity(4);

	code.push(first.to_ascii_uppercase());

	let mut last = soundex_digit(first);

	for c in chars {
		match soundex_digit(c) {
			Some(digit) if Some(digit) != last => {
				code.push(char::from_digit(digit, 10).unwrap_or('0'));

				if code.len() == 4 {
					break;
				}

				last = Some(digit);
			},
			Some(_) => {},
			// Vowels reset the run; h and w are transparent.
			None =>
				if !matches!(c.to_ascii_lowercase(), 'h' | 'w') {
					last = None;
				},
		}
	}

	while code.len() < 4 {
		code.push('0');
	}

	code
}

fn soundex_digit(c: char) -> Option<u32> {
	match c.to_ascii_lowercase() {
		'b' | 'f' | 'p' | 'v' => Some(1),
		'c' | 'g' | 'j' | 'k' | 'q' | 's' | 'x' | 'z' => Some(2),
		'd' | 't' => Some(3),
		'l' => Some(4),
		'm' | 'n' => Some(5),
		'r' => Some(6),
		_ => None,
	}
}
