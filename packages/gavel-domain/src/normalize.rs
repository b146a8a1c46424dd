//! Deterministic entity-name normalization. The same display text always maps
//! to the same catalog key, and `normalize(normalize(x)) == normalize(x)`.

/// Organizational suffixes stripped from the tail of a name. Tail tokens only,
/// never mid-string.
const ORG_SUFFIXES: [&str; 16] = [
	"llc",
	"llp",
	"lp",
	"inc",
	"incorporated",
	"corp",
	"corporation",
	"ltd",
	"limited",
	"co",
	"company",
	"plc",
	"gmbh",
	"group",
	"holdings",
	"international",
];

pub const SEPARATOR: char = '_';

/// Lowercase, collapse non-alphanumeric runs into a single separator, drop a
/// leading "the", and strip organizational suffixes from the tail. Suffixes
/// are popped until the tail is not a suffix, which is what keeps the
/// function idempotent ("x group llc" and "x group" must both land on "x").
pub fn normalize(name: &str) -> String {
	let lowered = name.to_lowercase();
	let mut tokens: Vec<&str> =
		lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).collect();

	if tokens.len() > 1 && tokens[0] == "the" {
		tokens.remove(0);
	}

	while tokens.len() > 1 && ORG_SUFFIXES.contains(tokens.last().unwrap_or(&"")) {
		tokens.pop();
	}

	tokens.join(&SEPARATOR.to_string())
}

pub fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
	normalized.split(SEPARATOR).filter(|t| !t.is_empty())
}
