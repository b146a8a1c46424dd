//! Lexical negation extraction: "not X", "excluding X", "except for X",
//! "other than X", "without X". Negation always wins over an accidental
//! positive match on the identical span.

use regex::Regex;

use crate::{
	catalog::EntityCatalog,
	entity::{EntityCategory, MatchedEntity, NegatedEntity},
	normalize::normalize,
};

/// Trailing filler that belongs to the sentence, not the entity.
const SPAN_TRAILERS: [&str; 7] =
	["law", "laws", "jurisdiction", "contracts", "contract", "agreements", "agreement"];

/// Jurisdiction names used to classify an excluded span when neither a
/// pattern hint nor catalog membership decides.
const KNOWN_JURISDICTIONS: [&str; 62] = [
	"alabama",
	"alaska",
	"arizona",
	"arkansas",
	"california",
	"colorado",
	"connecticut",
	"delaware",
	"florida",
	"georgia",
	"hawaii",
	"idaho",
	"illinois",
	"indiana",
	"iowa",
	"kansas",
	"kentucky",
	"louisiana",
	"maine",
	"maryland",
	"massachusetts",
	"michigan",
	"minnesota",
	"mississippi",
	"missouri",
	"montana",
	"nebraska",
	"nevada",
	"new_hampshire",
	"new_jersey",
	"new_mexico",
	"new_york",
	"north_carolina",
	"north_dakota",
	"ohio",
	"oklahoma",
	"oregon",
	"pennsylvania",
	"rhode_island",
	"south_carolina",
	"south_dakota",
	"tennessee",
	"texas",
	"utah",
	"vermont",
	"virginia",
	"washington",
	"west_virginia",
	"wisconsin",
	"wyoming",
	"district_of_columbia",
	"puerto_rico",
	"united_states",
	"united_kingdom",
	"england",
	"scotland",
	"canada",
	"germany",
	"france",
	"india",
	"singapore",
	"australia",
];

struct NegationPattern {
	regex: Regex,
	hint: Option<EntityCategory>,
}

pub struct NegationDetector {
	patterns: Vec<NegationPattern>,
}
impl Default for NegationDetector {
	fn default() -> Self {
		Self::new()
	}
}
impl NegationDetector {
	pub fn new() -> Self {
		// Ordered. More specific phrasings first so the bare "not X" pattern
		// only sees spans nothing earlier consumed.
		let specs: [(&str, Option<EntityCategory>); 9] = [
			(r"(?i)\bnot\s+governed\s+by\s+(?P<span>[\w][\w .,&'-]*?)(?:[,.;?!]|\s+(?:and|or|but)\b|$)", Some(EntityCategory::GoverningLaw)),
			(r"(?i)\bnot\s+under\s+(?P<span>[\w][\w .,&'-]*?)(?:\s+law[s]?\b|[,.;?!]|\s+(?:and|or|but)\b|$)", Some(EntityCategory::GoverningLaw)),
			(r"(?i)\bnot\s+in\s+(?P<span>[\w][\w .,&'-]*?)(?:[,.;?!]|\s+(?:and|or|but)\b|$)", Some(EntityCategory::GoverningLaw)),
			(r"(?i)\bnot\s+with\s+(?P<span>[\w][\w .,&'-]*?)(?:[,.;?!]|\s+(?:and|or|but)\b|$)", None),
			(r"(?i)\bnot\s+(?P<span>[\w][\w .,&'-]*?)(?:[,.;?!]|\s+(?:and|or|but)\b|$)", None),
			(r"(?i)\bexcluding\s+(?P<span>[\w][\w .,&'-]*?)(?:[,.;?!]|\s+(?:and|or|but)\b|$)", None),
			(r"(?i)\bexcept\s+(?:for\s+)?(?P<span>[\w][\w .,&'-]*?)(?:[,.;?!]|\s+(?:and|or|but)\b|$)", None),
			(r"(?i)\bother\s+than\s+(?P<span>[\w][\w .,&'-]*?)(?:[,.;?!]|\s+(?:and|or|but)\b|$)", None),
			(r"(?i)\bwithout\s+(?P<span>[\w][\w .,&'-]*?)(?:[,.;?!]|\s+(?:and|or|but)\b|$)", None),
		];
		let patterns = specs
			.into_iter()
			.filter_map(|(pattern, hint)| {
				Regex::new(pattern).ok().map(|regex| NegationPattern { regex, hint })
			})
			.collect();

		Self { patterns }
	}

	/// Extract every negated entity from `text`, classifying each span with
	/// the pattern hint, then catalog membership, then the static
	/// jurisdiction list. Governing law is the default when ambiguous.
	pub fn detect(&self, text: &str, catalog: &EntityCatalog) -> Vec<NegatedEntity> {
		let mut negations: Vec<NegatedEntity> = Vec::new();
		let mut consumed: Vec<(usize, usize)> = Vec::new();

		for pattern in &self.patterns {
			for captures in pattern.regex.captures_iter(text) {
				let Some(span) = captures.name("span") else {
					continue;
				};

				if consumed.iter().any(|&(s, e)| span.start() < e && s < span.end()) {
					continue;
				}

				let value = trim_trailers(&normalize(span.as_str()));

				if value.is_empty() {
					continue;
				}

				consumed.push((span.start(), span.end()));

				let category = classify(&value, pattern.hint, catalog);
				let negated = NegatedEntity { category, value };

				if !negations.contains(&negated) {
					negations.push(negated);
				}
			}
		}

		negations
	}
}

/// Drop positive entities the text also negates on the identical normalized
/// value in the same category. Negation wins.
pub fn prune_positives(
	positives: Vec<MatchedEntity>,
	negations: &[NegatedEntity],
) -> Vec<MatchedEntity> {
	positives
		.into_iter()
		.filter(|positive| {
			!negations
				.iter()
				.any(|negated| negated.category == positive.category && negated.value == positive.key)
		})
		.collect()
}

fn trim_trailers(normalized: &str) -> String {
	let mut tokens: Vec<&str> = crate::normalize::tokens(normalized).collect();

	while tokens.len() > 1 && SPAN_TRAILERS.contains(tokens.last().unwrap_or(&"")) {
		tokens.pop();
	}
	if tokens.len() == 1 && SPAN_TRAILERS.contains(&tokens[0]) {
		return String::new();
	}

	tokens.join("_")
}

fn classify(
	value: &str,
	hint: Option<EntityCategory>,
	catalog: &EntityCatalog,
) -> EntityCategory {
	if let Some(category) = hint {
		return category;
	}

	for category in EntityCategory::ALL {
		if catalog.contains(category, value) {
			return category;
		}
	}

	if KNOWN_JURISDICTIONS.contains(&value) {
		return EntityCategory::GoverningLaw;
	}

	EntityCategory::GoverningLaw
}
