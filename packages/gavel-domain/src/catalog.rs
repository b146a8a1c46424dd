//! In-memory, append-mostly index of known named entities with fuzzy lookup.
//!
//! Built once at startup from persisted records and read-only during query
//! processing; ingestion-time updates go through [`EntityCatalog::update_or_create`].

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
	entity::{EntityCategory, EntityRecord, MatchProvenance, MatchedEntity},
	normalize::normalize,
	similarity::{all_tokens_present, similarity_normalized},
};

/// Similarity at or above this is a confirmed match.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.85;
/// Added to confidence when every qualifying input token appears in the
/// candidate, capped at 1.0.
pub const CONTAINMENT_BONUS: f64 = 0.10;
/// Comparisons below the match threshold but at or above this floor are kept
/// as fuzzy candidates for offline review. Never used to filter.
pub const CANDIDATE_FLOOR: f64 = 0.5;

const MAX_SPAN_TOKENS: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyCandidate {
	pub category: EntityCategory,
	pub key: String,
	pub display_name: String,
	pub score: f64,
	pub span: String,
}

/// One record-level comparison, for offline review of matcher behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonAudit {
	pub category: EntityCategory,
	pub candidate_key: String,
	pub span: String,
	pub score: f64,
	pub confirmed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Identification {
	pub confirmed: Vec<MatchedEntity>,
	pub candidates: Vec<FuzzyCandidate>,
	pub audit: Vec<ComparisonAudit>,
}

#[derive(Debug, Clone)]
pub struct EntityCatalog {
	match_threshold: f64,
	records: AHashMap<EntityCategory, AHashMap<String, EntityRecord>>,
}
impl Default for EntityCatalog {
	fn default() -> Self {
		Self::new(DEFAULT_MATCH_THRESHOLD)
	}
}
impl EntityCatalog {
	pub fn new(match_threshold: f64) -> Self {
		Self { match_threshold, records: AHashMap::new() }
	}

	pub fn from_records(
		match_threshold: f64,
		records: impl IntoIterator<Item = EntityRecord>,
	) -> Self {
		let mut catalog = Self::new(match_threshold);

		for record in records {
			catalog.insert(record);
		}

		catalog
	}

	pub fn insert(&mut self, record: EntityRecord) {
		self.records.entry(record.category).or_default().insert(record.key.clone(), record);
	}

	pub fn get(&self, category: EntityCategory, key: &str) -> Option<&EntityRecord> {
		self.records.get(&category).and_then(|by_key| by_key.get(key))
	}

	pub fn contains(&self, category: EntityCategory, key: &str) -> bool {
		self.get(category, key).is_some()
	}

	pub fn len(&self) -> usize {
		self.records.values().map(|by_key| by_key.len()).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn records_in(&self, category: EntityCategory) -> impl Iterator<Item = &EntityRecord> {
		self.records.get(&category).into_iter().flat_map(|by_key| by_key.values())
	}

	/// Resolve every known entity referenced by `text`.
	///
	/// Returns confirmed matches (ordered by full-containment, then
	/// confidence, then candidate-name length), below-threshold fuzzy
	/// candidates, and the full comparison audit.
	pub fn identify(&self, text: &str) -> Identification {
		let spans = candidate_spans(text);
		let mut out = Identification::default();

		if spans.is_empty() {
			return out;
		}

		for category in EntityCategory::ALL {
			for record in self.records_in(category) {
				let Some(comparison) = best_comparison(record, &spans) else {
					continue;
				};

				let confirmed = comparison.confidence >= self.match_threshold;

				out.audit.push(ComparisonAudit {
					category,
					candidate_key: record.key.clone(),
					span: comparison.span.clone(),
					score: comparison.confidence,
					confirmed,
				});

				if confirmed {
					out.confirmed.push(MatchedEntity {
						category,
						key: record.key.clone(),
						display_name: record.display_name.clone(),
						confidence: comparison.confidence,
						provenance: comparison.provenance,
						contract_count: record.contract_count,
						total_value: record.total_value,
					});
				} else if comparison.confidence >= CANDIDATE_FLOOR {
					out.candidates.push(FuzzyCandidate {
						category,
						key: record.key.clone(),
						display_name: record.display_name.clone(),
						score: comparison.confidence,
						span: comparison.span,
					});
				}
			}
		}

		out.confirmed.sort_by(|a, b| {
			let a_contained = a.provenance != MatchProvenance::Fuzzy;
			let b_contained = b.provenance != MatchProvenance::Fuzzy;

			b_contained
				.cmp(&a_contained)
				.then(b.confidence.total_cmp(&a.confidence))
				.then(b.display_name.len().cmp(&a.display_name.len()))
		});
		out.candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

		out
	}

	/// Record one observation of `display_name` in `document_id`.
	///
	/// Creates the record on first observation, otherwise updates in place.
	/// Calling twice with the same `(category, document_id)` changes neither
	/// the count nor the running total.
	pub fn update_or_create(
		&mut self,
		category: EntityCategory,
		display_name: &str,
		document_id: &str,
		value: f64,
		now: OffsetDateTime,
	) -> &EntityRecord {
		let key = normalize(display_name);
		let by_key = self.records.entry(category).or_default();

		by_key
			.entry(key.clone())
			.and_modify(|record| {
				if !record.document_ids.iter().any(|id| id == document_id) {
					record.document_ids.push(document_id.to_string());
					record.total_value += value;
				}

				record.contract_count = record.document_ids.len();
				record.updated_at = now;
			})
			.or_insert_with(|| {
				EntityRecord::new(
					key,
					display_name.to_string(),
					category,
					document_id.to_string(),
					value,
					now,
				)
			})
	}
}

struct SpanComparison {
	span: String,
	confidence: f64,
	provenance: MatchProvenance,
}

/// Best comparison between one record and any candidate span of the text.
fn best_comparison(record: &EntityRecord, spans: &[String]) -> Option<SpanComparison> {
	let mut best: Option<SpanComparison> = None;

	for span in spans {
		let base = similarity_normalized(span, &record.key);
		let contained = all_tokens_present(span, &record.key);
		let confidence =
			if contained { (base + CONTAINMENT_BONUS).min(1.0) } else { base };
		let provenance = if span == &record.key {
			MatchProvenance::Exact
		} else if contained {
			MatchProvenance::FullContainment
		} else {
			MatchProvenance::Fuzzy
		};

		let better = best.as_ref().is_none_or(|current| {
			confidence > current.confidence
				|| (confidence == current.confidence
					&& provenance == MatchProvenance::Exact
					&& current.provenance != MatchProvenance::Exact)
		});

		if better {
			best = Some(SpanComparison { span: span.clone(), confidence, provenance });
		}
	}

	best
}

/// Normalized token n-grams of the text, up to [`MAX_SPAN_TOKENS`] tokens.
fn candidate_spans(text: &str) -> Vec<String> {
	let lowered = text.to_lowercase();
	let words: Vec<&str> =
		lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();
	let mut spans = Vec::new();

	for width in 1..=MAX_SPAN_TOKENS.min(words.len()) {
		for window in words.windows(width) {
			let span = normalize(&window.join(" "));

			if !span.is_empty() && !spans.contains(&span) {
				spans.push(span);
			}
		}
	}

	spans
}
