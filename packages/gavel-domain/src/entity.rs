use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
	ContractorParty,
	ContractingParty,
	GoverningLaw,
	ContractType,
	ClauseType,
}
impl EntityCategory {
	pub const ALL: [Self; 5] = [
		Self::ContractorParty,
		Self::ContractingParty,
		Self::GoverningLaw,
		Self::ContractType,
		Self::ClauseType,
	];

	/// Store collection holding the per-entity catalog records.
	pub fn collection(&self) -> &'static str {
		match self {
			Self::ContractorParty => "contractor_parties",
			Self::ContractingParty => "contracting_parties",
			Self::GoverningLaw => "governing_laws",
			Self::ContractType => "contract_types",
			Self::ClauseType => "clause_types",
		}
	}

	/// Contract-document field this category filters on.
	pub fn field(&self) -> &'static str {
		match self {
			Self::ContractorParty => "contractor_party",
			Self::ContractingParty => "contracting_party",
			Self::GoverningLaw => "governing_law",
			Self::ContractType => "contract_type",
			Self::ClauseType => "clause_type",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
	/// Normalized name, unique within a category.
	pub key: String,
	pub display_name: String,
	pub category: EntityCategory,
	pub document_ids: Vec<String>,
	/// Always equals `document_ids.len()`; stored so aggregation reads stay a
	/// single point lookup.
	pub contract_count: usize,
	pub total_value: f64,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl EntityRecord {
	pub fn new(
		key: String,
		display_name: String,
		category: EntityCategory,
		document_id: String,
		value: f64,
		now: OffsetDateTime,
	) -> Self {
		Self {
			key,
			display_name,
			category,
			document_ids: vec![document_id],
			contract_count: 1,
			total_value: value,
			created_at: now,
			updated_at: now,
		}
	}

	/// Pure merge. Returns the patched record; the receiver is untouched.
	/// Re-applying a patch whose `add_document_id` is already present changes
	/// neither the count nor the running total.
	pub fn apply(&self, patch: &EntityRecordPatch, now: OffsetDateTime) -> Self {
		let mut next = self.clone();

		if let Some(display_name) = &patch.display_name {
			next.display_name = display_name.clone();
		}
		if let Some(document_id) = &patch.add_document_id
			&& !next.document_ids.iter().any(|id| id == document_id)
		{
			next.document_ids.push(document_id.clone());
			next.total_value += patch.add_value.unwrap_or(0.0);
		}

		next.contract_count = next.document_ids.len();
		next.updated_at = now;

		next
	}
}

/// Partial update with named optional fields, applied through
/// [`EntityRecord::apply`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityRecordPatch {
	pub display_name: Option<String>,
	pub add_document_id: Option<String>,
	pub add_value: Option<f64>,
}
impl EntityRecordPatch {
	/// Patch fields that change what downstream evaluation sees; a patch
	/// touching none of these never marks dependents stale.
	pub const EVALUATION_FIELDS: [&'static str; 2] = ["add_document_id", "add_value"];

	pub fn affects_evaluation(&self) -> bool {
		self.add_document_id.is_some() || self.add_value.is_some()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchProvenance {
	Exact,
	FullContainment,
	Fuzzy,
}

/// A positive entity resolved from query text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedEntity {
	pub category: EntityCategory,
	pub key: String,
	pub display_name: String,
	pub confidence: f64,
	pub provenance: MatchProvenance,
	pub contract_count: usize,
	pub total_value: f64,
}

/// An entity the query explicitly excludes. `value` is normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegatedEntity {
	pub category: EntityCategory,
	pub value: String,
}
