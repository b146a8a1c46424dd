//! Cost-based access-path choice for a rule-based decision.

use serde::{Deserialize, Serialize};

use gavel_backends::{FilterTerm, Predicate};
use gavel_domain::{EntityCategory, MatchedEntity};

use crate::decision::{Decision, Strategy};

/// Entities at or above this confidence count as high-confidence for the
/// aggregation shortcut.
pub const HIGH_CONFIDENCE: f64 = 0.9;

/// Cost units. A point read is the unit; everything else is relative to it.
pub const POINT_READ_COST: f64 = 1.0;
pub const BATCH_READ_COST: f64 = 1.0;
pub const FILTERED_SCAN_BASE_COST: f64 = 3.0;
pub const GRAPH_TRAVERSAL_COST: f64 = 5.0;

pub const AGGREGATION_KEYWORDS: [&str; 6] =
	["how many", "count of", "total", "sum of", "average", "combined value"];
pub const ENTITY_FIRST_TRIGGERS: [&str; 5] =
	["contracts for", "contracts with", "documents for", "agreements with", "deals with"];
pub const RELATIONSHIP_KEYWORDS: [&str; 7] =
	["between", "related to", "connected", "relationship", "share", "in common", "linked"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathStrategy {
	EntityAggregation,
	EntityFirst,
	ContractDirect,
	GraphTraversal,
}
impl PathStrategy {
	pub fn as_decision_strategy(&self) -> Strategy {
		match self {
			Self::EntityAggregation => Strategy::EntityAggregation,
			Self::EntityFirst => Strategy::EntityFirst,
			Self::ContractDirect => Strategy::Direct,
			Self::GraphTraversal => Strategy::Graph,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationField {
	Count,
	Total,
	Average,
}
impl AggregationField {
	pub fn store_field(&self) -> &'static str {
		match self {
			Self::Count => "contract_count",
			// Average divides total by count after the read.
			Self::Total | Self::Average => "total_value",
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationTarget {
	pub category: EntityCategory,
	pub key: String,
	pub field: AggregationField,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityFirstTarget {
	pub category: EntityCategory,
	pub key: String,
}

/// Matched entity annotated with the resource identifier relationship-query
/// construction needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEntityRef {
	pub category: EntityCategory,
	pub key: String,
	pub resource_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphTarget {
	pub relation: String,
	pub entities: Vec<GraphEntityRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimalPath {
	pub strategy: PathStrategy,
	pub target_collection: String,
	pub predicate: Predicate,
	/// Fraction of the corpus expected to match, in [0, 1].
	pub selectivity: f64,
	pub estimated_cost: f64,
	pub missing_indexes: Vec<String>,
	pub aggregation: Option<AggregationTarget>,
	pub entity_first: Option<EntityFirstTarget>,
	pub graph: Option<GraphTarget>,
}

pub struct QueryOptimizer {
	indexed_fields: Vec<String>,
}
impl QueryOptimizer {
	pub fn new(indexed_fields: Vec<String>) -> Self {
		Self { indexed_fields }
	}

	/// Choose exactly one access path for the decision's entities and
	/// negations. First decisive rule wins.
	pub fn optimize(&self, decision: &Decision) -> OptimalPath {
		let text = decision.text.to_lowercase();
		let positives = &decision.positives;
		let negations = &decision.negations;
		let high_confidence: Vec<&MatchedEntity> =
			positives.iter().filter(|entity| entity.confidence >= HIGH_CONFIDENCE).collect();
		let categories = distinct_categories(positives);

		if let Some(field) = aggregation_field(&text)
			&& let [entity] = high_confidence.as_slice()
		{
			return self.finish(
				PathStrategy::EntityAggregation,
				entity.category.collection().to_string(),
				Predicate::default(),
				Some(AggregationTarget {
					category: entity.category,
					key: entity.key.clone(),
					field,
				}),
				None,
				None,
				POINT_READ_COST,
			);
		}

		// ENTITY_FIRST needs exactly one positive entity and a clean query; a
		// lone negation can never take this path.
		if let [entity] = positives.as_slice()
			&& negations.is_empty()
			&& ENTITY_FIRST_TRIGGERS.iter().any(|trigger| text.contains(trigger))
		{
			return self.finish(
				PathStrategy::EntityFirst,
				entity.category.collection().to_string(),
				Predicate::default(),
				None,
				Some(EntityFirstTarget { category: entity.category, key: entity.key.clone() }),
				None,
				POINT_READ_COST + BATCH_READ_COST,
			);
		}

		let composite_trigger =
			categories.len() + negations.len() >= 2 || (negations.len() == 1 && positives.is_empty());

		if composite_trigger {
			let predicate = build_predicate(positives, negations);
			let cost = FILTERED_SCAN_BASE_COST + 50.0 * selectivity(&predicate);

			return self.finish(
				PathStrategy::ContractDirect,
				"contracts".to_string(),
				predicate,
				None,
				None,
				None,
				cost,
			);
		}

		if let Some(relation) = detect_relation(&text) {
			let entities = positives
				.iter()
				.map(|entity| GraphEntityRef {
					category: entity.category,
					key: entity.key.clone(),
					resource_id: format!("{}/{}", entity.category.collection(), entity.key),
				})
				.collect();

			return self.finish(
				PathStrategy::GraphTraversal,
				"graph".to_string(),
				Predicate::default(),
				None,
				None,
				Some(GraphTarget { relation: relation.to_string(), entities }),
				GRAPH_TRAVERSAL_COST,
			);
		}

		let predicate = build_predicate(positives, negations);
		let cost = FILTERED_SCAN_BASE_COST + 50.0 * selectivity(&predicate);

		self.finish(
			PathStrategy::ContractDirect,
			"contracts".to_string(),
			predicate,
			None,
			None,
			None,
			cost,
		)
	}

	/// Advisory notes for predicate fields the store has no index for.
	pub fn missing_indexes(&self, predicate: &Predicate) -> Vec<String> {
		predicate
			.fields()
			.into_iter()
			.filter(|field| !self.indexed_fields.iter().any(|indexed| indexed == field))
			.map(|field| format!("missing index on {field}"))
			.collect()
	}

	#[allow(clippy::too_many_arguments)]
	fn finish(
		&self,
		strategy: PathStrategy,
		target_collection: String,
		predicate: Predicate,
		aggregation: Option<AggregationTarget>,
		entity_first: Option<EntityFirstTarget>,
		graph: Option<GraphTarget>,
		estimated_cost: f64,
	) -> OptimalPath {
		let missing_indexes = self.missing_indexes(&predicate);

		OptimalPath {
			strategy,
			target_collection,
			selectivity: selectivity(&predicate),
			predicate,
			estimated_cost,
			missing_indexes,
			aggregation,
			entity_first,
			graph,
		}
	}
}

pub fn aggregation_field(text: &str) -> Option<AggregationField> {
	if text.contains("average") {
		return Some(AggregationField::Average);
	}
	if text.contains("how many") || text.contains("count of") {
		return Some(AggregationField::Count);
	}
	if AGGREGATION_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
		return Some(AggregationField::Total);
	}

	None
}

pub fn detect_relation(text: &str) -> Option<&'static str> {
	if !RELATIONSHIP_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
		return None;
	}
	if text.contains("share") || text.contains("in common") {
		return Some("shares_party");
	}
	if text.contains("jurisdiction") {
		return Some("governed_by");
	}

	Some("party_to")
}

/// Each positive entity becomes an equality term; each negated entity an
/// inequality term. Multiple positives in the same category become an OR of
/// equality terms on the shared field.
pub fn build_predicate(
	positives: &[MatchedEntity],
	negations: &[gavel_domain::NegatedEntity],
) -> Predicate {
	let mut terms: Vec<FilterTerm> = Vec::new();

	for entity in positives {
		terms.push(FilterTerm::eq(entity.category.field(), entity.key.clone()));
	}
	for negated in negations {
		terms.push(FilterTerm::ne(negated.category.field(), negated.value.clone()));
	}

	Predicate::new(terms)
}

/// 0.1 for a single filter, 0.5/n for several, 1.0 for none.
pub fn selectivity(predicate: &Predicate) -> f64 {
	match predicate.len() {
		0 => 1.0,
		1 => 0.1,
		n => 0.5 / n as f64,
	}
}

fn distinct_categories(positives: &[MatchedEntity]) -> Vec<EntityCategory> {
	let mut categories = Vec::new();

	for entity in positives {
		if !categories.contains(&entity.category) {
			categories.push(entity.category);
		}
	}

	categories
}

#[cfg(test)]
mod tests {
	use gavel_backends::FilterOp;
	use gavel_domain::{MatchProvenance, NegatedEntity};

	use super::*;
	use crate::decision::SelectionAlgorithm;

	fn entity(category: EntityCategory, key: &str, confidence: f64) -> MatchedEntity {
		MatchedEntity {
			category,
			key: key.to_string(),
			display_name: key.to_string(),
			confidence,
			provenance: if confidence >= 1.0 {
				MatchProvenance::Exact
			} else {
				MatchProvenance::Fuzzy
			},
			contract_count: 3,
			total_value: 1_000.0,
		}
	}

	fn decision(
		text: &str,
		positives: Vec<MatchedEntity>,
		negations: Vec<NegatedEntity>,
	) -> Decision {
		Decision {
			text: text.to_string(),
			positives,
			negations,
			strategy: Strategy::Direct,
			algorithm: SelectionAlgorithm::PhraseMatch,
			confidence: 0.85,
			fuzzy_candidates: vec![],
			llm_plan: None,
		}
	}

	fn optimizer() -> QueryOptimizer {
		QueryOptimizer::new(vec![
			"contract_id".to_string(),
			"contractor_party".to_string(),
			"governing_law".to_string(),
		])
	}

	#[test]
	fn aggregation_with_one_high_confidence_entity() {
		let path = optimizer().optimize(&decision(
			"How many contracts does Microsoft have?",
			vec![entity(EntityCategory::ContractorParty, "microsoft", 1.0)],
			vec![],
		));

		assert_eq!(path.strategy, PathStrategy::EntityAggregation);
		assert_eq!(path.estimated_cost, POINT_READ_COST);

		let aggregation = path.aggregation.expect("aggregation target must be set");

		assert_eq!(aggregation.field, AggregationField::Count);
		assert_eq!(aggregation.key, "microsoft");
	}

	#[test]
	fn single_entity_with_trigger_takes_entity_first() {
		let path = optimizer().optimize(&decision(
			"Show all contracts for Acme",
			vec![entity(EntityCategory::ContractorParty, "acme", 1.0)],
			vec![],
		));

		assert_eq!(path.strategy, PathStrategy::EntityFirst);
		assert_eq!(path.entity_first.expect("target must be set").key, "acme");
	}

	#[test]
	fn lone_negation_never_takes_entity_first() {
		let path = optimizer().optimize(&decision(
			"Show contracts not governed by Alabama",
			vec![],
			vec![NegatedEntity {
				category: EntityCategory::GoverningLaw,
				value: "alabama".to_string(),
			}],
		));

		assert_eq!(path.strategy, PathStrategy::ContractDirect);
		assert_eq!(path.predicate.terms.len(), 1);
		assert_eq!(path.predicate.terms[0].op, FilterOp::Ne);
	}

	#[test]
	fn mixed_entities_and_negations_build_composite_predicate() {
		let path = optimizer().optimize(&decision(
			"Service agreements with Acme excluding Delaware",
			vec![
				entity(EntityCategory::ContractorParty, "acme", 1.0),
				entity(EntityCategory::ContractType, "service_agreement", 1.0),
			],
			vec![NegatedEntity {
				category: EntityCategory::GoverningLaw,
				value: "delaware".to_string(),
			}],
		));

		assert_eq!(path.strategy, PathStrategy::ContractDirect);
		assert_eq!(path.predicate.terms.len(), 3);
		assert_eq!(path.selectivity, 0.5 / 3.0);
	}

	#[test]
	fn multiple_same_category_entities_stay_contract_direct() {
		// Policy: same-category positives combine into an OR of equality
		// terms rather than a batched entity lookup.
		let path = optimizer().optimize(&decision(
			"Contracts for Acme, Globex, or Initech",
			vec![
				entity(EntityCategory::ContractorParty, "acme", 1.0),
				entity(EntityCategory::ContractorParty, "globex", 1.0),
				entity(EntityCategory::ContractorParty, "initech", 1.0),
			],
			vec![],
		));

		assert_eq!(path.strategy, PathStrategy::ContractDirect);
		assert_eq!(
			path.predicate.terms.iter().filter(|term| term.op == FilterOp::Eq).count(),
			3
		);
	}

	#[test]
	fn relationship_keyword_takes_graph_traversal() {
		let path = optimizer().optimize(&decision(
			"Which contracts share a party with Acme?",
			vec![entity(EntityCategory::ContractorParty, "acme", 1.0)],
			vec![],
		));

		assert_eq!(path.strategy, PathStrategy::GraphTraversal);

		let graph = path.graph.expect("graph target must be set");

		assert_eq!(graph.relation, "shares_party");
		assert_eq!(graph.entities[0].resource_id, "contractor_parties/acme");
	}

	#[test]
	fn empty_decision_defaults_to_bounded_scan() {
		let path = optimizer().optimize(&decision("anything at all", vec![], vec![]));

		assert_eq!(path.strategy, PathStrategy::ContractDirect);
		assert!(path.predicate.is_empty());
		assert_eq!(path.selectivity, 1.0);
	}

	#[test]
	fn unindexed_fields_are_flagged() {
		let path = optimizer().optimize(&decision(
			"NDAs excluding Delaware",
			vec![entity(EntityCategory::ContractType, "nda", 1.0)],
			vec![NegatedEntity {
				category: EntityCategory::GoverningLaw,
				value: "delaware".to_string(),
			}],
		));

		assert_eq!(path.missing_indexes, vec!["missing index on contract_type"]);
	}
}
