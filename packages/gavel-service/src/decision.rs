use std::fmt;

use serde::{Deserialize, Serialize};

use gavel_domain::{FuzzyCandidate, MatchedEntity, NegatedEntity};

use crate::llm_planner::LlmPlan;

/// Backend access pattern chosen for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
	Direct,
	EntityFirst,
	EntityAggregation,
	Graph,
	Vector,
}
impl Strategy {
	pub const ALL: [Self; 5] =
		[Self::Direct, Self::EntityFirst, Self::EntityAggregation, Self::Graph, Self::Vector];

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Direct => "DIRECT",
			Self::EntityFirst => "ENTITY_FIRST",
			Self::EntityAggregation => "ENTITY_AGGREGATION",
			Self::Graph => "GRAPH",
			Self::Vector => "VECTOR",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		let normalized = raw.trim().to_uppercase().replace('-', "_");

		Self::ALL.into_iter().find(|strategy| strategy.as_str() == normalized)
	}
}
impl fmt::Display for Strategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Which rule of the decision procedure produced the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionAlgorithm {
	IdMatch,
	PhraseMatch,
	EntityHeuristic,
	LlmClassifier,
	LlmFallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
	pub text: String,
	pub positives: Vec<MatchedEntity>,
	pub negations: Vec<NegatedEntity>,
	pub strategy: Strategy,
	pub algorithm: SelectionAlgorithm,
	pub confidence: f64,
	/// Fuzzy candidates retained for offline review; never used to filter.
	pub fuzzy_candidates: Vec<FuzzyCandidate>,
	pub llm_plan: Option<LlmPlan>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_every_strategy_name() {
		for strategy in Strategy::ALL {
			assert_eq!(Strategy::parse(strategy.as_str()), Some(strategy));
		}

		assert_eq!(Strategy::parse(" entity-first "), Some(Strategy::EntityFirst));
		assert_eq!(Strategy::parse("HYBRID"), None);
	}
}
