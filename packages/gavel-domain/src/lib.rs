pub mod catalog;
pub mod entity;
pub mod negation;
pub mod normalize;
pub mod similarity;

pub use catalog::{
	CANDIDATE_FLOOR, CONTAINMENT_BONUS, ComparisonAudit, DEFAULT_MATCH_THRESHOLD, EntityCatalog,
	FuzzyCandidate, Identification,
};
pub use entity::{
	EntityCategory, EntityRecord, EntityRecordPatch, MatchProvenance, MatchedEntity, NegatedEntity,
};
pub use negation::{NegationDetector, prune_positives};
pub use normalize::normalize;
pub use similarity::{all_tokens_present, similarity, token_jaccard};
