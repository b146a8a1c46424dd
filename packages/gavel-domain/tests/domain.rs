use time::OffsetDateTime;

use gavel_domain::{
	EntityCatalog, EntityCategory, EntityRecordPatch, MatchProvenance, NegatedEntity,
	NegationDetector, normalize, prune_positives, similarity,
};

fn now() -> OffsetDateTime {
	OffsetDateTime::UNIX_EPOCH
}

fn seeded_catalog() -> EntityCatalog {
	let mut catalog = EntityCatalog::default();

	catalog.update_or_create(
		EntityCategory::ContractorParty,
		"Alabama Fire Sprinkler Contractors, LLC",
		"doc-1",
		120_000.0,
		now(),
	);
	catalog.update_or_create(EntityCategory::ContractorParty, "Microsoft", "doc-2", 80_000.0, now());
	catalog.update_or_create(EntityCategory::GoverningLaw, "Alabama", "doc-1", 0.0, now());
	catalog.update_or_create(EntityCategory::GoverningLaw, "Delaware", "doc-3", 0.0, now());
	catalog.update_or_create(
		EntityCategory::ContractType,
		"Service Agreement",
		"doc-2",
		0.0,
		now(),
	);

	catalog
}

#[test]
fn update_or_create_is_idempotent_per_document() {
	let mut catalog = EntityCatalog::default();

	catalog.update_or_create(EntityCategory::ContractorParty, "Acme LLC", "doc-1", 100.0, now());
	catalog.update_or_create(EntityCategory::ContractorParty, "Acme LLC", "doc-1", 100.0, now());

	let record = catalog
		.get(EntityCategory::ContractorParty, "acme")
		.expect("Record must exist after update_or_create.");

	assert_eq!(record.contract_count, 1);
	assert_eq!(record.total_value, 100.0);

	catalog.update_or_create(EntityCategory::ContractorParty, "Acme, Inc.", "doc-2", 50.0, now());

	let record = catalog
		.get(EntityCategory::ContractorParty, "acme")
		.expect("Record must exist after update_or_create.");

	assert_eq!(record.contract_count, 2);
	assert_eq!(record.total_value, 150.0);
}

#[test]
fn identify_confirms_exact_entity() {
	let catalog = seeded_catalog();
	let identification = catalog.identify("How many contracts does Microsoft have?");
	let microsoft = identification
		.confirmed
		.iter()
		.find(|entity| entity.key == "microsoft")
		.expect("Microsoft must be confirmed.");

	assert_eq!(microsoft.category, EntityCategory::ContractorParty);
	assert_eq!(microsoft.confidence, 1.0);
	assert_eq!(microsoft.provenance, MatchProvenance::Exact);
	assert_eq!(microsoft.contract_count, 1);
}

#[test]
fn identify_confirms_partial_company_reference() {
	let catalog = seeded_catalog();
	let identification = catalog.identify("Show contracts for Alabama Fire Sprinkler Contractors");
	let contractor = identification
		.confirmed
		.iter()
		.find(|entity| entity.key == "alabama_fire_sprinkler_contractors")
		.expect("Contractor must be confirmed from a partial reference.");

	assert!(contractor.confidence >= 0.85);
}

#[test]
fn identify_keeps_weak_comparisons_out_of_confirmed() {
	let catalog = seeded_catalog();
	let identification = catalog.identify("Agreements mentioning Microsift");

	assert!(identification.confirmed.iter().all(|entity| entity.key != "microsoft"));
	assert!(identification.candidates.iter().any(|candidate| candidate.key == "microsoft"));
}

#[test]
fn identify_audits_every_record_comparison() {
	let catalog = seeded_catalog();
	let identification = catalog.identify("Show contracts for Microsoft");

	// One audit row per catalog record that produced a comparison.
	assert_eq!(identification.audit.len(), catalog.len());
	assert!(identification.audit.iter().any(|audit| audit.candidate_key == "microsoft"
		&& audit.confirmed));
}

#[test]
fn tie_break_prefers_full_containment() {
	let catalog = seeded_catalog();
	let identification = catalog.identify("Alabama Fire Sprinkler Contractors in Alabama");
	let first = identification.confirmed.first().expect("Must confirm at least one entity.");

	assert_ne!(first.provenance, MatchProvenance::Fuzzy);
}

#[test]
fn negated_literal_never_stays_positive() {
	let catalog = seeded_catalog();
	let detector = NegationDetector::new();
	let text = "Show contracts not governed by Alabama";
	let negations = detector.detect(text, &catalog);

	assert!(negations.contains(&NegatedEntity {
		category: EntityCategory::GoverningLaw,
		value: "alabama".to_string(),
	}));

	let positives = prune_positives(catalog.identify(text).confirmed, &negations);

	assert!(
		positives
			.iter()
			.all(|entity| !(entity.category == EntityCategory::GoverningLaw
				&& entity.key == "alabama")),
		"negation must win over a positive match on the identical literal",
	);
}

#[test]
fn patch_application_is_pure_and_idempotent_per_document() {
	let mut catalog = EntityCatalog::default();

	catalog.update_or_create(EntityCategory::ClauseType, "Indemnification", "doc-1", 0.0, now());

	let record = catalog
		.get(EntityCategory::ClauseType, "indemnification")
		.expect("Record must exist.")
		.clone();
	let patch = EntityRecordPatch {
		display_name: None,
		add_document_id: Some("doc-1".to_string()),
		add_value: Some(10.0),
	};
	let patched = record.apply(&patch, now());

	assert_eq!(patched.contract_count, record.contract_count);
	assert_eq!(patched.total_value, record.total_value);
	assert_eq!(record.apply(&patch, now()), patched);
	assert!(patch.affects_evaluation());
	assert!(!EntityRecordPatch { display_name: Some("X".to_string()), ..Default::default() }
		.affects_evaluation());
}

#[test]
fn normalize_and_similarity_agree_on_shared_key() {
	let key = normalize("The Microsoft Corporation");

	assert_eq!(key, "microsoft");
	assert_eq!(similarity("Microsoft Corp", "The Microsoft Corporation"), 1.0);
}
