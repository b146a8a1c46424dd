//! Rule-based strategy selection. First decisive rule wins; the LLM plan is
//! produced concurrently and can never block or fail this path.

use std::{sync::LazyLock, time::Duration};

use regex::Regex;
use tracing::{info, warn};

use gavel_domain::{MatchProvenance, prune_positives};

use crate::{
	GavelService,
	audit::AuditEvent,
	decision::{Decision, SelectionAlgorithm, Strategy},
	llm_planner::LlmPlan,
	optimizer::detect_relation,
};

pub const LOOKUP_VERBS: [&str; 6] = ["show", "get", "find", "list", "fetch", "retrieve"];
pub const SIMILARITY_WORDS: [&str; 6] =
	["similar", "like", "about", "regarding", "concerning", "mention"];

/// Entities averaging below this are treated as weak fuzzy evidence and
/// routed to the semantic fallback.
const FUZZY_CONFIDENCE_FLOOR: f64 = 0.9;

static CONTRACT_ID: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)\b(ct-[a-z0-9][a-z0-9-]{3,11})\b").expect("contract id pattern is static")
});

/// Fixed-format internal contract identifier embedded in the text, if any.
pub fn extract_contract_id(text: &str) -> Option<String> {
	CONTRACT_ID.captures(text).map(|captures| captures[1].to_uppercase())
}

impl GavelService {
	/// `determine` is the whole decision procedure: entity extraction with
	/// negation pruning, the ordered rules, optimizer refinement, and the
	/// time-boxed parallel LLM plan.
	pub async fn determine(&self, text: &str) -> Decision {
		let plan_timeout = Duration::from_millis(self.cfg.planner.timeout_ms);
		let plan_future = async {
			match tokio::time::timeout(
				plan_timeout,
				self.planner.generate(self.providers.llm.as_ref(), text),
			)
			.await
			{
				Ok(plan) => plan,
				Err(_) => LlmPlan::invalid("error: planning timed out"),
			}
		};
		let rules_future = self.rule_based(text);
		let (llm_plan, mut decision) = tokio::join!(plan_future, rules_future);

		// A choice weaker than the planner's own confidence floor is not
		// worth a targeted read; semantic search degrades more gracefully.
		if decision.confidence < self.cfg.planner.min_confidence {
			decision.strategy = Strategy::Vector;
		}

		match &llm_plan.validation {
			crate::llm_planner::PlanValidation::Valid => {
				if llm_plan.strategy != decision.strategy {
					warn!(
						rule_strategy = %decision.strategy,
						llm_strategy = %llm_plan.strategy,
						reasoning = %llm_plan.reasoning,
						"LLM plan disagrees with rule-based decision.",
					);
					self.audit.publish(AuditEvent::StrategyDisagreement {
						text: text.to_string(),
						rule_strategy: decision.strategy,
						llm_strategy: llm_plan.strategy,
						llm_confidence: llm_plan.confidence,
						llm_reasoning: llm_plan.reasoning.clone(),
					});
				}
			},
			crate::llm_planner::PlanValidation::Invalid { reason } => {
				info!(%reason, "LLM plan discarded before execution.");
				self.audit.publish(AuditEvent::DiscardedPlan {
					text: text.to_string(),
					reason: reason.clone(),
				});
			},
		}

		decision.llm_plan = Some(llm_plan);

		decision
	}

	async fn rule_based(&self, text: &str) -> Decision {
		let lowered = text.to_lowercase();
		let identification = self.catalog.with(|catalog| catalog.identify(text));
		let negations =
			self.catalog.with(|catalog| self.detector.detect(text, catalog));
		let positives = prune_positives(identification.confirmed, &negations);

		if !identification.candidates.is_empty() {
			self.audit.publish(AuditEvent::FuzzyCandidates {
				text: text.to_string(),
				candidates: identification.candidates.clone(),
			});
		}

		let mut decision = Decision {
			text: text.to_string(),
			positives,
			negations,
			strategy: Strategy::Vector,
			algorithm: SelectionAlgorithm::LlmFallback,
			confidence: 0.0,
			fuzzy_candidates: identification.candidates,
			llm_plan: None,
		};

		// Rule 1: a fixed-format internal identifier is decisive on its own.
		if extract_contract_id(text).is_some() {
			decision.strategy = Strategy::Direct;
			decision.algorithm = SelectionAlgorithm::IdMatch;
			decision.confidence = 1.0;

			return decision;
		}

		// Rule 2: fixed phrase lists per strategy.
		if let Some((strategy, confidence)) = phrase_strategy(&lowered) {
			decision.strategy = strategy;
			decision.algorithm = SelectionAlgorithm::PhraseMatch;
			decision.confidence = confidence;

			return self.refine(decision, &lowered);
		}

		// Rule 3: entity-driven heuristic.
		if !decision.positives.is_empty() || !decision.negations.is_empty() {
			let average = if decision.positives.is_empty() {
				1.0
			} else {
				decision.positives.iter().map(|entity| entity.confidence).sum::<f64>()
					/ decision.positives.len() as f64
			};
			let all_fuzzy = !decision.positives.is_empty()
				&& decision
					.positives
					.iter()
					.all(|entity| entity.provenance == MatchProvenance::Fuzzy);

			decision.algorithm = SelectionAlgorithm::EntityHeuristic;

			if all_fuzzy && average < FUZZY_CONFIDENCE_FLOOR {
				decision.strategy = Strategy::Vector;
				decision.confidence = 0.75;

				return decision;
			}

			decision.strategy = Strategy::Graph;
			decision.confidence = 0.8;

			return self.refine(decision, &lowered);
		}

		// Rule 4: single-word classification against the language model.
		self.classify_with_llm(decision).await
	}

	/// For filterable strategies, let the optimizer settle the concrete
	/// access path and adopt its strategy. Identifier matches stay DIRECT.
	fn refine(&self, mut decision: Decision, lowered: &str) -> Decision {
		let refinable = matches!(
			(decision.strategy, decision.algorithm),
			(Strategy::Direct, SelectionAlgorithm::PhraseMatch)
				| (Strategy::Graph, SelectionAlgorithm::EntityHeuristic)
		);

		if refinable && detect_relation(lowered).is_none() {
			let path = self.optimizer.optimize(&decision);

			decision.strategy = path.strategy.as_decision_strategy();
		}

		decision
	}

	async fn classify_with_llm(&self, mut decision: Decision) -> Decision {
		const CLASSIFY_SYSTEM_PROMPT: &str = "\
You route retrieval queries over a corpus of legal contracts. Answer with \
exactly one word: DIRECT, ENTITY_FIRST, ENTITY_AGGREGATION, GRAPH, or VECTOR.";

		let result = self
			.providers
			.llm
			.complete(&self.cfg.providers.llm, CLASSIFY_SYSTEM_PROMPT, &decision.text, false, true)
			.await;

		match result {
			Ok(completion) => {
				let first_word =
					completion.text.split_whitespace().next().unwrap_or_default().to_string();

				match Strategy::parse(&first_word) {
					Some(strategy) => {
						decision.strategy = strategy;
						decision.algorithm = SelectionAlgorithm::LlmClassifier;
						decision.confidence = 0.7;
					},
					None => {
						warn!(answer = %completion.text, "Unparseable strategy classification.");

						decision.strategy = Strategy::Vector;
						decision.algorithm = SelectionAlgorithm::LlmFallback;
						decision.confidence = 0.5;
					},
				}
			},
			Err(err) => {
				warn!(error = %err, "Strategy classification call failed.");

				decision.strategy = Strategy::Vector;
				decision.algorithm = SelectionAlgorithm::LlmFallback;
				decision.confidence = 0.5;
			},
		}

		decision
	}
}

fn phrase_strategy(lowered: &str) -> Option<(Strategy, f64)> {
	if detect_relation(lowered).is_some() {
		return Some((Strategy::Graph, 0.9));
	}
	if SIMILARITY_WORDS.iter().any(|word| word_present(lowered, word)) {
		return Some((Strategy::Vector, 0.9));
	}
	if LOOKUP_VERBS.iter().any(|word| word_present(lowered, word)) {
		return Some((Strategy::Direct, 0.85));
	}

	None
}

fn word_present(haystack: &str, word: &str) -> bool {
	haystack.split(|c: char| !c.is_ascii_alphanumeric()).any(|token| token == word)
}
