//! Independent LLM planning path: one deterministic call that must return a
//! complete structured plan, validated before it is ever trusted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use gavel_config::LlmProviderConfig;

use crate::{BoxFuture, CompletionProvider, decision::Strategy};

/// Placeholder every executable plan query must carry; the executor replaces
/// it with the caller's limit.
pub const LIMIT_PLACEHOLDER: &str = "@limit";

const STORE_SCHEMA_DOC: &str = "\
Document store collections:
- contracts: contract_id, contractor_party, contracting_party, governing_law, \
contract_type, clause_type, contract_value, effective_date
- contractor_parties / contracting_parties / governing_laws / contract_types / \
clause_types: key, display_name, document_ids, contract_count, total_value";

const GRAPH_SCHEMA_DOC: &str = "\
Graph classes: Contract, Party, Jurisdiction, ClauseType.
Relations: party_to(Contract->Party), governed_by(Contract->Jurisdiction), \
contains_clause(Contract->ClauseType), shares_party(Contract->Contract).";

const DECISION_RULES_DOC: &str = "\
Pick exactly one strategy:
1. DIRECT — filterable lookups over contract fields. Example: \"show service \
agreements under Delaware law\" -> SELECT over contracts with @limit.
2. ENTITY_FIRST — one known entity, then its documents. Example: \"contracts \
for Acme\" -> read entity record, then batch-read its document ids.
3. ENTITY_AGGREGATION — counts/totals for one known entity. Example: \"how \
many contracts does Acme have\" -> read the entity record's stats.
4. GRAPH — relationship questions. Example: \"which contracts share a party \
with CT-2024-0042\" -> g.V() traversal with .limit(@limit).
5. VECTOR — similarity/content questions. Example: \"contracts about data \
privacy\" -> semantic search.
Respond with a single JSON object: {\"strategy\", \"fallback_strategy\", \
\"query_language\" (structured|graph), \"query\" (must embed @limit), \
\"execution_plan\": {\"target_collection\", \"estimated_cost\", \"steps\": \
[{\"description\", \"target\", \"estimated_cost\"}]}, \"result_shape\", \
\"confidence\" (0..1), \"reasoning\"}.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryLanguage {
	Structured,
	Graph,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanValidation {
	Valid,
	Invalid { reason: String },
}
impl PlanValidation {
	pub fn is_valid(&self) -> bool {
		matches!(self, Self::Valid)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
	pub description: String,
	pub target: String,
	pub estimated_cost: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlanSpec {
	pub target_collection: String,
	pub estimated_cost: f64,
	pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmPlan {
	pub strategy: Strategy,
	pub fallback_strategy: Strategy,
	pub language: QueryLanguage,
	pub query: String,
	pub plan: ExecutionPlanSpec,
	pub result_shape: String,
	pub confidence: f64,
	pub reasoning: String,
	pub validation: PlanValidation,
}
impl LlmPlan {
	/// Placeholder recorded when plan generation itself timed out or failed.
	pub fn invalid(reason: impl Into<String>) -> Self {
		Self {
			strategy: Strategy::Vector,
			fallback_strategy: Strategy::Vector,
			language: QueryLanguage::Structured,
			query: String::new(),
			plan: ExecutionPlanSpec::default(),
			result_shape: String::new(),
			confidence: 0.0,
			reasoning: String::new(),
			validation: PlanValidation::Invalid { reason: reason.into() },
		}
	}

	pub fn is_valid(&self) -> bool {
		self.validation.is_valid()
	}
}

/// How valid LLM plans are treated at execution time. Strategy disagreements
/// are logged for offline audit in every mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerMode {
	/// Log agreement with the rule-based choice, never execute.
	CompareOnly,
	/// Execute whenever the plan is valid.
	AlwaysExecute,
	/// Execute for a random subset of eligible requests.
	SplitTest,
}
impl PlannerMode {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_lowercase().as_str() {
			"compare_only" => Some(Self::CompareOnly),
			"always_execute" => Some(Self::AlwaysExecute),
			"split_test" => Some(Self::SplitTest),
			_ => None,
		}
	}

	/// Whether a valid plan should run, given a uniform [0, 1) sample drawn
	/// for this request. Invalid plans never run regardless of mode.
	pub fn should_execute(&self, plan: &LlmPlan, split_ratio: f64, sample: f64) -> bool {
		if !plan.is_valid() {
			return false;
		}

		match self {
			Self::CompareOnly => false,
			Self::AlwaysExecute => true,
			Self::SplitTest => sample < split_ratio,
		}
	}
}

pub struct LlmQueryPlanner {
	llm_cfg: LlmProviderConfig,
	min_confidence: f64,
}
impl LlmQueryPlanner {
	pub fn new(llm_cfg: LlmProviderConfig, min_confidence: f64) -> Self {
		Self { llm_cfg, min_confidence }
	}

	/// One deterministic planning call. The returned plan is already
	/// validated; callers check [`LlmPlan::is_valid`] before trusting it.
	pub fn generate<'a>(
		&'a self,
		llm: &'a dyn CompletionProvider,
		text: &'a str,
	) -> BoxFuture<'a, LlmPlan> {
		Box::pin(async move {
			let system_prompt =
				format!("{STORE_SCHEMA_DOC}\n\n{GRAPH_SCHEMA_DOC}\n\n{DECISION_RULES_DOC}");
			let completion =
				match llm.complete(&self.llm_cfg, &system_prompt, text, true, true).await {
					Ok(completion) => completion,
					Err(err) => {
						warn!(error = %err, "LLM plan generation failed.");

						return LlmPlan::invalid(format!("error: {err}"));
					},
				};

			debug!(
				tokens = completion.token_usage,
				model = %completion.model_id,
				"LLM plan generated.",
			);

			match parse_plan(&completion.text) {
				Ok(mut plan) => {
					plan.validation = validate_plan(&plan, self.min_confidence);

					plan
				},
				Err(reason) => LlmPlan::invalid(reason),
			}
		})
	}
}

/// Parse the model's JSON payload into a plan. Unknown strategies and
/// languages are parse errors, not panics.
pub fn parse_plan(raw: &str) -> Result<LlmPlan, String> {
	let json: Value =
		serde_json::from_str(raw.trim()).map_err(|err| format!("invalid json: {err}"))?;
	let strategy = json
		.get("strategy")
		.and_then(Value::as_str)
		.and_then(Strategy::parse)
		.ok_or_else(|| "unknown or missing strategy".to_string())?;
	let fallback_strategy = json
		.get("fallback_strategy")
		.and_then(Value::as_str)
		.and_then(Strategy::parse)
		.unwrap_or(Strategy::Vector);
	let language = match json.get("query_language").and_then(Value::as_str) {
		Some("structured") => QueryLanguage::Structured,
		Some("graph") => QueryLanguage::Graph,
		other => return Err(format!("unknown query language: {other:?}")),
	};
	let query =
		json.get("query").and_then(Value::as_str).unwrap_or_default().trim().to_string();
	let plan = json
		.get("execution_plan")
		.map(|spec| ExecutionPlanSpec {
			target_collection: spec
				.get("target_collection")
				.and_then(Value::as_str)
				.unwrap_or_default()
				.to_string(),
			estimated_cost: spec
				.get("estimated_cost")
				.and_then(Value::as_f64)
				.unwrap_or_default(),
			steps: spec
				.get("steps")
				.and_then(Value::as_array)
				.map(|steps| {
					steps
						.iter()
						.map(|step| PlanStep {
							description: step
								.get("description")
								.and_then(Value::as_str)
								.unwrap_or_default()
								.to_string(),
							target: step
								.get("target")
								.and_then(Value::as_str)
								.unwrap_or_default()
								.to_string(),
							estimated_cost: step
								.get("estimated_cost")
								.and_then(Value::as_f64)
								.unwrap_or_default(),
						})
						.collect()
				})
				.unwrap_or_default(),
		})
		.unwrap_or_default();
	let result_shape =
		json.get("result_shape").and_then(Value::as_str).unwrap_or_default().to_string();
	let confidence = json.get("confidence").and_then(Value::as_f64).unwrap_or(0.0);
	let reasoning =
		json.get("reasoning").and_then(Value::as_str).unwrap_or_default().to_string();

	Ok(LlmPlan {
		strategy,
		fallback_strategy,
		language,
		query,
		plan,
		result_shape,
		confidence,
		reasoning,
		validation: PlanValidation::Valid,
	})
}

/// A plan is invalid — never executed — unless the query text is non-empty,
/// passes the syntax/safety validator for its language, and the confidence
/// clears the threshold.
pub fn validate_plan(plan: &LlmPlan, min_confidence: f64) -> PlanValidation {
	if plan.query.is_empty() {
		return PlanValidation::Invalid { reason: "empty query text".to_string() };
	}
	if plan.confidence < min_confidence {
		return PlanValidation::Invalid {
			reason: format!("confidence {:.2} below threshold {min_confidence:.2}", plan.confidence),
		};
	}

	let syntax = match plan.language {
		QueryLanguage::Structured => validate_structured_query(&plan.query),
		QueryLanguage::Graph => validate_graph_query(&plan.query),
	};

	match syntax {
		Ok(()) => PlanValidation::Valid,
		Err(reason) => PlanValidation::Invalid { reason },
	}
}

const STRUCTURED_FORBIDDEN: [&str; 9] =
	["insert", "update", "delete", "drop", "create", "alter", "merge", "truncate", "grant"];
const GRAPH_FORBIDDEN: [&str; 5] = ["drop", "addv", "adde", "property", "sideeffect"];

/// Single read-only SELECT with the limit placeholder present.
fn validate_structured_query(query: &str) -> Result<(), String> {
	let lowered = query.to_lowercase();
	let trimmed = lowered.trim_end_matches(';').trim();

	if !trimmed.starts_with("select") {
		return Err("structured query must be a single SELECT".to_string());
	}
	if trimmed.contains(';') {
		return Err("structured query must be a single statement".to_string());
	}

	for keyword in STRUCTURED_FORBIDDEN {
		if word_present(trimmed, keyword) {
			return Err(format!("disallowed statement: {keyword}"));
		}
	}

	if !trimmed.contains(LIMIT_PLACEHOLDER) {
		return Err(format!("missing required placeholder {LIMIT_PLACEHOLDER}"));
	}

	Ok(())
}

/// Single read-only traversal starting at `g.` with a bounded `.limit(...)`.
fn validate_graph_query(query: &str) -> Result<(), String> {
	let lowered = query.to_lowercase();
	let trimmed = lowered.trim();

	if !trimmed.starts_with("g.") {
		return Err("graph query must start at the traversal source g.".to_string());
	}

	for step in GRAPH_FORBIDDEN {
		if trimmed.contains(&format!(".{step}(")) {
			return Err(format!("disallowed traversal step: {step}"));
		}
	}

	if !trimmed.contains(&format!(".limit({LIMIT_PLACEHOLDER})")) {
		return Err(format!("missing required placeholder .limit({LIMIT_PLACEHOLDER})"));
	}

	Ok(())
}

fn word_present(haystack: &str, word: &str) -> bool {
	haystack.split(|c: char| !c.is_ascii_alphanumeric()).any(|token| token == word)
}
