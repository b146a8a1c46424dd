//! Strategy execution with sequential fallbacks. Backend failures degrade to
//! the next strategy in the chain; the caller always gets documents and a
//! trace, never a backend error.

use rand::Rng;
use serde_json::{Value, json};
use tracing::{info, warn};

use gavel_backends::{StoredDocument, VectorMethod};
use gavel_domain::EntityCategory;

use crate::{
	GavelService, ServiceError, ServiceResult,
	decision::{Decision, Strategy},
	llm_planner::{LIMIT_PLACEHOLDER, LlmPlan, QueryLanguage},
	optimizer::{
		AggregationField, FILTERED_SCAN_BASE_COST, GRAPH_TRAVERSAL_COST, GraphEntityRef,
		GraphTarget, OptimalPath, PathStrategy, build_predicate, detect_relation,
	},
	tracker::{Backend, ExecutionTrace, ExecutionTracker, LlmComparison, StepStatus},
};

#[derive(Debug, Clone)]
pub struct PlanAndFetchResult {
	pub documents: Vec<StoredDocument>,
	pub strategy_used: Strategy,
	pub decision: Decision,
	pub trace: ExecutionTrace,
}

impl GavelService {
	/// Decide, execute, and fall back in one call. `limit` defaults from
	/// configuration; `strategy_override` pins the primary strategy and
	/// disables LLM plan execution.
	pub async fn plan_and_fetch(
		&self,
		text: &str,
		limit: Option<u32>,
		strategy_override: Option<Strategy>,
	) -> ServiceResult<PlanAndFetchResult> {
		if text.trim().is_empty() {
			return Err(ServiceError::InvalidRequest { message: "query text is empty".to_string() });
		}

		let limit = limit.unwrap_or(self.cfg.optimizer.default_limit).max(1);
		let mut decision = self.determine(text).await;

		if let Some(strategy) = strategy_override {
			decision.strategy = strategy;
		}

		let path = self.optimizer.optimize(&decision);
		let mut tracker = ExecutionTracker::new(decision.strategy);

		if let Some(plan) = decision.llm_plan.as_ref()
			&& plan.is_valid()
		{
			tracker.record_llm(LlmComparison {
				strategy: plan.strategy,
				confidence: plan.confidence,
				reasoning: plan.reasoning.clone(),
				agrees_with_rules: plan.strategy == decision.strategy,
			});
		}
		for (name, cost) in alternative_costs(&path) {
			tracker.record_alternative(name, cost);
		}

		let mut documents: Vec<StoredDocument> = Vec::new();
		let mut answered = false;
		let mut fallback = false;

		if strategy_override.is_none()
			&& let Some(plan) = decision.llm_plan.clone()
		{
			let sample = rand::thread_rng().r#gen::<f64>();

			if self.planner_mode.should_execute(&plan, self.cfg.planner.split_ratio, sample) {
				match self.run_llm_plan(&plan, limit, &mut tracker).await {
					Ok(rows) if !rows.is_empty() => {
						documents = rows;
						answered = true;
					},
					Ok(_) => {
						info!("LLM plan returned no documents; falling back to rules.");

						fallback = true;
					},
					Err(err) => {
						warn!(error = %err, "LLM plan execution failed; falling back to rules.");

						fallback = true;
					},
				}
			}
		}

		if !answered {
			let predicate = build_predicate(&decision.positives, &decision.negations);

			for strategy in fallback_chain(decision.strategy, !predicate.is_empty()) {
				match self.run_strategy(strategy, &decision, &path, limit, &mut tracker, fallback).await
				{
					// An empty answer keeps the chain going; only documents stop it.
					Ok(rows) if !rows.is_empty() => {
						documents = rows;

						break;
					},
					Ok(_) => {
						info!(strategy = %strategy, "Strategy returned no documents; trying next.");
					},
					Err(err) => {
						info!(strategy = %strategy, error = %err, "Strategy failed; trying next.");
					},
				}

				fallback = true;
			}
		}

		let trace = tracker.finish();

		info!(
			trace_id = %trace.trace_id,
			status = trace.overall_status.as_str(),
			strategy = %trace.actual_strategy,
			docs = trace.total_doc_count,
			cost = trace.total_cost,
			"Query executed.",
		);

		Ok(PlanAndFetchResult { documents, strategy_used: trace.actual_strategy, decision, trace })
	}

	async fn run_llm_plan(
		&self,
		plan: &LlmPlan,
		limit: u32,
		tracker: &mut ExecutionTracker,
	) -> gavel_backends::Result<Vec<StoredDocument>> {
		let query = plan.query.replace(LIMIT_PLACEHOLDER, &limit.to_string());

		match plan.language {
			QueryLanguage::Structured => {
				tracker.start_step(
					plan.strategy.as_str(),
					Backend::Store,
					&plan.plan.target_collection,
					false,
				);

				match self.store.raw_query(&query, limit).await {
					Ok(rows) => {
						tracker.complete_step(
							StepStatus::Success,
							self.store.last_request_cost(),
							rows.len(),
							None,
							json!({ "source": "llm_plan" }),
						);

						Ok(rows)
					},
					Err(err) => {
						tracker.complete_step(
							StepStatus::Failed,
							0.0,
							0,
							Some(err.to_string()),
							json!({ "source": "llm_plan" }),
						);

						Err(err)
					},
				}
			},
			QueryLanguage::Graph => {
				tracker.start_step(plan.strategy.as_str(), Backend::Graph, "graph", false);

				match self.graph.execute(&query).await {
					Ok(bindings) => {
						let rows: Vec<StoredDocument> =
							bindings.into_iter().map(binding_document).collect();

						tracker.complete_step(
							StepStatus::Success,
							GRAPH_TRAVERSAL_COST,
							rows.len(),
							None,
							json!({ "source": "llm_plan" }),
						);

						Ok(rows)
					},
					Err(err) => {
						tracker.complete_step(
							StepStatus::Failed,
							0.0,
							0,
							Some(err.to_string()),
							json!({ "source": "llm_plan" }),
						);

						Err(err)
					},
				}
			},
		}
	}

	async fn run_strategy(
		&self,
		strategy: Strategy,
		decision: &Decision,
		path: &OptimalPath,
		limit: u32,
		tracker: &mut ExecutionTracker,
		is_fallback: bool,
	) -> gavel_backends::Result<Vec<StoredDocument>> {
		match strategy {
			Strategy::EntityAggregation =>
				self.run_aggregation(path, tracker, is_fallback).await,
			Strategy::EntityFirst => self.run_entity_first(path, limit, tracker, is_fallback).await,
			Strategy::Direct => self.run_direct(decision, path, limit, tracker, is_fallback).await,
			Strategy::Graph => self.run_graph(decision, path, limit, tracker, is_fallback).await,
			Strategy::Vector => self.run_vector(decision, limit, tracker, is_fallback).await,
		}
	}

	async fn run_aggregation(
		&self,
		path: &OptimalPath,
		tracker: &mut ExecutionTracker,
		is_fallback: bool,
	) -> gavel_backends::Result<Vec<StoredDocument>> {
		let Some(target) = path.aggregation.as_ref() else {
			return Err(gavel_backends::Error::InvalidArgument(
				"no aggregation target for this query".to_string(),
			));
		};
		let resource = format!("{}/{}", target.category.collection(), target.key);

		tracker.start_step(
			Strategy::EntityAggregation.as_str(),
			Backend::Store,
			target.category.collection(),
			is_fallback,
		);

		let mut cost = 0.0;
		let outcome: gavel_backends::Result<Value> = async {
			let value = self.store.aggregate_read(&resource, target.field.store_field()).await?;

			cost += self.store.last_request_cost();

			// Average needs the count too; it is derived, not stored.
			if target.field == AggregationField::Average {
				let count = self.store.aggregate_read(&resource, "contract_count").await?;

				cost += self.store.last_request_cost();

				let total = value.as_f64().unwrap_or_default();
				let count = count.as_f64().unwrap_or_default();
				let average = if count > 0.0 { total / count } else { 0.0 };

				return Ok(json!(average));
			}

			Ok(value)
		}
		.await;

		match outcome {
			Ok(value) => {
				let document = StoredDocument {
					id: resource,
					fields: json!({
						"entity": target.key,
						"metric": metric_name(target.field),
						"value": value,
					}),
				};

				tracker.complete_step(
					StepStatus::Success,
					cost,
					1,
					None,
					json!({ "field": target.field.store_field() }),
				);

				Ok(vec![document])
			},
			Err(err) => {
				tracker.complete_step(StepStatus::Failed, cost, 0, Some(err.to_string()), Value::Null);

				Err(err)
			},
		}
	}

	async fn run_entity_first(
		&self,
		path: &OptimalPath,
		limit: u32,
		tracker: &mut ExecutionTracker,
		is_fallback: bool,
	) -> gavel_backends::Result<Vec<StoredDocument>> {
		let Some(target) = path.entity_first.as_ref() else {
			return Err(gavel_backends::Error::InvalidArgument(
				"no entity-first target for this query".to_string(),
			));
		};
		let resource = format!("{}/{}", target.category.collection(), target.key);

		tracker.start_step(
			Strategy::EntityFirst.as_str(),
			Backend::Store,
			target.category.collection(),
			is_fallback,
		);

		let mut cost = 0.0;
		let outcome: gavel_backends::Result<(usize, Vec<StoredDocument>)> = async {
			let record = self
				.store
				.point_read(&resource)
				.await?
				.ok_or_else(|| gavel_backends::Error::NotFound("catalog record missing".to_string()))?;

			cost += self.store.last_request_cost();

			let ids: Vec<String> = record
				.fields
				.get("document_ids")
				.and_then(Value::as_array)
				.map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_string).collect())
				.unwrap_or_default();
			let rows = self.store.batch_read(&ids, limit).await?;

			cost += self.store.last_request_cost();

			Ok((ids.len(), rows))
		}
		.await;

		match outcome {
			Ok((id_count, rows)) => {
				tracker.complete_step(
					StepStatus::Success,
					cost,
					rows.len(),
					None,
					json!({ "document_ids": id_count }),
				);

				Ok(rows)
			},
			Err(err) => {
				tracker.complete_step(StepStatus::Failed, cost, 0, Some(err.to_string()), Value::Null);

				Err(err)
			},
		}
	}

	async fn run_direct(
		&self,
		decision: &Decision,
		path: &OptimalPath,
		limit: u32,
		tracker: &mut ExecutionTracker,
		is_fallback: bool,
	) -> gavel_backends::Result<Vec<StoredDocument>> {
		let predicate = if path.strategy == PathStrategy::ContractDirect {
			path.predicate.clone()
		} else {
			build_predicate(&decision.positives, &decision.negations)
		};
		let missing_indexes = self.optimizer.missing_indexes(&predicate);

		tracker.start_step(Strategy::Direct.as_str(), Backend::Store, "contracts", is_fallback);

		match self.store.filtered_query(&predicate, limit, 0).await {
			Ok(page) => {
				tracker.complete_step(
					StepStatus::Success,
					self.store.last_request_cost(),
					page.rows.len(),
					None,
					json!({ "terms": predicate.len(), "missing_indexes": missing_indexes }),
				);

				Ok(page.rows)
			},
			Err(err) => {
				tracker.complete_step(
					StepStatus::Failed,
					0.0,
					0,
					Some(err.to_string()),
					json!({ "missing_indexes": missing_indexes }),
				);

				Err(err)
			},
		}
	}

	async fn run_graph(
		&self,
		decision: &Decision,
		path: &OptimalPath,
		limit: u32,
		tracker: &mut ExecutionTracker,
		is_fallback: bool,
	) -> gavel_backends::Result<Vec<StoredDocument>> {
		let target = path.graph.clone().unwrap_or_else(|| GraphTarget {
			relation: detect_relation(&decision.text.to_lowercase())
				.unwrap_or("party_to")
				.to_string(),
			entities: decision
				.positives
				.iter()
				.map(|entity| GraphEntityRef {
					category: entity.category,
					key: entity.key.clone(),
					resource_id: format!("{}/{}", entity.category.collection(), entity.key),
				})
				.collect(),
		});
		let query = gremlin_query(&target, limit);

		tracker.start_step(Strategy::Graph.as_str(), Backend::Graph, "graph", is_fallback);

		match self.graph.execute(&query).await {
			Ok(bindings) => {
				let rows: Vec<StoredDocument> = bindings.into_iter().map(binding_document).collect();

				tracker.complete_step(
					StepStatus::Success,
					GRAPH_TRAVERSAL_COST,
					rows.len(),
					None,
					json!({ "relation": target.relation }),
				);

				Ok(rows)
			},
			Err(err) => {
				tracker.complete_step(StepStatus::Failed, 0.0, 0, Some(err.to_string()), Value::Null);

				Err(err)
			},
		}
	}

	async fn run_vector(
		&self,
		decision: &Decision,
		limit: u32,
		tracker: &mut ExecutionTracker,
		is_fallback: bool,
	) -> gavel_backends::Result<Vec<StoredDocument>> {
		tracker.start_step(Strategy::Vector.as_str(), Backend::Store, "contracts", is_fallback);

		let embedding = match self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &decision.text)
			.await
		{
			Ok(embedding) => embedding,
			Err(err) => {
				let err = gavel_backends::Error::Unavailable(format!("embedding provider: {err}"));

				tracker.complete_step(StepStatus::Failed, 0.0, 0, Some(err.to_string()), Value::Null);

				return Err(err);
			},
		};

		match self
			.store
			.vector_query(&embedding, Some(&decision.text), VectorMethod::Similarity, limit)
			.await
		{
			Ok(hits) => {
				tracker.complete_step(
					StepStatus::Success,
					hits.cost,
					hits.rows.len(),
					None,
					Value::Null,
				);

				Ok(hits.rows)
			},
			Err(err) => {
				tracker.complete_step(StepStatus::Failed, 0.0, 0, Some(err.to_string()), Value::Null);

				Err(err)
			},
		}
	}
}

/// Primary first, then the filtered scan when a predicate exists, then the
/// semantic fallback. Never retries a strategy already in the chain.
fn fallback_chain(primary: Strategy, has_predicate: bool) -> Vec<Strategy> {
	let mut chain = vec![primary];

	if primary != Strategy::Direct && has_predicate {
		chain.push(Strategy::Direct);
	}
	if primary != Strategy::Vector {
		chain.push(Strategy::Vector);
	}

	chain
}

fn alternative_costs(path: &OptimalPath) -> Vec<(&'static str, f64)> {
	let mut alternatives = Vec::new();

	if path.strategy != PathStrategy::ContractDirect {
		alternatives
			.push(("CONTRACT_DIRECT", FILTERED_SCAN_BASE_COST + 50.0 * path.selectivity));
	}
	if path.strategy != PathStrategy::GraphTraversal {
		alternatives.push(("GRAPH_TRAVERSAL", GRAPH_TRAVERSAL_COST));
	}

	alternatives
}

fn metric_name(field: AggregationField) -> &'static str {
	match field {
		AggregationField::Count => "count",
		AggregationField::Total => "total",
		AggregationField::Average => "average",
	}
}

fn binding_document(binding: gavel_backends::GraphBinding) -> StoredDocument {
	let id = binding
		.get("id")
		.or_else(|| binding.get("_id"))
		.and_then(Value::as_str)
		.unwrap_or_default()
		.to_string();

	StoredDocument { id, fields: Value::Object(binding) }
}

fn gremlin_query(target: &GraphTarget, limit: u32) -> String {
	let start = target
		.entities
		.first()
		.map(|entity| format!("g.V('{}')", entity.resource_id))
		.unwrap_or_else(|| "g.V().hasLabel('Contract')".to_string());
	let traversal = match target.relation.as_str() {
		// Contract-to-contract through a shared party.
		"shares_party" => ".out('party_to').in('party_to').dedup()",
		"governed_by" => ".in('governed_by')",
		_ => entity_inbound(target),
	};

	format!("{start}{traversal}.limit({limit})")
}

/// Traversal from a non-contract vertex back to its contracts; a contract
/// start needs no hop at all beyond its own parties.
fn entity_inbound(target: &GraphTarget) -> &'static str {
	match target.entities.first().map(|entity| entity.category) {
		Some(EntityCategory::GoverningLaw) => ".in('governed_by')",
		Some(EntityCategory::ClauseType) | Some(EntityCategory::ContractType) =>
			".in('contains_clause')",
		_ => ".in('party_to')",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fallback_chain_never_repeats_a_strategy() {
		assert_eq!(
			fallback_chain(Strategy::Graph, true),
			vec![Strategy::Graph, Strategy::Direct, Strategy::Vector]
		);
		assert_eq!(fallback_chain(Strategy::Graph, false), vec![
			Strategy::Graph,
			Strategy::Vector
		]);
		assert_eq!(fallback_chain(Strategy::Vector, true), vec![
			Strategy::Vector,
			Strategy::Direct
		]);

		// Vector never follows itself even with no predicate.
		assert_eq!(fallback_chain(Strategy::Vector, false), vec![Strategy::Vector]);
	}

	#[test]
	fn gremlin_query_embeds_start_vertex_and_limit() {
		let target = GraphTarget {
			relation: "shares_party".to_string(),
			entities: vec![GraphEntityRef {
				category: EntityCategory::ContractorParty,
				key: "acme_corporation".to_string(),
				resource_id: "contractor_parties/acme_corporation".to_string(),
			}],
		};

		assert_eq!(
			gremlin_query(&target, 10),
			"g.V('contractor_parties/acme_corporation').out('party_to').in('party_to').dedup().limit(10)"
		);
	}

	#[test]
	fn graph_binding_without_id_still_becomes_a_document() {
		let mut binding = gavel_backends::GraphBinding::new();

		binding.insert("contract_id".to_string(), json!("CT-2024-0042"));

		let document = binding_document(binding);

		assert!(document.id.is_empty());
		assert_eq!(document.fields["contract_id"], json!("CT-2024-0042"));
	}
}
