//! Per-query execution tracing: steps, costs, fallback accounting, and a
//! human-readable diagnostic rendering.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::decision::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
	Store,
	Graph,
	Llm,
}
impl Backend {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Store => "store",
			Self::Graph => "graph",
			Self::Llm => "llm",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
	Success,
	Failed,
	Partial,
	Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
	NoExecution,
	Success,
	SuccessWithFallbacks,
	PartialSuccess,
	NoResults,
}
impl OverallStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::NoExecution => "NO_EXECUTION",
			Self::Success => "SUCCESS",
			Self::SuccessWithFallbacks => "SUCCESS_WITH_FALLBACKS",
			Self::PartialSuccess => "PARTIAL_SUCCESS",
			Self::NoResults => "NO_RESULTS",
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
	pub name: String,
	pub backend: Backend,
	pub target: String,
	pub status: StepStatus,
	pub is_fallback: bool,
	pub cost: f64,
	pub doc_count: usize,
	pub duration_ms: u64,
	pub error: Option<String>,
	pub metadata: Value,
}

/// Side-by-side LLM-vs-rule comparison, recorded independent of planner mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmComparison {
	pub strategy: Strategy,
	pub confidence: f64,
	pub reasoning: String,
	pub agrees_with_rules: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
	pub trace_id: Uuid,
	pub planned_strategy: Strategy,
	pub actual_strategy: Strategy,
	pub steps: Vec<TraceStep>,
	pub total_cost: f64,
	pub total_doc_count: usize,
	pub fallback_count: usize,
	pub overall_status: OverallStatus,
	pub llm: Option<LlmComparison>,
	/// Cost estimates of paths considered but not taken.
	pub alternatives: Vec<(String, f64)>,
	pub recommendations: Vec<String>,
}

struct OpenStep {
	name: String,
	backend: Backend,
	target: String,
	is_fallback: bool,
	started: Instant,
}

pub struct ExecutionTracker {
	trace_id: Uuid,
	planned_strategy: Strategy,
	actual_strategy: Strategy,
	llm: Option<LlmComparison>,
	steps: Vec<TraceStep>,
	open: Option<OpenStep>,
	fallback_count: usize,
	alternatives: Vec<(String, f64)>,
}
impl ExecutionTracker {
	pub fn new(planned_strategy: Strategy) -> Self {
		Self {
			trace_id: Uuid::new_v4(),
			planned_strategy,
			actual_strategy: planned_strategy,
			llm: None,
			steps: Vec::new(),
			open: None,
			fallback_count: 0,
			alternatives: Vec::new(),
		}
	}

	pub fn record_llm(&mut self, comparison: LlmComparison) {
		self.llm = Some(comparison);
	}

	pub fn record_alternative(&mut self, name: impl Into<String>, estimated_cost: f64) {
		self.alternatives.push((name.into(), estimated_cost));
	}

	/// Open a step and its timer. Entering a fallback step bumps the fallback
	/// counter and overwrites the actual strategy when the step is named
	/// after one.
	pub fn start_step(&mut self, name: &str, backend: Backend, target: &str, is_fallback: bool) {
		if is_fallback {
			self.fallback_count += 1;
		}
		if let Some(strategy) = Strategy::parse(name) {
			self.actual_strategy = strategy;
		}

		self.open = Some(OpenStep {
			name: name.to_string(),
			backend,
			target: target.to_string(),
			is_fallback,
			started: Instant::now(),
		});
	}

	pub fn complete_step(
		&mut self,
		status: StepStatus,
		cost: f64,
		doc_count: usize,
		error: Option<String>,
		metadata: Value,
	) {
		let Some(open) = self.open.take() else {
			return;
		};

		self.steps.push(TraceStep {
			name: open.name,
			backend: open.backend,
			target: open.target,
			status,
			is_fallback: open.is_fallback,
			cost,
			doc_count,
			duration_ms: open.started.elapsed().as_millis() as u64,
			error,
			metadata,
		});
	}

	pub fn fallback_count(&self) -> usize {
		self.fallback_count
	}

	pub fn finish(mut self) -> ExecutionTrace {
		// A step left open counts as failed; the backend never answered.
		if self.open.is_some() {
			self.complete_step(
				StepStatus::Failed,
				0.0,
				0,
				Some("step never completed".to_string()),
				Value::Null,
			);
		}

		let overall_status = derive_overall(&self.steps);
		let recommendations = recommendations(&self.steps, self.fallback_count, overall_status);

		ExecutionTrace {
			trace_id: self.trace_id,
			planned_strategy: self.planned_strategy,
			actual_strategy: self.actual_strategy,
			total_cost: self.steps.iter().map(|step| step.cost).sum(),
			total_doc_count: self
				.steps
				.iter()
				.filter(|step| step.status == StepStatus::Success)
				.map(|step| step.doc_count)
				.sum(),
			fallback_count: self.fallback_count,
			overall_status,
			llm: self.llm,
			alternatives: self.alternatives,
			recommendations,
			steps: self.steps,
		}
	}
}

fn derive_overall(steps: &[TraceStep]) -> OverallStatus {
	if steps.is_empty() {
		return OverallStatus::NoExecution;
	}
	if steps.iter().all(|step| step.status == StepStatus::Failed) {
		return OverallStatus::NoResults;
	}

	let any_failed = steps.iter().any(|step| step.status == StepStatus::Failed);
	let any_fallback = steps.iter().any(|step| step.is_fallback);

	match (any_failed, any_fallback) {
		(false, false) => OverallStatus::Success,
		(false, true) => OverallStatus::SuccessWithFallbacks,
		// A failed primary answered by a successful fallback is still a
		// fallback success; only failures without recovery are partial.
		(true, true)
			if steps
				.iter()
				.any(|step| step.is_fallback && step.status == StepStatus::Success) =>
			OverallStatus::SuccessWithFallbacks,
		_ => OverallStatus::PartialSuccess,
	}
}

fn recommendations(
	steps: &[TraceStep],
	fallback_count: usize,
	overall: OverallStatus,
) -> Vec<String> {
	let mut out = Vec::new();

	if steps.iter().any(|step| {
		step.error.as_deref().is_some_and(|error| error.contains("catalog record missing"))
	}) {
		out.push(
			"catalog entry missing; check entity normalization or re-run ingestion".to_string(),
		);
	}
	if fallback_count >= 2 || (fallback_count >= 1 && steps.len() <= 2) {
		out.push("fallback rate high; review strategy selection for this phrasing".to_string());
	}

	for step in steps {
		if let Some(warnings) = step.metadata.get("missing_indexes").and_then(Value::as_array) {
			for warning in warnings.iter().filter_map(Value::as_str) {
				let recommendation = format!("{warning}; consider adding it");

				if !out.contains(&recommendation) {
					out.push(recommendation);
				}
			}
		}
	}

	if overall == OverallStatus::NoResults {
		out.push("all steps failed; inspect backend availability before retrying".to_string());
	}

	out
}

/// Multi-line diagnostic rendering of a finished trace.
pub fn render(trace: &ExecutionTrace) -> String {
	let mut lines = Vec::new();

	lines.push(format!(
		"trace {} planned={} actual={} status={}",
		trace.trace_id,
		trace.planned_strategy,
		trace.actual_strategy,
		trace.overall_status.as_str(),
	));

	for (index, step) in trace.steps.iter().enumerate() {
		let fallback = if step.is_fallback { " fallback" } else { "" };
		let error = step.error.as_deref().map(|e| format!(" error={e}")).unwrap_or_default();

		lines.push(format!(
			"  [{}] {} via {} target={} status={:?} cost={:.2} docs={} {}ms{}{}",
			index + 1,
			step.name,
			step.backend.as_str(),
			step.target,
			step.status,
			step.cost,
			step.doc_count,
			step.duration_ms,
			fallback,
			error,
		));
	}

	lines.push(format!(
		"  totals: cost={:.2} docs={} fallbacks={}",
		trace.total_cost, trace.total_doc_count, trace.fallback_count,
	));

	for (name, cost) in &trace.alternatives {
		lines.push(format!("  alternative: {name} est_cost={cost:.2}"));
	}

	if let Some(llm) = &trace.llm {
		lines.push(format!(
			"  llm: strategy={} confidence={:.2} agrees={} reasoning={}",
			llm.strategy, llm.confidence, llm.agrees_with_rules, llm.reasoning,
		));
	}

	for recommendation in &trace.recommendations {
		lines.push(format!("  recommend: {recommendation}"));
	}

	lines.join("\n")
}

#[cfg(test)]
mod tests {
	use super::*;

	fn step(tracker: &mut ExecutionTracker, name: &str, status: StepStatus, is_fallback: bool) {
		tracker.start_step(name, Backend::Store, "contracts", is_fallback);
		tracker.complete_step(status, 1.0, usize::from(status == StepStatus::Success), None, Value::Null);
	}

	#[test]
	fn no_steps_is_no_execution() {
		let trace = ExecutionTracker::new(Strategy::Direct).finish();

		assert_eq!(trace.overall_status, OverallStatus::NoExecution);
		assert_eq!(trace.fallback_count, 0);
	}

	#[test]
	fn failed_primary_with_vector_fallback_success() {
		let mut tracker = ExecutionTracker::new(Strategy::Direct);

		step(&mut tracker, "DIRECT", StepStatus::Failed, false);
		step(&mut tracker, "VECTOR", StepStatus::Success, true);

		let trace = tracker.finish();

		assert_eq!(trace.overall_status, OverallStatus::SuccessWithFallbacks);
		assert_eq!(trace.fallback_count, 1);
		assert_eq!(trace.actual_strategy, Strategy::Vector);
		assert_eq!(trace.planned_strategy, Strategy::Direct);
	}

	#[test]
	fn all_failed_is_no_results() {
		let mut tracker = ExecutionTracker::new(Strategy::Direct);

		step(&mut tracker, "DIRECT", StepStatus::Failed, false);
		step(&mut tracker, "VECTOR", StepStatus::Failed, true);

		let trace = tracker.finish();

		assert_eq!(trace.overall_status, OverallStatus::NoResults);
	}

	#[test]
	fn clean_success_has_no_fallbacks() {
		let mut tracker = ExecutionTracker::new(Strategy::EntityFirst);

		step(&mut tracker, "ENTITY_FIRST", StepStatus::Success, false);

		let trace = tracker.finish();

		assert_eq!(trace.overall_status, OverallStatus::Success);
		assert_eq!(trace.actual_strategy, Strategy::EntityFirst);
	}

	#[test]
	fn fallback_count_matches_flagged_steps() {
		let mut tracker = ExecutionTracker::new(Strategy::Direct);

		step(&mut tracker, "DIRECT", StepStatus::Failed, false);
		step(&mut tracker, "DIRECT", StepStatus::Failed, true);
		step(&mut tracker, "VECTOR", StepStatus::Success, true);

		let trace = tracker.finish();

		assert_eq!(trace.fallback_count, trace.steps.iter().filter(|s| s.is_fallback).count());
		assert!(
			trace
				.recommendations
				.iter()
				.any(|recommendation| recommendation.contains("fallback rate high"))
		);
	}

	#[test]
	fn unfinished_step_counts_as_failed() {
		let mut tracker = ExecutionTracker::new(Strategy::Graph);

		tracker.start_step("GRAPH", Backend::Graph, "graph", false);

		let trace = tracker.finish();

		assert_eq!(trace.steps.len(), 1);
		assert_eq!(trace.steps[0].status, StepStatus::Failed);
		assert_eq!(trace.overall_status, OverallStatus::NoResults);
	}

	#[test]
	fn render_includes_steps_and_llm_line() {
		let mut tracker = ExecutionTracker::new(Strategy::Direct);

		tracker.record_llm(LlmComparison {
			strategy: Strategy::Graph,
			confidence: 0.8,
			reasoning: "relationship phrasing".to_string(),
			agrees_with_rules: false,
		});
		tracker.record_alternative("ENTITY_FIRST", 2.0);
		step(&mut tracker, "DIRECT", StepStatus::Success, false);

		let rendered = render(&tracker.finish());

		assert!(rendered.contains("planned=DIRECT"));
		assert!(rendered.contains("alternative: ENTITY_FIRST"));
		assert!(rendered.contains("agrees=false"));
	}
}
