use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub catalog: Catalog,
	pub planner: Planner,
	pub optimizer: Optimizer,
	pub providers: Providers,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
	/// Similarity score at or above which a fuzzy comparison counts as a
	/// confirmed match. Lower scores are retained as audit candidates only.
	pub match_threshold: f64,
	pub audit_queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Planner {
	/// One of "compare_only", "always_execute", "split_test".
	pub mode: String,
	/// Fraction of eligible requests that execute the LLM plan in split_test
	/// mode.
	pub split_ratio: f64,
	pub timeout_ms: u64,
	pub min_confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Optimizer {
	/// Store fields backed by an index. Predicate terms on any other field
	/// produce a missing-index warning on the chosen path.
	pub indexed_fields: Vec<String>,
	pub default_limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub llm: LlmProviderConfig,
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}
