//! Shared harness: a service wired to in-memory backends and scripted
//! providers.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use gavel_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use gavel_domain::{EntityCategory, EntityRecord};
use gavel_providers::Completion;
use gavel_service::{
	AuditEvent, AuditSink, BoxFuture, CompletionProvider, EmbeddingProvider, GavelService,
	Providers,
};
use gavel_testkit::{MemoryCatalog, MemoryGraph, MemoryStore, entity_record, sample_config};

/// Completion provider dispatching on call shape: the planning call uses JSON
/// mode, the classification call does not. Safe under concurrent calls.
pub struct ScriptedLlm {
	plan_reply: Mutex<Option<String>>,
	classify_reply: Mutex<Option<String>>,
}
impl ScriptedLlm {
	pub fn silent() -> Arc<Self> {
		Arc::new(Self { plan_reply: Mutex::new(None), classify_reply: Mutex::new(None) })
	}

	pub fn with_plan(reply: &str) -> Arc<Self> {
		let llm = Self::silent();

		*llm.plan_reply.lock().unwrap_or_else(|err| err.into_inner()) =
			Some(reply.to_string());

		llm
	}

	pub fn set_classify(&self, reply: &str) {
		*self.classify_reply.lock().unwrap_or_else(|err| err.into_inner()) =
			Some(reply.to_string());
	}
}
impl CompletionProvider for ScriptedLlm {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_system_prompt: &'a str,
		_user_prompt: &'a str,
		json_mode: bool,
		_deterministic: bool,
	) -> BoxFuture<'a, color_eyre::Result<Completion>> {
		Box::pin(async move {
			let slot = if json_mode { &self.plan_reply } else { &self.classify_reply };
			let reply = slot.lock().unwrap_or_else(|err| err.into_inner()).clone();

			match reply {
				Some(text) =>
					Ok(Completion { text, token_usage: 42, model_id: "test-model".to_string() }),
				None => Err(color_eyre::eyre::eyre!("no scripted reply")),
			}
		})
	}
}

pub struct FixedEmbedding;
impl EmbeddingProvider for FixedEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		_text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(async move { Ok(vec![0.1; cfg.dimensions as usize]) })
	}
}

pub struct Harness {
	pub service: GavelService,
	pub store: Arc<MemoryStore>,
	pub graph: Arc<MemoryGraph>,
	pub llm: Arc<ScriptedLlm>,
	pub audit_rx: mpsc::Receiver<AuditEvent>,
}

pub async fn harness(cfg: Config, llm: Arc<ScriptedLlm>) -> Harness {
	gavel_testkit::init_tracing();

	let store = Arc::new(MemoryStore::new());
	let graph = Arc::new(MemoryGraph::new());
	let persistence = Arc::new(MemoryCatalog::seeded(seed_records()));
	let (audit, audit_rx) = AuditSink::new(cfg.catalog.audit_queue_capacity);
	let providers = Providers::new(llm.clone(), Arc::new(FixedEmbedding));
	let service =
		GavelService::new(cfg, store.clone(), graph.clone(), persistence, providers, audit)
			.await
			.expect("service construction");

	Harness { service, store, graph, llm, audit_rx }
}

pub async fn default_harness() -> Harness {
	harness(sample_config(), ScriptedLlm::silent()).await
}

/// Catalog fixture shared across suites: two contractors, two jurisdictions,
/// one contract type.
pub fn seed_records() -> Vec<EntityRecord> {
	vec![
		entity_record(
			EntityCategory::ContractorParty,
			"Microsoft",
			&["CT-1001", "CT-1002", "CT-1003"],
			100_000.0,
		),
		entity_record(EntityCategory::ContractorParty, "Acme", &["CT-2001", "CT-2002"], 50_000.0),
		entity_record(EntityCategory::GoverningLaw, "Alabama", &["CT-3001"], 10_000.0),
		entity_record(EntityCategory::GoverningLaw, "Delaware", &["CT-1001"], 100_000.0),
		entity_record(EntityCategory::ContractType, "Service Agreement", &["CT-1002"], 80_000.0),
	]
}

/// A structured plan payload that passes every validation check.
pub fn valid_plan_json(strategy: &str, confidence: f64) -> String {
	format!(
		r#"{{
			"strategy": "{strategy}",
			"fallback_strategy": "VECTOR",
			"query_language": "structured",
			"query": "SELECT * FROM contracts WHERE contractor_party = 'acme' LIMIT @limit",
			"execution_plan": {{
				"target_collection": "contracts",
				"estimated_cost": 2.0,
				"steps": [
					{{ "description": "filtered scan", "target": "contracts", "estimated_cost": 2.0 }}
				]
			}},
			"result_shape": "documents",
			"confidence": {confidence},
			"reasoning": "scripted plan"
		}}"#
	)
}
