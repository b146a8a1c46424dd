//! In-process fakes for the engine's collaborator traits, plus config and
//! catalog fixtures shared by integration tests. Fakes are scriptable: tests
//! can seed rows, canned results, and per-operation failures.

use std::{collections::BTreeMap, sync::Mutex};

use serde_json::Value;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use gavel_backends::{
	BoxFuture, CatalogPersistence, DocumentStore, Error, GraphBackend, GraphBinding, Predicate,
	QueryPage, Result, StoredDocument, VectorHits, VectorMethod,
};
use gavel_config::{
	Catalog, Config, EmbeddingProviderConfig, LlmProviderConfig, Optimizer, Planner, Providers,
	Service,
};
use gavel_domain::{EntityCategory, EntityRecord, normalize};

/// Test-writer tracing; safe to call from every test.
pub fn init_tracing() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}

pub fn sample_config() -> Config {
	Config {
		service: Service { log_level: "info".to_string() },
		catalog: Catalog { match_threshold: 0.85, audit_queue_capacity: 64 },
		planner: Planner {
			mode: "compare_only".to_string(),
			split_ratio: 0.25,
			timeout_ms: 2_000,
			min_confidence: 0.5,
		},
		optimizer: Optimizer {
			indexed_fields: vec![
				"contractor_party".to_string(),
				"governing_law".to_string(),
				"contract_type".to_string(),
			],
			default_limit: 10,
		},
		providers: Providers {
			llm: llm_provider_config(),
			embedding: embedding_provider_config(),
		},
	}
}

pub fn llm_provider_config() -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "test-llm".to_string(),
		api_base: "http://127.0.0.1:0".to_string(),
		api_key: "test-key".to_string(),
		path: "/v1/chat/completions".to_string(),
		model: "test-model".to_string(),
		temperature: 0.2,
		timeout_ms: 1_000,
		default_headers: serde_json::Map::new(),
	}
}

pub fn embedding_provider_config() -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "test-embedding".to_string(),
		api_base: "http://127.0.0.1:0".to_string(),
		api_key: "test-key".to_string(),
		path: "/v1/embeddings".to_string(),
		model: "test-embedding-model".to_string(),
		dimensions: 8,
		timeout_ms: 1_000,
		default_headers: serde_json::Map::new(),
	}
}

/// Catalog record with one synthetic contract value per document.
pub fn entity_record(
	category: EntityCategory,
	display_name: &str,
	document_ids: &[&str],
	value_per_document: f64,
) -> EntityRecord {
	let now = OffsetDateTime::now_utc();

	EntityRecord {
		key: normalize(display_name),
		display_name: display_name.to_string(),
		category,
		document_ids: document_ids.iter().map(|id| id.to_string()).collect(),
		contract_count: document_ids.len(),
		total_value: value_per_document * document_ids.len() as f64,
		created_at: now,
		updated_at: now,
	}
}

pub fn binding(pairs: &[(&str, Value)]) -> GraphBinding {
	let mut binding = GraphBinding::new();

	for (key, value) in pairs {
		binding.insert(key.to_string(), value.clone());
	}

	binding
}

/// In-memory document store keyed by `collection/key` resource paths.
#[derive(Default)]
pub struct MemoryStore {
	docs: Mutex<BTreeMap<String, StoredDocument>>,
	vector_rows: Mutex<Vec<StoredDocument>>,
	raw_rows: Mutex<Vec<StoredDocument>>,
	raw_queries: Mutex<Vec<String>>,
	failing: Mutex<Vec<String>>,
	last_cost: Mutex<f64>,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, key: &str, fields: Value) {
		let id = key.rsplit('/').next().unwrap_or(key).to_string();

		self.lock_docs().insert(key.to_string(), StoredDocument { id, fields });
	}

	pub fn insert_contract(&self, id: &str, fields: Value) {
		self.insert(&format!("contracts/{id}"), fields);
	}

	pub fn set_vector_rows(&self, rows: Vec<StoredDocument>) {
		*self.vector_rows.lock().unwrap_or_else(|err| err.into_inner()) = rows;
	}

	pub fn set_raw_rows(&self, rows: Vec<StoredDocument>) {
		*self.raw_rows.lock().unwrap_or_else(|err| err.into_inner()) = rows;
	}

	/// Every later call to the named operation fails with `Unavailable`.
	pub fn fail_operation(&self, operation: &str) {
		self.failing.lock().unwrap_or_else(|err| err.into_inner()).push(operation.to_string());
	}

	pub fn raw_queries(&self) -> Vec<String> {
		self.raw_queries.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn lock_docs(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredDocument>> {
		self.docs.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn check(&self, operation: &str) -> Result<()> {
		let failing = self.failing.lock().unwrap_or_else(|err| err.into_inner());

		if failing.iter().any(|name| name == operation) {
			return Err(Error::Unavailable(format!("{operation} scripted to fail")));
		}

		Ok(())
	}

	fn charge(&self, cost: f64) {
		*self.last_cost.lock().unwrap_or_else(|err| err.into_inner()) = cost;
	}
}
impl DocumentStore for MemoryStore {
	fn point_read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<StoredDocument>>> {
		Box::pin(async move {
			self.check("point_read")?;
			self.charge(1.0);

			Ok(self.lock_docs().get(key).cloned())
		})
	}

	fn filtered_query<'a>(
		&'a self,
		predicate: &'a Predicate,
		limit: u32,
		offset: u32,
	) -> BoxFuture<'a, Result<QueryPage>> {
		Box::pin(async move {
			self.check("filtered_query")?;
			self.charge(3.0);

			let matched: Vec<StoredDocument> = self
				.lock_docs()
				.iter()
				.filter(|(key, _)| key.starts_with("contracts/"))
				.filter(|(_, doc)| predicate.matches(&doc.fields))
				.map(|(_, doc)| doc.clone())
				.collect();
			let total_count = Some(matched.len() as u64);
			let rows =
				matched.into_iter().skip(offset as usize).take(limit as usize).collect();

			Ok(QueryPage { rows, total_count })
		})
	}

	fn batch_read<'a>(
		&'a self,
		ids: &'a [String],
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<StoredDocument>>> {
		Box::pin(async move {
			self.check("batch_read")?;
			self.charge(1.0);

			let docs = self.lock_docs();

			Ok(ids
				.iter()
				.take(limit as usize)
				.filter_map(|id| docs.get(&format!("contracts/{id}")).cloned())
				.collect())
		})
	}

	fn vector_query<'a>(
		&'a self,
		_embedding: &'a [f32],
		_text: Option<&'a str>,
		_method: VectorMethod,
		limit: u32,
	) -> BoxFuture<'a, Result<VectorHits>> {
		Box::pin(async move {
			self.check("vector_query")?;
			self.charge(2.0);

			let rows: Vec<StoredDocument> = self
				.vector_rows
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.iter()
				.take(limit as usize)
				.cloned()
				.collect();

			Ok(VectorHits { rows, cost: 2.0 })
		})
	}

	fn aggregate_read<'a>(&'a self, key: &'a str, field: &'a str) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move {
			self.check("aggregate_read")?;
			self.charge(1.0);

			self.lock_docs()
				.get(key)
				.and_then(|doc| doc.fields.get(field).cloned())
				.ok_or_else(|| Error::NotFound(format!("{key}.{field}")))
		})
	}

	fn raw_query<'a>(
		&'a self,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<StoredDocument>>> {
		Box::pin(async move {
			self.check("raw_query")?;
			self.charge(2.0);
			self.raw_queries
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.push(query.to_string());

			let canned = self.raw_rows.lock().unwrap_or_else(|err| err.into_inner()).clone();

			if !canned.is_empty() {
				return Ok(canned.into_iter().take(limit as usize).collect());
			}

			Ok(self
				.lock_docs()
				.iter()
				.filter(|(key, _)| key.starts_with("contracts/"))
				.take(limit as usize)
				.map(|(_, doc)| doc.clone())
				.collect())
		})
	}

	fn last_request_cost(&self) -> f64 {
		*self.last_cost.lock().unwrap_or_else(|err| err.into_inner())
	}
}

/// Graph backend returning canned binding rows.
#[derive(Default)]
pub struct MemoryGraph {
	bindings: Mutex<Vec<GraphBinding>>,
	queries: Mutex<Vec<String>>,
	failing: Mutex<bool>,
}
impl MemoryGraph {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_bindings(&self, bindings: Vec<GraphBinding>) {
		*self.bindings.lock().unwrap_or_else(|err| err.into_inner()) = bindings;
	}

	pub fn fail(&self) {
		*self.failing.lock().unwrap_or_else(|err| err.into_inner()) = true;
	}

	pub fn queries(&self) -> Vec<String> {
		self.queries.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl GraphBackend for MemoryGraph {
	fn execute<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Vec<GraphBinding>>> {
		Box::pin(async move {
			self.queries.lock().unwrap_or_else(|err| err.into_inner()).push(query.to_string());

			if *self.failing.lock().unwrap_or_else(|err| err.into_inner()) {
				return Err(Error::Unavailable("graph scripted to fail".to_string()));
			}

			Ok(self.bindings.lock().unwrap_or_else(|err| err.into_inner()).clone())
		})
	}
}

/// Catalog persistence over a seeded record list; upserts are captured for
/// assertions and written back so reloads observe them.
#[derive(Default)]
pub struct MemoryCatalog {
	records: Mutex<Vec<EntityRecord>>,
	upserts: Mutex<Vec<EntityRecord>>,
}
impl MemoryCatalog {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn seeded(records: Vec<EntityRecord>) -> Self {
		Self { records: Mutex::new(records), upserts: Mutex::new(Vec::new()) }
	}

	pub fn upserts(&self) -> Vec<EntityRecord> {
		self.upserts.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl CatalogPersistence for MemoryCatalog {
	fn bulk_load(&self, category: EntityCategory) -> BoxFuture<'_, Result<Vec<EntityRecord>>> {
		Box::pin(async move {
			Ok(self
				.records
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.iter()
				.filter(|record| record.category == category)
				.cloned()
				.collect())
		})
	}

	fn upsert<'a>(&'a self, record: &'a EntityRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut records = self.records.lock().unwrap_or_else(|err| err.into_inner());

			match records
				.iter_mut()
				.find(|existing| existing.category == record.category && existing.key == record.key)
			{
				Some(existing) => *existing = record.clone(),
				None => records.push(record.clone()),
			}

			drop(records);

			self.upserts.lock().unwrap_or_else(|err| err.into_inner()).push(record.clone());

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use gavel_backends::FilterTerm;

	use super::*;

	#[tokio::test]
	async fn filtered_query_applies_predicate_and_limit() {
		let store = MemoryStore::new();

		store.insert_contract("CT-1", json!({ "governing_law": "delaware" }));
		store.insert_contract("CT-2", json!({ "governing_law": "alabama" }));
		store.insert_contract("CT-3", json!({ "governing_law": "delaware" }));

		let predicate = Predicate::new(vec![FilterTerm::eq("governing_law", "delaware")]);
		let page = store.filtered_query(&predicate, 1, 0).await.unwrap();

		assert_eq!(page.total_count, Some(2));
		assert_eq!(page.rows.len(), 1);
		assert_eq!(store.last_request_cost(), 3.0);
	}

	#[tokio::test]
	async fn scripted_failure_hits_only_the_named_operation() {
		let store = MemoryStore::new();

		store.insert_contract("CT-1", json!({}));
		store.fail_operation("filtered_query");

		assert!(store.filtered_query(&Predicate::default(), 10, 0).await.is_err());
		assert!(store.point_read("contracts/CT-1").await.unwrap().is_some());
	}

	#[tokio::test]
	async fn upsert_feeds_later_bulk_loads() {
		let persistence = MemoryCatalog::new();
		let record =
			entity_record(EntityCategory::ContractorParty, "Acme Corporation", &["CT-1"], 100.0);

		persistence.upsert(&record).await.unwrap();

		let loaded = persistence.bulk_load(EntityCategory::ContractorParty).await.unwrap();

		assert_eq!(loaded.len(), 1);
		assert_eq!(loaded[0].key, "acme");
		assert_eq!(persistence.upserts().len(), 1);
	}
}
