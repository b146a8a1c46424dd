//! Collaborator contracts for the engine: the document store, the graph
//! backend, and catalog persistence. Physical engines live behind these
//! traits; the engine itself never talks wire protocols.

mod error;
mod predicate;

pub use error::{Error, Result};
pub use predicate::{FilterOp, FilterTerm, Predicate};

use std::{future::Future, pin::Pin};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use gavel_domain::{EntityCategory, EntityRecord};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
	pub id: String,
	pub fields: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryPage {
	pub rows: Vec<StoredDocument>,
	pub total_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHits {
	pub rows: Vec<StoredDocument>,
	pub cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorMethod {
	Similarity,
	Hybrid,
}

/// Row of key/value bindings returned by a graph query.
pub type GraphBinding = serde_json::Map<String, Value>;

pub trait DocumentStore
where
	Self: Send + Sync,
{
	fn point_read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<StoredDocument>>>;

	fn filtered_query<'a>(
		&'a self,
		predicate: &'a Predicate,
		limit: u32,
		offset: u32,
	) -> BoxFuture<'a, Result<QueryPage>>;

	fn batch_read<'a>(
		&'a self,
		ids: &'a [String],
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<StoredDocument>>>;

	fn vector_query<'a>(
		&'a self,
		embedding: &'a [f32],
		text: Option<&'a str>,
		method: VectorMethod,
		limit: u32,
	) -> BoxFuture<'a, Result<VectorHits>>;

	fn aggregate_read<'a>(&'a self, key: &'a str, field: &'a str) -> BoxFuture<'a, Result<Value>>;

	/// Run a validated, read-only query string. Only plans that passed the
	/// syntax/safety validator ever reach this.
	fn raw_query<'a>(
		&'a self,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<StoredDocument>>>;

	/// Cost units charged by the most recent request on this store.
	fn last_request_cost(&self) -> f64;
}

pub trait GraphBackend
where
	Self: Send + Sync,
{
	fn execute<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Vec<GraphBinding>>>;
}

pub trait CatalogPersistence
where
	Self: Send + Sync,
{
	fn bulk_load(&self, category: EntityCategory) -> BoxFuture<'_, Result<Vec<EntityRecord>>>;

	fn upsert<'a>(&'a self, record: &'a EntityRecord) -> BoxFuture<'a, Result<()>>;
}
