//! Explicit catalog lifecycle: bulk-loaded once at startup, swap-reloaded on
//! demand, and written through a per-category serialized path during
//! ingestion. Query-time reads never take a write lock.

use std::sync::{Arc, RwLock};

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::info;

use gavel_backends::CatalogPersistence;
use gavel_domain::{EntityCatalog, EntityCategory, EntityRecord};

use crate::{ServiceError, ServiceResult};

pub struct CatalogHandle {
	catalog: RwLock<EntityCatalog>,
	// "append doc id if absent, else increment" is not composable under
	// concurrent writers, so ingestion serializes per category.
	writers: [Mutex<()>; EntityCategory::ALL.len()],
	persistence: Arc<dyn CatalogPersistence>,
	match_threshold: f64,
}
impl CatalogHandle {
	pub async fn load(
		persistence: Arc<dyn CatalogPersistence>,
		match_threshold: f64,
	) -> ServiceResult<Self> {
		let catalog = bulk_load(persistence.as_ref(), match_threshold).await?;

		info!(records = catalog.len(), "Entity catalog loaded.");

		Ok(Self {
			catalog: RwLock::new(catalog),
			writers: Default::default(),
			persistence,
			match_threshold,
		})
	}

	/// Re-read every category and swap the in-memory catalog wholesale.
	pub async fn reload(&self) -> ServiceResult<()> {
		let fresh = bulk_load(self.persistence.as_ref(), self.match_threshold).await?;

		info!(records = fresh.len(), "Entity catalog reloaded.");

		*self.catalog.write().map_err(poisoned)? = fresh;

		Ok(())
	}

	/// Read-only access for query processing.
	pub fn with<R>(&self, f: impl FnOnce(&EntityCatalog) -> R) -> R {
		let guard = self.catalog.read().unwrap_or_else(|err| err.into_inner());

		f(&guard)
	}

	/// Ingestion-time observation. Safe to call twice with the same
	/// `(category, document_id)`; the count will not change.
	pub async fn record_observation(
		&self,
		category: EntityCategory,
		display_name: &str,
		document_id: &str,
		value: f64,
	) -> ServiceResult<EntityRecord> {
		let writer = &self.writers[category_index(category)];
		let _serialized = writer.lock().await;
		let record = {
			let mut guard = self.catalog.write().map_err(poisoned)?;

			guard
				.update_or_create(category, display_name, document_id, value, OffsetDateTime::now_utc())
				.clone()
		};

		self.persistence.upsert(&record).await?;

		Ok(record)
	}
}

async fn bulk_load(
	persistence: &dyn CatalogPersistence,
	match_threshold: f64,
) -> ServiceResult<EntityCatalog> {
	let mut catalog = EntityCatalog::new(match_threshold);

	for category in EntityCategory::ALL {
		for record in persistence.bulk_load(category).await? {
			catalog.insert(record);
		}
	}

	Ok(catalog)
}

fn category_index(category: EntityCategory) -> usize {
	EntityCategory::ALL
		.iter()
		.position(|candidate| *candidate == category)
		.unwrap_or_default()
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> ServiceError {
	ServiceError::Backend { message: "catalog lock poisoned".to_string() }
}
