pub mod audit;
pub mod catalog;
pub mod decision;
pub mod execute;
pub mod llm_planner;
pub mod optimizer;
pub mod strategy;
pub mod tracker;

use std::{future::Future, pin::Pin, sync::Arc};

pub use audit::{AuditEvent, AuditSink};
pub use catalog::CatalogHandle;
pub use decision::{Decision, SelectionAlgorithm, Strategy};
pub use execute::PlanAndFetchResult;
pub use llm_planner::{
	LlmPlan, LlmQueryPlanner, PlanValidation, PlannerMode, QueryLanguage, parse_plan,
	validate_plan,
};
pub use optimizer::{OptimalPath, PathStrategy, QueryOptimizer};
pub use tracker::{
	Backend, ExecutionTrace, ExecutionTracker, LlmComparison, OverallStatus, StepStatus, render,
};

use gavel_backends::{CatalogPersistence, DocumentStore, GraphBackend};
use gavel_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use gavel_domain::NegationDetector;
use gavel_providers::Completion;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Global tracing from the configured log level. Call once at startup.
pub fn init_tracing(cfg: &Config) {
	let filter = tracing_subscriber::EnvFilter::try_new(&cfg.service.log_level)
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Backend error: {message}")]
	Backend { message: String },
}
impl From<gavel_backends::Error> for ServiceError {
	fn from(err: gavel_backends::Error) -> Self {
		Self::Backend { message: err.to_string() }
	}
}
impl From<color_eyre::Report> for ServiceError {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system_prompt: &'a str,
		user_prompt: &'a str,
		json_mode: bool,
		deterministic: bool,
	) -> BoxFuture<'a, color_eyre::Result<Completion>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub llm: Arc<dyn CompletionProvider>,
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(llm: Arc<dyn CompletionProvider>, embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { llm, embedding }
	}
}
impl Default for Providers {
	fn default() -> Self {
		Self::new(Arc::new(DefaultProviders), Arc::new(DefaultProviders))
	}
}

struct DefaultProviders;
impl CompletionProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system_prompt: &'a str,
		user_prompt: &'a str,
		json_mode: bool,
		deterministic: bool,
	) -> BoxFuture<'a, color_eyre::Result<Completion>> {
		Box::pin(gavel_providers::complete(cfg, system_prompt, user_prompt, json_mode, deterministic))
	}
}
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(gavel_providers::embed(cfg, text))
	}
}

pub struct GavelService {
	pub cfg: Config,
	pub catalog: CatalogHandle,
	pub store: Arc<dyn DocumentStore>,
	pub graph: Arc<dyn GraphBackend>,
	pub providers: Providers,
	pub audit: AuditSink,
	pub(crate) detector: NegationDetector,
	pub(crate) optimizer: QueryOptimizer,
	pub(crate) planner: LlmQueryPlanner,
	pub(crate) planner_mode: PlannerMode,
}
impl GavelService {
	pub async fn new(
		cfg: Config,
		store: Arc<dyn DocumentStore>,
		graph: Arc<dyn GraphBackend>,
		persistence: Arc<dyn CatalogPersistence>,
		providers: Providers,
		audit: AuditSink,
	) -> ServiceResult<Self> {
		let planner_mode =
			PlannerMode::parse(&cfg.planner.mode).ok_or_else(|| ServiceError::InvalidRequest {
				message: format!("unknown planner mode: {}", cfg.planner.mode),
			})?;
		let catalog =
			CatalogHandle::load(persistence, cfg.catalog.match_threshold).await?;
		let optimizer = QueryOptimizer::new(cfg.optimizer.indexed_fields.clone());
		let planner =
			LlmQueryPlanner::new(cfg.providers.llm.clone(), cfg.planner.min_confidence);

		Ok(Self {
			catalog,
			store,
			graph,
			providers,
			audit,
			detector: NegationDetector::new(),
			optimizer,
			planner,
			planner_mode,
			cfg,
		})
	}
}
