mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Catalog, Config, EmbeddingProviderConfig, LlmProviderConfig, Optimizer, Planner, Providers,
	Service,
};

use std::{fs, path::Path};

pub const PLANNER_MODES: [&str; 3] = ["compare_only", "always_execute", "split_test"];

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn normalize(cfg: &mut Config) {
	cfg.planner.mode = cfg.planner.mode.trim().to_lowercase();
	cfg.providers.llm.api_base = cfg.providers.llm.api_base.trim_end_matches('/').to_string();
	cfg.providers.embedding.api_base =
		cfg.providers.embedding.api_base.trim_end_matches('/').to_string();

	for field in &mut cfg.optimizer.indexed_fields {
		*field = field.trim().to_lowercase();
	}

	cfg.optimizer.indexed_fields.sort();
	cfg.optimizer.indexed_fields.dedup();
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if !(cfg.catalog.match_threshold > 0.0 && cfg.catalog.match_threshold <= 1.0) {
		return Err(Error::Validation {
			message: "catalog.match_threshold must be within (0, 1].".to_string(),
		});
	}
	if cfg.catalog.audit_queue_capacity == 0 {
		return Err(Error::Validation {
			message: "catalog.audit_queue_capacity must be greater than zero.".to_string(),
		});
	}
	if !PLANNER_MODES.contains(&cfg.planner.mode.as_str()) {
		return Err(Error::Validation {
			message: "planner.mode must be one of compare_only, always_execute, or split_test."
				.to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.planner.split_ratio) {
		return Err(Error::Validation {
			message: "planner.split_ratio must be within [0, 1].".to_string(),
		});
	}
	if cfg.planner.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "planner.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.planner.min_confidence) {
		return Err(Error::Validation {
			message: "planner.min_confidence must be within [0, 1].".to_string(),
		});
	}
	if cfg.optimizer.indexed_fields.is_empty() {
		return Err(Error::Validation {
			message: "optimizer.indexed_fields must list at least one field.".to_string(),
		});
	}
	if cfg.optimizer.default_limit == 0 {
		return Err(Error::Validation {
			message: "optimizer.default_limit must be greater than zero.".to_string(),
		});
	}
	if !(0.0..=2.0).contains(&cfg.providers.llm.temperature) {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be within [0, 2].".to_string(),
		});
	}
	if cfg.providers.llm.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.llm.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}
