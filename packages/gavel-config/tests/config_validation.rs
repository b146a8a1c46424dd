use toml::Value;

use gavel_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn parse_template() -> Value {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.")
}

fn load_from_value(value: Value) -> Result<Config, Error> {
	let raw = toml::to_string(&value).expect("Failed to render template config.");
	let mut cfg: Config = toml::from_str(&raw).expect("Failed to parse rendered config.");

	gavel_config::normalize(&mut cfg);
	gavel_config::validate(&cfg)?;

	Ok(cfg)
}

fn set_planner(value: &mut Value, key: &str, entry: Value) {
	value
		.as_table_mut()
		.and_then(|root| root.get_mut("planner"))
		.and_then(Value::as_table_mut)
		.expect("Template config must include [planner].")
		.insert(key.to_string(), entry);
}

#[test]
fn accepts_template_config() {
	let cfg = load_from_value(parse_template()).expect("Template config must validate.");

	assert_eq!(cfg.planner.mode, "compare_only");
	assert_eq!(cfg.providers.embedding.dimensions, 1536);
}

#[test]
fn normalizes_api_base_and_indexed_fields() {
	let mut value = parse_template();
	value
		.as_table_mut()
		.and_then(|root| root.get_mut("optimizer"))
		.and_then(Value::as_table_mut)
		.expect("Template config must include [optimizer].")
		.insert(
			"indexed_fields".to_string(),
			Value::Array(vec![
				Value::String("Governing_Law ".to_string()),
				Value::String("governing_law".to_string()),
				Value::String("contract_id".to_string()),
			]),
		);

	let cfg = load_from_value(value).expect("Config must validate.");

	assert_eq!(cfg.providers.llm.api_base, "http://localhost:8080");
	assert_eq!(cfg.optimizer.indexed_fields, vec!["contract_id", "governing_law"]);
}

#[test]
fn rejects_unknown_planner_mode() {
	let mut value = parse_template();

	set_planner(&mut value, "mode", Value::String("shadow".to_string()));

	let err = load_from_value(value).expect_err("Unknown planner mode must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn rejects_split_ratio_out_of_range() {
	let mut value = parse_template();

	set_planner(&mut value, "split_ratio", Value::Float(1.5));

	assert!(load_from_value(value).is_err());
}

#[test]
fn rejects_zero_planning_timeout() {
	let mut value = parse_template();

	set_planner(&mut value, "timeout_ms", Value::Integer(0));

	assert!(load_from_value(value).is_err());
}

#[test]
fn rejects_match_threshold_out_of_range() {
	let mut value = parse_template();
	value
		.as_table_mut()
		.and_then(|root| root.get_mut("catalog"))
		.and_then(Value::as_table_mut)
		.expect("Template config must include [catalog].")
		.insert("match_threshold".to_string(), Value::Float(0.0));

	assert!(load_from_value(value).is_err());
}

#[test]
fn rejects_empty_indexed_fields() {
	let mut value = parse_template();
	value
		.as_table_mut()
		.and_then(|root| root.get_mut("optimizer"))
		.and_then(Value::as_table_mut)
		.expect("Template config must include [optimizer].")
		.insert("indexed_fields".to_string(), Value::Array(vec![]));

	assert!(load_from_value(value).is_err());
}
