use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// One chat completion, plus the usage accounting callers log alongside plan
/// decisions.
#[derive(Debug, Clone)]
pub struct Completion {
	pub text: String,
	pub token_usage: u64,
	pub model_id: String,
}

pub async fn complete(
	cfg: &gavel_config::LlmProviderConfig,
	system_prompt: &str,
	user_prompt: &str,
	json_mode: bool,
	deterministic: bool,
) -> Result<Completion> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let temperature = if deterministic { 0.0 } else { cfg.temperature };
	let mut body = serde_json::json!({
		"model": cfg.model,
		"temperature": temperature,
		"messages": [
			{ "role": "system", "content": system_prompt },
			{ "role": "user", "content": user_prompt },
		],
	});

	if json_mode && let Some(map) = body.as_object_mut() {
		map.insert(
			"response_format".to_string(),
			serde_json::json!({ "type": "json_object" }),
		);
	}

	for _ in 0..3 {
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		if let Ok(parsed) = parse_completion_response(json) {
			return Ok(parsed);
		}
	}

	Err(eyre::eyre!("Completion response is missing message content."))
}

fn parse_completion_response(json: Value) -> Result<Completion> {
	let text = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| eyre::eyre!("Completion response is missing message content."))?
		.to_string();
	let token_usage = json
		.get("usage")
		.and_then(|usage| usage.get("total_tokens"))
		.and_then(|v| v.as_u64())
		.unwrap_or(0);
	let model_id =
		json.get("model").and_then(|v| v.as_str()).unwrap_or_default().to_string();

	Ok(Completion { text, token_usage, model_id })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_choice_content_and_usage() {
		let json = serde_json::json!({
			"model": "planner-model",
			"choices": [
				{ "message": { "content": "GRAPH" } }
			],
			"usage": { "total_tokens": 42 }
		});
		let completion = parse_completion_response(json).expect("parse failed");

		assert_eq!(completion.text, "GRAPH");
		assert_eq!(completion.token_usage, 42);
		assert_eq!(completion.model_id, "planner-model");
	}

	#[test]
	fn rejects_payload_without_content() {
		let json = serde_json::json!({ "choices": [] });

		assert!(parse_completion_response(json).is_err());
	}
}
