use regex::Regex;

use crate::{Error, HistoryTurn, Result, TextGenerator, policy::EnhancePolicy};
use ember_domain::EnhancedQuery;

/// Three independent enhancement steps over one generator: context injection,
/// HyDE, and multi-query variants. Each step degrades on its own; only a
/// context-rewrite failure with fallback disabled aborts.
pub async fn enhance(
	generator: &dyn TextGenerator,
	query: &str,
	history: &[HistoryTurn],
	policy: &EnhancePolicy,
) -> Result<EnhancedQuery> {
	let mut enhanced_query = query.trim().to_string();

	if policy.context.enabled && !history.is_empty() {
		let prompt =
			build_context_prompt(query, history, policy.context.max_history_turns as usize);

		match generator.generate(&prompt, policy.temperature, policy.max_tokens).await {
			Ok(text) if !text.trim().is_empty() => enhanced_query = text.trim().to_string(),
			Ok(_) => {
				tracing::warn!("Context rewrite returned empty text; keeping the original query.");
			},
			Err(err) if policy.context.fallback_on_error => {
				tracing::warn!(error = %err, "Context rewrite failed; keeping the original query.");
			},
			Err(err) =>
				return Err(Error::Enhancement {
					message: format!("Context rewrite failed: {err}"),
				}),
		}
	}

	let hyde_document = if policy.hyde.enabled {
		match generator
			.generate(&build_hyde_prompt(&enhanced_query), policy.temperature, policy.max_tokens)
			.await
		{
			Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
			Ok(_) => {
				tracing::warn!("HyDE returned empty text; continuing without it.");

				None
			},
			Err(err) => {
				tracing::warn!(error = %err, "HyDE generation failed; continuing without it.");

				None
			},
		}
	} else {
		None
	};

	let query_variants = if policy.multi_query.enabled && policy.multi_query.count > 0 {
		let count = policy.multi_query.count as usize;
		let prompt = build_variants_prompt(&enhanced_query, count);

		match generator.generate(&prompt, policy.temperature, policy.max_tokens).await {
			Ok(raw) => {
				let variants = parse_variants(&raw, count);

				if variants.is_empty() {
					tracing::warn!("Variant generation produced nothing usable; falling back.");

					vec![enhanced_query.clone()]
				} else {
					variants
				}
			},
			Err(err) => {
				tracing::warn!(error = %err, "Variant generation failed; falling back.");

				vec![enhanced_query.clone()]
			},
		}
	} else {
		vec![enhanced_query.clone()]
	};

	Ok(EnhancedQuery {
		original_query: query.to_string(),
		enhanced_query,
		hyde_document,
		query_variants,
	})
}

fn build_context_prompt(query: &str, history: &[HistoryTurn], max_turns: usize) -> String {
	let start = history.len().saturating_sub(max_turns);
	let mut out = String::from(
		"Rewrite the final user message as one standalone search query. \
		Resolve pronouns and references using the conversation. \
		Return only the rewritten query.\n\nConversation:\n",
	);

	for turn in &history[start..] {
		out.push_str(&format!("{}: {}\n", turn.role, turn.content));
	}

	out.push_str(&format!("\nFinal user message:\n{query}"));

	out
}

fn build_hyde_prompt(query: &str) -> String {
	format!(
		"Write a short factual passage that directly answers the question below, \
		as it would appear in a knowledge base or an email. \
		Return only the passage.\n\nQuestion:\n{query}"
	)
}

fn build_variants_prompt(query: &str, count: usize) -> String {
	format!(
		"Return a JSON array of {count} alternative phrasings of the search query below. \
		Keep each phrasing short and preserve the intent. \
		Output the JSON array only.\n\nQuery:\n{query}"
	)
}

/// Variant parsing tries, in order: a bare JSON array, a markdown-fenced JSON
/// array, then line-by-line splitting of numbered, bulleted, or quoted lines.
pub fn parse_variants(raw: &str, count: usize) -> Vec<String> {
	let trimmed = raw.trim();

	if let Ok(values) = serde_json::from_str::<Vec<String>>(trimmed) {
		return clean_variants(values, count);
	}

	if let Some(block) = extract_fenced_array(trimmed)
		&& let Ok(values) = serde_json::from_str::<Vec<String>>(&block)
	{
		return clean_variants(values, count);
	}

	clean_variants(parse_lines(trimmed), count)
}

fn extract_fenced_array(raw: &str) -> Option<String> {
	let pattern = Regex::new(r"(?s)```(?:json)?\s*(\[.*?\])\s*```").ok()?;

	pattern.captures(raw).map(|caps| caps[1].to_string())
}

fn parse_lines(raw: &str) -> Vec<String> {
	let marker = Regex::new(r#"^\s*(?:\d+[.)]\s*|[-*]\s+|"[^"]*"$)"#).ok();
	let mut marked = Vec::new();
	let mut plain = Vec::new();

	for line in raw.lines() {
		let trimmed = line.trim();

		if trimmed.is_empty() {
			continue;
		}

		let is_marked =
			marker.as_ref().map(|pattern| pattern.is_match(trimmed)).unwrap_or(false);
		let stripped = strip_line_markers(trimmed);

		if is_marked {
			marked.push(stripped);
		} else {
			plain.push(stripped);
		}
	}

	// A response with any recognizably listed lines is a list; otherwise take
	// every non-empty line.
	if marked.is_empty() { plain } else { marked }
}

fn strip_line_markers(line: &str) -> String {
	let without_marker = Regex::new(r"^\s*(?:\d+[.)]\s*|[-*]\s+)")
		.map(|pattern| pattern.replace(line, "").into_owned())
		.unwrap_or_else(|_| line.to_string());
	let trimmed = without_marker.trim();

	if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
		return trimmed[1..trimmed.len() - 1].trim().to_string();
	}

	trimmed.to_string()
}

fn clean_variants(values: Vec<String>, count: usize) -> Vec<String> {
	values
		.into_iter()
		.map(|value| value.trim().to_string())
		.filter(|value| !value.is_empty())
		.take(count)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_bare_json_array() {
		let raw = r#"["first phrasing", "second phrasing"]"#;

		assert_eq!(
			parse_variants(raw, 3),
			vec!["first phrasing".to_string(), "second phrasing".to_string()]
		);
	}

	#[test]
	fn parses_fenced_json_array() {
		let raw = "Here you go:\n```json\n[\"one\", \"two\"]\n```\n";

		assert_eq!(parse_variants(raw, 3), vec!["one".to_string(), "two".to_string()]);
	}

	#[test]
	fn parses_numbered_lines() {
		let raw = "1. first phrasing\n2) second phrasing\n3. third phrasing";

		assert_eq!(
			parse_variants(raw, 3),
			vec![
				"first phrasing".to_string(),
				"second phrasing".to_string(),
				"third phrasing".to_string()
			]
		);
	}

	#[test]
	fn parses_bulleted_and_quoted_lines() {
		let raw = "- \"first phrasing\"\n- second phrasing";

		assert_eq!(
			parse_variants(raw, 3),
			vec!["first phrasing".to_string(), "second phrasing".to_string()]
		);
	}

	#[test]
	fn listed_lines_win_over_prose() {
		let raw = "Here are the variants:\n1. first\n2. second";

		assert_eq!(parse_variants(raw, 5), vec!["first".to_string(), "second".to_string()]);
	}

	#[test]
	fn caps_at_requested_count() {
		let raw = r#"["a1", "b2", "c3", "d4"]"#;

		assert_eq!(parse_variants(raw, 2), vec!["a1".to_string(), "b2".to_string()]);
	}

	#[test]
	fn empty_response_parses_to_nothing() {
		assert!(parse_variants("", 3).is_empty());
		assert!(parse_variants("[]", 3).is_empty());
	}

	#[test]
	fn context_prompt_keeps_only_recent_turns() {
		let history: Vec<HistoryTurn> = (0..10)
			.map(|idx| HistoryTurn { role: "user".to_string(), content: format!("turn {idx}") })
			.collect();
		let prompt = build_context_prompt("latest question", &history, 3);

		assert!(!prompt.contains("turn 6"));
		assert!(prompt.contains("turn 7"));
		assert!(prompt.contains("turn 9"));
		assert!(prompt.contains("latest question"));
	}
}
