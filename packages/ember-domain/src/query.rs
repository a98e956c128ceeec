use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedQuery {
	pub original_query: String,
	pub enhanced_query: String,
	pub hyde_document: Option<String>,
	pub query_variants: Vec<String>,
}
impl EnhancedQuery {
	pub fn passthrough(query: &str) -> Self {
		Self {
			original_query: query.to_string(),
			enhanced_query: query.to_string(),
			hyde_document: None,
			query_variants: vec![query.to_string()],
		}
	}

	/// The fan-out list for retrieval: the enhanced query, the HyDE document,
	/// and every variant, de-duplicated in first-seen order. Never empty.
	pub fn search_queries(&self) -> Vec<String> {
		let mut out = Vec::new();
		let mut seen = HashSet::new();

		push_query(&mut out, &mut seen, &self.enhanced_query);

		if let Some(hyde) = self.hyde_document.as_deref() {
			push_query(&mut out, &mut seen, hyde);
		}

		for variant in &self.query_variants {
			push_query(&mut out, &mut seen, variant);
		}

		if out.is_empty() {
			return vec![self.original_query.clone()];
		}

		out
	}
}

fn push_query(out: &mut Vec<String>, seen: &mut HashSet<String>, value: &str) {
	let trimmed = value.trim();

	if trimmed.is_empty() {
		return;
	}

	if seen.insert(trimmed.to_string()) {
		out.push(trimmed.to_string());
	}
}
