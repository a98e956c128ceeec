use std::collections::HashSet;

/// Query terms for lexical scoring: lowercase whitespace tokens longer than
/// two characters, de-duplicated in first-seen order.
pub fn terms(text: &str) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for token in text.split_whitespace() {
		let token = token.to_lowercase();

		if token.chars().count() <= 2 {
			continue;
		}
		if seen.insert(token.clone()) {
			out.push(token);
		}
	}

	out
}

pub fn term_set(text: &str) -> HashSet<String> {
	let mut out = HashSet::new();

	for token in text.split_whitespace() {
		let token = token.to_lowercase();

		if token.chars().count() <= 2 {
			continue;
		}

		out.insert(token);
	}

	out
}

pub fn jaccard(lhs: &HashSet<String>, rhs: &HashSet<String>) -> f32 {
	let union = lhs.union(rhs).count();

	if union == 0 {
		return 0.0;
	}

	let intersection = lhs.intersection(rhs).count();

	intersection as f32 / union as f32
}

/// Fraction of `query_terms` present in `content_terms`. Zero when the query
/// has no usable terms.
pub fn overlap_ratio(query_terms: &[String], content_terms: &HashSet<String>) -> f32 {
	if query_terms.is_empty() {
		return 0.0;
	}

	let matched = query_terms.iter().filter(|term| content_terms.contains(term.as_str())).count();

	matched as f32 / query_terms.len() as f32
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn terms_drop_short_tokens_and_duplicates() {
		assert_eq!(
			terms("The DNS of the DNS is a name system"),
			vec!["the".to_string(), "dns".to_string(), "name".to_string(), "system".to_string()]
		);
	}

	#[test]
	fn jaccard_of_disjoint_sets_is_zero() {
		let lhs = term_set("alpha beta gamma");
		let rhs = term_set("delta epsilon");

		assert_eq!(jaccard(&lhs, &rhs), 0.0);
	}

	#[test]
	fn jaccard_of_identical_sets_is_one() {
		let lhs = term_set("alpha beta gamma");

		assert_eq!(jaccard(&lhs, &lhs), 1.0);
	}

	#[test]
	fn jaccard_of_empty_sets_is_zero() {
		let empty = HashSet::new();

		assert_eq!(jaccard(&empty, &empty), 0.0);
	}

	#[test]
	fn overlap_ratio_counts_matched_query_terms() {
		let query = terms("postgres connection pooling");
		let content = term_set("tuning connection pooling for postgres in production");

		assert_eq!(overlap_ratio(&query, &content), 1.0);

		let content = term_set("unrelated words entirely");

		assert_eq!(overlap_ratio(&query, &content), 0.0);
	}
}
