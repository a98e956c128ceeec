use crate::{Pipeline, fusion, policy::RagPolicy};
use ember_domain::{Candidate, Corpus, RetrievalMethod, StageRecord};

#[derive(Debug, Default)]
pub struct CorpusLists {
	pub vector: Vec<Candidate>,
	pub keyword: Vec<Candidate>,
}

#[derive(Debug, Default)]
pub struct RetrievedLists {
	pub knowledge: CorpusLists,
	pub email: CorpusLists,
}
impl RetrievedLists {
	pub fn total_len(&self) -> usize {
		self.knowledge.vector.len()
			+ self.knowledge.keyword.len()
			+ self.email.vector.len()
			+ self.email.keyword.len()
	}
}

/// One query string fanned out to both corpora. The four searches are issued
/// together; each failure degrades that source to an empty list.
pub async fn retrieve_for_query(
	pipeline: &Pipeline,
	query: &str,
	query_vector: Option<&[f32]>,
	policy: &RagPolicy,
) -> RetrievedLists {
	let limit = policy.candidate_limit();
	let threshold_hint = Some(policy.thresholds.knowledge_base);
	let (knowledge_vector, email_vector, knowledge_keyword, email_keyword) = tokio::join!(
		vector_search(pipeline, Corpus::KnowledgeBase, query_vector, limit, threshold_hint),
		vector_search(pipeline, Corpus::Email, query_vector, limit, threshold_hint),
		keyword_search(pipeline, Corpus::KnowledgeBase, query, limit, policy.hybrid_enabled),
		keyword_search(pipeline, Corpus::Email, query, limit, policy.hybrid_enabled),
	);

	RetrievedLists {
		knowledge: CorpusLists {
			vector: normalize_list(knowledge_vector, RetrievalMethod::Vector),
			keyword: normalize_list(knowledge_keyword, RetrievalMethod::Keyword),
		},
		email: CorpusLists {
			vector: normalize_list(email_vector, RetrievalMethod::Vector),
			keyword: normalize_list(email_keyword, RetrievalMethod::Keyword),
		},
	}
}

async fn vector_search(
	pipeline: &Pipeline,
	corpus: Corpus,
	vector: Option<&[f32]>,
	limit: u32,
	threshold_hint: Option<f32>,
) -> Vec<Candidate> {
	let Some(vector) = vector else { return Vec::new() };

	match pipeline.vector.search(corpus, vector, limit, threshold_hint).await {
		Ok(hits) => hits,
		Err(err) => {
			tracing::warn!(
				corpus = corpus.as_str(),
				error = %err,
				"Vector search failed; degraded to empty."
			);

			Vec::new()
		},
	}
}

async fn keyword_search(
	pipeline: &Pipeline,
	corpus: Corpus,
	query: &str,
	limit: u32,
	enabled: bool,
) -> Vec<Candidate> {
	if !enabled {
		return Vec::new();
	}

	match pipeline.keyword.search(corpus, query, limit).await {
		Ok(hits) => hits,
		Err(err) => {
			tracing::warn!(
				corpus = corpus.as_str(),
				error = %err,
				"Keyword search failed; degraded to empty."
			);

			Vec::new()
		},
	}
}

/// De-duplicates by id, re-sorts defensively, and stamps each hit with its
/// 1-based rank in the list it came from.
fn normalize_list(hits: Vec<Candidate>, method: RetrievalMethod) -> Vec<Candidate> {
	let mut seen = std::collections::HashSet::new();
	let mut unique: Vec<Candidate> = Vec::with_capacity(hits.len());

	for hit in hits {
		if seen.insert(hit.id.clone()) {
			unique.push(hit);
		}
	}

	unique.sort_by(|a, b| {
		fusion::cmp_score_desc(a.score, b.score).then_with(|| a.id.cmp(&b.id))
	});

	unique
		.iter()
		.enumerate()
		.map(|(idx, hit)| {
			hit.recorded(StageRecord::Retrieval {
				method,
				rank: idx as u32 + 1,
				score: hit.score,
			})
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalize_drops_duplicate_ids_and_ranks() {
		let hits = vec![
			Candidate::new("a", Corpus::KnowledgeBase, "", "", 0.5),
			Candidate::new("b", Corpus::KnowledgeBase, "", "", 0.9),
			Candidate::new("a", Corpus::KnowledgeBase, "", "", 0.4),
		];
		let normalized = normalize_list(hits, RetrievalMethod::Vector);

		assert_eq!(normalized.len(), 2);
		assert_eq!(normalized[0].id, "b");
		assert_eq!(
			normalized[0].history,
			vec![StageRecord::Retrieval { method: RetrievalMethod::Vector, rank: 1, score: 0.9 }]
		);
		assert_eq!(normalized[1].id, "a");
		assert_eq!(normalized[1].score, 0.5);
	}
}
