use std::collections::HashSet;

use crate::{fusion, policy::RerankPolicy};
use ember_domain::{Candidate, SelectStrategy, StageRecord, text};

/// Lexical boost then diversity-aware selection. Output is the final ordered
/// candidate set, at most `select_k` long.
pub fn rerank(
	query: &str,
	candidates: &[Candidate],
	policy: &RerankPolicy,
	select_k: usize,
) -> Vec<Candidate> {
	let mut pool = if policy.semantic_boost.enabled {
		boost(query, candidates, policy)
	} else {
		candidates.to_vec()
	};

	pool.sort_by(|a, b| fusion::cmp_score_desc(a.score, b.score).then_with(|| a.id.cmp(&b.id)));

	if policy.mmr.enabled {
		return mmr_select(pool, select_k, policy.mmr.lambda);
	}
	if policy.diversity.enabled {
		return diversity_filter(pool, select_k, policy.diversity.threshold);
	}

	pool.truncate(select_k);

	pool.iter()
		.enumerate()
		.map(|(idx, candidate)| {
			candidate.recorded(StageRecord::Select {
				strategy: SelectStrategy::Truncate,
				mmr_score: None,
				nearest_similarity: None,
				position: idx as u32 + 1,
			})
		})
		.collect()
}

/// Bounded lexical-overlap boost. Candidates already below the confidence
/// floor stay untouched; the boost never rescues a weak match.
fn boost(query: &str, candidates: &[Candidate], policy: &RerankPolicy) -> Vec<Candidate> {
	let boost_policy = &policy.semantic_boost;
	let query_terms = text::terms(query);

	candidates
		.iter()
		.map(|candidate| {
			let content_terms = text::term_set(&candidate.content);
			let match_ratio = text::overlap_ratio(&query_terms, &content_terms);

			if candidate.score < boost_policy.min_score {
				return candidate.recorded(StageRecord::Boost {
					match_ratio,
					boost: 0.0,
					output: candidate.score,
				});
			}

			let boost = if boost_policy.dynamic {
				(match_ratio * boost_policy.max_boost * (1.0 + match_ratio))
					.min(2.0 * boost_policy.max_boost)
			} else {
				(match_ratio * boost_policy.max_boost).min(boost_policy.max_boost)
			};
			let score = (candidate.score + boost).clamp(0.0, 1.0);

			candidate.scored(score, StageRecord::Boost { match_ratio, boost, output: score })
		})
		.collect()
}

/// Greedy maximal-marginal-relevance selection over content token overlap.
/// Quadratic in the pool size, which stays bounded by the retrieval caps.
fn mmr_select(pool: Vec<Candidate>, select_k: usize, lambda: f32) -> Vec<Candidate> {
	if pool.is_empty() || select_k == 0 {
		return Vec::new();
	}

	let token_sets: Vec<HashSet<String>> =
		pool.iter().map(|candidate| text::term_set(&candidate.content)).collect();
	let mut remaining: Vec<usize> = (0..pool.len()).collect();
	let mut selected_indices: Vec<usize> = Vec::new();
	let mut out: Vec<Candidate> = Vec::new();

	while out.len() < select_k && !remaining.is_empty() {
		let mut best_pos = 0;
		let mut best_score = f32::NEG_INFINITY;
		let mut best_similarity: Option<f32> = None;

		for (pos, candidate_idx) in remaining.iter().copied().enumerate() {
			let relevance = pool[candidate_idx].score;
			let (mmr_score, similarity) = if selected_indices.is_empty() {
				(relevance, None)
			} else {
				let nearest = selected_indices
					.iter()
					.map(|selected_idx| {
						text::jaccard(&token_sets[candidate_idx], &token_sets[*selected_idx])
					})
					.fold(0.0_f32, f32::max);
				let score =
					(lambda * relevance - (1.0 - lambda) * nearest).clamp(0.0, 1.0);

				(score, Some(nearest))
			};

			if mmr_score > best_score {
				best_pos = pos;
				best_score = mmr_score;
				best_similarity = similarity;
			}
		}

		let picked_idx = remaining.remove(best_pos);

		out.push(pool[picked_idx].recorded(StageRecord::Select {
			strategy: SelectStrategy::Mmr,
			mmr_score: Some(best_score),
			nearest_similarity: best_similarity,
			position: out.len() as u32 + 1,
		}));
		selected_indices.push(picked_idx);
	}

	out
}

/// Keeps the top candidate, then admits the rest in score order only while
/// they stay lexically distinct from everything already kept.
fn diversity_filter(pool: Vec<Candidate>, select_k: usize, threshold: f32) -> Vec<Candidate> {
	if pool.is_empty() || select_k == 0 {
		return Vec::new();
	}

	let token_sets: Vec<HashSet<String>> =
		pool.iter().map(|candidate| text::term_set(&candidate.content)).collect();
	let mut kept_indices: Vec<usize> = Vec::new();
	let mut out: Vec<Candidate> = Vec::new();

	for (idx, candidate) in pool.iter().enumerate() {
		if out.len() >= select_k {
			break;
		}

		let nearest = kept_indices
			.iter()
			.map(|kept_idx| text::jaccard(&token_sets[idx], &token_sets[*kept_idx]))
			.fold(0.0_f32, f32::max);

		if !kept_indices.is_empty() && nearest >= threshold {
			continue;
		}

		out.push(candidate.recorded(StageRecord::Select {
			strategy: SelectStrategy::Diversity,
			mmr_score: None,
			nearest_similarity: if kept_indices.is_empty() { None } else { Some(nearest) },
			position: out.len() as u32 + 1,
		}));
		kept_indices.push(idx);
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::policy::{BoostPolicy, DiversityPolicy, MmrPolicy};
	use ember_domain::Corpus;

	fn kb(id: &str, content: &str, score: f32) -> Candidate {
		Candidate::new(id, Corpus::KnowledgeBase, "", content, score)
	}

	fn policy(boost: bool, mmr: bool, diversity: bool) -> RerankPolicy {
		RerankPolicy {
			semantic_boost: BoostPolicy {
				enabled: boost,
				max_boost: 0.2,
				min_score: 0.3,
				dynamic: false,
			},
			mmr: MmrPolicy { enabled: mmr, lambda: 0.7 },
			diversity: DiversityPolicy { enabled: diversity, threshold: 0.5 },
		}
	}

	#[test]
	fn boost_scales_with_overlap_and_caps_at_max() {
		let candidates = vec![kb("full", "postgres connection pooling guide", 0.5)];
		let out = rerank("postgres connection pooling", &candidates, &policy(true, false, false), 10);

		// Full term overlap earns the whole max_boost.
		assert!((out[0].score - 0.7).abs() < 1e-6);
	}

	#[test]
	fn boost_skips_low_confidence_candidates() {
		let candidates = vec![kb("weak", "postgres connection pooling guide", 0.29)];
		let out = rerank("postgres connection pooling", &candidates, &policy(true, false, false), 10);

		assert_eq!(out[0].score, 0.29);

		match &out[0].history[0] {
			StageRecord::Boost { boost, .. } => assert_eq!(*boost, 0.0),
			other => panic!("Unexpected record: {other:?}"),
		}
	}

	#[test]
	fn boosted_score_clamps_to_one() {
		let candidates = vec![kb("top", "postgres connection pooling", 0.95)];
		let out = rerank("postgres connection pooling", &candidates, &policy(true, false, false), 10);

		assert_eq!(out[0].score, 1.0);
	}

	#[test]
	fn dynamic_boost_doubles_the_ceiling() {
		let mut rerank_policy = policy(true, false, false);

		rerank_policy.semantic_boost.dynamic = true;

		let candidates = vec![kb("full", "alpha beta gamma", 0.4)];
		let out = rerank("alpha beta gamma", &candidates, &rerank_policy, 10);

		// ratio 1.0: 1.0 * 0.2 * 2.0 == min cap 2 * 0.2.
		assert!((out[0].score - 0.8).abs() < 1e-6);
	}

	#[test]
	fn mmr_first_pick_equals_relevance() {
		let candidates = vec![
			kb("a", "storage engine internals", 0.9),
			kb("b", "completely different topic", 0.8),
		];
		let out = rerank("query", &candidates, &policy(false, true, false), 2);

		match &out[0].history[0] {
			StageRecord::Select { mmr_score, nearest_similarity, .. } => {
				assert_eq!(*mmr_score, Some(0.9));
				assert_eq!(*nearest_similarity, None);
			},
			other => panic!("Unexpected record: {other:?}"),
		}
	}

	#[test]
	fn mmr_penalizes_near_duplicates() {
		let candidates = vec![
			kb("a", "vector database index tuning", 0.9),
			kb("dup", "vector database index tuning", 0.89),
			kb("c", "smtp relay configuration notes", 0.5),
		];
		let out = rerank("query", &candidates, &policy(false, true, false), 2);
		let ids: Vec<&str> = out.iter().map(|candidate| candidate.id.as_str()).collect();

		// The exact duplicate loses to the lower-scored but novel candidate.
		assert_eq!(ids, vec!["a", "c"]);
	}

	#[test]
	fn diversity_filter_always_keeps_the_top() {
		let candidates = vec![
			kb("top", "alpha beta gamma delta", 0.9),
			kb("near", "alpha beta gamma delta", 0.8),
			kb("far", "unrelated content entirely here", 0.7),
		];
		let out = rerank("query", &candidates, &policy(false, false, true), 5);
		let ids: Vec<&str> = out.iter().map(|candidate| candidate.id.as_str()).collect();

		assert_eq!(ids, vec!["top", "far"]);
	}

	#[test]
	fn plain_truncation_when_no_selection_enabled() {
		let candidates = vec![
			kb("a", "", 0.9),
			kb("b", "", 0.8),
			kb("c", "", 0.7),
		];
		let out = rerank("query", &candidates, &policy(false, false, false), 2);
		let ids: Vec<&str> = out.iter().map(|candidate| candidate.id.as_str()).collect();

		assert_eq!(ids, vec!["a", "b"]);
	}
}
