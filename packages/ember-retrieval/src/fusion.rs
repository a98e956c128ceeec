use std::{cmp::Ordering, collections::HashMap};

use crate::{
	policy::{FusionMethod, FusionPolicy, Normalization},
	retrieve::{CorpusLists, RetrievedLists},
};
use ember_domain::{Candidate, CombineMethod, Corpus, FusionKind, StageRecord};

pub fn cmp_score_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

fn sort_fused(list: &mut [Candidate]) {
	list.sort_by(|a, b| cmp_score_desc(a.score, b.score).then_with(|| a.id.cmp(&b.id)));
}

/// Method-level fusion for one query string: each corpus's vector and keyword
/// lists collapse into a single scored list, then the corpora concatenate.
pub fn fuse_query_results(lists: RetrievedLists, policy: &FusionPolicy) -> Vec<Candidate> {
	let mut out = fuse_corpus(lists.knowledge, policy);

	out.extend(fuse_corpus(lists.email, policy));

	out
}

fn fuse_corpus(lists: CorpusLists, policy: &FusionPolicy) -> Vec<Candidate> {
	match (lists.vector.is_empty(), lists.keyword.is_empty()) {
		(true, true) => Vec::new(),
		(false, true) => passthrough_vector(lists.vector),
		(true, false) => passthrough_keyword(lists.keyword),
		(false, false) => match policy.method {
			FusionMethod::Rrf => rrf_fuse(&lists.vector, &lists.keyword, policy.rrf_k),
			FusionMethod::Weighted => weighted_fuse(&lists.vector, &lists.keyword, policy),
		},
	}
}

/// A lone vector list keeps its similarity scores as-is.
fn passthrough_vector(list: Vec<Candidate>) -> Vec<Candidate> {
	list.iter()
		.enumerate()
		.map(|(idx, candidate)| {
			candidate.recorded(StageRecord::Fusion {
				method: FusionKind::Passthrough,
				vector_rank: Some(idx as u32 + 1),
				keyword_rank: None,
				identical_scores: false,
				output: candidate.score,
			})
		})
		.collect()
}

/// A lone keyword list carries unbounded BM25 scores, so it is min-max
/// normalized before entering the shared score range.
fn passthrough_keyword(list: Vec<Candidate>) -> Vec<Candidate> {
	let scores: Vec<f32> = list.iter().map(|candidate| candidate.score).collect();
	let (normalized, identical_scores) = normalize_scores(&scores, Normalization::MinMax);

	list.iter()
		.zip(normalized)
		.enumerate()
		.map(|(idx, (candidate, score))| {
			candidate.scored(
				score,
				StageRecord::Fusion {
					method: FusionKind::Passthrough,
					vector_rank: None,
					keyword_rank: Some(idx as u32 + 1),
					identical_scores,
					output: score,
				},
			)
		})
		.collect()
}

struct RrfEntry {
	candidate: Candidate,
	vector_rank: Option<u32>,
	keyword_rank: Option<u32>,
}

pub fn rrf_fuse(vector: &[Candidate], keyword: &[Candidate], k: f32) -> Vec<Candidate> {
	let mut by_id: HashMap<String, RrfEntry> = HashMap::new();

	for (idx, candidate) in vector.iter().enumerate() {
		by_id.insert(
			candidate.id.clone(),
			RrfEntry {
				candidate: candidate.clone(),
				vector_rank: Some(idx as u32 + 1),
				keyword_rank: None,
			},
		);
	}

	for (idx, candidate) in keyword.iter().enumerate() {
		let rank = idx as u32 + 1;

		by_id
			.entry(candidate.id.clone())
			.and_modify(|entry| entry.keyword_rank = Some(rank))
			.or_insert_with(|| RrfEntry {
				candidate: candidate.clone(),
				vector_rank: None,
				keyword_rank: Some(rank),
			});
	}

	let mut out: Vec<Candidate> = by_id
		.into_values()
		.map(|entry| {
			let score = rrf_term(entry.vector_rank, k) + rrf_term(entry.keyword_rank, k);

			entry.candidate.scored(
				score,
				StageRecord::Fusion {
					method: FusionKind::Rrf,
					vector_rank: entry.vector_rank,
					keyword_rank: entry.keyword_rank,
					identical_scores: false,
					output: score,
				},
			)
		})
		.collect();

	sort_fused(&mut out);

	out
}

fn rrf_term(rank: Option<u32>, k: f32) -> f32 {
	match rank {
		Some(rank) => 1.0 / (k + rank as f32),
		None => 0.0,
	}
}

struct WeightedEntry {
	candidate: Candidate,
	vector_rank: Option<u32>,
	vector_score: Option<f32>,
	keyword_rank: Option<u32>,
	keyword_score: Option<f32>,
}

pub fn weighted_fuse(
	vector: &[Candidate],
	keyword: &[Candidate],
	policy: &FusionPolicy,
) -> Vec<Candidate> {
	let vector_raw: Vec<f32> = vector.iter().map(|candidate| candidate.score).collect();
	let keyword_raw: Vec<f32> = keyword.iter().map(|candidate| candidate.score).collect();
	let (vector_norm, vector_identical) = normalize_scores(&vector_raw, policy.normalization);
	let (keyword_norm, keyword_identical) = normalize_scores(&keyword_raw, policy.normalization);
	let mut by_id: HashMap<String, WeightedEntry> = HashMap::new();

	for (idx, candidate) in vector.iter().enumerate() {
		by_id.insert(
			candidate.id.clone(),
			WeightedEntry {
				candidate: candidate.clone(),
				vector_rank: Some(idx as u32 + 1),
				vector_score: Some(vector_norm[idx]),
				keyword_rank: None,
				keyword_score: None,
			},
		);
	}

	for (idx, candidate) in keyword.iter().enumerate() {
		let rank = idx as u32 + 1;
		let score = keyword_norm[idx];

		by_id
			.entry(candidate.id.clone())
			.and_modify(|entry| {
				entry.keyword_rank = Some(rank);
				entry.keyword_score = Some(score);
			})
			.or_insert_with(|| WeightedEntry {
				candidate: candidate.clone(),
				vector_rank: None,
				vector_score: None,
				keyword_rank: Some(rank),
				keyword_score: Some(score),
			});
	}

	let mut out: Vec<Candidate> = by_id
		.into_values()
		.map(|entry| {
			let score = policy.vector_weight * entry.vector_score.unwrap_or(0.0)
				+ policy.keyword_weight * entry.keyword_score.unwrap_or(0.0);
			let identical_scores = (entry.vector_score.is_some() && vector_identical)
				|| (entry.keyword_score.is_some() && keyword_identical);

			entry.candidate.scored(
				score,
				StageRecord::Fusion {
					method: FusionKind::Weighted,
					vector_rank: entry.vector_rank,
					keyword_rank: entry.keyword_rank,
					identical_scores,
					output: score,
				},
			)
		})
		.collect();

	sort_fused(&mut out);

	out
}

/// Normalizes one list's scores into [0, 1]. The flag reports the
/// all-identical degenerate case, which maps every score to 1.0.
pub fn normalize_scores(scores: &[f32], method: Normalization) -> (Vec<f32>, bool) {
	if scores.is_empty() {
		return (Vec::new(), false);
	}
	if scores.len() == 1 {
		return match method {
			Normalization::None => (scores.to_vec(), false),
			Normalization::MinMax | Normalization::ZScore => (vec![1.0], false),
		};
	}

	match method {
		Normalization::None => (scores.to_vec(), false),
		Normalization::MinMax => {
			let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
			let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);

			if (max - min).abs() <= f32::EPSILON {
				return (vec![1.0; scores.len()], true);
			}

			(scores.iter().map(|score| (score - min) / (max - min)).collect(), false)
		},
		Normalization::ZScore => {
			let mean = scores.iter().sum::<f32>() / scores.len() as f32;
			let variance =
				scores.iter().map(|score| (score - mean).powi(2)).sum::<f32>() / scores.len() as f32;
			let std = variance.sqrt();

			if std <= f32::EPSILON {
				return (vec![1.0; scores.len()], true);
			}

			(
				scores
					.iter()
					.map(|score| {
						let z = (score - mean) / std;

						(1.0 / (1.0 + (-z).exp())).clamp(0.0, 1.0)
					})
					.collect(),
				false,
			)
		},
	}
}

struct MergedEntry {
	candidate: Candidate,
	total: f32,
	max: f32,
	occurrences: u32,
}

/// Cross-variant merge: occurrences of the same candidate across query
/// variants collapse into one, combining their fused scores.
pub fn merge_variants(per_query: Vec<Vec<Candidate>>, combine: CombineMethod) -> Vec<Candidate> {
	let mut by_key: HashMap<(Corpus, String), MergedEntry> = HashMap::new();

	for list in per_query {
		for candidate in list {
			let key = (candidate.corpus, candidate.id.clone());

			match by_key.get_mut(&key) {
				Some(entry) => {
					entry.total += candidate.score;
					entry.max = entry.max.max(candidate.score);
					entry.occurrences += 1;
				},
				None => {
					by_key.insert(
						key,
						MergedEntry {
							total: candidate.score,
							max: candidate.score,
							occurrences: 1,
							candidate,
						},
					);
				},
			}
		}
	}

	let mut out: Vec<Candidate> = by_key
		.into_values()
		.map(|entry| {
			let score = match combine {
				CombineMethod::Max => entry.max,
				CombineMethod::Average => entry.total / entry.occurrences as f32,
				// Many agreeing variants must not push a score past the top of
				// the range.
				CombineMethod::Sum => entry.total.min(1.0),
			};

			entry.candidate.scored(
				score,
				StageRecord::Merge { method: combine, occurrences: entry.occurrences, output: score },
			)
		})
		.collect();

	out.sort_by(|a, b| {
		cmp_score_desc(a.score, b.score)
			.then_with(|| a.id.cmp(&b.id))
			.then_with(|| a.corpus.as_str().cmp(b.corpus.as_str()))
	});

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn kb(id: &str, score: f32) -> Candidate {
		Candidate::new(id, Corpus::KnowledgeBase, "", "", score)
	}

	fn policy(method: FusionMethod, normalization: Normalization) -> FusionPolicy {
		FusionPolicy {
			method,
			rrf_k: 60.0,
			vector_weight: 0.7,
			keyword_weight: 0.3,
			normalization,
			combine: CombineMethod::Max,
		}
	}

	#[test]
	fn rrf_ranks_dual_list_candidates_first() {
		let vector = vec![kb("1", 0.9), kb("2", 0.8)];
		let keyword = vec![kb("2", 12.0), kb("3", 8.0)];
		let fused = rrf_fuse(&vector, &keyword, 60.0);

		assert_eq!(fused[0].id, "2");
		assert!((fused[0].score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-6);
		assert!(fused[1].score < fused[0].score);
		assert!(fused.iter().any(|candidate| candidate.id == "1"));
		assert!(fused.iter().any(|candidate| candidate.id == "3"));
	}

	#[test]
	fn rrf_records_null_rank_for_absent_list() {
		let vector = vec![kb("a", 0.9)];
		let keyword = vec![kb("b", 5.0)];
		let fused = rrf_fuse(&vector, &keyword, 60.0);
		let a = fused.iter().find(|candidate| candidate.id == "a").unwrap();

		match a.history.last() {
			Some(StageRecord::Fusion { vector_rank, keyword_rank, .. }) => {
				assert_eq!(*vector_rank, Some(1));
				assert_eq!(*keyword_rank, None);
			},
			other => panic!("Unexpected record: {other:?}"),
		}
	}

	#[test]
	fn min_max_maps_extremes_to_unit_range() {
		let (normalized, identical) =
			normalize_scores(&[3.0, 9.0, 6.0], Normalization::MinMax);

		assert!(!identical);
		assert_eq!(normalized[0], 0.0);
		assert_eq!(normalized[1], 1.0);
		assert!((normalized[2] - 0.5).abs() < 1e-6);
	}

	#[test]
	fn min_max_single_item_maps_to_one() {
		let (normalized, identical) = normalize_scores(&[0.37], Normalization::MinMax);

		assert!(!identical);
		assert_eq!(normalized, vec![1.0]);
	}

	#[test]
	fn identical_scores_flagged_not_errored() {
		let (normalized, identical) =
			normalize_scores(&[0.5, 0.5, 0.5], Normalization::MinMax);

		assert!(identical);
		assert_eq!(normalized, vec![1.0, 1.0, 1.0]);
	}

	#[test]
	fn z_score_preserves_order_within_unit_range() {
		let (normalized, identical) =
			normalize_scores(&[1.0, 5.0, 3.0], Normalization::ZScore);

		assert!(!identical);
		assert!(normalized[1] > normalized[2] && normalized[2] > normalized[0]);
		assert!(normalized.iter().all(|score| (0.0..=1.0).contains(score)));
	}

	#[test]
	fn weighted_fusion_scores_absent_list_as_zero() {
		let vector = vec![kb("a", 0.9), kb("b", 0.3)];
		let keyword = vec![kb("c", 4.0), kb("a", 2.0)];
		let policy = policy(FusionMethod::Weighted, Normalization::MinMax);
		let fused = weighted_fuse(&vector, &keyword, &policy);
		let a = fused.iter().find(|candidate| candidate.id == "a").unwrap();
		let b = fused.iter().find(|candidate| candidate.id == "b").unwrap();
		let c = fused.iter().find(|candidate| candidate.id == "c").unwrap();

		// a: 0.7 * 1.0 + 0.3 * 0.0; b: vector minimum; c: keyword maximum.
		assert!((a.score - 0.7).abs() < 1e-6);
		assert!((b.score - 0.0).abs() < 1e-6);
		assert!((c.score - 0.3).abs() < 1e-6);
	}

	#[test]
	fn merge_combines_occurrences() {
		let first = vec![kb("a", 0.6), kb("b", 0.4)];
		let second = vec![kb("a", 0.8)];

		let merged = merge_variants(vec![first.clone(), second.clone()], CombineMethod::Max);
		let a = merged.iter().find(|candidate| candidate.id == "a").unwrap();

		assert_eq!(a.score, 0.8);

		match a.history.last() {
			Some(StageRecord::Merge { occurrences, .. }) => assert_eq!(*occurrences, 2),
			other => panic!("Unexpected record: {other:?}"),
		}

		let merged = merge_variants(vec![first.clone(), second.clone()], CombineMethod::Average);
		let a = merged.iter().find(|candidate| candidate.id == "a").unwrap();

		assert!((a.score - 0.7).abs() < 1e-6);

		let merged = merge_variants(vec![first, second], CombineMethod::Sum);
		let a = merged.iter().find(|candidate| candidate.id == "a").unwrap();

		// 0.6 + 0.8 clamps to 1.0.
		assert_eq!(a.score, 1.0);
	}

	#[test]
	fn merge_output_sorted_descending() {
		let merged = merge_variants(
			vec![vec![kb("low", 0.2), kb("high", 0.9)], vec![kb("mid", 0.5)]],
			CombineMethod::Max,
		);
		let ids: Vec<&str> = merged.iter().map(|candidate| candidate.id.as_str()).collect();

		assert_eq!(ids, vec!["high", "mid", "low"]);
	}
}
