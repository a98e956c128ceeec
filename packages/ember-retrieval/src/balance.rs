use std::collections::VecDeque;

use crate::policy::EnsemblePolicy;
use ember_domain::{Candidate, Corpus, StageRecord};

/// Quota-constrained final selection. Input arrives sorted by score; admitted
/// candidates keep that relative order, and overflow top-ups append in their
/// own preserved order. Nothing is re-sorted afterwards.
pub fn balance(candidates: &[Candidate], limit: usize, policy: &EnsemblePolicy) -> Vec<Candidate> {
	if limit == 0 {
		return Vec::new();
	}
	if !policy.enabled {
		return candidates
			.iter()
			.take(limit)
			.enumerate()
			.map(|(idx, candidate)| {
				candidate.recorded(StageRecord::Balance {
					position: idx as u32 + 1,
					from_overflow: false,
				})
			})
			.collect();
	}

	let max_email = (limit as f32 * policy.max_email_ratio).floor() as usize;
	let max_knowledge = (limit as f32 * policy.max_knowledge_ratio).floor() as usize;
	let mut email_count = 0_usize;
	let mut knowledge_count = 0_usize;
	let mut admitted: Vec<&Candidate> = Vec::with_capacity(limit);
	let mut email_overflow: VecDeque<&Candidate> = VecDeque::new();
	let mut knowledge_overflow: VecDeque<&Candidate> = VecDeque::new();

	for candidate in candidates {
		if admitted.len() >= limit {
			break;
		}

		match candidate.corpus {
			Corpus::Email =>
				if email_count < max_email {
					email_count += 1;
					admitted.push(candidate);
				} else {
					email_overflow.push_back(candidate);
				},
			Corpus::KnowledgeBase =>
				if knowledge_count < max_knowledge {
					knowledge_count += 1;
					admitted.push(candidate);
				} else {
					knowledge_overflow.push_back(candidate);
				},
			// No quota applies outside the two main corpora.
			Corpus::Other => admitted.push(candidate),
		}
	}

	let mut out: Vec<Candidate> = admitted
		.iter()
		.enumerate()
		.map(|(idx, candidate)| {
			candidate.recorded(StageRecord::Balance {
				position: idx as u32 + 1,
				from_overflow: false,
			})
		})
		.collect();

	// Minimum quotas first, then alternate between whichever overflow queues
	// still hold candidates, email first.
	while out.len() < limit && email_count < policy.min_email_results as usize {
		let Some(candidate) = email_overflow.pop_front() else { break };

		email_count += 1;
		out.push(candidate.recorded(StageRecord::Balance {
			position: out.len() as u32 + 1,
			from_overflow: true,
		}));
	}

	while out.len() < limit && knowledge_count < policy.min_knowledge_results as usize {
		let Some(candidate) = knowledge_overflow.pop_front() else { break };

		knowledge_count += 1;
		out.push(candidate.recorded(StageRecord::Balance {
			position: out.len() as u32 + 1,
			from_overflow: true,
		}));
	}

	let mut email_turn = true;

	while out.len() < limit && (!email_overflow.is_empty() || !knowledge_overflow.is_empty()) {
		let candidate = if email_turn {
			email_overflow.pop_front().or_else(|| knowledge_overflow.pop_front())
		} else {
			knowledge_overflow.pop_front().or_else(|| email_overflow.pop_front())
		};
		let Some(candidate) = candidate else { break };

		out.push(candidate.recorded(StageRecord::Balance {
			position: out.len() as u32 + 1,
			from_overflow: true,
		}));

		email_turn = !email_turn;
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn candidate(id: &str, corpus: Corpus, score: f32) -> Candidate {
		Candidate::new(id, corpus, "", "", score)
	}

	fn policy() -> EnsemblePolicy {
		EnsemblePolicy {
			enabled: true,
			max_email_ratio: 0.6,
			max_knowledge_ratio: 0.8,
			min_email_results: 0,
			min_knowledge_results: 0,
		}
	}

	fn emails(count: usize) -> Vec<Candidate> {
		(0..count)
			.map(|idx| candidate(&format!("e{idx}"), Corpus::Email, 1.0 - idx as f32 * 0.05))
			.collect()
	}

	#[test]
	fn email_only_input_fills_from_overflow() {
		let out = balance(&emails(10), 5, &policy());

		assert_eq!(out.len(), 5);

		// floor(5 * 0.6) admits three in the quota pass; two arrive from
		// overflow to reach the limit.
		let from_overflow = out
			.iter()
			.filter(|candidate| {
				matches!(
					candidate.history.last(),
					Some(StageRecord::Balance { from_overflow: true, .. })
				)
			})
			.count();

		assert_eq!(from_overflow, 2);

		let ids: Vec<&str> = out.iter().map(|candidate| candidate.id.as_str()).collect();

		assert_eq!(ids, vec!["e0", "e1", "e2", "e3", "e4"]);
	}

	#[test]
	fn output_length_is_min_of_limit_and_input() {
		assert_eq!(balance(&emails(3), 5, &policy()).len(), 3);
		assert_eq!(balance(&emails(10), 5, &policy()).len(), 5);
		assert!(balance(&[], 5, &policy()).is_empty());
	}

	#[test]
	fn quota_holds_while_other_sources_compete() {
		let mut candidates = emails(6);

		candidates.extend(
			(0..6).map(|idx| {
				candidate(&format!("k{idx}"), Corpus::KnowledgeBase, 0.5 - idx as f32 * 0.01)
			}),
		);

		let out = balance(&candidates, 5, &policy());
		let email_count =
			out.iter().filter(|candidate| candidate.corpus == Corpus::Email).count();

		// floor(5 * 0.6) = 3 emails, remainder knowledge base.
		assert_eq!(out.len(), 5);
		assert_eq!(email_count, 3);
	}

	#[test]
	fn minimum_quota_pulls_from_overflow() {
		// Knowledge base dominates the score order; the email minimum still
		// claims a slot.
		let mut candidates: Vec<Candidate> = (0..8)
			.map(|idx| {
				candidate(&format!("k{idx}"), Corpus::KnowledgeBase, 0.9 - idx as f32 * 0.01)
			})
			.collect();

		candidates.push(candidate("e0", Corpus::Email, 0.1));

		let mut ensemble = policy();

		ensemble.max_email_ratio = 0.0;
		ensemble.min_email_results = 1;

		let out = balance(&candidates, 5, &ensemble);

		assert!(out.iter().any(|candidate| candidate.corpus == Corpus::Email));
	}

	#[test]
	fn other_sources_bypass_quotas() {
		let candidates = vec![
			candidate("o0", Corpus::Other, 0.9),
			candidate("o1", Corpus::Other, 0.8),
			candidate("o2", Corpus::Other, 0.7),
		];
		let out = balance(&candidates, 3, &policy());

		assert_eq!(out.len(), 3);
	}

	#[test]
	fn disabled_balancing_truncates() {
		let out = balance(
			&emails(10),
			4,
			&EnsemblePolicy {
				enabled: false,
				max_email_ratio: 0.0,
				max_knowledge_ratio: 0.0,
				min_email_results: 0,
				min_knowledge_results: 0,
			},
		);
		let ids: Vec<&str> = out.iter().map(|candidate| candidate.id.as_str()).collect();

		assert_eq!(ids, vec!["e0", "e1", "e2", "e3"]);
	}

	#[test]
	fn admitted_candidates_keep_relative_order() {
		let candidates = vec![
			candidate("e0", Corpus::Email, 0.9),
			candidate("e1", Corpus::Email, 0.85),
			candidate("e2", Corpus::Email, 0.84),
			candidate("k0", Corpus::KnowledgeBase, 0.8),
			candidate("e3", Corpus::Email, 0.7),
			candidate("k1", Corpus::KnowledgeBase, 0.6),
		];
		// limit 4, max_email floor(4*0.6)=2: e0, e1 admitted; e2, e3 parked;
		// k0, k1 fill the remaining slots in input order.
		let out = balance(&candidates, 4, &policy());
		let ids: Vec<&str> = out.iter().map(|candidate| candidate.id.as_str()).collect();

		assert_eq!(ids, vec!["e0", "e1", "k0", "k1"]);
	}
}
