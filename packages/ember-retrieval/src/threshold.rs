use crate::policy::ThresholdPolicy;
use ember_domain::{Candidate, StageRecord};

/// Per-source relevance floor, applied to fused scores. Runs strictly after
/// fusion; raw per-method scores are never compared against these thresholds.
pub fn filter(candidates: &[Candidate], thresholds: &ThresholdPolicy) -> Vec<Candidate> {
	candidates
		.iter()
		.filter_map(|candidate| {
			let threshold = thresholds.for_corpus(candidate.corpus);

			if candidate.score < threshold {
				return None;
			}

			Some(candidate.recorded(StageRecord::Threshold { threshold, output: candidate.score }))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use ember_domain::Corpus;

	fn thresholds() -> ThresholdPolicy {
		ThresholdPolicy { knowledge_base: 0.5, email: 0.3 }
	}

	#[test]
	fn drops_below_per_source_floor_only() {
		let candidates = vec![
			Candidate::new("kb-keep", Corpus::KnowledgeBase, "", "", 0.5),
			Candidate::new("kb-drop", Corpus::KnowledgeBase, "", "", 0.49),
			Candidate::new("email-keep", Corpus::Email, "", "", 0.3),
			Candidate::new("email-drop", Corpus::Email, "", "", 0.29),
			Candidate::new("other-keep", Corpus::Other, "", "", 0.6),
			Candidate::new("other-drop", Corpus::Other, "", "", 0.4),
		];
		let kept = filter(&candidates, &thresholds());
		let ids: Vec<&str> = kept.iter().map(|candidate| candidate.id.as_str()).collect();

		assert_eq!(ids, vec!["kb-keep", "email-keep", "other-keep"]);
	}

	#[test]
	fn survivors_gain_a_threshold_record() {
		let candidates = vec![Candidate::new("kb", Corpus::KnowledgeBase, "", "", 0.9)];
		let kept = filter(&candidates, &thresholds());

		assert_eq!(
			kept[0].history,
			vec![StageRecord::Threshold { threshold: 0.5, output: 0.9 }]
		);
	}
}
