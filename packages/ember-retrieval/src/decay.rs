use std::f32::consts::LN_2;

use time::OffsetDateTime;

use crate::policy::DecayPolicy;
use ember_domain::{Candidate, Corpus, StageRecord};

/// Exponential recency attenuation for timestamped email results. The decay
/// factor scales only a fifth of the score, so an ancient message loses at
/// most 20% of its relevance.
pub fn apply(candidates: &[Candidate], policy: &DecayPolicy, now: OffsetDateTime) -> Vec<Candidate> {
	if !policy.enabled {
		return candidates.to_vec();
	}

	candidates
		.iter()
		.map(|candidate| {
			let sent_at = match (candidate.corpus, candidate.sent_at) {
				(Corpus::Email, Some(sent_at)) => sent_at,
				_ =>
					return candidate.recorded(StageRecord::Decay {
						age_days: 0.0,
						factor: 1.0,
						output: candidate.score,
					}),
			};
			let age_days = ((now - sent_at).as_seconds_f32() / 86_400.0).max(0.0);
			let factor = decay_factor(age_days, policy);
			let score = candidate.score * (0.8 + 0.2 * factor);

			candidate.scored(score, StageRecord::Decay { age_days, factor, output: score })
		})
		.collect()
}

pub fn decay_factor(age_days: f32, policy: &DecayPolicy) -> f32 {
	(-age_days / policy.half_life_days * LN_2).exp().max(policy.min_decay)
}

#[cfg(test)]
mod tests {
	use super::*;
	use time::Duration;

	fn policy() -> DecayPolicy {
		DecayPolicy { enabled: true, half_life_days: 30.0, min_decay: 0.1 }
	}

	fn email_candidate(score: f32, sent_at: Option<OffsetDateTime>) -> Candidate {
		let mut candidate = Candidate::new("e", Corpus::Email, "", "", score);

		candidate.sent_at = sent_at;

		candidate
	}

	#[test]
	fn factor_is_monotonically_non_increasing() {
		let policy = policy();
		let mut last = f32::INFINITY;

		for days in [0.0_f32, 1.0, 7.0, 30.0, 90.0, 365.0, 10_000.0] {
			let factor = decay_factor(days, &policy);

			assert!(factor <= last);

			last = factor;
		}
	}

	#[test]
	fn half_life_halves_the_factor() {
		let factor = decay_factor(30.0, &policy());

		assert!((factor - 0.5).abs() < 1e-4);
	}

	#[test]
	fn score_never_drops_below_the_floor() {
		let now = OffsetDateTime::now_utc();
		let policy = policy();
		let ancient = email_candidate(0.9, Some(now - Duration::days(100_000)));
		let out = apply(&[ancient], &policy, now);
		let floor = 0.9 * (0.8 + 0.2 * policy.min_decay);

		assert!(out[0].score >= floor - 1e-6);
	}

	#[test]
	fn fresh_email_keeps_its_score() {
		let now = OffsetDateTime::now_utc();
		let out = apply(&[email_candidate(0.6, Some(now))], &policy(), now);

		assert!((out[0].score - 0.6).abs() < 1e-5);
	}

	#[test]
	fn missing_timestamp_passes_through_unchanged() {
		let now = OffsetDateTime::now_utc();
		let out = apply(&[email_candidate(0.6, None)], &policy(), now);

		assert_eq!(out[0].score, 0.6);

		match out[0].history.last() {
			Some(StageRecord::Decay { factor, .. }) => assert_eq!(*factor, 1.0),
			other => panic!("Unexpected record: {other:?}"),
		}
	}

	#[test]
	fn non_email_sources_are_untouched() {
		let now = OffsetDateTime::now_utc();
		let mut kb = Candidate::new("kb", Corpus::KnowledgeBase, "", "", 0.8);

		kb.sent_at = Some(now - Duration::days(300));

		let out = apply(&[kb], &policy(), now);

		assert_eq!(out[0].score, 0.8);
	}

	#[test]
	fn disabled_decay_is_a_no_op() {
		let now = OffsetDateTime::now_utc();
		let policy = DecayPolicy { enabled: false, half_life_days: 30.0, min_decay: 0.1 };
		let stale = email_candidate(0.5, Some(now - Duration::days(500)));
		let out = apply(&[stale], &policy, now);

		assert_eq!(out[0].score, 0.5);
		assert!(out[0].history.is_empty());
	}

	#[test]
	fn future_timestamps_clamp_to_zero_age() {
		let now = OffsetDateTime::now_utc();
		let future = email_candidate(0.5, Some(now + Duration::days(5)));
		let out = apply(&[future], &policy(), now);

		assert!((out[0].score - 0.5).abs() < 1e-6);
	}
}
