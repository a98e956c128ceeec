use std::collections::HashMap;

use qdrant_client::qdrant::{PointId, ScoredPoint, Value, point_id::PointIdOptions, value::Kind};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use ember_domain::{Candidate, Corpus};

/// Normalizes raw search hits into candidates. Payload field names vary
/// between corpora and ingestion versions, so every lookup is defensive:
/// candidates without a usable id are dropped, everything else defaults.
pub fn candidates_from_points(points: &[ScoredPoint], corpus: Corpus) -> Vec<Candidate> {
	let mut out = Vec::with_capacity(points.len());

	for point in points {
		let id = point
			.id
			.as_ref()
			.and_then(point_id_to_string)
			.or_else(|| payload_string(&point.payload, &["id", "passage_id", "message_id"]));
		let Some(id) = id else {
			tracing::warn!(corpus = corpus.as_str(), "Search hit missing id; dropped.");

			continue;
		};
		let title = payload_string(&point.payload, &["title", "subject", "file_name", "fileName"])
			.unwrap_or_default();
		let content =
			payload_string(&point.payload, &["content", "text", "body"]).unwrap_or_default();
		let sent_at = payload_rfc3339(&point.payload, &["sent_at", "sentAt"]);
		let score = if point.score.is_finite() { point.score } else { 0.0 };
		let mut candidate = Candidate::new(id, corpus, title, content, score);

		candidate.sent_at = sent_at;

		out.push(candidate);
	}

	out
}

pub fn point_id_to_string(point_id: &PointId) -> Option<String> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Some(id.clone()),
		Some(PointIdOptions::Num(id)) => Some(id.to_string()),
		None => None,
	}
}

pub fn payload_string(payload: &HashMap<String, Value>, keys: &[&str]) -> Option<String> {
	for key in keys {
		let Some(value) = payload.get(*key) else { continue };

		match &value.kind {
			Some(Kind::StringValue(text)) if !text.trim().is_empty() =>
				return Some(text.to_string()),
			_ => continue,
		}
	}

	None
}

pub fn payload_rfc3339(
	payload: &HashMap<String, Value>,
	keys: &[&str],
) -> Option<OffsetDateTime> {
	let text = payload_string(payload, keys)?;

	OffsetDateTime::parse(text.as_str(), &Rfc3339).ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn string_value(text: &str) -> Value {
		Value { kind: Some(Kind::StringValue(text.to_string())) }
	}

	fn point(id: &str, payload: HashMap<String, Value>, score: f32) -> ScoredPoint {
		ScoredPoint {
			id: Some(PointId { point_id_options: Some(PointIdOptions::Uuid(id.to_string())) }),
			payload,
			score,
			..Default::default()
		}
	}

	#[test]
	fn normalizes_legacy_field_names() {
		let mut payload = HashMap::new();

		payload.insert("fileName".to_string(), string_value("notes.md"));
		payload.insert("text".to_string(), string_value("passage body"));
		payload.insert("sentAt".to_string(), string_value("2025-10-01T12:00:00Z"));

		let candidates =
			candidates_from_points(&[point("abc", payload, 0.7)], Corpus::Email);

		assert_eq!(candidates.len(), 1);
		assert_eq!(candidates[0].title, "notes.md");
		assert_eq!(candidates[0].content, "passage body");
		assert!(candidates[0].sent_at.is_some());
	}

	#[test]
	fn drops_points_without_id() {
		let mut payload = HashMap::new();

		payload.insert("content".to_string(), string_value("body"));

		let anonymous = ScoredPoint { id: None, payload, ..Default::default() };
		let candidates = candidates_from_points(&[anonymous], Corpus::KnowledgeBase);

		assert!(candidates.is_empty());
	}

	#[test]
	fn unparseable_sent_at_becomes_none() {
		let mut payload = HashMap::new();

		payload.insert("content".to_string(), string_value("body"));
		payload.insert("sent_at".to_string(), string_value("last tuesday"));

		let candidates = candidates_from_points(&[point("p1", payload, 0.5)], Corpus::Email);

		assert_eq!(candidates.len(), 1);
		assert!(candidates[0].sent_at.is_none());
	}
}
