use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corpus {
	KnowledgeBase,
	Email,
	Other,
}
impl Corpus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::KnowledgeBase => "knowledge_base",
			Self::Email => "email",
			Self::Other => "other",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMethod {
	Vector,
	Keyword,
}
impl RetrievalMethod {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Vector => "vector",
			Self::Keyword => "keyword",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionKind {
	Rrf,
	Weighted,
	Passthrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMethod {
	Max,
	Average,
	Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectStrategy {
	Mmr,
	Diversity,
	Truncate,
}

/// One audit entry per pipeline stage a candidate survived. Appended, never
/// rewritten; the candidate's `score` always holds the latest `output`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageRecord {
	Retrieval {
		method: RetrievalMethod,
		rank: u32,
		score: f32,
	},
	Fusion {
		method: FusionKind,
		vector_rank: Option<u32>,
		keyword_rank: Option<u32>,
		identical_scores: bool,
		output: f32,
	},
	Merge {
		method: CombineMethod,
		occurrences: u32,
		output: f32,
	},
	Threshold {
		threshold: f32,
		output: f32,
	},
	Decay {
		age_days: f32,
		factor: f32,
		output: f32,
	},
	Boost {
		match_ratio: f32,
		boost: f32,
		output: f32,
	},
	Select {
		strategy: SelectStrategy,
		mmr_score: Option<f32>,
		nearest_similarity: Option<f32>,
		position: u32,
	},
	Balance {
		position: u32,
		from_overflow: bool,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
	pub id: String,
	pub corpus: Corpus,
	pub title: String,
	pub content: String,
	pub score: f32,
	#[serde(with = "crate::time_serde::option", default)]
	pub sent_at: Option<OffsetDateTime>,
	#[serde(default)]
	pub history: Vec<StageRecord>,
}
impl Candidate {
	pub fn new(id: impl Into<String>, corpus: Corpus, title: impl Into<String>, content: impl Into<String>, score: f32) -> Self {
		Self {
			id: id.into(),
			corpus,
			title: title.into(),
			content: content.into(),
			score,
			sent_at: None,
			history: Vec::new(),
		}
	}

	/// Stage output: a copy with the new working score and the stage's audit
	/// record appended.
	pub fn scored(&self, score: f32, record: StageRecord) -> Self {
		let mut next = self.clone();

		next.score = score;
		next.history.push(record);

		next
	}

	/// Stage output for stages that keep the score unchanged.
	pub fn recorded(&self, record: StageRecord) -> Self {
		self.scored(self.score, record)
	}
}
