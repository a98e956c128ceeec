use ember_domain::{CombineMethod, Corpus};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionMethod {
	Rrf,
	Weighted,
}
impl FusionMethod {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Rrf => "rrf",
			Self::Weighted => "weighted",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
	MinMax,
	ZScore,
	None,
}
impl Normalization {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::MinMax => "min_max",
			Self::ZScore => "z_score",
			Self::None => "none",
		}
	}
}

/// Every knob the pipeline reads, resolved once at request entry and immutable
/// for the whole invocation.
#[derive(Debug, Clone)]
pub struct RagPolicy {
	pub max_results: u32,
	pub thresholds: ThresholdPolicy,
	pub hybrid_enabled: bool,
	pub fusion: FusionPolicy,
	pub decay: DecayPolicy,
	pub rerank: RerankPolicy,
	pub ensemble: EnsemblePolicy,
	pub enhance: EnhancePolicy,
}
impl RagPolicy {
	/// Per-source retrieval cap: twice the final result count, so fusion and
	/// reranking have a pool to work with.
	pub fn candidate_limit(&self) -> u32 {
		self.max_results.saturating_mul(2).max(1)
	}

	pub fn select_limit(&self) -> usize {
		self.candidate_limit() as usize
	}
}

#[derive(Debug, Clone, Copy)]
pub struct ThresholdPolicy {
	pub knowledge_base: f32,
	pub email: f32,
}
impl ThresholdPolicy {
	pub fn for_corpus(&self, corpus: Corpus) -> f32 {
		match corpus {
			Corpus::Email => self.email,
			Corpus::KnowledgeBase | Corpus::Other => self.knowledge_base,
		}
	}
}

#[derive(Debug, Clone)]
pub struct FusionPolicy {
	pub method: FusionMethod,
	pub rrf_k: f32,
	pub vector_weight: f32,
	pub keyword_weight: f32,
	pub normalization: Normalization,
	pub combine: CombineMethod,
}

#[derive(Debug, Clone, Copy)]
pub struct DecayPolicy {
	pub enabled: bool,
	pub half_life_days: f32,
	pub min_decay: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct RerankPolicy {
	pub semantic_boost: BoostPolicy,
	pub mmr: MmrPolicy,
	pub diversity: DiversityPolicy,
}

#[derive(Debug, Clone, Copy)]
pub struct BoostPolicy {
	pub enabled: bool,
	pub max_boost: f32,
	pub min_score: f32,
	pub dynamic: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct MmrPolicy {
	pub enabled: bool,
	pub lambda: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct DiversityPolicy {
	pub enabled: bool,
	pub threshold: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct EnsemblePolicy {
	pub enabled: bool,
	pub max_email_ratio: f32,
	pub max_knowledge_ratio: f32,
	pub min_email_results: u32,
	pub min_knowledge_results: u32,
}

#[derive(Debug, Clone)]
pub struct EnhancePolicy {
	pub temperature: f32,
	pub max_tokens: u32,
	pub context: ContextPolicy,
	pub hyde: HydePolicy,
	pub multi_query: MultiQueryPolicy,
}

#[derive(Debug, Clone, Copy)]
pub struct ContextPolicy {
	pub enabled: bool,
	pub max_history_turns: u32,
	pub fallback_on_error: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct HydePolicy {
	pub enabled: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct MultiQueryPolicy {
	pub enabled: bool,
	pub count: u32,
}

pub fn parse_fusion_method(value: &str, label: &str) -> Result<FusionMethod> {
	match value.trim().to_ascii_lowercase().as_str() {
		"rrf" => Ok(FusionMethod::Rrf),
		"weighted" => Ok(FusionMethod::Weighted),
		other => Err(Error::Policy {
			message: format!("{label} must be one of rrf, weighted. Got {other}."),
		}),
	}
}

pub fn parse_normalization(value: &str, label: &str) -> Result<Normalization> {
	match value.trim().to_ascii_lowercase().as_str() {
		"min_max" => Ok(Normalization::MinMax),
		"z_score" => Ok(Normalization::ZScore),
		"none" => Ok(Normalization::None),
		other => Err(Error::Policy {
			message: format!("{label} must be one of min_max, z_score, none. Got {other}."),
		}),
	}
}

pub fn parse_combine_method(value: &str, label: &str) -> Result<CombineMethod> {
	match value.trim().to_ascii_lowercase().as_str() {
		"max" => Ok(CombineMethod::Max),
		"average" => Ok(CombineMethod::Average),
		"sum" => Ok(CombineMethod::Sum),
		other => Err(Error::Policy {
			message: format!("{label} must be one of max, average, sum. Got {other}."),
		}),
	}
}
