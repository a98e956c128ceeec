use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};
use ember_config::Rag;
use ember_retrieval::policy::{
	BoostPolicy, ContextPolicy, DecayPolicy, DiversityPolicy, EnhancePolicy, EnsemblePolicy,
	FusionPolicy, HydePolicy, MmrPolicy, MultiQueryPolicy, RagPolicy, RerankPolicy,
	ThresholdPolicy, parse_combine_method, parse_fusion_method, parse_normalization,
};

/// A sparse patch over the global `[rag]` defaults. Stored per knowledge base
/// and also accepted at request level; the request layer wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagOverride {
	pub max_results: Option<u32>,
	pub thresholds: Option<ThresholdsOverride>,
	pub hybrid: Option<HybridOverride>,
	pub fusion: Option<FusionOverride>,
	pub decay: Option<DecayOverride>,
	pub rerank: Option<RerankOverride>,
	pub ensemble: Option<EnsembleOverride>,
	pub enhancement: Option<EnhancementOverride>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsOverride {
	pub knowledge_base: Option<f32>,
	pub email: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridOverride {
	pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionOverride {
	pub method: Option<String>,
	pub rrf_k: Option<f32>,
	pub vector_weight: Option<f32>,
	pub keyword_weight: Option<f32>,
	pub normalization: Option<String>,
	pub combine: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayOverride {
	pub enabled: Option<bool>,
	pub half_life_days: Option<f32>,
	pub min_decay: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankOverride {
	pub semantic_boost: Option<BoostOverride>,
	pub mmr: Option<MmrOverride>,
	pub diversity: Option<DiversityOverride>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostOverride {
	pub enabled: Option<bool>,
	pub max_boost: Option<f32>,
	pub min_score: Option<f32>,
	pub dynamic: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MmrOverride {
	pub enabled: Option<bool>,
	pub lambda: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversityOverride {
	pub enabled: Option<bool>,
	pub threshold: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleOverride {
	pub enabled: Option<bool>,
	pub max_email_ratio: Option<f32>,
	pub max_knowledge_ratio: Option<f32>,
	pub min_email_results: Option<u32>,
	pub min_knowledge_results: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementOverride {
	pub temperature: Option<f32>,
	pub max_tokens: Option<u32>,
	pub context: Option<ContextOverride>,
	pub hyde: Option<HydeOverride>,
	pub multi_query: Option<MultiQueryOverride>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextOverride {
	pub enabled: Option<bool>,
	pub max_history_turns: Option<u32>,
	pub fallback_on_error: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HydeOverride {
	pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiQueryOverride {
	pub enabled: Option<bool>,
	pub count: Option<u32>,
}

fn pick<T: Copy>(request: Option<T>, stored: Option<T>, default: T) -> T {
	request.or(stored).unwrap_or(default)
}

/// Resolves the three layers into one immutable policy for the invocation:
/// request override, then the stored per-knowledge-base patch, then the
/// global defaults.
pub fn resolve(
	rag: &Rag,
	stored: Option<&RagOverride>,
	request: Option<&RagOverride>,
) -> Result<RagPolicy> {
	let max_results =
		pick(request.and_then(|o| o.max_results), stored.and_then(|o| o.max_results), rag.max_results);

	if max_results == 0 {
		return Err(Error::InvalidRequest {
			message: "rag.max_results must be greater than zero.".to_string(),
		});
	}

	let thresholds = ThresholdPolicy {
		knowledge_base: pick(
			request.and_then(|o| o.thresholds.as_ref()).and_then(|t| t.knowledge_base),
			stored.and_then(|o| o.thresholds.as_ref()).and_then(|t| t.knowledge_base),
			rag.thresholds.knowledge_base,
		),
		email: pick(
			request.and_then(|o| o.thresholds.as_ref()).and_then(|t| t.email),
			stored.and_then(|o| o.thresholds.as_ref()).and_then(|t| t.email),
			rag.thresholds.email,
		),
	};
	let hybrid_enabled = pick(
		request.and_then(|o| o.hybrid.as_ref()).and_then(|h| h.enabled),
		stored.and_then(|o| o.hybrid.as_ref()).and_then(|h| h.enabled),
		rag.hybrid.enabled,
	);
	let fusion = resolve_fusion(
		rag,
		stored.and_then(|o| o.fusion.as_ref()),
		request.and_then(|o| o.fusion.as_ref()),
	)?;
	let decay = DecayPolicy {
		enabled: pick(
			request.and_then(|o| o.decay.as_ref()).and_then(|d| d.enabled),
			stored.and_then(|o| o.decay.as_ref()).and_then(|d| d.enabled),
			rag.decay.enabled,
		),
		half_life_days: pick(
			request.and_then(|o| o.decay.as_ref()).and_then(|d| d.half_life_days),
			stored.and_then(|o| o.decay.as_ref()).and_then(|d| d.half_life_days),
			rag.decay.half_life_days,
		),
		min_decay: pick(
			request.and_then(|o| o.decay.as_ref()).and_then(|d| d.min_decay),
			stored.and_then(|o| o.decay.as_ref()).and_then(|d| d.min_decay),
			rag.decay.min_decay,
		),
	};
	let rerank = resolve_rerank(
		rag,
		stored.and_then(|o| o.rerank.as_ref()),
		request.and_then(|o| o.rerank.as_ref()),
	);
	let ensemble = resolve_ensemble(
		rag,
		stored.and_then(|o| o.ensemble.as_ref()),
		request.and_then(|o| o.ensemble.as_ref()),
	);
	let enhance = resolve_enhancement(
		rag,
		stored.and_then(|o| o.enhancement.as_ref()),
		request.and_then(|o| o.enhancement.as_ref()),
	);
	let policy = RagPolicy {
		max_results,
		thresholds,
		hybrid_enabled,
		fusion,
		decay,
		rerank,
		ensemble,
		enhance,
	};

	validate(&policy)?;

	Ok(policy)
}

fn resolve_fusion(
	rag: &Rag,
	stored: Option<&FusionOverride>,
	request: Option<&FusionOverride>,
) -> Result<FusionPolicy> {
	let method_raw = request
		.and_then(|f| f.method.as_deref())
		.or_else(|| stored.and_then(|f| f.method.as_deref()))
		.unwrap_or(rag.fusion.method.as_str());
	let normalization_raw = request
		.and_then(|f| f.normalization.as_deref())
		.or_else(|| stored.and_then(|f| f.normalization.as_deref()))
		.unwrap_or(rag.fusion.normalization.as_str());
	let combine_raw = request
		.and_then(|f| f.combine.as_deref())
		.or_else(|| stored.and_then(|f| f.combine.as_deref()))
		.unwrap_or(rag.fusion.combine.as_str());

	Ok(FusionPolicy {
		method: parse_fusion_method(method_raw, "rag.fusion.method")?,
		rrf_k: pick(
			request.and_then(|f| f.rrf_k),
			stored.and_then(|f| f.rrf_k),
			rag.fusion.rrf_k,
		),
		vector_weight: pick(
			request.and_then(|f| f.vector_weight),
			stored.and_then(|f| f.vector_weight),
			rag.fusion.vector_weight,
		),
		keyword_weight: pick(
			request.and_then(|f| f.keyword_weight),
			stored.and_then(|f| f.keyword_weight),
			rag.fusion.keyword_weight,
		),
		normalization: parse_normalization(normalization_raw, "rag.fusion.normalization")?,
		combine: parse_combine_method(combine_raw, "rag.fusion.combine")?,
	})
}

fn resolve_rerank(
	rag: &Rag,
	stored: Option<&RerankOverride>,
	request: Option<&RerankOverride>,
) -> RerankPolicy {
	let boost_stored = stored.and_then(|r| r.semantic_boost.as_ref());
	let boost_request = request.and_then(|r| r.semantic_boost.as_ref());
	let mmr_stored = stored.and_then(|r| r.mmr.as_ref());
	let mmr_request = request.and_then(|r| r.mmr.as_ref());
	let diversity_stored = stored.and_then(|r| r.diversity.as_ref());
	let diversity_request = request.and_then(|r| r.diversity.as_ref());

	RerankPolicy {
		semantic_boost: BoostPolicy {
			enabled: pick(
				boost_request.and_then(|b| b.enabled),
				boost_stored.and_then(|b| b.enabled),
				rag.rerank.semantic_boost.enabled,
			),
			max_boost: pick(
				boost_request.and_then(|b| b.max_boost),
				boost_stored.and_then(|b| b.max_boost),
				rag.rerank.semantic_boost.max_boost,
			),
			min_score: pick(
				boost_request.and_then(|b| b.min_score),
				boost_stored.and_then(|b| b.min_score),
				rag.rerank.semantic_boost.min_score,
			),
			dynamic: pick(
				boost_request.and_then(|b| b.dynamic),
				boost_stored.and_then(|b| b.dynamic),
				rag.rerank.semantic_boost.dynamic,
			),
		},
		mmr: MmrPolicy {
			enabled: pick(
				mmr_request.and_then(|m| m.enabled),
				mmr_stored.and_then(|m| m.enabled),
				rag.rerank.mmr.enabled,
			),
			lambda: pick(
				mmr_request.and_then(|m| m.lambda),
				mmr_stored.and_then(|m| m.lambda),
				rag.rerank.mmr.lambda,
			),
		},
		diversity: DiversityPolicy {
			enabled: pick(
				diversity_request.and_then(|d| d.enabled),
				diversity_stored.and_then(|d| d.enabled),
				rag.rerank.diversity.enabled,
			),
			threshold: pick(
				diversity_request.and_then(|d| d.threshold),
				diversity_stored.and_then(|d| d.threshold),
				rag.rerank.diversity.threshold,
			),
		},
	}
}

fn resolve_ensemble(
	rag: &Rag,
	stored: Option<&EnsembleOverride>,
	request: Option<&EnsembleOverride>,
) -> EnsemblePolicy {
	EnsemblePolicy {
		enabled: pick(
			request.and_then(|e| e.enabled),
			stored.and_then(|e| e.enabled),
			rag.ensemble.enabled,
		),
		max_email_ratio: pick(
			request.and_then(|e| e.max_email_ratio),
			stored.and_then(|e| e.max_email_ratio),
			rag.ensemble.max_email_ratio,
		),
		max_knowledge_ratio: pick(
			request.and_then(|e| e.max_knowledge_ratio),
			stored.and_then(|e| e.max_knowledge_ratio),
			rag.ensemble.max_knowledge_ratio,
		),
		min_email_results: pick(
			request.and_then(|e| e.min_email_results),
			stored.and_then(|e| e.min_email_results),
			rag.ensemble.min_email_results,
		),
		min_knowledge_results: pick(
			request.and_then(|e| e.min_knowledge_results),
			stored.and_then(|e| e.min_knowledge_results),
			rag.ensemble.min_knowledge_results,
		),
	}
}

fn resolve_enhancement(
	rag: &Rag,
	stored: Option<&EnhancementOverride>,
	request: Option<&EnhancementOverride>,
) -> EnhancePolicy {
	let context_stored = stored.and_then(|e| e.context.as_ref());
	let context_request = request.and_then(|e| e.context.as_ref());
	let hyde_stored = stored.and_then(|e| e.hyde.as_ref());
	let hyde_request = request.and_then(|e| e.hyde.as_ref());
	let multi_stored = stored.and_then(|e| e.multi_query.as_ref());
	let multi_request = request.and_then(|e| e.multi_query.as_ref());

	EnhancePolicy {
		temperature: pick(
			request.and_then(|e| e.temperature),
			stored.and_then(|e| e.temperature),
			rag.enhancement.temperature,
		),
		max_tokens: pick(
			request.and_then(|e| e.max_tokens),
			stored.and_then(|e| e.max_tokens),
			rag.enhancement.max_tokens,
		),
		context: ContextPolicy {
			enabled: pick(
				context_request.and_then(|c| c.enabled),
				context_stored.and_then(|c| c.enabled),
				rag.enhancement.context.enabled,
			),
			max_history_turns: pick(
				context_request.and_then(|c| c.max_history_turns),
				context_stored.and_then(|c| c.max_history_turns),
				rag.enhancement.context.max_history_turns,
			),
			fallback_on_error: pick(
				context_request.and_then(|c| c.fallback_on_error),
				context_stored.and_then(|c| c.fallback_on_error),
				rag.enhancement.context.fallback_on_error,
			),
		},
		hyde: HydePolicy {
			enabled: pick(
				hyde_request.and_then(|h| h.enabled),
				hyde_stored.and_then(|h| h.enabled),
				rag.enhancement.hyde.enabled,
			),
		},
		multi_query: MultiQueryPolicy {
			enabled: pick(
				multi_request.and_then(|m| m.enabled),
				multi_stored.and_then(|m| m.enabled),
				rag.enhancement.multi_query.enabled,
			),
			count: pick(
				multi_request.and_then(|m| m.count),
				multi_stored.and_then(|m| m.count),
				rag.enhancement.multi_query.count,
			),
		},
	}
}

fn validate(policy: &RagPolicy) -> Result<()> {
	for (path, value) in [
		("rag.thresholds.knowledge_base", policy.thresholds.knowledge_base),
		("rag.thresholds.email", policy.thresholds.email),
		("rag.rerank.semantic_boost.min_score", policy.rerank.semantic_boost.min_score),
		("rag.rerank.mmr.lambda", policy.rerank.mmr.lambda),
		("rag.rerank.diversity.threshold", policy.rerank.diversity.threshold),
		("rag.decay.min_decay", policy.decay.min_decay),
		("rag.ensemble.max_email_ratio", policy.ensemble.max_email_ratio),
		("rag.ensemble.max_knowledge_ratio", policy.ensemble.max_knowledge_ratio),
	] {
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(Error::InvalidRequest {
				message: format!("{path} must be a finite number in the range 0.0-1.0."),
			});
		}
	}

	for (path, value) in [
		("rag.fusion.vector_weight", policy.fusion.vector_weight),
		("rag.fusion.keyword_weight", policy.fusion.keyword_weight),
		("rag.rerank.semantic_boost.max_boost", policy.rerank.semantic_boost.max_boost),
		("rag.enhancement.temperature", policy.enhance.temperature),
	] {
		if !value.is_finite() || value < 0.0 {
			return Err(Error::InvalidRequest {
				message: format!("{path} must be a finite, non-negative number."),
			});
		}
	}

	if !policy.fusion.rrf_k.is_finite() || policy.fusion.rrf_k <= 0.0 {
		return Err(Error::InvalidRequest {
			message: "rag.fusion.rrf_k must be greater than zero.".to_string(),
		});
	}
	if policy.fusion.vector_weight <= 0.0 && policy.fusion.keyword_weight <= 0.0 {
		return Err(Error::InvalidRequest {
			message: "At least one rag.fusion weight must be greater than zero.".to_string(),
		});
	}
	if !policy.decay.half_life_days.is_finite() || policy.decay.half_life_days <= 0.0 {
		return Err(Error::InvalidRequest {
			message: "rag.decay.half_life_days must be greater than zero.".to_string(),
		});
	}
	if policy.rerank.mmr.enabled && policy.rerank.diversity.enabled {
		return Err(Error::InvalidRequest {
			message: "rag.rerank.mmr and rag.rerank.diversity must not be enabled together."
				.to_string(),
		});
	}
	if policy.enhance.multi_query.enabled && policy.enhance.multi_query.count == 0 {
		return Err(Error::InvalidRequest {
			message: "rag.enhancement.multi_query.count must be greater than zero when enabled."
				.to_string(),
		});
	}
	if policy.enhance.context.enabled && policy.enhance.context.max_history_turns == 0 {
		return Err(Error::InvalidRequest {
			message: "rag.enhancement.context.max_history_turns must be greater than zero when enabled."
				.to_string(),
		});
	}
	if policy.enhance.max_tokens == 0 {
		return Err(Error::InvalidRequest {
			message: "rag.enhancement.max_tokens must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

/// The resolved policy as JSON, attached to the response trace so callers can
/// see exactly which configuration produced a ranking.
pub fn policy_snapshot(policy: &RagPolicy) -> Value {
	serde_json::json!({
		"max_results": policy.max_results,
		"thresholds": {
			"knowledge_base": policy.thresholds.knowledge_base,
			"email": policy.thresholds.email,
		},
		"hybrid": { "enabled": policy.hybrid_enabled },
		"fusion": {
			"method": policy.fusion.method.as_str(),
			"rrf_k": policy.fusion.rrf_k,
			"vector_weight": policy.fusion.vector_weight,
			"keyword_weight": policy.fusion.keyword_weight,
			"normalization": policy.fusion.normalization.as_str(),
			"combine": policy.fusion.combine,
		},
		"decay": {
			"enabled": policy.decay.enabled,
			"half_life_days": policy.decay.half_life_days,
			"min_decay": policy.decay.min_decay,
		},
		"rerank": {
			"semantic_boost": {
				"enabled": policy.rerank.semantic_boost.enabled,
				"max_boost": policy.rerank.semantic_boost.max_boost,
				"min_score": policy.rerank.semantic_boost.min_score,
				"dynamic": policy.rerank.semantic_boost.dynamic,
			},
			"mmr": {
				"enabled": policy.rerank.mmr.enabled,
				"lambda": policy.rerank.mmr.lambda,
			},
			"diversity": {
				"enabled": policy.rerank.diversity.enabled,
				"threshold": policy.rerank.diversity.threshold,
			},
		},
		"ensemble": {
			"enabled": policy.ensemble.enabled,
			"max_email_ratio": policy.ensemble.max_email_ratio,
			"max_knowledge_ratio": policy.ensemble.max_knowledge_ratio,
			"min_email_results": policy.ensemble.min_email_results,
			"min_knowledge_results": policy.ensemble.min_knowledge_results,
		},
		"enhancement": {
			"temperature": policy.enhance.temperature,
			"max_tokens": policy.enhance.max_tokens,
			"context": {
				"enabled": policy.enhance.context.enabled,
				"max_history_turns": policy.enhance.context.max_history_turns,
				"fallback_on_error": policy.enhance.context.fallback_on_error,
			},
			"hyde": { "enabled": policy.enhance.hyde.enabled },
			"multi_query": {
				"enabled": policy.enhance.multi_query.enabled,
				"count": policy.enhance.multi_query.count,
			},
		},
	})
}

pub fn hash_policy_snapshot(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| Error::Storage {
		message: format!("Failed to encode policy snapshot: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}
