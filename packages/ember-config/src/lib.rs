mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, GenerationProviderConfig, Postgres, Providers, Qdrant, Rag,
	RagContext, RagDecay, RagDiversity, RagEnhancement, RagEnsemble, RagFusion, RagHybrid, RagHyde,
	RagMmr, RagMultiQuery, RagRerank, RagSemanticBoost, RagThresholds, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(validation("service.http_bind must be non-empty."));
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(validation("service.admin_bind must be non-empty."));
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(validation("storage.postgres.pool_max_conns must be greater than zero."));
	}
	if cfg.storage.qdrant.knowledge_collection.trim().is_empty() {
		return Err(validation("storage.qdrant.knowledge_collection must be non-empty."));
	}
	if cfg.storage.qdrant.email_collection.trim().is_empty() {
		return Err(validation("storage.qdrant.email_collection must be non-empty."));
	}
	if cfg.storage.qdrant.knowledge_collection == cfg.storage.qdrant.email_collection {
		return Err(validation("storage.qdrant collections must be distinct."));
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(validation("providers.embedding.dimensions must be greater than zero."));
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(validation(
			"providers.embedding.dimensions must match storage.qdrant.vector_dim.",
		));
	}
	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("generation", &cfg.providers.generation.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	validate_rag(&cfg.rag)
}

pub fn validate_rag(rag: &Rag) -> Result<()> {
	if rag.max_results == 0 {
		return Err(validation("rag.max_results must be greater than zero."));
	}

	for (path, value) in [
		("rag.thresholds.knowledge_base", rag.thresholds.knowledge_base),
		("rag.thresholds.email", rag.thresholds.email),
		("rag.rerank.semantic_boost.min_score", rag.rerank.semantic_boost.min_score),
		("rag.rerank.mmr.lambda", rag.rerank.mmr.lambda),
		("rag.rerank.diversity.threshold", rag.rerank.diversity.threshold),
		("rag.decay.min_decay", rag.decay.min_decay),
		("rag.ensemble.max_email_ratio", rag.ensemble.max_email_ratio),
		("rag.ensemble.max_knowledge_ratio", rag.ensemble.max_knowledge_ratio),
	] {
		if !value.is_finite() {
			return Err(Error::Validation {
				message: format!("{path} must be a finite number."),
			});
		}
		if !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{path} must be in the range 0.0-1.0."),
			});
		}
	}

	if !matches!(rag.fusion.method.as_str(), "rrf" | "weighted") {
		return Err(validation("rag.fusion.method must be one of rrf or weighted."));
	}
	if !rag.fusion.rrf_k.is_finite() || rag.fusion.rrf_k <= 0.0 {
		return Err(validation("rag.fusion.rrf_k must be greater than zero."));
	}
	if !matches!(rag.fusion.normalization.as_str(), "min_max" | "z_score" | "none") {
		return Err(validation("rag.fusion.normalization must be one of min_max, z_score, or none."));
	}
	if !matches!(rag.fusion.combine.as_str(), "max" | "average" | "sum") {
		return Err(validation("rag.fusion.combine must be one of max, average, or sum."));
	}

	for (path, value) in [
		("rag.fusion.vector_weight", rag.fusion.vector_weight),
		("rag.fusion.keyword_weight", rag.fusion.keyword_weight),
		("rag.rerank.semantic_boost.max_boost", rag.rerank.semantic_boost.max_boost),
	] {
		if !value.is_finite() || value < 0.0 {
			return Err(Error::Validation {
				message: format!("{path} must be a finite, non-negative number."),
			});
		}
	}

	if rag.fusion.vector_weight <= 0.0 && rag.fusion.keyword_weight <= 0.0 {
		return Err(validation("At least one rag.fusion weight must be greater than zero."));
	}
	if !rag.decay.half_life_days.is_finite() || rag.decay.half_life_days <= 0.0 {
		return Err(validation("rag.decay.half_life_days must be greater than zero."));
	}
	if rag.rerank.mmr.enabled && rag.rerank.diversity.enabled {
		return Err(validation(
			"rag.rerank.mmr and rag.rerank.diversity must not be enabled together.",
		));
	}
	if rag.ensemble.min_email_results > rag.max_results {
		return Err(validation("rag.ensemble.min_email_results must not exceed rag.max_results."));
	}
	if rag.ensemble.min_knowledge_results > rag.max_results {
		return Err(validation(
			"rag.ensemble.min_knowledge_results must not exceed rag.max_results.",
		));
	}
	if rag.enhancement.multi_query.enabled && rag.enhancement.multi_query.count == 0 {
		return Err(validation(
			"rag.enhancement.multi_query.count must be greater than zero when enabled.",
		));
	}
	if rag.enhancement.context.enabled && rag.enhancement.context.max_history_turns == 0 {
		return Err(validation(
			"rag.enhancement.context.max_history_turns must be greater than zero when enabled.",
		));
	}
	if !rag.enhancement.temperature.is_finite() || rag.enhancement.temperature < 0.0 {
		return Err(validation(
			"rag.enhancement.temperature must be a finite, non-negative number.",
		));
	}
	if rag.enhancement.max_tokens == 0 {
		return Err(validation("rag.enhancement.max_tokens must be greater than zero."));
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.api_auth_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false)
	{
		cfg.service.api_auth_token = None;
	}
}

fn validation(message: &str) -> Error {
	Error::Validation { message: message.to_string() }
}
