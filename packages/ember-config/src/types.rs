use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub rag: Rag,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
	pub bind_localhost_only: bool,
	pub api_auth_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub knowledge_collection: String,
	pub email_collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub generation: GenerationProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Global pipeline defaults. Per-knowledge-base overrides stored in Postgres
/// and request-level overrides are resolved on top of these at request entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Rag {
	pub max_results: u32,
	pub thresholds: RagThresholds,
	pub hybrid: RagHybrid,
	pub fusion: RagFusion,
	pub decay: RagDecay,
	pub rerank: RagRerank,
	pub ensemble: RagEnsemble,
	pub enhancement: RagEnhancement,
}
impl Default for Rag {
	fn default() -> Self {
		Self {
			max_results: 8,
			thresholds: RagThresholds::default(),
			hybrid: RagHybrid::default(),
			fusion: RagFusion::default(),
			decay: RagDecay::default(),
			rerank: RagRerank::default(),
			ensemble: RagEnsemble::default(),
			enhancement: RagEnhancement::default(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagThresholds {
	pub knowledge_base: f32,
	pub email: f32,
}
impl Default for RagThresholds {
	fn default() -> Self {
		Self { knowledge_base: 0.4, email: 0.35 }
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RagHybrid {
	pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagFusion {
	pub method: String,
	pub rrf_k: f32,
	pub vector_weight: f32,
	pub keyword_weight: f32,
	pub normalization: String,
	pub combine: String,
}
impl Default for RagFusion {
	fn default() -> Self {
		Self {
			method: "rrf".to_string(),
			rrf_k: 60.0,
			vector_weight: 0.7,
			keyword_weight: 0.3,
			normalization: "min_max".to_string(),
			combine: "max".to_string(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagDecay {
	pub enabled: bool,
	pub half_life_days: f32,
	pub min_decay: f32,
}
impl Default for RagDecay {
	fn default() -> Self {
		Self { enabled: true, half_life_days: 30.0, min_decay: 0.1 }
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RagRerank {
	pub semantic_boost: RagSemanticBoost,
	pub mmr: RagMmr,
	pub diversity: RagDiversity,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagSemanticBoost {
	pub enabled: bool,
	pub max_boost: f32,
	pub min_score: f32,
	pub dynamic: bool,
}
impl Default for RagSemanticBoost {
	fn default() -> Self {
		Self { enabled: true, max_boost: 0.15, min_score: 0.3, dynamic: false }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagMmr {
	pub enabled: bool,
	pub lambda: f32,
}
impl Default for RagMmr {
	fn default() -> Self {
		Self { enabled: true, lambda: 0.7 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagDiversity {
	pub enabled: bool,
	pub threshold: f32,
}
impl Default for RagDiversity {
	fn default() -> Self {
		Self { enabled: false, threshold: 0.8 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagEnsemble {
	pub enabled: bool,
	pub max_email_ratio: f32,
	pub max_knowledge_ratio: f32,
	pub min_email_results: u32,
	pub min_knowledge_results: u32,
}
impl Default for RagEnsemble {
	fn default() -> Self {
		Self {
			enabled: true,
			max_email_ratio: 0.4,
			max_knowledge_ratio: 0.8,
			min_email_results: 0,
			min_knowledge_results: 1,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagEnhancement {
	pub temperature: f32,
	pub max_tokens: u32,
	pub context: RagContext,
	pub hyde: RagHyde,
	pub multi_query: RagMultiQuery,
}
impl Default for RagEnhancement {
	fn default() -> Self {
		Self {
			temperature: 0.3,
			max_tokens: 512,
			context: RagContext::default(),
			hyde: RagHyde::default(),
			multi_query: RagMultiQuery::default(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagContext {
	pub enabled: bool,
	pub max_history_turns: u32,
	pub fallback_on_error: bool,
}
impl Default for RagContext {
	fn default() -> Self {
		Self { enabled: true, max_history_turns: 6, fallback_on_error: true }
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RagHyde {
	pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagMultiQuery {
	pub enabled: bool,
	pub count: u32,
}
impl Default for RagMultiQuery {
	fn default() -> Self {
		Self { enabled: true, count: 3 }
	}
}
