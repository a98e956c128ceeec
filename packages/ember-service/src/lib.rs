pub mod policy;
pub mod retrieve;

mod error;

pub use error::{Error, Result};
pub use policy::RagOverride;
pub use retrieve::{RetrieveRequest, RetrieveResponse, RetrieveTrace};

use std::sync::Arc;

use ember_config::{Config, EmbeddingProviderConfig, GenerationProviderConfig};
use ember_domain::{Candidate, Corpus};
use ember_providers::{embedding, generation};
use ember_retrieval::{
	BoxFuture, EmbeddingProvider, KeywordSearch, Pipeline, TextGenerator, VectorSearch,
};
use ember_storage::{db::Db, qdrant::QdrantStore};

pub struct ContextService {
	pub cfg: Config,
	pub db: Db,
	pub pipeline: Pipeline,
}
impl ContextService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Self {
		let qdrant = Arc::new(qdrant);
		let pipeline = Pipeline {
			embedding: Arc::new(HttpEmbedding { cfg: cfg.providers.embedding.clone() }),
			generator: Arc::new(HttpGenerator { cfg: cfg.providers.generation.clone() }),
			vector: Arc::new(QdrantVectorSearch { store: qdrant.clone() }),
			keyword: Arc::new(QdrantKeywordSearch { store: qdrant }),
		};

		Self { cfg, db, pipeline }
	}

	/// Test seam: swap the default provider wiring for fakes.
	pub fn with_pipeline(cfg: Config, db: Db, pipeline: Pipeline) -> Self {
		Self { cfg, db, pipeline }
	}
}

struct HttpEmbedding {
	cfg: EmbeddingProviderConfig,
}
impl EmbeddingProvider for HttpEmbedding {
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, ember_retrieval::Result<Vec<f32>>> {
		Box::pin(async move {
			let texts = vec![text.to_string()];
			let vectors = embedding::embed(&self.cfg, &texts)
				.await
				.map_err(|err| ember_retrieval::Error::Provider { message: err.to_string() })?;

			vectors.into_iter().next().ok_or_else(|| ember_retrieval::Error::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			})
		})
	}

	fn embed_batch<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, ember_retrieval::Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			embedding::embed(&self.cfg, texts)
				.await
				.map_err(|err| ember_retrieval::Error::Provider { message: err.to_string() })
		})
	}
}

struct HttpGenerator {
	cfg: GenerationProviderConfig,
}
impl TextGenerator for HttpGenerator {
	fn generate<'a>(
		&'a self,
		prompt: &'a str,
		temperature: f32,
		max_tokens: u32,
	) -> BoxFuture<'a, ember_retrieval::Result<String>> {
		Box::pin(async move {
			generation::generate(&self.cfg, prompt, temperature, max_tokens)
				.await
				.map_err(|err| ember_retrieval::Error::Provider { message: err.to_string() })
		})
	}
}

struct QdrantVectorSearch {
	store: Arc<QdrantStore>,
}
impl VectorSearch for QdrantVectorSearch {
	fn search<'a>(
		&'a self,
		corpus: Corpus,
		vector: &'a [f32],
		limit: u32,
		threshold_hint: Option<f32>,
	) -> BoxFuture<'a, ember_retrieval::Result<Vec<Candidate>>> {
		Box::pin(async move {
			self.store
				.search_dense(corpus, vector.to_vec(), limit, threshold_hint)
				.await
				.map_err(|err| ember_retrieval::Error::Retrieval { message: err.to_string() })
		})
	}
}

struct QdrantKeywordSearch {
	store: Arc<QdrantStore>,
}
impl KeywordSearch for QdrantKeywordSearch {
	fn search<'a>(
		&'a self,
		corpus: Corpus,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, ember_retrieval::Result<Vec<Candidate>>> {
		Box::pin(async move {
			self.store
				.search_keyword(corpus, query, limit)
				.await
				.map_err(|err| ember_retrieval::Error::Retrieval { message: err.to_string() })
		})
	}
}
