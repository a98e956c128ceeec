pub const DENSE_VECTOR_NAME: &str = "dense";
pub const BM25_VECTOR_NAME: &str = "bm25";
pub const BM25_MODEL: &str = "qdrant/bm25";

use qdrant_client::qdrant::{Document, Query, QueryPointsBuilder};

use crate::{Result, models};
use ember_domain::{Candidate, Corpus};

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub knowledge_collection: String,
	pub email_collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &ember_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			knowledge_collection: cfg.knowledge_collection.clone(),
			email_collection: cfg.email_collection.clone(),
			vector_dim: cfg.vector_dim,
		})
	}

	pub fn collection(&self, corpus: Corpus) -> &str {
		match corpus {
			Corpus::Email => self.email_collection.as_str(),
			Corpus::KnowledgeBase | Corpus::Other => self.knowledge_collection.as_str(),
		}
	}

	pub async fn search_dense(
		&self,
		corpus: Corpus,
		vector: Vec<f32>,
		limit: u32,
		score_threshold: Option<f32>,
	) -> Result<Vec<Candidate>> {
		let mut search = QueryPointsBuilder::new(self.collection(corpus).to_string())
			.query(Query::new_nearest(vector))
			.using(DENSE_VECTOR_NAME)
			.limit(limit as u64)
			.with_payload(true);

		if let Some(threshold) = score_threshold {
			search = search.score_threshold(threshold);
		}

		let response = self.client.query(search).await?;

		Ok(models::candidates_from_points(&response.result, corpus))
	}

	pub async fn search_keyword(
		&self,
		corpus: Corpus,
		query: &str,
		limit: u32,
	) -> Result<Vec<Candidate>> {
		let search = QueryPointsBuilder::new(self.collection(corpus).to_string())
			.query(Query::new_nearest(Document::new(query.to_string(), BM25_MODEL)))
			.using(BM25_VECTOR_NAME)
			.limit(limit as u64)
			.with_payload(true);
		let response = self.client.query(search).await?;

		Ok(models::candidates_from_points(&response.result, corpus))
	}
}
