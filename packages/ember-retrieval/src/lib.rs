pub mod balance;
pub mod decay;
pub mod enhance;
pub mod fusion;
pub mod policy;
pub mod rerank;
pub mod retrieve;
pub mod threshold;
pub mod trace;

use std::{collections::HashSet, future::Future, pin::Pin, sync::Arc, time::Instant};

use serde::{Deserialize, Serialize};

use crate::{
	policy::RagPolicy,
	trace::{PipelineTrace, StageTrace},
};
use ember_domain::{Candidate, Corpus, EnhancedQuery};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Enhancement error: {message}")]
	Enhancement { message: String },
	#[error("Retrieval error: {message}")]
	Retrieval { message: String },
	#[error("Fusion error: {message}")]
	Fusion { message: String },
	#[error("Rerank error: {message}")]
	Rerank { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Policy error: {message}")]
	Policy { message: String },
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>>;

	fn embed_batch<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait TextGenerator
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		prompt: &'a str,
		temperature: f32,
		max_tokens: u32,
	) -> BoxFuture<'a, Result<String>>;
}

pub trait VectorSearch
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		corpus: Corpus,
		vector: &'a [f32],
		limit: u32,
		threshold_hint: Option<f32>,
	) -> BoxFuture<'a, Result<Vec<Candidate>>>;
}

pub trait KeywordSearch
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		corpus: Corpus,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Candidate>>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
	pub role: String,
	pub content: String,
}

#[derive(Clone)]
pub struct Pipeline {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub generator: Arc<dyn TextGenerator>,
	pub vector: Arc<dyn VectorSearch>,
	pub keyword: Arc<dyn KeywordSearch>,
}
impl Pipeline {
	/// Best-effort entry point: a pipeline failure degrades to an empty
	/// context set so the chat turn can proceed ungrounded.
	pub async fn retrieve_and_rank(
		&self,
		query: &str,
		history: &[HistoryTurn],
		policy: &RagPolicy,
	) -> (Vec<Candidate>, PipelineTrace) {
		match self.run(query, history, policy).await {
			Ok(out) => out,
			Err(err) => {
				tracing::error!(error = %err, "Retrieval pipeline failed; returning empty context.");

				(Vec::new(), PipelineTrace::failed(err.to_string()))
			},
		}
	}

	async fn run(
		&self,
		query: &str,
		history: &[HistoryTurn],
		policy: &RagPolicy,
	) -> Result<(Vec<Candidate>, PipelineTrace)> {
		let mut trace = PipelineTrace::default();
		let started = Instant::now();
		let enhanced: EnhancedQuery =
			enhance::enhance(self.generator.as_ref(), query, history, &policy.enhance).await?;
		let queries = enhanced.search_queries();

		trace.enhanced_query = Some(enhanced.enhanced_query.clone());
		trace.hyde_used = enhanced.hyde_document.is_some();
		trace.search_queries = queries.clone();
		trace.push(StageTrace::finished("enhance", 1, queries.len(), started));

		// Each query string fans out to its own concurrent searches; variants
		// themselves run sequentially since the merge below is
		// order-independent.
		let started = Instant::now();
		let query_vectors = self.embed_queries(&queries).await;
		let mut per_query: Vec<Vec<Candidate>> = Vec::with_capacity(queries.len());
		let mut retrieved_total = 0_usize;

		for (search_query, query_vector) in queries.iter().zip(&query_vectors) {
			let lists = retrieve::retrieve_for_query(
				self,
				search_query,
				query_vector.as_deref(),
				policy,
			)
			.await;

			retrieved_total += lists.total_len();

			per_query.push(fusion::fuse_query_results(lists, &policy.fusion));
		}

		let fused_total: usize = per_query.iter().map(Vec::len).sum();

		trace.push(StageTrace::finished("retrieve_fuse", retrieved_total, fused_total, started));

		let started = Instant::now();
		let merged = fusion::merge_variants(per_query, policy.fusion.combine);

		trace.push(StageTrace::finished("merge", fused_total, merged.len(), started));

		let started = Instant::now();
		let kept = threshold::filter(&merged, &policy.thresholds);
		let dropped = dropped_scores(&merged, &kept);

		trace.push(
			StageTrace::finished("threshold", merged.len(), kept.len(), started)
				.with_dropped(dropped),
		);

		let started = Instant::now();
		let decayed = decay::apply(&kept, &policy.decay, time::OffsetDateTime::now_utc());

		trace.push(StageTrace::finished("decay", kept.len(), decayed.len(), started));

		let started = Instant::now();
		let reranked = rerank::rerank(
			&enhanced.enhanced_query,
			&decayed,
			&policy.rerank,
			policy.select_limit(),
		);

		trace.push(StageTrace::finished("rerank", decayed.len(), reranked.len(), started));

		let started = Instant::now();
		let balanced = balance::balance(&reranked, policy.max_results as usize, &policy.ensemble);

		trace.push(StageTrace::finished("balance", reranked.len(), balanced.len(), started));

		Ok((balanced, trace))
	}

	/// One embedding per fan-out query, batched when there is more than one.
	/// A provider failure degrades every vector search to empty rather than
	/// aborting; keyword search can still contribute.
	async fn embed_queries(&self, queries: &[String]) -> Vec<Option<Vec<f32>>> {
		match queries {
			[] => Vec::new(),
			[query] => match self.embedding.embed(query).await {
				Ok(vector) => vec![Some(vector)],
				Err(err) => {
					tracing::warn!(error = %err, "Query embedding failed; vector searches skipped.");

					vec![None]
				},
			},
			_ => match self.embedding.embed_batch(queries).await {
				Ok(vectors) if vectors.len() == queries.len() =>
					vectors.into_iter().map(Some).collect(),
				Ok(vectors) => {
					tracing::warn!(
						expected = queries.len(),
						got = vectors.len(),
						"Embedding batch returned a mismatched count; vector searches skipped."
					);

					vec![None; queries.len()]
				},
				Err(err) => {
					tracing::warn!(error = %err, "Batch embedding failed; vector searches skipped.");

					vec![None; queries.len()]
				},
			},
		}
	}
}

fn dropped_scores(before: &[Candidate], after: &[Candidate]) -> Vec<f32> {
	let kept: HashSet<(Corpus, &str)> =
		after.iter().map(|candidate| (candidate.corpus, candidate.id.as_str())).collect();
	let mut dropped: Vec<f32> = before
		.iter()
		.filter(|candidate| !kept.contains(&(candidate.corpus, candidate.id.as_str())))
		.map(|candidate| candidate.score)
		.collect();

	dropped.sort_by(|a, b| fusion::cmp_score_desc(*a, *b));
	dropped.truncate(3);

	dropped
}
