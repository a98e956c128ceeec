use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ContextService, Error, Result, policy, policy::RagOverride};
use ember_domain::Candidate;
use ember_retrieval::{HistoryTurn, trace::PipelineTrace};
use ember_storage::rag_configs;

const MAX_TOP_K: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveRequest {
	pub knowledge_base_id: String,
	pub query: String,
	#[serde(default)]
	pub history: Vec<HistoryTurn>,
	pub top_k: Option<u32>,
	pub rag: Option<RagOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
	pub trace_id: uuid::Uuid,
	pub items: Vec<Candidate>,
	pub trace: RetrieveTrace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveTrace {
	pub pipeline: PipelineTrace,
	pub policy_id: String,
	pub policy_snapshot: Value,
}

impl ContextService {
	pub async fn retrieve(&self, req: RetrieveRequest) -> Result<RetrieveResponse> {
		let knowledge_base_id = req.knowledge_base_id.trim();
		let query = req.query.trim();

		if knowledge_base_id.is_empty() {
			return Err(Error::InvalidRequest {
				message: "knowledge_base_id is required.".to_string(),
			});
		}
		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query is required.".to_string() });
		}
		if let Some(top_k) = req.top_k
			&& (top_k == 0 || top_k > MAX_TOP_K)
		{
			return Err(Error::InvalidRequest {
				message: format!("top_k must be between 1 and {MAX_TOP_K}."),
			});
		}

		let stored = self.stored_override(knowledge_base_id).await;
		let mut rag_policy = policy::resolve(&self.cfg.rag, stored.as_ref(), req.rag.as_ref())?;

		if let Some(top_k) = req.top_k {
			rag_policy.max_results = top_k;
		}

		let (items, pipeline_trace) =
			self.pipeline.retrieve_and_rank(query, &req.history, &rag_policy).await;
		let policy_snapshot = policy::policy_snapshot(&rag_policy);
		let policy_id = policy::hash_policy_snapshot(&policy_snapshot)?;

		Ok(RetrieveResponse {
			trace_id: uuid::Uuid::new_v4(),
			items,
			trace: RetrieveTrace { pipeline: pipeline_trace, policy_id, policy_snapshot },
		})
	}

	/// A stored patch that fails to load or decode degrades to the global
	/// defaults; a config problem must not take retrieval down with it.
	async fn stored_override(&self, knowledge_base_id: &str) -> Option<RagOverride> {
		let value = match rag_configs::get(&self.db.pool, knowledge_base_id).await {
			Ok(value) => value?,
			Err(err) => {
				tracing::warn!(
					knowledge_base_id,
					error = %err,
					"Stored rag config unavailable; using defaults."
				);

				return None;
			},
		};

		match serde_json::from_value::<RagOverride>(value) {
			Ok(overrides) => Some(overrides),
			Err(err) => {
				tracing::warn!(
					knowledge_base_id,
					error = %err,
					"Stored rag config is malformed; using defaults."
				);

				None
			},
		}
	}

	pub async fn get_rag_config(&self, knowledge_base_id: &str) -> Result<Option<RagOverride>> {
		let knowledge_base_id = knowledge_base_id.trim();

		if knowledge_base_id.is_empty() {
			return Err(Error::InvalidRequest {
				message: "knowledge_base_id is required.".to_string(),
			});
		}

		let Some(value) = rag_configs::get(&self.db.pool, knowledge_base_id).await? else {
			return Ok(None);
		};
		let overrides = serde_json::from_value(value).map_err(|err| Error::Storage {
			message: format!("Stored rag config is malformed: {err}"),
		})?;

		Ok(Some(overrides))
	}

	pub async fn put_rag_config(
		&self,
		knowledge_base_id: &str,
		overrides: RagOverride,
	) -> Result<()> {
		let knowledge_base_id = knowledge_base_id.trim();

		if knowledge_base_id.is_empty() {
			return Err(Error::InvalidRequest {
				message: "knowledge_base_id is required.".to_string(),
			});
		}

		// Resolving against the defaults rejects bad values at write time
		// instead of at the first retrieval that reads them.
		policy::resolve(&self.cfg.rag, Some(&overrides), None)?;

		let value = serde_json::to_value(&overrides).map_err(|err| Error::InvalidRequest {
			message: format!("Failed to encode overrides: {err}"),
		})?;

		rag_configs::upsert(
			&self.db.pool,
			knowledge_base_id,
			&value,
			time::OffsetDateTime::now_utc(),
		)
		.await?;

		Ok(())
	}

	pub async fn delete_rag_config(&self, knowledge_base_id: &str) -> Result<bool> {
		let knowledge_base_id = knowledge_base_id.trim();

		if knowledge_base_id.is_empty() {
			return Err(Error::InvalidRequest {
				message: "knowledge_base_id is required.".to_string(),
			});
		}

		Ok(rag_configs::delete(&self.db.pool, knowledge_base_id).await?)
	}
}
