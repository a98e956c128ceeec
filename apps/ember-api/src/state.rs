use std::sync::Arc;

use ember_service::ContextService;
use ember_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ContextService>,
}
impl AppState {
	pub async fn new(config: ember_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;
		let service = ContextService::new(config, db, qdrant);

		Ok(Self { service: Arc::new(service) })
	}
}
