use std::sync::Arc;

use armory_service::ArmoryService;
use armory_storage::RedisStore;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ArmoryService>,
}
impl AppState {
	pub async fn new(config: armory_config::Config) -> color_eyre::Result<Self> {
		let store = RedisStore::connect(&config.storage.redis).await?;
		let service = ArmoryService::new(&config, Arc::new(store))?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: ArmoryService) -> Self {
		Self { service: Arc::new(service) }
	}
}
