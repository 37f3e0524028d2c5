use std::{path::PathBuf, sync::Arc};

use ragguard_service::{Providers, RagService};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<RagService>,
	/// Re-read by the policy reload endpoint.
	pub config_path: Option<PathBuf>,
}
impl AppState {
	pub fn new(
		config: ragguard_config::Config,
		config_path: Option<PathBuf>,
	) -> color_eyre::Result<Self> {
		let providers = Providers::from_config(&config)?;
		let service = RagService::new(config, providers)?;

		Ok(Self::with_service(service, config_path))
	}

	pub fn with_service(service: RagService, config_path: Option<PathBuf>) -> Self {
		Self { service: Arc::new(service), config_path }
	}
}
