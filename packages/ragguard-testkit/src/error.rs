pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0}")]
	Message(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Toml(#[from] toml::de::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Config(#[from] ragguard_config::Error),
}
