pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Unknown role: {role}.")]
	UnknownRole { role: String },
	#[error("Invalid config: {message}")]
	InvalidConfig { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Index error: {message}")]
	Index { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<ragguard_domain::Error> for Error {
	fn from(err: ragguard_domain::Error) -> Self {
		match err {
			ragguard_domain::Error::UnknownRole { role } => Self::UnknownRole { role },
		}
	}
}

impl From<ragguard_storage::Error> for Error {
	fn from(err: ragguard_storage::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<ragguard_providers::Error> for Error {
	fn from(err: ragguard_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
