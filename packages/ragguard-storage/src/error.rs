#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read corpus at {path:?}.")]
	Read { path: std::path::PathBuf, source: std::io::Error },
	#[error(transparent)]
	Json(#[from] serde_json::Error),
	#[error("Invalid corpus: {0}")]
	InvalidCorpus(String),
}
