pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read index data from {path}: {source}")]
	ReadIndex {
		path: String,
		source: std::io::Error,
	},
	#[error("Failed to parse index data from {path}: {source}")]
	ParseIndex {
		path: String,
		source: serde_json::Error,
	},
	#[error("Index entry {entry} in {path} has dimension {got}, expected {expected}.")]
	DimensionMismatch {
		path: String,
		entry: usize,
		got: usize,
		expected: usize,
	},
	#[error("Embedding provider failed: {message}")]
	Embedding {
		message: String,
	},
}
