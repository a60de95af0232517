pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read user memory from {path}: {source}")]
	ReadMemory {
		path: String,
		source: std::io::Error,
	},
	#[error("Failed to parse user memory in {path}: {source}")]
	ParseMemory {
		path: String,
		source: serde_json::Error,
	},
	#[error("Failed to persist user memory to {path}: {source}")]
	WriteMemory {
		path: String,
		source: std::io::Error,
	},
}
