use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use haven_config::Error;

const SAMPLE_CONFIG_TOML: &str = r#"
[service]
http_bind = "127.0.0.1:8080"
admin_bind = "127.0.0.1:8081"
log_level = "info"

[session]
idle_secs = 300
sweep_interval_secs = 60
history_window = 10
max_steps_per_turn = 12
review_max_retries = 1

[providers.llm]
provider_id = "p"
api_base = "http://localhost"
api_key = "key"
path = "/v1/chat/completions"
model = "m"
temperature = 0.2
timeout_ms = 1000
max_retries = 3

[providers.embedding]
provider_id = "p"
api_base = "http://localhost"
api_key = "key"
path = "/v1/embeddings"
model = "m"
dimensions = 8
timeout_ms = 1000

[providers.speech]
provider_id = "p"
api_base = "http://localhost"
api_key = "key"
transcribe_path = "/v1/transcribe"
synthesize_path = "/v1/synthesize"
timeout_ms = 1000

[retrieval]
short_query_words = 6
long_query_words = 40
snippet_max_chars = 2000
snippet_prefix_window = 40

[[retrieval.index]]
name = "support"
data_path = "indices/support.json"
metric = "cosine"
relevance_threshold = 0.25
default_k = 5

[[retrieval.index]]
name = "compliance"
data_path = "indices/compliance.json"
metric = "cosine"
relevance_threshold = 0.30
default_k = 8

[storage]
user_memory_path = "data/user_memory.json"
"#;

fn mutate(section_path: &[&str], key: &str, value: Value) -> String {
	let mut root: Value = toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let mut cursor = &mut root;

	for section in section_path {
		cursor = cursor
			.as_table_mut()
			.and_then(|table| table.get_mut(*section))
			.expect("Sample config must include the requested section.");
	}

	cursor
		.as_table_mut()
		.expect("Section must be a table.")
		.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render mutated config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("haven_config_{pid}_{nanos}_{ordinal}.toml"));
	fs::write(&path, payload).expect("Failed to write temp config.");

	path
}

fn load(payload: String) -> haven_config::Result<haven_config::Config> {
	let path = write_temp_config(payload);
	let result = haven_config::load(&path);

	let _ = fs::remove_file(&path);

	result
}

#[test]
fn sample_config_loads() {
	let cfg = load(SAMPLE_CONFIG_TOML.to_string()).expect("Sample config must load.");

	assert_eq!(cfg.retrieval.indices.len(), 2);
	assert_eq!(cfg.retrieval.indices[0].name, "support");
	assert_eq!(cfg.session.review_max_retries, 1);
}

#[test]
fn rejects_zero_idle_secs() {
	let payload = mutate(&["session"], "idle_secs", Value::Integer(0));
	let err = load(payload).expect_err("Zero idle_secs must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn rejects_duplicate_index_names() {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let retrieval = root
		.as_table_mut()
		.and_then(|table| table.get_mut("retrieval"))
		.and_then(Value::as_table_mut)
		.expect("Sample config must include [retrieval].");
	let indices = retrieval
		.get_mut("index")
		.and_then(Value::as_array_mut)
		.expect("Sample config must include retrieval indices.");
	let duplicate = indices[0].clone();

	indices.push(duplicate);

	let payload = toml::to_string(&root).expect("Failed to render mutated config.");
	let err = load(payload).expect_err("Duplicate index names must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn rejects_unknown_metric() {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let indices = root
		.as_table_mut()
		.and_then(|table| table.get_mut("retrieval"))
		.and_then(Value::as_table_mut)
		.and_then(|retrieval| retrieval.get_mut("index"))
		.and_then(Value::as_array_mut)
		.expect("Sample config must include retrieval indices.");

	indices[0]
		.as_table_mut()
		.expect("Index entry must be a table.")
		.insert("metric".to_string(), Value::String("manhattan".to_string()));

	let payload = toml::to_string(&root).expect("Failed to render mutated config.");
	let err = load(payload).expect_err("Unknown metric must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn rejects_empty_api_key() {
	let payload = mutate(&["providers", "llm"], "api_key", Value::String(" ".to_string()));
	let err = load(payload).expect_err("Blank api_key must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn rejects_review_retry_budget_of_zero() {
	let payload = mutate(&["session"], "review_max_retries", Value::Integer(0));
	let err = load(payload).expect_err("Zero review retries must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn normalizes_blank_user_memory_path() {
	let payload = mutate(&["storage"], "user_memory_path", Value::String("  ".to_string()));
	let cfg = load(payload).expect("Blank user_memory_path must normalize to None.");

	assert!(cfg.storage.user_memory_path.is_none());
}
