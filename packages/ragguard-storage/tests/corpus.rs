use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use ragguard_storage::{Error, memory::MemoryIndex};

const CORPUS_JSON: &str = r#"{
	"version": "2026-10-01",
	"chunks": [
		{ "chunk_id": "HR_CHUNK_1", "document_id": "hr_handbook", "embedding": [1.0, 0.0, 0.0] },
		{ "chunk_id": "HR_CHUNK_2", "document_id": "hr_handbook", "embedding": [0.9, 0.1, 0.0] },
		{ "chunk_id": "FINANCE_CHUNK_12", "document_id": "q3", "embedding": [0.0, 1.0, 0.0] },
		{ "chunk_id": "DRAFT_CHUNK_1", "document_id": "drafts", "embedding": [] }
	]
}"#;

fn write_temp_corpus(payload: &str) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let mut path = env::temp_dir();

	path.push(format!("ragguard_corpus_test_{nanos}_{}_{ordinal}.json", std::process::id()));

	fs::write(&path, payload).expect("Failed to write test corpus.");

	path
}

#[test]
fn opens_corpus_in_file_order() {
	let path = write_temp_corpus(CORPUS_JSON);
	let index = MemoryIndex::open(&path).expect("Corpus must load.");

	fs::remove_file(&path).expect("Failed to remove test corpus.");

	assert_eq!(index.version(), "2026-10-01");
	assert_eq!(
		index.chunk_ids(),
		&["HR_CHUNK_1", "HR_CHUNK_2", "FINANCE_CHUNK_12", "DRAFT_CHUNK_1"].map(String::from)
	);
	assert_eq!(index.document_id("HR_CHUNK_2"), Some("hr_handbook"));
	assert_eq!(index.document_id("MISSING"), None);
}

#[test]
fn lookup_skips_unknown_and_empty_embeddings() {
	let path = write_temp_corpus(CORPUS_JSON);
	let index = MemoryIndex::open(&path).expect("Corpus must load.");

	fs::remove_file(&path).expect("Failed to remove test corpus.");

	let found = index.lookup(["HR_CHUNK_1", "DRAFT_CHUNK_1", "NOT_THERE"]);

	assert_eq!(found.len(), 1);
	assert_eq!(found.get("HR_CHUNK_1"), Some(&vec![1.0, 0.0, 0.0]));
}

#[test]
fn missing_file_is_a_read_error() {
	let path = env::temp_dir().join("ragguard_corpus_test_missing.json");

	assert!(matches!(MemoryIndex::open(&path), Err(Error::Read { .. })));
}

#[test]
fn malformed_json_is_a_parse_error() {
	let path = write_temp_corpus("{\"chunks\": [");
	let result = MemoryIndex::open(&path);

	fs::remove_file(&path).expect("Failed to remove test corpus.");

	assert!(matches!(result, Err(Error::Json(_))));
}
