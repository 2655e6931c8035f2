//! Document store integration tests.
//!
//! Exercises the public store surface against a real data directory:
//! budgets and eviction, reload on access, word and prefix search, and undo
//! of single and bulk mutations.

use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

use tessera_common::{Document, DocumentFormat, DocumentKey, Result, StoreConfig, TesseraError};
use tessera_storage::PersistenceManager;
use tessera_store::DocumentStore;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn key(name: &str) -> DocumentKey {
    DocumentKey::new(format!("http://example.com/docs/{name}")).unwrap()
}

fn spill_path(dir: &Path, name: &str) -> std::path::PathBuf {
    dir.join("http%3A%2F%2F")
        .join("example%2Ecom")
        .join("docs")
        .join(format!("{name}.json"))
}

fn open(config: impl FnOnce(&mut StoreConfig)) -> (DocumentStore, TempDir) {
    init_tracing();
    let dir = tempdir().unwrap();
    let mut cfg = StoreConfig::with_data_dir(dir.path());
    cfg.fsync_enabled = false;
    config(&mut cfg);
    (DocumentStore::new(cfg).unwrap(), dir)
}

fn put_text(store: &mut DocumentStore, name: &str, text: &str) -> Option<u32> {
    store
        .put(Some(text.as_bytes()), key(name), DocumentFormat::Text)
        .unwrap()
}

fn text_of(store: &mut DocumentStore, name: &str) -> Option<String> {
    store
        .get(&key(name))
        .unwrap()
        .and_then(|doc| doc.text_content().map(str::to_string))
}

fn fingerprint(name: &str, text: &str) -> u32 {
    Document::text(key(name), text).unwrap().fingerprint()
}

fn keys_of(documents: &[Document]) -> Vec<DocumentKey> {
    documents.iter().map(|doc| doc.key().clone()).collect()
}

/// Collaborator whose every call fails.
struct BrokenDisk;

impl PersistenceManager<DocumentKey, Document> for BrokenDisk {
    fn serialize(&self, _key: &DocumentKey, _value: &Document) -> Result<()> {
        Err(std::io::Error::other("disk unplugged").into())
    }

    fn deserialize(&self, _key: &DocumentKey) -> Result<Option<Document>> {
        Err(std::io::Error::other("disk unplugged").into())
    }

    fn delete(&self, _key: &DocumentKey) -> Result<bool> {
        Err(std::io::Error::other("disk unplugged").into())
    }
}

/// In-memory collaborator whose reads can be switched off.
#[derive(Clone, Default)]
struct FlakyDisk {
    files: Arc<Mutex<HashMap<DocumentKey, Document>>>,
    fail_reads: Arc<AtomicBool>,
}

impl PersistenceManager<DocumentKey, Document> for FlakyDisk {
    fn serialize(&self, key: &DocumentKey, value: &Document) -> Result<()> {
        self.files.lock().insert(key.clone(), value.clone());
        Ok(())
    }

    fn deserialize(&self, key: &DocumentKey) -> Result<Option<Document>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("read failed").into());
        }
        Ok(self.files.lock().get(key).cloned())
    }

    fn delete(&self, key: &DocumentKey) -> Result<bool> {
        Ok(self.files.lock().remove(key).is_some())
    }
}

#[test]
fn test_put_returns_previous_fingerprint() {
    let (mut store, _dir) = open(|_| {});

    assert_eq!(put_text(&mut store, "a", "first version"), None);
    assert_eq!(
        put_text(&mut store, "a", "second version"),
        Some(fingerprint("a", "first version"))
    );
    assert_eq!(text_of(&mut store, "a").as_deref(), Some("second version"));

    // No input deletes.
    let deleted = store
        .put(None::<&[u8]>, key("a"), DocumentFormat::Text)
        .unwrap();
    assert_eq!(deleted, Some(fingerprint("a", "second version")));
    assert_eq!(store.get(&key("a")).unwrap(), None);

    let missing = store
        .put(None::<&[u8]>, key("a"), DocumentFormat::Text)
        .unwrap();
    assert_eq!(missing, None);
}

#[test]
fn test_invalid_content_leaves_store_untouched() {
    let (mut store, _dir) = open(|_| {});
    put_text(&mut store, "a", "kept");

    let err = store
        .put(Some("   ".as_bytes()), key("a"), DocumentFormat::Text)
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidArgument(_)));

    let err = store
        .put(Some(&[0xff, 0xfe][..]), key("a"), DocumentFormat::Text)
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidArgument(_)));

    assert_eq!(text_of(&mut store, "a").as_deref(), Some("kept"));
    assert_eq!(store.undo_depth(), 1);
}

#[test]
fn test_binary_documents_are_not_searchable() {
    let (mut store, _dir) = open(|_| {});
    store
        .put(Some(&b"hello bytes"[..]), key("bin"), DocumentFormat::Binary)
        .unwrap();

    let doc = store.get(&key("bin")).unwrap().unwrap();
    assert_eq!(doc.format(), DocumentFormat::Binary);
    assert_eq!(doc.binary_content().map(|b| &b[..]), Some(&b"hello bytes"[..]));
    assert!(store.search("hello").unwrap().is_empty());
    assert_eq!(store.document_bytes(), 11);
}

#[test]
fn test_search_orders_by_occurrences() {
    let (mut store, _dir) = open(|_| {});
    put_text(&mut store, "one", "apple banana");
    put_text(&mut store, "three", "apple apple apple");
    put_text(&mut store, "two", "apple cherry apple");
    put_text(&mut store, "none", "banana cherry");

    let found = store.search("apple").unwrap();
    assert_eq!(keys_of(&found), vec![key("three"), key("two"), key("one")]);
    assert!(store.search("durian").unwrap().is_empty());
}

#[test]
fn test_search_is_case_sensitive() {
    let (mut store, _dir) = open(|_| {});
    put_text(&mut store, "a", "Apple");
    assert!(store.search("apple").unwrap().is_empty());
    assert_eq!(store.search("Apple").unwrap().len(), 1);
}

#[test]
fn test_search_by_prefix_orders_by_summed_counts() {
    let (mut store, _dir) = open(|_| {});
    put_text(&mut store, "breeze", "a sea breeze");
    put_text(&mut store, "shells", "seashells by the seashore");
    put_text(&mut store, "other", "nothing to see");

    let found = store.search_by_prefix("sea").unwrap();
    assert_eq!(keys_of(&found), vec![key("shells"), key("breeze")]);
    assert_eq!(found[0].prefix_count("sea"), 2);
}

#[test]
fn test_undo_fresh_put_removes_document() {
    let (mut store, _dir) = open(|_| {});
    put_text(&mut store, "a", "temporary words");

    store.undo().unwrap();
    assert_eq!(store.get(&key("a")).unwrap(), None);
    assert!(store.search("temporary").unwrap().is_empty());
    assert_eq!(store.document_count(), 0);
    assert_eq!(store.document_bytes(), 0);
    assert_eq!(store.undo_depth(), 0);
}

#[test]
fn test_undo_overwrite_restores_previous() {
    let (mut store, _dir) = open(|_| {});
    put_text(&mut store, "a", "old words");
    put_text(&mut store, "a", "new text");

    store.undo().unwrap();
    assert_eq!(text_of(&mut store, "a").as_deref(), Some("old words"));
    assert_eq!(keys_of(&store.search("old").unwrap()), vec![key("a")]);
    assert!(store.search("new").unwrap().is_empty());
    assert_eq!(store.document_count(), 1);
    assert_eq!(store.document_bytes(), 9);
}

#[test]
fn test_undo_delete_restores_document() {
    let (mut store, _dir) = open(|_| {});
    put_text(&mut store, "a", "keep me");
    assert!(store.delete(&key("a")).unwrap());
    assert!(!store.delete(&key("a")).unwrap());
    // Deleting nothing records nothing.
    assert_eq!(store.undo_depth(), 2);

    store.undo().unwrap();
    assert_eq!(text_of(&mut store, "a").as_deref(), Some("keep me"));
    assert_eq!(keys_of(&store.search("keep").unwrap()), vec![key("a")]);
}

#[test]
fn test_undo_empty_log_is_not_found() {
    let (mut store, _dir) = open(|_| {});
    assert!(store.undo().unwrap_err().is_not_found());

    put_text(&mut store, "a", "text");
    assert!(store.undo_key(&key("b")).unwrap_err().is_not_found());
}

#[test]
fn test_delete_all_undoes_as_one_unit() {
    let (mut store, _dir) = open(|_| {});
    put_text(&mut store, "a", "shared alpha");
    put_text(&mut store, "b", "shared beta");
    put_text(&mut store, "c", "gamma");
    let depth = store.undo_depth();

    let deleted = store.delete_all("shared").unwrap();
    assert_eq!(deleted.len(), 2);
    assert!(deleted.contains(&key("a")) && deleted.contains(&key("b")));
    assert!(store.search("alpha").unwrap().is_empty());
    assert_eq!(store.document_count(), 1);
    assert_eq!(store.undo_depth(), depth + 1);

    store.undo().unwrap();
    assert_eq!(text_of(&mut store, "a").as_deref(), Some("shared alpha"));
    assert_eq!(text_of(&mut store, "b").as_deref(), Some("shared beta"));
    assert_eq!(store.search("shared").unwrap().len(), 2);
    assert_eq!(store.undo_depth(), depth);
}

#[test]
fn test_delete_all_without_matches_records_nothing() {
    let (mut store, _dir) = open(|_| {});
    put_text(&mut store, "a", "word");
    assert!(store.delete_all("missing").unwrap().is_empty());
    assert!(store.delete_all_with_prefix("zz").unwrap().is_empty());
    assert_eq!(store.undo_depth(), 1);
}

#[test]
fn test_undo_key_inside_bulk_delete() {
    let (mut store, _dir) = open(|_| {});
    put_text(&mut store, "a", "prefixed apple");
    put_text(&mut store, "b", "prefixed apricot");
    put_text(&mut store, "c", "unrelated");

    let deleted = store.delete_all_with_prefix("ap").unwrap();
    assert_eq!(deleted.len(), 2);
    put_text(&mut store, "c", "changed later");

    store.undo_key(&key("b")).unwrap();
    assert_eq!(text_of(&mut store, "b").as_deref(), Some("prefixed apricot"));
    assert_eq!(store.get(&key("a")).unwrap(), None);
    assert_eq!(text_of(&mut store, "c").as_deref(), Some("changed later"));

    // The newest entry is still the overwrite of "c".
    store.undo().unwrap();
    assert_eq!(text_of(&mut store, "c").as_deref(), Some("unrelated"));

    // Then the rest of the bulk delete.
    store.undo().unwrap();
    assert_eq!(text_of(&mut store, "a").as_deref(), Some("prefixed apple"));
}

#[test]
fn test_undo_key_picks_latest_change_for_key() {
    let (mut store, _dir) = open(|_| {});
    put_text(&mut store, "a", "v1");
    put_text(&mut store, "b", "other");
    put_text(&mut store, "a", "v2");
    put_text(&mut store, "b", "other again");

    store.undo_key(&key("a")).unwrap();
    assert_eq!(text_of(&mut store, "a").as_deref(), Some("v1"));
    assert_eq!(text_of(&mut store, "b").as_deref(), Some("other again"));
    assert_eq!(store.undo_depth(), 3);
}

#[test]
fn test_byte_budget_spills_least_recent() {
    let (mut store, dir) = open(|cfg| cfg.max_document_bytes = Some(10));
    put_text(&mut store, "a", "abcdef");
    put_text(&mut store, "b", "ghijklm");

    assert!(store.is_on_disk(&key("a")));
    assert!(!store.is_on_disk(&key("b")));
    assert!(spill_path(dir.path(), "a").exists());
    assert_eq!(store.document_count(), 1);
    assert_eq!(store.document_bytes(), 7);

    // Reading "a" brings it back and pushes "b" out.
    assert_eq!(text_of(&mut store, "a").as_deref(), Some("abcdef"));
    assert!(!spill_path(dir.path(), "a").exists());
    assert!(store.is_on_disk(&key("b")));
    assert_eq!(store.document_bytes(), 6);
}

#[test]
fn test_count_budget_and_reload() {
    let (mut store, _dir) = open(|_| {});
    for i in 0..5 {
        put_text(&mut store, &format!("d{i}"), &format!("document number{i}"));
    }
    store.set_max_document_count(Some(3));
    assert_eq!(store.max_document_count(), Some(3));
    assert_eq!(store.document_count(), 3);
    assert!(store.is_on_disk(&key("d0")));
    assert!(store.is_on_disk(&key("d1")));

    assert_eq!(text_of(&mut store, "d0").as_deref(), Some("document number0"));
    assert!(!store.is_on_disk(&key("d0")));
    assert!(store.is_on_disk(&key("d2")));
    assert_eq!(store.document_count(), 3);

    // Spilled documents still answer searches.
    assert_eq!(store.search("document").unwrap().len(), 5);
    assert_eq!(store.document_count(), 3);

    store.set_max_document_count(None);
    assert_eq!(store.search("document").unwrap().len(), 5);
    assert_eq!(store.document_count(), 5);
}

#[test]
fn test_oversized_document_goes_straight_to_disk() {
    let (mut store, dir) = open(|cfg| cfg.max_document_bytes = Some(4));
    put_text(&mut store, "small", "tiny");
    put_text(&mut store, "big", "far too long");

    assert!(store.is_on_disk(&key("big")));
    assert!(spill_path(dir.path(), "big").exists());
    assert!(!store.is_on_disk(&key("small")));
    assert_eq!(store.document_count(), 1);
    assert_eq!(store.document_bytes(), 4);

    // Reading it charges it against the budget, which spills everything.
    assert_eq!(keys_of(&store.search("far").unwrap()), vec![key("big")]);
    assert!(store.is_on_disk(&key("big")));
    assert!(store.is_on_disk(&key("small")));
    assert_eq!(store.document_count(), 0);
    assert_eq!(store.document_bytes(), 0);
}

#[test]
fn test_delete_spilled_document() {
    let (mut store, dir) = open(|cfg| cfg.max_document_count = Some(1));
    put_text(&mut store, "a", "spilled text");
    put_text(&mut store, "b", "resident text");
    assert!(store.is_on_disk(&key("a")));

    assert!(store.delete(&key("a")).unwrap());
    assert!(!spill_path(dir.path(), "a").exists());
    assert!(!store.contains(&key("a")));
    assert_eq!(keys_of(&store.search("text").unwrap()), vec![key("b")]);
    assert_eq!(store.document_count(), 1);

    store.undo().unwrap();
    assert_eq!(text_of(&mut store, "a").as_deref(), Some("spilled text"));
    assert!(store.is_on_disk(&key("b")));
}

#[test]
fn test_undo_put_of_spilled_document() {
    let (mut store, _dir) = open(|cfg| cfg.max_document_count = Some(1));
    put_text(&mut store, "a", "first");
    put_text(&mut store, "b", "second");
    assert!(store.is_on_disk(&key("a")));

    // Undo the put of "b", then the put of "a" while it is on disk.
    store.undo().unwrap();
    store.undo().unwrap();
    assert!(!store.contains(&key("a")));
    assert!(!store.contains(&key("b")));
    assert_eq!(store.document_count(), 0);
}

#[test]
fn test_failed_spill_stops_eviction_quietly() {
    init_tracing();
    let mut cfg = StoreConfig::default();
    cfg.max_document_count = Some(1);
    let mut store = DocumentStore::with_persistence(cfg, Box::new(BrokenDisk)).unwrap();

    put_text(&mut store, "a", "alpha");
    put_text(&mut store, "b", "beta");
    assert!(!store.is_on_disk(&key("a")));
    assert!(!store.is_on_disk(&key("b")));

    assert_eq!(text_of(&mut store, "a").as_deref(), Some("alpha"));
    assert_eq!(text_of(&mut store, "b").as_deref(), Some("beta"));
    assert!(store.delete(&key("a")).unwrap());
    assert_eq!(store.document_count(), 1);
}

#[test]
fn test_keys_differing_by_scheme_spill_separately() {
    let (mut store, _dir) = open(|_| {});
    let plain = DocumentKey::new("http://h/a").unwrap();
    let secure = DocumentKey::new("https://h/a").unwrap();
    store
        .put(Some(&b"first doc"[..]), plain.clone(), DocumentFormat::Text)
        .unwrap();
    store
        .put(Some(&b"second doc"[..]), secure.clone(), DocumentFormat::Text)
        .unwrap();

    store.set_max_document_count(Some(0));
    assert!(store.is_on_disk(&plain));
    assert!(store.is_on_disk(&secure));

    let first = store.get(&plain).unwrap().unwrap();
    assert_eq!(first.key(), &plain);
    assert_eq!(first.text_content(), Some("first doc"));
    let second = store.get(&secure).unwrap().unwrap();
    assert_eq!(second.key(), &secure);
    assert_eq!(second.text_content(), Some("second doc"));
}

#[test]
fn test_failed_bulk_delete_keeps_remaining_documents_searchable() {
    init_tracing();
    let disk = FlakyDisk::default();
    let mut cfg = StoreConfig::default();
    cfg.max_document_count = Some(1);
    let mut store = DocumentStore::with_persistence(cfg, Box::new(disk.clone())).unwrap();

    // "b" spills, "a" stays resident; removal runs in key order.
    put_text(&mut store, "b", "x two");
    put_text(&mut store, "a", "x one");
    assert!(store.is_on_disk(&key("b")));
    let depth = store.undo_depth();

    disk.fail_reads.store(true, Ordering::SeqCst);
    let err = store.delete_all("x").unwrap_err();
    assert!(err.is_io_failure());

    // "a" went before the failure and its removal is undoable.
    assert!(!store.contains(&key("a")));
    assert!(store.contains(&key("b")));
    assert_eq!(store.undo_depth(), depth + 1);

    disk.fail_reads.store(false, Ordering::SeqCst);
    assert_eq!(keys_of(&store.search("x").unwrap()), vec![key("b")]);
    assert_eq!(keys_of(&store.search("two").unwrap()), vec![key("b")]);

    store.undo().unwrap();
    assert_eq!(store.search("x").unwrap().len(), 2);
    assert_eq!(text_of(&mut store, "a").as_deref(), Some("x one"));
}

#[test]
fn test_failed_bulk_delete_on_first_document_changes_nothing() {
    init_tracing();
    let disk = FlakyDisk::default();
    let mut cfg = StoreConfig::default();
    cfg.max_document_count = Some(1);
    let mut store = DocumentStore::with_persistence(cfg, Box::new(disk.clone())).unwrap();

    put_text(&mut store, "a", "x one");
    put_text(&mut store, "b", "x two");
    assert!(store.is_on_disk(&key("a")));
    let depth = store.undo_depth();

    disk.fail_reads.store(true, Ordering::SeqCst);
    assert!(store.delete_all_with_prefix("x").unwrap_err().is_io_failure());
    assert!(store.contains(&key("a")));
    assert!(store.contains(&key("b")));
    assert_eq!(store.undo_depth(), depth);

    disk.fail_reads.store(false, Ordering::SeqCst);
    assert_eq!(store.search("x").unwrap().len(), 2);
}

#[test]
fn test_invalid_fanout_is_rejected() {
    let dir = tempdir().unwrap();
    let mut cfg = StoreConfig::with_data_dir(dir.path());
    cfg.fanout = 3;
    let err = DocumentStore::new(cfg).err().unwrap();
    assert!(matches!(err, TesseraError::Config(_)));
}

#[test]
fn test_random_operations_match_model() {
    let (mut store, _dir) = open(|cfg| {
        cfg.fanout = 4;
        cfg.max_document_count = Some(6);
        cfg.max_document_bytes = Some(120);
    });
    let mut rng = rand::rng();
    let names: Vec<String> = (0..20).map(|i| format!("n{i}")).collect();
    let words = ["red", "green", "blue", "cyan", "magenta"];
    let mut model: HashMap<String, String> = HashMap::new();

    for _ in 0..600 {
        let name = names.choose(&mut rng).unwrap();
        match rng.random_range(0..10) {
            0..=4 => {
                let len = rng.random_range(1..6);
                let text: Vec<&str> = (0..len).map(|_| *words.choose(&mut rng).unwrap()).collect();
                let text = text.join(" ");
                put_text(&mut store, name, &text);
                model.insert(name.clone(), text);
            }
            5 | 6 => {
                assert_eq!(store.delete(&key(name)).unwrap(), model.remove(name).is_some());
            }
            7 => {
                if rng.random_bool(0.5) {
                    store.set_max_document_count(Some(rng.random_range(1..8)));
                } else {
                    store.set_max_document_bytes(Some(rng.random_range(10..150)));
                }
            }
            _ => {
                assert_eq!(text_of(&mut store, name), model.get(name).cloned());
            }
        }

        if let Some(max) = store.max_document_count() {
            assert!(store.document_count() <= max);
        }
        if let Some(max) = store.max_document_bytes() {
            assert!(store.document_bytes() <= max);
        }
    }

    for name in &names {
        assert_eq!(text_of(&mut store, name), model.get(name).cloned());
    }
    let word = words.choose(&mut rng).unwrap();
    let expected = model.values().filter(|text| text.split(' ').any(|w| w == *word)).count();
    assert_eq!(store.search(word).unwrap().len(), expected);
}
