//! Document store: budgets, eviction, search and undo over one ordered index.
//!
//! Every document lives in the [`OrderedIndex`], either resident or spilled
//! to disk. Resident documents are charged against the count and byte
//! budgets and queued for eviction by last use:
//!
//! ```text
//! put ──> OrderedIndex ──> SearchIndex (text words)
//!              │
//!              └──> EvictionQueue ──(over budget)──> move_to_disk
//! get ──> OrderedIndex (loads spilled value) ──> re-queue + re-charge
//! ```
//!
//! A document loaded back from disk is resident but not yet queued or
//! charged. The index reports such loads through a [`LoadObserver`]; the
//! next access queues the document instead of re-ordering a queue entry that
//! does not exist.

use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

use parking_lot::Mutex;
use tessera_buffer::{EvictionQueue, PriorityOracle};
use tessera_common::{Document, DocumentFormat, DocumentKey, Result, StoreConfig};
use tessera_search::SearchIndex;
use tessera_storage::{
    DiskPersistence, DiskPersistenceConfig, LoadObserver, OrderedIndex, PersistenceManager,
};
use tessera_undo::{Command, CommandSet, Revert, UndoLog};
use tracing::{debug, warn};

/// How to reverse one mutation of a key.
#[derive(Debug, Clone)]
pub(crate) enum Reversal {
    /// The key was empty before; remove whatever is there now.
    Remove,
    /// Put the previous document back.
    Restore(Document),
}

/// Keys of resident documents that are not queued or charged.
type Untracked = Arc<Mutex<HashSet<DocumentKey>>>;

/// Records documents the index loads back from disk.
struct LoadTracker(Untracked);

impl LoadObserver<DocumentKey> for LoadTracker {
    fn on_load(&self, key: &DocumentKey) {
        self.0.lock().insert(key.clone());
    }
}

/// Eviction priority: a resident document's last-use stamp.
struct LastUse<'a>(&'a OrderedIndex<DocumentKey, Document>);

impl PriorityOracle<DocumentKey> for LastUse<'_> {
    fn priority(&self, key: &DocumentKey) -> Option<u64> {
        self.0.peek(key).map(Document::last_use)
    }
}

/// Everything undo commands act on.
struct StoreState {
    index: OrderedIndex<DocumentKey, Document>,
    queue: EvictionQueue<DocumentKey>,
    search: SearchIndex<DocumentKey>,
    untracked: Untracked,
    max_document_count: Option<usize>,
    max_document_bytes: Option<usize>,
    /// Resident, queued documents.
    document_count: usize,
    /// Bytes of resident, queued documents.
    document_bytes: usize,
    clock: u64,
}

/// Bounded-memory document store with word search and undo.
pub struct DocumentStore {
    log: UndoLog<DocumentKey, Reversal>,
    state: StoreState,
}

impl DocumentStore {
    /// Creates a store that spills documents as JSON files under
    /// `config.data_dir`.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let disk: DiskPersistence<Document> =
            DiskPersistence::new(DiskPersistenceConfig::from(&config))?;
        Self::with_persistence(config, Box::new(disk))
    }

    /// Creates a store that spills documents through `persistence`.
    pub fn with_persistence(
        config: StoreConfig,
        persistence: Box<dyn PersistenceManager<DocumentKey, Document>>,
    ) -> Result<Self> {
        config.validate()?;

        let untracked: Untracked = Arc::new(Mutex::new(HashSet::new()));
        let mut index = OrderedIndex::with_fanout(config.fanout)?;
        index.bind(persistence);
        index.observe(Box::new(LoadTracker(untracked.clone())));

        debug!(
            data_dir = %config.data_dir.display(),
            max_document_count = ?config.max_document_count,
            max_document_bytes = ?config.max_document_bytes,
            fanout = config.fanout,
            "opened document store"
        );

        Ok(Self {
            log: UndoLog::new(),
            state: StoreState {
                index,
                queue: EvictionQueue::new(),
                search: SearchIndex::new(),
                untracked,
                max_document_count: config.max_document_count,
                max_document_bytes: config.max_document_bytes,
                document_count: 0,
                document_bytes: 0,
                clock: 0,
            },
        })
    }

    /// Stores the content read from `input` under `key`.
    ///
    /// With no input the call deletes `key`. Returns the fingerprint of the
    /// document that was replaced or deleted, or None if there was none.
    pub fn put<R: Read>(
        &mut self,
        input: Option<R>,
        key: DocumentKey,
        format: DocumentFormat,
    ) -> Result<Option<u32>> {
        let Some(mut input) = input else {
            return Ok(self.delete_document(&key)?.map(|doc| doc.fingerprint()));
        };

        let mut content = Vec::new();
        input.read_to_end(&mut content)?;
        let document = Document::from_content(key.clone(), content, format)?;

        let previous = self.state.remove_everywhere(&key)?;
        let reversal = match &previous {
            Some(doc) => Reversal::Restore(doc.clone()),
            None => Reversal::Remove,
        };
        self.log.push(Command::new(key, reversal));
        self.state.place(document)?;

        Ok(previous.map(|doc| doc.fingerprint()))
    }

    /// Returns the document for `key`, loading it from disk if needed.
    pub fn get(&mut self, key: &DocumentKey) -> Result<Option<Document>> {
        let stamp = self.state.tick();
        self.state.touch(key, stamp)
    }

    /// Deletes `key`. Returns whether a document was removed.
    pub fn delete(&mut self, key: &DocumentKey) -> Result<bool> {
        Ok(self.delete_document(key)?.is_some())
    }

    /// Documents containing `word`, most occurrences first.
    pub fn search(&mut self, word: &str) -> Result<Vec<Document>> {
        let keys = self.state.search.get_all_sorted(word, |a, b| a.cmp(b));
        let mut documents = self.state.touch_batch(keys)?;
        documents.sort_by(|a, b| b.word_count(word).cmp(&a.word_count(word)));
        Ok(documents)
    }

    /// Documents containing a word starting with `prefix`, ordered by the
    /// summed counts of those words, highest first.
    pub fn search_by_prefix(&mut self, prefix: &str) -> Result<Vec<Document>> {
        let keys = self
            .state
            .search
            .get_all_with_prefix_sorted(prefix, |a, b| a.cmp(b));
        let mut documents = self.state.touch_batch(keys)?;
        documents.sort_by(|a, b| b.prefix_count(prefix).cmp(&a.prefix_count(prefix)));
        Ok(documents)
    }

    /// Deletes every document containing `word`. Undone as one unit.
    pub fn delete_all(&mut self, word: &str) -> Result<HashSet<DocumentKey>> {
        let keys = self.state.search.get_all_sorted(word, |a, b| a.cmp(b));
        let deleted = self.delete_batch(keys)?;
        self.state.search.delete_all(word);
        Ok(deleted)
    }

    /// Deletes every document containing a word starting with `prefix`.
    /// Undone as one unit.
    pub fn delete_all_with_prefix(&mut self, prefix: &str) -> Result<HashSet<DocumentKey>> {
        let keys = self
            .state
            .search
            .get_all_with_prefix_sorted(prefix, |a, b| a.cmp(b));
        let deleted = self.delete_batch(keys)?;
        self.state.search.delete_all_with_prefix(prefix);
        Ok(deleted)
    }

    /// Reverses the most recent mutation. Fails with `NotFound` if there is
    /// nothing to undo.
    pub fn undo(&mut self) -> Result<()> {
        self.log.undo(&mut self.state)
    }

    /// Reverses the most recent mutation of `key`. Fails with `NotFound` if
    /// no recorded mutation touched `key`.
    pub fn undo_key(&mut self, key: &DocumentKey) -> Result<()> {
        self.log.undo_key(key, &mut self.state)
    }

    /// Sets the resident document limit (None = unbounded) and evicts to fit.
    pub fn set_max_document_count(&mut self, limit: Option<usize>) {
        self.state.max_document_count = limit;
        self.state.evict();
    }

    /// Sets the resident byte limit (None = unbounded) and evicts to fit.
    pub fn set_max_document_bytes(&mut self, limit: Option<usize>) {
        self.state.max_document_bytes = limit;
        self.state.evict();
    }

    /// Resident document limit.
    pub fn max_document_count(&self) -> Option<usize> {
        self.state.max_document_count
    }

    /// Resident byte limit.
    pub fn max_document_bytes(&self) -> Option<usize> {
        self.state.max_document_bytes
    }

    /// Number of documents charged against the budgets.
    pub fn document_count(&self) -> usize {
        self.state.document_count
    }

    /// Bytes charged against the byte budget.
    pub fn document_bytes(&self) -> usize {
        self.state.document_bytes
    }

    /// Returns true if `key` is stored, resident or on disk.
    pub fn contains(&self, key: &DocumentKey) -> bool {
        self.state.index.contains(key)
    }

    /// Returns true if the document for `key` is on disk. Never loads it.
    pub fn is_on_disk(&self, key: &DocumentKey) -> bool {
        self.state.index.is_on_disk(key)
    }

    /// Number of entries on the undo log.
    pub fn undo_depth(&self) -> usize {
        self.log.len()
    }

    fn delete_document(&mut self, key: &DocumentKey) -> Result<Option<Document>> {
        let removed = self.state.remove_everywhere(key)?;
        if let Some(doc) = &removed {
            self.log.push(Command::new(key.clone(), Reversal::Restore(doc.clone())));
        }
        Ok(removed)
    }

    /// Removes each key in turn and records the removals as one undo entry.
    ///
    /// A failed removal leaves that document and the ones after it fully
    /// indexed. Removals made before the failure are still recorded.
    fn delete_batch(&mut self, keys: Vec<DocumentKey>) -> Result<HashSet<DocumentKey>> {
        let mut commands = CommandSet::new();
        let mut deleted = HashSet::with_capacity(keys.len());
        let mut outcome = Ok(());
        for key in keys {
            match self.state.remove_everywhere(&key) {
                Ok(Some(doc)) => {
                    commands.add(Command::new(key.clone(), Reversal::Restore(doc)));
                    deleted.insert(key);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(%key, error = %e, removed = commands.len(), "bulk delete stopped");
                    outcome = Err(e);
                    break;
                }
            }
        }
        if !commands.is_empty() {
            debug!(documents = commands.len(), "bulk delete");
            self.log.push(commands);
        }
        outcome.map(|()| deleted)
    }
}

impl StoreState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn over_budget(&self) -> bool {
        self.max_document_count
            .is_some_and(|max| self.document_count > max)
            || self
                .max_document_bytes
                .is_some_and(|max| self.document_bytes > max)
    }

    /// Adds a document to the index and the word index without queueing it.
    fn index_document(&mut self, document: Document) -> Result<()> {
        let key = document.key().clone();
        for word in document.words() {
            self.search.put(word, key.clone())?;
        }
        self.index.put(key, document)?;
        Ok(())
    }

    /// Inserts a fresh document, spilling it straight to disk if it alone
    /// exceeds the byte budget.
    fn place(&mut self, mut document: Document) -> Result<()> {
        let key = document.key().clone();
        let bytes = document.byte_size();
        document.set_last_use(self.tick());
        self.index_document(document)?;

        if self.max_document_bytes.is_some_and(|max| bytes > max) {
            match self.index.move_to_disk(&key) {
                Ok(()) => debug!(%key, bytes, "oversized document written to disk"),
                Err(e) => {
                    warn!(%key, bytes, error = %e, "could not spill oversized document");
                    self.untracked.lock().insert(key);
                }
            }
            return Ok(());
        }

        self.queue.insert(key, &LastUse(&self.index));
        self.document_count += 1;
        self.document_bytes += bytes;
        self.evict();
        Ok(())
    }

    /// Removes a document from every structure, returning it.
    fn remove_everywhere(&mut self, key: &DocumentKey) -> Result<Option<Document>> {
        let tracked = self.index.peek(key).is_some() && !self.untracked.lock().contains(key);
        if tracked {
            self.queue.delete(key, &LastUse(&self.index));
        }

        let Some(document) = self.index.remove(key)? else {
            return Ok(None);
        };
        for word in document.words() {
            self.search.delete(word, key);
        }
        if tracked {
            self.document_count = self.document_count.saturating_sub(1);
            self.document_bytes = self.document_bytes.saturating_sub(document.byte_size());
        }
        self.untracked.lock().remove(key);
        Ok(Some(document))
    }

    /// Stamps a document as used, queueing it if it was just loaded.
    fn touch(&mut self, key: &DocumentKey, stamp: u64) -> Result<Option<Document>> {
        let Some(document) = self.index.get_mut(key)? else {
            return Ok(None);
        };
        document.set_last_use(stamp);
        let document = document.clone();

        let newly_loaded = self.untracked.lock().remove(key);
        if newly_loaded {
            self.queue.insert(key.clone(), &LastUse(&self.index));
            self.document_count += 1;
            self.document_bytes += document.byte_size();
            self.evict();
        } else {
            self.queue.re_heapify(key, &LastUse(&self.index))?;
        }
        Ok(Some(document))
    }

    /// Touches each key with one shared stamp.
    fn touch_batch(&mut self, keys: Vec<DocumentKey>) -> Result<Vec<Document>> {
        let stamp = self.tick();
        let mut documents = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(document) = self.touch(key, stamp)? {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    /// Spills least-recently-used documents until both budgets hold.
    ///
    /// Stops at the first failed spill; the failed document stays resident
    /// and is re-queued on its next access.
    fn evict(&mut self) {
        while self.over_budget() {
            let Ok(key) = self.queue.remove(&LastUse(&self.index)) else {
                break;
            };
            let bytes = self.index.peek(&key).map_or(0, Document::byte_size);
            self.document_count = self.document_count.saturating_sub(1);
            self.document_bytes = self.document_bytes.saturating_sub(bytes);

            match self.index.move_to_disk(&key) {
                Ok(()) => debug!(%key, bytes, "evicted document to disk"),
                Err(e) => {
                    warn!(%key, error = %e, "eviction stopped");
                    self.untracked.lock().insert(key);
                    break;
                }
            }
        }
    }
}

impl Revert<DocumentKey, Reversal> for StoreState {
    fn revert(&mut self, command: &Command<DocumentKey, Reversal>) -> Result<()> {
        self.remove_everywhere(command.target())?;
        if let Reversal::Restore(previous) = command.action() {
            self.place(previous.clone())?;
        }
        Ok(())
    }
}
