use crate::image_index::{ImageIndex, IndexEntry};
use crate::image_parser::extract_image_references;
use crate::store::Store;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// Store key the serialized index is persisted under.
pub const INDEX_STORE_KEY: &str = "markdown-image-reference-index";

/// Keeps an [`ImageIndex`] in step with document edits and persists it.
///
/// The index is loaded once at construction and written back after every
/// mutation. Store failures never reach the caller: a bad or missing blob
/// starts an empty index, and a failed write is logged while the in-memory
/// index stays authoritative for the life of the process.
pub struct ImageIndexer {
    index: ImageIndex,
    store: Arc<dyn Store>,
}

impl ImageIndexer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let index = load_index(store.as_ref());
        Self { index, store }
    }

    /// Re-index one document from its current text.
    ///
    /// Whatever the document contributed before is discarded first, so after
    /// this call the index holds exactly the references present in `text`.
    /// `modified` is recorded in logs only.
    pub fn update(
        &mut self,
        document_id: &str,
        document_name: &str,
        text: &str,
        modified: DateTime<Utc>,
    ) {
        let references = extract_image_references(text);
        tracing::debug!(
            "Doc {} ({}): modified={}, content length={}, images={:?}",
            document_id,
            document_name,
            modified,
            text.len(),
            references.keys().collect::<Vec<_>>()
        );
        let image_count = references.len();

        self.index
            .replace_document(document_id, document_name, references);
        self.save();

        tracing::info!(
            "Indexed doc {}: {} image(s), {} key(s) total",
            document_id,
            image_count,
            self.index.len()
        );
    }

    /// Drop every reference owned by `document_id`. Unknown ids are a no-op
    /// apart from the save.
    pub fn remove(&mut self, document_id: &str) {
        let modified_count = self.index.remove_document(document_id);
        self.save();

        tracing::info!(
            "Removed doc {} from {} image key(s)",
            document_id,
            modified_count
        );
    }

    /// Entries for `image_key`; empty when nothing references it.
    pub fn query(&self, image_key: &str) -> &[IndexEntry] {
        self.index.get(image_key)
    }

    /// Empty the index, e.g. before a forced full rebuild.
    pub fn clear(&mut self) {
        self.index.clear();
        self.save();
        tracing::info!("Cleared image reference index");
    }

    pub fn is_referenced(&self, image_key: &str) -> bool {
        self.index.contains_key(image_key)
    }

    /// Ids of the documents that embed `image_key`.
    pub fn documents_referencing(&self, image_key: &str) -> Vec<&str> {
        self.query(image_key)
            .iter()
            .map(|entry| entry.document_id.as_str())
            .collect()
    }

    /// The subset of `candidates` no document references, in input order.
    pub fn unreferenced<'a, I>(&self, candidates: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .filter(|name| !self.is_referenced(name))
            .collect()
    }

    pub fn image_keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys()
    }

    /// Number of distinct image keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &ImageIndex {
        &self.index
    }

    fn save(&self) {
        let bytes = match serde_json::to_vec(&self.index) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Failed to serialize image reference index: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(INDEX_STORE_KEY, bytes) {
            tracing::error!("Failed to save image reference index: {}", e);
        }
    }
}

fn load_index(store: &dyn Store) -> ImageIndex {
    let bytes = match store.get(INDEX_STORE_KEY) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::debug!("No stored image reference index, starting empty");
            return ImageIndex::new();
        }
        Err(e) => {
            tracing::warn!("Failed to load image reference index, rebuilding: {}", e);
            return ImageIndex::new();
        }
    };

    match serde_json::from_slice::<ImageIndex>(&bytes) {
        Ok(mut index) => {
            index.prune_empty();
            tracing::info!("Loaded image reference index with {} key(s)", index.len());
            index
        }
        Err(e) => {
            tracing::warn!("Stored image reference index is malformed, rebuilding: {}", e);
            ImageIndex::new()
        }
    }
}

/// Cloneable handle for hosts that call the indexer from several threads.
///
/// A single mutex is held for the whole of each operation, so a query never
/// observes an update halfway through replacing a document's entries.
#[derive(Clone)]
pub struct SharedImageIndexer {
    inner: Arc<Mutex<ImageIndexer>>,
}

impl SharedImageIndexer {
    pub fn new(indexer: ImageIndexer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(indexer)),
        }
    }

    pub fn update(&self, document_id: &str, document_name: &str, text: &str, modified: DateTime<Utc>) {
        self.with(|indexer| indexer.update(document_id, document_name, text, modified))
    }

    pub fn remove(&self, document_id: &str) {
        self.with(|indexer| indexer.remove(document_id))
    }

    pub fn query(&self, image_key: &str) -> Vec<IndexEntry> {
        self.with(|indexer| indexer.query(image_key).to_vec())
    }

    pub fn clear(&self) {
        self.with(|indexer| indexer.clear())
    }

    /// Run `f` with exclusive access to the indexer.
    pub fn with<R>(&self, f: impl FnOnce(&mut ImageIndexer) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}
