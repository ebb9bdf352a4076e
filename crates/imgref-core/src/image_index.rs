use crate::image_parser::Position;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// All occurrences of one image inside one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub document_id: String,
    pub document_name: String,
    /// Never empty.
    pub positions: Vec<Position>,
}

/// Inverted index from image key to the documents that embed it.
///
/// Holds at most one entry per document under each key, and never keeps a key
/// whose entry list is empty. Serializes as a JSON object with keys in sorted
/// order, so equal indexes always produce equal bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageIndex {
    images: BTreeMap<String, Vec<IndexEntry>>,
}

impl ImageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries for `image_key`, or an empty slice when nothing references it.
    pub fn get(&self, image_key: &str) -> &[IndexEntry] {
        self.images
            .get(image_key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains_key(&self, image_key: &str) -> bool {
        self.images.contains_key(image_key)
    }

    /// Indexed image keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    /// Ids of every document contributing at least one entry, sorted.
    pub fn document_ids(&self) -> BTreeSet<&str> {
        self.images
            .values()
            .flatten()
            .map(|entry| entry.document_id.as_str())
            .collect()
    }

    /// Number of distinct image keys.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Replace everything `document_id` contributes with `references`.
    ///
    /// Keys with no positions are ignored so that no entry is ever empty.
    pub fn replace_document(
        &mut self,
        document_id: &str,
        document_name: &str,
        references: BTreeMap<String, Vec<Position>>,
    ) {
        self.remove_document(document_id);

        for (image_key, positions) in references {
            if positions.is_empty() {
                continue;
            }
            self.images.entry(image_key).or_default().push(IndexEntry {
                document_id: document_id.to_string(),
                document_name: document_name.to_string(),
                positions,
            });
        }
    }

    /// Drop every entry owned by `document_id`, then drop keys left with no
    /// entries. Idempotent.
    ///
    /// Returns the number of image keys that lost an entry.
    pub fn remove_document(&mut self, document_id: &str) -> usize {
        let mut modified_count = 0;

        self.images.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|entry| entry.document_id != document_id);
            if entries.len() != before {
                modified_count += 1;
            }
            !entries.is_empty()
        });

        modified_count
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    /// Drop entries without positions and keys without entries. Only needed
    /// for indexes deserialized from blobs this crate did not write.
    pub(crate) fn prune_empty(&mut self) {
        self.images.retain(|_, entries| {
            entries.retain(|entry| !entry.positions.is_empty());
            !entries.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_parser::extract_image_references;

    fn index_with(docs: &[(&str, &str)]) -> ImageIndex {
        let mut index = ImageIndex::new();
        for (id, text) in docs {
            index.replace_document(id, id, extract_image_references(text));
        }
        index
    }

    #[test]
    fn empty_index_answers_empty() {
        let index = ImageIndex::new();
        assert!(index.get("anything.png").is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn replace_groups_positions_under_one_entry() {
        let index = index_with(&[("doc1", "![a](x/foo.png)\n![b](y/foo.png)")]);
        let entries = index.get("foo.png");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].document_id, "doc1");
        assert_eq!(entries[0].positions.len(), 2);
    }

    #[test]
    fn replace_supersedes_previous_contribution() {
        let mut index = index_with(&[("doc1", "![a](old.png)")]);
        index.replace_document("doc1", "doc1", extract_image_references("![a](new.png)"));

        assert!(!index.contains_key("old.png"));
        assert_eq!(index.get("new.png").len(), 1);
    }

    #[test]
    fn replace_twice_keeps_one_entry_per_document() {
        let mut index = index_with(&[("doc1", "![a](p.png)")]);
        index.replace_document("doc1", "doc1", extract_image_references("![a](p.png)"));
        assert_eq!(index.get("p.png").len(), 1);
    }

    #[test]
    fn remove_keeps_other_documents() {
        let mut index = index_with(&[("doc1", "![a](bar.png)"), ("doc2", "![b](bar.png)")]);
        assert_eq!(index.remove_document("doc1"), 1);

        let entries = index.get("bar.png");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].document_id, "doc2");
    }

    #[test]
    fn remove_last_reference_drops_key() {
        let mut index = index_with(&[("doc1", "![a](solo.png)")]);
        index.remove_document("doc1");
        assert!(!index.contains_key("solo.png"));
        assert!(index.is_empty());
    }

    #[test]
    fn remove_unknown_document_is_noop() {
        let mut index = index_with(&[("doc1", "![a](p.png)")]);
        let before = index.clone();
        assert_eq!(index.remove_document("ghost"), 0);
        assert_eq!(index, before);
    }

    #[test]
    fn document_ids_lists_contributors() {
        let index = index_with(&[
            ("b", "![a](p.png)"),
            ("a", "![a](q.png) ![a](p.png)"),
            ("c", "nothing"),
        ]);
        assert_eq!(index.document_ids().into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn prune_empty_removes_hollow_keys() {
        let mut index: ImageIndex = serde_json::from_str(
            r#"{"a.png": [], "b.png": [{"documentId": "d", "documentName": "d", "positions": []}]}"#,
        )
        .unwrap();
        index.prune_empty();
        assert!(index.is_empty());
    }

    #[test]
    fn serializes_as_plain_object_with_camel_case_fields() {
        let index = index_with(&[("doc1", "![a](p.png)")]);
        let value = serde_json::to_value(&index).unwrap();
        let entry = &value["p.png"][0];
        assert_eq!(entry["documentId"], "doc1");
        assert_eq!(entry["positions"][0]["lineNumber"], 0);
        assert_eq!(entry["positions"][0]["matchOffset"], 0);
        assert_eq!(entry["positions"][0]["lineContent"], "![a](p.png)");
    }

    #[test]
    fn serialization_is_independent_of_insertion_order() {
        let a = index_with(&[("doc1", "![a](z.png)"), ("doc2", "![a](a.png)")]);
        let b = index_with(&[("doc2", "![a](a.png)"), ("doc1", "![a](z.png)")]);
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }
}
