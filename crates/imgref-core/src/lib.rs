//! Reverse index from image assets to the markdown documents that embed them.
//!
//! [`image_parser`] turns document text into image occurrences,
//! [`image_index`] holds them keyed by image name, and [`image_indexer`]
//! keeps that index in step with document saves and deletions while
//! persisting it through a [`store::Store`].

pub mod image_index;
pub mod image_indexer;
pub mod image_parser;
pub mod store;

pub use image_index::{ImageIndex, IndexEntry};
pub use image_indexer::{ImageIndexer, SharedImageIndexer, INDEX_STORE_KEY};
pub use image_parser::{extract_image_keys, extract_image_references, image_key_for_target, Position};
