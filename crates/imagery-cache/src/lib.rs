//! On-disk cache of dated satellite imagery
//!
//! Stores one image blob per calendar day next to a JSON metadata index,
//! keeps the two consistent, and rejects undersized or non-PNG payloads on
//! both the write and the read path.

mod blob_store;
mod config;
mod error;
mod index;
mod reconciler;
mod repository;
mod types;
mod validator;

pub use blob_store::BlobStore;
pub use config::{ReferenceStrategy, RepositoryConfig, DEFAULT_RECONCILE_SLACK};
pub use error::{CacheError, Result};
pub use index::{Index, INDEX_FILE_NAME, INDEX_SCHEMA_VERSION};
pub use reconciler::Reconciler;
pub use repository::Repository;
pub use types::{
    BoundingBox, CacheStats, ImageEntry, IndexDocument, IndexLoad, ParseBoundingBoxError,
    RepairOutcome, StoredBlob,
};
pub use validator::{
    Rejection, Validator, DEFAULT_MIN_IMAGE_BYTES, IMAGE_EXTENSION, PNG_SIGNATURE,
};
