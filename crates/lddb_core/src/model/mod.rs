//! Document and metadata model shared by the storage layer and its callers.
//!
//! # Responsibility
//! - Define the record, version and manifest shapes exchanged with callers.
//! - Name the JSON-LD keys the query layer relies on.
//!
//! # Invariants
//! - Documents are schema-light `serde_json::Value` trees.
//! - Deletion is represented by tombstones (`manifest.deleted`), not removal.

pub mod record;

/// JSON-LD node identifier key.
pub const ID_KEY: &str = "@id";
/// JSON-LD type key.
pub const TYPE_KEY: &str = "@type";
/// JSON-LD named graph key, used by quotation wrappers.
pub const GRAPH_KEY: &str = "@graph";
