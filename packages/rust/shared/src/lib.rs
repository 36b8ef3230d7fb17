//! Shared types, error model, and configuration for docgraph.
//!
//! This crate is the foundation depended on by all other docgraph crates.
//! It provides:
//! - [`DocGraphError`]: the unified error type
//! - Domain types ([`Document`], [`Section`], [`DocumentBundle`], [`SelectionPayload`])
//! - Configuration ([`AppConfig`], [`SelectionConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ScoringConfig, SelectionConfig, StoreConfig, SyncConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{DocGraphError, Result};
pub use types::{
    Component, Derivation, DocKind, Document, DocumentBundle, DocumentNode, Reference, Section,
    SelectionPayload, document_id, is_valid_slug, split_document_id,
};
