//! Entiform engine - entity processing
//!
//! This crate implements:
//! - Structural and field validation
//! - JSON Schema derivation
//! - Per-file processing (fingerprint, transcode, validate, derive)
//! - The concurrent pipeline with content deduplication and identity
//!   conflict detection

pub mod dedup;
pub mod pipeline;
pub mod processor;
pub mod progress;
pub mod registry;
pub mod schema_gen;
pub mod source;
pub mod validation;

pub use dedup::ContentDeduplicator;
pub use pipeline::{Pipeline, PipelineError, PipelineOptions, PipelineOutput};
pub use processor::EntityProcessor;
pub use progress::{ProgressMonitor, ProgressSnapshot};
pub use registry::IdentityRegistry;
pub use schema_gen::{derive_schema, SchemaError};
pub use source::{FsReader, MemoryReader, SourceReader};
pub use validation::{validate_fields, validate_structure};
