//! # textpipe: modular text-analysis pipelines
//!
//! Independently configured modules exchange data over typed pipes. The
//! centerpiece is a clustering module that deserializes a suffix-tree corpus,
//! runs one of three clustering strategies and writes a textual result plus a
//! structured JSON result.
//!
//! ## Architecture
//!
//! - **Pipeline**: pipes, ports, the `Module` trait and the thread-per-module
//!   orchestrator
//! - **Corpus**: suffix-tree types and nodes rebuilt from a transfer record
//! - **Clustering**: k-medoids, hierarchical agglomerative and neighbor joining
//! - **Config**: pipeline descriptions in TOML or JSON
//!
//! ## Example
//!
//! ```ignore
//! use textpipe::config::PipelineConfig;
//! use textpipe::pipeline::PipelineBuilder;
//!
//! let config = PipelineConfig::load("pipeline.toml")?;
//! let report = PipelineBuilder::from_config(config)?.run()?;
//! assert!(report.is_success());
//! ```

pub mod clustering;
pub mod config;
pub mod corpus;
pub mod error;
pub mod pipeline;

// Re-export commonly used types
pub use clustering::{ClusterResult, ClusterStrategy, ClusteringType};
pub use config::{PipelineConfig, RuntimeSettings};
pub use corpus::{Corpus, CorpusTransfer, Node, Type};
pub use error::{Result, ResultExt, TextPipeError};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineReport};
