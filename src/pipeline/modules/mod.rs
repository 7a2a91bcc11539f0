//! Built-in module implementations.

pub mod clustering;
pub mod file_reader;
pub mod file_writer;

pub use clustering::{ClusteringStage, SuffixTreeClusteringModule};
pub use file_reader::FileReaderModule;
pub use file_writer::FileWriterModule;
