//! Module kind enumeration for config-driven module creation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Built-in module types that a pipeline description can instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleKind {
    /// Streams a file into the pipeline.
    FileReader,
    /// Writes its input stream to a file.
    FileWriter,
    /// Clusters the types of a serialized suffix-tree corpus.
    #[serde(alias = "Clustering")]
    SuffixTreeClustering,
}

impl ModuleKind {
    /// Get the display name for this module kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            ModuleKind::FileReader => "File Reader",
            ModuleKind::FileWriter => "File Writer",
            ModuleKind::SuffixTreeClustering => "Suffix Tree Clustering",
        }
    }

    pub fn all() -> &'static [ModuleKind] {
        &[
            ModuleKind::FileReader,
            ModuleKind::FileWriter,
            ModuleKind::SuffixTreeClustering,
        ]
    }

    /// Modules without input ports.
    pub fn is_source(&self) -> bool {
        matches!(self, ModuleKind::FileReader)
    }

    /// Modules without output ports.
    pub fn is_sink(&self) -> bool {
        matches!(self, ModuleKind::FileWriter)
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
