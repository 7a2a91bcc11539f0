//! Test data builders for corpora and pipeline descriptions

use textpipe::config::{ModuleConfig, PipeConfig, PipelineConfig};
use textpipe::corpus::{CorpusTransfer, Node, Type, FIRST_NODE_NUMBER};
use textpipe::pipeline::{ModuleKind, PipeKind, Properties};

/// Builder for corpus transfer records.
///
/// Every added type gets its own leaf node plus a share of a common
/// node, so types added with the same `group` end up close together.
pub struct CorpusBuilder {
    types: Vec<Type>,
    groups: Vec<u32>,
}

impl CorpusBuilder {
    pub fn new() -> Self {
        Self {
            types: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Add a type in `group`.
    pub fn add_type(mut self, label: &str, group: u32) -> Self {
        let id = self.types.len() as u32;
        self.types.push(Type::new(id, label));
        self.groups.push(group);
        self
    }

    /// Add `count` types labelled `doc0..`, spread over three groups.
    pub fn with_types(mut self, count: usize) -> Self {
        for i in 0..count {
            self = self.add_type(&format!("doc{}", i), (i % 3) as u32);
        }
        self
    }

    pub fn build(self) -> CorpusTransfer {
        let group_count = self.groups.iter().copied().max().map_or(0, |g| g + 1);
        // Group nodes first, then one leaf node per type.
        let group_node = |g: u32| FIRST_NODE_NUMBER + g;
        let leaf_node = |i: usize| FIRST_NODE_NUMBER + group_count + i as u32;

        let mut nodes: Vec<Node> = (0..group_count).map(|g| Node::new(group_node(g))).collect();
        let mut types = Vec::with_capacity(self.types.len());
        for (i, (t, &g)) in self.types.into_iter().zip(&self.groups).enumerate() {
            nodes[g as usize].type_frequencies.insert(t.id, 3);
            nodes.push(Node::new(leaf_node(i)).with_type(t.id, 1));
            types.push(
                t.with_frequency(group_node(g), 3.0)
                    .with_frequency(leaf_node(i), 1.0),
            );
        }

        CorpusTransfer {
            number_of_nodes: nodes.len(),
            number_of_types: types.len(),
            nodes,
            types,
        }
    }

    pub fn build_bytes(self) -> Vec<u8> {
        serde_json::to_vec(&self.build()).expect("transfer record serializes")
    }
}

/// Builder for pipeline descriptions.
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    pub fn module(mut self, id: &str, kind: ModuleKind, properties: &[(&str, &str)]) -> Self {
        let mut props = Properties::new();
        for (k, v) in properties {
            props.set(*k, *v);
        }
        self.config.modules.push(ModuleConfig {
            id: id.to_string(),
            kind,
            properties: props,
        });
        self
    }

    pub fn pipe(mut self, from: &str, to: &str, kind: PipeKind) -> Self {
        self.config.pipes.push(PipeConfig {
            from: from.to_string(),
            to: to.to_string(),
            kind,
        });
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use textpipe::corpus::Corpus;

    #[test]
    fn test_corpus_builder_is_reconstructible() {
        let record = CorpusBuilder::new().with_types(5).build();
        assert_eq!(record.number_of_types, 5);
        assert_eq!(record.number_of_nodes, 3 + 5);

        let corpus = Corpus::from_transfer(record).unwrap();
        assert!(corpus.is_complete());
        assert_eq!(corpus.types().len(), 5);
    }
}
