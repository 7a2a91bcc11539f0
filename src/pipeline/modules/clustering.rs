//! SuffixTreeClustering module: corpus in, clustering out.
//!
//! Reads one corpus transfer record from `byteInput`, rebuilds the corpus,
//! runs the configured strategy and writes two results:
//! - `output`: DOT graph (KM, HAC) or Newick tree (NJ)
//! - `json`: pretty-printed cluster records (KM) or `null` (HAC, NJ)
//!
//! Any failure before rendering leaves both outputs unwritten.

use crate::clustering::{ClusterError, ClusterStrategy, ClusteringType, DEFAULT_CLUSTER_COUNT};
use crate::corpus::{Corpus, CorpusError, JsonTransferCodec, TransferCodec};
use crate::pipeline::error::{ModuleError, ModuleResult};
use crate::pipeline::module::{Module, ModuleDescriptor, ProcessContext, Properties, PropertySpec};
use crate::pipeline::pipe::PipeKind;
use crate::pipeline::port::{PortDescriptor, PortSet};

pub const PORT_BYTE_INPUT: &str = "byteInput";
pub const PORT_OUTPUT: &str = "output";
pub const PORT_JSON: &str = "json";

pub const PROPERTY_CLUSTERING_TYPE: &str = "clusteringType";
pub const PROPERTY_CORPUS_NAME: &str = "corpusName";

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input(
        PORT_BYTE_INPUT,
        "[bytes] serialized corpus transfer record",
        &[PipeKind::Bytes],
    ),
    PortDescriptor::output(
        PORT_OUTPUT,
        "[text] DOT graph or Newick tree",
        &[PipeKind::Chars],
    ),
    PortDescriptor::output(
        PORT_JSON,
        "[text] JSON cluster records, or null",
        &[PipeKind::Chars],
    ),
];

static PROPERTIES: &[PropertySpec] = &[
    PropertySpec::optional(
        PROPERTY_CLUSTERING_TYPE,
        "Clustering algorithm: NJ, KM or HAC",
        "KM",
    ),
    PropertySpec::optional(
        PROPERTY_CORPUS_NAME,
        "Graph id used in DOT output",
        "myCorpus",
    ),
];

pub static DESCRIPTOR: ModuleDescriptor = ModuleDescriptor {
    type_name: "SuffixTreeClustering",
    description: "Clusters the types of a suffix-tree corpus",
    properties: PROPERTIES,
    ports: PORTS,
};

/// Where the module is in its single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusteringStage {
    Idle,
    Deserializing,
    Reconstructing,
    Dispatching(ClusteringType),
    Rendering,
    Closed,
    Failed,
}

pub struct SuffixTreeClusteringModule {
    name: String,
    clustering_type: ClusteringType,
    corpus_name: String,
    /// Raw `clusteringType` value that fell back to the default.
    unrecognized_type: Option<String>,
    codec: Box<dyn TransferCodec>,
    ports: PortSet,
    stage: ClusteringStage,
}

impl SuffixTreeClusteringModule {
    pub fn new() -> Self {
        Self {
            name: DESCRIPTOR.type_name.to_string(),
            clustering_type: ClusteringType::default(),
            corpus_name: "myCorpus".to_string(),
            unrecognized_type: None,
            codec: Box::new(JsonTransferCodec),
            ports: PortSet::from_descriptors(DESCRIPTOR.ports),
            stage: ClusteringStage::Idle,
        }
    }

    /// Replace the transfer record codec (JSON by default).
    pub fn with_codec(mut self, codec: Box<dyn TransferCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn stage(&self) -> ClusteringStage {
        self.stage
    }

    pub fn clustering_type(&self) -> ClusteringType {
        self.clustering_type
    }

    pub fn corpus_name(&self) -> &str {
        &self.corpus_name
    }

    fn run(&mut self, ctx: &ProcessContext) -> ModuleResult<()> {
        if let Some(raw) = &self.unrecognized_type {
            ctx.warn(format!(
                "unrecognized {} '{}', falling back to {}",
                PROPERTY_CLUSTERING_TYPE, raw, self.clustering_type
            ));
        }
        self.stage = ClusteringStage::Deserializing;
        let name = self.name.clone();
        let mut input = self
            .ports
            .input_mut(PORT_BYTE_INPUT)
            .ok_or_else(|| ModuleError::configuration(&name, PORT_BYTE_INPUT, "port is missing"))?
            .take_bytes(&name)?;
        let bytes = input
            .read_all()
            .map_err(|e| ModuleError::pipe(&name, PORT_BYTE_INPUT, e))?;
        tracing::debug!("[{}] read {} bytes from '{}'", name, bytes.len(), PORT_BYTE_INPUT);

        let record = self
            .codec
            .decode(&bytes)
            .map_err(|e| ModuleError::Deserialization {
                module: name.clone(),
                field: "corpus transfer record".to_string(),
                message: e.to_string(),
            })?;

        self.stage = ClusteringStage::Reconstructing;
        let corpus = Corpus::from_transfer(record).map_err(|e| self.corpus_error(e))?;
        let types = corpus.type_list();

        self.stage = ClusteringStage::Dispatching(self.clustering_type);
        let strategy = ClusterStrategy::for_type(self.clustering_type);
        tracing::info!(
            "[{}] running {} ({}) on {} types",
            name,
            strategy.name(),
            self.clustering_type,
            types.len()
        );
        match self.clustering_type {
            ClusteringType::KMedoids if types.len() < DEFAULT_CLUSTER_COUNT => {
                ctx.warn(format!(
                    "requested {} clusters but the corpus has only {} types; clustering into {}",
                    DEFAULT_CLUSTER_COUNT,
                    types.len(),
                    types.len()
                ));
            }
            ClusteringType::NeighborJoining => {
                ctx.warn(format!(
                    "{} '{}' has no place in a Newick tree and is not rendered",
                    PROPERTY_CORPUS_NAME, self.corpus_name
                ));
            }
            _ => {}
        }
        let result = strategy
            .cluster(&types, &self.corpus_name)
            .map_err(|e| self.cluster_error(e))?;

        self.stage = ClusteringStage::Rendering;
        self.ports
            .output_mut(PORT_OUTPUT)
            .ok_or_else(|| ModuleError::configuration(&name, PORT_OUTPUT, "port is missing"))?
            .write_str(result.text())
            .map_err(|e| ModuleError::pipe(&name, PORT_OUTPUT, e))?;
        self.ports
            .output_mut(PORT_JSON)
            .ok_or_else(|| ModuleError::configuration(&name, PORT_JSON, "port is missing"))?
            .write_json(&result.json())
            .map_err(|e| ModuleError::pipe(&name, PORT_JSON, e))?;

        tracing::info!(
            "[{}] {} produced {} cluster(s)",
            name,
            self.clustering_type,
            result.cluster_count()
        );
        Ok(())
    }

    fn corpus_error(&self, e: CorpusError) -> ModuleError {
        if e.is_index_error() {
            ModuleError::Index {
                module: self.name.clone(),
                source: e,
            }
        } else {
            ModuleError::Deserialization {
                module: self.name.clone(),
                field: "corpus transfer record".to_string(),
                message: e.to_string(),
            }
        }
    }

    fn cluster_error(&self, e: ClusterError) -> ModuleError {
        match e {
            ClusterError::ContractViolation { algorithm, message } => {
                ModuleError::AlgorithmContractViolation {
                    module: self.name.clone(),
                    algorithm: algorithm.to_string(),
                    message,
                }
            }
        }
    }
}

impl Default for SuffixTreeClusteringModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for SuffixTreeClusteringModule {
    fn descriptor(&self) -> &'static ModuleDescriptor {
        &DESCRIPTOR
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &PortSet {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut PortSet {
        &mut self.ports
    }

    fn apply_properties(&mut self, properties: &Properties) -> ModuleResult<()> {
        let resolved = properties.resolve(&DESCRIPTOR)?;
        self.name = resolved.name().to_string();

        let raw = resolved.get(PROPERTY_CLUSTERING_TYPE);
        let (clustering_type, recognized) = ClusteringType::from_property(raw);
        self.unrecognized_type = if recognized {
            None
        } else {
            raw.map(str::to_string)
        };
        self.clustering_type = clustering_type;

        if let Some(corpus_name) = resolved.get(PROPERTY_CORPUS_NAME) {
            self.corpus_name = corpus_name.to_string();
        }
        tracing::debug!(
            "[{}] configured: {}={}, {}='{}'",
            self.name,
            PROPERTY_CLUSTERING_TYPE,
            self.clustering_type,
            PROPERTY_CORPUS_NAME,
            self.corpus_name
        );
        Ok(())
    }

    fn process(&mut self, ctx: &ProcessContext) -> ModuleResult<()> {
        let result = self.run(ctx);
        if result.is_err() {
            self.stage = ClusteringStage::Failed;
        }
        result
    }

    fn on_closed(&mut self) {
        self.stage = ClusteringStage::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{CodecError, CorpusTransfer, MockTransferCodec, Node, Type};
    use crate::pipeline::error::{ErrorKind, PipeError};
    use crate::pipeline::id::PipeId;
    use crate::pipeline::module::ModuleHost;
    use crate::pipeline::pipe::{
        open_pipe, AnyReceiver, AnySender, CancelToken, CharReader, PipeReceiver, PipeSender,
        PipeSettings,
    };

    struct Wired {
        input: PipeSender<Vec<u8>>,
        output: PipeReceiver<String>,
        json: PipeReceiver<String>,
    }

    fn wire(module: &mut SuffixTreeClusteringModule) -> Wired {
        let settings = PipeSettings::default();
        let cancel = CancelToken::new();
        let name = module.name().to_string();
        let ports = module.ports_mut();

        let (AnySender::Bytes(input), rx) =
            open_pipe(PipeId(0), PipeKind::Bytes, settings, cancel.clone())
        else {
            panic!("kind")
        };
        ports.input_mut(PORT_BYTE_INPUT).unwrap().bind(&name, rx).unwrap();

        let (tx, AnyReceiver::Chars(output)) =
            open_pipe(PipeId(1), PipeKind::Chars, settings, cancel.clone())
        else {
            panic!("kind")
        };
        ports.output_mut(PORT_OUTPUT).unwrap().attach(&name, tx).unwrap();

        let (tx, AnyReceiver::Chars(json)) =
            open_pipe(PipeId(2), PipeKind::Chars, settings, cancel)
        else {
            panic!("kind")
        };
        ports.output_mut(PORT_JSON).unwrap().attach(&name, tx).unwrap();

        Wired { input, output, json }
    }

    fn record(type_count: u32) -> CorpusTransfer {
        let node_count = type_count.max(1);
        CorpusTransfer {
            number_of_nodes: node_count as usize,
            number_of_types: type_count as usize,
            nodes: (0..node_count)
                .map(|i| Node::new(i + 2).with_type(i % type_count.max(1), 1))
                .collect(),
            types: (0..type_count)
                .map(|i| {
                    Type::new(i, format!("doc{}", i))
                        .with_frequency(2 + i % 3, 1.0 + i as f64)
                        .with_frequency(2 + (i + 1) % 3, 0.5)
                })
                .collect(),
        }
    }

    fn host_with(module: SuffixTreeClusteringModule, props: Properties) -> ModuleHost {
        let mut host = ModuleHost::new(module);
        host.configure(&props).unwrap();
        host
    }

    fn feed(input: &mut PipeSender<Vec<u8>>, record: &CorpusTransfer) {
        input.send(serde_json::to_vec(record).unwrap()).unwrap();
        input.close().unwrap();
    }

    #[test]
    fn test_defaults() {
        let mut module = SuffixTreeClusteringModule::new();
        module.apply_properties(&Properties::new()).unwrap();
        assert_eq!(module.clustering_type(), ClusteringType::KMedoids);
        assert_eq!(module.corpus_name(), "myCorpus");
        assert_eq!(module.stage(), ClusteringStage::Idle);
    }

    #[test]
    fn test_unknown_clustering_type_falls_back_to_km() {
        let mut module = SuffixTreeClusteringModule::new();
        module
            .apply_properties(&Properties::new().with(PROPERTY_CLUSTERING_TYPE, "spectral"))
            .unwrap();
        assert_eq!(module.clustering_type(), ClusteringType::KMedoids);
    }

    #[test]
    fn test_km_writes_dot_and_records() {
        let mut module = SuffixTreeClusteringModule::new();
        let mut wired = wire(&mut module);
        let mut host = host_with(module, Properties::new().with(PROPERTY_CORPUS_NAME, "books"));

        feed(&mut wired.input, &record(5));
        host.run(&ProcessContext::detached("clustering")).unwrap();

        let dot = CharReader::new(wired.output).read_to_string().unwrap();
        assert!(dot.starts_with("digraph \"books\""));
        assert_eq!(dot.matches("subgraph cluster_").count(), 3);

        let json: serde_json::Value =
            serde_json::from_str(&CharReader::new(wired.json).read_to_string().unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_nj_writes_tree_and_null() {
        let mut module = SuffixTreeClusteringModule::new();
        let mut wired = wire(&mut module);
        let mut host = host_with(module, Properties::new().with(PROPERTY_CLUSTERING_TYPE, "NJ"));

        feed(&mut wired.input, &record(4));
        host.run(&ProcessContext::detached("clustering")).unwrap();

        let tree = CharReader::new(wired.output).read_to_string().unwrap();
        assert!(tree.ends_with(';'));
        let json = CharReader::new(wired.json).read_to_string().unwrap();
        assert_eq!(json.trim(), "null");
    }

    #[test]
    fn test_hac_without_types_is_contract_violation() {
        let mut module = SuffixTreeClusteringModule::new();
        let mut wired = wire(&mut module);
        let mut host = host_with(module, Properties::new().with(PROPERTY_CLUSTERING_TYPE, "HAC"));

        let empty = CorpusTransfer {
            number_of_nodes: 0,
            number_of_types: 0,
            nodes: vec![],
            types: vec![],
        };
        feed(&mut wired.input, &empty);
        let err = host.run(&ProcessContext::detached("clustering")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlgorithmContractViolation);

        drop(host);
        assert_eq!(wired.output.recv(), Err(PipeError::Aborted));
    }

    #[test]
    fn test_codec_failure_is_deserialization_error_and_outputs_untouched() {
        let mut codec = MockTransferCodec::new();
        codec
            .expect_decode()
            .times(1)
            .returning(|_| Err(CodecError::new("truncated record")));

        let mut module = SuffixTreeClusteringModule::new().with_codec(Box::new(codec));
        let mut wired = wire(&mut module);
        let mut host = host_with(module, Properties::new().with("name", "stc"));

        wired.input.send(b"{\"numberOf".to_vec()).unwrap();
        wired.input.close().unwrap();
        let err = host.run(&ProcessContext::detached("stc")).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Deserialization);
        assert_eq!(err.module(), "stc");
        assert!(err.to_string().contains("truncated record"));
        assert!(!host.module().ports().output(PORT_OUTPUT).unwrap().is_closed());
        assert!(!host.module().ports().output(PORT_JSON).unwrap().is_closed());

        drop(host);
        assert_eq!(wired.output.recv(), Err(PipeError::Aborted));
        assert_eq!(wired.json.recv(), Err(PipeError::Aborted));
    }

    #[test]
    fn test_out_of_range_node_is_index_error() {
        let mut module = SuffixTreeClusteringModule::new();
        let mut wired = wire(&mut module);
        let mut host = host_with(module, Properties::new());

        let mut bad = record(3);
        bad.nodes[0].node_number = 1;
        feed(&mut wired.input, &bad);

        let err = host.run(&ProcessContext::detached("clustering")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Index);
    }

    #[test]
    fn test_stage_tracks_lifecycle() {
        let mut module = SuffixTreeClusteringModule::new();
        let mut wired = wire(&mut module);
        let mut host = host_with(module, Properties::new().with(PROPERTY_CLUSTERING_TYPE, "HAC"));
        feed(&mut wired.input, &record(3));
        host.run(&ProcessContext::detached("clustering")).unwrap();

        let stage = match host.module() {
            crate::pipeline::module::AnyModule::Builtin(
                crate::pipeline::module::BuiltinModule::SuffixTreeClustering(m),
            ) => m.stage(),
            _ => panic!("unexpected module"),
        };
        assert_eq!(stage, ClusteringStage::Closed);
    }
}
