//! Integration tests for the suffix-tree clustering module
//!
//! These tests drive the module through its ports the way a pipeline does:
//! - KM, HAC and NJ dispatch and their two outputs
//! - Fallback for unset or unknown clustering types
//! - Fatal errors leaving outputs unclosed

mod common;

use common::builders::CorpusBuilder;
use common::pipe_helpers::{feed_input, tap_output};
use textpipe::corpus::CorpusTransfer;
use textpipe::pipeline::{
    CharReader, ErrorKind, ModuleHost, PipeError, PipeReceiver, ProcessContext, Properties,
    SuffixTreeClusteringModule,
};

#[derive(Debug)]
struct Outputs {
    text: String,
    json: serde_json::Value,
}

fn run_clustering(properties: Properties, input: Vec<u8>) -> Result<Outputs, textpipe::pipeline::ModuleError> {
    let mut module = SuffixTreeClusteringModule::new();
    let mut tx = feed_input(&mut module, "byteInput", 0);
    let text_rx = tap_output(&mut module, "output", 1);
    let json_rx = tap_output(&mut module, "json", 2);

    let mut host = ModuleHost::new(module);
    host.configure(&properties)?;
    tx.send(input).unwrap();
    tx.close().unwrap();
    host.run(&ProcessContext::detached("clustering"))?;

    let text = CharReader::new(text_rx).read_to_string().unwrap();
    let json = serde_json::from_str(&CharReader::new(json_rx).read_to_string().unwrap()).unwrap();
    Ok(Outputs { text, json })
}

fn clustering_type(value: &str) -> Properties {
    Properties::new().with("clusteringType", value)
}

#[test]
fn test_km_five_types_yields_three_clusters() {
    let record = CorpusBuilder::new().with_types(5).build();
    let input_ids: Vec<u32> = record.types.iter().map(|t| t.id).collect();

    let out = run_clustering(clustering_type("KM"), serde_json::to_vec(&record).unwrap()).unwrap();

    let clusters = out.json.as_array().expect("KM emits an array");
    assert_eq!(clusters.len(), 3);
    for cluster in clusters {
        let medoid = cluster["medoid"]["id"].as_u64().unwrap() as u32;
        assert!(input_ids.contains(&medoid), "medoid {} not an input type", medoid);
        let members = cluster["members"].as_array().unwrap();
        assert!(members.iter().any(|m| m["id"].as_u64() == Some(medoid as u64)));
    }

    assert_eq!(out.text.matches("subgraph cluster_").count(), 3);
    for i in 0..3 {
        assert!(out.text.contains(&format!("subgraph cluster_{} {{", i)));
    }
}

#[test]
fn test_km_groups_related_types() {
    let record = CorpusBuilder::new()
        .add_type("apple", 0)
        .add_type("apricot", 0)
        .add_type("bean", 1)
        .add_type("beet", 1)
        .add_type("cherry", 2)
        .add_type("citron", 2)
        .build_bytes();

    let out = run_clustering(Properties::new(), record).unwrap();
    let mut groups: Vec<Vec<String>> = out
        .json
        .as_array()
        .unwrap()
        .iter()
        .map(|c| {
            c["members"]
                .as_array()
                .unwrap()
                .iter()
                .map(|m| m["label"].as_str().unwrap().to_string())
                .collect()
        })
        .collect();
    groups.sort();
    assert_eq!(
        groups,
        vec![
            vec!["apple".to_string(), "apricot".to_string()],
            vec!["bean".to_string(), "beet".to_string()],
            vec!["cherry".to_string(), "citron".to_string()],
        ]
    );
}

#[test]
fn test_nj_yields_tree_and_null() {
    let record = CorpusBuilder::new().with_types(6).build_bytes();
    let out = run_clustering(clustering_type("NJ"), record).unwrap();

    assert!(!out.text.is_empty());
    assert!(out.text.ends_with(';'));
    assert!(out.text.contains("doc0:"));
    assert!(out.json.is_null());
}

#[test]
fn test_hac_yields_single_graph() {
    let record = CorpusBuilder::new().with_types(4).build_bytes();
    let out = run_clustering(
        clustering_type("HAC").with("corpusName", "letters"),
        record,
    )
    .unwrap();

    assert!(out.text.starts_with("digraph \"letters\" {"));
    assert_eq!(out.text.matches("digraph").count(), 1);
    // 4 leaves, 3 merges, 2 edges per merge
    assert_eq!(out.text.matches(" -> ").count(), 6);
    assert!(out.json.is_null());
}

#[test]
fn test_hac_on_empty_corpus_reports_contract_violation() {
    let empty = CorpusTransfer {
        number_of_nodes: 0,
        number_of_types: 0,
        nodes: vec![],
        types: vec![],
    };
    let err = run_clustering(clustering_type("HAC"), serde_json::to_vec(&empty).unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlgorithmContractViolation);
    assert!(err.to_string().contains("hierarchical"));
}

#[test]
fn test_default_clustering_type_matches_explicit_km() {
    let record = CorpusBuilder::new().with_types(7).build();
    let bytes = serde_json::to_vec(&record).unwrap();

    let explicit = run_clustering(clustering_type("KM"), bytes.clone()).unwrap();
    let unset = run_clustering(Properties::new(), bytes.clone()).unwrap();
    let unknown = run_clustering(clustering_type("k-means"), bytes).unwrap();

    assert_eq!(unset.text, explicit.text);
    assert_eq!(unset.json, explicit.json);
    assert_eq!(unknown.text, explicit.text);
    assert_eq!(unknown.json, explicit.json);
}

#[test]
fn test_km_with_fewer_types_than_clusters() {
    let record = CorpusBuilder::new().with_types(2).build_bytes();
    let out = run_clustering(Properties::new(), record).unwrap();
    assert_eq!(out.json.as_array().unwrap().len(), 2);
}

#[test]
fn test_malformed_input_fails_without_touching_outputs() {
    let mut module = SuffixTreeClusteringModule::new();
    let mut tx = feed_input(&mut module, "byteInput", 0);
    let mut text_rx: PipeReceiver<String> = tap_output(&mut module, "output", 1);
    let mut json_rx: PipeReceiver<String> = tap_output(&mut module, "json", 2);

    let mut host = ModuleHost::new(module);
    host.configure(&Properties::new().with("name", "stc")).unwrap();

    let mut truncated = CorpusBuilder::new().with_types(3).build_bytes();
    truncated.truncate(truncated.len() / 2);
    tx.send(truncated).unwrap();
    tx.close().unwrap();

    let err = host.run(&ProcessContext::detached("stc")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Deserialization);
    assert_eq!(err.module(), "stc");
    assert!(err.to_string().contains("corpus transfer record"));

    let ports = host.module().ports();
    assert!(!ports.output("output").unwrap().is_closed());
    assert!(!ports.output("json").unwrap().is_closed());

    // Tearing the failed module down is visible downstream as an abort, not
    // as a clean end-of-stream.
    drop(host);
    assert_eq!(text_rx.recv(), Err(PipeError::Aborted));
    assert_eq!(json_rx.recv(), Err(PipeError::Aborted));
}

#[test]
fn test_inconsistent_type_count_is_deserialization_error() {
    let mut record = CorpusBuilder::new().with_types(3).build();
    record.number_of_types = 4;
    let err = run_clustering(Properties::new(), serde_json::to_vec(&record).unwrap()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Deserialization);
}

#[test]
fn test_duplicate_node_is_index_error() {
    let mut record = CorpusBuilder::new().with_types(3).build();
    let first = record.nodes[0].node_number;
    record.nodes[1].node_number = first;
    let err = run_clustering(Properties::new(), serde_json::to_vec(&record).unwrap()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Index);
}

#[test]
fn test_outputs_close_exactly_once() {
    let mut module = SuffixTreeClusteringModule::new();
    let mut tx = feed_input(&mut module, "byteInput", 0);
    let mut text_rx = tap_output(&mut module, "output", 1);
    let mut host = ModuleHost::new(module);
    host.configure(&Properties::new()).unwrap();

    tx.send(CorpusBuilder::new().with_types(3).build_bytes()).unwrap();
    tx.close().unwrap();
    host.run(&ProcessContext::detached("clustering")).unwrap();

    // A second close has nothing left to signal.
    assert_eq!(host.module_mut().ports_mut().close_all_outputs(), Ok(0));

    assert!(text_rx.recv().unwrap().is_some());
    assert_eq!(text_rx.recv(), Ok(None));
    assert!(text_rx.is_finished());
    assert_eq!(text_rx.recv(), Ok(None));
}

#[test]
fn test_oversized_node_count_is_deserialization_error() {
    let oversized = br#"{"numberOfNodes":18446744073709551615,"numberOfTypes":0,"nodes":[],"types":[]}"#;
    let err = run_clustering(clustering_type("KM"), oversized.to_vec()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Deserialization);
    assert!(err.to_string().contains("18446744073709551615"));
}
