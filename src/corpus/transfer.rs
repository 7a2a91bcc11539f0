//! Corpus transfer record and its byte codec.
//!
//! The transfer record is the flat form of a corpus crossing a module
//! boundary. The clustering module only relies on `TransferCodec::decode`;
//! `JsonTransferCodec` is the default framing.

use crate::corpus::types::{Node, Type};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Serialized form of a corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusTransfer {
    pub number_of_nodes: usize,
    pub number_of_types: usize,
    /// Node records, any order.
    pub nodes: Vec<Node>,
    /// Type records; order carries no meaning.
    pub types: Vec<Type>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CodecError {
    pub message: String,
}

impl CodecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Byte framing for transfer records.
#[cfg_attr(test, mockall::automock)]
pub trait TransferCodec: Send {
    fn encode(&self, record: &CorpusTransfer) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<CorpusTransfer, CodecError>;
}

/// JSON framing via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTransferCodec;

impl TransferCodec for JsonTransferCodec {
    fn encode(&self, record: &CorpusTransfer) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(record).map_err(|e| CodecError::new(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<CorpusTransfer, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| {
            CodecError::new(format!(
                "malformed transfer record at line {}, column {}: {}",
                e.line(),
                e.column(),
                e
            ))
        })
    }
}
