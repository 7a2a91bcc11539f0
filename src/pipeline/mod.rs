//! Module/pipe/port pipeline framework.
//!
//! Modules exchange data over typed, one-directional pipes bound to named
//! ports. Each module is configured once and processes once; the orchestrator
//! runs every module on its own thread.
//!
//! # Architecture
//!
//! ```text
//! [FileReader] ──bytes──► [SuffixTreeClustering] ──chars──► [FileWriter]  (DOT / Newick)
//!                                               └──chars──► [FileWriter]  (JSON)
//! ```
//!
//! # Design
//!
//! - **Enum dispatch for built-ins**: `BuiltinModule` enum, with `AnyModule::Plugin`
//!   for boxed external modules.
//! - **Explicit end-of-stream**: pipes carry `Frame::End`, so a producer that
//!   disappears without closing is reported as `PipeError::Aborted`.
//! - **Backpressure**: bounded crossbeam channels; writers block while the
//!   buffer is full.
//! - **Cancellation**: one `CancelToken` per pipeline, polled by every
//!   blocked read and write.
//! - **Explicit task submission**: `Pipeline::spawn` returns a `PipelineHandle`
//!   fed by a completion channel.

pub mod bridge;
pub mod error;
pub mod executor;
pub mod id;
pub mod module;
pub mod module_kind;
pub mod modules;
pub mod pipe;
pub mod port;

pub use bridge::{
    ModuleOutcome, ModuleReport, PipelineEvent, PipelineHandle, PipelineReport, WarningRecord,
};
pub use error::{ErrorKind, ModuleError, ModuleResult, PipeError};
pub use executor::{ModuleFactory, PipeEdge, Pipeline, PipelineBuilder};
pub use id::{ModuleId, PipeId};
pub use module::{
    AnyModule, BuiltinModule, Module, ModuleDescriptor, ModuleHost, ModuleState, ProcessContext,
    Properties, PropertySpec, ResolvedProperties, PROPERTY_NAME,
};
pub use module_kind::ModuleKind;
pub use modules::{ClusteringStage, FileReaderModule, FileWriterModule, SuffixTreeClusteringModule};
pub use pipe::{
    open_pipe, AnyReceiver, AnySender, ByteReader, CancelToken, CharReader, Delivery, PipeKind,
    PipeReceiver, PipeSender, PipeSettings,
};
pub use port::{InputPort, OutputPort, PortDescriptor, PortDirection, PortSet};
