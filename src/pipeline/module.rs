//! Module abstraction for the pipeline.
//!
//! Two-layer design:
//! - **`Module` trait** - the single capability every processing unit provides:
//!   declare ports and properties, accept configuration, `process` once.
//! - **`BuiltinModule` enum** - static dispatch over the modules shipped with
//!   the crate.
//!
//! `AnyModule` wraps either so the pipeline handles both uniformly, and
//! `ModuleHost` enforces the lifecycle around it.

use crate::pipeline::bridge::PipelineEvent;
use crate::pipeline::error::{ModuleError, ModuleResult};
use crate::pipeline::id::ModuleId;
use crate::pipeline::modules::{FileReaderModule, FileWriterModule, SuffixTreeClusteringModule};
use crate::pipeline::pipe::CancelToken;
use crate::pipeline::port::{PortDescriptor, PortSet};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property key recognized by every module: the instance name.
pub const PROPERTY_NAME: &str = "name";

/// Static description of one configuration option.
#[derive(Debug, Clone)]
pub struct PropertySpec {
    pub key: &'static str,
    pub description: &'static str,
    pub default: Option<&'static str>,
    pub required: bool,
}

impl PropertySpec {
    pub const fn optional(
        key: &'static str,
        description: &'static str,
        default: &'static str,
    ) -> Self {
        Self {
            key,
            description,
            default: Some(default),
            required: false,
        }
    }

    pub const fn required(key: &'static str, description: &'static str) -> Self {
        Self {
            key,
            description,
            default: None,
            required: true,
        }
    }
}

/// Static description of a module type.
#[derive(Debug)]
pub struct ModuleDescriptor {
    pub type_name: &'static str,
    pub description: &'static str,
    pub properties: &'static [PropertySpec],
    pub ports: &'static [PortDescriptor],
}

/// Raw configuration handed to a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Check required keys and fill defaults for missing optional ones.
    pub fn resolve(&self, descriptor: &ModuleDescriptor) -> ModuleResult<ResolvedProperties> {
        let name = self
            .get(PROPERTY_NAME)
            .unwrap_or(descriptor.type_name)
            .to_string();

        for (key, _) in self.iter() {
            if key != PROPERTY_NAME && !descriptor.properties.iter().any(|p| p.key == key) {
                tracing::warn!("[{}] ignoring unrecognized property '{}'", name, key);
            }
        }

        let mut values = BTreeMap::new();
        for spec in descriptor.properties {
            match (self.get(spec.key), spec.default) {
                (Some(value), _) => {
                    values.insert(spec.key.to_string(), value.to_string());
                }
                (None, Some(default)) => {
                    tracing::debug!("[{}] '{}' defaults to '{}'", name, spec.key, default);
                    values.insert(spec.key.to_string(), default.to_string());
                }
                (None, None) if spec.required => {
                    return Err(ModuleError::configuration(
                        name,
                        spec.key,
                        format!("required property is not set ({})", spec.description),
                    ));
                }
                (None, None) => {}
            }
        }

        Ok(ResolvedProperties { name, values })
    }
}

/// Configuration after defaults have been applied.
#[derive(Debug, Clone)]
pub struct ResolvedProperties {
    name: String,
    values: BTreeMap<String, String>,
}

impl ResolvedProperties {
    /// Instance name of the module.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value of a property that `resolve` guaranteed to be present.
    pub fn require(&self, key: &str) -> ModuleResult<&str> {
        self.get(key).ok_or_else(|| {
            ModuleError::configuration(self.name.clone(), key, "required property is not set")
        })
    }
}

/// Per-invocation context handed to `Module::process`.
pub struct ProcessContext {
    module_id: ModuleId,
    module_name: String,
    cancel: CancelToken,
    events: Option<Sender<PipelineEvent>>,
}

impl ProcessContext {
    pub fn new(
        module_id: ModuleId,
        module_name: impl Into<String>,
        cancel: CancelToken,
        events: Option<Sender<PipelineEvent>>,
    ) -> Self {
        Self {
            module_id,
            module_name: module_name.into(),
            cancel,
            events,
        }
    }

    /// Context for running a module outside a pipeline.
    pub fn detached(module_name: impl Into<String>) -> Self {
        Self::new(ModuleId::INVALID, module_name, CancelToken::new(), None)
    }

    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Report a non-fatal condition through the log and the event channel.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("[{}] {}", self.module_name, message);
        if let Some(events) = &self.events {
            let _ = events.send(PipelineEvent::Warning {
                module_id: self.module_id,
                module: self.module_name.clone(),
                message,
            });
        }
    }
}

/// The single capability every module provides.
pub trait Module: Send {
    /// Static description of this module type.
    fn descriptor(&self) -> &'static ModuleDescriptor;

    /// Instance name (the `name` property, or the type name).
    fn name(&self) -> &str;

    fn ports(&self) -> &PortSet;

    fn ports_mut(&mut self) -> &mut PortSet;

    /// Validate and store configuration. Called once before `process`.
    fn apply_properties(&mut self, properties: &Properties) -> ModuleResult<()>;

    /// Read inputs, do the work, write outputs. Outputs are closed by the host.
    fn process(&mut self, ctx: &ProcessContext) -> ModuleResult<()>;

    /// Called after all outputs were closed following a successful `process`.
    fn on_closed(&mut self) {}
}

/// Enum dispatch for built-in modules.
pub enum BuiltinModule {
    FileReader(FileReaderModule),
    FileWriter(FileWriterModule),
    SuffixTreeClustering(SuffixTreeClusteringModule),
}

impl Module for BuiltinModule {
    fn descriptor(&self) -> &'static ModuleDescriptor {
        match self {
            BuiltinModule::FileReader(m) => m.descriptor(),
            BuiltinModule::FileWriter(m) => m.descriptor(),
            BuiltinModule::SuffixTreeClustering(m) => m.descriptor(),
        }
    }

    fn name(&self) -> &str {
        match self {
            BuiltinModule::FileReader(m) => m.name(),
            BuiltinModule::FileWriter(m) => m.name(),
            BuiltinModule::SuffixTreeClustering(m) => m.name(),
        }
    }

    fn ports(&self) -> &PortSet {
        match self {
            BuiltinModule::FileReader(m) => m.ports(),
            BuiltinModule::FileWriter(m) => m.ports(),
            BuiltinModule::SuffixTreeClustering(m) => m.ports(),
        }
    }

    fn ports_mut(&mut self) -> &mut PortSet {
        match self {
            BuiltinModule::FileReader(m) => m.ports_mut(),
            BuiltinModule::FileWriter(m) => m.ports_mut(),
            BuiltinModule::SuffixTreeClustering(m) => m.ports_mut(),
        }
    }

    fn apply_properties(&mut self, properties: &Properties) -> ModuleResult<()> {
        match self {
            BuiltinModule::FileReader(m) => m.apply_properties(properties),
            BuiltinModule::FileWriter(m) => m.apply_properties(properties),
            BuiltinModule::SuffixTreeClustering(m) => m.apply_properties(properties),
        }
    }

    fn process(&mut self, ctx: &ProcessContext) -> ModuleResult<()> {
        match self {
            BuiltinModule::FileReader(m) => m.process(ctx),
            BuiltinModule::FileWriter(m) => m.process(ctx),
            BuiltinModule::SuffixTreeClustering(m) => m.process(ctx),
        }
    }

    fn on_closed(&mut self) {
        match self {
            BuiltinModule::FileReader(m) => m.on_closed(),
            BuiltinModule::FileWriter(m) => m.on_closed(),
            BuiltinModule::SuffixTreeClustering(m) => m.on_closed(),
        }
    }
}

/// Wrapper that holds either a built-in module or a plugin (trait object).
pub enum AnyModule {
    Builtin(BuiltinModule),
    Plugin(Box<dyn Module>),
}

impl AnyModule {
    fn inner(&self) -> &dyn Module {
        match self {
            AnyModule::Builtin(m) => m,
            AnyModule::Plugin(m) => m.as_ref(),
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Module {
        match self {
            AnyModule::Builtin(m) => m,
            AnyModule::Plugin(m) => m.as_mut(),
        }
    }

    pub fn descriptor(&self) -> &'static ModuleDescriptor {
        self.inner().descriptor()
    }

    pub fn name(&self) -> &str {
        self.inner().name()
    }

    pub fn ports(&self) -> &PortSet {
        self.inner().ports()
    }

    pub fn ports_mut(&mut self) -> &mut PortSet {
        self.inner_mut().ports_mut()
    }
}

impl From<FileReaderModule> for AnyModule {
    fn from(m: FileReaderModule) -> Self {
        AnyModule::Builtin(BuiltinModule::FileReader(m))
    }
}

impl From<FileWriterModule> for AnyModule {
    fn from(m: FileWriterModule) -> Self {
        AnyModule::Builtin(BuiltinModule::FileWriter(m))
    }
}

impl From<SuffixTreeClusteringModule> for AnyModule {
    fn from(m: SuffixTreeClusteringModule) -> Self {
        AnyModule::Builtin(BuiltinModule::SuffixTreeClustering(m))
    }
}

/// Lifecycle position of a hosted module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleState {
    #[default]
    Created,
    Configured,
    Processing,
    /// `process` succeeded and every output was closed.
    Closed,
    /// `process` failed; outputs were left unclosed.
    Failed,
}

/// Enforces configure-once, process-once and close-on-success.
pub struct ModuleHost {
    module: AnyModule,
    state: ModuleState,
}

impl ModuleHost {
    pub fn new(module: impl Into<AnyModule>) -> Self {
        Self {
            module: module.into(),
            state: ModuleState::Created,
        }
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn module(&self) -> &AnyModule {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut AnyModule {
        &mut self.module
    }

    pub fn name(&self) -> &str {
        self.module.name()
    }

    pub fn configure(&mut self, properties: &Properties) -> ModuleResult<()> {
        if self.state != ModuleState::Created {
            return Err(ModuleError::configuration(
                self.module.name(),
                "properties",
                "module is already configured",
            ));
        }
        self.module.inner_mut().apply_properties(properties)?;
        self.state = ModuleState::Configured;
        tracing::debug!("Configured module '{}'", self.module.name());
        Ok(())
    }

    /// Invoke `process` exactly once.
    ///
    /// On success every output port is closed. On failure the outputs are
    /// left open and dropped with the host, which downstream readers observe
    /// as an aborted stream.
    pub fn run(&mut self, ctx: &ProcessContext) -> ModuleResult<()> {
        match self.state {
            ModuleState::Configured => {}
            ModuleState::Created => {
                return Err(ModuleError::NotConfigured {
                    module: self.module.name().to_string(),
                })
            }
            _ => {
                return Err(ModuleError::AlreadyProcessed {
                    module: self.module.name().to_string(),
                })
            }
        }

        self.state = ModuleState::Processing;
        tracing::info!("[{}] processing", self.module.name());

        if let Err(e) = self.module.inner_mut().process(ctx) {
            self.state = ModuleState::Failed;
            tracing::error!("[{}] failed: {}", self.module.name(), e);
            return Err(e);
        }

        let name = self.module.name().to_string();
        for (port, pipe) in self.module.ports().lost_consumers() {
            ctx.warn(format!("consumer of {:?} on port '{}' went away", pipe, port));
        }

        match self.module.ports_mut().close_all_outputs() {
            Ok(signals) => {
                tracing::debug!("[{}] closed outputs ({} end-of-stream signals)", name, signals);
            }
            Err((port, source)) => {
                self.state = ModuleState::Failed;
                return Err(ModuleError::pipe(name, port, source));
            }
        }

        self.state = ModuleState::Closed;
        self.module.inner_mut().on_closed();
        tracing::info!("[{}] done", name);
        Ok(())
    }
}
