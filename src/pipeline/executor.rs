//! Pipeline assembly and execution.
//!
//! A `Pipeline` owns every module (inside a `ModuleHost`) and the pipe edges
//! between them. Assembly happens on the caller's thread; `spawn` then hands
//! each module to its own thread and returns a `PipelineHandle`.

use crate::config::{PipelineConfig, RuntimeSettings};
use crate::error::{Result, ResultExt, TextPipeError};
use crate::pipeline::bridge::{ModuleTask, PipelineEvent, PipelineHandle, PipelineReport};
use crate::pipeline::error::{ModuleError, ModuleResult};
use crate::pipeline::id::{ModuleId, PipeId};
use crate::pipeline::module::{AnyModule, ModuleHost, ProcessContext, Properties, PROPERTY_NAME};
use crate::pipeline::module_kind::ModuleKind;
use crate::pipeline::modules::{FileReaderModule, FileWriterModule, SuffixTreeClusteringModule};
use crate::pipeline::pipe::{open_pipe, CancelToken, PipeKind};
use crate::pipeline::port::PortDirection;
use chrono::Utc;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// A pipe between an output port and an input port.
#[derive(Debug, Clone)]
pub struct PipeEdge {
    pub id: PipeId,
    pub from_module: ModuleId,
    pub from_port: String,
    pub to_module: ModuleId,
    pub to_port: String,
    pub kind: PipeKind,
}

/// The module graph of one run.
pub struct Pipeline {
    modules: Vec<ModuleHost>,
    edges: Vec<PipeEdge>,
    settings: RuntimeSettings,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn new(settings: RuntimeSettings) -> Self {
        Self {
            modules: Vec::new(),
            edges: Vec::new(),
            settings,
            cancel: CancelToken::new(),
        }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Token that cancels every pipe of this pipeline.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn edges(&self) -> &[PipeEdge] {
        &self.edges
    }

    /// Configure a module and add it to the graph.
    ///
    /// Instance names must be unique within a pipeline.
    pub fn add_module(
        &mut self,
        module: impl Into<AnyModule>,
        properties: &Properties,
    ) -> ModuleResult<ModuleId> {
        let mut host = ModuleHost::new(module);
        host.configure(properties)?;

        if self.module_id(host.name()).is_some() {
            return Err(ModuleError::configuration(
                host.name(),
                PROPERTY_NAME,
                "another module in this pipeline already uses this name",
            ));
        }

        let id = ModuleId(self.modules.len() as u32);
        tracing::info!(
            "Added module {:?}: '{}' ({})",
            id,
            host.name(),
            host.module().descriptor().type_name
        );
        self.modules.push(host);
        Ok(id)
    }

    pub fn module(&self, id: ModuleId) -> Option<&ModuleHost> {
        self.modules.get(id.index())
    }

    pub fn module_id(&self, name: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .position(|m| m.name() == name)
            .map(|i| ModuleId(i as u32))
    }

    /// Open a pipe from `from.out_port` to `to.in_port`.
    ///
    /// Both ports are validated before anything is wired, so a failed
    /// connect leaves the graph unchanged.
    pub fn connect(
        &mut self,
        from: ModuleId,
        out_port: &str,
        to: ModuleId,
        in_port: &str,
        kind: PipeKind,
    ) -> ModuleResult<PipeId> {
        let n = self.modules.len();
        for id in [from, to] {
            if id.index() >= n {
                return Err(ModuleError::configuration(
                    format!("{:?}", id),
                    "connect",
                    "no such module in this pipeline",
                ));
            }
        }
        let from_name = self.modules[from.index()].name().to_string();
        let to_name = self.modules[to.index()].name().to_string();

        if from == to || self.would_create_cycle(from, to) {
            return Err(ModuleError::configuration(
                &from_name,
                out_port,
                format!("connecting to '{}.{}' would create a cycle", to_name, in_port),
            ));
        }

        self.check_port(from, out_port, PortDirection::Output, kind)?;
        self.check_port(to, in_port, PortDirection::Input, kind)?;

        let id = PipeId(self.edges.len() as u32);
        let (tx, rx) = open_pipe(id, kind, self.settings.to_pipe_settings(), self.cancel.clone());
        self.port_set(from)
            .output_mut(out_port)
            .ok_or_else(|| missing_port(&from_name, out_port))?
            .attach(&from_name, tx)?;
        self.port_set(to)
            .input_mut(in_port)
            .ok_or_else(|| missing_port(&to_name, in_port))?
            .bind(&to_name, rx)?;

        self.edges.push(PipeEdge {
            id,
            from_module: from,
            from_port: out_port.to_string(),
            to_module: to,
            to_port: in_port.to_string(),
            kind,
        });
        tracing::info!(
            "Added {} pipe {:?}: {}.{} -> {}.{}",
            kind,
            id,
            from_name,
            out_port,
            to_name,
            in_port
        );
        Ok(id)
    }

    fn port_set(&mut self, id: ModuleId) -> &mut crate::pipeline::port::PortSet {
        self.modules[id.index()].module_mut().ports_mut()
    }

    fn check_port(
        &self,
        id: ModuleId,
        port: &str,
        direction: PortDirection,
        kind: PipeKind,
    ) -> ModuleResult<()> {
        let host = &self.modules[id.index()];
        let ports = host.module().ports();
        let descriptor = match direction {
            PortDirection::Input => {
                let input = ports.input(port).ok_or_else(|| missing_port(host.name(), port))?;
                if input.is_bound() {
                    return Err(ModuleError::configuration(
                        host.name(),
                        port,
                        "input port is already bound to a pipe",
                    ));
                }
                input.descriptor()
            }
            PortDirection::Output => ports
                .output(port)
                .ok_or_else(|| missing_port(host.name(), port))?
                .descriptor(),
        };
        if !descriptor.accepts(kind) {
            return Err(ModuleError::configuration(
                host.name(),
                port,
                format!("port does not accept {} pipes", kind),
            ));
        }
        Ok(())
    }

    /// Check if adding an edge from `from` to `to` would create a cycle.
    fn would_create_cycle(&self, from: ModuleId, to: ModuleId) -> bool {
        // If `to` can reach `from` through existing edges, adding from->to creates a cycle.
        let mut visited = vec![false; self.modules.len()];
        let mut stack = vec![to];

        while let Some(current) = stack.pop() {
            if current == from {
                return true;
            }
            let idx = current.index();
            if idx >= self.modules.len() || visited[idx] {
                continue;
            }
            visited[idx] = true;
            stack.extend(self.dependents_of(current));
        }
        false
    }

    /// Modules fed directly by `id`.
    pub fn dependents_of(&self, id: ModuleId) -> Vec<ModuleId> {
        let mut out: Vec<ModuleId> = self
            .edges
            .iter()
            .filter(|e| e.from_module == id)
            .map(|e| e.to_module)
            .collect();
        out.sort();
        out.dedup();
        out
    }

    // ── Topological sort (Kahn's algorithm) ──

    /// Producers before consumers. Ties keep insertion order.
    pub fn execution_order(&self) -> Vec<ModuleId> {
        let n = self.modules.len();
        let mut in_degree = vec![0u32; n];
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];

        for edge in &self.edges {
            let from = edge.from_module.index();
            let to = edge.to_module.index();
            if from < n && to < n {
                adj[from].push(to);
                in_degree[to] += 1;
            }
        }

        let mut queue: std::collections::VecDeque<usize> =
            (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = queue.pop_front() {
            order.push(ModuleId(node as u32));
            for &next in &adj[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() != n {
            tracing::warn!(
                "Pipeline graph has a cycle! Only {} of {} modules scheduled.",
                order.len(),
                n
            );
        }
        order
    }

    /// Start every module on its own thread.
    pub fn spawn(mut self) -> Result<PipelineHandle> {
        let order = self.execution_order();
        let started_at = Utc::now();
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        for host in &self.modules {
            for input in host.module().ports().inputs() {
                if !input.is_bound() {
                    tracing::warn!(
                        "Module '{}' input '{}' is not connected",
                        host.name(),
                        input.name()
                    );
                }
            }
        }

        let mut hosts: Vec<Option<ModuleHost>> = self.modules.drain(..).map(Some).collect();
        let mut tasks = Vec::with_capacity(hosts.len());
        for id in order {
            let Some(mut host) = hosts.get_mut(id.index()).and_then(Option::take) else {
                continue;
            };
            let name = host.name().to_string();
            let events = events_tx.clone();
            let ctx = ProcessContext::new(id, &name, self.cancel.clone(), Some(events_tx.clone()));

            let spawned = thread::Builder::new()
                .name(format!("module-{}", name))
                .spawn(move || {
                    let module = host.name().to_string();
                    let _ = events.send(PipelineEvent::ModuleStarted {
                        module_id: id,
                        module: module.clone(),
                    });
                    let result = match panic::catch_unwind(AssertUnwindSafe(|| host.run(&ctx))) {
                        Ok(result) => result,
                        Err(payload) => {
                            drop(host);
                            let _ = events.send(PipelineEvent::ModulePanicked {
                                module_id: id,
                                module,
                                message: panic_message(payload.as_ref()),
                            });
                            panic::resume_unwind(payload);
                        }
                    };
                    let event = match &result {
                        Ok(()) => PipelineEvent::ModuleFinished {
                            module_id: id,
                            module,
                        },
                        Err(e) => PipelineEvent::ModuleFailed {
                            module_id: id,
                            module,
                            kind: e.kind(),
                            message: e.to_string(),
                        },
                    };
                    // Dropping the host here releases unclosed outputs, which
                    // downstream readers observe as an aborted stream.
                    drop(host);
                    let _ = events.send(event);
                    result
                });

            match spawned {
                Ok(handle) => tasks.push(ModuleTask { id, name, handle }),
                Err(e) => {
                    self.cancel.cancel();
                    return Err(TextPipeError::Io(e))
                        .with_context(|| format!("Failed to start thread for module '{}'", name));
                }
            }
        }

        tracing::info!("Pipeline started with {} module threads", tasks.len());
        Ok(PipelineHandle::new(
            events_rx,
            tasks,
            self.cancel.clone(),
            self.settings.cancel_on_failure,
            started_at,
        ))
    }

    /// Run to completion and return the report.
    pub fn run(self) -> Result<PipelineReport> {
        Ok(self.spawn()?.wait())
    }
}

fn missing_port(module: &str, port: &str) -> ModuleError {
    ModuleError::configuration(module, port, "module has no such port")
}

/// Creates built-in modules by kind.
pub struct ModuleFactory;

impl ModuleFactory {
    pub fn create(kind: ModuleKind) -> AnyModule {
        match kind {
            ModuleKind::FileReader => FileReaderModule::new().into(),
            ModuleKind::FileWriter => FileWriterModule::new().into(),
            ModuleKind::SuffixTreeClustering => SuffixTreeClusteringModule::new().into(),
        }
    }
}

/// Builds a `Pipeline` from a pipeline description.
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Alias for `PipelineBuilder::new(config).build()`.
    pub fn from_config(config: PipelineConfig) -> Result<Pipeline> {
        Self::new(config).build()
    }

    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;
        let mut pipeline = Pipeline::new(self.config.settings.clone());
        let mut ids: HashMap<&str, ModuleId> = HashMap::new();

        for module in &self.config.modules {
            let mut properties = module.properties.clone();
            if properties.get(PROPERTY_NAME).is_none() {
                properties.set(PROPERTY_NAME, module.id.as_str());
            }
            let id = pipeline
                .add_module(ModuleFactory::create(module.kind), &properties)
                .with_context(|| format!("Failed to add module '{}'", module.id))?;
            ids.insert(module.id.as_str(), id);
        }

        for pipe in &self.config.pipes {
            let source = pipe.source()?;
            let target = pipe.target()?;
            let lookup = |module: &str| {
                ids.get(module).copied().ok_or_else(|| {
                    TextPipeError::Config(format!("Unknown module '{}' in pipe", module))
                })
            };
            let from = lookup(source.module)?;
            let to = lookup(target.module)?;
            pipeline
                .connect(from, source.port, to, target.port, pipe.kind)
                .with_context(|| format!("Failed to connect '{}' -> '{}'", pipe.from, pipe.to))?;
        }

        tracing::info!(
            "Built pipeline: {} modules, {} pipes",
            pipeline.len(),
            pipeline.edges().len()
        );
        Ok(pipeline)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "module panicked".to_string()
    }
}
