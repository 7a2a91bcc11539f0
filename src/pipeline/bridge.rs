//! Thread boundary between running modules and the orchestrator.
//!
//! Every module runs as an explicitly submitted task on its own thread and
//! reports back over one crossbeam completion channel. `PipelineHandle` is the
//! orchestrator's side of that channel: it observes events, cancels the
//! pipeline when a module fails and finally folds everything into a
//! `PipelineReport`.

use crate::pipeline::error::{ErrorKind, ModuleError, ModuleResult};
use crate::pipeline::id::ModuleId;
use crate::pipeline::pipe::CancelToken;
use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::thread::JoinHandle;

/// Messages sent from module threads to the orchestrator.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A module's `process` started.
    ModuleStarted { module_id: ModuleId, module: String },

    /// A module finished and closed its outputs.
    ModuleFinished { module_id: ModuleId, module: String },

    /// A module failed; its outputs were left unclosed.
    ModuleFailed {
        module_id: ModuleId,
        module: String,
        kind: ErrorKind,
        message: String,
    },

    /// The thread running a module panicked.
    ModulePanicked {
        module_id: ModuleId,
        module: String,
        message: String,
    },

    /// A non-fatal condition worth surfacing.
    Warning {
        module_id: ModuleId,
        module: String,
        message: String,
    },
}

/// Final state of one module after a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModuleOutcome {
    Succeeded,
    Failed { kind: ErrorKind, message: String },
    /// The thread running the module panicked.
    Panicked,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleReport {
    pub id: u32,
    pub name: String,
    pub outcome: ModuleOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct WarningRecord {
    pub module: String,
    pub message: String,
}

/// Summary of a whole pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub modules: Vec<ModuleReport>,
    pub warnings: Vec<WarningRecord>,
    /// Whether the pipeline was cancelled after a failure.
    pub cancelled: bool,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.modules
            .iter()
            .all(|m| m.outcome == ModuleOutcome::Succeeded)
    }

    pub fn module(&self, name: &str) -> Option<&ModuleReport> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Modules that did not succeed, in submission order.
    pub fn failures(&self) -> impl Iterator<Item = &ModuleReport> {
        self.modules
            .iter()
            .filter(|m| m.outcome != ModuleOutcome::Succeeded)
    }
}

/// A submitted module task.
pub(crate) struct ModuleTask {
    pub id: ModuleId,
    pub name: String,
    pub handle: JoinHandle<ModuleResult<()>>,
}

/// Orchestrator-side handle for a running pipeline.
pub struct PipelineHandle {
    events: Receiver<PipelineEvent>,
    tasks: Vec<ModuleTask>,
    cancel: CancelToken,
    cancel_on_failure: bool,
    started_at: DateTime<Utc>,
}

impl PipelineHandle {
    pub(crate) fn new(
        events: Receiver<PipelineEvent>,
        tasks: Vec<ModuleTask>,
        cancel: CancelToken,
        cancel_on_failure: bool,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            events,
            tasks,
            cancel,
            cancel_on_failure,
            started_at,
        }
    }

    /// Cancel every blocked read and write in the pipeline.
    pub fn cancel(&self) {
        tracing::info!("Cancelling pipeline");
        self.cancel.cancel();
    }

    /// Try to receive a single event without blocking.
    pub fn try_recv(&self) -> Option<PipelineEvent> {
        self.events.try_recv().ok()
    }

    /// Block until every module has finished, then collect the report.
    pub fn wait(self) -> PipelineReport {
        let mut warnings = Vec::new();
        let mut cancelled = false;

        // Each module thread owns a sender; the channel disconnects once all
        // of them have exited.
        for event in self.events.iter() {
            match event {
                PipelineEvent::ModuleStarted { module, .. } => {
                    tracing::debug!("Module '{}' started", module);
                }
                PipelineEvent::ModuleFinished { module, .. } => {
                    tracing::debug!("Module '{}' finished", module);
                }
                PipelineEvent::ModuleFailed {
                    module,
                    kind,
                    message,
                    ..
                } => {
                    tracing::error!("Module '{}' failed ({:?}): {}", module, kind, message);
                    if self.cancel_on_failure && !self.cancel.is_cancelled() {
                        self.cancel.cancel();
                        cancelled = true;
                    }
                }
                PipelineEvent::ModulePanicked {
                    module, message, ..
                } => {
                    tracing::error!("Module '{}' panicked: {}", module, message);
                    if self.cancel_on_failure && !self.cancel.is_cancelled() {
                        self.cancel.cancel();
                        cancelled = true;
                    }
                }
                PipelineEvent::Warning {
                    module, message, ..
                } => {
                    warnings.push(WarningRecord { module, message });
                }
            }
        }

        let modules = self
            .tasks
            .into_iter()
            .map(|task| {
                let outcome = match task.handle.join() {
                    Ok(Ok(())) => ModuleOutcome::Succeeded,
                    Ok(Err(e)) => failed(&e),
                    Err(_) => ModuleOutcome::Panicked,
                };
                ModuleReport {
                    id: task.id.0,
                    name: task.name,
                    outcome,
                }
            })
            .collect();

        PipelineReport {
            started_at: self.started_at,
            finished_at: Utc::now(),
            modules,
            warnings,
            cancelled,
        }
    }
}

fn failed(e: &ModuleError) -> ModuleOutcome {
    ModuleOutcome::Failed {
        kind: e.kind(),
        message: e.to_string(),
    }
}
