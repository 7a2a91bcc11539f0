//! Ports: named, typed endpoints on a module.
//!
//! Each module declares its ports via a static `PortDescriptor` array. An
//! input port binds exactly one pipe; an output port fans out to any number
//! of pipes and broadcasts every write to all attached pipes of the matching
//! kind.

use crate::pipeline::error::{ModuleError, ModuleResult, PipeError};
use crate::pipeline::id::PipeId;
use crate::pipeline::pipe::{AnyReceiver, AnySender, ByteReader, CharReader, Delivery, PipeKind};
use serde::Serialize;

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Static descriptor for a module's port.
#[derive(Debug, Clone)]
pub struct PortDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub direction: PortDirection,
    /// Pipe kinds this port can be wired to.
    pub accepts: &'static [PipeKind],
}

impl PortDescriptor {
    pub const fn input(
        name: &'static str,
        description: &'static str,
        accepts: &'static [PipeKind],
    ) -> Self {
        Self {
            name,
            description,
            direction: PortDirection::Input,
            accepts,
        }
    }

    pub const fn output(
        name: &'static str,
        description: &'static str,
        accepts: &'static [PipeKind],
    ) -> Self {
        Self {
            name,
            description,
            direction: PortDirection::Output,
            accepts,
        }
    }

    pub fn accepts(&self, kind: PipeKind) -> bool {
        self.accepts.contains(&kind)
    }
}

fn check_kind(module: &str, descriptor: &PortDescriptor, kind: PipeKind) -> ModuleResult<()> {
    if descriptor.accepts(kind) {
        return Ok(());
    }
    let accepted: Vec<String> = descriptor.accepts.iter().map(|k| k.to_string()).collect();
    Err(ModuleError::configuration(
        module,
        descriptor.name,
        format!(
            "port does not accept {} pipes (accepts: {})",
            kind,
            accepted.join(", ")
        ),
    ))
}

/// Input endpoint. Binds at most one pipe.
pub struct InputPort {
    descriptor: PortDescriptor,
    pipe: Option<AnyReceiver>,
}

impl InputPort {
    pub fn new(descriptor: PortDescriptor) -> Self {
        Self {
            descriptor,
            pipe: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    pub fn descriptor(&self) -> &PortDescriptor {
        &self.descriptor
    }

    pub fn is_bound(&self) -> bool {
        self.pipe.is_some()
    }

    pub fn pipe_kind(&self) -> Option<PipeKind> {
        self.pipe.as_ref().map(AnyReceiver::kind)
    }

    /// Bind the consumer end of a pipe to this port.
    pub fn bind(&mut self, module: &str, rx: AnyReceiver) -> ModuleResult<()> {
        check_kind(module, &self.descriptor, rx.kind())?;
        if self.pipe.is_some() {
            return Err(ModuleError::configuration(
                module,
                self.descriptor.name,
                "input port is already bound to a pipe",
            ));
        }
        self.pipe = Some(rx);
        Ok(())
    }

    /// Take the bound pipe out of the port, whatever its kind.
    pub fn take(&mut self, module: &str) -> ModuleResult<AnyReceiver> {
        self.pipe.take().ok_or_else(|| {
            ModuleError::configuration(module, self.descriptor.name, "input port is not connected")
        })
    }

    pub fn take_bytes(&mut self, module: &str) -> ModuleResult<ByteReader> {
        match self.take(module)? {
            AnyReceiver::Bytes(rx) => Ok(ByteReader::new(rx)),
            AnyReceiver::Chars(_) => Err(ModuleError::pipe(
                module,
                self.descriptor.name,
                PipeError::KindMismatch {
                    expected: PipeKind::Bytes,
                    found: PipeKind::Chars,
                },
            )),
        }
    }

    pub fn take_chars(&mut self, module: &str) -> ModuleResult<CharReader> {
        match self.take(module)? {
            AnyReceiver::Chars(rx) => Ok(CharReader::new(rx)),
            AnyReceiver::Bytes(_) => Err(ModuleError::pipe(
                module,
                self.descriptor.name,
                PipeError::KindMismatch {
                    expected: PipeKind::Chars,
                    found: PipeKind::Bytes,
                },
            )),
        }
    }
}

/// Output endpoint. Fans out to every attached pipe.
pub struct OutputPort {
    descriptor: PortDescriptor,
    pipes: Vec<AnySender>,
    closed: bool,
    /// Pipes whose consumer went away while we were writing.
    lost: Vec<PipeId>,
}

impl OutputPort {
    pub fn new(descriptor: PortDescriptor) -> Self {
        Self {
            descriptor,
            pipes: Vec::new(),
            closed: false,
            lost: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    pub fn descriptor(&self) -> &PortDescriptor {
        &self.descriptor
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn pipe_count(&self, kind: PipeKind) -> usize {
        self.pipes.iter().filter(|p| p.kind() == kind).count()
    }

    pub fn has_pipes(&self, kind: PipeKind) -> bool {
        self.pipe_count(kind) > 0
    }

    /// Consumers that disappeared during writes, in the order detected.
    pub fn lost_consumers(&self) -> &[PipeId] {
        &self.lost
    }

    /// Attach the producer end of a pipe.
    pub fn attach(&mut self, module: &str, tx: AnySender) -> ModuleResult<()> {
        check_kind(module, &self.descriptor, tx.kind())?;
        if self.closed {
            return Err(ModuleError::configuration(
                module,
                self.descriptor.name,
                "cannot attach a pipe to a closed output port",
            ));
        }
        self.pipes.push(tx);
        Ok(())
    }

    /// Broadcast bytes to all byte pipes.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), PipeError> {
        self.ensure_open()?;
        for pipe in &mut self.pipes {
            if let AnySender::Bytes(tx) = pipe {
                if tx.is_dead() {
                    continue;
                }
                if tx.send(data.to_vec())? == Delivery::ConsumerGone {
                    tracing::warn!(
                        "Port '{}': consumer of {:?} is gone, continuing with remaining pipes",
                        self.descriptor.name,
                        tx.id()
                    );
                    self.lost.push(tx.id());
                }
            }
        }
        Ok(())
    }

    /// Broadcast text to all character pipes.
    pub fn write_str(&mut self, text: &str) -> Result<(), PipeError> {
        self.ensure_open()?;
        for pipe in &mut self.pipes {
            if let AnySender::Chars(tx) = pipe {
                if tx.is_dead() {
                    continue;
                }
                if tx.send(text.to_string())? == Delivery::ConsumerGone {
                    tracing::warn!(
                        "Port '{}': consumer of {:?} is gone, continuing with remaining pipes",
                        self.descriptor.name,
                        tx.id()
                    );
                    self.lost.push(tx.id());
                }
            }
        }
        Ok(())
    }

    /// Pretty-print a value as JSON to all character pipes. Nothing is
    /// written if the value cannot be encoded.
    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), PipeError> {
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| PipeError::Encoding(e.to_string()))?;
        self.write_str(&text)
    }

    /// Close every attached pipe. Idempotent; returns the number of
    /// end-of-stream signals delivered by this call.
    pub fn close(&mut self) -> Result<usize, PipeError> {
        if self.closed {
            return Ok(0);
        }
        let mut delivered = 0;
        for pipe in &mut self.pipes {
            if pipe.close()? {
                delivered += 1;
            }
        }
        self.closed = true;
        Ok(delivered)
    }

    fn ensure_open(&self) -> Result<(), PipeError> {
        if self.closed {
            Err(PipeError::Closed)
        } else {
            Ok(())
        }
    }
}

/// All ports owned by one module.
pub struct PortSet {
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
}

impl PortSet {
    pub fn from_descriptors(descriptors: &[PortDescriptor]) -> Self {
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for descriptor in descriptors {
            match descriptor.direction {
                PortDirection::Input => inputs.push(InputPort::new(descriptor.clone())),
                PortDirection::Output => outputs.push(OutputPort::new(descriptor.clone())),
            }
        }
        Self { inputs, outputs }
    }

    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    pub fn input(&self, name: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|p| p.name() == name)
    }

    pub fn input_mut(&mut self, name: &str) -> Option<&mut InputPort> {
        self.inputs.iter_mut().find(|p| p.name() == name)
    }

    pub fn output(&self, name: &str) -> Option<&OutputPort> {
        self.outputs.iter().find(|p| p.name() == name)
    }

    pub fn output_mut(&mut self, name: &str) -> Option<&mut OutputPort> {
        self.outputs.iter_mut().find(|p| p.name() == name)
    }

    /// Close every output port, stopping at the first failure.
    pub fn close_all_outputs(&mut self) -> Result<usize, (&'static str, PipeError)> {
        let mut delivered = 0;
        for port in &mut self.outputs {
            delivered += port.close().map_err(|e| (port.name(), e))?;
        }
        Ok(delivered)
    }

    pub fn lost_consumers(&self) -> Vec<(&'static str, PipeId)> {
        self.outputs
            .iter()
            .flat_map(|p| p.lost_consumers().iter().map(move |id| (p.name(), *id)))
            .collect()
    }
}
