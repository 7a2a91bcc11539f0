//! FileReader module: streams a file into the pipeline.
//!
//! Byte pipes receive the raw file in fixed-size chunks. Character pipes
//! receive the same content decoded as UTF-8; a multi-byte sequence split
//! across two chunks is carried over and decoded with the next one.

use crate::pipeline::error::{ModuleError, ModuleResult, PipeError};
use crate::pipeline::module::{Module, ModuleDescriptor, ProcessContext, Properties, PropertySpec};
use crate::pipeline::pipe::PipeKind;
use crate::pipeline::port::{OutputPort, PortDescriptor, PortSet};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

/// Read size for each chunk pushed downstream.
pub const CHUNK_SIZE: usize = 1024;

pub const PORT_OUTPUT: &str = "output";
pub const PROPERTY_INPUT_FILE: &str = "inputfile";

static PORTS: &[PortDescriptor] = &[PortDescriptor::output(
    PORT_OUTPUT,
    "[bytes, text] file content",
    &[PipeKind::Bytes, PipeKind::Chars],
)];

static PROPERTIES: &[PropertySpec] = &[PropertySpec::required(
    PROPERTY_INPUT_FILE,
    "Path of the file to read",
)];

pub static DESCRIPTOR: ModuleDescriptor = ModuleDescriptor {
    type_name: "FileReader",
    description: "Reads a file and writes its content to the output port",
    properties: PROPERTIES,
    ports: PORTS,
};

pub struct FileReaderModule {
    name: String,
    path: Option<PathBuf>,
    ports: PortSet,
    bytes_read: u64,
}

impl FileReaderModule {
    pub fn new() -> Self {
        Self {
            name: DESCRIPTOR.type_name.to_string(),
            path: None,
            ports: PortSet::from_descriptors(DESCRIPTOR.ports),
            bytes_read: 0,
        }
    }

    /// Bytes copied by the last `process` call.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn io_error(&self, path: &std::path::Path, source: std::io::Error) -> ModuleError {
        ModuleError::Io {
            module: self.name.clone(),
            path: path.display().to_string(),
            source,
        }
    }
}

impl Default for FileReaderModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for FileReaderModule {
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
        self.path = Some(PathBuf::from(resolved.require(PROPERTY_INPUT_FILE)?));
        Ok(())
    }

    fn process(&mut self, ctx: &ProcessContext) -> ModuleResult<()> {
        let path = self.path.clone().ok_or_else(|| ModuleError::NotConfigured {
            module: self.name.clone(),
        })?;
        let mut file = File::open(&path).map_err(|e| self.io_error(&path, e))?;
        tracing::info!("[{}] reading '{}'", self.name, path.display());

        let name = self.name.clone();
        let port = self
            .ports
            .output_mut(PORT_OUTPUT)
            .ok_or_else(|| ModuleError::configuration(&name, PORT_OUTPUT, "port is missing"))?;
        let wants_text = port.has_pipes(PipeKind::Chars);

        let mut buf = [0u8; CHUNK_SIZE];
        let mut pending: Vec<u8> = Vec::new();
        let mut total = 0u64;
        loop {
            if ctx.is_cancelled() {
                return Err(ModuleError::pipe(name, PORT_OUTPUT, PipeError::Cancelled));
            }
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(ModuleError::Io {
                        module: name,
                        path: path.display().to_string(),
                        source: e,
                    })
                }
            };
            total += n as u64;
            write_chunk(port, &buf[..n], wants_text.then_some(&mut pending))
                .map_err(|e| ModuleError::pipe(&name, PORT_OUTPUT, e))?;
        }

        if wants_text && !pending.is_empty() {
            return Err(ModuleError::pipe(
                name,
                PORT_OUTPUT,
                PipeError::InvalidUtf8(format!(
                    "file ends inside a multi-byte sequence ({} trailing bytes)",
                    pending.len()
                )),
            ));
        }

        self.bytes_read = total;
        tracing::debug!("[{}] copied {} bytes", self.name, total);
        Ok(())
    }
}

/// Push one chunk to byte pipes and, when `pending` is given, its decoded
/// text to character pipes.
fn write_chunk(
    port: &mut OutputPort,
    chunk: &[u8],
    pending: Option<&mut Vec<u8>>,
) -> Result<(), PipeError> {
    port.write_bytes(chunk)?;
    let Some(pending) = pending else {
        return Ok(());
    };

    pending.extend_from_slice(chunk);
    let valid = match std::str::from_utf8(pending) {
        Ok(text) => text.len(),
        // An incomplete trailing sequence has no error length.
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(e) => return Err(PipeError::InvalidUtf8(e.to_string())),
    };
    if valid > 0 {
        let rest = pending.split_off(valid);
        let text = String::from_utf8(std::mem::replace(pending, rest))
            .map_err(|e| PipeError::InvalidUtf8(e.to_string()))?;
        port.write_str(&text)?;
    }
    Ok(())
}
