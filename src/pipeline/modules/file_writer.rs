//! FileWriter module: drains its input pipe into a file.

use crate::pipeline::error::{ModuleError, ModuleResult, PipeError};
use crate::pipeline::module::{Module, ModuleDescriptor, ProcessContext, Properties, PropertySpec};
use crate::pipeline::pipe::{AnyReceiver, ByteReader, CharReader, PipeKind};
use crate::pipeline::port::{PortDescriptor, PortSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const PORT_INPUT: &str = "input";
pub const PROPERTY_OUTPUT_FILE: &str = "outputfile";

static PORTS: &[PortDescriptor] = &[PortDescriptor::input(
    PORT_INPUT,
    "[bytes, text] content to write",
    &[PipeKind::Bytes, PipeKind::Chars],
)];

static PROPERTIES: &[PropertySpec] = &[PropertySpec::required(
    PROPERTY_OUTPUT_FILE,
    "Path of the file to create or truncate",
)];

pub static DESCRIPTOR: ModuleDescriptor = ModuleDescriptor {
    type_name: "FileWriter",
    description: "Writes everything read from the input port to a file",
    properties: PROPERTIES,
    ports: PORTS,
};

pub struct FileWriterModule {
    name: String,
    path: Option<PathBuf>,
    ports: PortSet,
    bytes_written: u64,
}

impl FileWriterModule {
    pub fn new() -> Self {
        Self {
            name: DESCRIPTOR.type_name.to_string(),
            path: None,
            ports: PortSet::from_descriptors(DESCRIPTOR.ports),
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> ModuleError {
        ModuleError::Io {
            module: self.name.clone(),
            path: path.display().to_string(),
            source,
        }
    }
}

impl Default for FileWriterModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for FileWriterModule {
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
        self.path = Some(PathBuf::from(resolved.require(PROPERTY_OUTPUT_FILE)?));
        Ok(())
    }

    fn process(&mut self, _ctx: &ProcessContext) -> ModuleResult<()> {
        let path = self.path.clone().ok_or_else(|| ModuleError::NotConfigured {
            module: self.name.clone(),
        })?;
        let name = self.name.clone();
        let input = self
            .ports
            .input_mut(PORT_INPUT)
            .ok_or_else(|| ModuleError::configuration(&name, PORT_INPUT, "port is missing"))?
            .take(&name)?;

        // The file is only created once the input is known to be bound.
        let file = File::create(&path).map_err(|e| self.io_error(&path, e))?;
        let mut writer = BufWriter::new(file);
        tracing::info!("[{}] writing '{}'", name, path.display());

        let mut written = 0u64;
        match input {
            AnyReceiver::Bytes(rx) => {
                let mut reader = ByteReader::new(rx);
                written = std::io::copy(&mut reader, &mut writer).map_err(|e| {
                    // Pipe failures surface as `io::Error::other` wrapping the PipeError.
                    match e.get_ref().and_then(|inner| inner.downcast_ref::<PipeError>()) {
                        Some(pipe_err) => ModuleError::pipe(&name, PORT_INPUT, pipe_err.clone()),
                        None => self.io_error(&path, e),
                    }
                })?;
            }
            AnyReceiver::Chars(rx) => {
                let mut reader = CharReader::new(rx);
                while let Some(chunk) = reader
                    .next_chunk()
                    .map_err(|e| ModuleError::pipe(&name, PORT_INPUT, e))?
                {
                    writer
                        .write_all(chunk.as_bytes())
                        .map_err(|e| self.io_error(&path, e))?;
                    written += chunk.len() as u64;
                }
            }
        }
        writer.flush().map_err(|e| self.io_error(&path, e))?;

        self.bytes_written = written;
        tracing::debug!("[{}] wrote {} bytes", name, written);
        Ok(())
    }
}
