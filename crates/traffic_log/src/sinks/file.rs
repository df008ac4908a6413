//! AppendFile - lazily opened append-only output shared by the file-backed sinks

use contracts::HubError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Append-only file handle, opened on first write
#[derive(Debug)]
pub struct AppendFile {
    sink_name: String,
    path: PathBuf,
    file: Option<File>,
    bytes_written: u64,
}

impl AppendFile {
    pub fn new(sink_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            sink_name: sink_name.into(),
            path: path.into(),
            file: None,
            bytes_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file has been opened yet
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Append `data`, opening the file first if needed
    pub fn append(&mut self, data: &[u8]) -> Result<(), HubError> {
        let file = self.open()?;
        file.write_all(data)
            .map_err(|e| HubError::sink_write(&self.sink_name, e.to_string()))?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), HubError> {
        if let Some(file) = self.file.as_mut() {
            file.flush()
                .map_err(|e| HubError::sink_write(&self.sink_name, e.to_string()))?;
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), HubError> {
        self.flush()?;
        if self.file.take().is_some() {
            debug!(
                sink = %self.sink_name,
                path = %self.path.display(),
                bytes = self.bytes_written,
                "Log file closed"
            );
        }
        Ok(())
    }

    fn open(&mut self) -> Result<&mut File, HubError> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|source| HubError::SinkOpen {
                    sink_name: self.sink_name.clone(),
                    path: self.path.display().to_string(),
                    source,
                })?;
            info!(sink = %self.sink_name, path = %self.path.display(), "Log file opened");
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| HubError::sink_write(&self.sink_name, "log file not open"))
    }
}
