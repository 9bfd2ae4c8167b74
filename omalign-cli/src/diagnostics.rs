//! JSON-lines dump of pipeline events.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use omalign_core::{AlignmentObserver, PipelineEvent};

/// Writes one JSON object per event. Write failures are logged once and
/// further events are dropped.
pub struct DiagnosticsWriter<W: Write + Send> {
    writer: Mutex<Option<W>>,
}

impl DiagnosticsWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create diagnostics file: {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> DiagnosticsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
        }
    }

    pub fn finish(&self) -> Result<Option<W>> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("diagnostics writer lock poisoned"))?;
        match guard.take() {
            Some(mut writer) => {
                writer.flush().context("Failed to flush diagnostics")?;
                Ok(Some(writer))
            }
            None => Ok(None),
        }
    }
}

impl<W: Write + Send> AlignmentObserver for DiagnosticsWriter<W> {
    fn on_event(&self, event: &PipelineEvent) {
        let Ok(mut guard) = self.writer.lock() else {
            return;
        };
        let Some(writer) = guard.as_mut() else {
            return;
        };

        let written = serde_json::to_writer(&mut *writer, event)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"));
        if let Err(e) = written {
            log::warn!("Disabling diagnostics output: {}", e);
            *guard = None;
        }
    }
}
