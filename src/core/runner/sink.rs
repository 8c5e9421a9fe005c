//! Output destinations for forwarded child output and banners.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// A writer shared between the runner and its reader threads.
pub type SharedSink = Arc<Mutex<dyn Write + Send>>;

/// Where forwarded stdout/stderr bytes end up.
#[derive(Clone)]
pub struct OutputSinks {
    pub stdout: SharedSink,
    pub stderr: SharedSink,
}

impl OutputSinks {
    /// The orchestrator's own standard streams.
    pub fn process() -> Self {
        Self {
            stdout: Arc::new(Mutex::new(io::stdout())),
            stderr: Arc::new(Mutex::new(io::stderr())),
        }
    }

    /// In-memory sinks, returned together with handles to read them back.
    pub fn memory() -> (Self, MemoryBuffer, MemoryBuffer) {
        let stdout = MemoryBuffer::default();
        let stderr = MemoryBuffer::default();
        let sinks = Self {
            stdout: Arc::new(Mutex::new(stdout.clone())),
            stderr: Arc::new(Mutex::new(stderr.clone())),
        };
        (sinks, stdout, stderr)
    }
}

/// Write `bytes` to a shared sink and flush it.
pub fn write_to(sink: &SharedSink, bytes: &[u8]) -> io::Result<()> {
    let mut guard = sink
        .lock()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "output sink poisoned"))?;
    guard.write_all(bytes)?;
    guard.flush()
}

/// Growable byte buffer that can be cloned and written from several threads.
#[derive(Clone, Default)]
pub struct MemoryBuffer(Arc<Mutex<Vec<u8>>>);

impl MemoryBuffer {
    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }
}

impl Write for MemoryBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory buffer poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
