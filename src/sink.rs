//! Display sinks: where rendered markup ends up.
//!
//! Every sink replaces its whole content on each call to [`DisplaySink::show`].

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::render::html_page;

pub trait DisplaySink: Send {
    /// Replace the displayed content with `markup`.
    fn show(&mut self, markup: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

/// Rewrites a standalone HTML file on every render, for a browser to reload.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    title: String,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DisplaySink for FileSink {
    fn show(&mut self, markup: &str) -> Result<()> {
        std::fs::write(&self.path, html_page(&self.title, markup))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stdout
// ---------------------------------------------------------------------------

/// Prints each frame to stdout, separated by a form feed line.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl DisplaySink for StdoutSink {
    fn show(&mut self, markup: &str) -> Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        out.write_all(markup.as_bytes())?;
        out.write_all(b"\x0c\n")?;
        out.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Keeps every frame. Clones share the same frame log, so a test can hold one
/// handle while the handler owns another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    frames: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.frames.lock().ok().and_then(|f| f.last().cloned())
    }

    pub fn render_count(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or(0)
    }
}

impl DisplaySink for MemorySink {
    fn show(&mut self, markup: &str) -> Result<()> {
        if let Ok(mut frames) = self.frames.lock() {
            frames.push(markup.to_string());
        }
        Ok(())
    }
}
