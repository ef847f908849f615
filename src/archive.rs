use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use tracing::debug;

use crate::pipeline::Window;

/// Writes each fetched payload verbatim to `<dir>/<prefix>_<from>_<to>.json`.
///
/// A rerun of the same window replaces the earlier file.
#[derive(Debug, Clone)]
pub struct Archiver {
    dir: PathBuf,
    prefix: String,
}

impl Archiver {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, window: Window) -> PathBuf {
        self.dir
            .join(format!("{}_{}_{}.json", self.prefix, window.from, window.to))
    }

    pub fn write(&self, window: Window, payload: &Value) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create archive dir {}", self.dir.display()))?;
        let path = self.path_for(window);
        let bytes = to_pretty_json(payload)?;
        write_file(&path, &bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "archived payload");
        Ok(path)
    }
}

/// Pretty JSON with a 4-space indent.
fn to_pretty_json(payload: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    payload
        .serialize(&mut ser)
        .context("serialize archive payload")?;
    Ok(buf)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file =
        fs::File::create(path).with_context(|| format!("create archive {}", path.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("write archive {}", path.display()))?;
    Ok(())
}
