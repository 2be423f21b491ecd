//! Short-term RAM ring plus an optional `long_term.jsonl` file (one item per line).

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use super::{MemoryItem, MemoryStore};

const LONG_TERM_FILE: &str = "long_term.jsonl";
const SHORT_TERM_CAPACITY: usize = 256;

pub struct JsonlMemoryStore {
    short_term: Mutex<VecDeque<MemoryItem>>,
    long_term: Option<PathBuf>,
}

impl JsonlMemoryStore {
    /// Store persisting to `<dir>/long_term.jsonl`; creates `dir` if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        let path = dir.join(LONG_TERM_FILE);
        log::info!("Memory store: {:?}", path);
        Ok(Self {
            short_term: Mutex::new(VecDeque::new()),
            long_term: Some(path),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            short_term: Mutex::new(VecDeque::new()),
            long_term: None,
        }
    }

    pub fn long_term_path(&self) -> Option<&Path> {
        self.long_term.as_deref()
    }

    fn persist(path: &Path, item: &MemoryItem) -> Result<()> {
        let line = serde_json::to_string(item)?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        writeln!(f, "{line}")?;
        Ok(())
    }

    fn search_file(path: &Path, needle: &str) -> Result<Vec<MemoryItem>> {
        let file = match fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("opening {}", path.display())),
        };
        let mut hits = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MemoryItem>(&line) {
                Ok(item) if item.text.to_lowercase().contains(needle) => hits.push(item),
                Ok(_) => {}
                Err(e) => log::debug!("Skipping unreadable memory line {}: {e}", lineno + 1),
            }
        }
        Ok(hits)
    }

    fn ram(&self) -> std::sync::MutexGuard<'_, VecDeque<MemoryItem>> {
        self.short_term.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MemoryStore for JsonlMemoryStore {
    fn append(&self, text: &str, metadata: Map<String, Value>) -> Result<MemoryItem> {
        let item = MemoryItem::new(text, metadata);
        {
            let mut ram = self.ram();
            if ram.len() == SHORT_TERM_CAPACITY {
                ram.pop_front();
            }
            ram.push_back(item.clone());
        }
        if let Some(path) = &self.long_term {
            if let Err(e) = Self::persist(path, &item) {
                log::error!("Failed writing long-term memory: {e:#}");
            }
        }
        Ok(item)
    }

    fn search(&self, keyword: &str) -> Result<Vec<MemoryItem>> {
        let needle = keyword.to_lowercase();
        match &self.long_term {
            Some(path) => Self::search_file(path, &needle),
            None => Ok(self
                .ram()
                .iter()
                .filter(|item| item.text.to_lowercase().contains(&needle))
                .cloned()
                .collect()),
        }
    }

    fn recent(&self, limit: usize) -> Vec<MemoryItem> {
        let ram = self.ram();
        let skip = ram.len().saturating_sub(limit);
        ram.iter().skip(skip).cloned().collect()
    }
}
