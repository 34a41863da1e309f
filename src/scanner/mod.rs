//! Guess-file discovery and display naming.
//!
//! Guess files are JSON Lines files named like
//! `<domain>_<model>_<...>_<suffix>.jsonl`; the display name keeps the
//! model and suffix segments.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Configuration for guess-file scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions to include (e.g., ["jsonl"])
    pub extensions: Vec<String>,
    /// Names to exclude (e.g., ["archive"])
    pub excludes: Vec<String>,
    /// Only keep files whose name starts with this prefix
    pub prefix: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["jsonl".to_string()],
            excludes: Vec::new(),
            prefix: None,
        }
    }
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            excludes: config.excludes.clone(),
            prefix: config.prefix.clone().filter(|p| !p.is_empty()),
        }
    }
}

/// Scanner for guess files under one directory.
pub struct GuessFileScanner {
    config: ScanConfig,
    root: PathBuf,
}

impl GuessFileScanner {
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self { config, root }
    }

    /// All matching files, sorted by path.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            anyhow::bail!("Guess directory not found: {}", self.root.display());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_excluded(&e.file_name().to_string_lossy()));

        for entry in walker {
            let entry = entry
                .with_context(|| format!("Failed to walk {}", self.root.display()))?;
            if entry.file_type().is_file() && self.matches(entry.path()) {
                files.push(entry.into_path());
            }
        }

        debug!("Found {} guess files in {}", files.len(), self.root.display());
        Ok(files)
    }

    /// Check if a file matches scan criteria.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        if self.is_excluded(name) {
            return false;
        }

        if let Some(ref prefix) = self.config.prefix {
            if !name.starts_with(prefix.as_str()) {
                return false;
            }
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.config.extensions.iter().any(|e| e == ext)
    }

    /// Check if a name matches exclusion patterns.
    fn is_excluded(&self, name: &str) -> bool {
        // Hidden files
        if name.starts_with('.') {
            return true;
        }

        self.config.excludes.iter().any(|pattern| name == pattern)
    }
}

/// Derive a guesser's display name from its file name.
///
/// `mbti_gpt-4_brief.jsonl` becomes `gpt-4_brief`. Names with fewer than
/// two `_`-separated segments fall back to the file stem.
pub fn display_name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let segments: Vec<&str> = file_name.split('_').collect();
    if segments.len() < 2 {
        return stem;
    }

    let model = segments[1];
    let suffix = segments[segments.len() - 1]
        .split('.')
        .next()
        .unwrap_or_default();

    format!("{}_{}", model, suffix)
}

/// Parse a `NAME=PATH` or bare `PATH` guess-source argument.
pub fn parse_source_arg(arg: &str) -> (String, PathBuf) {
    match arg.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            (name.to_string(), PathBuf::from(path))
        }
        _ => {
            let path = PathBuf::from(arg);
            (display_name_from_path(&path), path)
        }
    }
}

/// Pairs of sources that resolved to the same display name.
///
/// Each entry is `(name, first path, later path)`.
pub fn colliding_names(sources: &[(String, PathBuf)]) -> Vec<(&str, &Path, &Path)> {
    let mut seen: HashMap<&str, &Path> = HashMap::new();
    let mut collisions = Vec::new();

    for (name, path) in sources {
        match seen.get(name.as_str()) {
            Some(first) => collisions.push((name.as_str(), *first, path.as_path())),
            None => {
                seen.insert(name.as_str(), path.as_path());
            }
        }
    }

    collisions
}
