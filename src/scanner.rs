use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanningConfig;

/// One scanned file: path relative to the project root (always `/`-separated)
/// plus its full text content.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectFile {
    pub relative_path: String,
    pub content: String,
}

/// In-memory snapshot of the project, ordered lexicographically by relative
/// path so repeated scans of an unchanged tree are identical.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectContext {
    pub root: PathBuf,
    pub files: Vec<ProjectFile>,
}

impl ProjectContext {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.relative_path.as_str())
    }

    pub fn get(&self, relative_path: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.relative_path == relative_path)
            .map(|f| f.content.as_str())
    }
}

/// Walks a project tree and builds the context the AI commands attach to
/// their prompts. Binary artifacts, oversized files, and dependency
/// directories stay out.
pub struct ProjectScanner {
    ignored_extensions: HashSet<String>,
    ignored_dirs: HashSet<String>,
    max_file_size: u64,
}

impl ProjectScanner {
    pub fn new(config: &ScanningConfig) -> Self {
        let ignored_extensions = config
            .ignored_extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        let ignored_dirs = config.ignored_dirs.iter().cloned().collect();

        Self {
            ignored_extensions,
            ignored_dirs,
            max_file_size: config.max_file_size,
        }
    }

    /// True iff the path's extension is in the configured ignore set.
    /// Extension-less files are never ignored.
    pub fn is_ignored(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.ignored_extensions.contains(&ext.to_ascii_lowercase()),
            None => false,
        }
    }

    fn should_descend(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        // VCS metadata is always pruned, on top of the configured set.
        name != ".git" && !self.ignored_dirs.contains(name.as_ref())
    }

    pub fn scan(&self, root: &Path) -> Result<ProjectContext> {
        if !root.is_dir() {
            anyhow::bail!("project root {} is not a readable directory", root.display());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| self.should_descend(e))
        {
            // An unreadable entry skips that entry, not the scan. Only a bad
            // root (checked above) is fatal.
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(root = %root.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if self.is_ignored(path) {
                continue;
            }

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unstatable file");
                    continue;
                }
            };
            if meta.len() > self.max_file_size {
                debug!(path = %path.display(), size = meta.len(), "skipping oversized file");
                continue;
            }

            // Non-UTF-8 files are skipped, never fatal.
            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };

            files.push(ProjectFile {
                relative_path: normalize_rel(root, path),
                content,
            });
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        Ok(ProjectContext {
            root: root.to_path_buf(),
            files,
        })
    }
}

fn normalize_rel(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}
