use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::scanner::{ProjectContext, ProjectScanner};

/// Caches the last project scan so context-bearing commands don't re-read the
/// tree on every input line. `project-refresh` is the only invalidation.
pub struct ContextCache {
    scanner: ProjectScanner,
    root: PathBuf,
    cached: Option<ProjectContext>,
}

impl ContextCache {
    pub fn new(scanner: ProjectScanner, root: PathBuf) -> Self {
        Self {
            scanner,
            root,
            cached: None,
        }
    }

    /// Returns the current snapshot, scanning lazily on first use.
    pub fn get(&mut self) -> Result<&ProjectContext> {
        if self.cached.is_none() {
            self.refresh()?;
        }
        // Populated by the refresh above.
        Ok(self.cached.as_ref().unwrap())
    }

    /// Forces a rescan and swaps in the new snapshot wholesale. Returns the
    /// number of files scanned. On failure the previous snapshot is kept.
    pub fn refresh(&mut self) -> Result<usize> {
        let context = self.scanner.scan(&self.root)?;
        let count = context.file_count();
        info!(files = count, root = %self.root.display(), "project context refreshed");
        self.cached = Some(context);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanningConfig;
    use std::fs;
    use tempfile::TempDir;

    fn cache_for(dir: &TempDir) -> ContextCache {
        let scanner = ProjectScanner::new(&ScanningConfig::default());
        ContextCache::new(scanner, dir.path().to_path_buf())
    }

    #[test]
    fn first_get_scans_lazily() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let mut cache = cache_for(&dir);
        assert_eq!(cache.get().unwrap().file_count(), 1);
    }

    #[test]
    fn get_reuses_snapshot_until_refresh() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let mut cache = cache_for(&dir);
        assert_eq!(cache.get().unwrap().file_count(), 1);

        // New file is invisible until an explicit refresh.
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        assert_eq!(cache.get().unwrap().file_count(), 1);

        assert_eq!(cache.refresh().unwrap(), 2);
        assert_eq!(cache.get().unwrap().file_count(), 2);
    }

    #[test]
    fn refresh_reflects_removals() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();

        let mut cache = cache_for(&dir);
        assert_eq!(cache.refresh().unwrap(), 2);

        fs::remove_file(dir.path().join("b.txt")).unwrap();
        assert_eq!(cache.refresh().unwrap(), 1);
        assert!(cache.get().unwrap().get("b.txt").is_none());
    }

    #[test]
    fn failed_refresh_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let scanner = ProjectScanner::new(&ScanningConfig::default());
        let mut cache = ContextCache::new(scanner, dir.path().to_path_buf());
        cache.refresh().unwrap();

        cache.root = PathBuf::from("/nonexistent/project");
        assert!(cache.refresh().is_err());
        assert_eq!(cache.get().unwrap().file_count(), 1);
    }
}
