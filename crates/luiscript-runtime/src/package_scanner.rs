//! Script package change detection for hot reloading
//!
//! Watches every `.lua` file below the package roots and reports what was
//! modified, added or removed since the previous scan.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};

/// Default scan interval (1000ms = 1Hz)
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(1000);

/// Result of scanning for package changes
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Files that were modified (path and new modification time)
    pub changed: Vec<(PathBuf, SystemTime)>,
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl ScanResult {
    /// Returns true if there are any changes detected
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty() || !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Scanner for detecting changes below a set of package roots
pub struct PackageScanner {
    roots: Vec<PathBuf>,
    scan_interval: Duration,
    last_scan: Option<Instant>,
    /// State from the last scan: path -> modification time
    cached_state: HashMap<PathBuf, SystemTime>,
}

impl PackageScanner {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self::with_interval(roots, DEFAULT_SCAN_INTERVAL)
    }

    pub fn with_interval(roots: Vec<PathBuf>, scan_interval: Duration) -> Self {
        // Pre-populate so existing files are not reported as added
        let cached_state = Self::collect(&roots);

        Self {
            roots,
            scan_interval,
            last_scan: None,
            cached_state,
        }
    }

    /// Check if enough time has elapsed since the last scan
    pub fn should_scan(&self) -> bool {
        match self.last_scan {
            Some(last) => last.elapsed() >= self.scan_interval,
            None => true,
        }
    }

    /// Rescan every root and update the cache
    pub fn scan_changes(&mut self) -> ScanResult {
        self.last_scan = Some(Instant::now());

        let current_state = Self::collect(&self.roots);
        let mut result = ScanResult::default();

        for (path, modified_time) in &current_state {
            match self.cached_state.get(path) {
                Some(cached_time) if cached_time != modified_time => {
                    debug!(target: "scripting", "Script changed: {}", path.display());
                    result.changed.push((path.clone(), *modified_time));
                }
                Some(_) => {}
                None => {
                    debug!(target: "scripting", "Script added: {}", path.display());
                    result.added.push(path.clone());
                }
            }
        }

        for path in self.cached_state.keys() {
            if !current_state.contains_key(path) {
                debug!(target: "scripting", "Script removed: {}", path.display());
                result.removed.push(path.clone());
            }
        }

        self.cached_state = current_state;
        result
    }

    /// Number of files being watched
    pub fn watched(&self) -> usize {
        self.cached_state.len()
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    fn collect(roots: &[PathBuf]) -> HashMap<PathBuf, SystemTime> {
        let mut scripts = HashMap::new();
        for root in roots {
            Self::walk(root, &mut scripts);
        }
        scripts
    }

    fn walk(dir: &Path, scripts: &mut HashMap<PathBuf, SystemTime>) {
        if !dir.exists() {
            return;
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    target: "scripting",
                    "Failed to read script directory {}: {}",
                    dir.display(),
                    e
                );
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();

            if path.is_dir() {
                Self::walk(&path, scripts);
                continue;
            }

            if path.extension().and_then(|s| s.to_str()) != Some("lua") {
                continue;
            }

            match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified_time) => {
                    scripts.insert(path, modified_time);
                }
                Err(e) => {
                    warn!(
                        target: "scripting",
                        "Failed to read metadata for {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn package(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        File::create(dir.join("__init__.lua")).unwrap();
        dir
    }

    #[test]
    fn test_should_scan_timing() {
        let temp_dir = TempDir::new().unwrap();
        let mut scanner = PackageScanner::with_interval(
            vec![temp_dir.path().to_path_buf()],
            Duration::from_millis(50),
        );
        assert_eq!(scanner.scan_interval(), Duration::from_millis(50));

        assert!(scanner.should_scan());
        scanner.scan_changes();
        assert!(!scanner.should_scan());

        std::thread::sleep(Duration::from_millis(60));
        assert!(scanner.should_scan());
    }

    #[test]
    fn test_existing_files_are_not_added() {
        let temp_dir = TempDir::new().unwrap();
        package(temp_dir.path(), "hud");

        let mut scanner = PackageScanner::new(vec![temp_dir.path().to_path_buf()]);
        assert_eq!(scanner.watched(), 1);
        assert!(!scanner.scan_changes().has_changes());
    }

    #[test]
    fn test_detect_added_and_removed_in_packages() {
        let temp_dir = TempDir::new().unwrap();
        let hud = package(temp_dir.path(), "hud");
        let mut scanner = PackageScanner::new(vec![temp_dir.path().to_path_buf()]);

        let nested = hud.join("widgets");
        fs::create_dir_all(&nested).unwrap();
        File::create(nested.join("bar.lua")).unwrap();
        File::create(nested.join("notes.txt")).unwrap();

        let result = scanner.scan_changes();
        assert_eq!(result.added, vec![nested.join("bar.lua")]);

        fs::remove_file(hud.join("__init__.lua")).unwrap();
        let result = scanner.scan_changes();
        assert_eq!(result.removed, vec![hud.join("__init__.lua")]);
        assert!(result.added.is_empty());
    }

    #[test]
    fn test_detect_modified_script() {
        let temp_dir = TempDir::new().unwrap();
        let hud = package(temp_dir.path(), "hud");
        let mut scanner = PackageScanner::new(vec![temp_dir.path().to_path_buf()]);

        std::thread::sleep(Duration::from_millis(20));
        let script = hud.join("__init__.lua");
        let mut file = File::create(&script).unwrap();
        file.write_all(b"print('changed')").unwrap();
        file.sync_all().unwrap();
        let modified = SystemTime::now() + Duration::from_secs(5);
        file.set_modified(modified).unwrap();

        let result = scanner.scan_changes();
        assert_eq!(result.changed.len(), 1);
        assert_eq!(result.changed[0].0, script);
    }

    #[test]
    fn test_handles_missing_directory() {
        let mut scanner =
            PackageScanner::new(vec![PathBuf::from("/tmp/this_does_not_exist_12345")]);
        assert!(!scanner.scan_changes().has_changes());
        assert_eq!(scanner.watched(), 0);
    }
}
