//! # Segment Storage Module
//!
//! Rotating append-only segment files shared by the telemetry and
//! diagnostic writers.
//!
//! This module handles:
//! - Directory bootstrap and recovery of existing index-named segments
//! - Size-based rotation with a strict sliding retention window
//! - One-time rename of the active segment once the clock is trusted
//! - Read-back of persisted segments for the HTTP layer
//!
//! A store that fails its directory bootstrap becomes permanently
//! disabled: every later write is a counted no-op so producers never
//! see storage failures.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::error::Result;

/// Naming and retention parameters for one segment namespace.
///
/// Two instances exist in practice: telemetry (`""` prefix, 4 digits,
/// `jsonl`) and diagnostics (`"log_"` prefix, 3 digits, `txt`).
#[derive(Debug, Clone)]
pub struct SegmentStoreConfig {
    /// Directory holding this namespace's segments
    pub dir: PathBuf,
    /// Literal filename prefix before the index digits
    pub file_prefix: String,
    /// Zero-padded width of the index portion
    pub index_digits: usize,
    /// Extension without the dot
    pub extension: String,
    /// Rotation threshold, compared against the pre-write size
    pub max_segment_bytes: u64,
    /// Retention window: number of most-recent segments kept
    pub max_segments: u64,
}

impl SegmentStoreConfig {
    fn index_file_name(&self, index: u64) -> String {
        format!(
            "{}{:0width$}.{}",
            self.file_prefix,
            index,
            self.extension,
            width = self.index_digits
        )
    }

    fn index_path(&self, index: u64) -> PathBuf {
        self.dir.join(self.index_file_name(index))
    }

    /// Extracts the segment index from an index-named file. Renamed
    /// (timestamp-stem) segments and foreign files return `None`.
    fn parse_segment_index(&self, name: &str) -> Option<u64> {
        let stem = name
            .strip_prefix(self.file_prefix.as_str())?
            .strip_suffix(self.extension.as_str())?
            .strip_suffix('.')?;
        if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        stem.parse().ok()
    }
}

/// Lifecycle of one segment namespace.
///
/// `Disabled` is terminal: it is only entered when the directory
/// bootstrap fails, and nothing transitions out of it.
#[derive(Debug)]
enum StoreState {
    Active {
        /// Monotonic index of the segment currently being written
        index: u64,
        /// Current path of the active segment (changes after rename)
        path: PathBuf,
        /// Bytes written to the active segment this process
        size: u64,
        /// Live segments on disk, keyed by index
        segments: BTreeMap<u64, PathBuf>,
    },
    Disabled,
}

/// Append-only segment writer with rotation, retention and read-back.
///
/// Writes go to one active segment until its pre-write size exceeds
/// `max_segment_bytes`; rotation then advances the index, evicts the
/// segment that fell out of the retention window and starts a fresh
/// file. All I/O failures stay inside the store: they are logged and
/// counted, never surfaced to producers.
#[derive(Debug)]
pub struct SegmentStore {
    config: SegmentStoreConfig,
    state: StoreState,
    dropped_writes: u64,
}

impl SegmentStore {
    /// Opens the namespace directory, recovering any index-named
    /// segments left by earlier runs.
    ///
    /// The active index starts one past the highest recovered index so
    /// each process writes a fresh segment. Bootstrap failure disables
    /// the store permanently; this is reported here once and never
    /// again.
    #[must_use]
    pub fn open(config: SegmentStoreConfig) -> Self {
        match Self::bootstrap(&config) {
            Ok(state) => {
                if let StoreState::Active { index, segments, .. } = &state {
                    info!(
                        dir = %config.dir.display(),
                        active_index = index,
                        recovered = segments.len(),
                        "Segment store ready"
                    );
                }
                Self {
                    config,
                    state,
                    dropped_writes: 0,
                }
            }
            Err(err) => {
                error!(
                    dir = %config.dir.display(),
                    error = %err,
                    "Segment store bootstrap failed, writes disabled"
                );
                Self {
                    config,
                    state: StoreState::Disabled,
                    dropped_writes: 0,
                }
            }
        }
    }

    fn bootstrap(config: &SegmentStoreConfig) -> Result<StoreState> {
        fs::create_dir_all(&config.dir)?;

        let mut segments = BTreeMap::new();
        for entry in fs::read_dir(&config.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(index) = config.parse_segment_index(name) {
                segments.insert(index, entry.path());
            }
        }

        // Trim recovered segments down to the retention window before
        // any new writes land
        while segments.len() as u64 > config.max_segments {
            let Some(&oldest) = segments.keys().next() else {
                break;
            };
            if let Some(path) = segments.remove(&oldest) {
                remove_segment_file(&path);
            }
        }

        let index = segments.keys().next_back().map_or(0, |max| max + 1);
        let path = config.index_path(index);
        Ok(StoreState::Active {
            index,
            path,
            size: 0,
            segments,
        })
    }

    /// Appends one payload to the active segment, rotating first when
    /// the segment is already past its size threshold.
    ///
    /// The size check runs before the write, so a single payload may
    /// carry the segment past the threshold; rotation then happens on
    /// the next append. On a disabled store this is a counted no-op.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the active file cannot be
    /// opened or written. The store stays usable; callers log and skip.
    pub fn append(&mut self, payload: &[u8]) -> Result<()> {
        if self.is_disabled() {
            self.dropped_writes += 1;
            return Ok(());
        }

        if self.active_size() > self.config.max_segment_bytes {
            self.rotate();
        }

        let StoreState::Active {
            index,
            path,
            size,
            segments,
        } = &mut self.state
        else {
            return Ok(());
        };

        let mut file = OpenOptions::new().append(true).create(true).open(&*path)?;
        file.write_all(payload)?;
        *size += payload.len() as u64;
        segments.entry(*index).or_insert_with(|| path.clone());
        Ok(())
    }

    /// Advances to the next segment index and evicts lowest-index
    /// segments until the retained set fits the retention window.
    fn rotate(&mut self) {
        let max_segments = self.config.max_segments;
        let StoreState::Active {
            index,
            path,
            size,
            segments,
        } = &mut self.state
        else {
            return;
        };

        let new_index = *index + 1;
        while segments.len() as u64 >= max_segments {
            let Some(&oldest) = segments.keys().next() else {
                break;
            };
            if let Some(old_path) = segments.remove(&oldest) {
                remove_segment_file(&old_path);
            }
        }

        *index = new_index;
        *path = self.config.index_path(new_index);
        *size = 0;
        debug!(index = new_index, "Rotated to new segment");
    }

    /// Renames the active segment to `<stem>.<extension>`.
    ///
    /// If the active file has not been created yet, only the target
    /// path changes and the first append creates the renamed file
    /// directly. Disabled stores ignore the call.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when an on-disk rename fails; the active
    /// path is left unchanged so the caller may retry.
    pub fn rename_active(&mut self, stem: &str) -> Result<()> {
        let target = self
            .config
            .dir
            .join(format!("{stem}.{}", self.config.extension));
        let StoreState::Active {
            index,
            path,
            segments,
            ..
        } = &mut self.state
        else {
            return Ok(());
        };

        if path.exists() {
            fs::rename(&*path, &target)?;
        }
        info!(
            from = %path.display(),
            to = %target.display(),
            "Renamed active segment"
        );
        *path = target.clone();
        if let Some(tracked) = segments.get_mut(index) {
            *tracked = target;
        }
        Ok(())
    }

    /// Highest index with a segment on disk, `None` when the namespace
    /// is empty or disabled.
    #[must_use]
    pub fn latest_index(&self) -> Option<u64> {
        match &self.state {
            StoreState::Active { segments, .. } => segments.keys().next_back().copied(),
            StoreState::Disabled => None,
        }
    }

    /// Full content of the segment at `index`, `None` when no such
    /// segment exists or it cannot be read.
    #[must_use]
    pub fn read(&self, index: u64) -> Option<Bytes> {
        let StoreState::Active { segments, .. } = &self.state else {
            return None;
        };
        let path = segments.get(&index)?;
        match fs::read(path) {
            Ok(data) => Some(Bytes::from(data)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to read segment");
                None
            }
        }
    }

    /// Deletes every file carrying this namespace's extension and
    /// restarts the active segment at index 0.
    ///
    /// Sweeping by extension also catches timestamp-renamed segments
    /// from earlier runs that carry no parsable index. Returns false
    /// when the store is disabled or any deletion fails.
    pub fn clear_all(&mut self) -> bool {
        let suffix = format!(".{}", self.config.extension);
        let StoreState::Active {
            index,
            path,
            size,
            segments,
        } = &mut self.state
        else {
            return false;
        };

        let mut all_removed = true;
        match fs::read_dir(&self.config.dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
                    let name = entry.file_name();
                    let Some(name) = name.to_str() else {
                        continue;
                    };
                    if is_file && name.ends_with(&suffix) {
                        if let Err(err) = fs::remove_file(entry.path()) {
                            warn!(
                                path = %entry.path().display(),
                                error = %err,
                                "Failed to delete segment during clear"
                            );
                            all_removed = false;
                        }
                    }
                }
            }
            Err(err) => {
                warn!(
                    dir = %self.config.dir.display(),
                    error = %err,
                    "Failed to list segment directory during clear"
                );
                all_removed = false;
            }
        }

        segments.clear();
        *index = 0;
        *path = self.config.index_path(0);
        *size = 0;
        info!(dir = %self.config.dir.display(), "Cleared all segments");
        all_removed
    }

    /// Number of live segments on disk.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        match &self.state {
            StoreState::Active { segments, .. } => segments.len(),
            StoreState::Disabled => 0,
        }
    }

    /// Index the next append will write to, `None` when disabled.
    #[must_use]
    pub fn active_index(&self) -> Option<u64> {
        match &self.state {
            StoreState::Active { index, .. } => Some(*index),
            StoreState::Disabled => None,
        }
    }

    /// Writes swallowed because the store is disabled.
    #[must_use]
    pub fn dropped_writes(&self) -> u64 {
        self.dropped_writes
    }

    /// True once the bootstrap has failed. Terminal.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        matches!(self.state, StoreState::Disabled)
    }

    fn active_size(&self) -> u64 {
        match &self.state {
            StoreState::Active { size, .. } => *size,
            StoreState::Disabled => 0,
        }
    }
}

fn remove_segment_file(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "Failed to evict segment");
    } else {
        debug!(path = %path.display(), "Evicted segment");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn telemetry_config(dir: &TempDir, max_bytes: u64, max_segments: u64) -> SegmentStoreConfig {
        SegmentStoreConfig {
            dir: dir.path().to_path_buf(),
            file_prefix: String::new(),
            index_digits: 4,
            extension: "jsonl".to_string(),
            max_segment_bytes: max_bytes,
            max_segments,
        }
    }

    fn syslog_config(dir: &TempDir, max_bytes: u64, max_segments: u64) -> SegmentStoreConfig {
        SegmentStoreConfig {
            dir: dir.path().to_path_buf(),
            file_prefix: "log_".to_string(),
            index_digits: 3,
            extension: "txt".to_string(),
            max_segment_bytes: max_bytes,
            max_segments,
        }
    }

    fn file_names(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    // ==================== Naming Tests ====================

    #[test]
    fn test_telemetry_file_naming() {
        let config = SegmentStoreConfig {
            dir: PathBuf::from("/tmp"),
            file_prefix: String::new(),
            index_digits: 4,
            extension: "jsonl".to_string(),
            max_segment_bytes: 10_000,
            max_segments: 10,
        };
        assert_eq!(config.index_file_name(1), "0001.jsonl");
        assert_eq!(config.index_file_name(42), "0042.jsonl");
    }

    #[test]
    fn test_syslog_file_naming() {
        let dir = TempDir::new().unwrap();
        let config = syslog_config(&dir, 10_000, 10);
        assert_eq!(config.index_file_name(0), "log_000.txt");
        assert_eq!(config.index_file_name(7), "log_007.txt");
    }

    #[test]
    fn test_parse_segment_index() {
        let dir = TempDir::new().unwrap();
        let config = syslog_config(&dir, 10_000, 10);
        assert_eq!(config.parse_segment_index("log_003.txt"), Some(3));
        assert_eq!(config.parse_segment_index("log_xyz.txt"), None);
        assert_eq!(config.parse_segment_index("other_003.txt"), None);
        assert_eq!(config.parse_segment_index("log_003.jsonl"), None);

        let config = telemetry_config(&dir, 10_000, 10);
        assert_eq!(config.parse_segment_index("0001.jsonl"), Some(1));
        // Renamed segments carry no index
        assert_eq!(config.parse_segment_index("2023-10-26_10-30-00.jsonl"), None);
    }

    // ==================== Append & Rotation Tests ====================

    #[test]
    fn test_open_empty_directory_starts_at_zero() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::open(telemetry_config(&dir, 10_000, 10));
        assert_eq!(store.active_index(), Some(0));
        assert_eq!(store.latest_index(), None);
        assert_eq!(store.segment_count(), 0);
        assert!(!store.is_disabled());
    }

    #[test]
    fn test_append_creates_active_file() {
        let dir = TempDir::new().unwrap();
        let mut store = SegmentStore::open(telemetry_config(&dir, 10_000, 10));
        store.append(b"{\"t\":\"x\"}\n").unwrap();

        assert_eq!(file_names(&dir), vec!["0000.jsonl"]);
        assert_eq!(store.latest_index(), Some(0));
        assert_eq!(store.segment_count(), 1);
    }

    #[test]
    fn test_rotation_is_pre_write() {
        let dir = TempDir::new().unwrap();
        let mut store = SegmentStore::open(telemetry_config(&dir, 10, 10));

        // 10 bytes: at threshold but not over it, next write stays
        store.append(b"0123456789").unwrap();
        store.append(b"ab").unwrap();
        assert_eq!(store.active_index(), Some(0));

        // Size is now 12 > 10, so the next append rotates first
        store.append(b"c").unwrap();
        assert_eq!(store.active_index(), Some(1));
        assert_eq!(file_names(&dir), vec!["0000.jsonl", "0001.jsonl"]);
        assert_eq!(fs::read(dir.path().join("0000.jsonl")).unwrap().len(), 12);
        assert_eq!(fs::read(dir.path().join("0001.jsonl")).unwrap(), b"c");
    }

    #[test]
    fn test_single_oversized_record_lands_whole() {
        let dir = TempDir::new().unwrap();
        let mut store = SegmentStore::open(telemetry_config(&dir, 10, 10));

        let big = vec![b'x'; 100];
        store.append(&big).unwrap();
        assert_eq!(store.active_index(), Some(0));
        assert_eq!(fs::read(dir.path().join("0000.jsonl")).unwrap().len(), 100);

        // Overflow is only repaid on the following append
        store.append(b"y").unwrap();
        assert_eq!(store.active_index(), Some(1));
    }

    #[test]
    fn test_eviction_removes_lowest_index() {
        let dir = TempDir::new().unwrap();
        let mut store = SegmentStore::open(telemetry_config(&dir, 4, 3));

        // Each append overfills the segment, so every following append
        // rotates: indices 0..=4 get exactly one record each
        for i in 0..5u8 {
            store.append(format!("XXXXX{i}").as_bytes()).unwrap();
        }

        // new_index 3 evicted 0, new_index 4 evicted 1
        assert_eq!(file_names(&dir), vec!["0002.jsonl", "0003.jsonl", "0004.jsonl"]);
        assert_eq!(store.segment_count(), 3);
        assert_eq!(store.latest_index(), Some(4));
    }

    #[test]
    fn test_open_resumes_after_highest_index() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = SegmentStore::open(telemetry_config(&dir, 4, 10));
            store.append(b"XXXXX").unwrap();
            store.append(b"XXXXX").unwrap();
        }

        let store = SegmentStore::open(telemetry_config(&dir, 4, 10));
        assert_eq!(store.active_index(), Some(2));
        assert_eq!(store.latest_index(), Some(1));
        assert_eq!(store.segment_count(), 2);
    }

    #[test]
    fn test_open_eviction_pass_trims_to_retention() {
        let dir = TempDir::new().unwrap();
        for i in 0..6 {
            fs::write(dir.path().join(format!("{i:04}.jsonl")), b"old").unwrap();
        }

        let store = SegmentStore::open(telemetry_config(&dir, 10_000, 3));
        assert_eq!(store.segment_count(), 3);
        assert_eq!(file_names(&dir), vec!["0003.jsonl", "0004.jsonl", "0005.jsonl"]);
        assert_eq!(store.active_index(), Some(6));
    }

    // ==================== Rename Tests ====================

    #[test]
    fn test_rename_active_moves_file_on_disk() {
        let dir = TempDir::new().unwrap();
        let mut store = SegmentStore::open(telemetry_config(&dir, 10_000, 10));
        store.append(b"line\n").unwrap();

        store.rename_active("2024-02-10_08-15-00").unwrap();
        assert_eq!(file_names(&dir), vec!["2024-02-10_08-15-00.jsonl"]);

        // Later appends keep extending the renamed file
        store.append(b"more\n").unwrap();
        let content = fs::read(dir.path().join("2024-02-10_08-15-00.jsonl")).unwrap();
        assert_eq!(content, b"line\nmore\n");
        assert_eq!(store.latest_index(), Some(0));
    }

    #[test]
    fn test_rename_before_first_write_retargets_only() {
        let dir = TempDir::new().unwrap();
        let mut store = SegmentStore::open(telemetry_config(&dir, 10_000, 10));

        store.rename_active("2024-02-10_08-15-00").unwrap();
        assert!(file_names(&dir).is_empty());

        store.append(b"first\n").unwrap();
        assert_eq!(file_names(&dir), vec!["2024-02-10_08-15-00.jsonl"]);
    }

    #[test]
    fn test_renamed_segment_still_readable_by_index() {
        let dir = TempDir::new().unwrap();
        let mut store = SegmentStore::open(telemetry_config(&dir, 10_000, 10));
        store.append(b"payload").unwrap();
        store.rename_active("2024-02-10_08-15-00").unwrap();

        assert_eq!(store.read(0).unwrap().as_ref(), b"payload");
    }

    // ==================== Read-back Tests ====================

    #[test]
    fn test_read_returns_segment_bytes() {
        let dir = TempDir::new().unwrap();
        let mut store = SegmentStore::open(syslog_config(&dir, 10_000, 10));
        store.append(b"a line\n").unwrap();
        store.append(b"b line\n").unwrap();

        assert_eq!(store.read(0).unwrap().as_ref(), b"a line\nb line\n");
        assert_eq!(store.read(1), None);
        assert_eq!(store.read(99), None);
    }

    #[test]
    fn test_clear_all_resets_to_zero() {
        let dir = TempDir::new().unwrap();
        let mut store = SegmentStore::open(telemetry_config(&dir, 4, 10));
        for _ in 0..3 {
            store.append(b"XXXXX").unwrap();
        }
        store.rename_active("2024-02-10_08-15-00").unwrap();
        assert!(store.segment_count() > 1);

        assert!(store.clear_all());
        assert!(file_names(&dir).is_empty());
        assert_eq!(store.segment_count(), 0);
        assert_eq!(store.latest_index(), None);
        assert_eq!(store.active_index(), Some(0));

        store.append(b"fresh").unwrap();
        assert_eq!(file_names(&dir), vec!["0000.jsonl"]);
    }

    #[test]
    fn test_clear_all_leaves_foreign_extensions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("keep.txt"), b"not ours").unwrap();
        let mut store = SegmentStore::open(telemetry_config(&dir, 10_000, 10));
        store.append(b"x").unwrap();

        assert!(store.clear_all());
        assert_eq!(file_names(&dir), vec!["keep.txt"]);
    }

    // ==================== Disabled Store Tests ====================

    #[test]
    fn test_bootstrap_failure_disables_store() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file, not a directory").unwrap();

        let config = SegmentStoreConfig {
            dir: blocker.join("segments"),
            file_prefix: String::new(),
            index_digits: 4,
            extension: "jsonl".to_string(),
            max_segment_bytes: 10_000,
            max_segments: 10,
        };
        let mut store = SegmentStore::open(config);

        assert!(store.is_disabled());
        assert_eq!(store.active_index(), None);
        assert_eq!(store.latest_index(), None);

        // Writes are swallowed and counted, never errors
        store.append(b"dropped").unwrap();
        store.append(b"dropped").unwrap();
        assert_eq!(store.dropped_writes(), 2);
        assert_eq!(store.read(0), None);
        assert!(!store.clear_all());
        assert!(store.rename_active("2024-02-10_08-15-00").is_ok());
    }
}
