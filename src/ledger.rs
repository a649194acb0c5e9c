// src/ledger.rs
//! Seen ledger: the set of `source_key`s that were already posted.
//!
//! Stored as a sorted JSON array. Loading never fails (a missing or corrupt
//! file is an empty ledger); saving goes through a temp file + rename so a
//! half-written ledger is never observed.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_LEDGER_PATH: &str = "posted_ids.json";

#[derive(Debug, Clone)]
pub struct SeenLedger {
    path: PathBuf,
    keys: BTreeSet<String>,
}

impl SeenLedger {
    /// Read the ledger at `path`. Any I/O or parse problem degrades to an empty set.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let keys = match read_keys(&path) {
            Ok(keys) => {
                info!(path = %path.display(), count = keys.len(), "loaded seen ledger");
                keys
            }
            Err(e) => {
                warn!(path = %path.display(), error = ?e, "seen ledger unreadable; starting empty");
                BTreeSet::new()
            }
        };
        Self { path, keys }
    }

    /// In-memory ledger bound to `path`, without touching the disk.
    pub fn with_keys<I, S>(path: impl Into<PathBuf>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Returns `false` if the key was already present.
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keys in the order they are persisted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Persist atomically: write `<path>.tmp`, fsync, rename over `path`.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.keys).context("serializing seen ledger")?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating ledger dir {}", dir.display()))?;
        }

        let tmp = tmp_path(&self.path);
        let res = write_then_rename(&tmp, &self.path, json.as_bytes());
        if res.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        res
    }
}

fn write_then_rename(tmp: &Path, path: &Path, json: &[u8]) -> Result<()> {
    let mut f = fs::File::create(tmp)
        .with_context(|| format!("creating temp ledger {}", tmp.display()))?;
    f.write_all(json)?;
    f.write_all(b"\n")?;
    f.sync_all()?;
    drop(f);

    fs::rename(tmp, path).with_context(|| format!("replacing ledger {}", path.display()))?;
    Ok(())
}

fn read_keys(path: &Path) -> Result<BTreeSet<String>> {
    let s = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let v: Vec<String> = serde_json::from_str(&s).context("parsing seen ledger json")?;
    Ok(v.into_iter().collect())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory in the way makes the final rename fail.
        let p = dir.path().join("posted_ids.json");
        fs::create_dir_all(p.join("blocker")).unwrap();

        let ledger = SeenLedger::with_keys(&p, ["met:1"]);
        assert!(ledger.save().is_err());
        assert!(!tmp_path(&p).exists());
        assert!(p.is_dir(), "existing entry is left alone");
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SeenLedger::load(dir.path().join("nope.json"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("posted_ids.json");
        fs::write(&p, "{not json").unwrap();
        assert!(SeenLedger::load(&p).is_empty());

        fs::write(&p, r#"{"met:1": true}"#).unwrap();
        assert!(SeenLedger::load(&p).is_empty());
    }

    #[test]
    fn save_writes_sorted_array_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("posted_ids.json");
        let mut ledger = SeenLedger::with_keys(&p, ["met:9", "cma:55"]);
        assert!(ledger.insert("cooper:1"));
        assert!(!ledger.insert("met:9"));
        ledger.save().unwrap();

        let raw = fs::read_to_string(&p).unwrap();
        let v: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(v, vec!["cma:55", "cooper:1", "met:9"]);
        assert!(!tmp_path(&p).exists());
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("state/ledger.json");
        SeenLedger::with_keys(&p, ["met:1"]).save().unwrap();
        assert!(SeenLedger::load(&p).contains("met:1"));
    }

    #[test]
    fn tmp_path_sits_next_to_ledger() {
        assert_eq!(
            tmp_path(Path::new("data/posted_ids.json")),
            PathBuf::from("data/posted_ids.json.tmp")
        );
    }
}
