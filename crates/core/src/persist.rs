//! JSON-file persistence shared by every file-backed store.
//!
//! Writes go to a sibling `.tmp` file first and are renamed into place, so a
//! crash mid-write leaves the previous snapshot intact. [`JsonFile`] adds an
//! advisory lock on a sibling `.lock` file: every read sees the latest
//! snapshot on disk and every update is a locked read-modify-write, so several
//! processes (the server and `intake-worker`) can share one data directory.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{IntakeError, Result};

/// Load a JSON document, returning `T::default()` when the file does not exist.
pub fn load_json_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let data = std::fs::read_to_string(path)?;
    if data.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&data)?)
}

/// Atomically replace `path` with the pretty-printed JSON of `value`.
pub fn save_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// A JSON document shared between processes.
///
/// Nothing is cached: [`read`](Self::read) loads the current snapshot under a
/// shared lock and [`update`](Self::update) holds an exclusive lock across
/// load, change and save. A change that returns `Err` is discarded without
/// touching the file.
#[derive(Debug)]
pub struct JsonFile {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = path.with_extension("json.lock");
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_file(&self) -> Result<File> {
        if let Some(parent) = self.lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?)
    }

    /// Current snapshot, or `T::default()` when nothing has been written yet.
    pub fn read<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let lock = self.lock_file()?;
        FileExt::lock_shared(&lock)?;
        // Dropping `lock` closes the handle and releases the lock.
        load_json_or_default(&self.path)
    }

    /// Load, apply `change`, and save only if `change` succeeds.
    pub fn update<T, R, E, F>(&self, change: F) -> std::result::Result<R, E>
    where
        T: Serialize + DeserializeOwned + Default,
        E: From<IntakeError>,
        F: FnOnce(&mut T) -> std::result::Result<R, E>,
    {
        let lock = self.lock_file()?;
        FileExt::lock_exclusive(&lock).map_err(IntakeError::from)?;

        let mut state: T = load_json_or_default(&self.path)?;
        let out = change(&mut state)?;
        save_json(&self.path, &state)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_missing_file_loads_default() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded: Vec<String> = load_json_or_default(&tmp.path().join("nope.json")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("state.json");

        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1u32);
        save_json(&path, &map).unwrap();

        let loaded: BTreeMap<String, u32> = load_json_or_default(&path).unwrap();
        assert_eq!(loaded.get("a"), Some(&1));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_handles_on_one_path_see_each_others_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("shared.json");
        let first = JsonFile::new(&path);
        let second = JsonFile::new(&path);

        first
            .update(|v: &mut Vec<u32>| -> Result<()> {
                v.push(1);
                Ok(())
            })
            .unwrap();
        second
            .update(|v: &mut Vec<u32>| -> Result<()> {
                v.push(2);
                Ok(())
            })
            .unwrap();

        let seen: Vec<u32> = first.read().unwrap();
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_failed_update_leaves_file_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let file = JsonFile::new(tmp.path().join("state.json"));
        file.update(|v: &mut Vec<u32>| -> Result<()> {
            v.push(1);
            Ok(())
        })
        .unwrap();

        let result = file.update(|v: &mut Vec<u32>| -> Result<()> {
            v.push(2);
            Err(IntakeError::Storage("refused".to_string()))
        });
        assert!(result.is_err());
        let seen: Vec<u32> = file.read().unwrap();
        assert_eq!(seen, vec![1]);
    }

    #[test]
    fn test_concurrent_updates_are_serialized() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("counter.json");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    // A fresh handle per thread, as a separate process would have.
                    let file = JsonFile::new(path);
                    for _ in 0..25 {
                        file.update(|n: &mut u64| -> Result<()> {
                            *n += 1;
                            Ok(())
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let total: u64 = JsonFile::new(&path).read().unwrap();
        assert_eq!(total, 100);
    }
}
