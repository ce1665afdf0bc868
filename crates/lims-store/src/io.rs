//! File helpers for the JSON store.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, StoreError};

/// Advisory lock on a file, released when dropped.
#[derive(Debug)]
pub(crate) struct FileLock {
    _file: File,
}

/// Block until `path` is locked, exclusively or shared.
///
/// Locks are held per open file, so two handles in one process exclude
/// each other the same way two processes do.
pub(crate) fn lock_file(path: &Path, exclusive: bool) -> Result<FileLock> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StoreError::Io {
            operation: "open",
            path: path.to_path_buf(),
            source: e,
        })?;
    let locked = if exclusive {
        file.lock()
    } else {
        file.lock_shared()
    };
    locked.map_err(|e| StoreError::Io {
        operation: "lock",
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(FileLock { _file: file })
}

/// Write `bytes` to `path` through a temp file and rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("json.tmp");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::Io {
            operation: "create directory",
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let mut file = File::create(&temp_path).map_err(|e| StoreError::Io {
        operation: "create",
        path: temp_path.clone(),
        source: e,
    })?;
    file.write_all(bytes).map_err(|e| StoreError::Io {
        operation: "write",
        path: temp_path.clone(),
        source: e,
    })?;
    file.sync_all().map_err(|e| StoreError::Io {
        operation: "sync",
        path: temp_path.clone(),
        source: e,
    })?;

    fs::rename(&temp_path, path).map_err(|e| StoreError::AtomicWriteFailed {
        temp_path: temp_path.clone(),
        target_path: path.to_path_buf(),
        source: e,
    })?;

    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub(crate) fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut bytes =
        serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialization { source })?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

/// Load a JSON document, or the default when the file does not exist yet.
pub(crate) fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let bytes = fs::read(path).map_err(|e| StoreError::Io {
        operation: "read",
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::InvalidFormat {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a JSON-lines file; blank lines are ignored.
pub(crate) fn load_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).map_err(|e| StoreError::Io {
        operation: "open",
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| StoreError::Io {
            operation: "read",
            path: path.to_path_buf(),
            source: e,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| StoreError::InvalidFormat {
            path: path.to_path_buf(),
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Append records to a JSON-lines file in a single write.
pub(crate) fn append_json_lines<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    let mut buffer = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buffer, record)
            .map_err(|source| StoreError::Serialization { source })?;
        buffer.push(b'\n');
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::Io {
            operation: "open",
            path: path.to_path_buf(),
            source: e,
        })?;
    file.write_all(&buffer).map_err(|e| StoreError::Io {
        operation: "append",
        path: path.to_path_buf(),
        source: e,
    })?;
    file.sync_all().map_err(|e| StoreError::Io {
        operation: "sync",
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("samples.json");
        write_atomic(&path, b"[]").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"[]");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_missing_files_load_empty() {
        let dir = tempdir().unwrap();
        let values: Vec<u32> = load_json(&dir.path().join("absent.json")).unwrap();
        assert!(values.is_empty());
        let lines: Vec<u32> = load_json_lines(&dir.path().join("absent.jsonl")).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_json_lines_append_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        append_json_lines(&path, &[1u32, 2]).unwrap();
        append_json_lines(&path, &[3u32]).unwrap();
        let values: Vec<u32> = load_json_lines(&path).unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_exclusive_lock_blocks_second_handle() {
        use std::sync::mpsc;
        use std::time::Duration;

        let dir = tempdir().unwrap();
        let path = dir.path().join(".lock");
        let held = lock_file(&path, true).unwrap();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let path = path.clone();
            std::thread::spawn(move || {
                let _lock = lock_file(&path, true).unwrap();
                tx.send(()).unwrap();
            })
        };
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(held);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn test_invalid_json_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batches.json");
        fs::write(&path, "{not json").unwrap();
        let err = load_json::<Vec<u32>>(&path).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFormat { .. }));
    }
}
