//! JSON snapshot files.
//!
//! Writes go to a sibling `*.tmp` file which is fsynced and renamed over the
//! target, so readers only ever see a complete previous or new snapshot.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::PersistError;

/// Read a snapshot. `Ok(None)` means the file does not exist.
pub fn read_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistError::io(path, e)),
    };
    let value = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| PersistError::format(path, e))?;
    Ok(Some(value))
}

/// Atomically replace the snapshot at `path` with `value`.
pub fn write_snapshot<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| PersistError::format(path, e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
    }

    let tmp = temp_path(path);
    let mut file = File::create(&tmp).map_err(|e| PersistError::io(&tmp, e))?;
    file.write_all(&bytes).map_err(|e| PersistError::io(&tmp, e))?;
    file.sync_all().map_err(|e| PersistError::io(&tmp, e))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| PersistError::io(path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        items: Vec<String>,
        saved_at: u64,
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let got: Option<Doc> = read_snapshot(&dir.path().join("absent.json")).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        let doc = Doc {
            items: vec!["a".into(), "b".into()],
            saved_at: 42,
        };

        write_snapshot(&path, &doc).unwrap();
        assert!(!temp_path(&path).exists());

        let back: Doc = read_snapshot(&path).unwrap().unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn corrupt_file_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, b"{ not json").unwrap();

        let err = read_snapshot::<Doc>(&path).unwrap_err();
        assert!(matches!(err, PersistError::Format { .. }));
    }
}
