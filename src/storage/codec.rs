//! Binary serialization capability for tables and module blobs.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, Result};

/// How persisted state is encoded.
///
/// The store treats both as opaque `serialize -> bytes` / `deserialize`
/// pairs. `Json` exists for inspecting a root directory by hand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Codec {
    #[default]
    Bincode,
    Json,
}

impl Codec {
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Codec::Bincode => Ok(bincode::serialize(value)?),
            Codec::Json => Ok(serde_json::to_vec(value)?),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            Codec::Bincode => Ok(bincode::deserialize(bytes)?),
            Codec::Json => Ok(serde_json::from_slice(bytes)?),
        }
    }

    /// Encode and write atomically: a sibling `.tmp` file is written first
    /// and renamed over the target, so a failed save leaves the old file.
    pub fn write_file<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = self.encode(value)?;
        write_atomic(path, &bytes)
    }

    /// Read and decode. `Ok(None)` when the file does not exist.
    pub fn read_file<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match read_blob(path)? {
            Some(bytes) => self.decode(&bytes).map(Some),
            None => Ok(None),
        }
    }
}

/// Raw bytes of a persisted file. `Ok(None)` when it does not exist.
pub(crate) fn read_blob(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn write_tmp(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_sibling(path);
    fs::write(&tmp, bytes)?;
    Ok(tmp)
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = write_tmp(path, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Write a set of files so that none of the targets change unless every
/// payload reached disk: all `.tmp` siblings are written first, and only
/// then renamed over their targets. On a failed write the temporaries are
/// removed and the targets are left as they were.
pub(crate) fn commit_files(files: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    let mut staged = Vec::with_capacity(files.len());
    for (path, bytes) in files {
        match write_tmp(path, bytes) {
            Ok(tmp) => staged.push((tmp, path)),
            Err(e) => {
                let pending = staged.into_iter().chain(std::iter::once((tmp_sibling(path), path)));
                for (tmp, _) in pending {
                    let _ = fs::remove_file(tmp);
                }
                return Err(e);
            }
        }
    }
    for (tmp, path) in staged {
        fs::rename(&tmp, path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeKey, Primitive, NodeId};

    #[test]
    fn test_both_codecs_round_trip_keys() {
        let keys = vec![
            NodeKey::Concept(NodeId(3)),
            NodeKey::Str("Mammal".into()),
            NodeKey::Primitive(Primitive::Float(1.5)),
        ];
        for codec in [Codec::Bincode, Codec::Json] {
            let bytes = codec.encode(&keys).unwrap();
            let back: Vec<NodeKey> = codec.decode(&bytes).unwrap();
            assert_eq!(back, keys);
        }
    }

    #[test]
    fn test_decode_garbage_is_codec_error() {
        let err = Codec::Json.decode::<Vec<NodeKey>>(b"not json").unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }

    #[test]
    fn test_read_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let got: Option<Vec<u64>> = Codec::Bincode.read_file(&dir.path().join("absent")).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn test_write_file_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("blob");
        Codec::Bincode.write_file(&path, &vec![1u64, 2]).unwrap();
        Codec::Bincode.write_file(&path, &vec![3u64]).unwrap();
        let got: Option<Vec<u64>> = Codec::Bincode.read_file(&path).unwrap();
        assert_eq!(got, Some(vec![3]));
    }

    #[test]
    fn test_read_blob_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_blob(&dir.path().join("absent")).unwrap(), None);
        fs::write(dir.path().join("present"), b"abc").unwrap();
        assert_eq!(read_blob(&dir.path().join("present")).unwrap(), Some(b"abc".to_vec()));
    }

    #[test]
    fn test_commit_files_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        fs::write(&first, b"old").unwrap();
        // A directory where a file is expected makes the second write fail.
        let blocked = dir.path().join("blocked");
        fs::create_dir_all(tmp_sibling(&blocked)).unwrap();

        let files = vec![(first.clone(), b"new".to_vec()), (blocked, b"x".to_vec())];
        assert!(commit_files(&files).is_err());
        assert_eq!(fs::read(&first).unwrap(), b"old");
        assert!(!tmp_sibling(&first).exists());

        let files = vec![(first.clone(), b"new".to_vec()), (dir.path().join("m").join("blob"), b"b".to_vec())];
        commit_files(&files).unwrap();
        assert_eq!(fs::read(&first).unwrap(), b"new");
        assert_eq!(fs::read(dir.path().join("m").join("blob")).unwrap(), b"b");
    }
}
