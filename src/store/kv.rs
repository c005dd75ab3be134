use crate::error::TransitError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Primary local store: one JSON document per collection key, written as a
/// file under `dir`. A total-size quota bounds the store; writes that would
/// push it over the ceiling fail with `QuotaExceeded` so callers can fall
/// back to the secondary store.
#[derive(Debug, Clone)]
pub struct KvStore {
    dir: PathBuf,
    quota_bytes: u64,
}

impl KvStore {
    pub fn open(dir: impl Into<PathBuf>, quota_bytes: u64) -> Result<Self, TransitError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, quota_bytes })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, TransitError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn put(&self, key: &str, value: &str) -> Result<(), TransitError> {
        let path = self.path_for(key);
        let existing = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let needed = self.total_bytes()? - existing + value.len() as u64;
        if needed > self.quota_bytes {
            return Err(TransitError::QuotaExceeded {
                needed,
                quota: self.quota_bytes,
            });
        }

        // Write-then-rename so a crashed write never truncates the old value.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Removing an absent key is not an error.
    pub fn remove(&self, key: &str) -> Result<(), TransitError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn total_bytes(&self) -> Result<u64, TransitError> {
        let mut total = 0u64;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if is_json_file(&entry.path()) {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    }
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        == Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_and_missing_key() {
        let dir = tempdir().unwrap();
        let kv = KvStore::open(dir.path(), 1024).unwrap();

        assert_eq!(kv.get("transport_users").unwrap(), None);
        kv.put("transport_users", r#"[{"id":"1"}]"#).unwrap();
        assert_eq!(
            kv.get("transport_users").unwrap().as_deref(),
            Some(r#"[{"id":"1"}]"#)
        );
    }

    #[test]
    fn quota_is_enforced_across_keys() {
        let dir = tempdir().unwrap();
        let kv = KvStore::open(dir.path(), 32).unwrap();

        kv.put("a", &"x".repeat(20)).unwrap();
        let err = kv.put("b", &"y".repeat(20)).unwrap_err();
        assert!(matches!(err, TransitError::QuotaExceeded { .. }));

        // Rewriting an existing key counts its old size as freed.
        kv.put("a", &"z".repeat(30)).unwrap();
    }

    #[test]
    fn remove_missing_is_ok() {
        let dir = tempdir().unwrap();
        let kv = KvStore::open(dir.path(), 64).unwrap();
        kv.remove("transport_trips").unwrap();
        kv.put("transport_trips", "[]").unwrap();
        kv.remove("transport_trips").unwrap();
        assert_eq!(kv.get("transport_trips").unwrap(), None);
    }
}
