use crate::model::StorageError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// Fingerprints of offers already alerted on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    fingerprints: HashSet<String>,
}

impl SeenSet {
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Adds fingerprints, returning how many were new.
    pub fn merge<I: IntoIterator<Item = String>>(&mut self, fingerprints: I) -> usize {
        let before = self.fingerprints.len();
        self.fingerprints.extend(fingerprints);
        self.fingerprints.len() - before
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    fn sorted(&self) -> Vec<&String> {
        let mut all: Vec<&String> = self.fingerprints.iter().collect();
        all.sort();
        all
    }
}

impl FromIterator<String> for SeenSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self { fingerprints: iter.into_iter().collect() }
    }
}

/// JSON-array file holding the seen set.
pub struct SeenStore {
    path: PathBuf,
}

impl SeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: a missing or corrupt file gives an empty set.
    pub async fn load(&self) -> SeenSet {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent).await {
                warn!("⚠️ Cannot create {}: {}", parent.display(), e);
            }
        }

        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("📂 No seen file at {}, starting empty", self.path.display());
                return SeenSet::default();
            }
            Err(e) => {
                warn!("⚠️ Cannot read {}: {}, starting empty", self.path.display(), e);
                return SeenSet::default();
            }
        };

        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(list) => {
                let set: SeenSet = list.into_iter().collect();
                info!("📂 Loaded {} seen offers", set.len());
                set
            }
            Err(e) => {
                warn!("⚠️ Corrupt seen file {}: {}, starting empty", self.path.display(), e);
                SeenSet::default()
            }
        }
    }

    /// Replaces the whole file through a temp file and rename.
    pub async fn persist(&self, set: &SeenSet) -> Result<(), StorageError> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent).await?;
                parent.to_path_buf()
            }
            None => PathBuf::from("."),
        };

        let body = serde_json::to_vec(&set.sorted())?;
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "seen".into());
        let temp = dir.join(format!(".{}.{:016x}.tmp", file_name, rand::random::<u64>()));

        fs::write(&temp, &body).await?;
        if let Err(e) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_loads_empty_and_creates_directory() {
        let dir = tempdir().expect("tempdir");
        let store = SeenStore::new(dir.path().join("data").join("seen.json"));

        let set = store.load().await;

        assert!(set.is_empty());
        assert!(dir.path().join("data").is_dir());
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("seen.json");
        std::fs::write(&path, "{not json").expect("write");

        assert!(SeenStore::new(&path).load().await.is_empty());
    }

    #[tokio::test]
    async fn persist_round_trips_as_flat_array() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("seen.json");
        let store = SeenStore::new(&path);

        let mut set = SeenSet::default();
        assert_eq!(set.merge(vec!["b".to_string(), "a".to_string(), "a".to_string()]), 2);
        store.persist(&set).await.expect("persist");

        let raw = std::fs::read_to_string(&path).expect("read");
        assert_eq!(raw, r#"["a","b"]"#);
        let reloaded = store.load().await;
        assert_eq!(reloaded, set);
        assert!(reloaded.contains("a"));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .expect("dir")
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn persist_overwrites_previous_content() {
        let dir = tempdir().expect("tempdir");
        let store = SeenStore::new(dir.path().join("seen.json"));

        store.persist(&["old".to_string()].into_iter().collect()).await.expect("first");
        let mut set = store.load().await;
        set.merge(["new".to_string()]);
        store.persist(&set).await.expect("second");

        let reloaded = store.load().await;
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("old") && reloaded.contains("new"));
    }
}
