use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::completions::CompletionStore;
use crate::habit::Habit;
use crate::state::TrackerState;

pub const HABITS_KEY: &str = "habit-tracker-habits";
pub const COMPLETIONS_KEY: &str = "habit-tracker-completions";

/// String key/value persistence. A `set` must be visible to the next `get`.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened file store");
        Ok(Self { data_dir })
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            || key.starts_with('.')
        {
            return Err(anyhow!("invalid storage key: {key:?}"));
        }
        Ok(self.data_dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed reading {}", path.display())),
        }
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        write_atomic(&path, value)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed removing {}", path.display())),
        }
    }
}

/// In-process store for tests and embedding hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Typed access to the two persisted collections.
#[derive(Debug)]
pub struct DataStore<S> {
    backend: S,
}

impl<S: KeyValueStore> DataStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    #[tracing::instrument(skip(self))]
    pub fn load_habits(&self) -> anyhow::Result<Vec<Habit>> {
        let habits: Vec<Habit> = load_json(&self.backend, HABITS_KEY)?.unwrap_or_default();
        debug!(count = habits.len(), "loaded habits");
        Ok(habits)
    }

    #[tracing::instrument(skip(self))]
    pub fn load_completions(&self) -> anyhow::Result<CompletionStore> {
        Ok(load_json(&self.backend, COMPLETIONS_KEY)?.unwrap_or_default())
    }

    #[tracing::instrument(skip(self, habits), fields(count = habits.len()))]
    pub fn save_habits(&self, habits: &[Habit]) -> anyhow::Result<()> {
        save_json(&self.backend, HABITS_KEY, habits)
    }

    #[tracing::instrument(skip(self, completions))]
    pub fn save_completions(&self, completions: &CompletionStore) -> anyhow::Result<()> {
        save_json(&self.backend, COMPLETIONS_KEY, completions)
    }

    pub fn load_state(&self) -> anyhow::Result<TrackerState> {
        Ok(TrackerState {
            habits: self.load_habits()?,
            completions: self.load_completions()?,
        })
    }

    /// Completions are written first. If the habits write then fails, flags
    /// for habits that were never stored are ignored on load.
    pub fn save_state(&self, state: &TrackerState) -> anyhow::Result<()> {
        self.save_completions(&state.completions)?;
        self.save_habits(&state.habits)
    }
}

fn load_json<T: DeserializeOwned>(
    backend: &impl KeyValueStore,
    key: &str,
) -> anyhow::Result<Option<T>> {
    let Some(raw) = backend.get(key)? else {
        debug!(key, "key not present; using empty value");
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let value = serde_json::from_str(&raw).with_context(|| format!("failed parsing {key}"))?;
    Ok(Some(value))
}

fn save_json<T: Serialize + ?Sized>(
    backend: &impl KeyValueStore,
    key: &str,
    value: &T,
) -> anyhow::Result<()> {
    let serialized = serde_json::to_string(value)?;
    backend
        .set(key, &serialized)
        .with_context(|| format!("failed to save {key}"))
}

#[tracing::instrument(skip(path, contents))]
fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    debug!(file = %path.display(), bytes = contents.len(), "writing atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn file_store_reads_its_own_writes() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::open(temp.path()).expect("open store");

        assert_eq!(store.get("k").expect("get"), None);
        store.set("k", "one").expect("set");
        assert_eq!(store.get("k").expect("get").as_deref(), Some("one"));
        store.set("k", "two").expect("overwrite");
        assert_eq!(store.get("k").expect("get").as_deref(), Some("two"));
        store.remove("k").expect("remove");
        assert_eq!(store.get("k").expect("get"), None);
        store.remove("k").expect("remove twice");
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::open(temp.path()).expect("open store");
        assert!(store.set("../escape", "x").is_err());
        assert!(store.get("").is_err());
    }

    #[test]
    fn missing_keys_load_empty() {
        let data = DataStore::new(MemoryStore::new());
        assert!(data.load_habits().expect("habits").is_empty());
        assert!(data.load_completions().expect("completions").is_empty());
    }

    #[test]
    fn corrupt_value_is_an_error() {
        let backend = MemoryStore::new();
        backend.set(HABITS_KEY, "{not json").expect("set");
        let data = DataStore::new(backend);
        assert!(data.load_habits().is_err());
    }

    /// Refuses writes to one key, like a full disk would for that file.
    struct RefusingStore {
        inner: MemoryStore,
        refused: &'static str,
    }

    impl KeyValueStore for RefusingStore {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            if key == self.refused {
                return Err(anyhow!("no space left for {key}"));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn save_state_writes_completions_before_habits() {
        let data = DataStore::new(RefusingStore {
            inner: MemoryStore::new(),
            refused: HABITS_KEY,
        });
        let day = chrono::NaiveDate::from_ymd_opt(2026, 10, 17).expect("valid date");
        let state = TrackerState {
            habits: Vec::new(),
            completions: CompletionStore::new().set("h1", day, true),
        };

        assert!(data.save_state(&state).is_err());
        assert!(data.load_completions().expect("completions").is_completed("h1", day));
        assert!(data.load_habits().expect("habits").is_empty());
    }
}
