//! Persistent key/value storage with change notifications.
//!
//! Change notifications follow the browser storage-event model: a handle
//! never hears about its own writes, only about writes made through other
//! handles (or other processes, for [`FileStore`]). Writing a value equal to
//! the stored one is not a change.

use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use fd_lock::RwLock;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tokio::{
    sync::broadcast::{self, error::RecvError, error::TryRecvError},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::error::StorageError;

const EVENT_CAPACITY: usize = 64;

/// A key changed value somewhere else.
///
/// `key: None` means "anything may have changed" and is emitted when a
/// listener fell behind and missed events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: Option<String>,
    pub new_value: Option<String>,
}

impl StorageEvent {
    pub fn changed(key: &str, new_value: Option<String>) -> Self {
        Self { key: Some(key.to_string()), new_value }
    }

    pub fn resync() -> Self {
        Self { key: None, new_value: None }
    }
}

#[derive(Debug, Clone)]
struct Tagged {
    origin: u64,
    event: StorageEvent,
}

/// Receiving side of a store's change notifications.
#[derive(Debug)]
pub struct StorageEvents {
    rx: broadcast::Receiver<Tagged>,
    origin: u64,
}

impl StorageEvents {
    /// Next change made by someone else. `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(tagged) if tagged.origin == self.origin => continue,
                Ok(tagged) => return Some(tagged.event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "storage listener lagged, requesting full resync");
                    return Some(StorageEvent::resync());
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(tagged) if tagged.origin == self.origin => continue,
                Ok(tagged) => return Some(tagged.event),
                Err(TryRecvError::Lagged(_)) => return Some(StorageEvent::resync()),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

/// String key/value persistence shared by every view of the application.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn subscribe(&self) -> StorageEvents;
}

#[derive(Debug)]
struct MemoryShared {
    entries: Mutex<BTreeMap<String, String>>,
    events: broadcast::Sender<Tagged>,
    next_origin: AtomicU64,
}

/// In-process store. Each [`context`](MemoryStore::context) is a separate
/// observer over the same entries, like two tabs of one origin.
#[derive(Debug)]
pub struct MemoryStore {
    shared: Arc<MemoryShared>,
    origin: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(MemoryShared {
            entries: Mutex::new(BTreeMap::new()),
            events,
            next_origin: AtomicU64::new(1),
        });
        Self { shared, origin: 0 }
    }

    /// Another handle over the same entries.
    pub fn context(&self) -> Self {
        let origin = self.shared.next_origin.fetch_add(1, Ordering::Relaxed);
        Self { shared: Arc::clone(&self.shared), origin }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.shared.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        {
            let mut entries = self.shared.entries.lock();
            if entries.get(key).map(String::as_str) == Some(value) {
                return Ok(());
            }
            entries.insert(key.to_string(), value.to_string());
        }

        let tagged = Tagged {
            origin: self.origin,
            event: StorageEvent::changed(key, Some(value.to_string())),
        };
        // No receivers is fine.
        let _ = self.shared.events.send(tagged);
        Ok(())
    }

    fn subscribe(&self) -> StorageEvents {
        StorageEvents { rx: self.shared.events.subscribe(), origin: self.origin }
    }
}

// Origins for FileStore notifications: the watcher publishes, handles listen.
const FILE_WATCHER_ORIGIN: u64 = 0;
const FILE_HANDLE_ORIGIN: u64 = 1;

#[derive(Debug)]
struct FileInner {
    path: PathBuf,
    /// What this process last wrote or observed, per key.
    last_seen: Mutex<BTreeMap<String, String>>,
    events: broadcast::Sender<Tagged>,
}

/// Store persisted as a flat TOML table of strings.
///
/// Every `get` re-reads the file, so writes by other processes are visible
/// immediately; [`spawn_watcher`](FileStore::spawn_watcher) turns them into
/// [`StorageEvent`]s.
#[derive(Debug, Clone)]
pub struct FileStore {
    inner: Arc<FileInner>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`. A malformed file is
    /// tolerated: reads fall back to defaults and the next write replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let snapshot = match read_entries(&path) {
            Ok(entries) => entries,
            Err(err @ StorageError::Format { .. }) => {
                warn!(error = %err, "ignoring malformed preferences file");
                BTreeMap::new()
            }
            Err(err) => return Err(err),
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(FileInner {
                path,
                last_seen: Mutex::new(snapshot),
                events,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Compare the file with what this process last saw and publish an
    /// event for every key that differs.
    pub fn poll_changes(&self) -> Result<Vec<StorageEvent>, StorageError> {
        poll_inner(&self.inner)
    }

    /// Poll the file every `interval` until the store is dropped.
    pub fn spawn_watcher(&self, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<FileInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    debug!("file store dropped, watcher exiting");
                    break;
                };
                if let Err(err) = poll_inner(&inner) {
                    warn!(error = %err, "failed to poll preferences file");
                }
            }
        })
    }
}

fn poll_inner(inner: &FileInner) -> Result<Vec<StorageEvent>, StorageError> {
    let current = read_entries(&inner.path)?;
    let mut last_seen = inner.last_seen.lock();

    let mut changed = Vec::new();
    for (key, value) in &current {
        if last_seen.get(key) != Some(value) {
            changed.push(StorageEvent::changed(key, Some(value.clone())));
        }
    }
    for key in last_seen.keys() {
        if !current.contains_key(key) {
            changed.push(StorageEvent::changed(key, None));
        }
    }
    *last_seen = current;
    drop(last_seen);

    for event in &changed {
        debug!(key = ?event.key, "external preference change detected");
        let _ = inner.events.send(Tagged { origin: FILE_WATCHER_ORIGIN, event: event.clone() });
    }

    Ok(changed)
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(read_entries(&self.inner.path)?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // In-process writers serialize here, other processes on the lock file.
        let mut last_seen = self.inner.last_seen.lock();
        let mut lock = RwLock::new(open_lock_file(&self.inner.path)?);
        let _guard = lock.write().map_err(|e| io_error(&self.inner.path, e))?;

        let mut entries = match read_entries(&self.inner.path) {
            Ok(entries) => entries,
            Err(err @ StorageError::Format { .. }) => {
                warn!(error = %err, "rewriting malformed preferences file");
                BTreeMap::new()
            }
            Err(err) => return Err(err),
        };

        if entries.get(key).map(String::as_str) != Some(value) {
            entries.insert(key.to_string(), value.to_string());
            write_entries(&self.inner.path, &entries)?;
        }

        // Only this key: other keys changed on disk must still be reported.
        last_seen.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn subscribe(&self) -> StorageEvents {
        StorageEvents { rx: self.inner.events.subscribe(), origin: FILE_HANDLE_ORIGIN }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io { path: path.display().to_string(), source }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, String>, StorageError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(io_error(path, err)),
    };

    let table: toml::Table = toml::from_str(&contents).map_err(|e| StorageError::Format {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    // Hand edits may store numbers unquoted; keep scalars as their text form.
    let entries = table
        .into_iter()
        .filter_map(|(key, value)| {
            let text = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                _ => return None,
            };
            Some((key, text))
        })
        .collect();

    Ok(entries)
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

/// Sidecar file whose exclusive lock guards read-modify-write across processes.
fn open_lock_file(path: &Path) -> Result<File, StorageError> {
    let parent = parent_dir(path);
    fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;

    let lock_path = path.with_extension("toml.lock");
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|e| io_error(&lock_path, e))
}

fn write_entries(path: &Path, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
    let contents = toml::to_string(entries).map_err(|e| StorageError::Format {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let parent = parent_dir(path);
    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| io_error(parent, e))?;
    tmp.write_all(contents.as_bytes()).map_err(|e| io_error(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| io_error(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_contexts_share_entries() {
        let a = MemoryStore::new();
        let b = a.context();

        a.set("weather:units", "f").unwrap();
        assert_eq!(b.get("weather:units").unwrap().as_deref(), Some("f"));
        assert_eq!(b.get("missing").unwrap(), None);
    }

    #[test]
    fn memory_events_reach_other_contexts_only() {
        let a = MemoryStore::new();
        let b = a.context();
        let mut a_events = a.subscribe();
        let mut b_events = b.subscribe();

        a.set("weather:units", "f").unwrap();

        assert_eq!(
            b_events.try_recv(),
            Some(StorageEvent::changed("weather:units", Some("f".into())))
        );
        assert_eq!(a_events.try_recv(), None);
    }

    #[test]
    fn rewriting_same_value_emits_nothing() {
        let a = MemoryStore::new();
        let b = a.context();
        let mut b_events = b.subscribe();

        a.set("weather:days", "5").unwrap();
        a.set("weather:days", "5").unwrap();

        assert!(b_events.try_recv().is_some());
        assert_eq!(b_events.try_recv(), None);
    }

    #[test]
    fn lagging_listener_gets_resync() {
        let a = MemoryStore::new();
        let b = a.context();
        let mut b_events = b.subscribe();

        for i in 0..(EVENT_CAPACITY + 8) {
            a.set("weather:days", &i.to_string()).unwrap();
        }

        assert_eq!(b_events.try_recv(), Some(StorageEvent::resync()));
    }

    #[tokio::test]
    async fn recv_ends_when_store_is_dropped() {
        let a = MemoryStore::new();
        let mut events = a.context().subscribe();
        drop(a);
        assert_eq!(events.recv().await, None);
    }

    #[test]
    fn file_store_round_trips_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("prefs.toml");

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("app:theme").unwrap(), None);

        store.set("app:theme", "dark").unwrap();
        store.set("weather:days", "5").unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("app:theme").unwrap().as_deref(), Some("dark"));
        assert_eq!(reopened.get("weather:days").unwrap().as_deref(), Some("5"));
    }

    #[test]
    fn file_store_sees_other_writers_on_get() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        let a = FileStore::open(&path).unwrap();
        let b = FileStore::open(&path).unwrap();

        a.set("weather:units", "f").unwrap();
        assert_eq!(b.get("weather:units").unwrap().as_deref(), Some("f"));
    }

    #[test]
    fn poll_reports_external_changes_but_not_own_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        let a = FileStore::open(&path).unwrap();
        let b = FileStore::open(&path).unwrap();
        let mut b_events = b.subscribe();

        b.set("app:theme", "light").unwrap();
        assert!(b.poll_changes().unwrap().is_empty());

        a.set("weather:units", "f").unwrap();
        let changes = b.poll_changes().unwrap();
        assert_eq!(changes, vec![StorageEvent::changed("weather:units", Some("f".into()))]);
        assert_eq!(
            b_events.try_recv(),
            Some(StorageEvent::changed("weather:units", Some("f".into())))
        );

        assert!(b.poll_changes().unwrap().is_empty());
    }

    #[test]
    fn unquoted_numbers_are_read_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        fs::write(&path, "\"weather:days\" = 4\n").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("weather:days").unwrap().as_deref(), Some("4"));
    }

    #[test]
    fn malformed_file_errors_on_get_and_is_replaced_on_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(matches!(store.get("app:theme"), Err(StorageError::Format { .. })));
        store.set("app:theme", "dark").unwrap();
        assert_eq!(store.get("app:theme").unwrap().as_deref(), Some("dark"));
    }

    #[tokio::test]
    async fn watcher_publishes_external_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        let local = FileStore::open(&path).unwrap();
        let other = FileStore::open(&path).unwrap();
        let mut events = local.subscribe();

        let handle = local.spawn_watcher(Duration::from_millis(10));
        other.set("weather:days", "6").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("watcher should report the change");
        assert_eq!(event, Some(StorageEvent::changed("weather:days", Some("6".into()))));

        handle.abort();
    }

    #[test]
    fn concurrent_writers_keep_each_others_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");

        // Separate handles share no in-process state, like separate processes.
        let writers: Vec<_> = ["weather:units", "weather:days"]
            .into_iter()
            .map(|key| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store = FileStore::open(&path).unwrap();
                    for n in 0..50 {
                        store.set(key, &n.to_string()).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let reader = FileStore::open(&path).unwrap();
        assert_eq!(reader.get("weather:units").unwrap().as_deref(), Some("49"));
        assert_eq!(reader.get("weather:days").unwrap().as_deref(), Some("49"));

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name != "prefs.toml" && name != "prefs.toml.lock")
            .collect();
        assert!(leftovers.is_empty(), "stray temp files: {leftovers:?}");
    }
}
