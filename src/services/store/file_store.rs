use crate::error::{RegistryError, Result};
use crate::registry_error;
use crate::trace_if_enabled;
use dashmap::DashSet;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;
use tokio::time::interval;
use tracing::{debug, info, warn};

use super::r#trait::{SharedStore, StoreChange, StoreChanges};

/// Хранилище в каталоге на диске: один файл на ключ.
///
/// Годится для нескольких процессов одного хоста. Уведомления строятся опросом
/// каталога, собственные записи процесса из них вырезаются.
///
/// Каждый файл начинается строкой `#writer <писатель>/<номер>`, дальше идёт значение.
/// По ней опрос отличает свою запись от чужой, даже если байты значения совпадают.
#[derive(Clone)]
pub struct FileStore {
    inner: Arc<FileStoreInner>,
}

struct FileStoreInner {
    dir: PathBuf,
    // pid.номер_хэндла: уникален среди открытых хранилищ хоста
    writer_id: String,
    // Ключи, удалённые нами и ещё не замеченные опросом
    own_removals: DashSet<String>,
    write_seq: AtomicU64,
}

const WRITER_HEADER: &str = "#writer ";

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(0);

/// Содержимое файла ключа: кто записал и что
#[derive(Debug, PartialEq, Eq)]
struct KeyFile<'a> {
    writer: Option<&'a str>,
    value: &'a str,
}

impl<'a> KeyFile<'a> {
    /// Файл без заголовка (записан руками или чужим инструментом) целиком считается значением
    fn decode(raw: &'a str) -> Self {
        if let Some(rest) = raw.strip_prefix(WRITER_HEADER) {
            if let Some((tag, value)) = rest.split_once('\n') {
                let writer = tag.rsplit_once('/').map(|(writer, _)| writer).unwrap_or(tag);
                return Self {
                    writer: Some(writer),
                    value,
                };
            }
        }
        Self {
            writer: None,
            value: raw,
        }
    }
}

impl FileStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            registry_error!(store_unavailable, "не удалось создать каталог {}: {}", dir.display(), e)
        })?;
        info!("FileStore открыт в {}", dir.display());

        let writer_id = format!(
            "{}.{}",
            process::id(),
            NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
        );
        debug!("FileStore: писатель {}", writer_id);

        Ok(Self {
            inner: Arc::new(FileStoreInner {
                dir,
                writer_id,
                own_removals: DashSet::new(),
                write_seq: AtomicU64::new(0),
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(registry_error!(invalid_key, "{:?}", key));
        }
        Ok(self.inner.dir.join(key))
    }

    fn read_key_file(path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(registry_error!(
                store_unavailable,
                "не удалось прочитать {}: {}",
                path.display(),
                e
            )),
        }
    }

    /// Запись через временный файл и rename, чтобы читатели не видели половину значения
    fn write_atomic(&self, path: &Path, value: &str) -> std::io::Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("value");
        let seq = self.inner.write_seq.fetch_add(1, Ordering::Relaxed);
        let temp_path = self
            .inner
            .dir
            .join(format!(".{}.{}.{}.tmp", file_name, self.inner.writer_id, seq));

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;
            write!(file, "{}{}/{}\n", WRITER_HEADER, self.inner.writer_id, seq)?;
            file.write_all(value.as_bytes())?;
            file.flush()?;
        }

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(())
    }

    /// Текущее содержимое каталога: ключ -> сырое содержимое файла (с заголовком)
    fn scan(&self) -> Result<HashMap<String, String>> {
        let entries = fs::read_dir(&self.inner.dir).map_err(|e| {
            registry_error!(
                store_unavailable,
                "не удалось прочитать каталог {}: {}",
                self.inner.dir.display(),
                e
            )
        })?;

        let mut values = HashMap::new();
        for entry in entries {
            let entry = entry?;
            let Some(key) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            // Временные файлы других писателей
            if key.starts_with('.') {
                continue;
            }
            if let Some(value) = Self::read_key_file(&entry.path())? {
                values.insert(key, value);
            }
        }
        Ok(values)
    }

    /// Сравнить каталог с последним увиденным состоянием и вернуть чужие изменения
    fn poll_changes(&self, last_seen: &mut HashMap<String, String>) -> Result<Vec<StoreChange>> {
        let current = self.scan()?;
        let mut changes = Vec::new();

        for (key, raw) in &current {
            if last_seen.get(key) == Some(raw) {
                continue;
            }
            last_seen.insert(key.clone(), raw.clone());
            // Ключ снова существует: наше прежнее удаление уже неактуально
            self.inner.own_removals.remove(key);

            let file = KeyFile::decode(raw);
            if file.writer == Some(self.inner.writer_id.as_str()) {
                trace_if_enabled!("FileStore: пропускаем собственную запись ключа '{}'", key);
                continue;
            }
            changes.push(StoreChange::new(key.clone(), Some(file.value.to_string())));
        }

        let removed: Vec<String> = last_seen
            .keys()
            .filter(|key| !current.contains_key(*key))
            .cloned()
            .collect();
        for key in removed {
            last_seen.remove(&key);
            if self.inner.own_removals.remove(&key).is_some() {
                continue;
            }
            changes.push(StoreChange::new(key, None));
        }

        Ok(changes)
    }

    /// Запустить опрос каталога. Задача живёт, пока жив получатель уведомлений.
    pub fn watch(&self, poll_interval: Duration) -> StoreChanges {
        let (tx, rx) = unbounded_channel();
        let store = self.clone();

        let mut last_seen = match store.scan() {
            Ok(values) => values,
            Err(e) => {
                warn!("FileStore: начальное сканирование не удалось: {}", e);
                HashMap::new()
            }
        };

        tokio::spawn(async move {
            debug!(
                "FileStore: опрос {} каждые {}мс",
                store.dir().display(),
                poll_interval.as_millis()
            );
            let mut ticker = interval(poll_interval);

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }

                match store.poll_changes(&mut last_seen) {
                    Ok(changes) => {
                        for change in changes {
                            debug!("FileStore: внешнее изменение ключа '{}'", change.key);
                            if tx.send(change).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => warn!("FileStore: ошибка опроса: {}", e),
                }
            }

            debug!("FileStore: опрос остановлен");
        });

        rx
    }
}

impl SharedStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key)?;
        Ok(Self::read_key_file(&path)?.map(|raw| KeyFile::decode(&raw).value.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key)?;
        self.write_atomic(&path, value).map_err(|e| {
            registry_error!(store_unavailable, "не удалось записать {}: {}", path.display(), e)
        })
    }

    fn clear(&self) -> Result<()> {
        let keys: Vec<String> = self.scan()?.into_keys().collect();
        for key in keys {
            let path = self.key_path(&key)?;
            self.inner.own_removals.insert(key);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(RegistryError::StoreUnavailable(format!(
                        "не удалось удалить {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
        info!("FileStore очищен: {}", self.inner.dir.display());
        Ok(())
    }
}
