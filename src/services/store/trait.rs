use crate::config::{Config, StoreBackendKind};
use crate::error::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use super::file_store::FileStore;
use super::memory_store::MemoryHub;

/// Ключ с сериализованным снимком реестра
pub const WINDOWS_KEY: &str = "windows";
/// Ключ с последним выданным id
pub const COUNT_KEY: &str = "count";

/// Уведомление об изменении ключа, сделанном другим участником.
/// `new_value == None` означает, что ключ удалён (например, после clear).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
    pub new_value: Option<String>,
}

impl StoreChange {
    pub fn new(key: impl Into<String>, new_value: Option<String>) -> Self {
        Self {
            key: key.into(),
            new_value,
        }
    }
}

/// Поток уведомлений одного участника
pub type StoreChanges = UnboundedReceiver<StoreChange>;

/// Синхронное разделяемое хранилище.
///
/// Контракт: get/set не блокируют надолго; уведомление о `set` получают все
/// остальные участники и никогда сам писатель. Атомарности read-modify-write нет.
pub trait SharedStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Удалить все ключи
    fn clear(&self) -> Result<()>;
}

/// Выбранный бэкенд. Каждый `connect` - отдельный участник со своим потоком уведомлений.
#[derive(Clone)]
pub enum StoreBackend {
    Memory(MemoryHub),
    File {
        path: PathBuf,
        poll_interval: Duration,
    },
}

impl StoreBackend {
    pub fn connect(&self) -> Result<(Arc<dyn SharedStore>, StoreChanges)> {
        match self {
            StoreBackend::Memory(hub) => {
                let (store, changes) = hub.connect();
                Ok((Arc::new(store), changes))
            }
            StoreBackend::File {
                path,
                poll_interval,
            } => {
                let store = FileStore::open(path)?;
                let changes = store.watch(*poll_interval);
                Ok((Arc::new(store), changes))
            }
        }
    }
}

/// Factory function to create the store backend based on config and the dry_run flag
pub fn create_store_backend(config: &Config, dry_run: bool) -> Result<StoreBackend> {
    if dry_run {
        info!("Dry-run: используем хранилище в памяти");
        return Ok(StoreBackend::Memory(MemoryHub::new()));
    }

    match config.store.backend {
        StoreBackendKind::Memory => {
            info!("Используем хранилище в памяти");
            Ok(StoreBackend::Memory(MemoryHub::new()))
        }
        StoreBackendKind::File => {
            info!("Используем файловое хранилище: {}", config.store.path.display());
            Ok(StoreBackend::File {
                path: config.store.path.clone(),
                poll_interval: config.store.poll_interval(),
            })
        }
    }
}
