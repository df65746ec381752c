use crate::error::{RegistryError, Result};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::debug;

use super::r#trait::{SharedStore, StoreChange, StoreChanges};

/// Хранилище в памяти одного процесса. Каждый подключённый `MemoryStore`
/// изображает отдельного участника.
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    values: RwLock<HashMap<String, String>>,
    peers: DashMap<u64, UnboundedSender<StoreChange>>,
    next_peer: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Подключить нового участника
    pub fn connect(&self) -> (MemoryStore, StoreChanges) {
        let (tx, rx) = unbounded_channel();
        let peer_id = self.inner.next_peer.fetch_add(1, Ordering::Relaxed);
        self.inner.peers.insert(peer_id, tx);
        debug!("MemoryHub: подключён участник {}", peer_id);

        let store = MemoryStore {
            hub: Arc::clone(&self.inner),
            peer_id,
        };
        (store, rx)
    }

    /// Эмуляция отказа хранилища: пока выключено, get/set возвращают StoreUnavailable
    pub fn set_available(&self, available: bool) {
        self.inner.unavailable.store(!available, Ordering::Relaxed);
    }

    /// Прочитать значение в обход участников
    pub fn peek(&self, key: &str) -> Option<String> {
        self.inner.values.read().get(key).cloned()
    }

    pub fn peer_count(&self) -> usize {
        self.inner.peers.len()
    }
}

pub struct MemoryStore {
    hub: Arc<HubInner>,
    peer_id: u64,
}

impl MemoryStore {
    fn check_available(&self) -> Result<()> {
        if self.hub.unavailable.load(Ordering::Relaxed) {
            return RegistryError::store_unavailable("хранилище в памяти отключено");
        }
        Ok(())
    }

    fn notify_others(&self, change: StoreChange) {
        let mut closed = Vec::new();
        for peer in self.hub.peers.iter() {
            if *peer.key() == self.peer_id {
                continue;
            }
            if peer.value().send(change.clone()).is_err() {
                closed.push(*peer.key());
            }
        }
        for peer_id in closed {
            self.hub.peers.remove(&peer_id);
        }
    }
}

impl SharedStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self.hub.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;

        // Держим блокировку на время рассылки, чтобы порядок уведомлений совпадал с порядком записей
        let mut values = self.hub.values.write();
        let previous = values.insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            self.notify_others(StoreChange::new(key, Some(value.to_string())));
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.check_available()?;

        let mut values = self.hub.values.write();
        for (key, _) in values.drain() {
            self.notify_others(StoreChange::new(key, None));
        }
        Ok(())
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        self.hub.peers.remove(&self.peer_id);
    }
}
