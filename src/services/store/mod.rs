//! SharedStore: разделяемое key-value хранилище реестра
//!
//! Модуль отвечает ТОЛЬКО за хранение строковых значений по ключам и доставку
//! уведомлений об изменениях ДРУГИМ участникам. Никакой логики реестра здесь нет:
//! разбором снимков, счётчиком и регистрацией занимается исключительно WindowCoordinator.

mod file_store;
mod memory_store;
mod r#trait;

pub use self::file_store::FileStore;
pub use self::memory_store::{MemoryHub, MemoryStore};
pub use self::r#trait::{
    create_store_backend, SharedStore, StoreBackend, StoreChange, StoreChanges, COUNT_KEY,
    WINDOWS_KEY,
};
