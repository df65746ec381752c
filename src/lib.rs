//! Общий реестр окон поверх разделяемого key-value хранилища.
//!
//! Каждый процесс регистрируется в реестре с уникальным id, публикует свою геометрию
//! и узнаёт о соседях через уведомления хранилища. Прямого канала между процессами нет.

pub mod config;
pub mod error;
pub mod events;
pub mod services;
pub mod utils;

pub use error::{RegistryError, Result};
pub use events::{ParticipantRecord, RegistryEvent, RegistrySnapshot, Shape};
pub use services::{CoordinatorState, WindowCoordinator};
