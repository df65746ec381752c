use crate::error::Result;
use crate::services::store::StoreChanges;
use crate::services::WindowCoordinator;
use std::sync::Arc;
use tracing::{debug, info};

use super::r#trait::RegistryTask;

/// Доставляет уведомления хранилища в координатор
pub struct NotificationPump {
    coordinator: Arc<WindowCoordinator>,
    changes: StoreChanges,
}

impl NotificationPump {
    pub fn new(coordinator: Arc<WindowCoordinator>, changes: StoreChanges) -> Self {
        Self {
            coordinator,
            changes,
        }
    }

    async fn run_impl(mut self) -> Result<()> {
        info!("NotificationPump запущен");

        while let Some(change) = self.changes.recv().await {
            self.coordinator.handle_store_change(change);
        }

        debug!("Канал уведомлений закрыт, NotificationPump завершается");
        Ok(())
    }
}

#[async_trait::async_trait]
impl RegistryTask for NotificationPump {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}

/// Выбросить накопившиеся уведомления. `register` всё равно читает хранилище заново,
/// а устаревшее уведомление после регистрации затёрло бы свежий снимок.
pub fn discard_pending(changes: &mut StoreChanges) -> usize {
    let mut discarded = 0;
    while changes.try_recv().is_ok() {
        discarded += 1;
    }
    if discarded > 0 {
        debug!("Отброшено {} уведомлений до регистрации", discarded);
    }
    discarded
}
