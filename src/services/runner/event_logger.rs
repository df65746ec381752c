use crate::error::Result;
use crate::events::{RegistryEvent, RegistryEventKind};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use super::r#trait::RegistryTask;

/// Простейший потребитель реестра: вместо отрисовки пишет раскладку участников в лог
pub struct EventLogger {
    events: UnboundedReceiver<RegistryEvent>,
}

impl EventLogger {
    pub fn new(events: UnboundedReceiver<RegistryEvent>) -> Self {
        Self { events }
    }

    async fn run_impl(mut self) -> Result<()> {
        while let Some(event) = self.events.recv().await {
            match &event.kind {
                RegistryEventKind::MembershipChanged(snapshot) => {
                    info!("Участников: {}", snapshot.len());
                    for (index, record) in snapshot.iter().enumerate() {
                        let (cx, cy) = record.shape.center();
                        info!("  [{}] id {} центр ({:.0}, {:.0}) {}", index, record.id, cx, cy, record.shape);
                    }
                }
                RegistryEventKind::ShapeChanged(shape) => {
                    info!("Собственное окно: {}", shape);
                }
            }
            debug!("Событие обработано: {}", event);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RegistryTask for EventLogger {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
