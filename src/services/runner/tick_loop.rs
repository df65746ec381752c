use crate::error::Result;
use crate::services::WindowCoordinator;
use crate::trace_if_enabled;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use super::r#trait::RegistryTask;

/// Внешний "кадр": раз в `period` даём координатору проверить свою геометрию
pub struct TickLoop {
    coordinator: Arc<WindowCoordinator>,
    period: Duration,
}

impl TickLoop {
    pub fn new(coordinator: Arc<WindowCoordinator>, period: Duration) -> Self {
        Self {
            coordinator,
            period,
        }
    }

    async fn run_impl(self) -> Result<()> {
        info!("TickLoop запущен, период {}мс", self.period.as_millis());

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.coordinator.tick() {
                Ok(changed) => {
                    if changed {
                        trace_if_enabled!("TickLoop: геометрия опубликована");
                    }
                }
                Err(e) => {
                    error!("Ошибка tick: {}", e);
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl RegistryTask for TickLoop {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
