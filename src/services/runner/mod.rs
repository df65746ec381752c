//! Асинхронная обвязка координатора
//!
//! Задачи здесь только ведут WindowCoordinator: тикают его, доставляют уведомления
//! хранилища и отдают события потребителю. Логики реестра в них нет.

mod dry_run_peers;
mod event_logger;
mod notification_pump;
mod tick_loop;
mod r#trait;

pub use self::dry_run_peers::DryRunPeers;
pub use self::event_logger::EventLogger;
pub use self::notification_pump::{discard_pending, NotificationPump};
pub use self::r#trait::RegistryTask;
pub use self::tick_loop::TickLoop;
