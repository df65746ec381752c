use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{error, info, warn};

use window_registry::config::Config;
use window_registry::events::RegistryEvent;
use window_registry::services::runner::{
    discard_pending, DryRunPeers, EventLogger, NotificationPump, RegistryTask, TickLoop,
};
use window_registry::services::store::SharedStore;
use window_registry::services::{create_shape_source, create_store_backend, WindowCoordinator};

#[derive(Parser, Debug)]
#[command(name = "window-registry")]
#[command(about = "Участник общего реестра окон поверх разделяемого хранилища")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "window-registry.toml")]
    config: String,

    /// Режим сухого запуска (хранилище в памяти, эмуляция окна и соседей)
    #[arg(long)]
    dry_run: bool,

    /// Очистить хранилище и выйти без регистрации
    #[arg(long)]
    clear: bool,

    /// Уровень логирования (перекрывает конфигурацию)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let mut config = Config::load(&args.config)?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
        config.validate()?;
    }

    // Инициализация системы логирования
    init_tracing(&config.logging.level, &config.logging.filter, &config.logging.format)?;

    info!("Запуск window-registry v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - хранилище в памяти, окно и соседи эмулируются");
    }

    let backend = create_store_backend(&config, args.dry_run)?;

    if args.clear {
        let (store, _changes) = backend.connect()?;
        store.clear()?;
        info!("Хранилище очищено");
        return Ok(());
    }

    let (store, mut changes) = backend.connect()?;
    let shape_source = create_shape_source(&config, args.dry_run)?;
    let coordinator = Arc::new(WindowCoordinator::new(store, shape_source));

    // Колбэки не блокируют: события уходят в канал потребителя
    let (event_tx, event_rx) = unbounded_channel::<RegistryEvent>();
    let tx = event_tx.clone();
    coordinator.set_membership_changed_callback(move |snapshot| {
        let _ = tx.send(RegistryEvent::membership_changed(snapshot.clone()));
    });
    let tx = event_tx.clone();
    coordinator.set_shape_changed_callback(move |shape| {
        let _ = tx.send(RegistryEvent::shape_changed(*shape));
    });

    // Уведомления, пришедшие до регистрации или во время неё, могут нести снимок без нас.
    // Сбрасываем их и перечитываем хранилище; дальше очередь разбирает NotificationPump.
    discard_pending(&mut changes);
    let id = coordinator.register(config.metadata.clone())?;
    discard_pending(&mut changes);
    coordinator.resync()?;
    info!("Зарегистрированы с id {}", id);
    let _ = event_tx.send(RegistryEvent::membership_changed(coordinator.get_snapshot()));

    let mut tasks: Vec<(&str, Box<dyn RegistryTask + Send>)> = Vec::new();
    tasks.push(("NotificationPump", Box::new(NotificationPump::new(coordinator.clone(), changes))));
    tasks.push(("TickLoop", Box::new(TickLoop::new(coordinator.clone(), config.tick.interval()))));
    tasks.push(("EventLogger", Box::new(EventLogger::new(event_rx))));
    if args.dry_run {
        tasks.push((
            "DryRunPeers",
            Box::new(DryRunPeers::new(backend.clone(), config.shape.seed_shape())),
        ));
    }

    info!("Все компоненты инициализированы");

    // Запуск всех задач параллельно; ошибка любой из них завершает процесс
    let (fatal_tx, mut fatal_rx) = unbounded_channel::<&str>();
    let handles: Vec<_> = tasks
        .into_iter()
        .map(|(name, task)| {
            let fatal_tx = fatal_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = task.run().await {
                    error!("Ошибка в {}: {}", name, e);
                    let _ = fatal_tx.send(name);
                }
            })
        })
        .collect();

    info!("Все задачи запущены");

    // Ожидание сигнала завершения
    tokio::select! {
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
            Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
        },
        Some(name) = fatal_rx.recv() => {
            error!("Задача {} завершилась с ошибкой, останавливаемся", name);
        }
    }

    info!("Завершение работы...");

    for handle in &handles {
        handle.abort();
    }

    // Снимаемся с регистрации, чтобы соседи убрали наше окно
    if let Err(e) = coordinator.deregister() {
        warn!("Не удалось снять процесс с регистрации: {}", e);
    }

    // Ожидаем завершения задач (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        for handle in handles {
            let _ = handle.await;
        }
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все задачи завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении задач"),
    }

    info!("window-registry завершил работу");
    Ok(())
}

fn init_tracing(level: &str, directives: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let directives = if directives.is_empty() {
        level.to_string()
    } else {
        format!("{},{}", level, directives)
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&directives))?;

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    }

    Ok(())
}
