use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::events::Shape;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    pub shape: ShapeConfig,
    pub tick: TickConfig,
    /// Непрозрачные данные, прикладываемые к записи при регистрации
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    /// Дополнительные директивы EnvFilter поверх `level`
    pub filter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendKind {
    File,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub backend: StoreBackendKind,
    /// Каталог файлового хранилища, общий для всех участников
    pub path: PathBuf,
    pub poll_interval_ms: u64,
}

impl StoreConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeSourceKind {
    Fixed,
    Xdotool,
    DryRun,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShapeConfig {
    pub source: ShapeSourceKind,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// X11 id окна для xdotool; без него берётся активное окно
    #[serde(default)]
    pub window_id: Option<String>,
}

impl ShapeConfig {
    /// Начальная (или фиксированная) геометрия
    pub fn seed_shape(&self) -> Shape {
        Shape::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TickConfig {
    pub interval_ms: u64,
}

impl TickConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_metadata() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
                filter: String::new(),
            },
            store: StoreConfig {
                backend: StoreBackendKind::File,
                path: std::env::temp_dir().join("window-registry"),
                poll_interval_ms: 100,
            },
            shape: ShapeConfig {
                source: ShapeSourceKind::Fixed,
                x: 0,
                y: 0,
                width: 800,
                height: 600,
                window_id: None,
            },
            tick: TickConfig { interval_ms: 16 },
            metadata: default_metadata(),
        }
    }
}

impl Config {
    /// Значения по умолчанию, поверх них TOML-файл (если есть), поверх - переменные WINREG_*
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("WINREG_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация хранилища
        if self.store.backend == StoreBackendKind::File && self.store.path.as_os_str().is_empty() {
            anyhow::bail!("store.path не может быть пустым для файлового хранилища");
        }

        if self.store.poll_interval_ms < 10 {
            anyhow::bail!("store.poll_interval_ms должно быть минимум 10");
        }

        // Валидация геометрии и тиков
        if self.shape.width == 0 || self.shape.height == 0 {
            anyhow::bail!("Размеры окна должны быть больше 0");
        }

        if self.tick.interval_ms == 0 {
            anyhow::bail!("tick.interval_ms должно быть больше 0");
        }

        Ok(())
    }
}
