use crate::debug_if_enabled;
use crate::error::{RegistryError, Result};
use crate::events::Shape;
use parking_lot::Mutex;
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::debug;

use super::r#trait::ShapeSource;

// xdotool - внешний процесс, дёргать его на каждом кадре слишком дорого
const MIN_REFRESH: Duration = Duration::from_millis(100);

/// Геометрия окна X11 через `xdotool getwindowgeometry --shell`
pub struct XdotoolShapeSource {
    window_id: Option<String>,
    cache: Mutex<CachedShape>,
}

struct CachedShape {
    shape: Shape,
    refreshed_at: Option<Instant>,
}

impl XdotoolShapeSource {
    /// `window_id == None` - берём активное окно
    pub fn new(window_id: Option<String>, seed: Shape) -> Self {
        Self {
            window_id,
            cache: Mutex::new(CachedShape {
                shape: seed,
                refreshed_at: None,
            }),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("xdotool");
        match &self.window_id {
            Some(id) => cmd.args(["getwindowgeometry", "--shell", id.as_str()]),
            None => cmd.args(["getactivewindow", "getwindowgeometry", "--shell"]),
        };
        cmd
    }

    pub fn test(&self) -> Result<()> {
        self.query().map(|_| ())
    }

    fn query(&self) -> Result<Shape> {
        let output = self.command().output().map_err(|e| {
            debug!("xdotool не найден или не работает: {}", e);
            RegistryError::Internal(format!("xdotool не найден: {}", e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RegistryError::Internal(format!(
                "xdotool вернул ошибку: {}",
                stderr.trim()
            )));
        }

        parse_geometry(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Разбор вывода `--shell`: строки вида `X=10`, `WIDTH=300`
fn parse_geometry(stdout: &str) -> Result<Shape> {
    let mut x = None;
    let mut y = None;
    let mut width = None;
    let mut height = None;

    for line in stdout.lines() {
        let Some((name, value)) = line.trim().split_once('=') else {
            continue;
        };
        match name {
            "X" => x = value.parse::<i32>().ok(),
            "Y" => y = value.parse::<i32>().ok(),
            "WIDTH" => width = value.parse::<u32>().ok(),
            "HEIGHT" => height = value.parse::<u32>().ok(),
            _ => {}
        }
    }

    match (x, y, width, height) {
        (Some(x), Some(y), Some(width), Some(height)) => Ok(Shape::new(x, y, width, height)),
        _ => Err(RegistryError::Internal(format!(
            "неполный вывод xdotool: {:?}",
            stdout.trim()
        ))),
    }
}

impl ShapeSource for XdotoolShapeSource {
    fn current_shape(&self) -> Shape {
        let mut cache = self.cache.lock();
        let fresh = cache
            .refreshed_at
            .map(|at| at.elapsed() < MIN_REFRESH)
            .unwrap_or(false);
        if fresh {
            return cache.shape;
        }

        match self.query() {
            Ok(shape) => cache.shape = shape,
            // Оставляем последнюю известную геометрию
            Err(e) => debug_if_enabled!("xdotool: геометрия не получена: {}", e),
        }
        cache.refreshed_at = Some(Instant::now());
        cache.shape
    }
}
