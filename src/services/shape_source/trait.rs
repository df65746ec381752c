use crate::config::{Config, ShapeSourceKind};
use crate::error::Result;
use crate::events::Shape;
use std::sync::Arc;
use tracing::info;

use super::dry_run::DryRunShapeSource;
use super::fixed::FixedShapeSource;
use super::xdotool::XdotoolShapeSource;

/// Trait for sources of the local window geometry
pub trait ShapeSource: Send + Sync {
    /// Текущая геометрия окна. Вызывается на каждом tick, должна быть дешёвой.
    fn current_shape(&self) -> Shape;
}

/// Factory function to create an appropriate shape source based on config and the dry_run flag
pub fn create_shape_source(config: &Config, dry_run: bool) -> Result<Arc<dyn ShapeSource>> {
    let seed = config.shape.seed_shape();

    if dry_run {
        info!("Dry-run: геометрия окна эмулируется");
        return Ok(Arc::new(DryRunShapeSource::new(seed)));
    }

    match config.shape.source {
        ShapeSourceKind::Fixed => {
            info!("Фиксированная геометрия окна: {}", seed);
            Ok(Arc::new(FixedShapeSource::new(seed)))
        }
        ShapeSourceKind::Xdotool => {
            let source = XdotoolShapeSource::new(config.shape.window_id.clone(), seed);
            source.test()?;
            info!("Геометрия окна берётся через xdotool");
            Ok(Arc::new(source))
        }
        ShapeSourceKind::DryRun => Ok(Arc::new(DryRunShapeSource::new(seed))),
    }
}
