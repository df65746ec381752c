//! ShapeSource: откуда процесс узнаёт собственную геометрию
//!
//! Модуль отвечает ТОЛЬКО за вычисление текущего прямоугольника окна процесса.
//! Сравнение с кэшем, запись в хранилище и колбэки - забота WindowCoordinator.

mod dry_run;
mod fixed;
mod r#trait;
mod xdotool;

pub use self::dry_run::DryRunShapeSource;
pub use self::fixed::FixedShapeSource;
pub use self::r#trait::{create_shape_source, ShapeSource};
pub use self::xdotool::XdotoolShapeSource;
