use crate::events::Shape;
use parking_lot::RwLock;

use super::r#trait::ShapeSource;

/// Геометрия, заданная снаружи (конфигом или вызовом `set_shape`)
pub struct FixedShapeSource {
    shape: RwLock<Shape>,
}

impl FixedShapeSource {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape: RwLock::new(shape),
        }
    }

    pub fn set_shape(&self, shape: Shape) {
        *self.shape.write() = shape;
    }
}

impl ShapeSource for FixedShapeSource {
    fn current_shape(&self) -> Shape {
        *self.shape.read()
    }
}
