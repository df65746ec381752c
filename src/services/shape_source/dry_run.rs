use crate::events::Shape;
use std::time::{Duration, Instant};

use super::r#trait::ShapeSource;

const STEP_PERIOD: Duration = Duration::from_secs(3);

// Смещения эмулируемого окна относительно начальной геометрии
const FAKE_OFFSETS: [(i32, i32); 4] = [(0, 0), (200, 0), (200, 150), (0, 150)];

/// Эмуляция окна, которое раз в несколько секунд перетаскивают по кругу
pub struct DryRunShapeSource {
    seed: Shape,
    started: Instant,
}

impl DryRunShapeSource {
    pub fn new(seed: Shape) -> Self {
        Self {
            seed,
            started: Instant::now(),
        }
    }

    fn shape_at(&self, elapsed: Duration) -> Shape {
        let step = (elapsed.as_millis() / STEP_PERIOD.as_millis()) as usize % FAKE_OFFSETS.len();
        let (dx, dy) = FAKE_OFFSETS[step];
        Shape::new(self.seed.x + dx, self.seed.y + dy, self.seed.width, self.seed.height)
    }
}

impl ShapeSource for DryRunShapeSource {
    fn current_shape(&self) -> Shape {
        self.shape_at(self.started.elapsed())
    }
}
