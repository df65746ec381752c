use super::participant::{RegistrySnapshot, Shape};
use std::fmt;

/// Событие реестра, которое координатор отдаёт потребителю
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEvent {
    pub kind: RegistryEventKind,
    pub timestamp: std::time::Instant,
}

impl RegistryEvent {
    pub fn new(kind: RegistryEventKind) -> Self {
        Self {
            kind,
            timestamp: std::time::Instant::now(),
        }
    }

    pub fn membership_changed(snapshot: RegistrySnapshot) -> Self {
        Self::new(RegistryEventKind::MembershipChanged(snapshot))
    }

    pub fn shape_changed(shape: Shape) -> Self {
        Self::new(RegistryEventKind::ShapeChanged(shape))
    }
}

impl fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}ms ago)",
            self.kind,
            self.timestamp.elapsed().as_millis()
        )
    }
}

/// Тип события реестра
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEventKind {
    /// Изменился состав участников; внутри - новый снимок
    MembershipChanged(RegistrySnapshot),
    /// Изменилась геометрия собственного окна
    ShapeChanged(Shape),
}

impl fmt::Display for RegistryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryEventKind::MembershipChanged(snapshot) => {
                write!(f, "MembershipChanged: {}", snapshot)
            }
            RegistryEventKind::ShapeChanged(shape) => write!(f, "ShapeChanged: {}", shape),
        }
    }
}
