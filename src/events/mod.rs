pub mod participant;
pub mod registry;

pub use participant::{ParticipantRecord, RegistrySnapshot, Shape};
pub use registry::{RegistryEvent, RegistryEventKind};
