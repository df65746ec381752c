pub mod coordinator;
pub mod runner;
pub mod shape_source;
pub mod store;

pub use coordinator::{CoordinatorState, WindowCoordinator};
pub use shape_source::create_shape_source;
pub use store::create_store_backend;
