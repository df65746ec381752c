use crate::error::Result;

/// Trait for long-running tasks around the coordinator
#[async_trait::async_trait]
pub trait RegistryTask {
    /// Run the task until it finishes or fails
    async fn run(self: Box<Self>) -> Result<()>;
}
