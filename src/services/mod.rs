//! Services layer - orchestration logic
//!
//! This module coordinates between domain logic and infrastructure.
//! Services use infrastructure adapters to perform I/O operations.

pub mod cancel;
pub mod context;
pub mod folder_sync;
pub mod orchestrator;
pub mod retry;

// Re-export commonly used types
pub use cancel::{CancelSignal, Canceller};
pub use context::PromotionContext;
pub use folder_sync::FolderSync;
pub use orchestrator::{PromotionOrchestrator, StepOutcome};
pub use retry::RetryPolicy;
